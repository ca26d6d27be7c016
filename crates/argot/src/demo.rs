//! The demo command set wired into the shell.

use libargot::{Command, Error, HandlerIo, Result, Shell, Slot, handler_fn};

/// Registers `echo`, `calc` and `greet` with `shell`.
pub fn register(shell: &mut Shell) -> Result<()> {
    register_echo(shell)?;
    register_calc(shell)?;
    register_greet(shell)
}

/// `echo [-u] [-r N] words...` prints its positional arguments.
fn register_echo(shell: &mut Shell) -> Result<()> {
    let upper = Slot::new(false);
    let repeat = Slot::new(1_usize);

    let mut cmd = Command::new("echo", "Print the positional arguments.");
    cmd.add_bool_arg("upper", "u", &upper, false, false, "Print in upper case.")?;
    cmd.add_uint_arg(
        "repeat",
        "r",
        &repeat,
        1,
        false,
        "Number of times to print the line.",
    )?;

    shell.add_command(
        cmd,
        handler_fn(move |io: HandlerIo| {
            let mut line = io.positionals().join(" ");
            if upper.get() {
                line = line.to_uppercase();
            }
            let times = repeat.get();
            async move {
                for _ in 0..times {
                    io.print(line.as_str()).await?;
                }
                Ok::<(), Error>(())
            }
        }),
    )
}

/// `calc add|mul -a X -b Y` does arithmetic on two floats.
fn register_calc(shell: &mut Shell) -> Result<()> {
    let a = Slot::new(0.0_f64);
    let b = Slot::new(0.0_f64);

    let mut cmd = Command::new("calc", "Simple arithmetic.\nPick an operation sub-command.");
    for (name, description) in [("add", "Add two numbers."), ("mul", "Multiply two numbers.")] {
        let mut sub = Command::new(name, description);
        sub.add_float64_arg("a", "", &a, 0.0, true, "First operand.")?;
        sub.add_float64_arg("b", "", &b, 0.0, true, "Second operand.")?;
        cmd.add_sub_command(sub)?;
    }

    shell.add_command(
        cmd,
        handler_fn(move |io: HandlerIo| {
            let (a, b) = (a.get(), b.get());
            let result = match io.chain().get(1).map(String::as_str) {
                Some("add") => Ok(a + b),
                Some("mul") => Ok(a * b),
                Some(other) => Err(Error::Other(format!("unsupported operation '{other}'"))),
                None => Err(Error::Other(
                    "no operation given, see 'calc --help'".to_string(),
                )),
            };
            async move { io.print(result?.to_string()).await }
        }),
    )
}

/// `greet [-g TEXT]` asks for a name and greets it.
fn register_greet(shell: &mut Shell) -> Result<()> {
    let greeting = Slot::new(String::new());

    let mut cmd = Command::new("greet", "Ask for your name and greet you.");
    cmd.add_string_arg(
        "greeting",
        "g",
        &greeting,
        "Hello".into(),
        false,
        "The greeting to use.",
    )?;

    shell.add_command(
        cmd,
        handler_fn(move |mut io: HandlerIo| {
            let greeting = greeting.get();
            async move {
                let name = io.request_input("What is your name?").await?;
                let name = name.trim();
                if name.is_empty() {
                    return io.print("Nobody to greet.").await;
                }
                io.print(format!("{greeting}, {name}!")).await
            }
        }),
    )
}

#[cfg(test)]
mod tests {
    use libargot::ScriptReader;
    use termcolor::Buffer;

    use super::*;

    async fn run_lines(lines: &[&str]) -> String {
        let mut shell = Shell::new("", "test>");
        register(&mut shell).unwrap();
        let mut reader = ScriptReader::new(lines.iter().copied());
        let mut out = Buffer::no_color();
        shell.run(&mut reader, &mut out).await.unwrap();
        String::from_utf8(out.into_inner()).unwrap()
    }

    #[tokio::test]
    async fn echo_options() {
        let out = run_lines(&["echo -u -r 2 hi there", "echo plain"]).await;
        assert_eq!(out, "HI THERE\nHI THERE\nplain\n");
    }

    #[tokio::test]
    async fn calc_operations() {
        let out = run_lines(&["calc add -a 1.5 -b 2", "calc mul -a=3 -b=4", "calc"]).await;
        assert_eq!(
            out,
            "3.5\n12\nHandler for command 'calc' failed: no operation given, see 'calc --help'\n"
        );
    }

    #[tokio::test]
    async fn calc_requires_operands() {
        let out = run_lines(&["calc add -a 1"]).await;
        assert_eq!(
            out,
            "Error parsing arguments to command 'calc add'.\nRequired argument 'b' not specified.\n"
        );
    }

    #[tokio::test]
    async fn greet_asks_for_name() {
        let out = run_lines(&["greet -g Hi", "Ada", "greet", "Bob"]).await;
        assert_eq!(
            out,
            "What is your name?\nHi, Ada!\nWhat is your name?\nHello, Bob!\n"
        );
    }
}
