//! Integration tests for the shell host: dispatch, the handler conversation
//! and reset between cycles.
#![allow(clippy::tests_outside_test_module)]

use std::{
    future, io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use libargot::{
    CmdHandler, Command, Error, Flow, HandlerIo, LineReader, Response, Result, ScriptReader,
    Shell, Slot, handler_fn,
};
use termcolor::{Buffer, ColorSpec, WriteColor};
use tokio::sync::mpsc;

/// Records what a handler saw on each invocation.
#[derive(Clone, Default)]
struct Recorder {
    calls: Slot<Vec<(Vec<String>, Vec<String>)>>,
}

#[async_trait::async_trait]
impl CmdHandler for Recorder {
    async fn run(&self, io: HandlerIo) -> Result<()> {
        let call = (io.chain().to_vec(), io.positionals().to_vec());
        self.calls.update(|calls| calls.push(call));
        Ok(())
    }
}

async fn run_script(shell: &mut Shell, lines: &[&str]) -> String {
    let mut reader = ScriptReader::new(lines.iter().copied());
    let mut out = Buffer::no_color();
    shell.run(&mut reader, &mut out).await.unwrap();
    String::from_utf8(out.into_inner()).unwrap()
}

#[tokio::test]
async fn banner_and_end_of_input() {
    let mut shell = Shell::new("Welcome!", ">");
    let out = run_script(&mut shell, &["", "   "]).await;
    assert_eq!(out, "Welcome!\n");
}

#[tokio::test]
async fn quit_ends_session() {
    let recorder = Recorder::default();
    let mut shell = Shell::new("", ">");
    shell
        .add_command(Command::new("rec", "Records calls."), recorder.clone())
        .unwrap();

    let out = run_script(&mut shell, &["rec", "quit", "rec"]).await;
    assert_eq!(out, "");
    assert_eq!(recorder.calls.get().len(), 1);
}

#[tokio::test]
async fn help_lists_commands() {
    let mut shell = Shell::new("", ">");
    shell
        .add_command(
            Command::new("echo", "Print things.\nAll of them."),
            Recorder::default(),
        )
        .unwrap();

    let out = run_script(&mut shell, &["help"]).await;
    assert_eq!(
        out,
        "List of available commands:\n\n\
         echo -- Print things.\n    All of them.\n\
         help -- Show help message.\n\
         quit -- End current session.\n\n"
    );
}

#[tokio::test]
async fn user_errors_are_reported_and_session_continues() {
    let count = Slot::new(0_usize);
    let mut cmd = Command::new("count", "Counts.");
    cmd.add_uint_arg("n", "", &count, 0, true, "How many.").unwrap();
    let recorder = Recorder::default();
    let mut shell = Shell::new("", ">");
    shell.add_command(cmd, recorder.clone()).unwrap();

    let out = run_script(
        &mut shell,
        &[
            "nope",
            r#"count "open"#,
            "count",
            "count -n -1",
            "count --bogus",
            "count -n 2",
        ],
    )
    .await;
    assert_eq!(
        out,
        "Unknown command 'nope'.\n\
         Invalid command syntax: unterminated quote.\n\
         Error parsing arguments to command 'count'.\nRequired argument 'n' not specified.\n\
         Error parsing arguments to command 'count'.\nError parsing value '-1' of argument 'n': sign not allowed for uint\n\
         Error parsing arguments to command 'count'.\nUnknown argument 'bogus'.\n"
    );
    assert_eq!(recorder.calls.get().len(), 1);
    assert_eq!(count.get(), 2);
}

#[tokio::test]
async fn help_flag_renders_usage_without_running_handler() {
    let name = Slot::new(String::new());
    let mut cmd = Command::new("greet", "Greets.");
    cmd.add_string_arg("name", "n", &name, String::new(), true, "Who.")
        .unwrap();
    let recorder = Recorder::default();
    let mut shell = Shell::new("", ">");
    shell.add_command(cmd, recorder.clone()).unwrap();

    let out = run_script(&mut shell, &["greet -h"]).await;
    assert_eq!(
        out,
        "Greets.\n\nOptions:\n  -h,  --help\n     Default value: false\n     \
         Print 'greet' usage information.\n  -n,  --name\n     Required argument.\n     Who.\n"
    );
    assert!(recorder.calls.get().is_empty());
    assert!(!shell.command("greet").unwrap().help_requested());
}

#[tokio::test]
async fn help_flag_on_sub_command_renders_innermost() {
    let mut root = Command::new("calc", "Calculator.");
    root.add_sub_command(Command::new("add", "Adds.")).unwrap();
    let mut shell = Shell::new("", ">");
    shell.add_command(root, Recorder::default()).unwrap();

    let out = run_script(&mut shell, &["calc add --help"]).await;
    assert!(out.starts_with("Adds.\n\nOptions:\n"), "{out}");
    assert!(out.contains("Print 'add' usage information."));
}

#[tokio::test]
async fn handler_receives_chain_and_positionals() {
    let mut root = Command::new("git", "");
    let mut remote = Command::new("remote", "");
    remote.add_sub_command(Command::new("add", "")).unwrap();
    root.add_sub_command(remote).unwrap();
    let recorder = Recorder::default();
    let mut shell = Shell::new("", ">");
    shell.add_command(root, recorder.clone()).unwrap();

    run_script(
        &mut shell,
        &[r#"git remote add origin "some url""#, "git status -- x"],
    )
    .await;
    let calls = recorder.calls.get();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, ["git", "remote", "add"]);
    assert_eq!(calls[0].1, ["origin", "some url"]);
}

#[tokio::test]
async fn handler_conversation() {
    let mut shell = Shell::new("", ">");
    shell
        .add_command(
            Command::new("ask", "Asks questions."),
            handler_fn(|mut io: HandlerIo| async move {
                io.print("starting").await?;
                let first = io.request_input("First?").await?;
                let second = io.request_input("Second?").await?;
                io.print(format!("got {first} and {second}")).await?;
                io.end_session().await
            }),
        )
        .unwrap();

    let out = run_script(&mut shell, &["ask", "one", "two", "help"]).await;
    assert_eq!(out, "starting\nFirst?\nSecond?\ngot one and two\n");
}

#[tokio::test]
async fn input_request_at_end_of_input_gets_empty_line() {
    let mut shell = Shell::new("", ">");
    shell
        .add_command(
            Command::new("ask", ""),
            handler_fn(|mut io: HandlerIo| async move {
                let answer = io.request_input("Name?").await?;
                io.print(format!("[{answer}]")).await
            }),
        )
        .unwrap();

    let out = run_script(&mut shell, &["ask"]).await;
    assert_eq!(out, "Name?\n[]\n");
}

#[tokio::test]
async fn handler_failure_is_reported() {
    let mut shell = Shell::new("", ">");
    shell
        .add_command(
            Command::new("fail", ""),
            handler_fn(|_io: HandlerIo| async { Err::<(), _>(Error::Other("boom".into())) }),
        )
        .unwrap();

    let out = run_script(&mut shell, &["fail", "fail"]).await;
    assert_eq!(
        out,
        "Handler for command 'fail' failed: boom\n\
         Handler for command 'fail' failed: boom\n"
    );
}

#[tokio::test]
async fn reset_between_cycles() {
    let level = Slot::new(0_i64);
    let seen = Slot::new(Vec::new());
    let mut cmd = Command::new("show", "");
    cmd.add_int64_arg("level", "l", &level, 3, false, "").unwrap();

    let handler = {
        let level = level.clone();
        let seen = seen.clone();
        handler_fn(move |io: HandlerIo| {
            let value = level.get();
            let positionals = io.positionals().len();
            seen.update(|seen| seen.push((value, positionals)));
            async { Ok::<(), Error>(()) }
        })
    };
    let mut shell = Shell::new("", ">");
    shell.add_command(cmd, handler).unwrap();

    run_script(&mut shell, &["show -l 9 a b", "show"]).await;
    assert_eq!(seen.get(), [(9, 2), (3, 0)]);
    assert_eq!(level.get(), 3);
    let cmd = shell.command("show").unwrap();
    assert!(cmd.positionals().is_empty());
    assert!(!cmd.parsed());
}

#[tokio::test]
async fn duplicate_command_rejected() {
    let mut shell = Shell::new("", ">");
    shell
        .add_command(Command::new("echo", ""), Recorder::default())
        .unwrap();
    for name in ["echo", "help", "quit"] {
        let err = shell
            .add_command(Command::new(name, ""), Recorder::default())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateCommand(ref n) if n == name));
    }
}

#[tokio::test]
async fn execute_line_reports_flow() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut shell = Shell::new("", ">");
    let counter = Arc::clone(&calls);
    shell
        .add_command(
            Command::new("tick", ""),
            handler_fn(move |_io: HandlerIo| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), Error>(()) }
            }),
        )
        .unwrap();

    let mut reader = ScriptReader::default();
    let mut out = Buffer::no_color();
    let flow = shell.execute_line("tick", &mut reader, &mut out).await.unwrap();
    assert_eq!(flow, Flow::Continue);
    let flow = shell.execute_line("quit", &mut reader, &mut out).await.unwrap();
    assert_eq!(flow, Flow::EndSession);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn handler_io_channel() {
    let (mut io, input_tx, mut output_rx) =
        HandlerIo::channel(vec!["cmd".into()], vec!["p".into()]);
    let task = tokio::spawn(async move {
        let answer = io.request_input("q").await?;
        io.print(answer).await
    });

    assert_eq!(
        output_rx.recv().await,
        Some(Response::GetUsrInput("q".into()))
    );
    input_tx.send("a".into()).await.unwrap();
    assert_eq!(output_rx.recv().await, Some(Response::PrintMsg("a".into())));
    task.await.unwrap().unwrap();
    assert_eq!(output_rx.recv().await, None);
}

/// Yields lines that another task sends.
struct ChannelReader(mpsc::Receiver<String>);

#[async_trait::async_trait]
impl LineReader for ChannelReader {
    async fn read_line(&mut self, _prompt: &str) -> Result<Option<String>> {
        Ok(self.0.recv().await)
    }
}

#[tokio::test]
async fn reading_waits_without_blocking_the_runtime() {
    let mut shell = Shell::new("", ">");
    shell
        .add_command(
            Command::new("ask", ""),
            handler_fn(|mut io: HandlerIo| async move {
                let answer = io.request_input("Name?").await?;
                io.print(format!("[{answer}]")).await
            }),
        )
        .unwrap();

    // The test runtime has one thread, so the feeder only runs while the
    // shell is parked waiting for a line.
    let (tx, rx) = mpsc::channel(1);
    let feeder = tokio::spawn(async move {
        for line in ["ask", "Ada", "quit"] {
            tx.send(line.to_string()).await.unwrap();
        }
    });

    let mut reader = ChannelReader(rx);
    let mut out = Buffer::no_color();
    shell.run(&mut reader, &mut out).await.unwrap();
    feeder.await.unwrap();
    assert_eq!(String::from_utf8(out.into_inner()).unwrap(), "Name?\n[Ada]\n");
}

/// An output sink whose writes always fail.
struct BrokenSink;

impl io::Write for BrokenSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("sink closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl WriteColor for BrokenSink {
    fn supports_color(&self) -> bool {
        false
    }

    fn set_color(&mut self, _spec: &ColorSpec) -> io::Result<()> {
        Ok(())
    }

    fn reset(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sets its flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn output_failure_stops_the_handler() {
    let dropped = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&dropped);
    let mut shell = Shell::new("", ">");
    shell
        .add_command(
            Command::new("stuck", ""),
            handler_fn(move |io: HandlerIo| {
                let guard = DropFlag(Arc::clone(&flag));
                async move {
                    let _guard = guard;
                    io.print("hello").await?;
                    future::pending::<()>().await;
                    Ok::<(), Error>(())
                }
            }),
        )
        .unwrap();

    let mut reader = ScriptReader::default();
    let err = shell
        .execute_line("stuck", &mut reader, &mut BrokenSink)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)), "{err}");
    assert!(dropped.load(Ordering::SeqCst));
    assert!(!shell.command("stuck").unwrap().parsed());
}
