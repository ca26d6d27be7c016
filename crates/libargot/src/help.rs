//! Usage text for commands.

use crate::command::Command;

/// Indent for everything below an option line.
const INDENT: &str = "     ";

/// Narrowest wrapping width honoured, so help text stays readable.
const MIN_WIDTH: usize = 25;

/// Renders usage information for `cmd`, wrapping help text to `width` columns.
pub fn render(cmd: &Command, width: usize) -> String {
    let mut lines = vec![cmd.description().to_string(), String::new()];

    let mut subs = cmd.sub_commands().peekable();
    if subs.peek().is_some() {
        lines.push("Sub-commands:".into());
        lines.extend(subs.map(|sub| format!("{INDENT}{}", sub.name())));
        lines.push(String::new());
    }

    lines.push("Options:".into());
    let options = textwrap::Options::new(width.max(MIN_WIDTH))
        .initial_indent(INDENT)
        .subsequent_indent(INDENT);
    for arg in cmd.named_args() {
        lines.push(match arg.alias() {
            Some(alias) => format!("  -{alias},  --{}", arg.name()),
            None => format!("  --{}", arg.name()),
        });
        lines.push(if arg.is_required() {
            format!("{INDENT}Required argument.")
        } else {
            format!("{INDENT}Default value: {}", arg.default_text())
        });
        for line in arg.help_text().lines() {
            lines.extend(textwrap::wrap(line, &options).into_iter().map(String::from));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
