//! `argot`: an interactive shell demonstrating the libargot command toolkit.

use std::{io, path::PathBuf};

use anyhow::{Context, Result};
use atty::Stream;
use clap::{Parser, ValueEnum};
use libargot::{EditorReader, Flow, LineReader, ScriptReader, Shell, shell::DEFAULT_WIDTH};
use termcolor::{ColorChoice, StandardStream};
use terminal_size::{Width, terminal_size};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Demo command set.
mod demo;

/// When to colour output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorMode {
    /// Colour when stdout is a terminal.
    Auto,
    /// Always colour.
    Always,
    /// Never colour.
    Never,
}

impl ColorMode {
    /// Resolves the mode against the actual stdout.
    fn choice(self) -> ColorChoice {
        match self {
            Self::Auto if atty::is(Stream::Stdout) => ColorChoice::Auto,
            Self::Auto | Self::Never => ColorChoice::Never,
            Self::Always => ColorChoice::Always,
        }
    }
}

/// Interactive shell built on libargot.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Prompt shown before every line.
    #[arg(long, default_value = "argot>")]
    prompt: String,

    /// Text printed when the session starts.
    #[arg(
        long,
        default_value = "argot interactive shell. Type 'help' for commands, 'quit' to exit."
    )]
    banner: String,

    /// When to colour output.
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,

    /// Log filter, e.g. "debug" or "libargot=trace". RUST_LOG takes precedence.
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// History file. Defaults to argot/history.txt in the local data directory.
    #[arg(long)]
    history: Option<PathBuf>,

    /// Do not load or save history.
    #[arg(long)]
    no_history: bool,

    /// Execute a line and exit instead of starting a session. May be repeated.
    #[arg(short, long = "command", value_name = "LINE")]
    commands: Vec<String>,
}

impl Cli {
    /// The history file to use, if any.
    fn history_path(&self) -> Option<PathBuf> {
        if self.no_history {
            return None;
        }
        self.history
            .clone()
            .or_else(|| dirs::data_local_dir().map(|dir| dir.join("argot").join("history.txt")))
    }
}

/// Width of the controlling terminal, or the default when there is none.
fn help_width() -> usize {
    terminal_size().map_or(DEFAULT_WIDTH, |(Width(w), _)| usize::from(w))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&cli.log_level))
                .context("invalid log filter")?,
        )
        .init();

    let mut shell = Shell::new(cli.banner.as_str(), cli.prompt.as_str()).with_width(help_width());
    demo::register(&mut shell)?;

    let mut out = StandardStream::stdout(cli.color.choice());

    if !cli.commands.is_empty() {
        // Lines answering input requests are taken from the same queue.
        let mut reader = ScriptReader::new(cli.commands.iter().cloned());
        while let Some(line) = reader.read_line("").await? {
            if shell.execute_line(&line, &mut reader, &mut out).await? == Flow::EndSession {
                break;
            }
        }
        return Ok(());
    }

    let history = cli.history_path();
    debug!(?history, "starting interactive session");
    let mut reader = EditorReader::new(history)?;
    shell.run(&mut reader, &mut out).await?;
    reader.save_history().await?;
    Ok(())
}
