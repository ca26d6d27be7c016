//! The interactive shell host.
//!
//! The shell reads a line, tokenizes it, looks the first token up as a
//! top-level command and parses the rest against it. A command that parsed
//! cleanly is handed to its handler, which runs as its own task and talks to
//! the shell over two channels: responses (print a message, ask for input,
//! end the session) flow to the shell, and lines the user typed in answer to
//! input requests flow back. The handler signals completion by dropping its
//! [`HandlerIo`]. The command tree is reset after every cycle.

use std::{
    collections::BTreeMap,
    fs,
    future::Future,
    path::PathBuf,
    sync::{Arc, mpsc as std_mpsc},
    thread,
};

use rustyline::{DefaultEditor, error::ReadlineError};
use termcolor::{Color, ColorSpec, WriteColor};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{Error, Result, coerce::Slot, command::Command, help, tokenize::tokenize};

/// Column count used for help text when none is configured.
pub const DEFAULT_WIDTH: usize = 80;

/// A message from a command handler to the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Print the message on its own line.
    PrintMsg(String),
    /// Print the message, read a line from the user and send it back.
    GetUsrInput(String),
    /// Stop the shell once this handler is done.
    EndSession,
}

/// Whether the shell should keep reading lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// A handler ended the session.
    EndSession,
}

/// A handler's side of the conversation with the shell.
///
/// Dropping it closes the response channel, which tells the shell the
/// handler has finished.
#[derive(Debug)]
pub struct HandlerIo {
    /// Command names from the top-level command to the one that was matched.
    chain: Vec<String>,
    /// Positional arguments collected by the matched command.
    positionals: Vec<String>,
    /// Lines typed by the user in answer to input requests.
    input: mpsc::Receiver<String>,
    /// Responses to the shell.
    output: mpsc::Sender<Response>,
}

impl HandlerIo {
    /// Creates both ends of a handler conversation. Returns the handler's
    /// end, the sender for user input and the receiver for responses.
    pub fn channel(
        chain: Vec<String>,
        positionals: Vec<String>,
    ) -> (Self, mpsc::Sender<String>, mpsc::Receiver<Response>) {
        let (input_tx, input_rx) = mpsc::channel(1);
        let (output_tx, output_rx) = mpsc::channel(1);
        let io = Self {
            chain,
            positionals,
            input: input_rx,
            output: output_tx,
        };
        (io, input_tx, output_rx)
    }

    /// Command names from the top-level command to the matched sub-command.
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    /// Positional arguments of the matched command.
    pub fn positionals(&self) -> &[String] {
        &self.positionals
    }

    /// Sends a response to the shell.
    pub async fn send(&self, response: Response) -> Result<()> {
        self.output
            .send(response)
            .await
            .map_err(|_| Error::Channel("shell stopped listening".into()))
    }

    /// Asks the shell to print `msg`.
    pub async fn print(&self, msg: impl Into<String>) -> Result<()> {
        self.send(Response::PrintMsg(msg.into())).await
    }

    /// Shows `prompt` and waits for the line the user types.
    pub async fn request_input(&mut self, prompt: impl Into<String>) -> Result<String> {
        self.send(Response::GetUsrInput(prompt.into())).await?;
        self.input
            .recv()
            .await
            .ok_or_else(|| Error::Channel("no input from shell".into()))
    }

    /// Asks the shell to end the session.
    pub async fn end_session(&self) -> Result<()> {
        self.send(Response::EndSession).await
    }
}

/// Runs a top-level command after it parsed successfully.
///
/// Handlers read parsed values from the [`Slot`]s they share with the
/// command's arguments.
#[async_trait::async_trait]
pub trait CmdHandler: Send + Sync {
    /// Handles one invocation.
    async fn run(&self, io: HandlerIo) -> Result<()>;
}

/// A [`CmdHandler`] built from an async closure. See [`handler_fn`].
pub struct FnHandler<F>(F);

/// Wraps `f` as a [`CmdHandler`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(HandlerIo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait::async_trait]
impl<F, Fut> CmdHandler for FnHandler<F>
where
    F: Fn(HandlerIo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn run(&self, io: HandlerIo) -> Result<()> {
        (self.0)(io).await
    }
}

/// Handler for the built-in `quit` command.
struct QuitHandler;

#[async_trait::async_trait]
impl CmdHandler for QuitHandler {
    async fn run(&self, io: HandlerIo) -> Result<()> {
        io.end_session().await
    }
}

/// Handler for the built-in `help` command.
struct HelpHandler {
    /// Descriptions of all registered commands, by name.
    directory: Slot<BTreeMap<String, String>>,
}

#[async_trait::async_trait]
impl CmdHandler for HelpHandler {
    async fn run(&self, io: HandlerIo) -> Result<()> {
        let mut msg = String::from("List of available commands:\n\n");
        for (name, desc) in self.directory.get() {
            msg.push_str(&format!("{name} -- {}\n", desc.replace('\n', "\n    ")));
        }
        io.print(msg).await
    }
}

/// Source of input lines.
///
/// The shell only reads while no handler is running or while the running
/// handler waits for input.
#[async_trait::async_trait]
pub trait LineReader: Send {
    /// Reads one line after showing `prompt`. Returns `None` at end of input.
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Reads lines from a fixed script, for tests and one-shot execution.
#[derive(Debug, Default)]
pub struct ScriptReader {
    /// Lines not yet read.
    lines: Vec<String>,
}

impl ScriptReader {
    /// Creates a reader that yields `lines` in order.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        lines.reverse();
        Self { lines }
    }
}

#[async_trait::async_trait]
impl LineReader for ScriptReader {
    async fn read_line(&mut self, _prompt: &str) -> Result<Option<String>> {
        Ok(self.lines.pop())
    }
}

/// Work for the editor thread.
enum EditorRequest {
    /// Show the prompt and read one line.
    Read(String, oneshot::Sender<Result<Option<String>>>),
    /// Write history back to its file.
    SaveHistory(oneshot::Sender<Result<()>>),
}

/// Reads lines from the terminal with rustyline, keeping history.
///
/// rustyline blocks, so the editor lives on its own thread and the async side
/// talks to it over channels. The thread exits when the reader is dropped.
pub struct EditorReader {
    /// Requests to the editor thread.
    requests: std_mpsc::Sender<EditorRequest>,
}

impl EditorReader {
    /// Creates a terminal reader. A missing history file is not an error.
    pub fn new(history: Option<PathBuf>) -> Result<Self> {
        let mut editor = DefaultEditor::new()?;
        if let Some(path) = history.as_ref().filter(|path| path.exists()) {
            editor.load_history(path)?;
        }

        let (requests, incoming) = std_mpsc::channel();
        thread::Builder::new()
            .name("argot-readline".into())
            .spawn(move || {
                while let Ok(request) = incoming.recv() {
                    let delivered = match request {
                        EditorRequest::Read(prompt, reply) => {
                            reply.send(read_editor_line(&mut editor, &prompt)).is_ok()
                        }
                        EditorRequest::SaveHistory(reply) => {
                            reply.send(save_editor_history(&mut editor, history.as_ref())).is_ok()
                        }
                    };
                    if !delivered {
                        break;
                    }
                }
            })?;
        Ok(Self { requests })
    }

    /// Writes history back to its file, creating the parent directory.
    pub async fn save_history(&self) -> Result<()> {
        let (reply, result) = oneshot::channel();
        self.send(EditorRequest::SaveHistory(reply))?;
        result.await.map_err(|_| editor_gone())?
    }

    /// Hands a request to the editor thread.
    fn send(&self, request: EditorRequest) -> Result<()> {
        self.requests.send(request).map_err(|_| editor_gone())
    }
}

#[async_trait::async_trait]
impl LineReader for EditorReader {
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        let (reply, line) = oneshot::channel();
        self.send(EditorRequest::Read(prompt.to_string(), reply))?;
        line.await.map_err(|_| editor_gone())?
    }
}

/// The error for an editor thread that is no longer running.
fn editor_gone() -> Error {
    Error::Channel("readline thread stopped".into())
}

/// Reads one line on the editor thread. End of input and Ctrl-C both end it.
fn read_editor_line(editor: &mut DefaultEditor, prompt: &str) -> Result<Option<String>> {
    match editor.readline(prompt) {
        Ok(line) => {
            if !line.trim().is_empty() {
                editor.add_history_entry(line.as_str())?;
            }
            Ok(Some(line))
        }
        Err(ReadlineError::Eof | ReadlineError::Interrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Saves history on the editor thread.
fn save_editor_history(editor: &mut DefaultEditor, history: Option<&PathBuf>) -> Result<()> {
    let Some(path) = history else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    editor.save_history(path)?;
    Ok(())
}

/// A registered top-level command.
struct Entry {
    /// The argument tree, reused across cycles.
    cmd: Command,
    /// What runs once the arguments parse.
    handler: Arc<dyn CmdHandler>,
}

/// The interactive host.
pub struct Shell {
    /// Printed once when the session starts.
    banner: String,
    /// Shown before every line.
    prompt: String,
    /// Top-level commands by name.
    commands: BTreeMap<String, Entry>,
    /// Command descriptions shared with the `help` built-in.
    directory: Slot<BTreeMap<String, String>>,
    /// Wrap width for rendered help.
    width: usize,
}

impl Shell {
    /// Creates a shell with the built-in `quit` and `help` commands.
    pub fn new(banner: impl Into<String>, prompt: impl Into<String>) -> Self {
        let directory = Slot::default();
        let mut shell = Self {
            banner: banner.into(),
            prompt: prompt.into(),
            commands: BTreeMap::new(),
            directory: directory.clone(),
            width: DEFAULT_WIDTH,
        };
        shell.insert(Command::new("quit", "End current session."), Arc::new(QuitHandler));
        shell.insert(
            Command::new("help", "Show help message."),
            Arc::new(HelpHandler { directory }),
        );
        shell
    }

    /// Sets the column width used when rendering command help.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Registers a top-level command. Fails if the name is taken.
    pub fn add_command(&mut self, cmd: Command, handler: impl CmdHandler + 'static) -> Result<()> {
        if self.commands.contains_key(cmd.name()) {
            return Err(Error::DuplicateCommand(cmd.name().to_string()));
        }
        self.insert(cmd, Arc::new(handler));
        Ok(())
    }

    /// Looks up a registered top-level command.
    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.get(name).map(|entry| &entry.cmd)
    }

    /// Adds a command without checking for collisions.
    fn insert(&mut self, cmd: Command, handler: Arc<dyn CmdHandler>) {
        let name = cmd.name().to_string();
        self.directory
            .update(|dir| dir.insert(name.clone(), cmd.description().to_string()));
        self.commands.insert(name, Entry { cmd, handler });
    }

    /// Runs the session: prints the banner, then executes lines until a
    /// handler ends the session or input runs out.
    pub async fn run(
        &mut self,
        reader: &mut dyn LineReader,
        out: &mut dyn WriteColor,
    ) -> Result<()> {
        if !self.banner.is_empty() {
            writeln!(out, "{}", self.banner)?;
        }
        let prompt = format!("{} ", self.prompt);
        loop {
            out.flush()?;
            let Some(line) = reader.read_line(&prompt).await? else {
                break;
            };
            if self.execute_line(&line, reader, out).await? == Flow::EndSession {
                break;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// Executes one line. User mistakes are printed to `out`; only failures
    /// to write output or read input are returned as errors.
    pub async fn execute_line(
        &mut self,
        line: &str,
        reader: &mut dyn LineReader,
        out: &mut dyn WriteColor,
    ) -> Result<Flow> {
        let tokens = match tokenize(line) {
            Ok(tokens) => tokens,
            Err(e) => {
                print_error(out, &e.to_string())?;
                return Ok(Flow::Continue);
            }
        };
        let Some((name, args)) = tokens.split_first() else {
            return Ok(Flow::Continue);
        };
        let Some(entry) = self.commands.get_mut(name) else {
            print_error(out, &format!("Unknown command '{name}'."))?;
            return Ok(Flow::Continue);
        };

        let flow = dispatch(entry, args, reader, out, self.width).await;
        if let Err(e) = entry.cmd.reset() {
            warn!(command = %name, error = %e, "failed to reset command");
            print_error(out, &e.to_string())?;
        }
        flow
    }
}

/// Parses `args` against the entry's command and, unless parsing failed or
/// help was requested, runs its handler to completion.
async fn dispatch(
    entry: &mut Entry,
    args: &[String],
    reader: &mut dyn LineReader,
    out: &mut dyn WriteColor,
    width: usize,
) -> Result<Flow> {
    let chain = match entry.cmd.parse(args) {
        Ok(chain) => chain,
        Err(e) => {
            print_error(out, &e.to_string())?;
            return Ok(Flow::Continue);
        }
    };
    let matched = entry
        .cmd
        .find(&chain)
        .ok_or_else(|| Error::Other(format!("command chain {chain:?} not found")))?;
    if matched.help_requested() {
        write!(out, "{}", help::render(matched, width))?;
        return Ok(Flow::Continue);
    }

    debug!(?chain, positionals = ?matched.positionals(), "running handler");
    let (io, input_tx, mut output_rx) =
        HandlerIo::channel(chain, matched.positionals().to_vec());
    let handler = Arc::clone(&entry.handler);
    let task = tokio::spawn(async move { handler.run(io).await });

    let served = serve(&mut output_rx, &input_tx, reader, out).await;
    // Anything the handler still sends or awaits now fails instead of hanging.
    drop(output_rx);
    drop(input_tx);

    let command = entry.cmd.name().to_string();
    let flow = match served {
        Ok(flow) => flow,
        Err(e) => {
            task.abort();
            if let Err(stopped) = task.await {
                debug!(%command, error = %stopped, "handler task stopped");
            }
            return Err(e);
        }
    };

    let failure = match task.await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(e) => Some(e.to_string()),
    };
    if let Some(message) = failure {
        warn!(%command, %message, "command handler failed");
        print_error(out, &Error::Handler { command, message }.to_string())?;
    }
    Ok(flow)
}

/// Answers a running handler's responses until it finishes or ends the
/// session.
async fn serve(
    responses: &mut mpsc::Receiver<Response>,
    input: &mpsc::Sender<String>,
    reader: &mut dyn LineReader,
    out: &mut dyn WriteColor,
) -> Result<Flow> {
    while let Some(response) = responses.recv().await {
        match response {
            Response::PrintMsg(msg) => writeln!(out, "{msg}")?,
            Response::GetUsrInput(msg) => {
                writeln!(out, "{msg}")?;
                out.flush()?;
                let line = reader.read_line("").await?.unwrap_or_default();
                if input.send(line).await.is_err() {
                    break;
                }
            }
            Response::EndSession => return Ok(Flow::EndSession),
        }
    }
    Ok(Flow::Continue)
}

/// Prints `msg` in red when the sink supports colour.
fn print_error(out: &mut dyn WriteColor, msg: &str) -> Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
    writeln!(out, "{msg}")?;
    out.reset()?;
    Ok(())
}
