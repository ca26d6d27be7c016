//! Declarative command-line argument parsing and an interactive shell host.
//!
//! Commands declare named arguments bound to caller-owned [`Slot`]s, may nest
//! sub-commands, and are parsed and reset repeatedly. [`tokenize`] splits a
//! typed line into the tokens a command parses, and [`Shell`] ties both
//! together into a read-eval-print loop.

/// Named argument specifications.
pub mod arg;
/// Text to typed value conversion.
pub mod coerce;
/// Commands and the parse/reset cycle.
pub mod command;
/// Error types.
mod error;
/// Usage text rendering.
pub mod help;
/// The interactive shell host.
pub mod shell;
/// Line tokenizer.
pub mod tokenize;

pub use arg::NamedArg;
pub use coerce::{Bindable, Binding, CoerceError, Kind, Slot};
pub use command::Command;
pub use error::{Error, ParseError, Result};
pub use shell::{
    CmdHandler, EditorReader, Flow, HandlerIo, LineReader, Response, ScriptReader, Shell,
    handler_fn,
};
pub use tokenize::tokenize;
