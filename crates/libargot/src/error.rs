//! Error types for argot.

use std::{io, result};

use rustyline::error::ReadlineError;
use thiserror::Error;

use crate::coerce::CoerceError;

/// Type alias for Results using our Error type.
pub type Result<T> = result::Result<T, Error>;

/// The main error type for argot operations.
///
/// None of these are fatal: the shell host prints them and carries on with
/// the next line.
#[derive(Error, Debug)]
pub enum Error {
    /// A dashed token did not match any registered name or alias.
    #[error("Unknown argument '{0}'.")]
    UnknownArgument(String),

    /// A dashed token of the form `-=value` or `--=value`.
    #[error("Probably missing an argument name in '{0}'.")]
    MissingArgumentName(String),

    /// A non-boolean argument was the last token on the line.
    #[error("Missing value for argument '{0}'.")]
    MissingValue(String),

    /// The value given for an argument does not coerce to its kind.
    #[error("Error parsing value '{value}' of argument '{name}': {reason}")]
    InvalidValue {
        /// Canonical name of the argument.
        name: String,
        /// The offending value text.
        value: String,
        /// Why the coercion failed.
        reason: CoerceError,
    },

    /// A required argument was not supplied in the current parse cycle.
    #[error("Required argument '{0}' not specified.")]
    RequiredArgument(String),

    /// The tokenizer reached the end of the line inside a quoted span.
    #[error("Invalid command syntax: unterminated quote.")]
    UnterminatedQuote,

    /// An argument name or alias is already registered with the command.
    #[error("Argument '{name}' already registered with '{command}'.")]
    DuplicateArgument {
        /// The colliding name or alias.
        name: String,
        /// The command being registered against.
        command: String,
    },

    /// A sub-command with the same name is already attached.
    #[error("Sub-command with name '{name}' already registered with '{command}'.")]
    DuplicateSubCommand {
        /// The colliding sub-command name.
        name: String,
        /// The parent command.
        command: String,
    },

    /// A top-level command with the same name is already registered with the shell.
    #[error("Command with name '{0}' already registered with CLI.")]
    DuplicateCommand(String),

    /// An argument name that can never be matched on a command line.
    #[error("Invalid argument name '{0}'.")]
    InvalidArgumentName(String),

    /// Restoring defaults failed while resetting a command tree.
    #[error("Unable to clear command '{command}': {source}")]
    Reset {
        /// The command whose argument failed to reset.
        command: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// I/O errors from the output sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Readline errors from rustyline.
    #[error("Readline error: {0}")]
    Readline(#[from] ReadlineError),

    /// The other side of a handler channel went away mid-exchange.
    #[error("Channel closed: {0}")]
    Channel(String),

    /// A command handler failed or panicked.
    #[error("Handler for command '{command}' failed: {message}")]
    Handler {
        /// Name of the top-level command.
        command: String,
        /// What went wrong.
        message: String,
    },

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

/// A failed parse, together with the command chain traversed before the failure.
#[derive(Error, Debug)]
#[error("Error parsing arguments to command '{}'.\n{error}", .chain.join(" "))]
pub struct ParseError {
    /// Command names from the root to the command that failed.
    pub chain: Vec<String>,
    /// The failure itself.
    #[source]
    pub error: Error,
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        e.error
    }
}
