//! Splitting an interactively typed line into argument tokens.
//!
//! Tokens are separated by whitespace. A double-quoted span is kept together
//! and the quotes are dropped. Inside quotes, `\"` is a literal quote and
//! `\\` a literal backslash; no other escapes exist, and nothing is escaped
//! outside quotes.

use std::mem;

use tracing::trace;

use crate::{Error, Result};

/// Tokenizer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between tokens, or inside a bare word.
    Unquoted,
    /// Inside a double-quoted span.
    Quoted,
}

/// Accumulates tokens one character at a time.
#[derive(Debug)]
struct Tokenizer {
    /// Current state.
    state: State,
    /// The token being built.
    current: String,
    /// Tokens emitted so far.
    tokens: Vec<String>,
    /// The previous input character.
    prev: Option<char>,
    /// Set when the previous backslash already collapsed `\\` into one, so it
    /// cannot escape the next character.
    consumed: bool,
}

impl Tokenizer {
    /// Creates an empty tokenizer.
    fn new() -> Self {
        Self {
            state: State::Unquoted,
            current: String::new(),
            tokens: Vec::new(),
            prev: None,
            consumed: false,
        }
    }

    /// Emits the current token.
    fn emit(&mut self) {
        self.tokens.push(mem::take(&mut self.current));
    }

    /// Processes one character.
    fn feed(&mut self, c: char) {
        match self.state {
            State::Unquoted => match c {
                '"' => self.state = State::Quoted,
                c if c.is_whitespace() => {
                    if !self.current.is_empty() {
                        self.emit();
                    }
                }
                c => self.current.push(c),
            },
            State::Quoted => {
                let escaping = self.prev == Some('\\') && !self.consumed;
                match c {
                    '"' if escaping => {
                        self.current.pop();
                        self.current.push('"');
                    }
                    '"' => {
                        // Closing a span always emits, even an empty one.
                        self.emit();
                        self.state = State::Unquoted;
                        self.consumed = false;
                    }
                    // The pending backslash is already in place.
                    '\\' if escaping => self.consumed = true,
                    c => {
                        self.current.push(c);
                        self.consumed = false;
                    }
                }
            }
        }
        self.prev = Some(c);
    }

    /// Finishes the line.
    fn finish(mut self) -> Result<Vec<String>> {
        if self.state == State::Quoted {
            return Err(Error::UnterminatedQuote);
        }
        if !self.current.is_empty() {
            self.emit();
        }
        Ok(self.tokens)
    }
}

/// Splits `line` into tokens. Fails on an unterminated quote.
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut tokenizer = Tokenizer::new();
    for c in line.trim().chars() {
        tokenizer.feed(c);
    }
    let tokens = tokenizer.finish()?;
    trace!(?tokens, "tokenized line");
    Ok(tokens)
}
