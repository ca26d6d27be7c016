//! Named argument specifications.

use crate::{
    Error, Result,
    coerce::{Bindable, Binding, Kind, Slot},
};

/// Describes one named argument of a command.
///
/// A spec does not own its storage: it holds a [`Binding`] to a [`Slot`] the
/// caller created, and writes through it when the command is parsed or reset.
#[derive(Debug, Clone)]
pub struct NamedArg {
    /// Canonical name, matched as `-name` or `--name`.
    name: String,
    /// Short form resolving to the same spec. Empty means none.
    alias: String,
    /// Display-only description.
    help: String,
    /// Default value in its stored text form.
    default_text: String,
    /// Where parsed values go.
    binding: Binding,
    /// Whether the argument must be given in every parse cycle.
    required: bool,
    /// Whether the argument was matched in the current parse cycle.
    supplied: bool,
}

impl NamedArg {
    /// Creates an optional argument bound to `slot`, defaulting to `default`.
    ///
    /// The default is not written until the spec is registered with a command.
    pub fn new<T: Bindable>(
        name: impl Into<String>,
        alias: impl Into<String>,
        slot: &Slot<T>,
        default: T,
    ) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
            help: String::new(),
            default_text: default.format_value(),
            binding: T::bind(slot),
            required: false,
            supplied: false,
        }
    }

    /// Marks the argument as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the help text.
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// The canonical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The short alias, if one was given.
    pub fn alias(&self) -> Option<&str> {
        (!self.alias.is_empty()).then_some(self.alias.as_str())
    }

    /// The help text.
    pub fn help_text(&self) -> &str {
        &self.help
    }

    /// The default value, formatted as text.
    pub fn default_text(&self) -> &str {
        &self.default_text
    }

    /// Whether the argument is required.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether the argument was matched during the current parse cycle.
    pub fn is_supplied(&self) -> bool {
        self.supplied
    }

    /// The kind of the bound storage.
    pub fn kind(&self) -> Kind {
        self.binding.kind()
    }

    /// The value currently held by the bound storage, formatted as text.
    pub fn current_value(&self) -> String {
        self.binding.current()
    }

    /// Coerces `value` and writes it through the binding, then marks the
    /// argument supplied.
    pub(crate) fn assign(&mut self, value: &str) -> Result<()> {
        self.binding
            .assign(value)
            .map_err(|reason| Error::InvalidValue {
                name: self.name.clone(),
                value: value.to_string(),
                reason,
            })?;
        self.supplied = true;
        Ok(())
    }

    /// Writes the default through the binding.
    pub(crate) fn apply_default(&self) -> Result<()> {
        self.binding
            .assign(&self.default_text)
            .map_err(|reason| Error::InvalidValue {
                name: self.name.clone(),
                value: self.default_text.clone(),
                reason,
            })
    }

    /// Prepares the argument for a new parse cycle: clears the supplied flag
    /// and, for optional arguments, restores the default. Required arguments
    /// keep their last value.
    pub(crate) fn reset(&mut self) -> Result<()> {
        self.supplied = false;
        if !self.required {
            self.apply_default()?;
        }
        Ok(())
    }
}
