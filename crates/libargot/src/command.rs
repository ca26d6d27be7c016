//! Commands: named-argument registration, parsing and reset.
//!
//! A [`Command`] is built once, then parsed and reset any number of times.
//! Each parse cycle writes argument values through the bindings registered
//! with it and collects the leftover tokens as positional arguments; a reset
//! prepares the whole sub-command tree for the next cycle.

use std::{
    collections::{BTreeMap, HashMap},
    result,
};

use tracing::debug;

use crate::{
    Error, ParseError, Result,
    arg::NamedArg,
    coerce::{Bindable, Kind, Slot, parse_bool},
};

/// Name of the implicit help flag every command carries.
pub const HELP_NAME: &str = "help";
/// Alias of the implicit help flag.
pub const HELP_ALIAS: &str = "h";

/// A command with named arguments, positional arguments and sub-commands.
#[derive(Debug)]
pub struct Command {
    /// Command name.
    name: String,
    /// Command description, shown by help rendering.
    description: String,
    /// Named arguments in registration order.
    args: Vec<NamedArg>,
    /// Maps names and aliases to indices into `args`.
    lookup: HashMap<String, usize>,
    /// Sub-commands by name.
    sub_commands: BTreeMap<String, Self>,
    /// Unnamed arguments collected during the current parse cycle.
    positionals: Vec<String>,
    /// Storage behind the implicit `-h/--help` flag.
    help_requested: Slot<bool>,
    /// Whether the last parse completed successfully.
    parsed: bool,
}

/// Generates the typed registration shorthands.
macro_rules! typed_adders {
    ($($fn_name:ident => $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Registers a `", stringify!($ty), "` argument. See [`Command::add_arg`].")]
            pub fn $fn_name(
                &mut self,
                name: &str,
                alias: &str,
                slot: &Slot<$ty>,
                default: $ty,
                required: bool,
                help: &str,
            ) -> Result<()> {
                self.add_arg(name, alias, slot, default, required, help)
            }
        )*
    };
}

impl Command {
    /// Creates a command with only the implicit help flag registered.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        let help_requested = Slot::new(false);
        let help = NamedArg::new(HELP_NAME, HELP_ALIAS, &help_requested, false)
            .help(format!("Print '{name}' usage information."));
        let lookup = HashMap::from([(HELP_NAME.to_string(), 0), (HELP_ALIAS.to_string(), 0)]);
        Self {
            name,
            description: description.into(),
            args: vec![help],
            lookup,
            sub_commands: BTreeMap::new(),
            positionals: Vec::new(),
            help_requested,
            parsed: false,
        }
    }

    /// The command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The command description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Positional arguments collected by the current parse cycle.
    pub fn positionals(&self) -> &[String] {
        &self.positionals
    }

    /// Whether `-h` or `--help` was given in the current parse cycle.
    pub fn help_requested(&self) -> bool {
        self.help_requested.get()
    }

    /// Whether the last parse cycle completed successfully.
    pub fn parsed(&self) -> bool {
        self.parsed
    }

    /// Named arguments in registration order, help flag first.
    pub fn named_args(&self) -> &[NamedArg] {
        &self.args
    }

    /// Looks up a named argument by name or alias.
    pub fn arg(&self, key: &str) -> Option<&NamedArg> {
        self.lookup.get(key).map(|&i| &self.args[i])
    }

    /// Looks up a direct sub-command.
    pub fn sub_command(&self, name: &str) -> Option<&Self> {
        self.sub_commands.get(name)
    }

    /// Direct sub-commands, sorted by name.
    pub fn sub_commands(&self) -> impl Iterator<Item = &Self> {
        self.sub_commands.values()
    }

    /// Resolves the command reached by a chain returned from [`Command::parse`].
    pub fn find<S: AsRef<str>>(&self, chain: &[S]) -> Option<&Self> {
        let (first, rest) = chain.split_first()?;
        if first.as_ref() != self.name {
            return None;
        }
        rest.iter()
            .try_fold(self, |cmd, name| cmd.sub_commands.get(name.as_ref()))
    }

    /// Registers a named argument and writes its default through the binding.
    ///
    /// Fails if the name is empty or contains `=`, if the alias equals the
    /// name, or if either is already registered with this command.
    pub fn add_named_arg(&mut self, arg: NamedArg) -> Result<()> {
        let keys: Vec<&str> = [Some(arg.name()), arg.alias()].into_iter().flatten().collect();
        for key in &keys {
            if key.is_empty() || key.contains('=') {
                return Err(Error::InvalidArgumentName((*key).to_string()));
            }
        }
        if arg.alias() == Some(arg.name()) {
            return Err(self.duplicate(arg.name()));
        }
        if let Some(key) = keys.iter().find(|key| self.lookup.contains_key(**key)) {
            return Err(self.duplicate(key));
        }

        arg.apply_default()?;
        let index = self.args.len();
        for key in keys {
            self.lookup.insert(key.to_string(), index);
        }
        self.args.push(arg);
        Ok(())
    }

    /// Registers an argument bound to `slot`, without building a [`NamedArg`]
    /// first. An empty `alias` registers no alias.
    pub fn add_arg<T: Bindable>(
        &mut self,
        name: &str,
        alias: &str,
        slot: &Slot<T>,
        default: T,
        required: bool,
        help: &str,
    ) -> Result<()> {
        let arg = NamedArg::new(name, alias, slot, default).help(help);
        self.add_named_arg(if required { arg.required() } else { arg })
    }

    typed_adders! {
        add_int_arg => isize,
        add_int64_arg => i64,
        add_uint_arg => usize,
        add_uint64_arg => u64,
        add_float64_arg => f64,
        add_bool_arg => bool,
        add_string_arg => String,
    }

    /// Attaches a sub-command. Fails if one with the same name exists.
    pub fn add_sub_command(&mut self, cmd: Self) -> Result<()> {
        if self.sub_commands.contains_key(cmd.name()) {
            return Err(Error::DuplicateSubCommand {
                name: cmd.name,
                command: self.name.clone(),
            });
        }
        self.sub_commands.insert(cmd.name.clone(), cmd);
        Ok(())
    }

    /// Parses `args` (the tokens following the command name).
    ///
    /// If the first token names a sub-command, the rest of the tokens go to
    /// it. On success, returns the chain of command names traversed, root
    /// first. A failed parse may leave earlier bindings and positionals
    /// updated; call [`Command::reset`] before retrying.
    pub fn parse<S: AsRef<str>>(&mut self, args: &[S]) -> result::Result<Vec<String>, ParseError> {
        let mut chain = vec![self.name.clone()];

        let sub = args
            .split_first()
            .and_then(|(first, rest)| Some((self.sub_commands.get_mut(first.as_ref())?, rest)));
        if let Some((sub, rest)) = sub {
            debug!(command = %self.name, sub_command = %sub.name, "dispatching to sub-command");
            return match sub.parse(rest) {
                Ok(sub_chain) => {
                    self.parsed = true;
                    chain.extend(sub_chain);
                    Ok(chain)
                }
                Err(mut e) => {
                    chain.append(&mut e.chain);
                    e.chain = chain;
                    Err(e)
                }
            };
        }

        match self.parse_tokens(args) {
            Ok(()) => {
                self.parsed = true;
                Ok(chain)
            }
            Err(error) => Err(ParseError { chain, error }),
        }
    }

    /// Binds named arguments and collects positionals, then checks that every
    /// required argument was supplied unless help was requested.
    fn parse_tokens<S: AsRef<str>>(&mut self, args: &[S]) -> Result<()> {
        let mut tokens = args.iter().map(AsRef::as_ref).peekable();

        while let Some(token) = tokens.next() {
            let Some(stripped) = token.strip_prefix('-') else {
                self.positionals.push(token.to_string());
                continue;
            };
            let stripped = stripped.strip_prefix('-').unwrap_or(stripped);

            let (index, value) = match stripped.find('=') {
                Some(0) => return Err(Error::MissingArgumentName(token.to_string())),
                Some(eq) => (self.index_of(&stripped[..eq])?, &stripped[eq + 1..]),
                None => {
                    let index = self.index_of(stripped)?;
                    let value = if self.args[index].kind() == Kind::Bool {
                        // A bare flag means true; only a valid boolean literal is
                        // taken from the following token.
                        tokens
                            .next_if(|next| parse_bool(next).is_ok())
                            .unwrap_or("true")
                    } else {
                        tokens
                            .next()
                            .ok_or_else(|| Error::MissingValue(stripped.to_string()))?
                    };
                    (index, value)
                }
            };

            let arg = &mut self.args[index];
            arg.assign(value)?;
            debug!(command = %self.name, arg = arg.name(), value, "bound argument");
        }

        if self.help_requested() {
            return Ok(());
        }
        match self
            .args
            .iter()
            .find(|arg| arg.is_required() && !arg.is_supplied())
        {
            Some(arg) => Err(Error::RequiredArgument(arg.name().to_string())),
            None => Ok(()),
        }
    }

    /// Prepares the command tree for a new parse cycle.
    ///
    /// Clears positionals and supplied flags, restores optional arguments to
    /// their defaults, and recurses into every sub-command. Required
    /// arguments keep their last parsed value.
    pub fn reset(&mut self) -> Result<()> {
        self.positionals.clear();
        self.parsed = false;

        for arg in &mut self.args {
            arg.reset().map_err(|e| Error::Reset {
                command: self.name.clone(),
                source: Box::new(e),
            })?;
        }
        for sub in self.sub_commands.values_mut() {
            sub.reset()?;
        }
        Ok(())
    }

    /// Index of the argument registered under `key`.
    fn index_of(&self, key: &str) -> Result<usize> {
        self.lookup
            .get(key)
            .copied()
            .ok_or_else(|| Error::UnknownArgument(key.to_string()))
    }

    /// Builds the registration error for a colliding name.
    fn duplicate(&self, name: &str) -> Error {
        Error::DuplicateArgument {
            name: name.to_string(),
            command: self.name.clone(),
        }
    }
}
