//! Assembly of subprocess invocations.

use std::fmt;
use std::path::{Path, PathBuf};

use super::arg::Argument;

/// Accumulates arguments for one program, in order.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: String,
    args: Vec<Argument>,
    current_dir: Option<PathBuf>,
}

/// A fully built, immutable subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<Argument>,
    current_dir: Option<PathBuf>,
}

impl CommandBuilder {
    /// Starts a command for the given program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Appends an argument.
    pub fn add(&mut self, arg: Argument) -> &mut Self {
        self.args.push(arg);
        self
    }

    /// Appends an argument if present.
    pub fn add_opt(&mut self, arg: Option<Argument>) -> &mut Self {
        if let Some(arg) = arg {
            self.args.push(arg);
        }
        self
    }

    /// Appends every argument, keeping their order.
    pub fn extend(&mut self, args: impl IntoIterator<Item = Argument>) -> &mut Self {
        self.args.extend(args);
        self
    }

    /// Runs the command from the given directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Finalizes the invocation.
    #[must_use]
    pub fn build(self) -> Invocation {
        Invocation {
            program: self.program,
            args: self.args,
            current_dir: self.current_dir,
        }
    }
}

impl Invocation {
    /// Returns the program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the arguments in order.
    #[must_use]
    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    /// Returns the working directory, if overridden.
    #[must_use]
    pub fn current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// The literal argv passed to the process, secrets included.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        self.args.iter().flat_map(Argument::tokens).collect()
    }

    /// The loggable form of the command with every secret value masked.
    #[must_use]
    pub fn render(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().flat_map(Argument::rendered_tokens))
            .map(|token| quote(&token))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Quotes a token for display when it would be ambiguous unquoted.
fn quote(token: &str) -> String {
    if token.is_empty() {
        return String::from("''");
    }
    if token.chars().any(char::is_whitespace) {
        return format!("'{}'", token.replace('\'', r"'\''"));
    }
    token.to_string()
}
