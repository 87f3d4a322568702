//! Typed subprocess arguments.

/// Token printed in place of a secret value.
pub const SECRET_MASK: &str = "******";

/// The shape of a single argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// A literal token, passed as-is.
    Raw,
    /// `-<name> <value>`.
    ShortFlag,
    /// `--<name> <value>`.
    LongFlag,
}

/// One argument of a subprocess invocation.
///
/// Flags always carry a non-empty name and raw tokens never carry one; the
/// constructors are the only way to build an `Argument`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    kind: ArgKind,
    name: Option<String>,
    value: String,
    secret: bool,
}

impl Argument {
    /// A literal token.
    #[must_use]
    pub fn raw(value: impl Into<String>) -> Self {
        Self {
            kind: ArgKind::Raw,
            name: None,
            value: value.into(),
            secret: false,
        }
    }

    /// A short flag with a value, e.g. `-f values.yaml`.
    #[must_use]
    pub fn short(name: &'static str, value: impl Into<String>) -> Self {
        debug_assert!(!name.is_empty(), "flag name must not be empty");
        Self::flag(ArgKind::ShortFlag, name.to_string(), value.into())
    }

    /// A long flag with a value, e.g. `--version 1.2.3`.
    #[must_use]
    pub fn long(name: &'static str, value: impl Into<String>) -> Self {
        debug_assert!(!name.is_empty(), "flag name must not be empty");
        Self::flag(ArgKind::LongFlag, name.to_string(), value.into())
    }

    /// A long flag that is omitted entirely when the value is unset.
    #[must_use]
    pub fn long_opt(name: &'static str, value: Option<impl Into<String>>) -> Option<Self> {
        value.map(|v| Self::long(name, v))
    }

    const fn flag(kind: ArgKind, name: String, value: String) -> Self {
        Self {
            kind,
            name: Some(name),
            value,
            secret: false,
        }
    }

    /// Marks the value as secret so it is masked when rendered.
    #[must_use]
    pub const fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Returns the argument kind.
    #[must_use]
    pub const fn kind(&self) -> ArgKind {
        self.kind
    }

    /// Returns the flag name, `None` for raw tokens.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the literal value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns true if the value must be masked in logs.
    #[must_use]
    pub const fn is_secret(&self) -> bool {
        self.secret
    }

    /// The argv tokens passed to the subprocess.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        self.tokens_with(&self.value)
    }

    /// The tokens shown in logs, with secret values masked.
    #[must_use]
    pub fn rendered_tokens(&self) -> Vec<String> {
        if self.secret {
            self.tokens_with(SECRET_MASK)
        } else {
            self.tokens()
        }
    }

    fn tokens_with(&self, value: &str) -> Vec<String> {
        let name = self.name.as_deref().unwrap_or_default();
        match self.kind {
            ArgKind::Raw => vec![value.to_string()],
            ArgKind::ShortFlag => vec![format!("-{name}"), value.to_string()],
            ArgKind::LongFlag => vec![format!("--{name}"), value.to_string()],
        }
    }
}
