//! Subprocess command construction and execution.
//!
//! Commands are assembled from typed [`Argument`]s so that values marked
//! secret are masked whenever a command is logged, while the real process
//! still receives them verbatim.

mod arg;
mod builder;
mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use arg::{ArgKind, Argument, SECRET_MASK};
pub use builder::{CommandBuilder, Invocation};
pub use runner::{CommandRunner, Output, ProcessRunner};
