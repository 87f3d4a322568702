//! Recording runner used by orchestration tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ExecError;

use super::builder::Invocation;
use super::runner::{CommandRunner, Output};

/// One observed call.
#[derive(Debug, Clone)]
pub struct Call {
    /// Literal argv, program first.
    pub argv: Vec<String>,
    /// Redacted rendering.
    pub rendered: String,
    /// Bytes fed to stdin.
    pub stdin: Option<Vec<u8>>,
}

/// Scripted result for calls whose argv starts with a prefix.
struct Rule {
    prefix: Vec<String>,
    outcomes: VecDeque<Result<String, i32>>,
}

/// A [`CommandRunner`] that records calls and replays scripted outcomes.
///
/// Unscripted calls succeed with empty output.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Call>>,
    rules: Mutex<Vec<Rule>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues outcomes for calls starting with `prefix` (program included).
    /// `Ok` carries stdout, `Err` an exit code.
    pub fn script(self, prefix: &[&str], outcomes: Vec<Result<&str, i32>>) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Rule {
                prefix: prefix.iter().map(ToString::to_string).collect(),
                outcomes: outcomes
                    .into_iter()
                    .map(|o| o.map(ToString::to_string))
                    .collect(),
            });
        }
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Calls whose argv starts with `prefix`.
    pub fn calls_matching(&self, prefix: &[&str]) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| starts_with(&c.argv, prefix))
            .collect()
    }
}

fn starts_with(argv: &[String], prefix: &[impl AsRef<str>]) -> bool {
    argv.len() >= prefix.len() && argv.iter().zip(prefix).all(|(a, p)| a == p.as_ref())
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        _capture_output: bool,
        stdin: Option<&[u8]>,
    ) -> Result<Output, ExecError> {
        let mut argv = vec![invocation.program().to_string()];
        argv.extend(invocation.to_args());

        let outcome = self.rules.lock().ok().and_then(|mut rules| {
            rules
                .iter_mut()
                .find(|r| starts_with(&argv, &r.prefix) && !r.outcomes.is_empty())
                .and_then(|r| r.outcomes.pop_front())
        });

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(Call {
                argv,
                rendered: invocation.render(),
                stdin: stdin.map(<[u8]>::to_vec),
            });
        }

        match outcome {
            None => Ok(Output::default()),
            Some(Ok(stdout)) => Ok(Output {
                stdout: stdout.into_bytes(),
                stderr: Vec::new(),
            }),
            Some(Err(code)) => Err(ExecError::Failed {
                program: invocation.program().to_string(),
                exit_code: Some(code),
                stderr: format!("scripted failure {code}"),
            }),
        }
    }
}
