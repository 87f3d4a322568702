//! Kubernetes client configuration bootstrap.
//!
//! CI systems usually hand the driver a kube-config as a string secret. When
//! one is given it is written to `~/.kube/config`, replacing whatever is
//! there. A context, when given, is selected with
//! `kubectl config use-context`.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::command::{Argument, CommandBuilder, CommandRunner, Invocation};
use crate::error::{InstallError, Result};

/// Kube-config payload and context supplied for a run.
#[derive(Debug, Clone, Default)]
pub struct KubeSetup {
    /// Full kube-config document to install.
    pub config: Option<String>,
    /// Context to switch to.
    pub context: Option<String>,
}

/// Conventional kube-config location under the user's home directory.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_kubeconfig_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".kube").join("config"))
        .ok_or_else(|| {
            InstallError::KubeConfig {
                message: String::from("cannot determine home directory"),
            }
            .into()
        })
}

impl KubeSetup {
    /// Returns true if there is nothing to do.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.config.is_none() && self.context.is_none()
    }

    /// Writes the kube-config (if any) to `path` and switches context (if
    /// any).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the context switch
    /// fails.
    pub async fn apply<R: CommandRunner + ?Sized>(
        &self,
        runner: &R,
        kubectl_bin: &str,
        path: &Path,
    ) -> Result<()> {
        if let Some(content) = self.config.as_deref().filter(|c| !c.is_empty()) {
            write_kubeconfig(path, content).await?;
        }

        if let Some(context) = self.context.as_deref().filter(|c| !c.is_empty()) {
            info!("Setting Kubernetes context: {context}");
            runner
                .run(&use_context_invocation(kubectl_bin, context), true, None)
                .await
                .map_err(|e| InstallError::KubeConfig {
                    message: format!("could not switch to context '{context}': {e}"),
                })?;
        }

        Ok(())
    }
}

async fn write_kubeconfig(path: &Path, content: &str) -> Result<()> {
    warn!("Writing Kubernetes config to {}, existing file is replaced", path.display());

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| InstallError::KubeConfig {
                message: format!("cannot create {}: {e}", parent.display()),
            })?;
    }

    tokio::fs::write(path, content)
        .await
        .map_err(|e| InstallError::KubeConfig {
            message: format!("cannot write {}: {e}", path.display()),
        })?;
    Ok(())
}

/// `kubectl config use-context <context>`.
#[must_use]
pub fn use_context_invocation(kubectl_bin: &str, context: &str) -> Invocation {
    let mut cb = CommandBuilder::new(kubectl_bin);
    cb.add(Argument::raw("config"))
        .add(Argument::raw("use-context"))
        .add(Argument::raw(context));
    cb.build()
}
