//! Chart repository synchronization.
//!
//! Every configured repository is registered with `helm repo add`, then the
//! local cache is refreshed once with `helm repo update`. The first failure
//! stops the sequence.

use tracing::info;

use crate::command::{Argument, CommandBuilder, CommandRunner, Invocation};
use crate::config::{HelmRepo, SecretValue};
use crate::error::{ConfigError, InstallError, Result};

/// Registers chart repositories and refreshes the repository cache.
pub struct RepositorySynchronizer<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    helm_bin: &'a str,
}

impl<'a, R: CommandRunner + ?Sized> RepositorySynchronizer<'a, R> {
    /// Creates a synchronizer invoking `helm_bin` through `runner`.
    #[must_use]
    pub const fn new(runner: &'a R, helm_bin: &'a str) -> Self {
        Self { runner, helm_bin }
    }

    /// Adds every repository, then runs a single `repo update`.
    ///
    /// # Errors
    ///
    /// Returns an error naming the repository if a credential cannot be
    /// resolved or `repo add` fails, or if `repo update` fails.
    pub async fn sync(&self, repos: &[HelmRepo]) -> Result<()> {
        for repo in repos {
            self.add_repo(repo).await?;
        }
        self.update_repos().await
    }

    /// Registers one repository.
    ///
    /// # Errors
    ///
    /// Returns an error if a credential cannot be resolved or the command
    /// fails.
    pub async fn add_repo(&self, repo: &HelmRepo) -> Result<()> {
        info!("Adding Helm repo: {}", repo.name);
        let invocation = self
            .add_invocation(repo)
            .map_err(|e| InstallError::repository(&repo.name, e))?;

        self.runner
            .run(&invocation, false, None)
            .await
            .map_err(|e| InstallError::repository(&repo.name, e))?;
        Ok(())
    }

    /// Builds the `repo add` invocation with resolved, secret credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the username or password cannot be resolved.
    pub fn add_invocation(&self, repo: &HelmRepo) -> std::result::Result<Invocation, ConfigError> {
        let mut cb = CommandBuilder::new(self.helm_bin);
        cb.add(Argument::raw("repo"))
            .add(Argument::raw("add"))
            .add(Argument::raw(&repo.name))
            .add(Argument::raw(&repo.url));

        if let Some(username) = &repo.username {
            let value = resolve_credential(username, "username", &repo.name)?;
            cb.add(Argument::long("username", value).secret());
        }
        if let Some(password) = &repo.password {
            let value = resolve_credential(password, "password", &repo.name)?;
            cb.add(Argument::long("password", value).secret());
        }

        Ok(cb.build())
    }

    /// Refreshes the local repository cache.
    ///
    /// # Errors
    ///
    /// Returns an error if `repo update` fails.
    pub async fn update_repos(&self) -> Result<()> {
        info!("Updating Helm repos");
        self.runner
            .run(&self.update_invocation(), false, None)
            .await
            .map_err(|source| InstallError::RepositoryUpdate { source })?;
        Ok(())
    }

    /// Builds the `repo update` invocation.
    #[must_use]
    pub fn update_invocation(&self) -> Invocation {
        let mut cb = CommandBuilder::new(self.helm_bin);
        cb.add(Argument::raw("repo")).add(Argument::raw("update"));
        cb.build()
    }
}

fn resolve_credential(
    secret: &SecretValue,
    field: &str,
    repo: &str,
) -> std::result::Result<String, ConfigError> {
    secret.resolve().map_err(|source| ConfigError::UnresolvedSecret {
        what: format!("{field} for repo '{repo}'"),
        source,
    })
}
