//! Provisioners configure the temporary server before it is cloned

use crate::tool::{OutputStream, ToolRunner};
use async_trait::async_trait;
use cloudimage_core::{Result, StepError, Ui};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const HOST_ENV: &str = "CLOUDIMAGE_HOST";
pub const SERVER_NAME_ENV: &str = "CLOUDIMAGE_SERVER_NAME";
pub const ADMIN_PASSWORD_ENV: &str = "CLOUDIMAGE_ADMIN_PASSWORD";

/// The server a provisioner works on
#[derive(Clone)]
pub struct ProvisionTarget {
    pub host: String,
    pub server_name: String,
    pub administrator_password: String,
}

impl std::fmt::Debug for ProvisionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionTarget")
            .field("host", &self.host)
            .field("server_name", &self.server_name)
            .field("administrator_password", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Short description shown in messages
    fn describe(&self) -> String;

    async fn provision(
        &self,
        target: &ProvisionTarget,
        ui: Arc<dyn Ui>,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Runs a local shell command with the target's details in its environment
#[derive(Debug, Clone)]
pub struct ShellProvisioner {
    command: String,
    shell: ToolRunner,
}

impl ShellProvisioner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            shell: ToolRunner::new("sh"),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl Provisioner for ShellProvisioner {
    fn describe(&self) -> String {
        format!("shell command '{}'", self.command)
    }

    async fn provision(
        &self,
        target: &ProvisionTarget,
        ui: Arc<dyn Ui>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let shell = self
            .shell
            .clone()
            .env(HOST_ENV, target.host.as_str())
            .env(SERVER_NAME_ENV, target.server_name.as_str())
            .env(ADMIN_PASSWORD_ENV, target.administrator_password.as_str());

        let result = shell
            .run(&["-c", self.command.as_str()], cancel, |stream, line| match stream {
                OutputStream::Stdout => ui.message(line),
                OutputStream::Stderr => ui.error(line),
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_cancelled() => Err(err),
            Err(err) => Err(StepError::Provision(format!("{}: {}", self.describe(), err))),
        }
    }
}
