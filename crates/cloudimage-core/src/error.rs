use crate::state::StateKey;
use crate::transfer::{PackageFileKind, TransferError};
use cloudimage_compute::ComputeError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that halt a pipeline
#[derive(Error, Debug)]
pub enum StepError {
    /// A step ran without a value an earlier step should have produced.
    #[error("Required state '{0}' is not available")]
    MissingState(StateKey),

    #[error("Unable to find {kind} '{name}' in {scope}.")]
    NotFound {
        kind: &'static str,
        name: String,
        scope: String,
    },

    #[error("Target image '{name}' already exists in datacenter '{datacenter}'.")]
    TargetImageExists { name: String, datacenter: String },

    #[error("{0}")]
    Compute(#[from] ComputeError),

    #[error("OVF package in '{}' is missing its {}", .directory.display(), join_kinds(.missing))]
    MissingPackageFiles {
        directory: PathBuf,
        missing: Vec<PackageFileKind>,
    },

    #[error("Cannot find '{0}' on PATH")]
    ToolNotFound(String),

    #[error("{tool} exited with {}", .code.map(|c| format!("status {}", c)).unwrap_or_else(|| "no status (killed by signal)".to_string()))]
    ProcessFailed { tool: String, code: Option<i32> },

    #[error("Unexpected artifact type: expected '{expected}', got '{actual}'")]
    UnexpectedArtifact { expected: String, actual: String },

    #[error("Source artifact does not contain a {0} file")]
    MissingArtifactFile(&'static str),

    #[error("Provisioning failed: {0}")]
    Provision(String),

    #[error("{0}")]
    Transfer(#[from] TransferError),

    #[error("{0}")]
    Artifact(#[from] ArtifactError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Build was cancelled")]
    Cancelled,
}

impl StepError {
    /// Was this failure caused by a cancellation request?
    pub fn is_cancelled(&self) -> bool {
        match self {
            StepError::Cancelled => true,
            StepError::Compute(err) => err.is_cancelled(),
            StepError::Transfer(TransferError::Cancelled) => true,
            _ => false,
        }
    }

    /// Message with a hint for the user where one helps.
    pub fn user_message(&self) -> String {
        match self {
            StepError::TargetImageExists { .. } => format!(
                "{}\nChoose a different 'target_image' or delete the existing image first.",
                self
            ),
            StepError::ToolNotFound(tool) => format!(
                "{}\nInstall {} or set its path explicitly in the configuration.",
                self, tool
            ),
            StepError::Compute(ComputeError::Timeout { .. }) => format!(
                "{}\nThe resource may still finish in the background; check the CloudControl portal.",
                self
            ),
            _ => self.to_string(),
        }
    }
}

fn join_kinds(kinds: &[PackageFileKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from destroying an artifact
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("{0}")]
    Compute(#[from] ComputeError),

    #[error("{0}")]
    Transfer(#[from] TransferError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_package_files_names_every_kind() {
        let err = StepError::MissingPackageFiles {
            directory: PathBuf::from("/tmp/pkg"),
            missing: vec![
                PackageFileKind::Manifest,
                PackageFileKind::Descriptor,
                PackageFileKind::Disk,
            ],
        };

        let message = err.to_string();
        assert!(message.contains("manifest (.mf)"));
        assert!(message.contains("descriptor (.ovf)"));
        assert!(message.contains("disk image (.vmdk)"));
    }

    #[test]
    fn test_process_failed_message() {
        let err = StepError::ProcessFailed {
            tool: "ovftool".to_string(),
            code: Some(1),
        };
        assert_eq!(err.to_string(), "ovftool exited with status 1");
    }

    #[test]
    fn test_cancellation_classification() {
        assert!(StepError::Cancelled.is_cancelled());
        assert!(StepError::Compute(ComputeError::Cancelled).is_cancelled());
        assert!(!StepError::Provision("exit 1".to_string()).is_cancelled());
    }

    #[test]
    fn test_user_message_hint() {
        let err = StepError::TargetImageExists {
            name: "img-B".to_string(),
            datacenter: "AU9".to_string(),
        };
        let message = err.user_message();
        assert!(message.starts_with("Target image 'img-B' already exists in datacenter 'AU9'."));
        assert!(message.contains("target_image"));
    }
}
