use super::complete;
use async_trait::async_trait;
use cloudimage_core::{
    BUILDER_ID_OVF, FileTransfer, OvfPackageFiles, Result, StateBag, StateKey, Step, StepAction,
    StepError,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Upload a local OVF package to the datacenter's FTPS host.
///
/// The package must contain a manifest, a descriptor and at least one disk
/// image; otherwise nothing is transferred and every missing kind is named
/// in a single error.
pub struct UploadOvfPackage {
    transfer: Arc<dyn FileTransfer>,
}

impl UploadOvfPackage {
    pub fn new(transfer: Arc<dyn FileTransfer>) -> Self {
        Self { transfer }
    }

    async fn execute(&mut self, state: &mut StateBag) -> Result<()> {
        let source = state.require_source_artifact()?;
        if source.builder_id() != BUILDER_ID_OVF {
            return Err(StepError::UnexpectedArtifact {
                expected: BUILDER_ID_OVF.to_string(),
                actual: source.builder_id().to_string(),
            });
        }

        let package = OvfPackageFiles::classify(source.files());
        let missing = package.missing();
        if !missing.is_empty() {
            return Err(StepError::MissingPackageFiles {
                directory: PathBuf::from(source.id()),
                missing,
            });
        }

        let datacenter = state.require_datacenter()?.clone();
        let files: Vec<PathBuf> = package.all().into_iter().cloned().collect();
        let ui = state.ui().clone();
        let cancel = state.cancel_token().clone();

        ui.say(&format!(
            "Uploading OVF package ({} files) to '{}' in datacenter '{}'...",
            files.len(),
            datacenter.ftps_host,
            datacenter.id
        ));

        for file in &files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());

            ui.message(&format!("Uploading '{}'...", name));
            self.transfer
                .upload(&datacenter.ftps_host, file, &cancel)
                .await?;
            ui.message(&format!("Uploaded '{}'.", name));
        }

        ui.message(&format!(
            "Uploaded OVF package files to datacenter '{}'.",
            datacenter.id
        ));
        Ok(())
    }
}

impl std::fmt::Debug for UploadOvfPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOvfPackage").finish_non_exhaustive()
    }
}

#[async_trait]
impl Step for UploadOvfPackage {
    fn name(&self) -> &'static str {
        "upload-ovf-package"
    }

    fn requires(&self) -> &'static [StateKey] {
        &[StateKey::Datacenter, StateKey::SourceArtifact]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction {
        let result = self.execute(state).await;
        complete(state, result)
    }
}
