use super::{EXPORT_TIMEOUT, builder_id, complete};
use async_trait::async_trait;
use cloudimage_compute::{Image, ResourceKind};
use cloudimage_core::{
    FileTransfer, RemoteOvfPackageArtifact, Result, StateBag, StateKey, Step, StepAction,
    StepError,
};
use std::sync::Arc;

/// Export a customer image to an OVF package on the datacenter's FTPS host.
#[derive(Default)]
pub struct ExportCustomerImage {
    transfer: Option<Arc<dyn FileTransfer>>,
}

impl ExportCustomerImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the resulting artifact delete the exported package when destroyed.
    pub fn with_transfer(mut self, transfer: Arc<dyn FileTransfer>) -> Self {
        self.transfer = Some(transfer);
        self
    }

    async fn execute(&mut self, state: &mut StateBag) -> Result<()> {
        let prefix = state.require_export_settings()?.ovf_package_prefix.clone();
        let datacenter = state.require_datacenter()?.clone();
        let image = match state.require_source_image()? {
            Image::Customer(image) => image.clone(),
            other => {
                return Err(StepError::NotFound {
                    kind: "customer image",
                    name: other.name().to_string(),
                    scope: format!("datacenter '{}'", datacenter.id),
                });
            }
        };

        state.ui().say(&format!(
            "Exporting customer image '{}' ('{}') to OVF package '{}'...",
            image.name, image.id, prefix
        ));
        let export_id = state
            .client()
            .export_customer_image(&image.id, &prefix)
            .await?;
        tracing::debug!("Export '{}' of image '{}' accepted", export_id, image.id);

        state
            .waiter()
            .wait_for_change(ResourceKind::CustomerImage, &image.id, "export", EXPORT_TIMEOUT)
            .await?;

        state.ui().message(&format!(
            "Exported customer image '{}' to '{}/{}'.",
            image.name, datacenter.ftps_host, prefix
        ));

        let mut artifact =
            RemoteOvfPackageArtifact::new(&datacenter.ftps_host, &prefix, builder_id(state));
        if let Some(transfer) = &self.transfer {
            artifact = artifact.with_transfer(transfer.clone());
        }
        state.set_target_artifact(Box::new(artifact));
        Ok(())
    }
}

impl std::fmt::Debug for ExportCustomerImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportCustomerImage")
            .field("with_transfer", &self.transfer.is_some())
            .finish()
    }
}

#[async_trait]
impl Step for ExportCustomerImage {
    fn name(&self) -> &'static str {
        "export-customer-image"
    }

    fn requires(&self) -> &'static [StateKey] {
        &[StateKey::Config, StateKey::Datacenter, StateKey::SourceImage]
    }

    fn produces(&self) -> &'static [StateKey] {
        &[StateKey::TargetArtifact]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction {
        let result = self.execute(state).await;
        complete(state, result)
    }
}
