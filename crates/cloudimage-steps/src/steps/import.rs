use super::{IMPORT_TIMEOUT, builder_id, complete};
use async_trait::async_trait;
use cloudimage_compute::{ComputeError, CustomerImage, ImageImport, ResourceKind, ResourceState};
use cloudimage_core::{ImageArtifact, Result, StateBag, StateKey, Step, StepAction};

/// Import an uploaded OVF package as a customer image.
#[derive(Debug, Default)]
pub struct ImportCustomerImage;

impl ImportCustomerImage {
    async fn execute(&mut self, state: &mut StateBag) -> Result<()> {
        let settings = state.require_import_settings()?.clone();
        let datacenter_id = state.require_datacenter()?.id.clone();
        let client = state.client().clone();

        let import = ImageImport {
            ovf_package_prefix: settings.ovf_package_prefix.clone(),
            name: settings.target_image.clone(),
            description: format!("{} (created by CloudImage)", settings.target_image),
            datacenter_id: datacenter_id.clone(),
            guest_os_customization: !settings.prevent_guest_os_customization,
        };

        state.ui().say(&format!(
            "Importing OVF package '{}' as customer image '{}' in datacenter '{}'...",
            import.ovf_package_prefix, import.name, datacenter_id
        ));
        let image_id = client.import_customer_image(&import).await?;
        state.set_target_image(CustomerImage {
            id: image_id.clone(),
            name: import.name.clone(),
            datacenter_id: datacenter_id.clone(),
            state: ResourceState::PendingAdd,
            ..Default::default()
        });

        let image = state
            .waiter()
            .wait_for_deploy(ResourceKind::CustomerImage, &image_id, IMPORT_TIMEOUT)
            .await?
            .into_customer_image()
            .ok_or_else(|| {
                ComputeError::InvalidResponse(format!("'{}' is not a customer image", image_id))
            })?;

        state.ui().message(&format!(
            "Imported customer image '{}' ('{}') in datacenter '{}'.",
            image.name, image.id, image.datacenter_id
        ));

        let artifact = ImageArtifact::new(image.clone(), builder_id(state)).with_client(client);
        state.set_target_image(image);
        state.set_target_artifact(Box::new(artifact));
        Ok(())
    }
}

#[async_trait]
impl Step for ImportCustomerImage {
    fn name(&self) -> &'static str {
        "import-customer-image"
    }

    fn requires(&self) -> &'static [StateKey] {
        &[StateKey::Config, StateKey::Datacenter]
    }

    fn produces(&self) -> &'static [StateKey] {
        &[StateKey::TargetImage, StateKey::TargetArtifact]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction {
        let result = self.execute(state).await;
        complete(state, result)
    }
}
