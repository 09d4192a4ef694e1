use super::{CLONE_TIMEOUT, SHUTDOWN_TIMEOUT, builder_id, complete};
use async_trait::async_trait;
use cloudimage_compute::{ComputeError, CustomerImage, ResourceKind, ResourceState};
use cloudimage_core::{ImageArtifact, Result, StateBag, StateKey, Step, StepAction};

/// Shut the temporary server down and clone it into the target image.
///
/// The clone is the run's deliverable, so this step has no cleanup.
#[derive(Debug, Default)]
pub struct CloneServer;

impl CloneServer {
    async fn execute(&mut self, state: &mut StateBag) -> Result<()> {
        let target_image = state.require_build_settings()?.target_image.clone();
        let server = state.require_server()?.clone();
        let client = state.client().clone();

        state.ui().say(&format!(
            "Shutting down server '{}' ('{}')...",
            server.name, server.id
        ));
        client.shutdown_server(&server.id).await?;
        let server = state
            .waiter()
            .wait_for_shutdown(&server.id, SHUTDOWN_TIMEOUT)
            .await?;
        state.ui().message(&format!(
            "Server '{}' ('{}') has been shut down.",
            server.name, server.id
        ));
        state.set_server(server.clone());

        state.ui().say(&format!(
            "Cloning server '{}' ('{}') to customer image '{}'...",
            server.name, server.id, target_image
        ));
        let image_id = client
            .clone_server(
                &server.id,
                &target_image,
                &format!("{} (created by CloudImage)", target_image),
                false,
            )
            .await?;
        state.set_target_image(CustomerImage {
            id: image_id.clone(),
            name: target_image.clone(),
            datacenter_id: server.datacenter_id.clone(),
            state: ResourceState::PendingAdd,
            ..Default::default()
        });

        let image = state
            .waiter()
            .wait_for_deploy(ResourceKind::CustomerImage, &image_id, CLONE_TIMEOUT)
            .await?
            .into_customer_image()
            .ok_or_else(|| {
                ComputeError::InvalidResponse(format!("'{}' is not a customer image", image_id))
            })?;

        state.ui().message(&format!(
            "Cloned server '{}' to customer image '{}' ('{}') in datacenter '{}'.",
            server.name, image.name, image.id, image.datacenter_id
        ));

        let artifact = ImageArtifact::new(image.clone(), builder_id(state)).with_client(client);
        state.set_target_image(image);
        state.set_target_artifact(Box::new(artifact));
        Ok(())
    }
}

#[async_trait]
impl Step for CloneServer {
    fn name(&self) -> &'static str {
        "clone-server"
    }

    fn requires(&self) -> &'static [StateKey] {
        &[StateKey::Config, StateKey::Server]
    }

    fn produces(&self) -> &'static [StateKey] {
        &[StateKey::TargetImage, StateKey::TargetArtifact]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction {
        let result = self.execute(state).await;
        complete(state, result)
    }
}
