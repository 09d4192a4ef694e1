use super::{DELETE_TIMEOUT, complete};
use async_trait::async_trait;
use cloudimage_compute::ResourceKind;
use cloudimage_core::{Result, StateBag, StateKey, Step, StepAction};

/// Delete the temporary server once the image has been cloned from it.
///
/// Removing the server from the state bag leaves nothing for the deploy
/// step's cleanup to do.
#[derive(Debug, Default)]
pub struct DestroyServer;

impl DestroyServer {
    async fn execute(&mut self, state: &mut StateBag) -> Result<()> {
        let server = state.require_server()?.clone();

        state.ui().say(&format!(
            "Destroying server '{}' ('{}')...",
            server.name, server.id
        ));
        state.client().delete_server(&server.id).await?;
        state
            .waiter()
            .wait_for_delete(ResourceKind::Server, &server.id, DELETE_TIMEOUT)
            .await?;

        state.take_server();
        state.take_connect_host();
        state.ui().message(&format!(
            "Destroyed server '{}' ('{}').",
            server.name, server.id
        ));
        Ok(())
    }
}

#[async_trait]
impl Step for DestroyServer {
    fn name(&self) -> &'static str {
        "destroy-server"
    }

    fn requires(&self) -> &'static [StateKey] {
        &[StateKey::Server]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction {
        let result = self.execute(state).await;
        complete(state, result)
    }
}
