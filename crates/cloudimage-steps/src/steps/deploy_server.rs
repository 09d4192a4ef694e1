use super::{DELETE_TIMEOUT, DEPLOY_TIMEOUT, complete};
use async_trait::async_trait;
use cloudimage_compute::{
    ComputeError, ResourceKind, ResourceState, Server, ServerDeployment,
    model::{NetworkAdapterConfiguration, NetworkConfiguration},
};
use cloudimage_core::{Result, StateBag, StateKey, Step, StepAction, StepError};

/// Deploy the temporary server the image is built from.
///
/// The server is registered in the state bag as soon as the deployment is
/// accepted, so cleanup removes it even if it never finishes deploying.
#[derive(Debug, Default)]
pub struct DeployServer;

impl DeployServer {
    async fn execute(&mut self, state: &mut StateBag) -> Result<()> {
        let config = state.require_config()?;
        let token = config.token.clone();
        let target_image = state.require_build_settings()?.target_image.clone();
        let network_domain = state.require_network_domain()?.clone();
        let vlan = state.require_vlan()?.clone();
        let image = state.require_source_image()?.clone();

        let mut deployment = ServerDeployment {
            name: token.server_name(),
            description: format!(
                "Temporary server created by CloudImage for image '{}'",
                target_image
            ),
            start: true,
            administrator_password: token.administrator_password().to_string(),
            network: NetworkConfiguration {
                network_domain_id: network_domain.id.clone(),
                primary_adapter: NetworkAdapterConfiguration {
                    vlan_id: Some(vlan.id.clone()),
                    private_ipv4: None,
                },
            },
            ..Default::default()
        };
        image.apply_to(&mut deployment);

        state.ui().say(&format!(
            "Deploying server '{}' from {} image '{}' in network domain '{}' ('{}')...",
            deployment.name,
            image.kind(),
            image.name(),
            network_domain.name,
            network_domain.id
        ));

        let server_id = state.client().deploy_server(&deployment).await?;
        state.set_server(Server {
            id: server_id.clone(),
            name: deployment.name.clone(),
            state: ResourceState::PendingAdd,
            ..Default::default()
        });

        let server = state
            .waiter()
            .wait_for_deploy(ResourceKind::Server, &server_id, DEPLOY_TIMEOUT)
            .await?
            .into_server()
            .ok_or_else(|| ComputeError::InvalidResponse(format!("'{}' is not a server", server_id)))?;

        let private_ipv4 = server
            .private_ipv4()
            .ok_or_else(|| StepError::NotFound {
                kind: "private IPv4 address",
                name: server.name.clone(),
                scope: format!("network domain '{}'", network_domain.name),
            })?
            .to_string();

        state.ui().message(&format!(
            "Server '{}' ('{}') has been deployed with private IPv4 address '{}'.",
            server.name, server.id, private_ipv4
        ));
        state.set_connect_host(private_ipv4);
        state.set_server(server);
        Ok(())
    }
}

#[async_trait]
impl Step for DeployServer {
    fn name(&self) -> &'static str {
        "deploy-server"
    }

    fn requires(&self) -> &'static [StateKey] {
        &[
            StateKey::Config,
            StateKey::NetworkDomain,
            StateKey::Vlan,
            StateKey::SourceImage,
        ]
    }

    fn produces(&self) -> &'static [StateKey] {
        &[StateKey::Server, StateKey::ConnectHost]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction {
        let result = self.execute(state).await;
        complete(state, result)
    }

    async fn cleanup(&mut self, state: &mut StateBag) -> std::result::Result<(), StepError> {
        let Some(server) = state.server().cloned() else {
            return Ok(());
        };

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{ResolveDatacenter, ResolveNetworkDomain, ResolveSourceImage, ResolveVlan};
    use crate::testing::build_state;
    use cloudimage_compute::testing::{FakeCompute, TEST_OS_IMAGE_ID, TEST_VLAN_ID, Then};

    async fn resolved(fake: &std::sync::Arc<FakeCompute>) -> StateBag {
        let (mut state, _ui) = build_state(fake.clone());
        ResolveDatacenter.run(&mut state).await;
        ResolveNetworkDomain.run(&mut state).await;
        ResolveVlan.run(&mut state).await;
        ResolveSourceImage::new().run(&mut state).await;
        state
    }

    #[tokio::test]
    async fn test_deploys_and_waits_until_normal() {
        let fake = std::sync::Arc::new(FakeCompute::seeded());
        fake.set_settle_polls(3);
        let mut state = resolved(&fake).await;

        assert_eq!(DeployServer.run(&mut state).await, StepAction::Continue);

        let server = state.require_server().unwrap().clone();
        assert_eq!(server.name, "packer-build-tok3n");
        assert_eq!(server.state, ResourceState::Normal);
        assert_eq!(server.source_image_id.as_deref(), Some(TEST_OS_IMAGE_ID));
        assert_eq!(
            server.network.primary_adapter.vlan_id.as_deref(),
            Some(TEST_VLAN_ID)
        );
        assert_eq!(fake.poll_count(ResourceKind::Server, &server.id), 4);
        assert_eq!(
            state.connect_host().map(String::as_str),
            server.private_ipv4()
        );
    }

    #[tokio::test]
    async fn test_failed_deploy_is_still_cleaned_up() {
        let fake = std::sync::Arc::new(FakeCompute::seeded());
        fake.set_outcome(ResourceKind::Server, Then::Fail(ResourceState::FailedAdd));
        let mut state = resolved(&fake).await;

        assert_eq!(DeployServer.run(&mut state).await, StepAction::Halt);
        assert!(state.server().is_some());

        DeployServer.cleanup(&mut state).await.unwrap();
        assert!(state.server().is_none());
        assert_eq!(fake.call_count("delete_server"), 1);
        assert!(fake.resources(ResourceKind::Server).is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_without_server_is_noop() {
        let fake = std::sync::Arc::new(FakeCompute::seeded());
        let mut state = resolved(&fake).await;

        DeployServer.cleanup(&mut state).await.unwrap();
        assert_eq!(fake.call_count("delete_server"), 0);
    }
}
