use super::{complete, exposure_skip_reason};
use async_trait::async_trait;
use cloudimage_compute::{ComputeError, NatRule};
use cloudimage_core::{Result, StateBag, StateKey, Step, StepAction, StepError};

/// Expose the temporary server on a public IPv4 address.
///
/// When the network domain has no free public address, one new public IP
/// block is allocated and the rule is created again. A second failure is
/// fatal.
#[derive(Debug, Default)]
pub struct CreateNatRule;

impl CreateNatRule {
    async fn execute(&mut self, state: &mut StateBag) -> Result<()> {
        let settings = state.require_build_settings()?;
        let server = state.require_server()?.clone();
        if let Some(reason) = exposure_skip_reason(settings) {
            state.ui().message(&format!(
                "Server '{}' will not be exposed because {}.",
                server.name, reason
            ));
            return Ok(());
        }

        let network_domain = state.require_network_domain()?.clone();
        let private_ipv4 = server
            .private_ipv4()
            .ok_or_else(|| StepError::NotFound {
                kind: "private IPv4 address",
                name: server.name.clone(),
                scope: format!("network domain '{}'", network_domain.name),
            })?
            .to_string();
        let client = state.client().clone();

        state.ui().say(&format!(
            "Creating NAT rule for server '{}' ('{}') with private IPv4 address '{}'...",
            server.name, server.id, private_ipv4
        ));

        let nat_rule_id = match client
            .add_nat_rule(&network_domain.id, &private_ipv4, None)
            .await
        {
            Ok(id) => id,
            Err(err) if err.is_no_ip_address_available() => {
                state.ui().message(&format!(
                    "Network domain '{}' ('{}') has no public IP addresses available; a new block will now be allocated...",
                    network_domain.name, network_domain.id
                ));
                let block_id = client.add_public_ip_block(&network_domain.id).await?;
                state.ui().message(&format!(
                    "Allocated new public IP block '{}' in network domain '{}' ('{}').",
                    block_id, network_domain.name, network_domain.id
                ));

                client
                    .add_nat_rule(&network_domain.id, &private_ipv4, None)
                    .await?
            }
            Err(err) => return Err(err.into()),
        };

        state.set_nat_rule(NatRule {
            id: nat_rule_id.clone(),
            network_domain_id: network_domain.id.clone(),
            internal_ip_address: private_ipv4.clone(),
            ..Default::default()
        });

        let nat_rule = client.get_nat_rule(&nat_rule_id).await?.ok_or_else(|| {
            ComputeError::ResourceNotFound(format!("newly-created NAT rule '{}'", nat_rule_id))
        })?;

        state.ui().message(&format!(
            "Created NAT rule '{}' for server '{}' ('{}') from private IPv4 address '{}' to public IPv4 address '{}'.",
            nat_rule.id,
            server.name,
            server.id,
            nat_rule.internal_ip_address,
            nat_rule.external_ip_address
        ));

        // Provisioners connect through the public address from now on.
        if state.connect_host().map(String::as_str) == Some(nat_rule.internal_ip_address.as_str()) {
            state.set_connect_host(nat_rule.external_ip_address.clone());
        }
        state.set_nat_rule(nat_rule);
        Ok(())
    }
}

#[async_trait]
impl Step for CreateNatRule {
    fn name(&self) -> &'static str {
        "create-nat-rule"
    }

    fn requires(&self) -> &'static [StateKey] {
        &[StateKey::Config, StateKey::NetworkDomain, StateKey::Server]
    }

    fn produces(&self) -> &'static [StateKey] {
        &[StateKey::NatRule]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction {
        let result = self.execute(state).await;
        complete(state, result)
    }

    async fn cleanup(&mut self, state: &mut StateBag) -> std::result::Result<(), StepError> {
        let Some(nat_rule) = state.nat_rule().cloned() else {
            return Ok(());
        };

        state.ui().say(&format!(
            "Destroying NAT rule '{}' ('{}' -> '{}')...",
            nat_rule.id, nat_rule.external_ip_address, nat_rule.internal_ip_address
        ));
        state.client().delete_nat_rule(&nat_rule.id).await?;
        state.take_nat_rule();
        state.ui().message(&format!("Destroyed NAT rule '{}'.", nat_rule.id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{
        DeployServer, ResolveDatacenter, ResolveNetworkDomain, ResolveSourceImage, ResolveVlan,
    };
    use crate::testing::{build_settings, build_state, state_for};
    use cloudimage_compute::testing::FakeCompute;
    use cloudimage_compute::{NO_IP_ADDRESS_AVAILABLE, ResourceKind};
    use cloudimage_core::{PipelineSettings, RecordingUi};
    use std::sync::Arc;

    fn no_ip() -> ComputeError {
        ComputeError::Api {
            code: NO_IP_ADDRESS_AVAILABLE.to_string(),
            message: "No public IPv4 address is available".to_string(),
        }
    }

    async fn deployed(state: &mut StateBag) {
        ResolveDatacenter.run(state).await;
        ResolveNetworkDomain.run(state).await;
        ResolveVlan.run(state).await;
        ResolveSourceImage::new().run(state).await;
        assert_eq!(DeployServer.run(state).await, StepAction::Continue);
    }

    async fn deployed_state(fake: &Arc<FakeCompute>) -> (StateBag, Arc<RecordingUi>) {
        let (mut state, ui) = build_state(fake.clone());
        deployed(&mut state).await;
        (state, ui)
    }

    #[tokio::test]
    async fn test_exposes_server_and_switches_connect_host() {
        let fake = Arc::new(FakeCompute::seeded());
        let (mut state, _ui) = deployed_state(&fake).await;
        let private_ipv4 = state.connect_host().cloned().unwrap();

        assert_eq!(CreateNatRule.run(&mut state).await, StepAction::Continue);

        let nat_rule = state.require_nat_rule().unwrap();
        assert_eq!(nat_rule.internal_ip_address, private_ipv4);
        assert!(nat_rule.external_ip_address.starts_with("198.51.100."));
        assert_eq!(state.connect_host(), Some(&nat_rule.external_ip_address));
        assert!(fake.public_ip_blocks().is_empty());
    }

    #[tokio::test]
    async fn test_allocates_block_and_retries_once() {
        let fake = Arc::new(FakeCompute::seeded());
        let (mut state, ui) = deployed_state(&fake).await;
        fake.fail_next("add_nat_rule", no_ip());

        assert_eq!(CreateNatRule.run(&mut state).await, StepAction::Continue);

        assert_eq!(fake.call_count("add_nat_rule"), 2);
        assert_eq!(fake.call_count("add_public_ip_block"), 1);
        assert!(state.nat_rule().is_some());
        assert!(ui.contains("a new block will now be allocated"));
    }

    #[tokio::test]
    async fn test_second_failure_is_fatal() {
        let fake = Arc::new(FakeCompute::seeded());
        let (mut state, _ui) = deployed_state(&fake).await;
        fake.fail_next("add_nat_rule", no_ip());
        fake.fail_next("add_nat_rule", no_ip());

        assert_eq!(CreateNatRule.run(&mut state).await, StepAction::Halt);

        assert_eq!(fake.call_count("add_nat_rule"), 2);
        assert_eq!(fake.call_count("add_public_ip_block"), 1);
        assert!(state.nat_rule().is_none());
        assert!(state.error().unwrap().to_string().contains(NO_IP_ADDRESS_AVAILABLE));
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let fake = Arc::new(FakeCompute::seeded());
        let (mut state, _ui) = deployed_state(&fake).await;
        fake.fail_next(
            "add_nat_rule",
            ComputeError::Api {
                code: "UNEXPECTED_ERROR".to_string(),
                message: "boom".to_string(),
            },
        );

        assert_eq!(CreateNatRule.run(&mut state).await, StepAction::Halt);
        assert_eq!(fake.call_count("add_nat_rule"), 1);
        assert_eq!(fake.call_count("add_public_ip_block"), 0);
    }

    #[tokio::test]
    async fn test_skipped_for_private_ipv4() {
        let fake = Arc::new(FakeCompute::seeded());
        let mut settings = build_settings();
        settings.use_private_ipv4 = true;
        let (mut state, ui) = state_for(fake.clone(), PipelineSettings::Build(settings));
        deployed(&mut state).await;

        assert_eq!(CreateNatRule.run(&mut state).await, StepAction::Continue);
        assert_eq!(fake.call_count("add_nat_rule"), 0);
        assert!(ui.contains("'use_private_ipv4'"));
    }

    #[tokio::test]
    async fn test_cleanup_deletes_rule_once() {
        let fake = Arc::new(FakeCompute::seeded());
        let (mut state, _ui) = deployed_state(&fake).await;
        CreateNatRule.run(&mut state).await;

        CreateNatRule.cleanup(&mut state).await.unwrap();
        CreateNatRule.cleanup(&mut state).await.unwrap();

        assert_eq!(fake.call_count("delete_nat_rule"), 1);
        assert!(fake.resources(ResourceKind::NatRule).is_empty());
    }
}
