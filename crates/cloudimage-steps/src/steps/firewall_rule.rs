use super::{FIREWALL_RULE_TIMEOUT, complete, exposure_skip_reason};
use async_trait::async_trait;
use cloudimage_compute::{ComputeError, FirewallRule, FirewallRuleConfiguration, ResourceKind};
use cloudimage_core::{Result, StateBag, StateKey, Step, StepAction, StepError};

/// Permit inbound traffic from the client IP to the server's public address.
#[derive(Debug, Default)]
pub struct CreateFirewallRule;

impl CreateFirewallRule {
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

        let client_ip = settings
            .client_ip
            .clone()
            .ok_or(StepError::MissingState(StateKey::Config))?;
        let rule_name = state.require_config()?.token.firewall_rule_name();
        let network_domain_id = state.require_network_domain()?.id.clone();
        let nat_rule = state.require_nat_rule()?.clone();

        state.ui().say(&format!(
            "Creating firewall rule to permit access for server '{}' ('{}') via public IPv4 address '{}'...",
            server.name, server.id, nat_rule.external_ip_address
        ));

        let configuration = FirewallRuleConfiguration::new(&rule_name, &network_domain_id)
            .accept()
            .match_source_address(&client_ip)
            .match_destination_address(&nat_rule.external_ip_address)
            .place_first()
            .enable();

        let rule_id = state.client().create_firewall_rule(&configuration).await?;
        state.set_firewall_rule(FirewallRule {
            id: rule_id.clone(),
            name: rule_name,
            network_domain_id,
            ..Default::default()
        });

        let rule = state
            .waiter()
            .wait_for_deploy(ResourceKind::FirewallRule, &rule_id, FIREWALL_RULE_TIMEOUT)
            .await?
            .into_firewall_rule()
            .ok_or_else(|| {
                ComputeError::InvalidResponse(format!("'{}' is not a firewall rule", rule_id))
            })?;

        state.ui().message(&format!(
            "Created firewall rule '{}' ('{}') permitting '{}' to reach '{}'.",
            rule.name, rule.id, client_ip, nat_rule.external_ip_address
        ));
        state.set_firewall_rule(rule);
        Ok(())
    }
}

#[async_trait]
impl Step for CreateFirewallRule {
    fn name(&self) -> &'static str {
        "create-firewall-rule"
    }

    fn requires(&self) -> &'static [StateKey] {
        &[
            StateKey::Config,
            StateKey::NetworkDomain,
            StateKey::Server,
            StateKey::NatRule,
        ]
    }

    fn produces(&self) -> &'static [StateKey] {
        &[StateKey::FirewallRule]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction {
        let result = self.execute(state).await;
        complete(state, result)
    }

    async fn cleanup(&mut self, state: &mut StateBag) -> std::result::Result<(), StepError> {
        let Some(rule) = state.firewall_rule().cloned() else {
            return Ok(());
        };

        state.ui().say(&format!(
            "Destroying firewall rule '{}' ('{}')...",
            rule.name, rule.id
        ));
        state.client().delete_firewall_rule(&rule.id).await?;
        state.take_firewall_rule();
        state
            .ui()
            .message(&format!("Destroyed firewall rule '{}' ('{}').", rule.name, rule.id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::build_state;
    use cloudimage_compute::testing::FakeCompute;
    use cloudimage_compute::{NatRule, Server};
    use std::sync::Arc;

    fn exposed_state(fake: &Arc<FakeCompute>) -> StateBag {
        let (mut state, _ui) = build_state(fake.clone());
        state.set_network_domain(cloudimage_compute::NetworkDomain {
            id: "nd-1".to_string(),
            name: "packer-test".to_string(),
            ..Default::default()
        });
        state.set_server(Server {
            id: "server-1".to_string(),
            name: "packer-build-tok3n".to_string(),
            ..Default::default()
        });
        state.set_nat_rule(NatRule {
            id: "nat-1".to_string(),
            internal_ip_address: "10.0.0.1".to_string(),
            external_ip_address: "198.51.100.20".to_string(),
            ..Default::default()
        });
        state
    }

    #[tokio::test]
    async fn test_creates_rule_for_client_ip() {
        let fake = Arc::new(FakeCompute::seeded());
        let mut state = exposed_state(&fake);

        assert_eq!(CreateFirewallRule.run(&mut state).await, StepAction::Continue);

        let rule = state.require_firewall_rule().unwrap();
        assert_eq!(rule.name, "packer.tok3n.inbound");
        assert_eq!(rule.action, "ACCEPT_DECISIVELY");
        assert!(rule.enabled);
        assert_eq!(fake.call_count("create_firewall_rule"), 1);
    }

    #[tokio::test]
    async fn test_requires_nat_rule() {
        let fake = Arc::new(FakeCompute::seeded());
        let mut state = exposed_state(&fake);
        state.take_nat_rule();

        assert_eq!(CreateFirewallRule.run(&mut state).await, StepAction::Halt);
        assert!(matches!(
            state.error(),
            Some(StepError::MissingState(StateKey::NatRule))
        ));
        assert_eq!(fake.call_count("create_firewall_rule"), 0);
    }

    #[tokio::test]
    async fn test_cleanup_deletes_rule() {
        let fake = Arc::new(FakeCompute::seeded());
        let mut state = exposed_state(&fake);
        CreateFirewallRule.run(&mut state).await;

        CreateFirewallRule.cleanup(&mut state).await.unwrap();

        assert!(state.firewall_rule().is_none());
        assert!(fake.resources(ResourceKind::FirewallRule).is_empty());
        assert_eq!(fake.call_count("delete_firewall_rule"), 1);
    }
}
