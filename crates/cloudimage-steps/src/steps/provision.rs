use super::complete;
use crate::provisioner::{ProvisionTarget, Provisioner};
use async_trait::async_trait;
use cloudimage_core::{Result, StateBag, StateKey, Step, StepAction};

/// Run every configured provisioner against the temporary server, in order.
pub struct Provision {
    provisioners: Vec<Box<dyn Provisioner>>,
}

impl Provision {
    pub fn new(provisioners: Vec<Box<dyn Provisioner>>) -> Self {
        Self { provisioners }
    }

    async fn execute(&mut self, state: &mut StateBag) -> Result<()> {
        let server = state.require_server()?;
        if self.provisioners.is_empty() {
            state.ui().message(&format!(
                "No provisioners configured for server '{}'.",
                server.name
            ));
            return Ok(());
        }

        let config = state.require_config()?;
        let target = ProvisionTarget {
            host: state.require_connect_host()?.clone(),
            server_name: server.name.clone(),
            administrator_password: config.token.administrator_password().to_string(),
        };
        let ui = state.ui().clone();
        let cancel = state.cancel_token().clone();

        for provisioner in &self.provisioners {
            ui.say(&format!(
                "Provisioning server '{}' at '{}' with {}...",
                target.server_name,
                target.host,
                provisioner.describe()
            ));
            provisioner.provision(&target, ui.clone(), &cancel).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Provision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let described: Vec<String> = self.provisioners.iter().map(|p| p.describe()).collect();
        f.debug_struct("Provision")
            .field("provisioners", &described)
            .finish()
    }
}

#[async_trait]
impl Step for Provision {
    fn name(&self) -> &'static str {
        "provision"
    }

    fn requires(&self) -> &'static [StateKey] {
        &[StateKey::Config, StateKey::Server, StateKey::ConnectHost]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction {
        let result = self.execute(state).await;
        complete(state, result)
    }
}
