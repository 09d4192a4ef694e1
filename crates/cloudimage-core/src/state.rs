//! State bag
//!
//! The single mutable record threaded through every step of a run. Each key
//! of the fixed vocabulary has a typed accessor that reports absence as
//! `None`; a value that has been taken or removed reads as absent from then
//! on, so "present" always means "currently valid".

use crate::artifact::Artifact;
use crate::error::StepError;
use crate::step::StepAction;
use crate::ui::Ui;
use cloudimage_compute::{
    ComputeClient, CustomerImage, DEFAULT_POLL_INTERVAL, Datacenter, FirewallRule, Image, NatRule,
    NetworkDomain, Server, Vlan, Waiter,
};
use cloudimage_config::{
    AccountSettings, BuildSettings, ExportSettings, ImportSettings, UniquenessToken,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Keys of the state bag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    Ui,
    Config,
    Client,
    Datacenter,
    NetworkDomain,
    Vlan,
    Server,
    NatRule,
    FirewallRule,
    SourceImage,
    TargetImage,
    SourceArtifact,
    TargetArtifact,
    Error,
    BuilderId,
    /// Address provisioners connect to
    ConnectHost,
}

impl StateKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::Ui => "ui",
            StateKey::Config => "config",
            StateKey::Client => "client",
            StateKey::Datacenter => "datacenter",
            StateKey::NetworkDomain => "network_domain",
            StateKey::Vlan => "vlan",
            StateKey::Server => "server",
            StateKey::NatRule => "nat_rule",
            StateKey::FirewallRule => "firewall_rule",
            StateKey::SourceImage => "source_image",
            StateKey::TargetImage => "target_image",
            StateKey::SourceArtifact => "source_artifact",
            StateKey::TargetArtifact => "target_artifact",
            StateKey::Error => "error",
            StateKey::BuilderId => "builder_id",
            StateKey::ConnectHost => "connect_host",
        }
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings of the pipeline being run
#[derive(Debug, Clone)]
pub enum PipelineSettings {
    Build(BuildSettings),
    Import(ImportSettings),
    Export(ExportSettings),
}

/// Everything a run is configured with
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub account: AccountSettings,
    pub token: UniquenessToken,
    pub pipeline: PipelineSettings,
}

impl RunSettings {
    pub fn new(account: AccountSettings, pipeline: PipelineSettings) -> Self {
        Self {
            account,
            token: UniquenessToken::generate(),
            pipeline,
        }
    }

    pub fn with_token(mut self, token: UniquenessToken) -> Self {
        self.token = token;
        self
    }

    pub fn build(&self) -> Option<&BuildSettings> {
        match &self.pipeline {
            PipelineSettings::Build(settings) => Some(settings),
            _ => None,
        }
    }

    pub fn import(&self) -> Option<&ImportSettings> {
        match &self.pipeline {
            PipelineSettings::Import(settings) => Some(settings),
            _ => None,
        }
    }

    pub fn export(&self) -> Option<&ExportSettings> {
        match &self.pipeline {
            PipelineSettings::Export(settings) => Some(settings),
            _ => None,
        }
    }

    /// Datacenter the pipeline works in
    pub fn datacenter_id(&self) -> &str {
        match &self.pipeline {
            PipelineSettings::Build(s) => &s.datacenter,
            PipelineSettings::Import(s) => &s.datacenter,
            PipelineSettings::Export(s) => &s.datacenter,
        }
    }
}

/// Generates get / set / take / require accessors for an optional slot.
macro_rules! slot {
    ($field:ident: $ty:ty, $key:expr, $set:ident, $take:ident, $require:ident) => {
        pub fn $field(&self) -> Option<&$ty> {
            self.$field.as_ref()
        }

        pub fn $set(&mut self, value: $ty) {
            self.$field = Some(value);
        }

        /// Remove the value; later reads see it as absent.
        pub fn $take(&mut self) -> Option<$ty> {
            self.$field.take()
        }

        pub fn $require(&self) -> Result<&$ty, StepError> {
            self.$field.as_ref().ok_or(StepError::MissingState($key))
        }
    };
}

/// Shared mutable state of one pipeline run
pub struct StateBag {
    ui: Arc<dyn Ui>,
    client: Arc<dyn ComputeClient>,
    cancel: CancellationToken,
    poll_interval: Duration,

    config: Option<RunSettings>,
    datacenter: Option<Datacenter>,
    network_domain: Option<NetworkDomain>,
    vlan: Option<Vlan>,
    server: Option<Server>,
    nat_rule: Option<NatRule>,
    firewall_rule: Option<FirewallRule>,
    source_image: Option<Image>,
    target_image: Option<CustomerImage>,
    source_artifact: Option<Box<dyn Artifact>>,
    target_artifact: Option<Box<dyn Artifact>>,
    builder_id: Option<String>,
    connect_host: Option<String>,
    error: Option<StepError>,
}

impl StateBag {
    pub fn new(client: Arc<dyn ComputeClient>, ui: Arc<dyn Ui>) -> Self {
        Self {
            ui,
            client,
            cancel: CancellationToken::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            config: None,
            datacenter: None,
            network_domain: None,
            vlan: None,
            server: None,
            nat_rule: None,
            firewall_rule: None,
            source_image: None,
            target_image: None,
            source_artifact: None,
            target_artifact: None,
            builder_id: None,
            connect_host: None,
            error: None,
        }
    }

    pub fn with_config(mut self, config: RunSettings) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn ui(&self) -> &Arc<dyn Ui> {
        &self.ui
    }

    pub fn client(&self) -> &Arc<dyn ComputeClient> {
        &self.client
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Swap the cancellation token, returning the old one.
    pub fn replace_cancel_token(&mut self, cancel: CancellationToken) -> CancellationToken {
        std::mem::replace(&mut self.cancel, cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waiter bound to this run's client and cancellation token
    pub fn waiter(&self) -> Waiter {
        Waiter::new(self.client.clone(), self.cancel.clone()).with_poll_interval(self.poll_interval)
    }

    slot!(config: RunSettings, StateKey::Config, set_config, take_config, require_config);
    slot!(datacenter: Datacenter, StateKey::Datacenter, set_datacenter, take_datacenter, require_datacenter);
    slot!(network_domain: NetworkDomain, StateKey::NetworkDomain, set_network_domain, take_network_domain, require_network_domain);
    slot!(vlan: Vlan, StateKey::Vlan, set_vlan, take_vlan, require_vlan);
    slot!(server: Server, StateKey::Server, set_server, take_server, require_server);
    slot!(nat_rule: NatRule, StateKey::NatRule, set_nat_rule, take_nat_rule, require_nat_rule);
    slot!(firewall_rule: FirewallRule, StateKey::FirewallRule, set_firewall_rule, take_firewall_rule, require_firewall_rule);
    slot!(source_image: Image, StateKey::SourceImage, set_source_image, take_source_image, require_source_image);
    slot!(target_image: CustomerImage, StateKey::TargetImage, set_target_image, take_target_image, require_target_image);
    slot!(builder_id: String, StateKey::BuilderId, set_builder_id, take_builder_id, require_builder_id);
    slot!(connect_host: String, StateKey::ConnectHost, set_connect_host, take_connect_host, require_connect_host);

    pub fn source_artifact(&self) -> Option<&dyn Artifact> {
        self.source_artifact.as_deref()
    }

    pub fn set_source_artifact(&mut self, artifact: Box<dyn Artifact>) {
        self.source_artifact = Some(artifact);
    }

    pub fn take_source_artifact(&mut self) -> Option<Box<dyn Artifact>> {
        self.source_artifact.take()
    }

    pub fn require_source_artifact(&self) -> Result<&dyn Artifact, StepError> {
        self.source_artifact()
            .ok_or(StepError::MissingState(StateKey::SourceArtifact))
    }

    pub fn target_artifact(&self) -> Option<&dyn Artifact> {
        self.target_artifact.as_deref()
    }

    pub fn set_target_artifact(&mut self, artifact: Box<dyn Artifact>) {
        self.target_artifact = Some(artifact);
    }

    pub fn take_target_artifact(&mut self) -> Option<Box<dyn Artifact>> {
        self.target_artifact.take()
    }

    /// Settings for a build pipeline
    pub fn require_build_settings(&self) -> Result<&BuildSettings, StepError> {
        self.require_config()?
            .build()
            .ok_or(StepError::MissingState(StateKey::Config))
    }

    /// Settings for an import pipeline
    pub fn require_import_settings(&self) -> Result<&ImportSettings, StepError> {
        self.require_config()?
            .import()
            .ok_or(StepError::MissingState(StateKey::Config))
    }

    /// Settings for an export pipeline
    pub fn require_export_settings(&self) -> Result<&ExportSettings, StepError> {
        self.require_config()?
            .export()
            .ok_or(StepError::MissingState(StateKey::Config))
    }

    pub fn error(&self) -> Option<&StepError> {
        self.error.as_ref()
    }

    /// Record the run's fatal error; the first one recorded wins, later
    /// ones are only logged.
    pub fn record_error(&mut self, err: StepError) {
        match &self.error {
            None => self.error = Some(err),
            Some(first) => {
                tracing::warn!("Additional error after '{}': {}", first, err);
            }
        }
    }

    pub fn take_error(&mut self) -> Option<StepError> {
        self.error.take()
    }

    /// Report `err`, record it as the run error and halt.
    pub fn halt(&mut self, err: impl Into<StepError>) -> StepAction {
        let err = err.into();
        self.ui.error(&err.to_string());
        self.record_error(err);
        StepAction::Halt
    }

    /// Is a value currently stored under `key`?
    pub fn contains(&self, key: StateKey) -> bool {
        match key {
            StateKey::Ui | StateKey::Client => true,
            StateKey::Config => self.config.is_some(),
            StateKey::Datacenter => self.datacenter.is_some(),
            StateKey::NetworkDomain => self.network_domain.is_some(),
            StateKey::Vlan => self.vlan.is_some(),
            StateKey::Server => self.server.is_some(),
            StateKey::NatRule => self.nat_rule.is_some(),
            StateKey::FirewallRule => self.firewall_rule.is_some(),
            StateKey::SourceImage => self.source_image.is_some(),
            StateKey::TargetImage => self.target_image.is_some(),
            StateKey::SourceArtifact => self.source_artifact.is_some(),
            StateKey::TargetArtifact => self.target_artifact.is_some(),
            StateKey::Error => self.error.is_some(),
            StateKey::BuilderId => self.builder_id.is_some(),
            StateKey::ConnectHost => self.connect_host.is_some(),
        }
    }
}

impl std::fmt::Debug for StateBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateBag")
            .field("config", &self.config)
            .field("datacenter", &self.datacenter)
            .field("server", &self.server)
            .field("nat_rule", &self.nat_rule)
            .field("firewall_rule", &self.firewall_rule)
            .field("target_image", &self.target_image)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
