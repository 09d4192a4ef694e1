//! Named lookups that must succeed before anything is created

use super::complete;
use async_trait::async_trait;
use cloudimage_compute::Image;
use cloudimage_core::{PipelineSettings, Result, StateBag, StateKey, Step, StepAction, StepError};

/// Look up the datacenter the pipeline works in.
#[derive(Debug, Default)]
pub struct ResolveDatacenter;

impl ResolveDatacenter {
    async fn execute(&mut self, state: &mut StateBag) -> Result<()> {
        let config = state.require_config()?;
        let datacenter_id = config.datacenter_id().to_string();
        let region = config.account.mcp_region.clone();

        state
            .ui()
            .message(&format!("Resolving datacenter '{}'...", datacenter_id));

        let datacenter = state
            .client()
            .get_datacenter(&datacenter_id)
            .await?
            .ok_or_else(|| StepError::NotFound {
                kind: "datacenter",
                name: datacenter_id.clone(),
                scope: format!("region '{}'", region),
            })?;

        state.ui().message(&format!(
            "Resolved datacenter '{}' ({}).",
            datacenter.id, datacenter.display_name
        ));
        state.set_datacenter(datacenter);
        Ok(())
    }
}

#[async_trait]
impl Step for ResolveDatacenter {
    fn name(&self) -> &'static str {
        "resolve-datacenter"
    }

    fn requires(&self) -> &'static [StateKey] {
        &[StateKey::Config]
    }

    fn produces(&self) -> &'static [StateKey] {
        &[StateKey::Datacenter]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction {
        let result = self.execute(state).await;
        complete(state, result)
    }
}

/// Fail fast if the image a run would create already exists.
#[derive(Debug, Default)]
pub struct CheckTargetImage;

impl CheckTargetImage {
    async fn execute(&mut self, state: &mut StateBag) -> Result<()> {
        let target_image = match &state.require_config()?.pipeline {
            PipelineSettings::Build(settings) => settings.target_image.clone(),
            PipelineSettings::Import(settings) => settings.target_image.clone(),
            PipelineSettings::Export(_) => return Ok(()),
        };
        let datacenter_id = state.require_datacenter()?.id.clone();

        state.ui().message(&format!(
            "Checking that target image '{}' does not already exist...",
            target_image
        ));

        if let Some(existing) = state
            .client()
            .find_customer_image(&target_image, &datacenter_id)
            .await?
        {
            tracing::debug!("Found existing customer image '{}'", existing.id);
            return Err(StepError::TargetImageExists {
                name: target_image,
                datacenter: datacenter_id,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Step for CheckTargetImage {
    fn name(&self) -> &'static str {
        "check-target-image"
    }

    fn requires(&self) -> &'static [StateKey] {
        &[StateKey::Config, StateKey::Datacenter]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction {
        let result = self.execute(state).await;
        complete(state, result)
    }
}

/// Look up the network domain the temporary server is deployed into.
#[derive(Debug, Default)]
pub struct ResolveNetworkDomain;

impl ResolveNetworkDomain {
    async fn execute(&mut self, state: &mut StateBag) -> Result<()> {
        let name = state.require_build_settings()?.network_domain.clone();
        let datacenter_id = state.require_datacenter()?.id.clone();

        state.ui().message(&format!(
            "Resolving network domain '{}' in datacenter '{}'...",
            name, datacenter_id
        ));

        let network_domain = state
            .client()
            .get_network_domain_by_name(&name, &datacenter_id)
            .await?
            .ok_or_else(|| StepError::NotFound {
                kind: "network domain",
                name: name.clone(),
                scope: format!("datacenter '{}'", datacenter_id),
            })?;

        state.ui().message(&format!(
            "Resolved network domain '{}' ('{}').",
            network_domain.name, network_domain.id
        ));
        state.set_network_domain(network_domain);
        Ok(())
    }
}

#[async_trait]
impl Step for ResolveNetworkDomain {
    fn name(&self) -> &'static str {
        "resolve-network-domain"
    }

    fn requires(&self) -> &'static [StateKey] {
        &[StateKey::Config, StateKey::Datacenter]
    }

    fn produces(&self) -> &'static [StateKey] {
        &[StateKey::NetworkDomain]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction {
        let result = self.execute(state).await;
        complete(state, result)
    }
}

/// Look up the VLAN the temporary server's primary adapter attaches to.
#[derive(Debug, Default)]
pub struct ResolveVlan;

impl ResolveVlan {
    async fn execute(&mut self, state: &mut StateBag) -> Result<()> {
        let name = state.require_build_settings()?.vlan.clone();
        let network_domain = state.require_network_domain()?.clone();

        state.ui().message(&format!(
            "Resolving VLAN '{}' in network domain '{}'...",
            name, network_domain.name
        ));

        let vlan = state
            .client()
            .get_vlan_by_name(&name, &network_domain.id)
            .await?
            .ok_or_else(|| StepError::NotFound {
                kind: "VLAN",
                name: name.clone(),
                scope: format!("network domain '{}'", network_domain.name),
            })?;

        state
            .ui()
            .message(&format!("Resolved VLAN '{}' ('{}').", vlan.name, vlan.id));
        state.set_vlan(vlan);
        Ok(())
    }
}

#[async_trait]
impl Step for ResolveVlan {
    fn name(&self) -> &'static str {
        "resolve-vlan"
    }

    fn requires(&self) -> &'static [StateKey] {
        &[StateKey::Config, StateKey::NetworkDomain]
    }

    fn produces(&self) -> &'static [StateKey] {
        &[StateKey::Vlan]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction {
        let result = self.execute(state).await;
        complete(state, result)
    }
}

/// Look up the image a run starts from.
///
/// OS images are tried first, then customer images. Export only accepts a
/// customer image.
#[derive(Debug, Default)]
pub struct ResolveSourceImage {
    require_customer_image: bool,
}

impl ResolveSourceImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn customer_image_only() -> Self {
        Self {
            require_customer_image: true,
        }
    }

    async fn execute(&mut self, state: &mut StateBag) -> Result<()> {
        let name = match &state.require_config()?.pipeline {
            PipelineSettings::Build(settings) => settings.source_image.clone(),
            PipelineSettings::Export(settings) => settings.source_image.clone(),
            PipelineSettings::Import(_) => return Err(StepError::MissingState(StateKey::Config)),
        };
        let datacenter_id = state.require_datacenter()?.id.clone();
        let client = state.client().clone();

        state.ui().message(&format!(
            "Resolving source image '{}' in datacenter '{}'...",
            name, datacenter_id
        ));

        let os_image = if self.require_customer_image {
            None
        } else {
            client.find_os_image(&name, &datacenter_id).await?
        };

        let image = match os_image {
            Some(image) => Image::Os(image),
            None => client
                .find_customer_image(&name, &datacenter_id)
                .await?
                .map(Image::Customer)
                .ok_or_else(|| StepError::NotFound {
                    kind: if self.require_customer_image {
                        "customer image"
                    } else {
                        "source image"
                    },
                    name: name.clone(),
                    scope: format!("datacenter '{}'", datacenter_id),
                })?,
        };

        state.ui().message(&format!(
            "Resolved {} image '{}' ('{}').",
            image.kind(),
            image.name(),
            image.id()
        ));
        state.set_source_image(image);
        Ok(())
    }
}

#[async_trait]
impl Step for ResolveSourceImage {
    fn name(&self) -> &'static str {
        "resolve-source-image"
    }

    fn requires(&self) -> &'static [StateKey] {
        &[StateKey::Config, StateKey::Datacenter]
    }

    fn produces(&self) -> &'static [StateKey] {
        &[StateKey::SourceImage]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction {
        let result = self.execute(state).await;
        complete(state, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{build_settings, build_state, export_state, state_for};
    use cloudimage_compute::testing::{FakeCompute, TEST_DATACENTER, TEST_OS_IMAGE, TEST_OS_IMAGE_ID};
    use cloudimage_compute::{CustomerImage, ResourceState};
    use std::sync::Arc;

    fn image(name: &str) -> CustomerImage {
        CustomerImage {
            id: format!("{}-id", name),
            name: name.to_string(),
            datacenter_id: TEST_DATACENTER.to_string(),
            state: ResourceState::Normal,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_resolves_build_lookups() {
        let fake = Arc::new(FakeCompute::seeded());
        let (mut state, _ui) = build_state(fake.clone());

        assert_eq!(ResolveDatacenter.run(&mut state).await, StepAction::Continue);
        assert_eq!(CheckTargetImage.run(&mut state).await, StepAction::Continue);
        assert_eq!(ResolveNetworkDomain.run(&mut state).await, StepAction::Continue);
        assert_eq!(ResolveVlan.run(&mut state).await, StepAction::Continue);
        assert_eq!(
            ResolveSourceImage::new().run(&mut state).await,
            StepAction::Continue
        );

        assert_eq!(state.require_vlan().unwrap().id, "vlan-1");
        let source = state.require_source_image().unwrap();
        assert_eq!(source.id(), TEST_OS_IMAGE_ID);
        assert_eq!(source.kind(), "OS");
    }

    #[tokio::test]
    async fn test_unknown_datacenter() {
        let fake = Arc::new(FakeCompute::new());
        let (mut state, ui) = build_state(fake);

        assert_eq!(ResolveDatacenter.run(&mut state).await, StepAction::Halt);
        assert_eq!(
            state.error().unwrap().to_string(),
            "Unable to find datacenter 'AU9' in region 'AU'."
        );
        assert_eq!(ui.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_existing_target_image_conflicts() {
        let fake = Arc::new(FakeCompute::seeded().with_customer_image(image("img-B")));
        let (mut state, _ui) = build_state(fake);

        ResolveDatacenter.run(&mut state).await;
        assert_eq!(CheckTargetImage.run(&mut state).await, StepAction::Halt);
        assert!(matches!(
            state.error(),
            Some(StepError::TargetImageExists { name, .. }) if name == "img-B"
        ));
    }

    #[tokio::test]
    async fn test_missing_vlan() {
        let fake = Arc::new(FakeCompute::seeded());
        let mut settings = build_settings();
        settings.vlan = "secondary".to_string();
        let (mut state, _ui) = state_for(fake, PipelineSettings::Build(settings));

        ResolveDatacenter.run(&mut state).await;
        ResolveNetworkDomain.run(&mut state).await;
        assert_eq!(ResolveVlan.run(&mut state).await, StepAction::Halt);
        assert_eq!(
            state.error().unwrap().to_string(),
            "Unable to find VLAN 'secondary' in network domain 'packer-test'."
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_customer_image() {
        let fake = Arc::new(FakeCompute::seeded().with_customer_image(image("golden")));
        let mut settings = build_settings();
        settings.source_image = "golden".to_string();
        let (mut state, _ui) = state_for(fake, PipelineSettings::Build(settings));

        ResolveDatacenter.run(&mut state).await;
        assert_eq!(
            ResolveSourceImage::new().run(&mut state).await,
            StepAction::Continue
        );
        assert_eq!(state.require_source_image().unwrap().kind(), "customer");
    }

    #[tokio::test]
    async fn test_export_requires_customer_image() {
        let fake = Arc::new(FakeCompute::seeded());
        let (mut state, _ui) = export_state(fake.clone(), TEST_OS_IMAGE);

        ResolveDatacenter.run(&mut state).await;
        assert_eq!(
            ResolveSourceImage::customer_image_only().run(&mut state).await,
            StepAction::Halt
        );
        assert!(matches!(
            state.error(),
            Some(StepError::NotFound { kind: "customer image", .. })
        ));
        assert_eq!(fake.call_count("find_os_image"), 0);
    }
}
