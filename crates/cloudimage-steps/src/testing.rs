//! Fixtures shared by the unit tests

use cloudimage_compute::testing::{
    FakeCompute, TEST_DATACENTER, TEST_NETWORK_DOMAIN, TEST_OS_IMAGE, TEST_VLAN,
};
use cloudimage_config::{
    AccountSettings, BuildSettings, ExportSettings, ImportSettings, UniquenessToken,
};
use cloudimage_core::{PipelineSettings, RecordingUi, RunSettings, StateBag};
use std::sync::Arc;
use std::time::Duration;

pub const TEST_TOKEN: &str = "tok3n";
pub const TEST_CLIENT_IP: &str = "203.0.113.10";

pub fn build_settings() -> BuildSettings {
    BuildSettings {
        datacenter: TEST_DATACENTER.to_string(),
        network_domain: TEST_NETWORK_DOMAIN.to_string(),
        vlan: TEST_VLAN.to_string(),
        source_image: TEST_OS_IMAGE.to_string(),
        target_image: "img-B".to_string(),
        client_ip: Some(TEST_CLIENT_IP.to_string()),
        ..Default::default()
    }
}

pub fn import_settings() -> ImportSettings {
    ImportSettings {
        datacenter: TEST_DATACENTER.to_string(),
        target_image: "imported".to_string(),
        ovf_package_prefix: "centos7".to_string(),
        ..Default::default()
    }
}

pub fn state_for(
    fake: Arc<FakeCompute>,
    pipeline: PipelineSettings,
) -> (StateBag, Arc<RecordingUi>) {
    let ui = Arc::new(RecordingUi::new());
    let config = RunSettings::new(AccountSettings::new("AU", "packer", "secret"), pipeline)
        .with_token(UniquenessToken::from_string(TEST_TOKEN));
    let state = StateBag::new(fake, ui.clone())
        .with_config(config)
        .with_poll_interval(Duration::from_millis(10));
    (state, ui)
}

pub fn build_state(fake: Arc<FakeCompute>) -> (StateBag, Arc<RecordingUi>) {
    state_for(fake, PipelineSettings::Build(build_settings()))
}

pub fn export_state(fake: Arc<FakeCompute>, source_image: &str) -> (StateBag, Arc<RecordingUi>) {
    state_for(
        fake,
        PipelineSettings::Export(ExportSettings {
            datacenter: TEST_DATACENTER.to_string(),
            source_image: source_image.to_string(),
            ovf_package_prefix: "exported".to_string(),
        }),
    )
}
