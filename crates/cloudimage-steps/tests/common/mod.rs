use async_trait::async_trait;
use cloudimage_compute::testing::{
    FakeCompute, TEST_DATACENTER, TEST_NETWORK_DOMAIN, TEST_OS_IMAGE, TEST_VLAN,
};
use cloudimage_config::{AccountSettings, BuildSettings, ImportSettings, UniquenessToken};
use cloudimage_core::{
    FileTransfer, PipelineSettings, RecordingUi, RunSettings, StateBag, TransferError,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const TOKEN: &str = "tok3n";

#[allow(dead_code)]
pub fn build_settings() -> BuildSettings {
    BuildSettings {
        datacenter: TEST_DATACENTER.to_string(),
        network_domain: TEST_NETWORK_DOMAIN.to_string(),
        vlan: TEST_VLAN.to_string(),
        source_image: TEST_OS_IMAGE.to_string(),
        target_image: "centos7-packer".to_string(),
        client_ip: Some("203.0.113.10".to_string()),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn import_settings(output_dir: &Path) -> ImportSettings {
    ImportSettings {
        datacenter: TEST_DATACENTER.to_string(),
        target_image: "centos7-imported".to_string(),
        ovf_package_prefix: "centos7".to_string(),
        output_dir: Some(output_dir.to_path_buf()),
        ..Default::default()
    }
}

pub fn state(fake: &Arc<FakeCompute>, pipeline: PipelineSettings) -> (StateBag, Arc<RecordingUi>) {
    let ui = Arc::new(RecordingUi::new());
    let config = RunSettings::new(AccountSettings::new("AU", "packer", "secret"), pipeline)
        .with_token(UniquenessToken::from_string(TOKEN));
    let state = StateBag::new(fake.clone(), ui.clone())
        .with_config(config)
        .with_poll_interval(Duration::from_millis(10));
    (state, ui)
}

/// In-memory FTPS host
#[derive(Default)]
pub struct MemoryTransfer {
    files: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MemoryTransfer {
    pub fn files(&self) -> Vec<String> {
        self.files.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileTransfer for MemoryTransfer {
    async fn upload(
        &self,
        _host: &str,
        path: &Path,
        _cancel: &CancellationToken,
    ) -> Result<(), TransferError> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        self.files.lock().unwrap().push(name);
        Ok(())
    }

    async fn list(&self, _host: &str, prefix: &str) -> Result<Vec<String>, TransferError> {
        Ok(self
            .files()
            .into_iter()
            .filter(|f| f.starts_with(prefix))
            .collect())
    }

    async fn delete(&self, _host: &str, name: &str) -> Result<(), TransferError> {
        self.files.lock().unwrap().retain(|f| f != name);
        Ok(())
    }
}
