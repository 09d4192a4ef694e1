use super::Artifact;
use crate::error::ArtifactError;
use crate::transfer::{FileTransfer, is_package_file};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// An OVF package on a datacenter's FTPS host
pub struct RemoteOvfPackageArtifact {
    ftps_host: String,
    package_prefix: String,
    builder_id: String,
    transfer: Option<Arc<dyn FileTransfer>>,
    destroyed: bool,
}

impl RemoteOvfPackageArtifact {
    pub fn new(
        ftps_host: impl Into<String>,
        package_prefix: impl Into<String>,
        builder_id: impl Into<String>,
    ) -> Self {
        Self {
            ftps_host: ftps_host.into(),
            package_prefix: package_prefix.into(),
            builder_id: builder_id.into(),
            transfer: None,
            destroyed: false,
        }
    }

    /// Allow `destroy` to delete the package files through `transfer`.
    pub fn with_transfer(mut self, transfer: Arc<dyn FileTransfer>) -> Self {
        self.transfer = Some(transfer);
        self
    }

    pub fn ftps_host(&self) -> &str {
        &self.ftps_host
    }

    pub fn package_prefix(&self) -> &str {
        &self.package_prefix
    }
}

impl std::fmt::Debug for RemoteOvfPackageArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteOvfPackageArtifact")
            .field("ftps_host", &self.ftps_host)
            .field("package_prefix", &self.package_prefix)
            .field("builder_id", &self.builder_id)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl std::fmt::Display for RemoteOvfPackageArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OVF package with prefix '{}' on FTPS host '{}'.",
            self.package_prefix, self.ftps_host
        )
    }
}

#[async_trait]
impl Artifact for RemoteOvfPackageArtifact {
    fn builder_id(&self) -> &str {
        &self.builder_id
    }

    fn id(&self) -> String {
        format!("{}/{}", self.ftps_host, self.package_prefix)
    }

    fn files(&self) -> &[PathBuf] {
        &[]
    }

    async fn destroy(&mut self) -> Result<(), ArtifactError> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;

        let Some(transfer) = &self.transfer else {
            return Ok(());
        };

        let names = transfer.list(&self.ftps_host, &self.package_prefix).await?;
        for name in names
            .into_iter()
            .filter(|name| is_package_file(name, &self.package_prefix))
        {
            tracing::debug!("Deleting '{}' from {}", name, self.ftps_host);
            transfer.delete(&self.ftps_host, &name).await?;
        }
        Ok(())
    }
}
