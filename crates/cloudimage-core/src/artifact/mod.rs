//! Pipeline outputs
//!
//! An artifact describes what a successful run produced and owns the means
//! to delete it. Destroying is exactly-once: the first call performs the
//! deletion (successful or not), every later call is a no-op.

mod image;
mod local_files;
mod remote_ovf;

pub use image::{ImageArtifact, destroy_image};
pub use local_files::LocalFilesArtifact;
pub use remote_ovf::RemoteOvfPackageArtifact;

use crate::error::ArtifactError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Builder ID of customer images produced by the build and import pipelines
pub const BUILDER_ID_IMAGE: &str = "ddcloud.image";

/// Builder ID of OVF packages, local or remote
pub const BUILDER_ID_OVF: &str = "ddcloud.ovf";

/// Builder ID of local VMware builds accepted by the import pipeline
pub const BUILDER_ID_VMWARE: &str = "mitchellh.vmware";

/// Output of a pipeline run
///
/// `Display` gives the multi-line human-readable description.
#[async_trait]
pub trait Artifact: Send + Sync + std::fmt::Display + std::fmt::Debug {
    fn builder_id(&self) -> &str;

    fn id(&self) -> String;

    /// Local files making up the artifact; empty when it is not file based.
    fn files(&self) -> &[PathBuf];

    /// Delete what the artifact refers to. Safe to call any number of times.
    async fn destroy(&mut self) -> Result<(), ArtifactError>;

    /// First file with the given extension (e.g. `"vmx"`)
    fn file_with_extension(&self, extension: &str) -> Option<&PathBuf> {
        self.files().iter().find(|f| {
            f.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
    }
}

/// Serialisable snapshot of an artifact, written as the run manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub builder_id: String,
    pub id: String,
    pub files: Vec<PathBuf>,
    pub description: String,
}

impl ArtifactRecord {
    pub fn of(artifact: &dyn Artifact) -> Self {
        Self {
            builder_id: artifact.builder_id().to_string(),
            id: artifact.id(),
            files: artifact.files().to_vec(),
            description: artifact.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudimage_compute::CustomerImage;

    #[test]
    fn test_record_snapshot() {
        let artifact = ImageArtifact::new(
            CustomerImage {
                id: "img-1".to_string(),
                name: "img-B".to_string(),
                datacenter_id: "AU9".to_string(),
                ..Default::default()
            },
            BUILDER_ID_IMAGE,
        );

        let record = ArtifactRecord::of(&artifact);
        assert_eq!(record.builder_id, "ddcloud.image");
        assert_eq!(record.id, "img-1");
        assert!(record.files.is_empty());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["description"], "Customer image 'img-B' ('img-1') in datacenter 'AU9'.");
    }
}
