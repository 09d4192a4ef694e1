use super::Artifact;
use crate::error::ArtifactError;
use async_trait::async_trait;
use cloudimage_compute::{ComputeClient, ComputeError, CustomerImage};
use std::path::PathBuf;
use std::sync::Arc;

/// Delete a customer image.
pub async fn destroy_image(client: &dyn ComputeClient, image_id: &str) -> Result<(), ComputeError> {
    tracing::debug!("Deleting customer image '{}'", image_id);
    client.delete_customer_image(image_id).await
}

/// A customer image in CloudControl
pub struct ImageArtifact {
    image: CustomerImage,
    builder_id: String,
    client: Option<Arc<dyn ComputeClient>>,
    destroyed: bool,
}

impl ImageArtifact {
    /// An artifact that cannot delete its image.
    pub fn new(image: CustomerImage, builder_id: impl Into<String>) -> Self {
        Self {
            image,
            builder_id: builder_id.into(),
            client: None,
            destroyed: false,
        }
    }

    /// Allow `destroy` to delete the image through `client`.
    pub fn with_client(mut self, client: Arc<dyn ComputeClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn image(&self) -> &CustomerImage {
        &self.image
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl std::fmt::Debug for ImageArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageArtifact")
            .field("image", &self.image.id)
            .field("builder_id", &self.builder_id)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl std::fmt::Display for ImageArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Customer image '{}' ('{}') in datacenter '{}'.",
            self.image.name, self.image.id, self.image.datacenter_id
        )
    }
}

#[async_trait]
impl Artifact for ImageArtifact {
    fn builder_id(&self) -> &str {
        &self.builder_id
    }

    fn id(&self) -> String {
        self.image.id.clone()
    }

    fn files(&self) -> &[PathBuf] {
        &[]
    }

    async fn destroy(&mut self) -> Result<(), ArtifactError> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;

        match &self.client {
            Some(client) => Ok(destroy_image(client.as_ref(), &self.image.id).await?),
            None => Ok(()),
        }
    }
}
