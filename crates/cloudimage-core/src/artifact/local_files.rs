use super::Artifact;
use crate::error::ArtifactError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// A set of files in a local directory
#[derive(Debug)]
pub struct LocalFilesArtifact {
    base_directory: PathBuf,
    files: Vec<PathBuf>,
    builder_id: String,
    destroyed: bool,
}

impl LocalFilesArtifact {
    pub fn new(
        base_directory: impl Into<PathBuf>,
        files: Vec<PathBuf>,
        builder_id: impl Into<String>,
    ) -> Self {
        Self {
            base_directory: base_directory.into(),
            files,
            builder_id: builder_id.into(),
            destroyed: false,
        }
    }

    /// Every regular file below `directory`, recursively, in sorted order.
    pub fn from_directory(
        directory: impl Into<PathBuf>,
        builder_id: impl Into<String>,
    ) -> std::io::Result<Self> {
        let base_directory = directory.into();
        let mut files = Vec::new();
        collect_files(&base_directory, &mut files)?;
        files.sort();
        Ok(Self::new(base_directory, files, builder_id))
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }
}

fn collect_files(directory: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

impl std::fmt::Display for LocalFilesArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Files in local directory '{}':", self.base_directory.display())?;
        for file in &self.files {
            let relative = file.strip_prefix(&self.base_directory).unwrap_or(file);
            writeln!(f, "- '{}'", relative.display())?;
        }
        Ok(())
    }
}

#[async_trait]
impl Artifact for LocalFilesArtifact {
    fn builder_id(&self) -> &str {
        &self.builder_id
    }

    fn id(&self) -> String {
        self.base_directory.display().to_string()
    }

    fn files(&self) -> &[PathBuf] {
        &self.files
    }

    async fn destroy(&mut self) -> Result<(), ArtifactError> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;

        if tokio::fs::try_exists(&self.base_directory).await? {
            tracing::debug!("Removing '{}'", self.base_directory.display());
            tokio::fs::remove_dir_all(&self.base_directory).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_from_directory_walks_recursively() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("centos7.vmx"), "").unwrap();
        fs::create_dir(temp_dir.path().join("disks")).unwrap();
        fs::write(temp_dir.path().join("disks").join("disk1.vmdk"), "").unwrap();

        let artifact =
            LocalFilesArtifact::from_directory(temp_dir.path(), "mitchellh.vmware").unwrap();

        assert_eq!(artifact.files().len(), 2);
        assert!(artifact.file_with_extension("vmx").is_some());
        assert!(artifact.file_with_extension("ovf").is_none());

        let description = artifact.to_string();
        assert!(description.starts_with(&format!(
            "Files in local directory '{}':\n",
            temp_dir.path().display()
        )));
        assert!(description.contains("- 'centos7.vmx'\n"));
        let nested = Path::new("disks").join("disk1.vmdk");
        assert!(description.contains(&format!("- '{}'\n", nested.display())));
    }

    #[tokio::test]
    async fn test_destroy_removes_directory_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output = temp_dir.path().join("output");
        fs::create_dir(&output).unwrap();
        fs::write(output.join("centos7.ovf"), "").unwrap();

        let mut artifact = LocalFilesArtifact::from_directory(&output, "ddcloud.ovf").unwrap();
        artifact.destroy().await.unwrap();
        assert!(!output.exists());

        // recreated by someone else; a second destroy must not touch it
        fs::create_dir(&output).unwrap();
        artifact.destroy().await.unwrap();
        assert!(output.exists());
    }
}
