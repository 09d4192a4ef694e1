use anyhow::Context;
use cloudimage_core::{Artifact, ArtifactRecord};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Log to stderr; `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
}

/// Write the artifact's manifest as pretty-printed JSON.
pub fn write_manifest(path: &Path, artifact: &dyn Artifact) -> anyhow::Result<()> {
    let record = ArtifactRecord::of(artifact);
    let json = serde_json::to_string_pretty(&record)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create '{}'", parent.display()))?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write manifest '{}'", path.display()))?;

    tracing::debug!("Wrote artifact manifest to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudimage_core::{BUILDER_ID_VMWARE, LocalFilesArtifact};

    #[test]
    fn test_write_manifest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let build = temp_dir.path().join("build");
        let artifact = LocalFilesArtifact::new(
            &build,
            vec![build.join("centos7.vmx")],
            BUILDER_ID_VMWARE,
        );

        let path = temp_dir.path().join("out").join("manifest.json");
        write_manifest(&path, &artifact).unwrap();

        let record: ArtifactRecord =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(record.builder_id, BUILDER_ID_VMWARE);
        assert_eq!(record.files, vec![build.join("centos7.vmx")]);
    }
}
