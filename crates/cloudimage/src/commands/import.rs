use anyhow::Context;
use cloudimage_config::CloudImageConfig;
use cloudimage_core::{BUILDER_ID_VMWARE, LocalFilesArtifact, PipelineSettings};
use cloudimage_steps::Pipeline;
use colored::Colorize;
use std::path::Path;

pub async fn handle(
    config: &CloudImageConfig,
    source_dir: &Path,
    manifest: Option<&Path>,
) -> anyhow::Result<()> {
    let (account, settings) = config.import_settings()?;

    if !source_dir.is_dir() {
        anyhow::bail!(
            "Source directory '{}' does not exist or is not a directory",
            source_dir.display()
        );
    }
    let source = LocalFilesArtifact::from_directory(source_dir, BUILDER_ID_VMWARE)
        .with_context(|| format!("Failed to read '{}'", source_dir.display()))?;

    println!(
        "{} '{}' as customer image '{}' in datacenter {}",
        "Importing".blue(),
        source_dir.display().to_string().cyan(),
        settings.target_image.cyan(),
        settings.datacenter.cyan()
    );

    let pipeline = Pipeline::import(&settings, super::transfer_for(&account))
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    super::execute(
        account,
        PipelineSettings::Import(settings),
        pipeline,
        Some(Box::new(source)),
        manifest,
    )
    .await
}
