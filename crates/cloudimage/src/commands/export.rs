use cloudimage_config::CloudImageConfig;
use cloudimage_core::PipelineSettings;
use cloudimage_steps::Pipeline;
use colored::Colorize;
use std::path::Path;

pub async fn handle(config: &CloudImageConfig, manifest: Option<&Path>) -> anyhow::Result<()> {
    let (account, settings) = config.export_settings()?;

    println!(
        "{} '{}' to OVF package '{}' in datacenter {}",
        "Exporting customer image".blue(),
        settings.source_image.cyan(),
        settings.ovf_package_prefix,
        settings.datacenter.cyan()
    );

    let pipeline = Pipeline::export(Some(super::transfer_for(&account)));
    super::execute(
        account,
        PipelineSettings::Export(settings),
        pipeline,
        None,
        manifest,
    )
    .await
}
