use cloudimage_config::CloudImageConfig;
use cloudimage_core::PipelineSettings;
use cloudimage_steps::Pipeline;
use colored::Colorize;
use std::path::Path;

pub async fn handle(config: &CloudImageConfig, manifest: Option<&Path>) -> anyhow::Result<()> {
    let (account, settings) = config.build_settings()?;

    println!(
        "{} '{}' from '{}' in datacenter {}",
        "Building customer image".blue(),
        settings.target_image.cyan(),
        settings.source_image,
        settings.datacenter.cyan()
    );

    let pipeline = Pipeline::build(&settings);
    super::execute(
        account,
        PipelineSettings::Build(settings),
        pipeline,
        None,
        manifest,
    )
    .await
}
