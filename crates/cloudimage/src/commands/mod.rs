pub mod build;
pub mod export;
pub mod import;

use crate::console::ConsoleUi;
use crate::utils;
use cloudimage_compute::CloudControlClient;
use cloudimage_config::AccountSettings;
use cloudimage_core::{Artifact, FileTransfer, PipelineSettings, RunSettings, RunStatus, StateBag};
use cloudimage_steps::{CurlTransfer, Pipeline};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// FTPS client for the account's datacenter file transfers
pub fn transfer_for(account: &AccountSettings) -> Arc<dyn FileTransfer> {
    Arc::new(CurlTransfer::new(&account.mcp_user, &account.mcp_password))
}

/// Run a pipeline against CloudControl and report how it went.
///
/// Ctrl-C cancels the run; cleanup still runs to completion before the
/// process exits.
pub async fn execute(
    account: AccountSettings,
    settings: PipelineSettings,
    pipeline: Pipeline,
    source_artifact: Option<Box<dyn Artifact>>,
    manifest: Option<&Path>,
) -> anyhow::Result<()> {
    let client = Arc::new(CloudControlClient::new(
        &account.mcp_region,
        &account.mcp_user,
        &account.mcp_password,
    ));
    tracing::debug!("Using CloudControl API at {}", client.base_url());

    let cancel = CancellationToken::new();
    let mut state = StateBag::new(client, Arc::new(ConsoleUi))
        .with_config(RunSettings::new(account, settings))
        .with_cancel_token(cancel.clone());
    if let Some(artifact) = source_artifact {
        state.set_source_artifact(artifact);
    }

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupt received. Cleaning up...".yellow());
            cancel.cancel();
        }
    });

    let builder_id = pipeline.builder_id();
    let outcome = pipeline.run(&mut state).await;
    interrupt.abort();

    for failure in &outcome.cleanup_failures {
        eprintln!(
            "{} cleanup of '{}' failed: {}",
            "Warning:".yellow().bold(),
            failure.step,
            failure.error
        );
    }

    match (&outcome.status, outcome.artifact) {
        (RunStatus::Succeeded, Some(artifact)) => {
            println!();
            println!(
                "{}",
                format!("==> Build '{}' finished. The artifact:", builder_id)
                    .green()
                    .bold()
            );
            println!("{}", artifact);

            if let Some(path) = manifest {
                utils::write_manifest(path, artifact.as_ref())?;
                println!("Manifest written to {}", path.display().to_string().cyan());
            }
            Ok(())
        }
        (RunStatus::Succeeded, None) => {
            println!("{}", format!("==> Build '{}' finished.", builder_id).green());
            Ok(())
        }
        (RunStatus::CleanupFailed { step }, artifact) => {
            if let Some(artifact) = artifact {
                println!();
                println!("{}", format!("==> Build '{}' produced:", builder_id).bold());
                println!("{}", artifact);
            }
            eprintln!();
            eprintln!(
                "{}",
                format!("✗ Build '{}' left resources behind", builder_id)
                    .red()
                    .bold()
            );
            eprintln!(
                "  cleanup of '{}' failed; remove the leftover resources by hand",
                step
            );
            std::process::exit(1);
        }
        (RunStatus::Cancelled, _) => {
            eprintln!();
            eprintln!("{}", "✗ Build was cancelled".red().bold());
            std::process::exit(1);
        }
        (RunStatus::Halted { step }, _) => {
            let message = outcome
                .error
                .map(|e| e.user_message())
                .unwrap_or_else(|| format!("step '{}' halted the build", step));
            eprintln!();
            eprintln!("{}", format!("✗ Build '{}' errored", builder_id).red().bold());
            eprintln!("  {}", message);
            std::process::exit(1);
        }
    }
}
