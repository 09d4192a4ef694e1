//! Pipeline assembly
//!
//! The three pipelines differ only in their step lists and in the builder ID
//! stamped on the artifact they leave behind.

use crate::provisioner::{Provisioner, ShellProvisioner};
use crate::steps::{
    CheckTargetImage, CloneServer, ConvertVmxToOvf, CreateFirewallRule, CreateNatRule,
    DeployServer, DestroyServer, ExportCustomerImage, ImportCustomerImage, Provision,
    ResolveDatacenter, ResolveNetworkDomain, ResolveSourceImage, ResolveVlan, UploadOvfPackage,
};
use crate::tool::ToolRunner;
use cloudimage_config::{BuildSettings, ImportSettings};
use cloudimage_core::{
    BUILDER_ID_IMAGE, BUILDER_ID_OVF, FileTransfer, PipelineSettings, Result, RunOutcome, Runner,
    StateBag, Step,
};
use std::path::Path;
use std::sync::Arc;

/// Default ovftool executable, looked up on PATH
pub const OVFTOOL: &str = "ovftool";

/// An ordered list of steps plus the builder ID of what they produce
pub struct Pipeline {
    builder_id: &'static str,
    runner: Runner,
}

impl Pipeline {
    fn new(builder_id: &'static str, steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            builder_id,
            runner: Runner::new(steps),
        }
    }

    /// Deploy a temporary server, provision it and clone it into a customer image.
    pub fn build(settings: &BuildSettings) -> Self {
        let provisioners: Vec<Box<dyn Provisioner>> = settings
            .provisioners
            .iter()
            .map(|command| Box::new(ShellProvisioner::new(command)) as Box<dyn Provisioner>)
            .collect();

        Self::new(
            BUILDER_ID_IMAGE,
            vec![
                Box::new(ResolveDatacenter),
                Box::new(CheckTargetImage),
                Box::new(ResolveNetworkDomain),
                Box::new(ResolveVlan),
                Box::new(ResolveSourceImage::new()),
                Box::new(DeployServer),
                Box::new(CreateNatRule),
                Box::new(CreateFirewallRule),
                Box::new(Provision::new(provisioners)),
                Box::new(CloneServer),
                Box::new(DestroyServer),
            ],
        )
    }

    /// Convert a local VMware build to OVF, upload it and import it.
    ///
    /// ovftool is located here, before anything touches the cloud.
    pub async fn import(
        settings: &ImportSettings,
        transfer: Arc<dyn FileTransfer>,
    ) -> Result<Self> {
        let ovftool = match &settings.ovftool_path {
            Some(path) => ToolRunner::locate(path).await?,
            None => ToolRunner::locate(Path::new(OVFTOOL)).await?,
        };
        Ok(Self::with_ovftool(ovftool, transfer))
    }

    /// Import pipeline around an already located ovftool.
    pub fn with_ovftool(ovftool: ToolRunner, transfer: Arc<dyn FileTransfer>) -> Self {
        Self::new(
            BUILDER_ID_IMAGE,
            vec![
                Box::new(ResolveDatacenter),
                Box::new(CheckTargetImage),
                Box::new(ConvertVmxToOvf::new(ovftool)),
                Box::new(UploadOvfPackage::new(transfer)),
                Box::new(ImportCustomerImage),
            ],
        )
    }

    /// Export a customer image to an OVF package on the FTPS host.
    pub fn export(transfer: Option<Arc<dyn FileTransfer>>) -> Self {
        let export = match transfer {
            Some(transfer) => ExportCustomerImage::new().with_transfer(transfer),
            None => ExportCustomerImage::new(),
        };
        Self::new(
            BUILDER_ID_OVF,
            vec![
                Box::new(ResolveDatacenter),
                Box::new(ResolveSourceImage::customer_image_only()),
                Box::new(export),
            ],
        )
    }

    /// The pipeline a run's settings call for.
    pub async fn for_settings(
        settings: &PipelineSettings,
        transfer: Arc<dyn FileTransfer>,
    ) -> Result<Self> {
        match settings {
            PipelineSettings::Build(build) => Ok(Self::build(build)),
            PipelineSettings::Import(import) => Self::import(import, transfer).await,
            PipelineSettings::Export(_) => Ok(Self::export(Some(transfer))),
        }
    }

    pub fn builder_id(&self) -> &'static str {
        self.builder_id
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.runner.step_names()
    }

    /// Run every step, then clean up after them.
    pub async fn run(mut self, state: &mut StateBag) -> RunOutcome {
        state.set_builder_id(self.builder_id.to_string());
        tracing::info!(
            "Running pipeline '{}' ({} steps)",
            self.builder_id,
            self.runner.step_names().len()
        );
        self.runner.run(state).await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("builder_id", &self.builder_id)
            .field("steps", &self.step_names())
            .finish()
    }
}
