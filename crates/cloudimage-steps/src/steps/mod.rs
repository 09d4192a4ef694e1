//! Pipeline steps
//!
//! Each step does its work in an inner `execute` returning a `Result`; the
//! [`Step::run`](cloudimage_core::Step::run) wrapper turns a failure into a
//! recorded error plus [`StepAction::Halt`].

mod clone_server;
mod convert;
mod deploy_server;
mod destroy_server;
mod export;
mod firewall_rule;
mod import;
mod nat_rule;
mod provision;
mod resolve;
mod upload;

pub use clone_server::CloneServer;
pub use convert::ConvertVmxToOvf;
pub use deploy_server::DeployServer;
pub use destroy_server::DestroyServer;
pub use export::ExportCustomerImage;
pub use firewall_rule::CreateFirewallRule;
pub use import::ImportCustomerImage;
pub use nat_rule::CreateNatRule;
pub use provision::Provision;
pub use resolve::{
    CheckTargetImage, ResolveDatacenter, ResolveNetworkDomain, ResolveSourceImage, ResolveVlan,
};
pub use upload::UploadOvfPackage;

use cloudimage_config::BuildSettings;
use cloudimage_core::{BUILDER_ID_IMAGE, Result, StateBag, StepAction};
use std::time::Duration;

pub const DEPLOY_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const CLONE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
pub const FIREWALL_RULE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const EXPORT_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const IMPORT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

fn complete(state: &mut StateBag, result: Result<()>) -> StepAction {
    match result {
        Ok(()) => StepAction::Continue,
        Err(err) => state.halt(err),
    }
}

/// Builder ID recorded for this run, falling back to the image builder's.
fn builder_id(state: &StateBag) -> String {
    state
        .builder_id()
        .cloned()
        .unwrap_or_else(|| BUILDER_ID_IMAGE.to_string())
}

/// Why the temporary server is not exposed publicly, if it is not.
fn exposure_skip_reason(settings: &BuildSettings) -> Option<&'static str> {
    if settings.use_private_ipv4 {
        Some("the configuration specifies 'use_private_ipv4'")
    } else if !settings.exposes_public_address() {
        Some("no communicator is configured")
    } else {
        None
    }
}
