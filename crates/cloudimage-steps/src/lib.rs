//! CloudImage pipeline steps
//!
//! The concrete steps behind the three CloudImage pipelines:
//!
//! - **build**: deploy a temporary server from an OS or customer image,
//!   expose it, provision it, then clone it into a new customer image
//! - **import**: convert a local VMware build to an OVF package with
//!   ovftool, upload it over FTPS and import it as a customer image
//! - **export**: export a customer image to an OVF package on the
//!   datacenter's FTPS host
//!
//! [`Pipeline`] assembles the step lists; the runner in `cloudimage-core`
//! executes them.

pub mod pipeline;
pub mod provisioner;
pub mod steps;
pub mod tool;
pub mod uploader;

#[cfg(test)]
mod testing;

// Re-exports
pub use pipeline::{OVFTOOL, Pipeline};
pub use provisioner::{ProvisionTarget, Provisioner, ShellProvisioner};
pub use tool::{OutputStream, ToolRunner};
pub use uploader::CurlTransfer;
