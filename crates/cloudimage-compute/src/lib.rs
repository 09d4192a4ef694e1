//! CloudImage compute layer
//!
//! Typed access to the CloudControl API and the lifecycle waiter that turns
//! its asynchronous operations into bounded, cancellable waits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │               cloudimage-steps                   │
//! │        (deploy, NAT, firewall, clone, ...)       │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               cloudimage-compute                 │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          trait ComputeClient              │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │    Waiter    │  │    Model     │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ CloudControl  │ │  FakeCompute  │
//! │  (reqwest)    │ │ (test-utils)  │
//! └───────────────┘ └───────────────┘
//! ```

pub mod client;
pub mod cloudcontrol;
pub mod error;
pub mod model;
pub mod waiter;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use client::ComputeClient;
pub use cloudcontrol::CloudControlClient;
pub use error::{ComputeError, NO_IP_ADDRESS_AVAILABLE, RESOURCE_NOT_FOUND, Result};
pub use model::{
    CustomerImage, Datacenter, FirewallRule, FirewallRuleConfiguration, Image, ImageImport,
    NatRule, NetworkDomain, OsImage, Progress, Resource, ResourceKind, ResourceState, Server,
    ServerDeployment, Vlan,
};
pub use waiter::{DEFAULT_POLL_INTERVAL, Settle, Waiter};
