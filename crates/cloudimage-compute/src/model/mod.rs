//! CloudControl resource records
//!
//! Every record mirrors the JSON shape returned by the CloudControl 2.4 API.
//! Records are observed, never asserted: the only way to learn that a server
//! has finished deploying is to fetch it again and look at its `state`.

mod image;
mod network;
mod server;

pub use image::{CustomerImage, Image, ImageImport, OsImage};
pub use network::{
    Datacenter, FirewallAddress, FirewallEndpoint, FirewallRule, FirewallRuleConfiguration,
    FirewallRulePlacement, NatRule, NetworkDomain, Vlan,
};
pub use server::{
    NetworkAdapter, NetworkAdapterConfiguration, NetworkConfiguration, Server, ServerDeployment,
    ServerNetwork,
};

use serde::{Deserialize, Serialize};

/// Kind of a resource whose lifecycle can be polled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Server,
    NatRule,
    FirewallRule,
    CustomerImage,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Server => write!(f, "server"),
            ResourceKind::NatRule => write!(f, "NAT rule"),
            ResourceKind::FirewallRule => write!(f, "firewall rule"),
            ResourceKind::CustomerImage => write!(f, "customer image"),
        }
    }
}

/// Provisioning state reported by the control plane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceState {
    /// Resource is settled and usable
    Normal,
    /// Resource is being created
    PendingAdd,
    /// Resource is being changed (shutdown, clone, export, ...)
    PendingChange,
    /// Resource is being deleted
    PendingDelete,
    FailedAdd,
    FailedChange,
    FailedDelete,
    RequiresSupport,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ResourceState {
    /// Terminal failure states; a resource in one of these will never settle.
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            ResourceState::FailedAdd
                | ResourceState::FailedChange
                | ResourceState::FailedDelete
                | ResourceState::RequiresSupport
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ResourceState::PendingAdd | ResourceState::PendingChange | ResourceState::PendingDelete
        )
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceState::Normal => "NORMAL",
            ResourceState::PendingAdd => "PENDING_ADD",
            ResourceState::PendingChange => "PENDING_CHANGE",
            ResourceState::PendingDelete => "PENDING_DELETE",
            ResourceState::FailedAdd => "FAILED_ADD",
            ResourceState::FailedChange => "FAILED_CHANGE",
            ResourceState::FailedDelete => "FAILED_DELETE",
            ResourceState::RequiresSupport => "REQUIRES_SUPPORT",
            ResourceState::Unknown => "UNKNOWN",
        };
        write!(f, "{}", s)
    }
}

/// Progress of the operation currently running against a resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(default)]
    pub action: Option<String>,

    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Any record the lifecycle waiter can poll
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Server(Server),
    NatRule(NatRule),
    FirewallRule(FirewallRule),
    CustomerImage(CustomerImage),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Server(_) => ResourceKind::Server,
            Resource::NatRule(_) => ResourceKind::NatRule,
            Resource::FirewallRule(_) => ResourceKind::FirewallRule,
            Resource::CustomerImage(_) => ResourceKind::CustomerImage,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Resource::Server(r) => &r.id,
            Resource::NatRule(r) => &r.id,
            Resource::FirewallRule(r) => &r.id,
            Resource::CustomerImage(r) => &r.id,
        }
    }

    /// Display name; NAT rules have none, so their external address stands in.
    pub fn name(&self) -> &str {
        match self {
            Resource::Server(r) => &r.name,
            Resource::NatRule(r) => &r.external_ip_address,
            Resource::FirewallRule(r) => &r.name,
            Resource::CustomerImage(r) => &r.name,
        }
    }

    pub fn state(&self) -> ResourceState {
        match self {
            Resource::Server(r) => r.state,
            Resource::NatRule(r) => r.state,
            Resource::FirewallRule(r) => r.state,
            Resource::CustomerImage(r) => r.state,
        }
    }

    /// Failure reason reported by the control plane, if any
    pub fn failure_reason(&self) -> Option<&str> {
        let progress = match self {
            Resource::Server(r) => r.progress.as_ref(),
            Resource::CustomerImage(r) => r.progress.as_ref(),
            Resource::NatRule(_) | Resource::FirewallRule(_) => None,
        };
        progress.and_then(|p| p.failure_reason.as_deref())
    }

    pub fn into_server(self) -> Option<Server> {
        match self {
            Resource::Server(server) => Some(server),
            _ => None,
        }
    }

    pub fn into_customer_image(self) -> Option<CustomerImage> {
        match self {
            Resource::CustomerImage(image) => Some(image),
            _ => None,
        }
    }

    pub fn into_nat_rule(self) -> Option<NatRule> {
        match self {
            Resource::NatRule(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn into_firewall_rule(self) -> Option<FirewallRule> {
        match self {
            Resource::FirewallRule(rule) => Some(rule),
            _ => None,
        }
    }
}
