use super::{Progress, ResourceState};
use serde::{Deserialize, Serialize};

/// A deployed server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub datacenter_id: String,

    #[serde(default)]
    pub state: ResourceState,

    /// Is the server powered on?
    #[serde(default)]
    pub started: bool,

    #[serde(default)]
    pub source_image_id: Option<String>,

    #[serde(default, rename = "networkInfo")]
    pub network: ServerNetwork,

    #[serde(default)]
    pub progress: Option<Progress>,
}

impl Server {
    /// Private IPv4 address of the primary network adapter
    pub fn private_ipv4(&self) -> Option<&str> {
        self.network.primary_adapter.private_ipv4.as_deref()
    }

    /// Has the server completed a graceful shutdown?
    pub fn is_shut_down(&self) -> bool {
        self.state == ResourceState::Normal && !self.started
    }
}

/// Network attachment of a deployed server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerNetwork {
    #[serde(default)]
    pub network_domain_id: String,

    #[serde(default, rename = "primaryNic")]
    pub primary_adapter: NetworkAdapter,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAdapter {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub vlan_id: Option<String>,

    #[serde(default)]
    pub private_ipv4: Option<String>,

    #[serde(default)]
    pub ipv6: Option<String>,
}

/// Request body for `server/deployServer`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDeployment {
    pub name: String,

    pub description: String,

    pub image_id: String,

    pub start: bool,

    pub administrator_password: String,

    #[serde(rename = "networkInfo")]
    pub network: NetworkConfiguration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfiguration {
    pub network_domain_id: String,

    #[serde(rename = "primaryNic")]
    pub primary_adapter: NetworkAdapterConfiguration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAdapterConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_ipv4: Option<String>,
}
