use super::ResourceState;
use serde::{Deserialize, Serialize};

/// A CloudControl datacenter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datacenter {
    pub id: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub city: String,

    /// Host name of the datacenter's FTPS endpoint (OVF package transfer)
    #[serde(default)]
    pub ftps_host: String,
}

/// Tenant-isolated virtual network container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDomain {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub datacenter_id: String,

    #[serde(default)]
    pub state: ResourceState,
}

/// Layer-2 segment within a network domain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vlan {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub network_domain_id: String,

    #[serde(default)]
    pub state: ResourceState,
}

/// Private → public IPv4 mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatRule {
    pub id: String,

    #[serde(default)]
    pub network_domain_id: String,

    #[serde(rename = "internalIp")]
    pub internal_ip_address: String,

    #[serde(rename = "externalIp")]
    pub external_ip_address: String,

    #[serde(default)]
    pub state: ResourceState,
}

/// A firewall rule as read back from the control plane
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRule {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub network_domain_id: String,

    #[serde(default)]
    pub action: String,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub state: ResourceState,
}

/// Request body for `network/createFirewallRule`
///
/// Built fluently:
///
/// ```
/// use cloudimage_compute::FirewallRuleConfiguration;
///
/// let rule = FirewallRuleConfiguration::new("packer.abc.inbound", "nd-1")
///     .accept()
///     .match_source_address("203.0.113.10")
///     .match_destination_address("198.51.100.20")
///     .place_first()
///     .enable();
/// assert_eq!(rule.action, "ACCEPT_DECISIVELY");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRuleConfiguration {
    pub network_domain_id: String,

    pub name: String,

    pub action: String,

    pub ip_version: String,

    pub protocol: String,

    pub source: FirewallEndpoint,

    pub destination: FirewallEndpoint,

    pub enabled: bool,

    pub placement: FirewallRulePlacement,
}

impl FirewallRuleConfiguration {
    /// IPv4, any protocol, any source, any destination, disabled, placed last.
    pub fn new(name: impl Into<String>, network_domain_id: impl Into<String>) -> Self {
        Self {
            network_domain_id: network_domain_id.into(),
            name: name.into(),
            action: "DROP".to_string(),
            ip_version: "IPV4".to_string(),
            protocol: "IP".to_string(),
            source: FirewallEndpoint::any(),
            destination: FirewallEndpoint::any(),
            enabled: false,
            placement: FirewallRulePlacement {
                position: "LAST".to_string(),
            },
        }
    }

    pub fn accept(mut self) -> Self {
        self.action = "ACCEPT_DECISIVELY".to_string();
        self
    }

    pub fn match_source_address(mut self, address: impl Into<String>) -> Self {
        self.source = FirewallEndpoint::address(address);
        self
    }

    pub fn match_destination_address(mut self, address: impl Into<String>) -> Self {
        self.destination = FirewallEndpoint::address(address);
        self
    }

    pub fn place_first(mut self) -> Self {
        self.placement.position = "FIRST".to_string();
        self
    }

    pub fn enable(mut self) -> Self {
        self.enabled = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallEndpoint {
    pub ip: FirewallAddress,
}

impl FirewallEndpoint {
    pub fn any() -> Self {
        Self::address("ANY")
    }

    pub fn address(address: impl Into<String>) -> Self {
        Self {
            ip: FirewallAddress {
                address: address.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallAddress {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallRulePlacement {
    pub position: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nat_rule_from_api_json() {
        let json = r#"{
            "id": "nat-1",
            "networkDomainId": "nd-1",
            "internalIp": "10.0.0.7",
            "externalIp": "198.51.100.20",
            "state": "NORMAL"
        }"#;

        let rule: NatRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.internal_ip_address, "10.0.0.7");
        assert_eq!(rule.external_ip_address, "198.51.100.20");
        assert_eq!(rule.state, ResourceState::Normal);
    }

    #[test]
    fn test_firewall_rule_request_shape() {
        let rule = FirewallRuleConfiguration::new("packer.abc.inbound", "nd-1")
            .accept()
            .match_source_address("203.0.113.10")
            .match_destination_address("198.51.100.20")
            .place_first()
            .enable();

        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["source"]["ip"]["address"], "203.0.113.10");
        assert_eq!(value["destination"]["ip"]["address"], "198.51.100.20");
        assert_eq!(value["placement"]["position"], "FIRST");
        assert_eq!(value["ipVersion"], "IPV4");
        assert_eq!(value["enabled"], true);
    }
}
