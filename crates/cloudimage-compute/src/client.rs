//! Control-plane client abstraction

use crate::error::Result;
use crate::model::{
    CustomerImage, Datacenter, FirewallRule, FirewallRuleConfiguration, ImageImport, NatRule,
    NetworkDomain, OsImage, Resource, ResourceKind, Server, ServerDeployment, Vlan,
};
use async_trait::async_trait;

/// CloudControl API abstraction
///
/// Every mutating call returns as soon as the control plane has accepted the
/// request, usually with the ID of the affected resource. The change itself
/// happens out of band; use [`crate::Waiter`] to block until it settles.
///
/// Lookups return `Ok(None)` when nothing matches rather than an error.
#[async_trait]
pub trait ComputeClient: Send + Sync {
    async fn get_datacenter(&self, datacenter_id: &str) -> Result<Option<Datacenter>>;

    async fn get_network_domain_by_name(
        &self,
        name: &str,
        datacenter_id: &str,
    ) -> Result<Option<NetworkDomain>>;

    async fn get_vlan_by_name(&self, name: &str, network_domain_id: &str) -> Result<Option<Vlan>>;

    async fn find_os_image(&self, name: &str, datacenter_id: &str) -> Result<Option<OsImage>>;

    async fn find_customer_image(
        &self,
        name: &str,
        datacenter_id: &str,
    ) -> Result<Option<CustomerImage>>;

    async fn get_customer_image(&self, image_id: &str) -> Result<Option<CustomerImage>>;

    /// Deploy a new server; returns the server ID.
    async fn deploy_server(&self, deployment: &ServerDeployment) -> Result<String>;

    async fn get_server(&self, server_id: &str) -> Result<Option<Server>>;

    /// Request a graceful shutdown.
    async fn shutdown_server(&self, server_id: &str) -> Result<()>;

    async fn delete_server(&self, server_id: &str) -> Result<()>;

    /// Clone a (stopped) server into a customer image; returns the image ID.
    async fn clone_server(
        &self,
        server_id: &str,
        image_name: &str,
        image_description: &str,
        prevent_guest_os_customization: bool,
    ) -> Result<String>;

    /// Map a private address to a public one; `None` lets the control plane
    /// pick a free public address. Returns the NAT rule ID.
    async fn add_nat_rule(
        &self,
        network_domain_id: &str,
        internal_ip_address: &str,
        external_ip_address: Option<&str>,
    ) -> Result<String>;

    async fn get_nat_rule(&self, nat_rule_id: &str) -> Result<Option<NatRule>>;

    async fn delete_nat_rule(&self, nat_rule_id: &str) -> Result<()>;

    /// Allocate a new block of public IPv4 addresses; returns the block ID.
    async fn add_public_ip_block(&self, network_domain_id: &str) -> Result<String>;

    async fn create_firewall_rule(&self, configuration: &FirewallRuleConfiguration)
    -> Result<String>;

    async fn get_firewall_rule(&self, firewall_rule_id: &str) -> Result<Option<FirewallRule>>;

    async fn delete_firewall_rule(&self, firewall_rule_id: &str) -> Result<()>;

    /// Export a customer image to an OVF package on the datacenter's FTPS
    /// host; returns the export ID.
    async fn export_customer_image(&self, image_id: &str, ovf_package_prefix: &str)
    -> Result<String>;

    /// Import an uploaded OVF package as a customer image; returns the image ID.
    async fn import_customer_image(&self, import: &ImageImport) -> Result<String>;

    async fn delete_customer_image(&self, image_id: &str) -> Result<()>;

    /// Fetch the current record of a pollable resource.
    async fn get_resource(&self, kind: ResourceKind, id: &str) -> Result<Option<Resource>> {
        let resource = match kind {
            ResourceKind::Server => self.get_server(id).await?.map(Resource::Server),
            ResourceKind::NatRule => self.get_nat_rule(id).await?.map(Resource::NatRule),
            ResourceKind::FirewallRule => {
                self.get_firewall_rule(id).await?.map(Resource::FirewallRule)
            }
            ResourceKind::CustomerImage => self
                .get_customer_image(id)
                .await?
                .map(Resource::CustomerImage),
        };
        Ok(resource)
    }
}
