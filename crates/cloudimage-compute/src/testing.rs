//! In-memory [`ComputeClient`] for tests
//!
//! Resources created through the fake report a pending state for a
//! configurable number of polls before they transition, so waits can be
//! exercised without a control plane.

use crate::client::ComputeClient;
use crate::error::{ComputeError, Result};
use crate::model::{
    CustomerImage, Datacenter, FirewallRule, FirewallRuleConfiguration, ImageImport, NatRule,
    NetworkAdapter, NetworkDomain, OsImage, Progress, Resource, ResourceKind, ResourceState,
    Server, ServerDeployment, ServerNetwork, Vlan,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

pub const TEST_DATACENTER: &str = "AU9";
pub const TEST_FTPS_HOST: &str = "ftps-au9.cloud-au.dimensiondata.com";
pub const TEST_NETWORK_DOMAIN: &str = "packer-test";
pub const TEST_NETWORK_DOMAIN_ID: &str = "nd-1";
pub const TEST_VLAN: &str = "primary";
pub const TEST_VLAN_ID: &str = "vlan-1";
pub const TEST_OS_IMAGE: &str = "CentOS 7 64-bit 2 CPU";
pub const TEST_OS_IMAGE_ID: &str = "os-centos7";

/// What happens to a tracked resource once its pending polls are used up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Then {
    /// State becomes NORMAL.
    Settle,
    /// State becomes NORMAL and the server reports itself stopped.
    ShutDown,
    /// Resource disappears.
    Remove,
    /// State becomes the given failure state.
    Fail(ResourceState),
}

struct Tracked {
    resource: Resource,
    pending: u32,
    then: Then,
    polls: u32,
}

#[derive(Default)]
struct Inner {
    datacenters: Vec<Datacenter>,
    network_domains: Vec<NetworkDomain>,
    vlans: Vec<Vlan>,
    os_images: Vec<OsImage>,
    tracked: HashMap<(ResourceKind, String), Tracked>,
    outcomes: HashMap<ResourceKind, Then>,
    failures: HashMap<String, VecDeque<ComputeError>>,
    settle_polls: u32,
    next_id: u32,
    public_ip_blocks: Vec<String>,
    calls: Vec<String>,
}

impl Inner {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn record(&mut self, operation: &str, detail: &str) -> Result<()> {
        self.calls.push(format!("{} {}", operation, detail));
        match self.failures.get_mut(operation).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn insert(&mut self, resource: Resource, pending: u32, then: Then) {
        let key = (resource.kind(), resource.id().to_string());
        self.tracked.insert(
            key,
            Tracked {
                resource,
                pending,
                then,
                polls: 0,
            },
        );
    }

    fn outcome(&self, kind: ResourceKind) -> Then {
        self.outcomes.get(&kind).cloned().unwrap_or(Then::Settle)
    }

    fn poll(&mut self, kind: ResourceKind, id: &str) -> Option<Resource> {
        let key = (kind, id.to_string());
        let tracked = self.tracked.get_mut(&key)?;
        tracked.polls += 1;

        if tracked.pending > 0 {
            tracked.pending -= 1;
            return Some(tracked.resource.clone());
        }

        match tracked.then.clone() {
            Then::Remove => {
                self.tracked.remove(&key);
                None
            }
            then => {
                apply(&mut tracked.resource, &then);
                Some(tracked.resource.clone())
            }
        }
    }

    /// Start an asynchronous change on an existing resource.
    fn begin(&mut self, kind: ResourceKind, id: &str, state: ResourceState, then: Then) -> Result<()> {
        let pending = self.settle_polls;
        let tracked = self
            .tracked
            .get_mut(&(kind, id.to_string()))
            .ok_or_else(|| ComputeError::ResourceNotFound(format!("{} '{}'", kind, id)))?;

        set_state(&mut tracked.resource, state);
        tracked.pending = pending;
        tracked.then = then;
        Ok(())
    }

    fn peek(&self, kind: ResourceKind, id: &str) -> Option<&Resource> {
        self.tracked.get(&(kind, id.to_string())).map(|t| &t.resource)
    }
}

fn set_state(resource: &mut Resource, state: ResourceState) {
    match resource {
        Resource::Server(r) => r.state = state,
        Resource::NatRule(r) => r.state = state,
        Resource::FirewallRule(r) => r.state = state,
        Resource::CustomerImage(r) => r.state = state,
    }
}

fn apply(resource: &mut Resource, then: &Then) {
    match then {
        Then::Settle => set_state(resource, ResourceState::Normal),
        Then::ShutDown => {
            set_state(resource, ResourceState::Normal);
            if let Resource::Server(server) = resource {
                server.started = false;
            }
        }
        Then::Fail(state) => set_state(resource, *state),
        Then::Remove => {}
    }
}

/// Scriptable in-memory control plane
pub struct FakeCompute {
    inner: Mutex<Inner>,
}

impl Default for FakeCompute {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCompute {
    /// Empty control plane; changes settle after one pending poll.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                settle_polls: 1,
                ..Default::default()
            }),
        }
    }

    /// Control plane with one datacenter, network domain, VLAN and OS image.
    pub fn seeded() -> Self {
        Self::new()
            .with_datacenter(Datacenter {
                id: TEST_DATACENTER.to_string(),
                display_name: "Australia 9".to_string(),
                city: "Sydney".to_string(),
                ftps_host: TEST_FTPS_HOST.to_string(),
            })
            .with_network_domain(NetworkDomain {
                id: TEST_NETWORK_DOMAIN_ID.to_string(),
                name: TEST_NETWORK_DOMAIN.to_string(),
                datacenter_id: TEST_DATACENTER.to_string(),
                state: ResourceState::Normal,
            })
            .with_vlan(Vlan {
                id: TEST_VLAN_ID.to_string(),
                name: TEST_VLAN.to_string(),
                network_domain_id: TEST_NETWORK_DOMAIN_ID.to_string(),
                state: ResourceState::Normal,
            })
            .with_os_image(OsImage {
                id: TEST_OS_IMAGE_ID.to_string(),
                name: TEST_OS_IMAGE.to_string(),
                description: "CentOS Release 7 64-bit".to_string(),
                datacenter_id: TEST_DATACENTER.to_string(),
            })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_datacenter(self, datacenter: Datacenter) -> Self {
        self.lock().datacenters.push(datacenter);
        self
    }

    pub fn with_network_domain(self, network_domain: NetworkDomain) -> Self {
        self.lock().network_domains.push(network_domain);
        self
    }

    pub fn with_vlan(self, vlan: Vlan) -> Self {
        self.lock().vlans.push(vlan);
        self
    }

    pub fn with_os_image(self, image: OsImage) -> Self {
        self.lock().os_images.push(image);
        self
    }

    /// Add an existing, settled customer image.
    pub fn with_customer_image(self, image: CustomerImage) -> Self {
        self.lock()
            .insert(Resource::CustomerImage(image), 0, Then::Settle);
        self
    }

    /// Number of pending polls each new change goes through before settling.
    pub fn set_settle_polls(&self, polls: u32) {
        self.lock().settle_polls = polls;
    }

    /// Outcome of changes started on resources of `kind` from now on.
    pub fn set_outcome(&self, kind: ResourceKind, then: Then) {
        self.lock().outcomes.insert(kind, then);
    }

    /// Make the next call to `operation` (e.g. `"add_nat_rule"`) fail.
    ///
    /// Queued failures are consumed in order, one per call.
    pub fn fail_next(&self, operation: &str, error: ComputeError) {
        self.lock()
            .failures
            .entry(operation.to_string())
            .or_default()
            .push_back(error);
    }

    /// Track an arbitrary resource.
    pub fn track(&self, resource: Resource, pending: u32, then: Then) {
        self.lock().insert(resource, pending, then);
    }

    /// How many times the resource has been fetched
    pub fn poll_count(&self, kind: ResourceKind, id: &str) -> u32 {
        self.lock()
            .tracked
            .get(&(kind, id.to_string()))
            .map(|t| t.polls)
            .unwrap_or(0)
    }

    /// Every call made so far, formatted as `"<operation> <detail>"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of calls made to `operation`
    pub fn call_count(&self, operation: &str) -> usize {
        let prefix = format!("{} ", operation);
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    pub fn public_ip_blocks(&self) -> Vec<String> {
        self.lock().public_ip_blocks.clone()
    }

    /// Current view of every tracked resource of `kind`, without counting a poll.
    pub fn resources(&self, kind: ResourceKind) -> Vec<Resource> {
        let mut resources: Vec<Resource> = self
            .lock()
            .tracked
            .values()
            .filter(|t| t.resource.kind() == kind)
            .map(|t| t.resource.clone())
            .collect();
        resources.sort_by(|a, b| a.id().cmp(b.id()));
        resources
    }

    pub fn server(&self, id: &str) -> Option<Server> {
        self.lock()
            .peek(ResourceKind::Server, id)
            .cloned()
            .and_then(Resource::into_server)
    }

    pub fn customer_image(&self, id: &str) -> Option<CustomerImage> {
        self.lock()
            .peek(ResourceKind::CustomerImage, id)
            .cloned()
            .and_then(Resource::into_customer_image)
    }

    pub fn nat_rule(&self, id: &str) -> Option<NatRule> {
        self.lock()
            .peek(ResourceKind::NatRule, id)
            .cloned()
            .and_then(Resource::into_nat_rule)
    }

    pub fn firewall_rule(&self, id: &str) -> Option<FirewallRule> {
        self.lock()
            .peek(ResourceKind::FirewallRule, id)
            .cloned()
            .and_then(Resource::into_firewall_rule)
    }
}

#[async_trait]
impl ComputeClient for FakeCompute {
    async fn get_datacenter(&self, datacenter_id: &str) -> Result<Option<Datacenter>> {
        let mut inner = self.lock();
        inner.record("get_datacenter", datacenter_id)?;
        Ok(inner.datacenters.iter().find(|d| d.id == datacenter_id).cloned())
    }

    async fn get_network_domain_by_name(
        &self,
        name: &str,
        datacenter_id: &str,
    ) -> Result<Option<NetworkDomain>> {
        let mut inner = self.lock();
        inner.record("get_network_domain_by_name", name)?;
        Ok(inner
            .network_domains
            .iter()
            .find(|nd| nd.name == name && nd.datacenter_id == datacenter_id)
            .cloned())
    }

    async fn get_vlan_by_name(&self, name: &str, network_domain_id: &str) -> Result<Option<Vlan>> {
        let mut inner = self.lock();
        inner.record("get_vlan_by_name", name)?;
        Ok(inner
            .vlans
            .iter()
            .find(|v| v.name == name && v.network_domain_id == network_domain_id)
            .cloned())
    }

    async fn find_os_image(&self, name: &str, datacenter_id: &str) -> Result<Option<OsImage>> {
        let mut inner = self.lock();
        inner.record("find_os_image", name)?;
        Ok(inner
            .os_images
            .iter()
            .find(|i| i.name == name && i.datacenter_id == datacenter_id)
            .cloned())
    }

    async fn find_customer_image(
        &self,
        name: &str,
        datacenter_id: &str,
    ) -> Result<Option<CustomerImage>> {
        let mut inner = self.lock();
        inner.record("find_customer_image", name)?;
        Ok(inner.tracked.values().find_map(|t| match &t.resource {
            Resource::CustomerImage(image)
                if image.name == name && image.datacenter_id == datacenter_id =>
            {
                Some(image.clone())
            }
            _ => None,
        }))
    }

    async fn get_customer_image(&self, image_id: &str) -> Result<Option<CustomerImage>> {
        let mut inner = self.lock();
        inner.record("get_customer_image", image_id)?;
        Ok(inner
            .poll(ResourceKind::CustomerImage, image_id)
            .and_then(Resource::into_customer_image))
    }

    async fn deploy_server(&self, deployment: &ServerDeployment) -> Result<String> {
        let mut inner = self.lock();
        inner.record("deploy_server", &deployment.name)?;

        let id = inner.next_id("server");
        let datacenter_id = inner
            .network_domains
            .iter()
            .find(|nd| nd.id == deployment.network.network_domain_id)
            .map(|nd| nd.datacenter_id.clone())
            .unwrap_or_default();
        let private_ipv4 = deployment
            .network
            .primary_adapter
            .private_ipv4
            .clone()
            .unwrap_or_else(|| format!("10.0.0.{}", inner.next_id));

        let server = Server {
            id: id.clone(),
            name: deployment.name.clone(),
            description: deployment.description.clone(),
            datacenter_id,
            state: ResourceState::PendingAdd,
            started: deployment.start,
            source_image_id: Some(deployment.image_id.clone()),
            network: ServerNetwork {
                network_domain_id: deployment.network.network_domain_id.clone(),
                primary_adapter: NetworkAdapter {
                    id: Some(format!("nic-{}", id)),
                    vlan_id: deployment.network.primary_adapter.vlan_id.clone(),
                    private_ipv4: Some(private_ipv4),
                    ipv6: None,
                },
            },
            progress: Some(Progress {
                action: Some("DEPLOY_SERVER".to_string()),
                failure_reason: None,
            }),
        };

        let pending = inner.settle_polls;
        let then = inner.outcome(ResourceKind::Server);
        inner.insert(Resource::Server(server), pending, then);
        Ok(id)
    }

    async fn get_server(&self, server_id: &str) -> Result<Option<Server>> {
        let mut inner = self.lock();
        inner.record("get_server", server_id)?;
        Ok(inner
            .poll(ResourceKind::Server, server_id)
            .and_then(Resource::into_server))
    }

    async fn shutdown_server(&self, server_id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record("shutdown_server", server_id)?;
        inner.begin(
            ResourceKind::Server,
            server_id,
            ResourceState::PendingChange,
            Then::ShutDown,
        )
    }

    async fn delete_server(&self, server_id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record("delete_server", server_id)?;
        inner.begin(
            ResourceKind::Server,
            server_id,
            ResourceState::PendingDelete,
            Then::Remove,
        )
    }

    async fn clone_server(
        &self,
        server_id: &str,
        image_name: &str,
        image_description: &str,
        _prevent_guest_os_customization: bool,
    ) -> Result<String> {
        let mut inner = self.lock();
        inner.record("clone_server", image_name)?;

        let datacenter_id = match inner.peek(ResourceKind::Server, server_id) {
            Some(Resource::Server(server)) => server.datacenter_id.clone(),
            _ => {
                return Err(ComputeError::ResourceNotFound(format!(
                    "server '{}'",
                    server_id
                )));
            }
        };

        let id = inner.next_id("image");
        let image = CustomerImage {
            id: id.clone(),
            name: image_name.to_string(),
            description: image_description.to_string(),
            datacenter_id,
            state: ResourceState::PendingAdd,
            progress: Some(Progress {
                action: Some("CLONE_SERVER".to_string()),
                failure_reason: None,
            }),
        };

        let pending = inner.settle_polls;
        let then = inner.outcome(ResourceKind::CustomerImage);
        inner.insert(Resource::CustomerImage(image), pending, then);
        Ok(id)
    }

    async fn add_nat_rule(
        &self,
        network_domain_id: &str,
        internal_ip_address: &str,
        external_ip_address: Option<&str>,
    ) -> Result<String> {
        let mut inner = self.lock();
        inner.record(
            "add_nat_rule",
            &format!("{} {}", network_domain_id, internal_ip_address),
        )?;

        let id = inner.next_id("nat");
        let external_ip_address = external_ip_address
            .map(str::to_string)
            .unwrap_or_else(|| format!("198.51.100.{}", inner.next_id));
        let rule = NatRule {
            id: id.clone(),
            network_domain_id: network_domain_id.to_string(),
            internal_ip_address: internal_ip_address.to_string(),
            external_ip_address,
            state: ResourceState::Normal,
        };
        inner.insert(Resource::NatRule(rule), 0, Then::Settle);
        Ok(id)
    }

    async fn get_nat_rule(&self, nat_rule_id: &str) -> Result<Option<NatRule>> {
        let mut inner = self.lock();
        inner.record("get_nat_rule", nat_rule_id)?;
        Ok(inner
            .poll(ResourceKind::NatRule, nat_rule_id)
            .and_then(Resource::into_nat_rule))
    }

    async fn delete_nat_rule(&self, nat_rule_id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record("delete_nat_rule", nat_rule_id)?;
        inner
            .tracked
            .remove(&(ResourceKind::NatRule, nat_rule_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| ComputeError::ResourceNotFound(format!("NAT rule '{}'", nat_rule_id)))
    }

    async fn add_public_ip_block(&self, network_domain_id: &str) -> Result<String> {
        let mut inner = self.lock();
        inner.record("add_public_ip_block", network_domain_id)?;
        let id = inner.next_id("ipblock");
        inner.public_ip_blocks.push(id.clone());
        Ok(id)
    }

    async fn create_firewall_rule(
        &self,
        configuration: &FirewallRuleConfiguration,
    ) -> Result<String> {
        let mut inner = self.lock();
        inner.record("create_firewall_rule", &configuration.name)?;

        let id = inner.next_id("fw");
        let rule = FirewallRule {
            id: id.clone(),
            name: configuration.name.clone(),
            network_domain_id: configuration.network_domain_id.clone(),
            action: configuration.action.clone(),
            enabled: configuration.enabled,
            state: ResourceState::Normal,
        };
        inner.insert(Resource::FirewallRule(rule), 0, Then::Settle);
        Ok(id)
    }

    async fn get_firewall_rule(&self, firewall_rule_id: &str) -> Result<Option<FirewallRule>> {
        let mut inner = self.lock();
        inner.record("get_firewall_rule", firewall_rule_id)?;
        Ok(inner
            .poll(ResourceKind::FirewallRule, firewall_rule_id)
            .and_then(Resource::into_firewall_rule))
    }

    async fn delete_firewall_rule(&self, firewall_rule_id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record("delete_firewall_rule", firewall_rule_id)?;
        inner
            .tracked
            .remove(&(ResourceKind::FirewallRule, firewall_rule_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| {
                ComputeError::ResourceNotFound(format!("firewall rule '{}'", firewall_rule_id))
            })
    }

    async fn export_customer_image(
        &self,
        image_id: &str,
        ovf_package_prefix: &str,
    ) -> Result<String> {
        let mut inner = self.lock();
        inner.record(
            "export_customer_image",
            &format!("{} {}", image_id, ovf_package_prefix),
        )?;
        let then = inner.outcome(ResourceKind::CustomerImage);
        inner.begin(
            ResourceKind::CustomerImage,
            image_id,
            ResourceState::PendingChange,
            then,
        )?;
        Ok(inner.next_id("export"))
    }

    async fn import_customer_image(&self, import: &ImageImport) -> Result<String> {
        let mut inner = self.lock();
        inner.record("import_customer_image", &import.name)?;

        let id = inner.next_id("image");
        let image = CustomerImage {
            id: id.clone(),
            name: import.name.clone(),
            description: import.description.clone(),
            datacenter_id: import.datacenter_id.clone(),
            state: ResourceState::PendingAdd,
            progress: Some(Progress {
                action: Some("IMPORT_IMAGE".to_string()),
                failure_reason: None,
            }),
        };

        let pending = inner.settle_polls;
        let then = inner.outcome(ResourceKind::CustomerImage);
        inner.insert(Resource::CustomerImage(image), pending, then);
        Ok(id)
    }

    async fn delete_customer_image(&self, image_id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record("delete_customer_image", image_id)?;
        inner.begin(
            ResourceKind::CustomerImage,
            image_id,
            ResourceState::PendingDelete,
            Then::Remove,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deployed_server_settles_after_pending_polls() {
        let fake = FakeCompute::seeded();
        fake.set_settle_polls(2);

        let id = fake
            .deploy_server(&ServerDeployment {
                name: "packer-build-abc".to_string(),
                image_id: TEST_OS_IMAGE_ID.to_string(),
                start: true,
                ..Default::default()
            })
            .await
            .unwrap();

        let states: Vec<ResourceState> = {
            let mut states = Vec::new();
            for _ in 0..3 {
                states.push(fake.get_server(&id).await.unwrap().unwrap().state);
            }
            states
        };
        assert_eq!(
            states,
            vec![
                ResourceState::PendingAdd,
                ResourceState::PendingAdd,
                ResourceState::Normal
            ]
        );
    }

    #[tokio::test]
    async fn test_queued_failures_are_consumed_in_order() {
        let fake = FakeCompute::seeded();
        fake.fail_next(
            "add_public_ip_block",
            ComputeError::Api {
                code: "QUOTA_EXCEEDED".to_string(),
                message: "quota".to_string(),
            },
        );

        assert!(fake.add_public_ip_block("nd-1").await.is_err());
        assert!(fake.add_public_ip_block("nd-1").await.is_ok());
        assert_eq!(fake.call_count("add_public_ip_block"), 2);
        assert_eq!(fake.public_ip_blocks().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_after_pending_polls() {
        let fake = FakeCompute::seeded().with_customer_image(CustomerImage {
            id: "img-1".to_string(),
            name: "base".to_string(),
            datacenter_id: TEST_DATACENTER.to_string(),
            state: ResourceState::Normal,
            ..Default::default()
        });

        fake.delete_customer_image("img-1").await.unwrap();
        assert!(fake.get_customer_image("img-1").await.unwrap().is_some());
        assert!(fake.get_customer_image("img-1").await.unwrap().is_none());
        assert!(
            fake.find_customer_image("base", TEST_DATACENTER)
                .await
                .unwrap()
                .is_none()
        );
    }
}
