//! CloudControl 2.4 API client
//!
//! Talks to the regional CloudControl endpoint with HTTP basic
//! authentication. The organisation ID that prefixes every 2.4 path is looked
//! up once from the legacy account endpoint and cached for the lifetime of the
//! client.

use crate::client::ComputeClient;
use crate::error::{ComputeError, RESOURCE_NOT_FOUND, Result};
use crate::model::{
    CustomerImage, Datacenter, FirewallRule, FirewallRuleConfiguration, ImageImport, NatRule,
    NetworkDomain, OsImage, Server, ServerDeployment, Vlan,
};
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::OnceCell;

const API_VERSION: &str = "2.4";

/// Set to any non-empty value to log request and response bodies.
pub const EXTENDED_LOGGING_ENV: &str = "MCP_EXTENDED_LOGGING";

/// reqwest-backed [`ComputeClient`]
pub struct CloudControlClient {
    client: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
    org_id: OnceCell<String>,
    extended_logging: bool,
}

impl CloudControlClient {
    /// Create a client for the given region (e.g. `AU`, `NA`, `EU`).
    pub fn new(region: &str, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: region_base_url(region),
            user: user.into(),
            password: password.into(),
            org_id: OnceCell::new(),
            extended_logging: std::env::var(EXTENDED_LOGGING_ENV)
                .map(|v| !v.is_empty())
                .unwrap_or(false),
        }
    }

    pub fn with_extended_logging(mut self, enabled: bool) -> Self {
        self.extended_logging = enabled;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn org_id(&self) -> Result<&str> {
        let org_id = self
            .org_id
            .get_or_try_init(|| async {
                let url = format!("{}/oec/0.9/myaccount", self.base_url);
                let response = self
                    .client
                    .get(&url)
                    .basic_auth(&self.user, Some(&self.password))
                    .send()
                    .await?;

                let status = response.status();
                let body = response.text().await?;
                if !status.is_success() {
                    return Err(ComputeError::Api {
                        code: status.as_u16().to_string(),
                        message: format!("Unable to retrieve account details for '{}'", self.user),
                    });
                }

                let org_id = extract_org_id(&body).ok_or_else(|| {
                    ComputeError::InvalidResponse(
                        "account details do not contain an organisation ID".to_string(),
                    )
                })?;
                tracing::debug!("Resolved organisation ID {}", org_id);
                Ok(org_id)
            })
            .await?;

        Ok(org_id.as_str())
    }

    async fn url(&self, path: &str) -> Result<String> {
        let org_id = self.org_id().await?;
        Ok(format!(
            "{}/caas/{}/{}/{}",
            self.base_url, API_VERSION, org_id, path
        ))
    }

    fn get_request(&self, url: &str, query: &[(&str, &str)]) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .query(query)
            .basic_auth(&self.user, Some(&self.password))
            .header("Accept", "application/json")
    }

    /// GET a single record; `RESOURCE_NOT_FOUND` becomes `None`.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let url = self.url(path).await?;
        tracing::debug!("GET {} {:?}", url, query);

        let response = self.get_request(&url, query).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if self.extended_logging {
            tracing::debug!("Response ({}): {}", status, body);
        }

        if status.is_success() {
            return Ok(Some(serde_json::from_str(&body)?));
        }

        match parse_api_error(&body) {
            Some(err) if err.response_code == RESOURCE_NOT_FOUND => Ok(None),
            Some(err) => Err(err.into()),
            None => Err(ComputeError::Api {
                code: status.as_u16().to_string(),
                message: body,
            }),
        }
    }

    /// GET a paged list and return its first entry.
    async fn find_first<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        field: &str,
    ) -> Result<Option<T>> {
        let Some(page) = self.get::<serde_json::Value>(path, query).await? else {
            return Ok(None);
        };

        match page.get(field).and_then(|v| v.as_array()).and_then(|a| a.first()) {
            Some(item) => Ok(Some(serde_json::from_value(item.clone())?)),
            None => Ok(None),
        }
    }

    /// POST an operation and return its response.
    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        let url = self.url(path).await?;
        tracing::debug!("POST {}", url);
        if self.extended_logging {
            tracing::debug!("Request: {}", serde_json::to_string(body)?);
        }

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.password))
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if self.extended_logging {
            tracing::debug!("Response ({}): {}", status, text);
        }

        let api_response: ApiResponse = serde_json::from_str(&text).map_err(|_| {
            ComputeError::InvalidResponse(format!("unexpected response ({}): {}", status, text))
        })?;

        if !status.is_success() || !api_response.is_accepted() {
            return Err(api_response.into());
        }

        Ok(api_response)
    }
}

fn region_base_url(region: &str) -> String {
    format!("https://api-{}.dimensiondata.com", region.to_lowercase())
}

fn org_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"<(?:\w+:)?orgId>\s*([^<\s]+)\s*</").ok())
        .as_ref()
}

/// Pull the organisation ID out of the account details document.
fn extract_org_id(body: &str) -> Option<String> {
    org_id_pattern()?
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn parse_api_error(body: &str) -> Option<ApiResponse> {
    serde_json::from_str::<ApiResponse>(body)
        .ok()
        .filter(|r| !r.response_code.is_empty())
}

/// Response envelope of every CloudControl operation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    response_code: String,

    #[serde(default)]
    message: String,

    #[serde(default)]
    info: Vec<NameValue>,
}

#[derive(Debug, Clone, Deserialize)]
struct NameValue {
    name: String,
    value: String,
}

impl ApiResponse {
    fn is_accepted(&self) -> bool {
        matches!(self.response_code.as_str(), "OK" | "IN_PROGRESS")
    }

    fn info(&self, name: &str) -> Result<String> {
        self.info
            .iter()
            .find(|nv| nv.name == name)
            .map(|nv| nv.value.clone())
            .ok_or_else(|| {
                ComputeError::InvalidResponse(format!(
                    "response ({}) is missing '{}'",
                    self.response_code, name
                ))
            })
    }
}

impl From<ApiResponse> for ComputeError {
    fn from(response: ApiResponse) -> Self {
        if response.response_code == RESOURCE_NOT_FOUND {
            return ComputeError::ResourceNotFound(response.message);
        }
        ComputeError::Api {
            code: response.response_code,
            message: response.message,
        }
    }
}

#[async_trait]
impl ComputeClient for CloudControlClient {
    async fn get_datacenter(&self, datacenter_id: &str) -> Result<Option<Datacenter>> {
        self.find_first(
            "infrastructure/datacenter",
            &[("id", datacenter_id)],
            "datacenter",
        )
        .await
    }

    async fn get_network_domain_by_name(
        &self,
        name: &str,
        datacenter_id: &str,
    ) -> Result<Option<NetworkDomain>> {
        self.find_first(
            "network/networkDomain",
            &[("name", name), ("datacenterId", datacenter_id)],
            "networkDomain",
        )
        .await
    }

    async fn get_vlan_by_name(&self, name: &str, network_domain_id: &str) -> Result<Option<Vlan>> {
        self.find_first(
            "network/vlan",
            &[("name", name), ("networkDomainId", network_domain_id)],
            "vlan",
        )
        .await
    }

    async fn find_os_image(&self, name: &str, datacenter_id: &str) -> Result<Option<OsImage>> {
        self.find_first(
            "image/osImage",
            &[("name", name), ("datacenterId", datacenter_id)],
            "osImage",
        )
        .await
    }

    async fn find_customer_image(
        &self,
        name: &str,
        datacenter_id: &str,
    ) -> Result<Option<CustomerImage>> {
        self.find_first(
            "image/customerImage",
            &[("name", name), ("datacenterId", datacenter_id)],
            "customerImage",
        )
        .await
    }

    async fn get_customer_image(&self, image_id: &str) -> Result<Option<CustomerImage>> {
        self.get(&format!("image/customerImage/{}", image_id), &[]).await
    }

    async fn deploy_server(&self, deployment: &ServerDeployment) -> Result<String> {
        self.post("server/deployServer", deployment)
            .await?
            .info("serverId")
    }

    async fn get_server(&self, server_id: &str) -> Result<Option<Server>> {
        self.get(&format!("server/server/{}", server_id), &[]).await
    }

    async fn shutdown_server(&self, server_id: &str) -> Result<()> {
        self.post("server/shutdownServer", &json!({ "id": server_id }))
            .await?;
        Ok(())
    }

    async fn delete_server(&self, server_id: &str) -> Result<()> {
        self.post("server/deleteServer", &json!({ "id": server_id }))
            .await?;
        Ok(())
    }

    async fn clone_server(
        &self,
        server_id: &str,
        image_name: &str,
        image_description: &str,
        prevent_guest_os_customization: bool,
    ) -> Result<String> {
        let body = json!({
            "id": server_id,
            "imageName": image_name,
            "description": image_description,
            "preventGuestOsCustomization": prevent_guest_os_customization,
        });
        self.post("server/cloneServer", &body).await?.info("imageId")
    }

    async fn add_nat_rule(
        &self,
        network_domain_id: &str,
        internal_ip_address: &str,
        external_ip_address: Option<&str>,
    ) -> Result<String> {
        let mut body = json!({
            "networkDomainId": network_domain_id,
            "internalIp": internal_ip_address,
        });
        if let Some(external) = external_ip_address {
            body["externalIp"] = json!(external);
        }

        match self.post("network/createNatRule", &body).await {
            Ok(response) => response.info("natRuleId"),
            Err(err) if err.is_no_ip_address_available() => {
                Err(ComputeError::NoIpAddressAvailable {
                    network_domain_id: network_domain_id.to_string(),
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn get_nat_rule(&self, nat_rule_id: &str) -> Result<Option<NatRule>> {
        self.get(&format!("network/natRule/{}", nat_rule_id), &[]).await
    }

    async fn delete_nat_rule(&self, nat_rule_id: &str) -> Result<()> {
        self.post("network/deleteNatRule", &json!({ "id": nat_rule_id }))
            .await?;
        Ok(())
    }

    async fn add_public_ip_block(&self, network_domain_id: &str) -> Result<String> {
        self.post(
            "network/addPublicIpBlock",
            &json!({ "networkDomainId": network_domain_id }),
        )
        .await?
        .info("ipBlockId")
    }

    async fn create_firewall_rule(
        &self,
        configuration: &FirewallRuleConfiguration,
    ) -> Result<String> {
        self.post("network/createFirewallRule", configuration)
            .await?
            .info("firewallRuleId")
    }

    async fn get_firewall_rule(&self, firewall_rule_id: &str) -> Result<Option<FirewallRule>> {
        self.get(&format!("network/firewallRule/{}", firewall_rule_id), &[])
            .await
    }

    async fn delete_firewall_rule(&self, firewall_rule_id: &str) -> Result<()> {
        self.post(
            "network/deleteFirewallRule",
            &json!({ "id": firewall_rule_id }),
        )
        .await?;
        Ok(())
    }

    async fn export_customer_image(
        &self,
        image_id: &str,
        ovf_package_prefix: &str,
    ) -> Result<String> {
        let body = json!({
            "imageId": image_id,
            "ovfPackagePrefix": ovf_package_prefix,
        });
        self.post("image/exportImage", &body)
            .await?
            .info("imageExportId")
    }

    async fn import_customer_image(&self, import: &ImageImport) -> Result<String> {
        self.post("image/importImage", import).await?.info("imageId")
    }

    async fn delete_customer_image(&self, image_id: &str) -> Result<()> {
        self.post("image/deleteCustomerImage", &json!({ "id": image_id }))
            .await?;
        Ok(())
    }
}
