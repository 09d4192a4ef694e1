//! Pipeline settings
//!
//! Validation never stops at the first problem: every missing or
//! contradictory option is collected and reported together.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const MCP_REGION_ENV: &str = "MCP_REGION";
pub const MCP_USER_ENV: &str = "MCP_USER";
pub const MCP_PASSWORD_ENV: &str = "MCP_PASSWORD";

/// Default gzip level passed to ovftool
pub const DEFAULT_DISK_COMPRESSION: u8 = 5;

/// CloudControl account credentials
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSettings {
    #[serde(default)]
    pub mcp_region: String,

    #[serde(default)]
    pub mcp_user: String,

    #[serde(default)]
    pub mcp_password: String,
}

impl std::fmt::Debug for AccountSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSettings")
            .field("mcp_region", &self.mcp_region)
            .field("mcp_user", &self.mcp_user)
            .field("mcp_password", &"<redacted>")
            .finish()
    }
}

impl AccountSettings {
    pub fn new(
        region: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            mcp_region: region.into(),
            mcp_user: user.into(),
            mcp_password: password.into(),
        }
    }

    /// Fill blank credentials from the environment, recording any that are
    /// still missing afterwards.
    pub fn apply_env_fallback(&mut self, problems: &mut Vec<String>) {
        fallback(&mut self.mcp_region, "mcp_region", MCP_REGION_ENV, problems);
        fallback(&mut self.mcp_user, "mcp_user", MCP_USER_ENV, problems);
        fallback(&mut self.mcp_password, "mcp_password", MCP_PASSWORD_ENV, problems);
    }

    pub fn validate(&mut self) -> Result<()> {
        let mut problems = Vec::new();
        self.apply_env_fallback(&mut problems);
        into_result(problems)
    }
}

fn fallback(value: &mut String, option: &str, env_var: &str, problems: &mut Vec<String>) {
    if !value.is_empty() {
        return;
    }

    match std::env::var(env_var) {
        Ok(from_env) if !from_env.is_empty() => {
            tracing::debug!("Using {} from the environment", env_var);
            *value = from_env;
        }
        _ => problems.push(format!(
            "'{}' has not been specified in settings and the {} environment variable has not been set",
            option, env_var
        )),
    }
}

fn require(value: &str, option: &str, problems: &mut Vec<String>) {
    if value.trim().is_empty() {
        problems.push(format!("'{}' has not been specified in settings", option));
    }
}

fn into_result(problems: Vec<String>) -> Result<()> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(problems))
    }
}

/// How provisioners reach the temporary server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Communicator {
    #[default]
    Ssh,
    Winrm,
    /// No connection; the server is never exposed.
    None,
}

impl Communicator {
    pub fn port(&self) -> Option<u16> {
        match self {
            Communicator::Ssh => Some(22),
            Communicator::Winrm => Some(5985),
            Communicator::None => None,
        }
    }
}

/// Customer-image build: deploy, provision and clone a temporary server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildSettings {
    #[serde(default)]
    pub datacenter: String,

    #[serde(default)]
    pub network_domain: String,

    #[serde(default)]
    pub vlan: String,

    #[serde(default)]
    pub source_image: String,

    #[serde(default)]
    pub target_image: String,

    /// Connect over the server's private address instead of NAT.
    #[serde(default)]
    pub use_private_ipv4: bool,

    /// Public address allowed through the firewall.
    #[serde(default)]
    pub client_ip: Option<String>,

    #[serde(default)]
    pub communicator: Communicator,

    /// Local shell commands run against the server before it is cloned.
    #[serde(default)]
    pub provisioners: Vec<String>,
}

impl BuildSettings {
    /// Will the server be reachable through a NAT rule and firewall rule?
    pub fn exposes_public_address(&self) -> bool {
        !self.use_private_ipv4 && self.communicator != Communicator::None
    }

    pub fn validate(&self, problems: &mut Vec<String>) {
        require(&self.datacenter, "datacenter", problems);
        require(&self.network_domain, "network_domain", problems);
        require(&self.vlan, "vlan", problems);
        require(&self.source_image, "source_image", problems);
        require(&self.target_image, "target_image", problems);

        if self.exposes_public_address()
            && self.client_ip.as_deref().is_none_or(|ip| ip.trim().is_empty())
        {
            problems.push(
                "'client_ip' must be specified unless 'use_private_ipv4' is set or the communicator is 'none'"
                    .to_string(),
            );
        }

        if self.communicator == Communicator::None && !self.provisioners.is_empty() {
            problems.push("'provisioners' cannot be used when the communicator is 'none'".to_string());
        }
    }
}

/// Import: convert a local VMware build, upload it and import it as a customer image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    #[serde(default)]
    pub datacenter: String,

    #[serde(default)]
    pub target_image: String,

    #[serde(default)]
    pub ovf_package_prefix: String,

    /// ovftool executable; looked up on PATH when unset.
    #[serde(default)]
    pub ovftool_path: Option<PathBuf>,

    /// Where the OVF package is written; a temporary directory when unset.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub cleanup_ovf: bool,

    #[serde(default = "default_disk_compression")]
    pub disk_compression: u8,

    #[serde(default)]
    pub prevent_guest_os_customization: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            datacenter: String::new(),
            target_image: String::new(),
            ovf_package_prefix: String::new(),
            ovftool_path: None,
            output_dir: None,
            cleanup_ovf: true,
            disk_compression: DEFAULT_DISK_COMPRESSION,
            prevent_guest_os_customization: false,
        }
    }
}

impl ImportSettings {
    pub fn validate(&self, problems: &mut Vec<String>) {
        require(&self.datacenter, "datacenter", problems);
        require(&self.target_image, "target_image", problems);
        require(&self.ovf_package_prefix, "ovf_package_prefix", problems);

        if self.disk_compression > 9 {
            problems.push(format!(
                "'disk_compression' must be between 0 and 9 (got {})",
                self.disk_compression
            ));
        }
    }
}

/// Export: publish an existing customer image as an OVF package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    #[serde(default)]
    pub datacenter: String,

    #[serde(default)]
    pub source_image: String,

    #[serde(default)]
    pub ovf_package_prefix: String,
}

impl ExportSettings {
    pub fn validate(&self, problems: &mut Vec<String>) {
        require(&self.datacenter, "datacenter", problems);
        require(&self.source_image, "source_image", problems);
        require(&self.ovf_package_prefix, "ovf_package_prefix", problems);
    }
}

fn default_true() -> bool {
    true
}

fn default_disk_compression() -> u8 {
    DEFAULT_DISK_COMPRESSION
}

/// Validate account credentials together with one pipeline's settings.
pub fn validate_all(
    account: &mut AccountSettings,
    pipeline: impl FnOnce(&mut Vec<String>),
) -> Result<()> {
    let mut problems = Vec::new();
    account.apply_env_fallback(&mut problems);
    pipeline(&mut problems);
    into_result(problems)
}
