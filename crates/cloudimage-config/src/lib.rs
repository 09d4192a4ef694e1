pub mod error;
pub mod settings;
pub mod token;

pub use error::*;
pub use settings::{
    AccountSettings, BuildSettings, Communicator, DEFAULT_DISK_COMPRESSION, ExportSettings,
    ImportSettings, MCP_PASSWORD_ENV, MCP_REGION_ENV, MCP_USER_ENV, validate_all,
};
pub use token::UniquenessToken;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file directly
pub const CONFIG_PATH_ENV: &str = "CLOUDIMAGE_CONFIG_PATH";

const CANDIDATES: [&str; 3] = ["cloudimage.local.yaml", "cloudimage.yaml", "cloudimage.json"];

/// Contents of a configuration file
///
/// ```yaml
/// mcp_region: AU
/// mcp_user: packer
/// build:
///   datacenter: AU9
///   network_domain: packer-test
///   vlan: primary
///   source_image: CentOS 7 64-bit 2 CPU
///   target_image: centos7-packer
///   client_ip: 203.0.113.10
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudImageConfig {
    #[serde(flatten)]
    pub account: AccountSettings,

    #[serde(default)]
    pub build: Option<BuildSettings>,

    #[serde(default)]
    pub import: Option<ImportSettings>,

    #[serde(default)]
    pub export: Option<ExportSettings>,
}

impl CloudImageConfig {
    /// Validated account and build settings
    pub fn build_settings(&self) -> Result<(AccountSettings, BuildSettings)> {
        let build = self.build.clone().ok_or(ConfigError::MissingSection("build"))?;
        let mut account = self.account.clone();
        validate_all(&mut account, |problems| build.validate(problems))?;
        Ok((account, build))
    }

    /// Validated account and import settings
    pub fn import_settings(&self) -> Result<(AccountSettings, ImportSettings)> {
        let import = self.import.clone().ok_or(ConfigError::MissingSection("import"))?;
        let mut account = self.account.clone();
        validate_all(&mut account, |problems| import.validate(problems))?;
        Ok((account, import))
    }

    /// Validated account and export settings
    pub fn export_settings(&self) -> Result<(AccountSettings, ExportSettings)> {
        let export = self.export.clone().ok_or(ConfigError::MissingSection("export"))?;
        let mut account = self.account.clone();
        validate_all(&mut account, |problems| export.validate(problems))?;
        Ok((account, export))
    }
}

/// CloudImage's per-user configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("cloudimage");

    Ok(config_dir)
}

/// Locate the configuration file
///
/// Search order:
/// 1. `CLOUDIMAGE_CONFIG_PATH` environment variable
/// 2. current directory: cloudimage.local.yaml, cloudimage.yaml, cloudimage.json
/// 3. `./.cloudimage/` directory, same order
/// 4. `~/.config/cloudimage/cloudimage.yaml`
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points at '{}', which does not exist", CONFIG_PATH_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(".cloudimage");
    if project_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join("cloudimage.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Parse a configuration file; `.json` files are read as JSON, anything else as YAML.
pub fn load_config(path: &Path) -> Result<CloudImageConfig> {
    let content = std::fs::read_to_string(path)?;
    tracing::debug!("Loading configuration from {}", path.display());

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let parsed = if is_json {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Load the configuration from `explicit` if given, otherwise from the discovered file.
pub fn load(explicit: Option<&Path>) -> Result<CloudImageConfig> {
    match explicit {
        Some(path) => load_config(path),
        None => load_config(&find_config_file()?),
    }
}
