use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error(
        "No configuration file found. Looked in:\n\
        - current directory: cloudimage.local.yaml, cloudimage.yaml, cloudimage.json\n\
        - ./.cloudimage/ directory\n\
        - ~/.config/cloudimage/cloudimage.yaml\n\
        Set CLOUDIMAGE_CONFIG_PATH or pass --config to use another file"
    )]
    ConfigFileNotFound,

    #[error("Failed to parse '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("'{0}' section is missing from the configuration")]
    MissingSection(&'static str),

    #[error("Invalid configuration:\n{}", .0.iter().map(|p| format!("- {}", p)).collect::<Vec<_>>().join("\n"))]
    Invalid(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Every individual validation problem, if this is a validation error.
    pub fn problems(&self) -> &[String] {
        match self {
            ConfigError::Invalid(problems) => problems,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
