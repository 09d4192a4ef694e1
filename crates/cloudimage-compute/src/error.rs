//! CloudControl error types

use crate::model::{ResourceKind, ResourceState};
use std::time::Duration;
use thiserror::Error;

/// Response code returned when a network domain has no free public IPv4 address.
pub const NO_IP_ADDRESS_AVAILABLE: &str = "NO_IP_ADDRESS_AVAILABLE";

/// Response code returned when the requested resource does not exist.
pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";

/// CloudControl errors
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("No public IPv4 address is available in network domain '{network_domain_id}'")]
    NoIpAddressAvailable { network_domain_id: String },

    #[error("CloudControl API error ({code}): {message}")]
    Api { code: String, message: String },

    #[error("{kind} '{id}' entered state {state}: {reason}")]
    ResourceFailed {
        kind: ResourceKind,
        id: String,
        state: ResourceState,
        reason: String,
    },

    #[error("Timed out after {timeout:?} waiting for {kind} '{id}' to reach {expected}")]
    Timeout {
        kind: ResourceKind,
        id: String,
        expected: String,
        timeout: Duration,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid response from CloudControl: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ComputeError {
    /// Does this error indicate that no public IPv4 address could be allocated?
    pub fn is_no_ip_address_available(&self) -> bool {
        match self {
            ComputeError::NoIpAddressAvailable { .. } => true,
            ComputeError::Api { code, .. } => code == NO_IP_ADDRESS_AVAILABLE,
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ComputeError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, ComputeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_ip_address_classification() {
        let err = ComputeError::NoIpAddressAvailable {
            network_domain_id: "nd-1".to_string(),
        };
        assert!(err.is_no_ip_address_available());

        let err = ComputeError::Api {
            code: NO_IP_ADDRESS_AVAILABLE.to_string(),
            message: "No IP address available".to_string(),
        };
        assert!(err.is_no_ip_address_available());

        let err = ComputeError::Api {
            code: "UNEXPECTED_ERROR".to_string(),
            message: "boom".to_string(),
        };
        assert!(!err.is_no_ip_address_available());
        assert!(!ComputeError::Cancelled.is_no_ip_address_available());
    }
}
