use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

/// Per-run random token embedded in the names of every resource a run creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniquenessToken(String);

impl UniquenessToken {
    /// 8 random bytes, URL-safe base64.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn from_string(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn server_name(&self) -> String {
        format!("packer-build-{}", self.0)
    }

    pub fn administrator_password(&self) -> &str {
        &self.0
    }

    /// Firewall rule names only accept alphanumerics and dots.
    pub fn firewall_rule_name(&self) -> String {
        let token: String = self.0.chars().filter(char::is_ascii_alphanumeric).collect();
        format!("packer.{}.inbound", token)
    }
}

impl std::fmt::Display for UniquenessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
