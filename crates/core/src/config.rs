//! Configuration types for the call orchestrator

use serde::{Deserialize, Serialize};

/// Main configuration for a call endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    /// Local party identifier (auto-generated if None)
    pub local_party: Option<String>,

    /// ICE servers handed to the media transport (at least one required)
    pub ice_servers: Vec<IceServerConfig>,

    /// How long the `Ended` state lingers before resetting to `Idle`,
    /// in milliseconds (default: 2000, range: 100-60000)
    pub ended_linger_ms: u64,
}

/// A single STUN or TURN server entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    /// Server URLs (stun: or turn: scheme)
    pub urls: Vec<String>,

    /// Username for TURN authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Credential for TURN authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServerConfig {
    /// A STUN entry with no credentials
    pub fn stun(url: &str) -> Self {
        Self {
            urls: vec![url.to_string()],
            username: None,
            credential: None,
        }
    }

    /// A TURN entry with long-term credentials
    pub fn turn(url: &str, username: &str, credential: &str) -> Self {
        Self {
            urls: vec![url.to_string()],
            username: Some(username.to_string()),
            credential: Some(credential.to_string()),
        }
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            local_party: None,
            ice_servers: vec![IceServerConfig::stun("stun:stun.l.google.com:19302")],
            ended_linger_ms: 2000,
        }
    }
}

impl CallConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `ice_servers` is empty, or an entry has no URL
    /// - `ended_linger_ms` is not in range 100-60000
    /// - `local_party` is set but empty
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.ice_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one ICE server is required".to_string(),
            ));
        }

        for server in &self.ice_servers {
            if server.urls.is_empty() {
                return Err(Error::InvalidConfig(
                    "ICE server entry has no URL".to_string(),
                ));
            }
        }

        if self.ended_linger_ms < 100 || self.ended_linger_ms > 60_000 {
            return Err(Error::InvalidConfig(format!(
                "ended_linger_ms must be in range 100-60000, got {}",
                self.ended_linger_ms
            )));
        }

        if let Some(party) = &self.local_party {
            if party.is_empty() {
                return Err(Error::InvalidConfig(
                    "local_party must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Set the local party identifier
    ///
    /// Useful for chaining with `Default`.
    pub fn with_local_party(mut self, party: &str) -> Self {
        self.local_party = Some(party.to_string());
        self
    }

    /// Replace the ICE server list
    pub fn with_ice_servers(mut self, servers: Vec<IceServerConfig>) -> Self {
        self.ice_servers = servers;
        self
    }

    /// Set the `Ended` linger delay in milliseconds
    pub fn with_ended_linger_ms(mut self, ms: u64) -> Self {
        self.ended_linger_ms = ms;
        self
    }
}
