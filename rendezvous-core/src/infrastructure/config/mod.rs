//! TOML-backed configuration with environment overrides. Nothing here leaks
//! into library type signatures; the facade consumes a validated value.

use crate::foundation::{
    RendezvousError, ATTESTATION_TIMEOUT_SECS, FEDERATION_SYNC_INTERVAL_SECS, JOIN_REQUEST_TIMEOUT_SECS,
    PRIVACY_DELAY_MAX_SECS, PRIVACY_DELAY_MIN_SECS, VERIFIER_TIMEOUT_SECS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RendezvousConfig {
    #[serde(default)]
    pub data_dir: String,
    #[serde(default)]
    pub adapters: AdapterConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub privacy_delay: PrivacyDelayConfig,
    #[serde(default)]
    pub federation: FederationConfig,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AdapterConfig {
    /// Unlinkable-token issuer/verifier endpoint. Absent means token gates
    /// and federation sends fail closed.
    #[serde(default)]
    pub token_authority_url: Option<String>,
    /// Timestamp-attestation gateway endpoint. Absent means results carry no
    /// attestation.
    #[serde(default)]
    pub attestation_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_verifier_secs")]
    pub verifier_secs: u64,
    #[serde(default = "default_attestation_secs")]
    pub attestation_secs: u64,
    #[serde(default = "default_join_request_secs")]
    pub join_request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            verifier_secs: default_verifier_secs(),
            attestation_secs: default_attestation_secs(),
            join_request_secs: default_join_request_secs(),
        }
    }
}

fn default_verifier_secs() -> u64 {
    VERIFIER_TIMEOUT_SECS
}

fn default_attestation_secs() -> u64 {
    ATTESTATION_TIMEOUT_SECS
}

fn default_join_request_secs() -> u64 {
    JOIN_REQUEST_TIMEOUT_SECS
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PrivacyDelayConfig {
    #[serde(default = "default_privacy_min_secs")]
    pub min_secs: u64,
    #[serde(default = "default_privacy_max_secs")]
    pub max_secs: u64,
}

impl Default for PrivacyDelayConfig {
    fn default() -> Self {
        Self { min_secs: default_privacy_min_secs(), max_secs: default_privacy_max_secs() }
    }
}

fn default_privacy_min_secs() -> u64 {
    PRIVACY_DELAY_MIN_SECS
}

fn default_privacy_max_secs() -> u64 {
    PRIVACY_DELAY_MAX_SECS
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FederationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub instance_name: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Peer endpoints to dial at startup.
    #[serde(default)]
    pub peers: Vec<String>,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
}

fn default_sync_interval_secs() -> u64 {
    FEDERATION_SYNC_INTERVAL_SECS
}

impl RendezvousConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RendezvousError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config: RendezvousConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, RendezvousError> {
        let mut config = RendezvousConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("RENDEZVOUS_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = dir;
            }
        }
        if let Ok(url) = std::env::var("RENDEZVOUS_TOKEN_AUTHORITY_URL") {
            if !url.trim().is_empty() {
                self.adapters.token_authority_url = Some(url);
            }
        }
        if let Ok(url) = std::env::var("RENDEZVOUS_ATTESTATION_URL") {
            if !url.trim().is_empty() {
                self.adapters.attestation_url = Some(url);
            }
        }
        if let Ok(flag) = std::env::var("RENDEZVOUS_FEDERATION_ENABLED") {
            self.federation.enabled = matches!(flag.trim(), "1" | "true" | "yes");
        }
    }

    pub fn validate(&self) -> Result<(), RendezvousError> {
        if self.privacy_delay.min_secs > self.privacy_delay.max_secs {
            return Err(RendezvousError::ConfigError(format!(
                "privacy_delay.min_secs {} exceeds max_secs {}",
                self.privacy_delay.min_secs, self.privacy_delay.max_secs
            )));
        }
        if self.federation.enabled {
            if self.federation.instance_id.as_deref().map_or(true, |id| id.trim().is_empty()) {
                return Err(RendezvousError::ConfigError("federation.instance_id is required when federation is enabled".to_string()));
            }
            if self.federation.endpoint.as_deref().map_or(true, |ep| ep.trim().is_empty()) {
                return Err(RendezvousError::ConfigError("federation.endpoint is required when federation is enabled".to_string()));
            }
            if self.federation.sync_interval_secs == 0 {
                return Err(RendezvousError::ConfigError("federation.sync_interval_secs must be positive".to_string()));
            }
        }
        Ok(())
    }
}
