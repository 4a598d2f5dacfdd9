//! Provider credential loading
//!
//! Keys are read from two places:
//! 1. `settings.json` in the data directory (`{"api_keys": {"runway": "..."}}`,
//!    or the legacy single `api_key` field, which belongs to Runway)
//! 2. Environment variables (`RUNWAY_API_KEY`, `LUMA_API_KEY`, `KLING_API_KEY`,
//!    `MINIMAX_API_KEY`), including a `.env` file if present
//!
//! Environment values take precedence over `settings.json`.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{component_info, component_warn, logging::ComponentId, ProviderId};

use super::file_system::read_json_or_default;
use crate::error::OrchestratorResult;
use crate::traits::ApiKeySource;

/// On-disk shape of `settings.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudioSettings {
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
    /// Single-provider key written by older studio versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl StudioSettings {
    /// Credentials keyed by provider; unknown provider names are skipped
    pub fn credentials(&self) -> HashMap<ProviderId, String> {
        let mut credentials = HashMap::new();
        if let Some(key) = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            credentials.insert(ProviderId::Runway, key.to_string());
        }
        for (name, key) in &self.api_keys {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            match name.parse::<ProviderId>() {
                Ok(provider) => {
                    credentials.insert(provider, key.to_string());
                }
                Err(_) => {
                    component_warn!(ComponentId::Orchestrator, provider = %name, "Ignoring key for unknown provider");
                }
            }
        }
        credentials
    }
}

/// Real API key source using `settings.json` and environment variables
pub struct RealApiKeySource {
    settings_path: Option<PathBuf>,
}

impl RealApiKeySource {
    /// Environment only
    pub fn new() -> Self {
        Self { settings_path: None }
    }

    pub fn with_settings(settings_path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: Some(settings_path.into()),
        }
    }

    /// Load `.env` from the current directory or its parents, if any
    fn init_env() {
        let _ = dotenv::dotenv();
    }

    fn env_credentials() -> HashMap<ProviderId, String> {
        ProviderId::ALL
            .into_iter()
            .filter_map(|provider| {
                std::env::var(provider.credential_env_var())
                    .ok()
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty())
                    .map(|key| (provider, key))
            })
            .collect()
    }
}

impl Default for RealApiKeySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiKeySource for RealApiKeySource {
    async fn load_credentials(&self) -> OrchestratorResult<HashMap<ProviderId, String>> {
        Self::init_env();

        let mut credentials = match &self.settings_path {
            Some(path) => read_json_or_default::<StudioSettings>(path).await?.credentials(),
            None => HashMap::new(),
        };
        credentials.extend(Self::env_credentials());

        let mut configured: Vec<&str> = credentials.keys().map(|p| p.as_str()).collect();
        configured.sort_unstable();
        component_info!(
            ComponentId::Orchestrator,
            "Provider credentials loaded: {}",
            if configured.is_empty() { "none".to_string() } else { configured.join(", ") }
        );
        Ok(credentials)
    }
}
