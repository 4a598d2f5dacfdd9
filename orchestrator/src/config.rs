//! Studio configuration
//!
//! Values come from CLI flags with environment fallbacks (`STUDIO_*`),
//! after `.env` has been loaded. Provider base URLs may be overridden with
//! `<PROVIDER>_BASE_URL`, which is how tests point adapters at a mock server.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use providers::ProviderEndpoint;
use shared::ProviderId;

use crate::core::retry::RetryPolicy;
use crate::error::{OrchestratorError, OrchestratorResult};

pub const DEFAULT_DATA_DIR: &str = "horror_shorts_data";
pub const DEFAULT_MAX_IN_FLIGHT: usize = 3;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Limits applied while dispatching and polling a batch
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPolicy {
    /// Concurrent network calls allowed per provider
    pub max_in_flight: usize,
    pub retry: RetryPolicy,
    pub poll_interval: Duration,
    /// Total polling time before a task is failed as timed out
    pub poll_timeout: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            retry: RetryPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl DispatchPolicy {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.max_in_flight == 0 {
            return Err(OrchestratorError::config("max_in_flight", "must be at least 1"));
        }
        if self.poll_interval.is_zero() {
            return Err(OrchestratorError::config("poll_interval", "must be greater than zero"));
        }
        if self.poll_timeout < self.poll_interval {
            return Err(OrchestratorError::config("poll_timeout", "must not be shorter than the poll interval"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
    pub policy: DispatchPolicy,
    /// Base URL overrides; providers not listed use their public endpoint
    pub base_urls: HashMap<ProviderId, String>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            policy: DispatchPolicy::default(),
            base_urls: HashMap::new(),
        }
    }
}

impl StudioConfig {
    /// Collect `<PROVIDER>_BASE_URL` overrides from the environment
    pub fn with_base_urls_from_env(mut self) -> Self {
        for provider in ProviderId::ALL {
            if let Ok(url) = std::env::var(provider.base_url_env_var()) {
                let url = url.trim();
                if !url.is_empty() {
                    self.base_urls.insert(provider, url.to_string());
                }
            }
        }
        self
    }

    /// Endpoint for every provider, applying overrides and the request timeout
    pub fn endpoints(&self) -> HashMap<ProviderId, ProviderEndpoint> {
        ProviderId::ALL
            .into_iter()
            .map(|provider| {
                let endpoint = match self.base_urls.get(&provider) {
                    Some(url) => ProviderEndpoint::new(url.clone()),
                    None => ProviderEndpoint::default_for(provider),
                };
                (provider, endpoint.with_timeout(self.request_timeout))
            })
            .collect()
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.data_dir.join("tasks.json")
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.request_timeout.is_zero() {
            return Err(OrchestratorError::config("request_timeout", "must be greater than zero"));
        }
        self.policy.validate()
    }
}
