//! Provider registry: configured credentials and usable adapters

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use shared::{component_info, logging::ComponentId, ProviderId};

use crate::error::{AdapterError, AdapterResult};
use crate::services::build_adapter;
use crate::traits::ProviderAdapter;
use crate::types::ProviderEndpoint;

/// Cached credential set plus one adapter per known provider.
///
/// A provider is available iff it has both an adapter and a non-empty
/// credential. The registry is a snapshot; credential changes replace it.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
    credentials: HashMap<ProviderId, String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the production adapter for every provider
    pub fn with_endpoints(endpoints: &HashMap<ProviderId, ProviderEndpoint>) -> AdapterResult<Self> {
        let mut registry = Self::new();
        for provider in ProviderId::ALL {
            let endpoint = endpoints
                .get(&provider)
                .cloned()
                .unwrap_or_else(|| ProviderEndpoint::default_for(provider));
            registry.register(build_adapter(provider, &endpoint)?);
        }
        Ok(registry)
    }

    /// Register or replace the adapter for its provider
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.id(), adapter);
    }

    /// Replace the whole credential set; blank values are dropped
    pub fn set_credentials(&mut self, credentials: HashMap<ProviderId, String>) {
        self.credentials = credentials
            .into_iter()
            .map(|(provider, key)| (provider, key.trim().to_string()))
            .filter(|(_, key)| !key.is_empty())
            .collect();
        component_info!(
            ComponentId::Providers,
            configured = self.credentials.len(),
            "Loaded provider credentials"
        );
    }

    pub fn set_credential(&mut self, provider: ProviderId, key: impl Into<String>) {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            self.credentials.remove(&provider);
        } else {
            self.credentials.insert(provider, key);
        }
    }

    pub fn credential(&self, provider: ProviderId) -> Option<&str> {
        self.credentials.get(&provider).map(String::as_str)
    }

    pub fn adapter(&self, provider: ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }

    pub fn is_available(&self, provider: ProviderId) -> bool {
        self.adapters.contains_key(&provider) && self.credential(provider).is_some()
    }

    /// Providers that may be selected for dispatch
    pub fn list_available(&self) -> BTreeSet<ProviderId> {
        self.adapters
            .keys()
            .copied()
            .filter(|provider| self.credential(*provider).is_some())
            .collect()
    }

    /// Adapter and credential for a dispatch, or `MissingCredential`
    pub fn select(&self, provider: ProviderId) -> AdapterResult<(Arc<dyn ProviderAdapter>, String)> {
        match (self.adapter(provider), self.credential(provider)) {
            (Some(adapter), Some(key)) => Ok((adapter, key.to_string())),
            (None, _) => Err(AdapterError::Config {
                message: format!("no adapter registered for {}", provider),
            }),
            (Some(_), None) => Err(AdapterError::MissingCredential { provider }),
        }
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("adapters", &self.adapters.keys().collect::<BTreeSet<_>>())
            .field("available", &self.list_available())
            .finish()
    }
}
