//! Provider adapter implementations

pub mod http;
pub mod kling;
pub mod luma;
pub mod minimax;
pub mod runway;

#[cfg(test)]
pub mod tests;

use std::sync::Arc;

use shared::ProviderId;

use crate::error::AdapterResult;
use crate::traits::ProviderAdapter;
use crate::types::ProviderEndpoint;

pub use kling::KlingAdapter;
pub use luma::LumaAdapter;
pub use minimax::MinimaxAdapter;
pub use runway::RunwayAdapter;

/// Construct the adapter for `provider` against `endpoint`
pub fn build_adapter(provider: ProviderId, endpoint: &ProviderEndpoint) -> AdapterResult<Arc<dyn ProviderAdapter>> {
    let adapter: Arc<dyn ProviderAdapter> = match provider {
        ProviderId::Runway => Arc::new(RunwayAdapter::new(endpoint)?),
        ProviderId::Luma => Arc::new(LumaAdapter::new(endpoint)?),
        ProviderId::Kling => Arc::new(KlingAdapter::new(endpoint)?),
        ProviderId::Minimax => Arc::new(MinimaxAdapter::new(endpoint)?),
    };
    Ok(adapter)
}

/// Native status normalization table for a provider
pub fn normalization_table(provider: ProviderId) -> fn(&str) -> Option<shared::JobStatus> {
    match provider {
        ProviderId::Runway => runway::normalize_status,
        ProviderId::Luma => luma::normalize_status,
        ProviderId::Kling => kling::normalize_status,
        ProviderId::Minimax => minimax::normalize_status,
    }
}
