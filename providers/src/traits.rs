//! Adapter trait definitions for dependency injection

use async_trait::async_trait;
use shared::ProviderId;

use crate::error::AdapterResult;
use crate::types::{GenerationRequest, StatusReport};

/// Uniform capability over one external video-generation provider.
///
/// Implementations hold no per-job state and may be called concurrently.
/// Credentials are passed per call so a registry swap never races an
/// in-flight request.
#[mockall::automock]
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider this adapter talks to
    fn id(&self) -> ProviderId;

    /// Submit one generation job and return the provider's job id
    async fn submit(&self, request: &GenerationRequest, api_key: &str) -> AdapterResult<String>;

    /// Probe a previously submitted job
    async fn check_status(&self, job_id: &str, api_key: &str) -> AdapterResult<StatusReport>;
}
