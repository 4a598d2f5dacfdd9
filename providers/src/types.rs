//! Provider-facing request and response types

use std::time::Duration;

use shared::{JobStatus, ProviderId};

/// Default timeout for a single provider HTTP request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Canonical, provider-neutral generation request for one scene
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Raw bytes of the character reference image used as the first frame
    pub character_image: Vec<u8>,
    /// MIME type of `character_image`, used when building data URIs
    pub image_mime: String,
    pub visual_description: String,
    pub narration: String,
    pub provider: ProviderId,
}

impl GenerationRequest {
    pub fn new(
        provider: ProviderId,
        character_image: Vec<u8>,
        visual_description: impl Into<String>,
        narration: impl Into<String>,
    ) -> Self {
        Self {
            character_image,
            image_mime: "image/png".to_string(),
            visual_description: visual_description.into(),
            narration: narration.into(),
            provider,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.image_mime = mime.into();
        self
    }
}

/// Result of one provider status probe, already normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: JobStatus,
    /// Result asset reference, present only once the job has succeeded
    pub asset: Option<String>,
    /// Provider's own status string, kept for logs
    pub native_status: String,
    /// Provider failure reason when the job failed
    pub failure_reason: Option<String>,
}

impl StatusReport {
    pub fn new(status: JobStatus, native_status: impl Into<String>) -> Self {
        Self {
            status,
            asset: None,
            native_status: native_status.into(),
            failure_reason: None,
        }
    }

    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = Some(asset.into());
        self
    }

    pub fn with_failure(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }
}

/// Where and how to reach one provider's API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub timeout: Duration,
}

impl ProviderEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Public production endpoint for a provider
    pub fn default_for(provider: ProviderId) -> Self {
        let base_url = match provider {
            ProviderId::Runway => "https://api.dev.runwayml.com",
            ProviderId::Luma => "https://api.lumalabs.ai",
            ProviderId::Kling => "https://api.klingai.com",
            ProviderId::Minimax => "https://api.minimaxi.chat",
        };
        Self::new(base_url)
    }
}
