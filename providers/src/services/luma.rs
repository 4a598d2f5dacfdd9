//! Luma Dream Machine adapter

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use shared::{component_debug, logging::ComponentId, JobStatus, ProviderId};

use super::http::{normalize_or_processing, require_asset, require_str, str_at, HttpTransport};
use crate::error::AdapterResult;
use crate::prompt::{compose_prompt, image_data_uri};
use crate::traits::ProviderAdapter;
use crate::types::{GenerationRequest, ProviderEndpoint, StatusReport};

const GENERATIONS_PATH: &str = "/dream-machine/v1/generations";
const MODEL: &str = "ray-2";
const DURATION: &str = "5s";
const ASPECT_RATIO: &str = "9:16";
const MAX_PROMPT_CHARS: usize = 5000;

pub fn normalize_status(native: &str) -> Option<JobStatus> {
    match native.trim().to_ascii_lowercase().as_str() {
        "queued" => Some(JobStatus::Queued),
        "dreaming" => Some(JobStatus::Processing),
        "completed" => Some(JobStatus::Succeeded),
        "failed" => Some(JobStatus::Failed),
        _ => None,
    }
}

pub struct LumaAdapter {
    http: HttpTransport,
}

impl LumaAdapter {
    pub fn new(endpoint: &ProviderEndpoint) -> AdapterResult<Self> {
        Ok(Self { http: HttpTransport::new(endpoint)? })
    }
}

#[async_trait]
impl ProviderAdapter for LumaAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Luma
    }

    async fn submit(&self, request: &GenerationRequest, api_key: &str) -> AdapterResult<String> {
        let body = json!({
            "model": MODEL,
            "prompt": compose_prompt(&request.visual_description, &request.narration, Some(MAX_PROMPT_CHARS)),
            "aspect_ratio": ASPECT_RATIO,
            "duration": DURATION,
            "keyframes": {
                "frame0": {
                    "type": "image",
                    "url": image_data_uri(&request.character_image, &request.image_mime),
                }
            }
        });

        // Luma acknowledges creation with 201, never 200
        let url = self.http.url(GENERATIONS_PATH, None)?;
        let response = self
            .http
            .post_json(url, api_key, &[], &body, StatusCode::CREATED)
            .await?;
        let job_id = require_str(&response, "/id")?;

        component_debug!(ComponentId::Providers, provider = "luma", job_id = %job_id, "Submitted generation");
        Ok(job_id)
    }

    async fn check_status(&self, job_id: &str, api_key: &str) -> AdapterResult<StatusReport> {
        let url = self.http.url(GENERATIONS_PATH, Some(job_id))?;
        let response = self.http.get_json(url, api_key, &[]).await?;

        let native = require_str(&response, "/state")?;
        let asset = str_at(&response, "/assets/video");
        let status = normalize_or_processing(ProviderId::Luma, &native, normalize_status);
        let status = require_asset(ProviderId::Luma, job_id, status, asset);

        let mut report = StatusReport::new(status, native);
        match (status, asset) {
            (JobStatus::Succeeded, Some(asset)) => report = report.with_asset(asset),
            (JobStatus::Failed, _) => {
                report = report.with_failure(str_at(&response, "/failure_reason").unwrap_or("generation failed"))
            }
            _ => {}
        }
        Ok(report)
    }
}
