//! Runway image-to-video adapter

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use shared::{component_debug, logging::ComponentId, JobStatus, ProviderId};

use super::http::{normalize_or_processing, require_asset, require_str, str_at, HttpTransport};
use crate::error::AdapterResult;
use crate::prompt::{compose_prompt, image_data_uri};
use crate::traits::ProviderAdapter;
use crate::types::{GenerationRequest, ProviderEndpoint, StatusReport};

const API_VERSION: &str = "2024-11-06";
const MODEL: &str = "gen3a_turbo";
const DURATION_SECS: u32 = 5;
const RATIO: &str = "768:1280";
const MAX_PROMPT_CHARS: usize = 1000;

/// Native status vocabulary of `GET /v1/tasks/{id}`
pub fn normalize_status(native: &str) -> Option<JobStatus> {
    match native.trim().to_ascii_uppercase().as_str() {
        "PENDING" | "THROTTLED" => Some(JobStatus::Queued),
        "RUNNING" => Some(JobStatus::Processing),
        "SUCCEEDED" => Some(JobStatus::Succeeded),
        "FAILED" | "CANCELLED" => Some(JobStatus::Failed),
        _ => None,
    }
}

pub struct RunwayAdapter {
    http: HttpTransport,
}

impl RunwayAdapter {
    pub fn new(endpoint: &ProviderEndpoint) -> AdapterResult<Self> {
        Ok(Self { http: HttpTransport::new(endpoint)? })
    }

    fn headers() -> [(&'static str, &'static str); 1] {
        [("X-Runway-Version", API_VERSION)]
    }
}

#[async_trait]
impl ProviderAdapter for RunwayAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Runway
    }

    async fn submit(&self, request: &GenerationRequest, api_key: &str) -> AdapterResult<String> {
        let body = json!({
            "model": MODEL,
            "promptImage": image_data_uri(&request.character_image, &request.image_mime),
            "promptText": compose_prompt(&request.visual_description, &request.narration, Some(MAX_PROMPT_CHARS)),
            "duration": DURATION_SECS,
            "ratio": RATIO,
        });

        let url = self.http.url("/v1/image_to_video", None)?;
        let response = self
            .http
            .post_json(url, api_key, &Self::headers(), &body, StatusCode::OK)
            .await?;
        let job_id = require_str(&response, "/id")?;

        component_debug!(ComponentId::Providers, provider = "runway", job_id = %job_id, "Submitted generation");
        Ok(job_id)
    }

    async fn check_status(&self, job_id: &str, api_key: &str) -> AdapterResult<StatusReport> {
        let url = self.http.url("/v1/tasks", Some(job_id))?;
        let response = self.http.get_json(url, api_key, &Self::headers()).await?;

        let native = require_str(&response, "/status")?;
        let asset = str_at(&response, "/output/0");
        let status = normalize_or_processing(ProviderId::Runway, &native, normalize_status);
        let status = require_asset(ProviderId::Runway, job_id, status, asset);

        let mut report = StatusReport::new(status, native);
        if status == JobStatus::Succeeded {
            if let Some(asset) = asset {
                report = report.with_asset(asset);
            }
        }
        if status == JobStatus::Failed {
            let reason = str_at(&response, "/failure")
                .or_else(|| str_at(&response, "/failureCode"))
                .unwrap_or("generation failed");
            report = report.with_failure(reason);
        }
        Ok(report)
    }
}
