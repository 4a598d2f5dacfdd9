//! Kling image-to-video adapter
//!
//! Kling wraps every payload in `{code, message, data}` and signals
//! rejections with a non-zero `code` even on HTTP 200.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use shared::{component_debug, logging::ComponentId, JobStatus, ProviderId};

use super::http::{normalize_or_processing, require_asset, require_str, str_at, HttpTransport};
use crate::error::{AdapterError, AdapterResult};
use crate::prompt::{compose_prompt, encode_image};
use crate::traits::ProviderAdapter;
use crate::types::{GenerationRequest, ProviderEndpoint, StatusReport};

const IMAGE2VIDEO_PATH: &str = "/v1/videos/image2video";
const MODEL: &str = "kling-v1";
const DURATION: &str = "5";
const ASPECT_RATIO: &str = "9:16";
const MODE: &str = "std";
const MAX_PROMPT_CHARS: usize = 2500;

pub fn normalize_status(native: &str) -> Option<JobStatus> {
    match native.trim().to_ascii_lowercase().as_str() {
        "submitted" => Some(JobStatus::Queued),
        "processing" => Some(JobStatus::Processing),
        "succeed" | "succeeded" => Some(JobStatus::Succeeded),
        "failed" => Some(JobStatus::Failed),
        _ => None,
    }
}

/// Reject envelopes whose `code` is present and non-zero
fn check_envelope(response: &Value) -> AdapterResult<()> {
    match response.get("code").and_then(Value::as_i64) {
        Some(0) | None => Ok(()),
        Some(code) => Err(AdapterError::Rejected {
            message: format!(
                "code {}: {}",
                code,
                str_at(response, "/message").unwrap_or("no message")
            ),
        }),
    }
}

pub struct KlingAdapter {
    http: HttpTransport,
}

impl KlingAdapter {
    pub fn new(endpoint: &ProviderEndpoint) -> AdapterResult<Self> {
        Ok(Self { http: HttpTransport::new(endpoint)? })
    }
}

#[async_trait]
impl ProviderAdapter for KlingAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Kling
    }

    async fn submit(&self, request: &GenerationRequest, api_key: &str) -> AdapterResult<String> {
        // Kling takes the bare base64 payload, not a data URI
        let body = json!({
            "model_name": MODEL,
            "image": encode_image(&request.character_image),
            "prompt": compose_prompt(&request.visual_description, &request.narration, Some(MAX_PROMPT_CHARS)),
            "mode": MODE,
            "duration": DURATION,
            "aspect_ratio": ASPECT_RATIO,
        });

        let url = self.http.url(IMAGE2VIDEO_PATH, None)?;
        let response = self
            .http
            .post_json(url, api_key, &[], &body, StatusCode::OK)
            .await?;
        check_envelope(&response)?;
        let job_id = require_str(&response, "/data/task_id")?;

        component_debug!(ComponentId::Providers, provider = "kling", job_id = %job_id, "Submitted generation");
        Ok(job_id)
    }

    async fn check_status(&self, job_id: &str, api_key: &str) -> AdapterResult<StatusReport> {
        let url = self.http.url(IMAGE2VIDEO_PATH, Some(job_id))?;
        let response = self.http.get_json(url, api_key, &[]).await?;
        check_envelope(&response)?;

        let native = require_str(&response, "/data/task_status")?;
        let asset = str_at(&response, "/data/task_result/works/0/resource/resource");
        let status = normalize_or_processing(ProviderId::Kling, &native, normalize_status);
        let status = require_asset(ProviderId::Kling, job_id, status, asset);

        let mut report = StatusReport::new(status, native);
        match (status, asset) {
            (JobStatus::Succeeded, Some(asset)) => report = report.with_asset(asset),
            (JobStatus::Failed, _) => {
                report = report.with_failure(str_at(&response, "/data/task_status_msg").unwrap_or("generation failed"))
            }
            _ => {}
        }
        Ok(report)
    }
}
