//! MiniMax (Hailuo) video generation adapter

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use shared::{component_debug, logging::ComponentId, JobStatus, ProviderId};

use super::http::{normalize_or_processing, require_asset, require_str, str_at, HttpTransport};
use crate::error::{AdapterError, AdapterResult};
use crate::prompt::{compose_prompt, image_data_uri};
use crate::traits::ProviderAdapter;
use crate::types::{GenerationRequest, ProviderEndpoint, StatusReport};

const MODEL: &str = "I2V-01";
const MAX_PROMPT_CHARS: usize = 2000;
/// `base_resp.status_code` for an invalid API key
const INVALID_KEY_CODE: i64 = 1004;

pub fn normalize_status(native: &str) -> Option<JobStatus> {
    match native.trim().to_ascii_lowercase().as_str() {
        "queueing" | "preparing" => Some(JobStatus::Queued),
        "processing" => Some(JobStatus::Processing),
        "success" => Some(JobStatus::Succeeded),
        "fail" => Some(JobStatus::Failed),
        _ => None,
    }
}

/// MiniMax reports errors in `base_resp` with HTTP 200
fn check_base_resp(response: &Value) -> AdapterResult<()> {
    let code = response.pointer("/base_resp/status_code").and_then(Value::as_i64);
    let message = str_at(response, "/base_resp/status_msg").unwrap_or("no message").to_string();
    match code {
        Some(0) | None => Ok(()),
        Some(INVALID_KEY_CODE) => Err(AdapterError::Authentication { status: 200, body: message }),
        Some(code) => Err(AdapterError::Rejected { message: format!("code {}: {}", code, message) }),
    }
}

pub struct MinimaxAdapter {
    http: HttpTransport,
}

impl MinimaxAdapter {
    pub fn new(endpoint: &ProviderEndpoint) -> AdapterResult<Self> {
        Ok(Self { http: HttpTransport::new(endpoint)? })
    }
}

#[async_trait]
impl ProviderAdapter for MinimaxAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Minimax
    }

    async fn submit(&self, request: &GenerationRequest, api_key: &str) -> AdapterResult<String> {
        let body = json!({
            "model": MODEL,
            "prompt": compose_prompt(&request.visual_description, &request.narration, Some(MAX_PROMPT_CHARS)),
            "first_frame_image": image_data_uri(&request.character_image, &request.image_mime),
            "prompt_optimizer": true,
        });

        let url = self.http.url("/v1/video_generation", None)?;
        let response = self
            .http
            .post_json(url, api_key, &[], &body, StatusCode::OK)
            .await?;
        check_base_resp(&response)?;
        let job_id = require_str(&response, "/task_id")?;

        component_debug!(ComponentId::Providers, provider = "minimax", job_id = %job_id, "Submitted generation");
        Ok(job_id)
    }

    async fn check_status(&self, job_id: &str, api_key: &str) -> AdapterResult<StatusReport> {
        let mut url = self.http.url("/v1/query/video_generation", None)?;
        url.query_pairs_mut().append_pair("task_id", job_id);
        let response = self.http.get_json(url, api_key, &[]).await?;
        check_base_resp(&response)?;

        let native = require_str(&response, "/status")?;
        let asset = str_at(&response, "/file_id");
        let status = normalize_or_processing(ProviderId::Minimax, &native, normalize_status);
        let status = require_asset(ProviderId::Minimax, job_id, status, asset);

        let mut report = StatusReport::new(status, native);
        match (status, asset) {
            (JobStatus::Succeeded, Some(asset)) => report = report.with_asset(asset),
            (JobStatus::Failed, _) => report = report.with_failure("generation failed"),
            _ => {}
        }
        Ok(report)
    }
}
