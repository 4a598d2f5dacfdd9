//! HTTP plumbing shared by every provider adapter

use reqwest::StatusCode;
use serde_json::Value;
use shared::{component_warn, logging::ComponentId, JobStatus, ProviderId};
use url::Url;

use crate::error::{AdapterError, AdapterResult};
use crate::types::ProviderEndpoint;

/// Upper bound on the response body kept in error diagnostics
const MAX_ERROR_BODY: usize = 512;

/// Thin reqwest wrapper bound to one provider's base URL
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(endpoint: &ProviderEndpoint) -> AdapterResult<Self> {
        let base_url = Url::parse(endpoint.base_url.trim_end_matches('/'))?;
        let client = reqwest::Client::builder()
            .timeout(endpoint.timeout)
            .build()
            .map_err(|e| AdapterError::Config { message: e.to_string() })?;
        Ok(Self { client, base_url })
    }

    /// Resolve a fixed path, optionally followed by one escaped id segment
    pub fn url(&self, path: &str, id_segment: Option<&str>) -> AdapterResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| AdapterError::Config {
                message: format!("base URL {} cannot carry a path", self.base_url),
            })?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
            if let Some(id) = id_segment {
                segments.push(id);
            }
        }
        Ok(url)
    }

    /// POST a JSON body and require exactly `expected` as the success code
    pub async fn post_json(
        &self,
        url: Url,
        api_key: &str,
        headers: &[(&str, &str)],
        body: &Value,
        expected: StatusCode,
    ) -> AdapterResult<Value> {
        let mut request = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await?;
        read_json(response, expected).await
    }

    /// GET a JSON document, requiring 200
    pub async fn get_json(&self, url: Url, api_key: &str, headers: &[(&str, &str)]) -> AdapterResult<Value> {
        let mut request = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", api_key));
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await?;
        read_json(response, StatusCode::OK).await
    }
}

async fn read_json(response: reqwest::Response, expected: StatusCode) -> AdapterResult<Value> {
    let status = response.status();
    let body = response.text().await?;

    if status != expected {
        let body = truncate_body(&body);
        return Err(match status.as_u16() {
            401 | 403 => AdapterError::Authentication { status: status.as_u16(), body },
            code => AdapterError::Http { status: code, body },
        });
    }

    serde_json::from_str(&body)
        .map_err(|e| AdapterError::malformed(format!("response is not JSON: {}", e)))
}

fn truncate_body(body: &str) -> String {
    crate::prompt::truncate_chars(body.trim(), MAX_ERROR_BODY)
}

/// Look up a string at a JSON pointer such as `/data/task_id`
pub fn str_at<'a>(json: &'a Value, pointer: &str) -> Option<&'a str> {
    json.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Like [`str_at`], but a missing field is a malformed response
pub fn require_str(json: &Value, pointer: &str) -> AdapterResult<String> {
    str_at(json, pointer)
        .map(str::to_string)
        .ok_or_else(|| AdapterError::malformed(format!("missing field {}", pointer)))
}

/// Apply a provider's normalization table, failing open to `Processing`
pub fn normalize_or_processing(
    provider: ProviderId,
    native: &str,
    table: fn(&str) -> Option<JobStatus>,
) -> JobStatus {
    match table(native) {
        Some(status) => status,
        None => {
            component_warn!(
                ComponentId::Providers,
                provider = %provider,
                native_status = native,
                "Unrecognized provider status, treating as processing"
            );
            JobStatus::Processing
        }
    }
}

/// Demote a success without an asset locator to `Processing`
pub fn require_asset(provider: ProviderId, job_id: &str, status: JobStatus, asset: Option<&str>) -> JobStatus {
    if status == JobStatus::Succeeded && asset.is_none() {
        component_warn!(
            ComponentId::Providers,
            provider = %provider,
            job_id = job_id,
            "Provider reported success without an asset, polling again"
        );
        return JobStatus::Processing;
    }
    status
}
