//! Test helpers and builder patterns for orchestrator tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use orchestrator::services::JsonTaskStore;
use orchestrator::{DispatchPolicy, MockImageSource, Orchestrator, StoreError, StoreResult, TaskStore};
use providers::{
    AdapterError, AdapterResult, GenerationRequest, MockProviderAdapter, ProviderAdapter, ProviderRegistry,
    StatusReport,
};
use shared::{JobStatus, ProviderId, ProviderTask, TaskId, TaskStatus, TaskUpdate};

use super::fixtures::TestFixtures;

/// Builder for mocked provider adapters
pub struct MockProviderBuilder {
    adapter: MockProviderAdapter,
}

impl MockProviderBuilder {
    pub fn new(provider: ProviderId) -> Self {
        let mut adapter = MockProviderAdapter::new();
        adapter.expect_id().return_const(provider);
        Self { adapter }
    }

    /// Job id derived from the scene narration: "Beat 3." -> "job-3"
    pub fn submits_by_scene(mut self) -> Self {
        self.adapter
            .expect_submit()
            .returning(|request: &GenerationRequest, _key: &str| Ok(TestHelpers::job_for(request)))
            .times(0..);
        self
    }

    /// Submit always fails with `error`
    pub fn submit_fails(mut self, error: AdapterError) -> Self {
        self.adapter
            .expect_submit()
            .returning(move |_: &GenerationRequest, _: &str| Err(error.clone()))
            .times(0..);
        self
    }

    /// Every job reports Processing `pending` times, then succeeds with
    /// `asset://<n>` where `job-<n>` is the job id
    pub fn succeeds_after(mut self, pending: u32) -> Self {
        let probes: Arc<Mutex<HashMap<String, u32>>> = Arc::default();
        self.adapter
            .expect_check_status()
            .returning(move |job_id: &str, _key: &str| {
                let mut probes = probes.lock().unwrap();
                let count = probes.entry(job_id.to_string()).or_insert(0);
                *count += 1;
                if *count <= pending {
                    Ok(StatusReport::new(JobStatus::Processing, "RUNNING"))
                } else {
                    let n = job_id.trim_start_matches("job-");
                    Ok(StatusReport::new(JobStatus::Succeeded, "SUCCEEDED").with_asset(format!("asset://{n}")))
                }
            })
            .times(0..);
        self
    }

    pub fn status_always(mut self, report: Result<StatusReport, AdapterError>) -> Self {
        self.adapter
            .expect_check_status()
            .returning(move |_: &str, _: &str| report.clone())
            .times(0..);
        self
    }

    pub fn never_polled(mut self) -> Self {
        self.adapter.expect_check_status().times(0);
        self
    }

    pub fn into_mock(self) -> MockProviderAdapter {
        self.adapter
    }
}

/// Builder for test orchestrators with sensible defaults
pub struct OrchestratorBuilder {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    credentials: HashMap<ProviderId, String>,
    policy: DispatchPolicy,
    images: MockImageSource,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        let mut images = MockImageSource::new();
        images
            .expect_load_image()
            .returning(|_: &str| Ok(b"\x89PNG fake".to_vec()))
            .times(0..);

        Self {
            adapters: Vec::new(),
            credentials: HashMap::new(),
            policy: TestFixtures::fast_policy(),
            images,
        }
    }

    /// Register an adapter and give its provider a credential
    pub fn with_adapter(mut self, adapter: impl ProviderAdapter + 'static, key: &str) -> Self {
        self.credentials.insert(adapter.id(), key.to_string());
        self.adapters.push(Arc::new(adapter));
        self
    }

    /// Register an adapter without configuring a credential
    pub fn with_unconfigured_adapter(mut self, adapter: impl ProviderAdapter + 'static) -> Self {
        self.adapters.push(Arc::new(adapter));
        self
    }

    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_images(mut self, images: MockImageSource) -> Self {
        self.images = images;
        self
    }

    fn registry(adapters: Vec<Arc<dyn ProviderAdapter>>, credentials: HashMap<ProviderId, String>) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for adapter in adapters {
            registry.register(adapter);
        }
        registry.set_credentials(credentials);
        registry
    }

    pub fn build(self) -> Orchestrator<JsonTaskStore, MockImageSource> {
        self.build_with_store(JsonTaskStore::in_memory())
    }

    pub fn build_with_store<S: TaskStore + 'static>(self, store: S) -> Orchestrator<S, MockImageSource> {
        let registry = Self::registry(self.adapters, self.credentials);
        Orchestrator::new(store, self.images, registry, self.policy)
    }
}

/// Adapter whose submissions take `delay`, recording how many overlap
pub struct SlowProvider {
    provider: ProviderId,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: Arc<AtomicUsize>,
}

impl SlowProvider {
    pub fn new(provider: ProviderId, delay: Duration) -> Self {
        Self {
            provider,
            delay,
            in_flight: AtomicUsize::new(0),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Highest number of submissions seen in flight at once
    pub fn peak(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.peak)
    }
}

#[async_trait]
impl ProviderAdapter for SlowProvider {
    fn id(&self) -> ProviderId {
        self.provider
    }

    async fn submit(&self, request: &GenerationRequest, _api_key: &str) -> AdapterResult<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(TestHelpers::job_for(request))
    }

    async fn check_status(&self, job_id: &str, _api_key: &str) -> AdapterResult<StatusReport> {
        let n = job_id.trim_start_matches("job-");
        Ok(StatusReport::new(JobStatus::Succeeded, "SUCCEEDED").with_asset(format!("asset://{n}")))
    }
}

/// In-memory store that refuses to record the submission of one scene
pub struct RejectSubmissionStore {
    inner: JsonTaskStore,
    scene_number: u32,
}

impl RejectSubmissionStore {
    pub fn new(scene_number: u32) -> Self {
        Self {
            inner: JsonTaskStore::in_memory(),
            scene_number,
        }
    }
}

#[async_trait]
impl TaskStore for RejectSubmissionStore {
    async fn create(&self, script_title: &str, scene_number: u32, provider: ProviderId) -> StoreResult<TaskId> {
        self.inner.create(script_title, scene_number, provider).await
    }

    async fn update(&self, task_id: TaskId, update: TaskUpdate) -> StoreResult<ProviderTask> {
        if update.status == Some(TaskStatus::Submitted) {
            let task = self.inner.get(task_id).await?.ok_or(StoreError::NotFound { task_id })?;
            if task.scene_number == self.scene_number {
                return Err(StoreError::InvariantViolation {
                    task_id,
                    message: "disk full".to_string(),
                });
            }
        }
        self.inner.update(task_id, update).await
    }

    async fn get(&self, task_id: TaskId) -> StoreResult<Option<ProviderTask>> {
        self.inner.get(task_id).await
    }

    async fn list_by_scene(&self, script_title: &str, scene_number: u32) -> StoreResult<Vec<ProviderTask>> {
        self.inner.list_by_scene(script_title, scene_number).await
    }

    async fn list_all(&self) -> StoreResult<Vec<ProviderTask>> {
        self.inner.list_all().await
    }

    async fn list_non_terminal(&self) -> StoreResult<Vec<ProviderTask>> {
        self.inner.list_non_terminal().await
    }
}

/// Assertion and scripting helpers
pub struct TestHelpers;

impl TestHelpers {
    /// "job-<n>" from a narration like "Beat <n>." or the Intro lines
    pub fn job_for(request: &GenerationRequest) -> String {
        let n = match request.narration.as_str() {
            "The lights flicker." => "1".to_string(),
            "She is behind you." => "2".to_string(),
            other => other.trim_start_matches("Beat ").trim_end_matches('.').to_string(),
        };
        format!("job-{n}")
    }

    pub fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    pub fn count(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }

    pub fn assert_all_succeeded(tasks: &[ProviderTask]) {
        for task in tasks {
            assert_eq!(task.status, TaskStatus::Succeeded, "task {} not succeeded", task.task_id);
            assert!(task.result_asset.is_some());
            assert!(!task.provider_job_id.is_empty());
        }
    }
}
