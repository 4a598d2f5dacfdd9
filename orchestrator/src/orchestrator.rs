//! Batch dispatch and task tracking
//!
//! The orchestrator is the only component that moves a [`ProviderTask`]
//! through its lifecycle:
//!
//! ```text
//! Created -> Submitted -> Polling -> Polling ... -> Succeeded
//!    |                       |
//!    +-> Failed              +-> Failed
//! ```
//!
//! Submissions for a batch run concurrently, bounded by one semaphore per
//! provider. Each submitted task is then polled in its own tokio task so a
//! slow job never holds up the rest of the batch.
//!
//! Every batch runs under its own [`CancellationToken`], normally a child of
//! [`Orchestrator::batch_token`]. Cancelling it stops that batch only;
//! [`Orchestrator::shutdown`] stops every batch.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use futures_util::future::join_all;
use providers::prompt::mime_for_path;
use providers::{GenerationRequest, ProviderAdapter, ProviderRegistry, StatusReport};
use shared::{
    component_error, component_info, component_warn, logging::ComponentId, Character, FailureCategory, JobStatus,
    ProviderId, ProviderTask, Scene, Script, TaskError, TaskId, TaskStatus, TaskUpdate,
};
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::DispatchPolicy;
use crate::core::activity::ActivityLog;
use crate::core::readiness::{is_ready, ready_scenes, Readiness};
use crate::core::reports::{BatchReport, DispatchReport, SceneOutcome};
use crate::error::{OrchestratorError, OrchestratorResult, StoreError};
use crate::traits::{ApiKeySource, ImageSource, TaskStore};

pub struct Orchestrator<S, I>
where
    S: TaskStore + 'static,
    I: ImageSource + 'static,
{
    store: Arc<S>,
    images: Arc<I>,
    registry: Arc<RwLock<ProviderRegistry>>,
    policy: DispatchPolicy,
    /// In-flight network calls per provider
    limits: Arc<HashMap<ProviderId, Arc<Semaphore>>>,
    activity: Arc<Mutex<ActivityLog>>,
    /// Serializes the in-flight check with task creation
    dispatch_lock: Arc<Mutex<()>>,
    /// Parent of every batch token
    shutdown: CancellationToken,
}

impl<S, I> Clone for Orchestrator<S, I>
where
    S: TaskStore + 'static,
    I: ImageSource + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            images: Arc::clone(&self.images),
            registry: Arc::clone(&self.registry),
            policy: self.policy.clone(),
            limits: Arc::clone(&self.limits),
            activity: Arc::clone(&self.activity),
            dispatch_lock: Arc::clone(&self.dispatch_lock),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<S, I> Orchestrator<S, I>
where
    S: TaskStore + 'static,
    I: ImageSource + 'static,
{
    pub fn new(store: S, images: I, registry: ProviderRegistry, policy: DispatchPolicy) -> Self {
        let limits = ProviderId::ALL
            .into_iter()
            .map(|provider| (provider, Arc::new(Semaphore::new(policy.max_in_flight.max(1)))))
            .collect();

        Self {
            store: Arc::new(store),
            images: Arc::new(images),
            registry: Arc::new(RwLock::new(registry)),
            policy,
            limits: Arc::new(limits),
            activity: Arc::new(Mutex::new(ActivityLog::default())),
            dispatch_lock: Arc::new(Mutex::new(())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Continue an existing activity window
    pub fn with_activity(mut self, log: ActivityLog) -> Self {
        self.activity = Arc::new(Mutex::new(log));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Fresh token for one batch. Cancelling it leaves other batches
    /// running; it is also cancelled by [`Orchestrator::shutdown`].
    pub fn batch_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Cancel every batch, current and future
    pub fn shutdown(&self) {
        component_warn!(ComponentId::Orchestrator, "Shutdown requested");
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Snapshot of the activity window, newest first
    pub async fn activity(&self) -> ActivityLog {
        self.activity.lock().await.clone()
    }

    pub async fn available_providers(&self) -> BTreeSet<ProviderId> {
        self.registry.read().await.list_available()
    }

    /// Replace the cached credentials
    pub async fn set_credentials(&self, credentials: HashMap<ProviderId, String>) {
        self.registry.write().await.set_credentials(credentials);
    }

    /// Reload credentials from `source` and return the usable providers
    pub async fn refresh_credentials<A: ApiKeySource>(&self, source: &A) -> OrchestratorResult<BTreeSet<ProviderId>> {
        let credentials = source.load_credentials().await?;
        let mut registry = self.registry.write().await;
        registry.set_credentials(credentials);
        Ok(registry.list_available())
    }

    async fn record(&self, message: String) {
        component_info!(ComponentId::Orchestrator, "{}", message);
        self.activity.lock().await.record(message);
    }

    /// Submit every ready scene of `script` to `provider`.
    ///
    /// Returns once each scene has been submitted, rejected or failed; use
    /// [`Orchestrator::track`] or [`Orchestrator::dispatch_and_track`] to
    /// follow the jobs to completion. A failure in one scene, including a
    /// task store error, is reported in that scene's outcome and never
    /// discards the others.
    pub async fn dispatch(
        &self,
        script: &Script,
        characters: &BTreeMap<String, Character>,
        provider: ProviderId,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<DispatchReport> {
        let (adapter, api_key) = self
            .registry
            .read()
            .await
            .select(provider)
            .map_err(|e| OrchestratorError::ProviderUnavailable {
                provider,
                reason: e.to_string(),
            })?;

        let readiness = Readiness::of(script);
        let ready = ready_scenes(script);
        component_info!(
            ComponentId::Orchestrator,
            script = %script.title,
            provider = %provider,
            "Dispatching {} of {} scenes",
            readiness.ready,
            readiness.total
        );

        let outcomes = join_all(
            ready
                .into_iter()
                .map(|scene| self.dispatch_scene(&script.title, scene, characters, adapter.as_ref(), &api_key, cancel)),
        )
        .await;

        let report = DispatchReport {
            script_title: script.title.clone(),
            provider,
            ready: readiness.ready,
            total: readiness.total,
            outcomes,
        };
        self.record(format!("'{}': {} to {}", script.title, report.summary(), provider)).await;
        Ok(report)
    }

    /// Dispatch a script and poll every submitted task until it settles
    pub async fn dispatch_and_track(
        &self,
        script: &Script,
        characters: &BTreeMap<String, Character>,
        provider: ProviderId,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<BatchReport> {
        let dispatch = self.dispatch(script, characters, provider, cancel).await?;
        let tasks = self.track(dispatch.submitted_task_ids(), cancel).await;
        Ok(BatchReport { dispatch, tasks })
    }

    async fn dispatch_scene(
        &self,
        script_title: &str,
        scene: &Scene,
        characters: &BTreeMap<String, Character>,
        adapter: &dyn ProviderAdapter,
        api_key: &str,
        cancel: &CancellationToken,
    ) -> SceneOutcome {
        let scene_number = scene.scene_number;
        let provider = adapter.id();

        if cancel.is_cancelled() {
            return SceneOutcome::Cancelled { scene_number };
        }

        let request = match self.build_request(scene, characters, provider).await {
            Ok(request) => request,
            Err(message) => {
                self.record(format!(
                    "Scene {} of '{}' skipped: {}: {}",
                    scene_number,
                    script_title,
                    FailureCategory::Validation,
                    message
                ))
                .await;
                return SceneOutcome::Invalid { scene_number, message };
            }
        };

        let task_id = {
            let _guard = self.dispatch_lock.lock().await;
            let existing = match self.store.list_by_scene(script_title, scene_number).await {
                Ok(existing) => existing,
                Err(err) => return self.store_failed(script_title, scene_number, None, None, err).await,
            };
            if let Some(active) = existing.iter().rev().find(|task| !task.is_terminal()) {
                component_warn!(
                    ComponentId::Orchestrator,
                    task_id = %active.task_id,
                    scene = scene_number,
                    "Scene already has a task in flight"
                );
                return SceneOutcome::AlreadyInFlight {
                    scene_number,
                    task_id: active.task_id,
                };
            }
            if cancel.is_cancelled() {
                return SceneOutcome::Cancelled { scene_number };
            }
            match self.store.create(script_title, scene_number, provider).await {
                Ok(task_id) => task_id,
                Err(err) => return self.store_failed(script_title, scene_number, None, None, err).await,
            }
        };
        self.record(format!(
            "Scene {} of '{}' queued for {} (task {})",
            scene_number,
            script_title,
            provider,
            task_id.short()
        ))
        .await;

        let limiter = self.limiter(provider);
        let request = &request;
        let result = self
            .policy
            .retry
            .run(cancel, "submit", move || async move {
                let _permit = match limiter {
                    Some(semaphore) => semaphore.acquire().await.ok(),
                    None => None,
                };
                adapter.submit(request, api_key).await
            })
            .await;

        match result {
            Ok(job_id) => {
                if let Err(err) = self.store.update(task_id, TaskUpdate::submitted(job_id.clone())).await {
                    // The provider holds a job the store does not know about
                    let error = TaskError::new(
                        FailureCategory::Transport,
                        format!("job {} accepted by {} but not recorded: {}", job_id, provider, err),
                    );
                    if let Err(close_err) = self.store.update(task_id, TaskUpdate::failed(error)).await {
                        component_error!(
                            ComponentId::Orchestrator,
                            task_id = %task_id,
                            "Could not close unrecorded task: {}",
                            close_err
                        );
                    }
                    return self
                        .store_failed(script_title, scene_number, Some(task_id), Some(job_id), err)
                        .await;
                }
                self.record(format!(
                    "Scene {} of '{}' submitted to {} (job {})",
                    scene_number, script_title, provider, job_id
                ))
                .await;

                // A Submitted task is moved to Polling by its first poll
                match self.store.update(task_id, TaskUpdate::polling()).await {
                    Ok(_) => {
                        self.record(format!(
                            "Scene {} of '{}' awaiting {} job {}",
                            scene_number, script_title, provider, job_id
                        ))
                        .await;
                    }
                    Err(err) => {
                        component_warn!(
                            ComponentId::Orchestrator,
                            task_id = %task_id,
                            "Task left in Submitted: {}",
                            err
                        );
                    }
                }

                SceneOutcome::Submitted {
                    scene_number,
                    task_id,
                    provider_job_id: job_id,
                }
            }
            Err(err) => {
                let error = err.to_task_error();
                match self.store.update(task_id, TaskUpdate::failed(error.clone())).await {
                    Ok(task) => {
                        self.record_failure(&task, &error).await;
                        SceneOutcome::Failed {
                            scene_number,
                            task_id,
                            category: error.category,
                            message: error.message,
                        }
                    }
                    Err(store_err) => {
                        self.store_failed(script_title, scene_number, Some(task_id), None, store_err)
                            .await
                    }
                }
            }
        }
    }

    async fn store_failed(
        &self,
        script_title: &str,
        scene_number: u32,
        task_id: Option<TaskId>,
        provider_job_id: Option<String>,
        err: StoreError,
    ) -> SceneOutcome {
        component_error!(
            ComponentId::Orchestrator,
            scene = scene_number,
            job_id = provider_job_id.as_deref().unwrap_or("-"),
            "Task store failed: {}",
            err
        );
        self.record(format!(
            "Scene {} of '{}' could not be recorded: {}",
            scene_number, script_title, err
        ))
        .await;
        SceneOutcome::StoreFailed {
            scene_number,
            task_id,
            provider_job_id,
            message: err.to_string(),
        }
    }

    /// Resolve the scene's character image into a generation request.
    ///
    /// The error string is the validation diagnostic shown to the user.
    async fn build_request(
        &self,
        scene: &Scene,
        characters: &BTreeMap<String, Character>,
        provider: ProviderId,
    ) -> Result<GenerationRequest, String> {
        if !is_ready(scene) {
            return Err("scene needs a character and a visual description".to_string());
        }
        let name = scene.character_name().unwrap_or_default();
        let character = characters
            .get(name)
            .ok_or_else(|| format!("unknown character '{}'", name))?;
        let reference = character
            .image_reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| format!("character '{}' has no reference image", name))?;
        let image = self
            .images
            .load_image(reference)
            .await
            .map_err(|e| e.to_string())?;

        Ok(GenerationRequest::new(provider, image, scene.visual(), scene.narration.trim())
            .with_mime(mime_for_path(reference)))
    }

    fn limiter(&self, provider: ProviderId) -> Option<&Semaphore> {
        self.limits.get(&provider).map(|s| s.as_ref())
    }

    /// Poll each task in its own tokio task until it is terminal, times out
    /// or `cancel` fires. Returns the final snapshots in the order given.
    ///
    /// A task whose tracking fails is logged and reported with its last
    /// stored snapshot, or left out if the store cannot produce one.
    pub async fn track(&self, task_ids: Vec<TaskId>, cancel: &CancellationToken) -> Vec<ProviderTask> {
        let handles: Vec<_> = task_ids
            .into_iter()
            .map(|task_id| {
                let this = self.clone();
                let cancel = cancel.clone();
                (
                    task_id,
                    tokio::spawn(async move { this.poll_until_settled(task_id, &cancel).await }),
                )
            })
            .collect();

        let mut tasks = Vec::with_capacity(handles.len());
        for (task_id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(OrchestratorError::PollingAborted {
                    task_id,
                    message: e.to_string(),
                }),
            };
            match result {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    component_error!(ComponentId::Orchestrator, task_id = %task_id, "Tracking failed: {}", err);
                    self.record(format!("Task {} could not be tracked: {}", task_id.short(), err))
                        .await;
                    if let Ok(task) = self.snapshot(task_id).await {
                        tasks.push(task);
                    }
                }
            }
        }
        tasks
    }

    /// Poll one task on the configured interval until it settles
    pub async fn poll_until_settled(
        &self,
        task_id: TaskId,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<ProviderTask> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return self.snapshot(task_id).await;
            }

            let task = self.poll_once(task_id, cancel).await?;
            if task.is_terminal() {
                return Ok(task);
            }

            if started.elapsed() >= self.policy.poll_timeout {
                let error = TaskError::new(
                    FailureCategory::Transport,
                    format!("polling timed out after {:?}", self.policy.poll_timeout),
                );
                return self.fail_task(&task, error).await;
            }

            tokio::select! {
                _ = cancel.cancelled() => return self.snapshot(task_id).await,
                _ = tokio::time::sleep(self.policy.poll_interval) => {}
            }
        }
    }

    /// Probe the provider once and record the result
    pub async fn poll_once(&self, task_id: TaskId, cancel: &CancellationToken) -> OrchestratorResult<ProviderTask> {
        let mut task = self.snapshot(task_id).await?;
        match task.status {
            TaskStatus::Succeeded | TaskStatus::Failed => return Ok(task),
            TaskStatus::Created => {
                return Err(StoreError::IllegalTransition {
                    task_id,
                    from: TaskStatus::Created,
                    to: TaskStatus::Polling,
                }
                .into())
            }
            TaskStatus::Submitted => {
                task = self.store.update(task_id, TaskUpdate::polling()).await?;
                self.record(format!(
                    "Scene {} of '{}' awaiting {} job {}",
                    task.scene_number, task.script_title, task.provider, task.provider_job_id
                ))
                .await;
            }
            TaskStatus::Polling => {}
        }

        let selection = self.registry.read().await.select(task.provider);
        let (adapter, api_key) = match selection {
            Ok(selection) => selection,
            Err(err) => return self.fail_task(&task, err.to_task_error()).await,
        };

        let limiter = self.limiter(task.provider);
        let adapter = adapter.as_ref();
        let job_id = task.provider_job_id.as_str();
        let key = api_key.as_str();
        let result = self
            .policy
            .retry
            .run(cancel, "check_status", move || async move {
                let _permit = match limiter {
                    Some(semaphore) => semaphore.acquire().await.ok(),
                    None => None,
                };
                adapter.check_status(job_id, key).await
            })
            .await;

        let poll_count = task.poll_count + 1;
        match result {
            Ok(report) => self.apply_report(&task, report, poll_count).await,
            Err(err) if err.is_retryable() && cancel.is_cancelled() => Ok(task),
            Err(err) => {
                let error = err.to_task_error();
                self.fail_task_counted(&task, error, Some(poll_count)).await
            }
        }
    }

    async fn apply_report(
        &self,
        task: &ProviderTask,
        report: StatusReport,
        poll_count: u32,
    ) -> OrchestratorResult<ProviderTask> {
        let StatusReport {
            status,
            asset,
            native_status,
            failure_reason,
        } = report;

        match (status, asset) {
            (JobStatus::Succeeded, Some(asset)) => {
                let updated = self
                    .store
                    .update(task.task_id, TaskUpdate::succeeded(asset.clone(), poll_count))
                    .await?;
                self.record(format!(
                    "Scene {} of '{}' succeeded on {}: {}",
                    task.scene_number, task.script_title, task.provider, asset
                ))
                .await;
                Ok(updated)
            }
            (JobStatus::Failed, _) => {
                let message = failure_reason.unwrap_or_else(|| format!("provider reported {}", native_status));
                let error = TaskError::new(FailureCategory::ProviderSideFailure, message);
                self.fail_task_counted(task, error, Some(poll_count)).await
            }
            (status, _) => {
                if status == JobStatus::Succeeded {
                    component_warn!(
                        ComponentId::Orchestrator,
                        task_id = %task.task_id,
                        "Success reported without an asset, polling again"
                    );
                }
                Ok(self.store.update(task.task_id, TaskUpdate::polled(poll_count)).await?)
            }
        }
    }

    async fn fail_task(&self, task: &ProviderTask, error: TaskError) -> OrchestratorResult<ProviderTask> {
        self.fail_task_counted(task, error, None).await
    }

    async fn fail_task_counted(
        &self,
        task: &ProviderTask,
        error: TaskError,
        poll_count: Option<u32>,
    ) -> OrchestratorResult<ProviderTask> {
        let mut update = TaskUpdate::failed(error.clone());
        update.poll_count = poll_count;
        let updated = self.store.update(task.task_id, update).await?;
        self.record_failure(&updated, &error).await;
        Ok(updated)
    }

    async fn record_failure(&self, task: &ProviderTask, error: &TaskError) {
        component_error!(
            ComponentId::Orchestrator,
            task_id = %task.task_id,
            provider = %task.provider,
            scene = task.scene_number,
            "Task failed: {}",
            error.diagnostic()
        );
        self.record(format!(
            "Scene {} of '{}' failed on {}: {}",
            task.scene_number,
            task.script_title,
            task.provider,
            error.diagnostic()
        ))
        .await;
    }

    async fn snapshot(&self, task_id: TaskId) -> OrchestratorResult<ProviderTask> {
        self.store
            .get(task_id)
            .await?
            .ok_or_else(|| StoreError::NotFound { task_id }.into())
    }

    /// Resume tracking of every task left unfinished by an earlier run.
    ///
    /// `Submitted` and `Polling` tasks are polled again. A `Created` task
    /// never reached its provider, so it is failed and its scene becomes
    /// dispatchable again.
    pub async fn reconcile(&self, cancel: &CancellationToken) -> OrchestratorResult<Vec<ProviderTask>> {
        let pending = self.store.list_non_terminal().await?;
        if pending.is_empty() {
            return Ok(Vec::new());
        }
        self.record(format!("Reconciling {} unfinished task(s)", pending.len())).await;

        let mut resumable = Vec::new();
        let mut settled = Vec::new();
        for task in pending {
            if task.status == TaskStatus::Created {
                let error = TaskError::new(FailureCategory::Transport, "dispatch interrupted before submission");
                settled.push(self.fail_task(&task, error).await?);
            } else {
                resumable.push(task.task_id);
            }
        }

        settled.extend(self.track(resumable, cancel).await);
        Ok(settled)
    }
}
