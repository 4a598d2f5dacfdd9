//! Command-line entry point for the studio dispatch core

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;

use orchestrator::config::{DEFAULT_DATA_DIR, StudioConfig};
use orchestrator::services::{FsImageSource, JsonTaskStore, RealApiKeySource, StudioRepository};
use orchestrator::{is_ready, project_summaries, DispatchPolicy, Orchestrator, Readiness, RetryPolicy, TaskStore};
use providers::ProviderRegistry;
use shared::{component_info, logging, logging::ComponentId, ProviderId, ProviderTask};

type StudioOrchestrator = Orchestrator<JsonTaskStore, FsImageSource>;

/// Dispatch horror-short scenes to image-to-video providers and track the jobs
#[derive(Parser, Debug)]
#[command(name = "orchestrator")]
#[command(about = "Dispatches ready scenes to video providers and tracks the generated clips")]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Studio data directory
    #[arg(long, env = "STUDIO_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Root for relative character image paths
    #[arg(long, default_value = ".")]
    pub image_root: PathBuf,

    /// Seconds between status probes of one job
    #[arg(long, env = "STUDIO_POLL_INTERVAL_SECS", default_value_t = 10)]
    pub poll_interval_secs: u64,

    /// Seconds of polling before a job is failed as timed out
    #[arg(long, env = "STUDIO_POLL_TIMEOUT_SECS", default_value_t = 600)]
    pub poll_timeout_secs: u64,

    /// Concurrent requests per provider
    #[arg(long, env = "STUDIO_MAX_IN_FLIGHT", default_value_t = 3)]
    pub max_in_flight: usize,

    /// Timeout of a single provider request in seconds
    #[arg(long, env = "STUDIO_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Retries for transport failures
    #[arg(long, env = "STUDIO_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List providers and whether they are configured
    Providers,
    /// Show readiness of a script's scenes, or of every project
    Scenes {
        #[arg(long)]
        script: Option<String>,
    },
    /// Split a script's content into scenes
    Split {
        #[arg(long)]
        script: String,
    },
    /// Submit a script's ready scenes to a provider
    Dispatch {
        #[arg(long)]
        script: String,
        #[arg(long)]
        provider: ProviderId,
        /// Return after submission instead of polling to completion
        #[arg(long)]
        no_wait: bool,
    },
    /// List recorded provider tasks
    Tasks {
        #[arg(long)]
        script: Option<String>,
        #[arg(long, requires = "script")]
        scene: Option<u32>,
    },
    /// Resume polling of tasks left unfinished by an earlier run
    Reconcile,
    /// Print characters, scripts, settings and tasks as JSON
    Export,
    /// Merge characters, scripts and keys from an exported JSON file
    Import {
        #[arg(long)]
        file: PathBuf,
    },
    /// Show the recent activity feed
    Activity,
    /// Save a provider API key to settings.json
    SetKey {
        #[arg(long)]
        provider: ProviderId,
        #[arg(long)]
        key: String,
    },
}

impl Args {
    pub fn studio_config(&self) -> StudioConfig {
        StudioConfig {
            data_dir: self.data_dir.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            policy: DispatchPolicy {
                max_in_flight: self.max_in_flight,
                retry: RetryPolicy {
                    max_retries: self.max_retries,
                    ..RetryPolicy::default()
                },
                poll_interval: Duration::from_secs(self.poll_interval_secs),
                poll_timeout: Duration::from_secs(self.poll_timeout_secs),
            },
            base_urls: Default::default(),
        }
        .with_base_urls_from_env()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before parsing so STUDIO_* fallbacks see it
    let _ = dotenv::dotenv();
    let args = Args::parse();

    logging::init_tracing(Some(&args.log_level));
    let config = args.studio_config();
    config.validate().context("invalid configuration")?;

    let repository = StudioRepository::new(&config.data_dir);
    repository
        .init()
        .await
        .with_context(|| format!("preparing data directory {}", config.data_dir.display()))?;

    match args.command.clone() {
        Command::SetKey { provider, key } => {
            repository.save_api_key(provider, &key).await?;
            println!("Saved API key for {}", provider);
            Ok(())
        }
        Command::Split { script } => {
            let script = repository.split_script(&script).await?;
            println!("Generated {} scenes for '{}'", script.scenes.len(), script.title);
            Ok(())
        }
        Command::Scenes { script } => show_scenes(&repository, script.as_deref()).await,
        Command::Import { file } => {
            let doc = repository
                .read_import(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let summary = repository.import_all(doc).await.context("importing studio data")?;
            println!(
                "Imported {} character(s), {} script(s) and {} API key(s)",
                summary.characters, summary.scripts, summary.api_keys
            );
            Ok(())
        }
        command => {
            let orchestrator = build_orchestrator(&config, &repository, &args.image_root).await?;
            let result = run_command(&orchestrator, &repository, command).await;
            repository
                .save_activity(&orchestrator.activity().await)
                .await
                .context("saving activity feed")?;
            result
        }
    }
}

async fn build_orchestrator(
    config: &StudioConfig,
    repository: &StudioRepository,
    image_root: &Path,
) -> anyhow::Result<StudioOrchestrator> {
    let registry = ProviderRegistry::with_endpoints(&config.endpoints()).context("building provider registry")?;
    let store = JsonTaskStore::open(config.tasks_path())
        .await
        .context("opening task store")?;
    let activity = repository.load_activity().await.context("loading activity feed")?;

    let orchestrator = Orchestrator::new(store, FsImageSource::new(image_root), registry, config.policy.clone())
        .with_activity(activity);
    orchestrator
        .refresh_credentials(&RealApiKeySource::with_settings(repository.settings_path()))
        .await
        .context("loading provider credentials")?;

    let handle = orchestrator.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                logging::log_shutdown(ComponentId::Cli, "Received Ctrl+C signal");
                handle.shutdown();
            }
            Err(err) => logging::log_error(ComponentId::Cli, "Signal handling", &err),
        }
    });

    Ok(orchestrator)
}

async fn run_command(
    orchestrator: &StudioOrchestrator,
    repository: &StudioRepository,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Providers => {
            let available = orchestrator.available_providers().await;
            for provider in ProviderId::ALL {
                let state = if available.contains(&provider) { "configured" } else { "not configured" };
                println!("{:<8} {}", provider, state);
            }
        }
        Command::Dispatch { script, provider, no_wait } => {
            logging::log_startup(ComponentId::Cli, &format!("dispatch of '{}' to {}", script, provider));
            let script = repository.load_script(&script).await?;
            let characters = repository.load_characters().await?;

            if no_wait {
                let report = orchestrator
                    .dispatch(&script, &characters, provider, &orchestrator.batch_token())
                    .await?;
                for outcome in &report.outcomes {
                    println!("  {}", outcome.describe());
                }
                println!("{}", report.summary());
            } else {
                let report = orchestrator
                    .dispatch_and_track(&script, &characters, provider, &orchestrator.batch_token())
                    .await?;
                for outcome in &report.dispatch.outcomes {
                    println!("  {}", outcome.describe());
                }
                for task in &report.tasks {
                    print_task(task);
                }
                println!("{}", report.summary());
            }
        }
        Command::Tasks { script, scene } => {
            let store = orchestrator.store();
            let tasks = match (script, scene) {
                (Some(script), Some(scene)) => store.list_by_scene(&script, scene).await?,
                (Some(script), None) => store
                    .list_all()
                    .await?
                    .into_iter()
                    .filter(|t| t.script_title == script)
                    .collect(),
                _ => store.list_all().await?,
            };
            if tasks.is_empty() {
                println!("No tasks recorded");
            }
            for task in &tasks {
                print_task(task);
            }
        }
        Command::Reconcile => {
            let tasks = orchestrator.reconcile(&orchestrator.batch_token()).await?;
            component_info!(ComponentId::Cli, "Reconciled {} task(s)", tasks.len());
            for task in &tasks {
                print_task(task);
            }
        }
        Command::Export => {
            let tasks = orchestrator.store().list_all().await?;
            let export = repository.export_all(tasks).await?;
            println!("{}", serde_json::to_string_pretty(&export)?);
        }
        Command::Activity => {
            let log = orchestrator.activity().await;
            if log.is_empty() {
                println!("No recent activity");
            }
            for entry in log.entries() {
                println!("[{}] {}", entry.time, entry.message);
            }
        }
        Command::SetKey { .. } | Command::Split { .. } | Command::Scenes { .. } | Command::Import { .. } => {}
    }
    Ok(())
}

async fn show_scenes(repository: &StudioRepository, title: Option<&str>) -> anyhow::Result<()> {
    let Some(title) = title else {
        let scripts = repository.load_scripts().await?;
        let summaries = project_summaries(&scripts);
        if summaries.is_empty() {
            println!("No project has a ready scene yet");
        }
        for summary in summaries {
            println!("{}: {}/{} scenes ready", summary.title, summary.ready, summary.total);
        }
        return Ok(());
    };

    let script = repository.load_script(title).await?;
    let readiness = Readiness::of(&script);
    println!("{}: {}/{} scenes ready", script.title, readiness.ready, readiness.total);
    for scene in &script.scenes {
        println!(
            "  #{:<3} {:<5} {:<12} {}",
            scene.scene_number,
            if is_ready(scene) { "ready" } else { "-" },
            scene.character_name().unwrap_or("(none)"),
            scene.narration
        );
    }
    Ok(())
}

fn print_task(task: &ProviderTask) {
    let detail = match (&task.result_asset, &task.last_error) {
        (Some(asset), _) => asset.clone(),
        (None, Some(error)) => error.diagnostic(),
        (None, None) => task.provider_job_id.clone(),
    };
    let updated = task.updated_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S");
    println!(
        "{} {:<20} #{:<3} {:<8} {:<10} {} ({})",
        task.task_id.short(),
        task.script_title,
        task.scene_number,
        task.provider,
        task.status,
        detail,
        updated
    );
}
