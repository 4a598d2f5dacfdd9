//! Explicit repositories over the studio data directory
//!
//! Each file is loaded and saved on demand; nothing is cached between calls.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shared::{component_info, logging::ComponentId, ActivityEntry, Character, ProviderId, ProviderTask, Script};

use super::api_keys::StudioSettings;
use super::file_system::{read_json_or_default, save_json};
use crate::core::activity::ActivityLog;
use crate::error::{OrchestratorError, OrchestratorResult};

/// Maximum number of characters in the catalog
pub const MAX_CHARACTERS: usize = 6;

/// Full audit export of the studio
#[derive(Debug, Clone, Serialize)]
pub struct StudioExport {
    pub characters: BTreeMap<String, Character>,
    pub scripts: BTreeMap<String, Script>,
    pub settings: StudioSettings,
    pub tasks: Vec<ProviderTask>,
}

/// Document accepted by [`StudioRepository::import_all`].
///
/// Reads both [`StudioExport`] output and exports written by the studio UI,
/// whose `settings` carry a single Runway `api_key`. Tasks are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudioImport {
    #[serde(default)]
    pub characters: BTreeMap<String, Character>,
    #[serde(default)]
    pub scripts: BTreeMap<String, Script>,
    #[serde(default)]
    pub settings: Option<StudioSettings>,
}

/// What an import merged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub characters: usize,
    pub scripts: usize,
    pub api_keys: usize,
}

pub struct StudioRepository {
    data_dir: PathBuf,
}

impl StudioRepository {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    /// Make sure the data directory exists
    pub async fn init(&self) -> OrchestratorResult<()> {
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| OrchestratorError::fs("create directory", &self.data_dir, e))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn characters_path(&self) -> PathBuf {
        self.data_dir.join("characters.json")
    }

    pub fn scripts_path(&self) -> PathBuf {
        self.data_dir.join("scripts.json")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.data_dir.join("tasks.json")
    }

    pub fn activity_path(&self) -> PathBuf {
        self.data_dir.join("activity.json")
    }

    pub async fn load_characters(&self) -> OrchestratorResult<BTreeMap<String, Character>> {
        read_json_or_default(&self.characters_path()).await
    }

    pub async fn save_characters(&self, characters: &BTreeMap<String, Character>) -> OrchestratorResult<()> {
        save_json(&self.characters_path(), characters).await
    }

    /// Add a character, enforcing unique names and the catalog cap
    pub async fn add_character(&self, character: Character) -> OrchestratorResult<()> {
        let mut characters = self.load_characters().await?;
        if characters.contains_key(&character.name) {
            return Err(OrchestratorError::DuplicateCharacter { name: character.name });
        }
        if characters.len() >= MAX_CHARACTERS {
            return Err(OrchestratorError::CharacterLimit { limit: MAX_CHARACTERS });
        }
        component_info!(ComponentId::Orchestrator, character = %character.name, "Adding character");
        characters.insert(character.name.clone(), character);
        self.save_characters(&characters).await
    }

    /// Scripts keyed by title, with each script's `title` filled in
    pub async fn load_scripts(&self) -> OrchestratorResult<BTreeMap<String, Script>> {
        let mut scripts: BTreeMap<String, Script> = read_json_or_default(&self.scripts_path()).await?;
        for (title, script) in scripts.iter_mut() {
            script.title = title.clone();
        }
        Ok(scripts)
    }

    pub async fn save_scripts(&self, scripts: &BTreeMap<String, Script>) -> OrchestratorResult<()> {
        save_json(&self.scripts_path(), scripts).await
    }

    pub async fn load_script(&self, title: &str) -> OrchestratorResult<Script> {
        self.load_scripts()
            .await?
            .remove(title)
            .ok_or_else(|| OrchestratorError::ScriptNotFound { title: title.to_string() })
    }

    /// Insert or replace one script
    pub async fn save_script(&self, script: &Script) -> OrchestratorResult<()> {
        let mut scripts = self.load_scripts().await?;
        scripts.insert(script.title.clone(), script.clone());
        self.save_scripts(&scripts).await
    }

    /// Regenerate a script's scenes from its content and save it
    pub async fn split_script(&self, title: &str) -> OrchestratorResult<Script> {
        let mut script = self.load_script(title).await?;
        let count = script.generate_scenes();
        self.save_script(&script).await?;
        component_info!(ComponentId::Orchestrator, script = %title, scenes = count, "Generated scenes");
        Ok(script)
    }

    pub async fn load_settings(&self) -> OrchestratorResult<StudioSettings> {
        read_json_or_default(&self.settings_path()).await
    }

    /// Store a provider key in `settings.json`; an empty key removes it
    pub async fn save_api_key(&self, provider: ProviderId, key: &str) -> OrchestratorResult<()> {
        let mut settings = self.load_settings().await?;
        let key = key.trim();
        if key.is_empty() {
            settings.api_keys.remove(provider.as_str());
        } else {
            settings.api_keys.insert(provider.as_str().to_string(), key.to_string());
        }
        if provider == ProviderId::Runway {
            settings.api_key = None;
        }
        save_json(&self.settings_path(), &settings).await
    }

    pub async fn load_activity(&self) -> OrchestratorResult<ActivityLog> {
        let entries: Vec<ActivityEntry> = read_json_or_default(&self.activity_path()).await?;
        Ok(ActivityLog::from_entries(entries))
    }

    pub async fn save_activity(&self, log: &ActivityLog) -> OrchestratorResult<()> {
        save_json(&self.activity_path(), &log.entries()).await
    }

    /// Characters, scripts, settings and the given tasks as one document
    pub async fn export_all(&self, tasks: Vec<ProviderTask>) -> OrchestratorResult<StudioExport> {
        Ok(StudioExport {
            characters: self.load_characters().await?,
            scripts: self.load_scripts().await?,
            settings: self.load_settings().await?,
            tasks,
        })
    }

    /// Parse an export document from disk
    pub async fn read_import(&self, path: &Path) -> OrchestratorResult<StudioImport> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| OrchestratorError::fs("read", path, e))?;
        serde_json::from_str(&content).map_err(|source| OrchestratorError::JsonError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Merge an export document into the data directory.
    ///
    /// Characters and scripts replace entries of the same name. A legacy
    /// `api_key` becomes the Runway key; named keys for unknown providers
    /// are skipped.
    pub async fn import_all(&self, doc: StudioImport) -> OrchestratorResult<ImportSummary> {
        let mut summary = ImportSummary::default();

        if !doc.characters.is_empty() {
            let mut characters = self.load_characters().await?;
            summary.characters = doc.characters.len();
            characters.extend(doc.characters);
            self.save_characters(&characters).await?;
        }

        if !doc.scripts.is_empty() {
            let mut scripts = self.load_scripts().await?;
            summary.scripts = doc.scripts.len();
            scripts.extend(doc.scripts.into_iter().map(|(title, mut script)| {
                script.title = title.clone();
                (title, script)
            }));
            self.save_scripts(&scripts).await?;
        }

        if let Some(settings) = doc.settings {
            for (provider, key) in settings.credentials() {
                self.save_api_key(provider, &key).await?;
                summary.api_keys += 1;
            }
        }

        let mut activity = self.load_activity().await?;
        activity.record("Imported data from file");
        self.save_activity(&activity).await?;

        component_info!(
            ComponentId::Orchestrator,
            characters = summary.characters,
            scripts = summary.scripts,
            api_keys = summary.api_keys,
            "Imported studio data"
        );
        Ok(summary)
    }
}
