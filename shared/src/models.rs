//! Input records supplied by the studio collaborators
//!
//! Field names follow the on-disk JSON written by the studio UI, so
//! `characters.json` and `scripts.json` load without translation.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// A recurring character with a reference image used as the first frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(
        default,
        rename = "image_path",
        alias = "image_reference",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_reference: Option<String>,
}

impl Character {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            created: Some(Utc::now()),
            image_reference: None,
        }
    }

    pub fn with_image(mut self, image_reference: impl Into<String>) -> Self {
        self.image_reference = Some(image_reference.into());
        self
    }
}

/// One narrated beat of a script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub scene_number: u32,
    pub narration: String,
    #[serde(default)]
    pub assigned_character: Option<String>,
    #[serde(default)]
    pub visual_description: String,
    /// Legacy UI marker ("pending"); never read by the dispatch core
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Scene {
    pub fn new(scene_number: u32, narration: impl Into<String>) -> Self {
        Self {
            scene_number,
            narration: narration.into(),
            assigned_character: None,
            visual_description: String::new(),
            status: Some("pending".to_string()),
        }
    }

    pub fn with_character(mut self, name: impl Into<String>) -> Self {
        self.assigned_character = Some(name.into());
        self
    }

    pub fn with_visual(mut self, description: impl Into<String>) -> Self {
        self.visual_description = description.into();
        self
    }

    /// Assigned character name, treating blank strings as unassigned.
    ///
    /// The UI stores `""` when the character selector is cleared.
    pub fn character_name(&self) -> Option<&str> {
        self.assigned_character
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Visual description with surrounding whitespace removed
    pub fn visual(&self) -> &str {
        self.visual_description.trim()
    }
}

/// A script and its ordered scenes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Map key in `scripts.json`; filled in by the repository on load
    #[serde(default, skip_serializing)]
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

impl Script {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            created: Some(Utc::now()),
            scenes: Vec::new(),
        }
    }

    pub fn with_scenes(mut self, scenes: Vec<Scene>) -> Self {
        self.scenes = scenes;
        self
    }

    /// Split the script content into one scene per sentence.
    ///
    /// Sentences are delimited by '.', blank fragments are dropped and each
    /// narration keeps its trailing period. Replaces any existing scenes.
    pub fn generate_scenes(&mut self) -> usize {
        self.scenes = self
            .content
            .split('.')
            .map(str::trim)
            .filter(|sentence| !sentence.is_empty())
            .enumerate()
            .map(|(i, sentence)| Scene::new(i as u32 + 1, format!("{sentence}.")))
            .collect();
        self.scenes.len()
    }
}

/// One line of the studio activity feed.
///
/// Persisted as `{"time": "HH:MM:SS", "message": ...}`, the shape the studio
/// UI writes to `activity.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Local wall-clock time, `HH:MM:SS`
    pub time: String,
    pub message: String,
}

impl ActivityEntry {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            time: Local::now().format("%H:%M:%S").to_string(),
            message: message.into(),
        }
    }
}
