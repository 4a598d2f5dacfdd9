//! Test fixtures and data for orchestrator tests

use std::collections::BTreeMap;
use std::time::Duration;

use orchestrator::{DispatchPolicy, RetryPolicy};
use shared::{Character, Scene, Script};

/// Standard test data
pub struct TestFixtures;

impl TestFixtures {
    pub const SCRIPT: &'static str = "Intro";
    pub const CHARACTER: &'static str = "Nun";
    pub const IMAGE: &'static str = "images/Nun.png";
    pub const RUNWAY_KEY: &'static str = "test-runway-key";
    pub const LUMA_KEY: &'static str = "test-luma-key";

    /// Catalog with one character that has an image and one that does not
    pub fn characters() -> BTreeMap<String, Character> {
        let mut characters = BTreeMap::new();
        characters.insert(
            Self::CHARACTER.to_string(),
            Character::new(Self::CHARACTER, "A pale nun with hollow eyes").with_image(Self::IMAGE),
        );
        characters.insert(
            "Shadow".to_string(),
            Character::new("Shadow", "Something in the corner of the frame"),
        );
        characters
    }

    fn ready_scene(number: u32, narration: &str) -> Scene {
        Scene::new(number, narration)
            .with_character(Self::CHARACTER)
            .with_visual(format!("Shot {number} of a candle-lit corridor"))
    }

    /// "Intro" with two ready scenes
    pub fn intro_script() -> Script {
        Script::new(Self::SCRIPT, "The lights flicker. She is behind you.").with_scenes(vec![
            Self::ready_scene(1, "The lights flicker."),
            Self::ready_scene(2, "She is behind you."),
        ])
    }

    /// `count` ready scenes numbered from 1
    pub fn ready_script(title: &str, count: u32) -> Script {
        let scenes = (1..=count)
            .map(|n| Self::ready_scene(n, &format!("Beat {n}.")))
            .collect();
        Script::new(title, "").with_scenes(scenes)
    }

    /// Ready, unready and invalid scenes mixed together
    pub fn mixed_script() -> Script {
        Script::new("Mixed", "").with_scenes(vec![
            Self::ready_scene(1, "Ready."),
            Scene::new(2, "No character.").with_visual("Attic"),
            Scene::new(3, "No image.").with_character("Shadow").with_visual("Cellar"),
            Scene::new(4, "Unknown.").with_character("Ghost").with_visual("Stairs"),
        ])
    }

    /// Millisecond-scale timings so batches settle quickly
    pub fn fast_policy() -> DispatchPolicy {
        DispatchPolicy {
            max_in_flight: 2,
            retry: RetryPolicy::new(2, Duration::from_millis(1)),
            poll_interval: Duration::from_millis(5),
            poll_timeout: Duration::from_secs(5),
        }
    }
}
