//! Readiness gate: which scenes may be dispatched

use std::collections::BTreeMap;

use serde::Serialize;
use shared::{Scene, Script};

/// A scene is ready iff it has a character and a non-blank visual description
pub fn is_ready(scene: &Scene) -> bool {
    scene.character_name().is_some() && !scene.visual().is_empty()
}

/// Ready scenes in their original script order
pub fn ready_scenes(script: &Script) -> Vec<&Scene> {
    script.scenes.iter().filter(|scene| is_ready(scene)).collect()
}

/// Ready vs. total scene counts for progress display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub ready: usize,
    pub total: usize,
}

impl Readiness {
    pub fn of(script: &Script) -> Self {
        Self {
            ready: ready_scenes(script).len(),
            total: script.scenes.len(),
        }
    }

    /// A script can be dispatched once at least one scene is ready
    pub fn is_eligible(&self) -> bool {
        self.ready > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub title: String,
    pub ready: usize,
    pub total: usize,
}

/// Dispatch-eligible scripts with their readiness, ordered by title
pub fn project_summaries(scripts: &BTreeMap<String, Script>) -> Vec<ProjectSummary> {
    scripts
        .iter()
        .filter_map(|(title, script)| {
            let readiness = Readiness::of(script);
            readiness.is_eligible().then(|| ProjectSummary {
                title: title.clone(),
                ready: readiness.ready,
                total: readiness.total,
            })
        })
        .collect()
}
