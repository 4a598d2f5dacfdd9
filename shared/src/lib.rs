//! Shared types for the horror shorts studio
//!
//! Contains the records exchanged between the studio collaborators and the
//! video-generation core: provider identifiers, scene and character input
//! records, durable task records and activity entries.

pub mod errors;
pub mod logging;
pub mod models;
pub mod task;
pub mod types;

pub use errors::*;
pub use models::{ActivityEntry, Character, Scene, Script};
pub use task::{ProviderTask, TaskUpdate};
pub use types::*;
