//! Service implementations
//!
//! Real implementations of the service traits plus the studio repositories.
//! These are the production implementations that handle actual I/O.

pub mod api_keys;
pub mod file_system;
pub mod image_source;
pub mod repository;
pub mod task_store;

#[cfg(test)]
pub mod tests;

pub use api_keys::{RealApiKeySource, StudioSettings};
pub use image_source::FsImageSource;
pub use repository::{ImportSummary, StudioExport, StudioImport, StudioRepository, MAX_CHARACTERS};
pub use task_store::JsonTaskStore;
