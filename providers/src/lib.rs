//! Provider adapters for image-to-video generation services
//!
//! Each adapter translates a canonical [`GenerationRequest`] into one
//! provider-specific submit call and normalizes the provider's job status
//! vocabulary into [`shared::JobStatus`]. Adapters perform network I/O only;
//! callers own every state transition.

pub mod error;
pub mod prompt;
pub mod registry;
pub mod services;
pub mod traits;
pub mod types;

pub use error::{AdapterError, AdapterResult};
pub use registry::ProviderRegistry;
pub use services::build_adapter;
pub use traits::*;
pub use types::*;
