//! Typed wrappers over [`SignedClient`](crate::SignedClient) for the backend's
//! endpoints. Each wrapper only shapes parameters and results; signing,
//! session handling and error surfacing stay in the pipeline.
pub mod news;
pub mod script;
pub mod types;
pub mod user;

pub use news::NewsApi;
pub use script::ScriptApi;
pub use user::UserApi;

use crate::core::errors::PipelineError;
use serde::Serialize;
use serde_json::Value;

/// Serialize typed parameters into a parameter tree
pub(crate) fn to_params<T: Serialize>(params: &T) -> Result<Value, PipelineError> {
    serde_json::to_value(params).map_err(|e| {
        PipelineError::Serialization(format!("Failed to serialize parameters: {}", e))
    })
}
