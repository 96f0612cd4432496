//! Error types for the grass system

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Window error: {0}")]
    Window(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A collaborator (mesh, terrain, camera, material) is not available yet.
    #[error("Missing resource: {0}")]
    MissingResource(&'static str),

    #[error("Invalid shape parameter `{name}`: {value} not in [{min}, {max}]")]
    InvalidShapeParameter {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("Invalid config value `{name}`: {value} not in [{min}, {max}]")]
    InvalidConfig {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    /// Instance buffers could not be created for the requested capacity.
    #[error("Buffer allocation failed: {requested} bytes requested, limit is {limit} bytes")]
    AllocationFailure { requested: u64, limit: u64 },
}
