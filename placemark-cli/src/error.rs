//! Error types emitted by the Placemark CLI.

use placemark_core::{GeometryError, StoreError};
use thiserror::Error;

/// Errors emitted by the Placemark CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// A demonstration geometry failed validation.
    #[error("failed to build demonstration geometry: {0}")]
    Geometry(#[from] GeometryError),
    /// A store operation failed.
    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),
    /// Serialising a record for output failed.
    #[error("failed to render record as JSON: {0}")]
    Render(#[from] serde_json::Error),
}
