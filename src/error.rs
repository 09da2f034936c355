//! Error types shared by the loader, aggregator and mapper.

use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FarsError {
    #[error("file '{}' does not exist", path.display())]
    NotFound { path: PathBuf },
    #[error("invalid STATE number: {0}")]
    InvalidState(i32),
    #[error("required column '{0}' is missing")]
    MissingColumn(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("Failed to render map: {0}")]
    Render(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FarsError>;
