//! Report rendering and persistence.

use thiserror::Error;

pub mod export;
pub mod json;
pub mod types;

pub use export::{render, write_report};
pub use json::export_json;
pub use types::ExportFormat;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
