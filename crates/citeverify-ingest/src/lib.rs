use std::path::Path;

use thiserror::Error;

pub mod docx;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("unsupported manuscript format '.{0}' (expected .docx, .txt, .md or .text)")]
    Unsupported(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("DOCX extraction error: {0}")]
    Docx(String),
    #[error("no text could be extracted from {0}")]
    Empty(String),
}

/// Manuscript container formats we can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManuscriptFormat {
    PlainText,
    Docx,
}

impl ManuscriptFormat {
    /// Infer the format from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "docx" => Ok(Self::Docx),
            "txt" | "md" | "text" | "markdown" => Ok(Self::PlainText),
            _ => Err(IngestError::Unsupported(ext)),
        }
    }
}

/// Return the full text of a manuscript file.
///
/// Dispatches on file extension:
/// - `.docx` → paragraphs of `word/document.xml`, one per line
/// - `.txt`, `.md`, `.text` → the file as UTF-8, invalid sequences replaced
///
/// A manuscript that yields only whitespace is an error, so callers never
/// start a run on an empty document.
pub fn extract_text(path: &Path) -> Result<String, IngestError> {
    if !path.is_file() {
        return Err(IngestError::NotFound(path.display().to_string()));
    }

    let format = ManuscriptFormat::from_path(path)?;
    let text = match format {
        ManuscriptFormat::Docx => docx::extract_text_from_docx(path)?,
        ManuscriptFormat::PlainText => {
            let bytes = std::fs::read(path)?;
            String::from_utf8_lossy(&bytes).into_owned()
        }
    };

    if text.trim().is_empty() {
        return Err(IngestError::Empty(path.display().to_string()));
    }

    tracing::debug!(path = %path.display(), chars = text.chars().count(), ?format, "manuscript loaded");
    Ok(text)
}
