//! Ingestion error types

use lectern_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Unsupported file type: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("DOCX parse error: {0}")]
    DocxParseError(String),

    #[error("Chunking error: {0}")]
    ChunkingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::UnsupportedFormat { extension } => {
                AppError::UnsupportedFormat { extension }
            }
            other => AppError::Extraction {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_format_stays_a_client_error() {
        let err: AppError = IngestionError::UnsupportedFormat {
            extension: ".md".into(),
        }
        .into();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_parse_errors_become_extraction_errors() {
        let err: AppError = IngestionError::PdfParseError {
            path: "x.pdf".into(),
            message: "bad xref".into(),
        }
        .into();
        assert!(err.is_server_error());
    }
}
