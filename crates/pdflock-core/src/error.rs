use thiserror::Error;

/// Errors produced by the core pipeline.
///
/// The string payloads of the processing variants carry internal
/// diagnostics (tool stderr, parser messages). They are meant for logs and
/// never appear in the `Display` output shown to callers.
#[derive(Error, Debug)]
pub enum PdfLockError {
    #[error("Invalid request: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Failed to encrypt PDF")]
    Encryption(String),

    #[error("Failed to add watermark to PDF")]
    Watermark(String),

    #[error("Failed to add metadata to PDF")]
    Metadata(String),
}

impl PdfLockError {
    pub fn validation(message: impl Into<String>) -> Self {
        PdfLockError::Validation(vec![message.into()])
    }

    /// Internal diagnostic for logging. Empty for validation errors.
    pub fn detail(&self) -> &str {
        match self {
            PdfLockError::Validation(_) => "",
            PdfLockError::Encryption(detail)
            | PdfLockError::Watermark(detail)
            | PdfLockError::Metadata(detail) => detail,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, PdfLockError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, PdfLockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_errors_hide_detail() {
        let err = PdfLockError::Encryption("qpdf: /tmp/pdflock/x.pdf: bad xref".into());
        assert_eq!(err.to_string(), "Failed to encrypt PDF");
        assert!(err.detail().contains("bad xref"));
    }

    #[test]
    fn test_validation_lists_every_problem() {
        let err = PdfLockError::Validation(vec![
            "contractId is required".into(),
            "contractNumber is required".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid request: contractId is required; contractNumber is required"
        );
        assert!(err.is_validation());
    }
}
