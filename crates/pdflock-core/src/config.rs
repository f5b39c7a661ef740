//! Core configuration
//!
//! Everything the pipeline needs from the environment is carried in
//! [`CoreConfig`] and handed to component constructors explicitly.

use std::path::PathBuf;
use std::time::Duration;

/// Salt used when none is configured. Fine for development only.
pub const DEFAULT_SALT: &str = "default-salt-change-in-production";

/// 10 MiB
pub const DEFAULT_MAX_PDF_SIZE: usize = 10 * 1024 * 1024;

pub const DEFAULT_TEMP_DIR: &str = "/tmp/pdflock";

pub const DEFAULT_QPDF_BINARY: &str = "qpdf";

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Secret mixed into every derived password. Changing it invalidates
    /// all previously issued passwords.
    pub server_salt: String,
    /// Largest accepted decoded PDF, in bytes
    pub max_pdf_size: usize,
    /// Directory for the per-call input/output files
    pub temp_dir: PathBuf,
    /// Path or name of the qpdf executable
    pub qpdf_binary: PathBuf,
    /// Deadline for a single qpdf invocation
    pub encrypt_timeout: Option<Duration>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            server_salt: DEFAULT_SALT.to_string(),
            max_pdf_size: DEFAULT_MAX_PDF_SIZE,
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
            qpdf_binary: PathBuf::from(DEFAULT_QPDF_BINARY),
            encrypt_timeout: None,
        }
    }
}

impl CoreConfig {
    pub fn uses_default_salt(&self) -> bool {
        self.server_salt == DEFAULT_SALT
    }
}
