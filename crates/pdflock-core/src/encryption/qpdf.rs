//! qpdf-backed encryption
//!
//! qpdf only works on files, so every call writes the input to a scoped
//! temp file, lets qpdf write the encrypted copy next to it and reads that
//! back. The file pair is removed on every exit path.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::temp::TempFilePair;
use super::{PdfEncryptor, Permissions, KEY_LENGTH_BITS};
use crate::config::CoreConfig;
use crate::error::{PdfLockError, Result};

/// qpdf exits with 3 when it succeeded but printed warnings.
const EXIT_WARNINGS: i32 = 3;

#[derive(Debug, Clone)]
pub struct QpdfEncryptor {
    binary: PathBuf,
    temp_dir: PathBuf,
    timeout: Option<Duration>,
}

impl QpdfEncryptor {
    pub fn new(binary: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            temp_dir: temp_dir.into(),
            timeout: None,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(&config.qpdf_binary, &config.temp_dir).with_timeout(config.encrypt_timeout)
    }

    /// Kill qpdf and fail the call if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// The same password is used as user and owner password.
    fn arguments(
        password: &str,
        permissions: &Permissions,
        input: &Path,
        output: &Path,
    ) -> Vec<OsString> {
        vec![
            "--encrypt".into(),
            password.into(),
            password.into(),
            KEY_LENGTH_BITS.to_string().into(),
            format!("--print={}", permissions.print.as_str()).into(),
            format!("--modify={}", permissions.modify.as_str()).into(),
            format!("--extract={}", if permissions.extract { "y" } else { "n" }).into(),
            "--".into(),
            input.into(),
            output.into(),
        ]
    }

    async fn run(
        &self,
        input: &Path,
        output: &Path,
        password: &str,
        permissions: &Permissions,
    ) -> std::result::Result<(), String> {
        let mut command = Command::new(&self.binary);
        command
            .args(Self::arguments(password, permissions, input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let pending = command.output();
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| format!("qpdf timed out after {}ms", limit.as_millis()))?,
            None => pending.await,
        };
        let finished =
            result.map_err(|e| format!("failed to run {}: {}", self.binary.display(), e))?;

        let stderr = String::from_utf8_lossy(&finished.stderr);
        match finished.status.code() {
            Some(0) => Ok(()),
            Some(EXIT_WARNINGS) => {
                warn!(stderr = %stderr.trim(), "qpdf reported warnings");
                Ok(())
            }
            _ => Err(format!(
                "qpdf exited with {}: {}",
                finished.status,
                stderr.trim()
            )),
        }
    }

    async fn encrypt_via_files(
        &self,
        pdf: &[u8],
        password: &str,
        permissions: &Permissions,
    ) -> std::result::Result<Vec<u8>, String> {
        let files = TempFilePair::create(&self.temp_dir).await.map_err(|e| {
            format!(
                "failed to create temp files in {}: {}",
                self.temp_dir.display(),
                e
            )
        })?;

        tokio::fs::write(files.input(), pdf)
            .await
            .map_err(|e| format!("failed to write {}: {}", files.input().display(), e))?;

        debug!(
            input = %files.input().display(),
            password = "***",
            ?permissions,
            "Starting PDF encryption"
        );

        self.run(files.input(), files.output(), password, permissions)
            .await?;

        let encrypted = tokio::fs::read(files.output())
            .await
            .map_err(|e| format!("failed to read {}: {}", files.output().display(), e))?;

        if encrypted.is_empty() {
            return Err("qpdf produced an empty output file".to_string());
        }

        Ok(encrypted)
    }
}

#[async_trait]
impl PdfEncryptor for QpdfEncryptor {
    async fn encrypt_with_permissions(
        &self,
        pdf: &[u8],
        password: &str,
        permissions: &Permissions,
    ) -> Result<Vec<u8>> {
        let start = Instant::now();

        match self.encrypt_via_files(pdf, password, permissions).await {
            Ok(encrypted) => {
                info!(
                    processing_time_ms = start.elapsed().as_millis() as u64,
                    input_size = pdf.len(),
                    output_size = encrypted.len(),
                    ?permissions,
                    "PDF encrypted successfully"
                );
                Ok(encrypted)
            }
            Err(detail) => {
                error!(error = %detail, "Failed to encrypt PDF");
                Err(PdfLockError::Encryption(detail))
            }
        }
    }
}
