//! Scoped input/output file pair for the external encryption tool

use std::io;
use std::path::Path;

use tempfile::TempPath;

/// Two uniquely named files owned by a single encryption call.
///
/// Names combine the process id with a random token and are created with
/// `O_EXCL`, so concurrent calls never collide. Both files are removed when
/// the pair is dropped, whichever way the call exits. Removal failures are
/// logged and swallowed.
pub struct TempFilePair {
    input: Option<TempPath>,
    output: Option<TempPath>,
}

impl TempFilePair {
    /// Create the pair inside `dir`, creating the directory if needed.
    pub async fn create(dir: &Path) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;

        let pid = std::process::id();
        let input = reserve(dir, &format!("pdflock-{}-input-", pid))?;
        // Reserve the output name before anything can fail so the input
        // file is already guarded by this pair's Drop.
        let mut pair = Self {
            input: Some(input),
            output: None,
        };
        pair.output = Some(reserve(dir, &format!("pdflock-{}-output-", pid))?);
        Ok(pair)
    }

    pub fn input(&self) -> &Path {
        self.input.as_deref().unwrap_or_else(|| Path::new(""))
    }

    pub fn output(&self) -> &Path {
        self.output.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

fn reserve(dir: &Path, prefix: &str) -> io::Result<TempPath> {
    Ok(tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".pdf")
        .tempfile_in(dir)?
        .into_temp_path())
}

impl Drop for TempFilePair {
    fn drop(&mut self) {
        for path in [self.input.take(), self.output.take()].into_iter().flatten() {
            let shown = path.display().to_string();
            if let Err(e) = path.close() {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %shown, error = %e, "Failed to cleanup temp file");
                }
            }
        }
    }
}
