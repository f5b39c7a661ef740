//! Command-line and environment configuration

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use pdflock_core::config::{DEFAULT_MAX_PDF_SIZE, DEFAULT_QPDF_BINARY, DEFAULT_SALT, DEFAULT_TEMP_DIR};
use pdflock_core::CoreConfig;
use thiserror::Error;

/// Every option can also be set through the environment (or a `.env` file).
#[derive(Parser, Debug, Clone)]
#[command(name = "pdflock-server")]
#[command(about = "Watermarks and password-protects contract PDFs")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3001")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Deployment environment (development, staging, production)
    #[arg(long = "env", env = "APP_ENV", default_value = "development")]
    pub environment: String,

    /// Key expected in the X-API-Key header
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Server-side salt mixed into every contract password
    #[arg(
        long,
        env = "PDF_ENCRYPTION_SALT",
        default_value = DEFAULT_SALT,
        hide_env_values = true,
        hide_default_value = true
    )]
    pub salt: String,

    /// Largest accepted PDF, in bytes
    #[arg(long, env = "MAX_PDF_SIZE", default_value_t = DEFAULT_MAX_PDF_SIZE)]
    pub max_pdf_size: usize,

    /// Directory for the encryption tool's scratch files
    #[arg(long, env = "TEMP_DIR", default_value = DEFAULT_TEMP_DIR)]
    pub temp_dir: PathBuf,

    /// qpdf executable
    #[arg(long, env = "QPDF_PATH", default_value = DEFAULT_QPDF_BINARY)]
    pub qpdf_path: PathBuf,

    /// Kill the encryption tool after this many seconds (0 = no limit)
    #[arg(long, env = "ENCRYPT_TIMEOUT_SECS", default_value_t = 0)]
    pub encrypt_timeout_secs: u64,

    /// Requests per minute per client IP on /api/pdf
    #[arg(long, env = "RATE_LIMIT_PER_MINUTE", default_value_t = 10)]
    pub rate_limit_per_minute: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Error, Debug)]
#[error("Configuration errors:\n{}", .0.join("\n"))]
pub struct ConfigError(pub Vec<String>);

impl Args {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Reject settings the service cannot safely start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.is_production() && self.api_key.as_deref().map_or(true, str::is_empty) {
            errors.push("API_KEY is required in production".to_string());
        }
        if self.salt.is_empty() {
            errors.push("PDF_ENCRYPTION_SALT must not be empty".to_string());
        }
        if self.max_pdf_size == 0 {
            errors.push("MAX_PDF_SIZE must be greater than 0".to_string());
        }
        if self.rate_limit_per_minute == 0 {
            errors.push("RATE_LIMIT_PER_MINUTE must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError(errors))
        }
    }

    pub fn core_config(&self) -> CoreConfig {
        CoreConfig {
            server_salt: self.salt.clone(),
            max_pdf_size: self.max_pdf_size,
            temp_dir: self.temp_dir.clone(),
            qpdf_binary: self.qpdf_path.clone(),
            encrypt_timeout: (self.encrypt_timeout_secs > 0)
                .then(|| Duration::from_secs(self.encrypt_timeout_secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["pdflock-server"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_production_requires_api_key() {
        let args = parse(&["--env", "production", "--salt", "s"]);
        let err = args.validate().unwrap_err();
        assert!(err.to_string().contains("API_KEY is required in production"));

        let args = parse(&["--env", "production", "--salt", "s", "--api-key", "k"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_development_runs_without_api_key() {
        let args = parse(&["--env", "development"]);
        assert!(!args.is_production());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let args = parse(&["--max-pdf-size", "0", "--rate-limit-per-minute", "0"]);
        let err = args.validate().unwrap_err();
        assert_eq!(err.0.len(), 2);
    }

    #[test]
    fn test_core_config_timeout() {
        let args = parse(&["--salt", "abc"]);
        let core = args.core_config();
        assert_eq!(core.server_salt, "abc");
        assert_eq!(core.encrypt_timeout, None);

        let args = parse(&["--encrypt-timeout-secs", "30"]);
        assert_eq!(args.core_config().encrypt_timeout, Some(Duration::from_secs(30)));
    }
}
