//! Request and response bodies for the PDF endpoints
//!
//! Request fields are optional at the serde level so that a missing field
//! is reported alongside every other problem instead of failing
//! deserialization on the first one.

use pdflock_core::error::Result;
use pdflock_core::validation::{
    estimated_decoded_size, is_valid_pdf_data_uri, sanitize_string, too_large_message,
};
use pdflock_core::watermark::{DEFAULT_OPACITY, DEFAULT_WATERMARK_TEXT};
use pdflock_core::{DocumentMetadata, Permissions, WatermarkOptions, WatermarkPosition};
use serde::{Deserialize, Serialize};

const INVALID_DATA_URI: &str = "pdfBase64 must be a valid base64-encoded PDF";
const MISSING_FIELDS: &str = "Missing required fields";

#[derive(Debug, Default, Deserialize)]
pub struct WatermarkConfig {
    pub text: Option<String>,
    pub opacity: Option<f64>,
    pub position: Option<String>,
    pub date: Option<String>,
}

impl WatermarkConfig {
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(opacity) = self.opacity {
            if !(0.0..=1.0).contains(&opacity) {
                problems.push("watermarkConfig.opacity must be between 0 and 1".to_string());
            }
        }
        if let Some(position) = &self.position {
            if position.parse::<WatermarkPosition>().is_err() {
                problems.push(
                    "watermarkConfig.position must be \"center\" or \"diagonal\"".to_string(),
                );
            }
        }
        problems
    }

    /// Resolve into stamp options, filling defaults and stripping markup
    /// characters from the caller's text.
    pub fn to_options(&self) -> Result<WatermarkOptions> {
        let position = match &self.position {
            Some(position) => position.parse()?,
            None => WatermarkPosition::default(),
        };
        let options = WatermarkOptions {
            text: self
                .text
                .as_deref()
                .map(sanitize_string)
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| DEFAULT_WATERMARK_TEXT.to_string()),
            opacity: self.opacity.map_or(DEFAULT_OPACITY, |opacity| opacity as f32),
            position,
            date: self
                .date
                .as_deref()
                .map(sanitize_string)
                .filter(|date| !date.is_empty()),
        };
        options.validate()?;
        Ok(options)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPdfRequest {
    pub pdf_base64: Option<String>,
    pub contract_id: Option<String>,
    pub contract_number: Option<String>,
    pub watermark_config: Option<WatermarkConfig>,
    pub metadata: Option<DocumentMetadata>,
}

impl ProcessPdfRequest {
    /// Every problem with the request, empty when it is acceptable.
    pub fn problems(&self, max_pdf_size: usize) -> Vec<String> {
        let mut problems = pdf_problems(self.pdf_base64.as_deref(), max_pdf_size);
        if is_blank(&self.contract_id) {
            problems.push("contractId is required".to_string());
        }
        if is_blank(&self.contract_number) {
            problems.push("contractNumber is required".to_string());
        }
        if let Some(config) = &self.watermark_config {
            problems.extend(config.problems());
        }
        problems
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptPdfRequest {
    pub pdf_base64: Option<String>,
    pub contract_id: Option<String>,
    pub contract_number: Option<String>,
    pub permissions: Option<Permissions>,
}

impl EncryptPdfRequest {
    pub fn problems(&self, max_pdf_size: usize) -> Vec<String> {
        if is_blank(&self.pdf_base64) || is_blank(&self.contract_id) || is_blank(&self.contract_number)
        {
            return vec![MISSING_FIELDS.to_string()];
        }
        pdf_problems(self.pdf_base64.as_deref(), max_pdf_size)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkPdfRequest {
    pub pdf_base64: Option<String>,
    pub watermark_config: Option<WatermarkConfig>,
}

impl WatermarkPdfRequest {
    pub fn problems(&self, max_pdf_size: usize) -> Vec<String> {
        if is_blank(&self.pdf_base64) {
            return vec!["Missing pdfBase64".to_string()];
        }
        let mut problems = pdf_problems(self.pdf_base64.as_deref(), max_pdf_size);
        if let Some(config) = &self.watermark_config {
            problems.extend(config.problems());
        }
        problems
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

fn pdf_problems(value: Option<&str>, max_pdf_size: usize) -> Vec<String> {
    match value {
        None | Some("") => vec!["pdfBase64 is required".to_string()],
        Some(uri) if !is_valid_pdf_data_uri(uri) => vec![INVALID_DATA_URI.to_string()],
        Some(uri) if estimated_decoded_size(uri) > max_pdf_size => {
            vec![too_large_message(max_pdf_size)]
        }
        Some(_) => Vec::new(),
    }
}

/// Success envelope shared by the PDF endpoints
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPdfData {
    pub encrypted_pdf_base64: String,
    pub password: String,
    pub file_size: usize,
    /// Milliseconds
    pub processing_time: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptPdfData {
    pub encrypted_pdf_base64: String,
    pub password: String,
    pub file_size: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkPdfData {
    pub watermarked_pdf_base64: String,
    pub file_size: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since startup
    pub uptime: f64,
    pub environment: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub timestamp: String,
}
