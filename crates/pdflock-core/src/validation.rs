//! Input checks shared by every entry point
//!
//! PDFs arrive as `data:application/pdf;base64,...` URIs. These helpers
//! validate and decode them and enforce the size bounds before any PDF work
//! is attempted.

use base64::{
    alphabet,
    engine::{general_purpose::STANDARD, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{PdfLockError, Result};

pub const PDF_DATA_URI_PREFIX: &str = "data:application/pdf;base64,";

/// Clients do not always pad their base64.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

lazy_static! {
    static ref PDF_DATA_URI: Regex =
        Regex::new(r"^data:application/pdf;base64,([A-Za-z0-9+/=]+)$").unwrap();

    static ref UNSAFE_CHARS: Regex = Regex::new(r#"[<>'"`;]"#).unwrap();
}

/// True when `value` is a PDF data URI with a non-empty base64 body.
pub fn is_valid_pdf_data_uri(value: &str) -> bool {
    PDF_DATA_URI.is_match(value)
}

/// Decoded size implied by the base64 body, without decoding it.
///
/// Exact for well-formed bodies, padded or not.
pub fn estimated_decoded_size(data_uri: &str) -> usize {
    let body = data_uri.split_once(',').map(|(_, b)| b).unwrap_or("");
    let padding = body.bytes().rev().take_while(|&b| b == b'=').count();
    (body.len() * 3 / 4).saturating_sub(padding)
}

/// Decode a PDF data URI into raw bytes.
pub fn decode_pdf_data_uri(data_uri: &str) -> Result<Vec<u8>> {
    let body = data_uri
        .strip_prefix(PDF_DATA_URI_PREFIX)
        .ok_or_else(|| PdfLockError::validation("pdfBase64 must be a valid base64-encoded PDF"))?;

    LENIENT
        .decode(body)
        .map_err(|_| PdfLockError::validation("pdfBase64 must be a valid base64-encoded PDF"))
}

/// Encode PDF bytes as a data URI for responses.
pub fn encode_pdf_data_uri(bytes: &[u8]) -> String {
    format!("{}{}", PDF_DATA_URI_PREFIX, STANDARD.encode(bytes))
}

/// Reject empty payloads and payloads above `max_size` bytes.
pub fn validate_pdf_bytes(bytes: &[u8], max_size: usize) -> Result<()> {
    if bytes.is_empty() {
        return Err(PdfLockError::validation("PDF is empty"));
    }
    if bytes.len() > max_size {
        return Err(PdfLockError::validation(too_large_message(max_size)));
    }
    Ok(())
}

pub fn too_large_message(max_size: usize) -> String {
    format!("PDF file too large (max {}MB)", max_size / 1024 / 1024)
}

/// Strip characters commonly used for markup or script injection.
pub fn sanitize_string(value: &str) -> String {
    UNSAFE_CHARS.replace_all(value, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_shape() {
        assert!(is_valid_pdf_data_uri("data:application/pdf;base64,JVBERi0xLjQ="));
        assert!(!is_valid_pdf_data_uri("data:application/pdf;base64,"));
        assert!(!is_valid_pdf_data_uri("JVBERi0xLjQ="));
        assert!(!is_valid_pdf_data_uri("data:image/png;base64,iVBORw0KGgo="));
        assert!(!is_valid_pdf_data_uri("data:application/pdf;base64,JVBE Ri0x"));
    }

    #[test]
    fn test_decode_roundtrip_with_prefix() {
        let uri = encode_pdf_data_uri(b"%PDF-1.7\n");
        assert!(uri.starts_with(PDF_DATA_URI_PREFIX));
        assert_eq!(decode_pdf_data_uri(&uri).unwrap(), b"%PDF-1.7\n");
    }

    #[test]
    fn test_decode_accepts_missing_padding() {
        let decoded = decode_pdf_data_uri("data:application/pdf;base64,JVBERi0xLjQ").unwrap();
        assert_eq!(decoded, b"%PDF-1.4");
    }

    #[test]
    fn test_decode_rejects_bare_base64() {
        let err = decode_pdf_data_uri("JVBERi0xLjQ=").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_estimated_size() {
        assert_eq!(estimated_decoded_size("data:application/pdf;base64,AAAA"), 3);
        assert_eq!(estimated_decoded_size("no-comma"), 0);
        assert_eq!(estimated_decoded_size("data:application/pdf;base64,AA=="), 1);
        assert_eq!(estimated_decoded_size("data:application/pdf;base64,JVBERi0xLjQ"), 8);
    }

    #[test]
    fn test_estimate_matches_exact_size_at_limit() {
        // 3n + 1 and 3n + 2 byte payloads need padding
        for len in [9, 10, 11, 12] {
            let uri = encode_pdf_data_uri(&vec![0u8; len]);
            assert_eq!(estimated_decoded_size(&uri), len);
        }
        let max = 10 * 1024 * 1024;
        let uri = encode_pdf_data_uri(&vec![0u8; max]);
        assert_eq!(estimated_decoded_size(&uri), max);
    }

    #[test]
    fn test_empty_pdf_rejected() {
        let err = validate_pdf_bytes(&[], 1024).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_size_boundary() {
        let max = 2 * 1024 * 1024;
        assert!(validate_pdf_bytes(&vec![0u8; max], max).is_ok());
        let err = validate_pdf_bytes(&vec![0u8; max + 1], max).unwrap_err();
        assert_eq!(err.to_string(), "Invalid request: PDF file too large (max 2MB)");
    }

    #[test]
    fn test_sanitize_string() {
        assert_eq!(sanitize_string("<b>Draft</b>; 'x' \"y\" `z`"), "bDraft/b x y z");
        assert_eq!(sanitize_string("契約書 - 2026/01/01"), "契約書 - 2026/01/01");
    }
}
