//! Document information dictionary

use lopdf::{Dictionary, Document, Object, StringFormat};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{PdfLockError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

impl DocumentMetadata {
    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        [
            ("Title", &self.title),
            ("Author", &self.author),
            ("Subject", &self.subject),
            ("Creator", &self.creator),
            ("Producer", &self.producer),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
    }
}

/// Write the provided fields into the PDF's Info dictionary, keeping any
/// entries that are not overridden.
pub fn add_metadata(pdf: &[u8], metadata: &DocumentMetadata) -> Result<Vec<u8>> {
    apply(pdf, metadata).inspect_err(|e| error!(error = %e.detail(), "Failed to add metadata"))
}

fn apply(pdf: &[u8], metadata: &DocumentMetadata) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(pdf)
        .map_err(|e| PdfLockError::Metadata(format!("failed to parse PDF: {}", e)))?;

    let existing = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok().cloned(),
        Ok(Object::Dictionary(dict)) => Some(dict.clone()),
        _ => None,
    };
    let mut info = existing.unwrap_or_else(Dictionary::new);

    for (key, value) in metadata.entries() {
        info.set(key, text_string(value));
    }

    let info_id = doc.add_object(Object::Dictionary(info));
    doc.trailer.set("Info", Object::Reference(info_id));

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| PdfLockError::Metadata(format!("failed to save PDF: {}", e)))?;

    info!(fields = metadata.entries().count(), "Metadata added to PDF");
    Ok(output)
}

/// PDF text string: plain bytes for ASCII, UTF-16BE with a byte order mark
/// otherwise.
fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        Object::String(value.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in value.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}
