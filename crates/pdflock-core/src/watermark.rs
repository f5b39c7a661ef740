//! Text watermark stamped onto every page
//!
//! The stamp is drawn in the standard Helvetica font at a fixed size and gray
//! level, through an ExtGState carrying the requested opacity. Existing page
//! content is wrapped in `q`/`Q` so its graphics state cannot leak into the
//! stamp.

use std::str::FromStr;
use std::time::Instant;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{PdfLockError, Result};

pub const DEFAULT_WATERMARK_TEXT: &str = "For Friend Lending Platform Use Only";
pub const DEFAULT_OPACITY: f32 = 0.3;
pub const WATERMARK_FONT_SIZE: f32 = 60.0;
pub const WATERMARK_GRAY: f32 = 0.5;

const FONT_RESOURCE: &str = "PdfLockWmF";
const STATE_RESOURCE: &str = "PdfLockWmGS";

/// US Letter, used when a page has no MediaBox anywhere in its tree
const FALLBACK_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkPosition {
    Center,
    #[default]
    Diagonal,
}

impl FromStr for WatermarkPosition {
    type Err = PdfLockError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "center" => Ok(WatermarkPosition::Center),
            "diagonal" => Ok(WatermarkPosition::Diagonal),
            _ => Err(PdfLockError::validation(
                "watermarkConfig.position must be \"center\" or \"diagonal\"",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkOptions {
    pub text: String,
    /// 0.0 (invisible) to 1.0 (opaque)
    pub opacity: f32,
    pub position: WatermarkPosition,
    /// Appended to the text as `"{text} - {date}"`
    pub date: Option<String>,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            text: DEFAULT_WATERMARK_TEXT.to_string(),
            opacity: DEFAULT_OPACITY,
            position: WatermarkPosition::default(),
            date: None,
        }
    }
}

impl WatermarkOptions {
    pub fn stamp_text(&self) -> String {
        match &self.date {
            Some(date) => format!("{} - {}", self.text, date),
            None => self.text.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(PdfLockError::validation(
                "watermarkConfig.opacity must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// Stamp `options` onto every page of `pdf`.
pub fn add_watermark(pdf: &[u8], options: &WatermarkOptions) -> Result<Vec<u8>> {
    options.validate()?;
    let start = Instant::now();
    let text = options.stamp_text();

    info!(
        text = %text,
        opacity = options.opacity,
        position = ?options.position,
        "Adding watermark to PDF"
    );

    let result = stamp_document(pdf, &text, options);
    match &result {
        Ok((_, pages)) => info!(
            processing_time_ms = start.elapsed().as_millis() as u64,
            pages,
            "Watermark added successfully"
        ),
        Err(e) => error!(error = %e.detail(), "Failed to add watermark"),
    }
    result.map(|(bytes, _)| bytes)
}

fn stamp_document(
    pdf: &[u8],
    text: &str,
    options: &WatermarkOptions,
) -> Result<(Vec<u8>, usize)> {
    let encoded = encode_win_ansi(text).ok_or_else(|| {
        PdfLockError::Watermark(
            "watermark text contains characters the standard font cannot encode".to_string(),
        )
    })?;

    let mut doc = Document::load_mem(pdf)
        .map_err(|e| PdfLockError::Watermark(format!("failed to parse PDF: {}", e)))?;

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let state_id = doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => Object::Real(options.opacity),
        "CA" => Object::Real(options.opacity),
    });

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for page_id in &pages {
        let stamp = Stamp {
            text: &encoded,
            char_count: text.chars().count(),
            position: options.position,
            font_id,
            state_id,
        };
        stamp.apply(&mut doc, *page_id)?;
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| PdfLockError::Watermark(format!("failed to save PDF: {}", e)))?;

    Ok((output, pages.len()))
}

struct Stamp<'a> {
    text: &'a [u8],
    char_count: usize,
    position: WatermarkPosition,
    font_id: ObjectId,
    state_id: ObjectId,
}

impl Stamp<'_> {
    fn apply(&self, doc: &mut Document, page_id: ObjectId) -> Result<()> {
        let (x0, y0, width, height) = page_box(doc, page_id);

        let mut resources = inherited(doc, page_id, b"Resources")
            .and_then(|obj| resolve_dict(doc, &obj))
            .unwrap_or_default();
        add_named_resource(doc, &mut resources, b"Font", FONT_RESOURCE, self.font_id);
        add_named_resource(doc, &mut resources, b"ExtGState", STATE_RESOURCE, self.state_id);

        let x = x0 + width / 2.0 - (self.char_count as f32 * WATERMARK_FONT_SIZE) / 4.0;
        let y = y0 + height / 2.0;
        let matrix = match self.position {
            WatermarkPosition::Diagonal => {
                let (sin, cos) = 45f32.to_radians().sin_cos();
                [cos, sin, -sin, cos]
            }
            WatermarkPosition::Center => [1.0, 0.0, 0.0, 1.0],
        };

        let stamp = Content {
            operations: vec![
                Operation::new("Q", vec![]),
                Operation::new("q", vec![]),
                Operation::new("gs", vec![Object::Name(STATE_RESOURCE.into())]),
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![
                        Object::Name(FONT_RESOURCE.into()),
                        Object::Real(WATERMARK_FONT_SIZE),
                    ],
                ),
                Operation::new(
                    "rg",
                    vec![
                        Object::Real(WATERMARK_GRAY),
                        Object::Real(WATERMARK_GRAY),
                        Object::Real(WATERMARK_GRAY),
                    ],
                ),
                Operation::new(
                    "Tm",
                    vec![
                        Object::Real(matrix[0]),
                        Object::Real(matrix[1]),
                        Object::Real(matrix[2]),
                        Object::Real(matrix[3]),
                        Object::Real(x),
                        Object::Real(y),
                    ],
                ),
                Operation::new(
                    "Tj",
                    vec![Object::String(self.text.to_vec(), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ],
        };
        // Page streams are concatenated on render and the page's own stream may
        // not end in whitespace.
        let mut stamp_bytes = b"\n".to_vec();
        stamp_bytes.extend(
            stamp
                .encode()
                .map_err(|e| PdfLockError::Watermark(format!("failed to encode stamp: {}", e)))?,
        );

        let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let stamp_id = doc.add_object(Stream::new(dictionary! {}, stamp_bytes));

        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfLockError::Watermark(format!("page {:?}: {}", page_id, e)))?;

        let mut contents = vec![Object::Reference(open_id)];
        match page.get(b"Contents") {
            Ok(Object::Array(existing)) => contents.extend(existing.iter().cloned()),
            Ok(existing @ Object::Reference(_)) => contents.push(existing.clone()),
            _ => {}
        }
        contents.push(Object::Reference(stamp_id));

        page.set("Contents", Object::Array(contents));
        page.set("Resources", Object::Dictionary(resources));
        Ok(())
    }
}

/// Look up `key` on the page, then up the Pages tree.
fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = Some(page_id);
    // Bounded walk in case of a Parent cycle
    for _ in 0..64 {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn resolve_dict(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match obj {
        Object::Dictionary(dict) => Some(dict.clone()),
        Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
        _ => None,
    }
}

fn add_named_resource(
    doc: &Document,
    resources: &mut Dictionary,
    category: &[u8],
    name: &str,
    id: ObjectId,
) {
    let mut entries = resources
        .get(category)
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
        .unwrap_or_default();
    entries.set(name, Object::Reference(id));
    resources.set(category, Object::Dictionary(entries));
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(v) => Some(*v as f32),
        Object::Real(v) => Some(*v),
        _ => None,
    }
}

/// (x0, y0, width, height) of the page's MediaBox
fn page_box(doc: &Document, page_id: ObjectId) -> (f32, f32, f32, f32) {
    let media_box = match inherited(doc, page_id, b"MediaBox") {
        Some(Object::Array(values)) => Some(values),
        Some(Object::Reference(id)) => doc
            .get_object(id)
            .ok()
            .and_then(|obj| obj.as_array().ok())
            .cloned(),
        _ => None,
    };

    let coords: Option<Vec<f32>> = media_box.and_then(|values| values.iter().map(number).collect());
    match coords.as_deref() {
        Some([x1, y1, x2, y2]) => (*x1, *y1, x2 - x1, y2 - y1),
        _ => (0.0, 0.0, FALLBACK_PAGE_SIZE.0, FALLBACK_PAGE_SIZE.1),
    }
}

/// Latin-1 subset of WinAnsiEncoding; `None` if any character falls outside it.
///
/// U+0080..=U+009F are C1 controls in Latin-1 but printable glyphs in
/// WinAnsi, so they are rejected too.
fn encode_win_ansi(text: &str) -> Option<Vec<u8>> {
    text.chars()
        .map(|c| match u8::try_from(u32::from(c)) {
            Ok(0x80..=0x9F) | Err(_) => None,
            Ok(byte) => Some(byte),
        })
        .collect()
}
