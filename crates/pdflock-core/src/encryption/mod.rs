//! PDF encryption
//!
//! Structural PDF encryption is delegated to an external backend behind the
//! [`PdfEncryptor`] trait. The shipped backend is [`QpdfEncryptor`], which
//! exchanges files with the `qpdf` command-line tool.
//!
//! Two entry points are exposed: [`PdfEncryptor::encrypt`] always applies the
//! default restrictions (print allowed, modification and extraction denied),
//! [`PdfEncryptor::encrypt_with_permissions`] lets the caller override them.

mod qpdf;
mod temp;

pub use qpdf::QpdfEncryptor;
pub use temp::TempFilePair;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// AES-256
pub const KEY_LENGTH_BITS: u16 = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintPermission {
    #[default]
    Full,
    Low,
    None,
}

impl PrintPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrintPermission::Full => "full",
            PrintPermission::Low => "low",
            PrintPermission::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifyPermission {
    All,
    Annotate,
    Form,
    Assembly,
    #[default]
    None,
}

impl ModifyPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModifyPermission::All => "all",
            ModifyPermission::Annotate => "annotate",
            ModifyPermission::Form => "form",
            ModifyPermission::Assembly => "assembly",
            ModifyPermission::None => "none",
        }
    }
}

/// In-document restrictions applied alongside the open password.
///
/// Fields missing from JSON fall back to the defaults, so a caller can
/// override a single permission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Permissions {
    pub print: PrintPermission,
    pub modify: ModifyPermission,
    /// Text and graphics extraction
    pub extract: bool,
}

#[async_trait]
pub trait PdfEncryptor: Send + Sync {
    /// Encrypt `pdf` so that `password` is required to open it, restricting
    /// in-document actions to `permissions`.
    ///
    /// Either the full encrypted document is returned or an error; partial
    /// output is never produced.
    async fn encrypt_with_permissions(
        &self,
        pdf: &[u8],
        password: &str,
        permissions: &Permissions,
    ) -> Result<Vec<u8>>;

    /// Encrypt with the default restrictions.
    async fn encrypt(&self, pdf: &[u8], password: &str) -> Result<Vec<u8>> {
        self.encrypt_with_permissions(pdf, password, &Permissions::default())
            .await
    }
}

/// Output of one encryption call.
#[derive(Debug, Clone)]
pub struct EncryptedDocument {
    pub bytes: Vec<u8>,
}

impl EncryptedDocument {
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

impl From<Vec<u8>> for EncryptedDocument {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}
