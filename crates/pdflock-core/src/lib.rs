//! Contract PDF protection
//!
//! This crate turns a plain contract PDF into a password-protected copy:
//!
//! - `password`: deterministic per-contract passwords (salted SHA-256)
//! - `encryption`: AES-256 encryption behind the `PdfEncryptor` trait,
//!   backed by qpdf through a scoped temp-file exchange
//! - `watermark` / `metadata`: optional lopdf-based edits before encryption
//! - `pipeline`: validation, derivation and encryption as one step

pub mod config;
pub mod encryption;
pub mod error;
pub mod metadata;
pub mod password;
pub mod pipeline;
pub mod validation;
pub mod watermark;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::CoreConfig;
pub use encryption::{
    EncryptedDocument, ModifyPermission, PdfEncryptor, Permissions, PrintPermission,
    QpdfEncryptor,
};
pub use error::PdfLockError;
pub use metadata::{add_metadata, DocumentMetadata};
pub use password::{derive_password, generate_random_password, DerivedPassword, PasswordDeriver};
pub use pipeline::{EncryptionRequest, PdfProtector};
pub use watermark::{add_watermark, WatermarkOptions, WatermarkPosition};
