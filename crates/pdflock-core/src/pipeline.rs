//! Password derivation followed by encryption, as one request-scoped step

use std::sync::Arc;

use tracing::info;

use crate::config::CoreConfig;
use crate::encryption::{EncryptedDocument, PdfEncryptor, Permissions};
use crate::error::{PdfLockError, Result};
use crate::password::{DerivedPassword, PasswordDeriver};
use crate::validation::validate_pdf_bytes;

#[derive(Debug, Clone)]
pub struct EncryptionRequest {
    pub contract_id: String,
    pub contract_number: String,
    pub pdf_bytes: Vec<u8>,
}

/// Owns the password deriver and encryption backend for the lifetime of the
/// service. Holds no per-request state, so one instance serves concurrent
/// requests.
#[derive(Clone)]
pub struct PdfProtector {
    deriver: PasswordDeriver,
    encryptor: Arc<dyn PdfEncryptor>,
    max_pdf_size: usize,
}

impl PdfProtector {
    pub fn new(config: &CoreConfig, encryptor: Arc<dyn PdfEncryptor>) -> Self {
        Self {
            deriver: PasswordDeriver::from_config(config),
            encryptor,
            max_pdf_size: config.max_pdf_size,
        }
    }

    pub fn max_pdf_size(&self) -> usize {
        self.max_pdf_size
    }

    pub fn derive_password(&self, contract_id: &str, contract_number: &str) -> DerivedPassword {
        self.deriver.derive(contract_id, contract_number)
    }

    /// Validate, derive the contract password and encrypt.
    ///
    /// `permissions: None` applies the default restrictions.
    pub async fn protect(
        &self,
        request: &EncryptionRequest,
        permissions: Option<&Permissions>,
    ) -> Result<(DerivedPassword, EncryptedDocument)> {
        let mut problems = Vec::new();
        if request.contract_id.is_empty() {
            problems.push("contractId is required".to_string());
        }
        if request.contract_number.is_empty() {
            problems.push("contractNumber is required".to_string());
        }
        if !problems.is_empty() {
            return Err(PdfLockError::Validation(problems));
        }
        validate_pdf_bytes(&request.pdf_bytes, self.max_pdf_size)?;

        let password = self.derive_password(&request.contract_id, &request.contract_number);
        info!(password = "***", "Password generated");

        let bytes = match permissions {
            Some(permissions) => {
                self.encryptor
                    .encrypt_with_permissions(&request.pdf_bytes, password.as_str(), permissions)
                    .await?
            }
            None => {
                self.encryptor
                    .encrypt(&request.pdf_bytes, password.as_str())
                    .await?
            }
        };

        Ok((password, EncryptedDocument::from(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::ModifyPermission;
    use crate::password::derive_password;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingEncryptor {
        calls: AtomicUsize,
        last: Mutex<Option<(String, Permissions)>>,
    }

    #[async_trait]
    impl PdfEncryptor for CountingEncryptor {
        async fn encrypt_with_permissions(
            &self,
            pdf: &[u8],
            password: &str,
            permissions: &Permissions,
        ) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some((password.to_string(), *permissions));
            let mut out = b"LOCKED:".to_vec();
            out.extend_from_slice(pdf);
            Ok(out)
        }
    }

    fn protector(encryptor: Arc<CountingEncryptor>, max: usize) -> PdfProtector {
        let config = CoreConfig {
            server_salt: "s3cr3t".to_string(),
            max_pdf_size: max,
            ..CoreConfig::default()
        };
        PdfProtector::new(&config, encryptor)
    }

    fn request(bytes: &[u8]) -> EncryptionRequest {
        EncryptionRequest {
            contract_id: "abc-123".to_string(),
            contract_number: "C20260101-0001".to_string(),
            pdf_bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_protect_derives_and_encrypts() {
        let encryptor = Arc::new(CountingEncryptor::default());
        let protector = protector(encryptor.clone(), 1024);

        let (password, document) = protector.protect(&request(b"%PDF-1.7"), None).await.unwrap();

        assert_eq!(password.as_str(), "ed49b2afea7b");
        assert_eq!(
            password.as_str(),
            derive_password("abc-123", "C20260101-0001", "s3cr3t")
        );
        assert_eq!(document.bytes, b"LOCKED:%PDF-1.7");
        assert_eq!(document.size_bytes(), 15);

        let (used_password, perms) = encryptor.last.lock().unwrap().clone().unwrap();
        assert_eq!(used_password, "ed49b2afea7b");
        assert_eq!(perms, Permissions::default());
    }

    #[tokio::test]
    async fn test_protect_passes_permission_override() {
        let encryptor = Arc::new(CountingEncryptor::default());
        let protector = protector(encryptor.clone(), 1024);
        let perms = Permissions {
            modify: ModifyPermission::Form,
            ..Permissions::default()
        };

        protector
            .protect(&request(b"%PDF-1.7"), Some(&perms))
            .await
            .unwrap();

        let (_, used) = encryptor.last.lock().unwrap().clone().unwrap();
        assert_eq!(used.modify, ModifyPermission::Form);
    }

    #[tokio::test]
    async fn test_empty_pdf_never_reaches_encryptor() {
        let encryptor = Arc::new(CountingEncryptor::default());
        let protector = protector(encryptor.clone(), 1024);

        let err = protector.protect(&request(b""), None).await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(encryptor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_pdf_is_validation_error() {
        let encryptor = Arc::new(CountingEncryptor::default());
        let protector = protector(encryptor.clone(), 8);

        let err = protector
            .protect(&request(b"%PDF-1.7 and more"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, PdfLockError::Validation(_)));
        assert_eq!(encryptor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_identifiers_reported_together() {
        let encryptor = Arc::new(CountingEncryptor::default());
        let protector = protector(encryptor.clone(), 1024);
        let req = EncryptionRequest {
            contract_id: String::new(),
            contract_number: String::new(),
            pdf_bytes: b"%PDF".to_vec(),
        };

        match protector.protect(&req, None).await.unwrap_err() {
            PdfLockError::Validation(problems) => assert_eq!(problems.len(), 2),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
