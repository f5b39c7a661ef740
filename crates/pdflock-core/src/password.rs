//! Password derivation for encrypted contract PDFs
//!
//! The primary path derives a password deterministically from the contract
//! identifiers and a server-side salt, so the same contract always yields the
//! same password and nothing needs to be stored. A random generator is kept
//! as a fallback.

use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::config::CoreConfig;

/// Length of a derived password in hex characters (48 bits of digest)
pub const DERIVED_PASSWORD_LEN: usize = 12;

pub const DEFAULT_RANDOM_PASSWORD_LEN: usize = 12;

/// Letters and digits without the visually confusable I, O, i, l, o, 0 and 1
pub const RANDOM_PASSWORD_ALPHABET: &[u8] =
    b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789";

/// A password handed back to the caller exactly once.
///
/// `Debug` is redacted so the value cannot end up in logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedPassword(String);

impl DerivedPassword {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Debug for DerivedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedPassword(***)")
    }
}

/// Derives contract passwords with a fixed server salt.
#[derive(Clone)]
pub struct PasswordDeriver {
    salt: String,
}

impl PasswordDeriver {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.server_salt.clone())
    }

    /// Both identifiers must be non-empty; callers validate before calling.
    pub fn derive(&self, contract_id: &str, contract_number: &str) -> DerivedPassword {
        DerivedPassword(derive_password(contract_id, contract_number, &self.salt))
    }
}

impl std::fmt::Debug for PasswordDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordDeriver")
            .field("salt", &"***")
            .finish()
    }
}

/// First 12 hex characters of `sha256("{contract_id}-{contract_number}-{salt}")`
pub fn derive_password(contract_id: &str, contract_number: &str, salt: &str) -> String {
    let data = format!("{}-{}-{}", contract_id, contract_number, salt);
    let mut digest = hex::encode(Sha256::digest(data.as_bytes()));
    digest.truncate(DERIVED_PASSWORD_LEN);
    digest
}

/// Random password drawn uniformly from [`RANDOM_PASSWORD_ALPHABET`] using the
/// OS random source.
pub fn generate_random_password(length: usize) -> String {
    let alphabet_len = RANDOM_PASSWORD_ALPHABET.len();
    // Largest multiple of the alphabet size that fits in a byte; anything at
    // or above it is rejected so every symbol stays equally likely.
    let zone = (256 / alphabet_len) * alphabet_len;

    let mut password = String::with_capacity(length);
    let mut buf = [0u8; 32];
    while password.len() < length {
        OsRng.fill_bytes(&mut buf);
        for &byte in &buf {
            if password.len() == length {
                break;
            }
            let byte = byte as usize;
            if byte < zone {
                password.push(RANDOM_PASSWORD_ALPHABET[byte % alphabet_len] as char);
            }
        }
    }
    password
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_vector() {
        let password = derive_password("abc-123", "C20260101-0001", "s3cr3t");
        assert_eq!(password, "ed49b2afea7b");
    }

    #[test]
    fn test_deriver_matches_free_function() {
        let deriver = PasswordDeriver::new("unit-test-salt");
        let password = deriver.derive("test-uuid-123", "C20260130-0001");
        assert_eq!(password.as_str(), "6fddfb3300c7");
        assert_eq!(
            password.as_str(),
            derive_password("test-uuid-123", "C20260130-0001", "unit-test-salt")
        );
    }

    #[test]
    fn test_sensitive_to_each_input() {
        let base = derive_password("id1", "C1", "salt");
        assert_ne!(base, derive_password("id2", "C1", "salt"));
        assert_ne!(base, derive_password("id1", "C2", "salt"));
        assert_ne!(base, derive_password("id1", "C1", "other-salt"));
    }

    #[test]
    fn test_debug_is_redacted() {
        let password = PasswordDeriver::new("s").derive("a", "b");
        assert_eq!(format!("{:?}", password), "DerivedPassword(***)");
        assert!(!format!("{:?}", PasswordDeriver::new("s3cr3t")).contains("s3cr3t"));
    }

    #[test]
    fn test_random_password_default_length() {
        let password = generate_random_password(DEFAULT_RANDOM_PASSWORD_LEN);
        assert_eq!(password.len(), 12);
    }

    #[test]
    fn test_random_passwords_differ() {
        let a = generate_random_password(16);
        let b = generate_random_password(16);
        assert_ne!(a, b);
    }

    #[test]
    fn test_random_password_zero_length() {
        assert_eq!(generate_random_password(0), "");
    }

    #[test]
    fn test_alphabet_excludes_confusables() {
        assert_eq!(RANDOM_PASSWORD_ALPHABET.len(), 55);
        for c in [b'I', b'O', b'0', b'1', b'l'] {
            assert!(!RANDOM_PASSWORD_ALPHABET.contains(&c));
        }
    }

    proptest! {
        #[test]
        fn derived_password_is_deterministic(id in "[a-z0-9-]{1,40}", number in "C[0-9]{8}-[0-9]{4}") {
            let deriver = PasswordDeriver::new("prop-salt");
            prop_assert_eq!(deriver.derive(&id, &number), deriver.derive(&id, &number));
        }

        #[test]
        fn derived_password_is_twelve_lowercase_hex(id in ".{1,64}", number in ".{1,64}", salt in ".{0,32}") {
            let password = derive_password(&id, &number, &salt);
            prop_assert_eq!(password.len(), DERIVED_PASSWORD_LEN);
            prop_assert!(password.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        }

        #[test]
        fn random_password_has_requested_length(len in 0usize..200) {
            let password = generate_random_password(len);
            prop_assert_eq!(password.len(), len);
            prop_assert!(password.bytes().all(|b| RANDOM_PASSWORD_ALPHABET.contains(&b)));
        }
    }
}
