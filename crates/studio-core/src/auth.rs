//! Admin console password handling.
//!
//! Only an Argon2 PHC string of the admin password is ever persisted. The
//! console accepts a new password when it has at least
//! [`MIN_PASSWORD_LENGTH`] characters and equals its confirmation.
//!
//! ```
//! use studio_core::auth::AuthManager;
//!
//! let auth = AuthManager::new();
//! let stored = auth.hash_password("banana").unwrap();
//!
//! assert!(auth.matches("banana", Some(&stored)));
//! assert!(!auth.matches("mango", Some(&stored)));
//! ```

use std::time::Duration;

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Shortest admin password the console accepts, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 4;

/// How long an admin console session stays valid.
pub const ADMIN_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("admin password is shorter than {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,

    #[error("admin password is empty")]
    PasswordEmpty,

    #[error("admin password and confirmation differ")]
    PasswordMismatch,

    #[error("could not hash admin password: {0}")]
    HashingFailed(String),

    /// The stored value is not a PHC string.
    #[error("stored admin password is unreadable: {0}")]
    VerificationFailed(String),

    /// No admin password has been set yet.
    #[error("admin setup has not been completed")]
    NotSetup,
}

impl AuthError {
    /// Arabic message shown on the admin screens.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::PasswordEmpty => "الرجاء إدخال كلمة المرور",
            AuthError::PasswordTooShort => "كلمة المرور ضعيفة جداً.",
            AuthError::PasswordMismatch => "كلمات المرور غير متطابقة.",
            AuthError::NotSetup => "يرجى تعيين كلمة مرور المسؤول أولاً.",
            AuthError::HashingFailed(_) | AuthError::VerificationFailed(_) => {
                "حدث خطأ في النظام، يرجى المحاولة مرة أخرى."
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

const TOKEN_BYTES: usize = 32;
// base64url without padding of TOKEN_BYTES
const TOKEN_CHARS: usize = 43;

/// Opaque random token naming one admin session or one visitor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Fresh token from the OS random source.
    pub fn new() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Accept a token presented by a client. Values that cannot have been
    /// issued by [`SessionToken::new`] are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let well_formed = raw.len() == TOKEN_CHARS
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        well_formed.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hashes and checks the admin password.
#[derive(Clone, Default)]
pub struct AuthManager {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager").finish_non_exhaustive()
    }
}

impl AuthManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_strength(password: &str) -> Result<()> {
        match password.chars().count() {
            0 => Err(AuthError::PasswordEmpty),
            n if n < MIN_PASSWORD_LENGTH => Err(AuthError::PasswordTooShort),
            _ => Ok(()),
        }
    }

    /// Accept `password` as a new admin password typed twice.
    pub fn validate_new_password(password: &str, confirmation: &str) -> Result<()> {
        Self::check_strength(password)?;
        if password == confirmation {
            Ok(())
        } else {
            Err(AuthError::PasswordMismatch)
        }
    }

    /// PHC string for `password` under a fresh random salt.
    pub fn hash_password(&self, password: &str) -> Result<String> {
        Self::check_strength(password)?;

        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|phc| phc.to_string())
            .map_err(|e| AuthError::HashingFailed(e.to_string()))
    }

    /// Compare `password` with a stored PHC string.
    pub fn verify_password(&self, password: &str, stored: &str) -> Result<bool> {
        let phc =
            PasswordHash::new(stored).map_err(|e| AuthError::VerificationFailed(e.to_string()))?;

        match self.argon2.verify_password(password.as_bytes(), &phc) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::VerificationFailed(e.to_string())),
        }
    }

    /// Login check. An empty input, a missing hash or an unreadable hash is
    /// a mismatch.
    pub fn matches(&self, password: &str, stored: Option<&str>) -> bool {
        let Some(stored) = stored.filter(|_| !password.is_empty()) else {
            return false;
        };

        self.verify_password(password, stored).unwrap_or_else(|e| {
            tracing::warn!("Stored admin password hash is unusable: {}", e);
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_password_rules() {
        assert!(AuthManager::validate_new_password("1234", "1234").is_ok());
        assert!(matches!(
            AuthManager::validate_new_password("", ""),
            Err(AuthError::PasswordEmpty)
        ));
        assert!(matches!(
            AuthManager::validate_new_password("123", "123"),
            Err(AuthError::PasswordTooShort)
        ));
        assert!(matches!(
            AuthManager::validate_new_password("banana", "Banana"),
            Err(AuthError::PasswordMismatch)
        ));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // "موزة" is four characters and eight bytes
        assert!(AuthManager::validate_new_password("موزة", "موزة").is_ok());
        assert!(matches!(
            AuthManager::validate_new_password("موز", "موز"),
            Err(AuthError::PasswordTooShort)
        ));
    }

    #[test]
    fn test_hash_is_salted_phc_string() {
        let auth = AuthManager::new();
        let first = auth.hash_password("banana42").unwrap();
        let second = auth.hash_password("banana42").unwrap();

        assert!(first.starts_with("$argon2"));
        assert!(!first.contains("banana42"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_short_password_is_not_hashed() {
        let err = AuthManager::new().hash_password("abc").unwrap_err();
        assert!(matches!(err, AuthError::PasswordTooShort));
    }

    #[test]
    fn test_verify_against_stored_hash() {
        let auth = AuthManager::new();
        let stored = auth.hash_password("banana42").unwrap();

        assert!(auth.verify_password("banana42", &stored).unwrap());
        assert!(!auth.verify_password("Banana42", &stored).unwrap());
        assert!(matches!(
            auth.verify_password("banana42", "banana42"),
            Err(AuthError::VerificationFailed(_))
        ));
    }

    #[test]
    fn test_matches_rejects_missing_empty_and_corrupt() {
        let auth = AuthManager::new();
        let stored = auth.hash_password("banana42").unwrap();

        assert!(auth.matches("banana42", Some(&stored)));
        assert!(!auth.matches("", Some(&stored)));
        assert!(!auth.matches("banana42", None));
        assert!(!auth.matches("banana42", Some("plaintext-banana42")));
    }

    #[test]
    fn test_every_error_has_arabic_message() {
        let errors = [
            AuthError::PasswordEmpty,
            AuthError::PasswordTooShort,
            AuthError::PasswordMismatch,
            AuthError::NotSetup,
            AuthError::HashingFailed("x".into()),
        ];
        for err in errors {
            assert!(!err.user_message().is_empty());
        }
    }

    #[test]
    fn test_session_tokens_are_random_and_parse_back() {
        let first = SessionToken::new();
        let second = SessionToken::new();

        assert_ne!(first, second);
        assert_eq!(first.as_str().len(), 43);
        assert_eq!(SessionToken::parse(first.as_str()), Some(first.clone()));
        assert_eq!(SessionToken::parse(&format!(" {first} ")), Some(first));
    }

    #[test]
    fn test_session_token_rejects_foreign_values() {
        assert!(SessionToken::parse("").is_none());
        assert!(SessionToken::parse("admin").is_none());
        assert!(SessionToken::parse(&"a".repeat(44)).is_none());
        assert!(SessionToken::parse(&format!("{}=", "a".repeat(42))).is_none());
    }

    #[test]
    fn test_session_lasts_one_hour() {
        assert_eq!(ADMIN_SESSION_TTL.as_secs(), 3600);
    }
}
