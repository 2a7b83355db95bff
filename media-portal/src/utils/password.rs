use argon2::{
    password_hash::{self, PasswordHash, PasswordVerifier},
    Argon2,
};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use thiserror::Error;

/// Plaintext password. Never printed: `Debug` is redacted by `Secret`.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct Password(Secret<String>);

impl Password {
    pub fn new(password: String) -> Self {
        Self(Secret::new(password))
    }

    pub fn empty() -> Self {
        Self::new(String::new())
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

/// Stored password hash, either bcrypt (`$2a$`, `$2b$`, `$2y$`) or an argon2 PHC string.
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    fn is_argon2(&self) -> bool {
        self.0.starts_with("$argon2")
    }
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Hash a password with bcrypt at the given cost (4..=31).
pub fn hash_password(password: &Password, cost: u32) -> Result<PasswordHashString, PasswordError> {
    let hash = bcrypt::hash(password.expose(), cost)?;
    Ok(PasswordHashString::new(hash))
}

/// Compare a password against a stored hash.
///
/// `Ok(false)` means the password does not match; `Err` means the stored hash
/// could not be parsed.
pub fn verify_password(
    password: &Password,
    password_hash: &PasswordHashString,
) -> Result<bool, PasswordError> {
    if password_hash.is_argon2() {
        let parsed_hash = PasswordHash::new(password_hash.as_str())
            .map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

        return match Argon2::default().verify_password(password.expose().as_bytes(), &parsed_hash)
        {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::InvalidHash(e.to_string())),
        };
    }

    Ok(bcrypt::verify(password.expose(), password_hash.as_str())?)
}
