//! Credentials authorization: email/password in, reduced [`Identity`] out.

use crate::models::{Identity, UserRecord};
use crate::utils::{Password, PasswordError, PasswordHashString};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a [`CredentialBackend`] call.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Password hashing error: {0}")]
    Hash(#[from] PasswordError),

    #[error("Hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// User lookup and hash comparison the authorizer depends on.
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// Exact-match lookup by email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, BackendError>;

    /// `Ok(true)` when `password` matches `hash`.
    async fn compare_hash(
        &self,
        password: &Password,
        hash: &PasswordHashString,
    ) -> Result<bool, BackendError>;
}

/// The only error callers ever see. Which check failed is logged, not returned.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Authorization failed")]
pub struct AuthorizationError;

enum Failure {
    MissingCredentials,
    UserNotFound,
    InvalidPassword,
    Backend(BackendError),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::MissingCredentials => f.write_str("email and password are required"),
            Failure::UserNotFound => f.write_str("user not found"),
            Failure::InvalidPassword => f.write_str("invalid password"),
            Failure::Backend(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Clone)]
pub struct CredentialAuthorizer {
    backend: Arc<dyn CredentialBackend>,
}

impl CredentialAuthorizer {
    pub fn new(backend: Arc<dyn CredentialBackend>) -> Self {
        Self { backend }
    }

    /// Check `email`/`password` against the user store.
    ///
    /// Every failure is logged with its reason and collapsed into
    /// [`AuthorizationError`]. No retries and no attempt counting.
    pub async fn authorize(
        &self,
        email: &str,
        password: &Password,
    ) -> Result<Identity, AuthorizationError> {
        match self.check(email, password).await {
            Ok(identity) => {
                tracing::info!(user_id = %identity.id, "Credentials authorized");
                Ok(identity)
            }
            Err(failure) => {
                tracing::error!(reason = %failure, "Error during authorization");
                Err(AuthorizationError)
            }
        }
    }

    async fn check(&self, email: &str, password: &Password) -> Result<Identity, Failure> {
        if email.is_empty() || password.is_empty() {
            return Err(Failure::MissingCredentials);
        }

        let user = self
            .backend
            .find_user_by_email(email)
            .await
            .map_err(Failure::Backend)?
            .ok_or(Failure::UserNotFound)?;

        let hash = PasswordHashString::new(user.password_hash.clone());
        let is_valid = self
            .backend
            .compare_hash(password, &hash)
            .await
            .map_err(Failure::Backend)?;
        if !is_valid {
            return Err(Failure::InvalidPassword);
        }

        Ok(user.identity())
    }
}
