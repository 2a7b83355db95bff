use crate::utils::Password;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use tower_sessions::Session;

/// Session key under which the signed-in [`Identity`] is stored.
pub const IDENTITY_SESSION_KEY: &str = "identity";

/// A document of the `users` collection.
///
/// Only read by this service; accounts are created by the registration flow.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(rename = "password")]
    pub password_hash: String,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl UserRecord {
    /// The reduced identity handed to the session layer.
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.to_hex(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Minimal user-identifying record attached to an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Email/password pair submitted to the credentials provider.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default = "Password::empty")]
    pub password: Password,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: Password::new(password.into()),
        }
    }
}

/// Identity of the signed-in user, extracted from the session.
///
/// Requests without one are redirected to `/login`.
#[derive(Debug, Clone)]
pub struct SessionIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for SessionIdentity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to extract session",
                )
                    .into_response()
            })?;

        match session.get::<Identity>(IDENTITY_SESSION_KEY).await {
            Ok(Some(identity)) => Ok(SessionIdentity(identity)),
            Ok(None) => Err(Redirect::to("/login").into_response()),
            Err(e) => {
                tracing::error!("Failed to read identity from session: {}", e);
                Err(Redirect::to("/login").into_response())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> UserRecord {
        UserRecord {
            id: ObjectId::parse_str("65a1f0c2e4b0a1b2c3d4e5f6").unwrap(),
            name: "Test User".to_string(),
            email: "u@test.com".to_string(),
            password_hash: "$2b$10$abcdefghijklmnopqrstuv".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_identity_has_no_password_hash() {
        let identity = record().identity();
        assert_eq!(identity.id, "65a1f0c2e4b0a1b2c3d4e5f6");
        assert_eq!(identity.name, "Test User");
        assert_eq!(identity.email, "u@test.com");

        let json = serde_json::to_value(&identity).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 3);
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
    }

    #[test]
    fn test_debug_redacts_hash() {
        let debug = format!("{:?}", record());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("$2b$10$"));
    }

    #[test]
    fn test_user_record_reads_stored_document_shape() {
        let document = mongodb::bson::doc! {
            "_id": ObjectId::parse_str("65a1f0c2e4b0a1b2c3d4e5f6").unwrap(),
            "name": "Test User",
            "email": "u@test.com",
            "password": "$2b$10$hash",
            "__v": 0,
        };
        let record: UserRecord = mongodb::bson::from_document(document).unwrap();
        assert_eq!(record.email, "u@test.com");
        assert_eq!(record.password_hash, "$2b$10$hash");
        assert!(record.created_at.is_none());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials::new("u@test.com", "secret");
        assert!(!format!("{:?}", credentials).contains("secret"));
    }
}
