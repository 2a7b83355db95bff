#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use media_portal::config::ServerSettings;
use media_portal::models::UserRecord;
use media_portal::services::authorizer::BackendError;
use media_portal::services::{CredentialAuthorizer, CredentialBackend, LazyMongo, SessionAuth};
use media_portal::startup::build_router;
use media_portal::utils::{hash_password, verify_password, Password, PasswordHashString};
use media_portal::AppState;
use mongodb::bson::oid::ObjectId;
use std::collections::HashMap;
use std::sync::Arc;

pub const TEST_EMAIL: &str = "u@test.com";
pub const TEST_PASSWORD: &str = "secret";

/// Users held in memory, hashed with bcrypt's minimum cost.
#[derive(Default)]
pub struct TestBackend {
    users: HashMap<String, UserRecord>,
}

impl TestBackend {
    pub fn with_user(mut self, name: &str, email: &str, password: &str) -> Self {
        let hash = hash_password(&Password::new(password.to_string()), 4)
            .expect("Failed to hash test password");
        self.users.insert(
            email.to_string(),
            UserRecord {
                id: ObjectId::new(),
                name: name.to_string(),
                email: email.to_string(),
                password_hash: hash.into_string(),
                created_at: None,
                updated_at: None,
            },
        );
        self
    }
}

#[async_trait]
impl CredentialBackend for TestBackend {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, BackendError> {
        Ok(self.users.get(email).cloned())
    }

    async fn compare_hash(
        &self,
        password: &Password,
        hash: &PasswordHashString,
    ) -> Result<bool, BackendError> {
        Ok(verify_password(password, hash)?)
    }
}

pub fn server_settings() -> ServerSettings {
    ServerSettings {
        host: "127.0.0.1".to_string(),
        port: 0,
        secure_cookies: false,
        session_inactivity_hours: 1,
    }
}

/// Router backed by one known user. MongoDB points at a closed port and is
/// only touched by the readiness probe.
pub fn spawn_app() -> Router {
    let backend = TestBackend::default().with_user("Una", TEST_EMAIL, TEST_PASSWORD);
    let session_auth = Arc::new(SessionAuth::new(CredentialAuthorizer::new(Arc::new(
        backend,
    ))));
    let db = LazyMongo::new(
        "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200&connectTimeoutMS=200",
        "media_portal_test",
    );

    build_router(AppState::new(session_auth, db), &server_settings())
}
