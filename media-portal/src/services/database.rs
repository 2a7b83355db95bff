use crate::models::UserRecord;
use crate::services::authorizer::{BackendError, CredentialBackend};
use crate::utils::{verify_password, Password, PasswordHashString};
use async_trait::async_trait;
use mongodb::{bson::doc, Client as MongoClient, Collection, Database};
use service_core::error::AppError;
use std::sync::Arc;
use tokio::sync::OnceCell;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn users(&self) -> Collection<UserRecord> {
        self.db.collection("users")
    }

    pub async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserRecord>, mongodb::error::Error> {
        self.users().find_one(doc! { "email": email }, None).await
    }
}

/// Connection handle that connects on first use.
///
/// Clones share one underlying [`MongoDb`]. [`LazyMongo::acquire`] is
/// idempotent: concurrent first callers wait on a single connection attempt, and
/// a failed attempt leaves the handle empty so the next caller retries.
#[derive(Clone)]
pub struct LazyMongo {
    uri: Arc<str>,
    database: Arc<str>,
    cell: Arc<OnceCell<MongoDb>>,
}

impl LazyMongo {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: Arc::from(uri.into()),
            database: Arc::from(database.into()),
            cell: Arc::new(OnceCell::new()),
        }
    }

    pub async fn acquire(&self) -> Result<&MongoDb, AppError> {
        self.cell
            .get_or_try_init(|| MongoDb::connect(&self.uri, &self.database))
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.cell.initialized()
    }
}

/// [`CredentialBackend`] over the `users` collection.
#[derive(Clone)]
pub struct MongoCredentialBackend {
    db: LazyMongo,
}

impl MongoCredentialBackend {
    pub fn new(db: LazyMongo) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialBackend for MongoCredentialBackend {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, BackendError> {
        let db = self
            .db
            .acquire()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        Ok(db.find_user_by_email(email).await?)
    }

    async fn compare_hash(
        &self,
        password: &Password,
        hash: &PasswordHashString,
    ) -> Result<bool, BackendError> {
        // CPU-bound
        let password = Password::new(password.expose().to_string());
        let hash = hash.clone();
        let is_valid =
            tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await??;
        Ok(is_valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hash_password;

    #[test]
    fn test_lazy_handle_does_not_connect_eagerly() {
        let db = LazyMongo::new("mongodb://localhost:27017", "media_portal_test");
        assert!(!db.is_connected());
        assert!(!db.clone().is_connected());
    }

    #[tokio::test]
    async fn test_compare_hash_runs_without_database() {
        let backend = MongoCredentialBackend::new(LazyMongo::new(
            "mongodb://localhost:27017",
            "media_portal_test",
        ));
        let password = Password::new("secret".to_string());
        let hash = hash_password(&password, 4).unwrap();

        assert!(backend.compare_hash(&password, &hash).await.unwrap());
        assert!(!backend
            .compare_hash(&Password::new("other".to_string()), &hash)
            .await
            .unwrap());
    }
}
