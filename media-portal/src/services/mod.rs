pub mod authorizer;
pub mod database;
pub mod imagekit_client;
pub mod metrics;
pub mod session;

pub use authorizer::{AuthorizationError, CredentialAuthorizer, CredentialBackend};
pub use database::{LazyMongo, MongoCredentialBackend, MongoDb};
pub use imagekit_client::{HttpUploadAuth, ImageKitClient};
pub use session::{SessionAuth, SessionSignIn, SignIn, SignInOptions, SignInResponse};
