pub mod upload;
pub mod user;

pub use upload::{FileType, SelectedFile, UploadCredentials, UploadResponse};
pub use user::{Credentials, Identity, SessionIdentity, UserRecord};
