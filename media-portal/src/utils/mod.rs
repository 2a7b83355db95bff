pub mod password;

pub use password::{hash_password, verify_password, Password, PasswordError, PasswordHashString};
