pub mod security_headers;
pub mod tracing;

pub use self::security_headers::security_headers_middleware;
pub use crate::observability::REQUEST_ID_HEADER;
pub use self::tracing::request_id_middleware;
