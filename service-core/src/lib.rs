//! service-core: Shared infrastructure for the media-portal workspace.
pub mod error;
pub mod middleware;
pub mod observability;
