//! Client for a property-listing backend: cached collections, a cached
//! session, and the write flows that keep them current.

pub mod actions;
pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod storage;
pub mod sync;

pub use actions::PropertyActions;
pub use config::ClientConfig;
pub use errors::{ApiError, ApiResult, ErrorKind};
