//! Backend access
//!
//! Split into focused modules:
//! - `error`: failure taxonomy and classifier
//! - `envelope`: response envelope validation
//! - `executor`: retries and in-flight deduplication
//! - `backend`: the raw operation trait
//! - `rest`: reqwest implementation of the backend

pub mod backend;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod rest;

pub use backend::{OrderBackend, OrderQuery};
pub use envelope::ApiResponse;
pub use error::{classify_failure, ClassifiedError, ErrorCode, RequestFailure};
pub use executor::{CallResult, ExecuteOptions, RequestExecutor};
pub use rest::KitchenApi;
