//! Infrastructure Layer
//!
//! Contains implementations of external interfaces (REST backend, config,
//! local state, logging). This layer depends on the domain layer but not on
//! the application layer.

pub mod client;
pub mod config;
pub mod logging;
pub mod shutdown;
pub mod storage;

pub use client::{
    classify_failure, ApiResponse, CallResult, ClassifiedError, ErrorCode, ExecuteOptions,
    KitchenApi, OrderBackend, OrderQuery, RequestExecutor, RequestFailure,
};
pub use config::{ConfigError, KitchenConfig};
pub use logging::init_tracing;
pub use shutdown::ShutdownManager;
pub use storage::{LocalState, StorageError};
