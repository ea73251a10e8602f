//! Kitchen Display Sync - Main Library
//!
//! Keeps a kitchen display terminal consistent with the backend order
//! service and turns raw orders into time-aware display buckets.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, runners)
//! - **kitchen**: Orders, classification, timing, backend access, sync store
//!   (re-exported from workspace)
//! - **channels**: Realtime channel manager (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use kitchen_display_sync::bin_common::{load_config_from_env, ConfigType};
//! use kitchen_display_sync::kitchen::application::OrderSyncStore;
//! ```

// Re-export workspace libraries for convenience
pub use channels;
pub use kitchen;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables
    //!
    //! Provides shared functionality for the presentation layer (binaries).

    pub mod cli;
    pub mod runner;

    pub use cli::{load_config_from_env, parse_args, CliCommand, ConfigType};
    pub use runner::{BinaryRunner, RunConfig};
}
