//! SQLite persistence for session exports and channel payloads.

pub mod error;
pub mod json_bridge;
pub mod schema;
pub mod store;
pub mod workspace;

pub use error::{Result, StoreError};
pub use store::{Store, StoreStats};
pub use workspace::{DATA_DIR_ENV, Workspace, default_base_dir, load_config};
