//! r2 Library
//!
//! Personal file backup: tracked files are snapshotted into a
//! content-addressed store, with a numbered history per file.

pub mod config;
pub mod fs;
pub mod manifest;
pub mod repository;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use manifest::{Entry, Manifest};
pub use repository::Repository;
pub use store::{ContentStore, Digest};
pub use utils::errors::R2Error;
pub type Result<T> = std::result::Result<T, R2Error>;
