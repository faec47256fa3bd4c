//! Utility modules for r2.

pub mod errors;
pub mod format;
pub mod logger;

pub use errors::{R2Error, Result};
