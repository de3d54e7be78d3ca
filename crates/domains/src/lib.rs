//! content-core/crates/domains/src/lib.rs
//!
//! Entities, wire records, errors and port traits for the social content core.

pub mod error;
pub mod models;
pub mod record;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use record::*;
pub use traits::*;
