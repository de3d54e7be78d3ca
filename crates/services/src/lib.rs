//! content-core/crates/services/src/lib.rs
//!
//! Repositories, optimistic transactions and the content service facade.

pub mod collaborators;
pub mod content;
pub mod repository;
pub mod transaction;

pub use collaborators::{StaticSession, SystemClock, UuidGenerator};
pub use content::ContentService;
pub use repository::{ContentRepository, Likeable, RepositoryOptions};
pub use transaction::TransactionRunner;
