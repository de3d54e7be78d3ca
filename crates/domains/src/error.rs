//! # ContentError
//!
//! Centralized error handling for the content core.
//! Entity mutations are total; only record conversion and store I/O can fail.

use thiserror::Error;

/// The primary error type for every record conversion and repository call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContentError {
    /// A stored or supplied record is missing a required field or has the wrong shape.
    /// `entity` names the type being decoded (e.g. "Comment", "Story").
    #[error("invalid {entity} data: {reason}")]
    InvalidData { entity: &'static str, reason: String },

    /// Read-by-id or update-by-id found no matching record
    #[error("{collection} document not found with ID {id}")]
    DocumentNotFound { collection: String, id: String },

    /// An atomic counter/array operation lost every optimistic commit attempt
    #[error("transaction on {collection}/{id} did not commit after {attempts} attempts")]
    TransactionConflict {
        collection: String,
        id: String,
        attempts: u32,
    },

    /// Transport or backend failure, surfaced as-is from the store
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Index-based media operation outside the list (strict index policy only)
    #[error("media index {index} out of range for {len} item(s)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Refused state change (e.g. leaving `Deleted` visibility)
    #[error("cannot transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// The operation needs an author but there is no signed-in user
    #[error("no authenticated session")]
    Unauthenticated,

    /// A post variant was written through the repository of another variant
    #[error("entity belongs in {found}, not {expected}")]
    WrongCollection {
        expected: &'static str,
        found: &'static str,
    },
}

impl ContentError {
    pub fn invalid(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            entity,
            reason: reason.into(),
        }
    }

    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::DocumentNotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// Whether a caller may reasonably retry the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransactionConflict { .. } | Self::StoreUnavailable(_)
        )
    }
}

/// A specialized Result type for the content core.
pub type Result<T> = std::result::Result<T, ContentError>;
