//! # Domain Models
//!
//! The content entities: media, threaded comments, and the post family.
//! Every mutation here is a pure, in-memory operation; persistence lives
//! behind the `DocumentStore` port.

pub mod comment;
pub mod media;
pub mod post;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::record::{Record, RecordReader};

pub use comment::{Comment, CommentStatus, COMMENT_COLLECTION, DELETED_PLACEHOLDER};
pub use media::{duration_value, Media, MediaType, MEDIA_COLLECTION};
pub use post::{
    to_delta, DiscussionDetails, MediaIndexPolicy, Post, PostBase, PostKind, PostVariant,
    StoryDetails, Visibility, DEFAULT_STORY_DURATION, DISCUSSION_POSTS_COLLECTION,
    POSTS_COLLECTION, STORIES_COLLECTION,
};

/// Edited flag plus the instant of the latest edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditMark {
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
}

impl EditMark {
    pub fn stamp(&mut self, at: DateTime<Utc>) {
        self.is_edited = true;
        self.edited_at = Some(at);
    }

    fn write(&self, record: &mut Record) {
        record.insert("isEdited".into(), self.is_edited.into());
        record.insert("editedTimestamp".into(), self.edited_at.into());
    }

    fn read(reader: &RecordReader<'_>) -> Result<Self> {
        Ok(Self {
            is_edited: reader.opt_bool("isEdited")?.unwrap_or(false),
            edited_at: reader.opt_timestamp("editedTimestamp")?,
        })
    }
}

/// Set-style insert into an ordered list. Returns whether the value was new.
pub(crate) fn insert_unique(values: &mut Vec<String>, value: &str) -> bool {
    if values.iter().any(|v| v == value) {
        return false;
    }
    values.push(value.to_string());
    true
}

/// Removes every occurrence. Returns whether anything was removed.
pub(crate) fn remove_value(values: &mut Vec<String>, value: &str) -> bool {
    let before = values.len();
    values.retain(|v| v != value);
    values.len() != before
}
