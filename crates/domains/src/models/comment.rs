//! # Comment
//!
//! A threaded unit of feedback on a post. Replies nest without a depth limit.
//! `Deleted` is terminal: the text is replaced by a placeholder and never
//! changes again.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EditMark;
use crate::error::Result;
use crate::record::{encode_documents, Document, Record, RecordReader};

pub const COMMENT_COLLECTION: &str = "comments";

/// Text shown in place of a deleted comment.
pub const DELETED_PLACEHOLDER: &str = "[Deleted]";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommentStatus {
    #[default]
    Active,
    Deleted,
    Reported,
}

impl CommentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Deleted => "Deleted",
            Self::Reported => "Reported",
        }
    }
}

impl fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Deleted" => Ok(Self::Deleted),
            "Reported" => Ok(Self::Reported),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: String,
    pub user_id: String,
    pub post_id: String,
    /// `None` for a top-level comment.
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    text: String,
    likes: u64,
    replies: Vec<Comment>,
    edit: EditMark,
    status: CommentStatus,
}

impl Comment {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        post_id: impl Into<String>,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            post_id: post_id.into(),
            parent_id: None,
            created_at,
            text: text.into(),
            likes: 0,
            replies: Vec::new(),
            edit: EditMark::default(),
            status: CommentStatus::Active,
        }
    }

    /// A reply to `self`, attached to the same post. Not yet added to `replies`.
    pub fn reply(
        &self,
        id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut reply = Self::new(id, user_id, self.post_id.clone(), text, created_at);
        reply.parent_id = Some(self.id.clone());
        reply
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn likes(&self) -> u64 {
        self.likes
    }

    pub fn replies(&self) -> &[Comment] {
        &self.replies
    }

    pub fn status(&self) -> CommentStatus {
        self.status
    }

    pub fn edit_mark(&self) -> EditMark {
        self.edit
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn like(&mut self) {
        self.likes = self.likes.saturating_add(1);
    }

    /// No-op at zero.
    pub fn unlike(&mut self) {
        self.likes = self.likes.saturating_sub(1);
    }

    /// The caller tracks whether this user already liked the comment.
    pub fn toggle_like(&mut self, liked_by_user: bool) {
        if liked_by_user {
            self.unlike();
        } else {
            self.like();
        }
    }

    /// Replaces the text and stamps the edit. Refused once deleted.
    pub fn edit(&mut self, text: impl Into<String>, at: DateTime<Utc>) -> bool {
        if self.status == CommentStatus::Deleted {
            return false;
        }
        self.text = text.into();
        self.edit.stamp(at);
        true
    }

    /// One-way: overwrites the text with the placeholder.
    pub fn delete(&mut self) {
        self.status = CommentStatus::Deleted;
        self.text = DELETED_PLACEHOLDER.to_string();
    }

    /// Flags the comment for moderation. A deleted comment stays deleted.
    pub fn report(&mut self) -> bool {
        if self.status == CommentStatus::Deleted {
            return false;
        }
        self.status = CommentStatus::Reported;
        true
    }

    /// Appends a direct reply, re-parenting it onto this comment.
    pub fn add_reply(&mut self, mut reply: Comment) {
        reply.parent_id = Some(self.id.clone());
        self.replies.push(reply);
    }

    /// Removes a direct reply. `None` when no reply has that id.
    pub fn remove_reply(&mut self, reply_id: &str) -> Option<Comment> {
        let index = self.replies.iter().position(|r| r.id == reply_id)?;
        Some(self.replies.remove(index))
    }

    /// Depth-first search of the whole subtree, excluding `self`.
    pub fn find_reply(&self, reply_id: &str) -> Option<&Comment> {
        self.replies.iter().find_map(|reply| {
            if reply.id == reply_id {
                Some(reply)
            } else {
                reply.find_reply(reply_id)
            }
        })
    }

    /// Number of comments below this one, at any depth.
    pub fn reply_count(&self) -> usize {
        self.replies.iter().map(|r| 1 + r.reply_count()).sum()
    }
}

impl Document for Comment {
    const ENTITY: &'static str = "Comment";

    fn id(&self) -> &str {
        &self.id
    }

    fn collection(&self) -> &'static str {
        COMMENT_COLLECTION
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("commentID".into(), self.id.as_str().into());
        record.insert("userID".into(), self.user_id.as_str().into());
        record.insert("postID".into(), self.post_id.as_str().into());
        record.insert("parentCommentID".into(), self.parent_id.clone().into());
        record.insert("text".into(), self.text.as_str().into());
        record.insert("likes".into(), self.likes.into());
        record.insert("timestamp".into(), self.created_at.into());
        record.insert("children".into(), encode_documents(&self.replies));
        record.insert("status".into(), self.status.as_str().into());
        self.edit.write(&mut record);
        record
    }

    fn from_record(record: &Record) -> Result<Self> {
        let r = RecordReader::new(record, Self::ENTITY);
        Ok(Self {
            id: r.string("commentID")?,
            user_id: r.string("userID")?,
            post_id: r.string("postID")?,
            parent_id: r.opt_string("parentCommentID")?,
            created_at: r.timestamp("timestamp")?,
            text: r.string("text")?,
            likes: r.count("likes")?,
            replies: r.opt_documents("children")?,
            edit: EditMark::read(&r)?,
            status: r.parsed("status")?,
        })
    }
}
