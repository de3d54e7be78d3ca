//! # Post Family
//!
//! Standard posts, discussion posts and stories share one base payload
//! (media, comments, counters, tags, visibility, edit state) and differ only
//! in a variant payload. Each variant lives in its own collection.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{insert_unique, remove_value, Comment, EditMark, Media};
use crate::error::Result;
use crate::record::{encode_documents, Document, Record, RecordReader};

pub const POSTS_COLLECTION: &str = "posts";
pub const STORIES_COLLECTION: &str = "stories";
pub const DISCUSSION_POSTS_COLLECTION: &str = "discussionPosts";

/// Stories expire this long after creation unless told otherwise.
pub const DEFAULT_STORY_DURATION: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

/// What an index-based media operation does with an index past the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaIndexPolicy {
    /// Leave the list untouched and report success.
    #[default]
    Ignore,
    /// Fail with `IndexOutOfRange`.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostKind {
    Standard,
    Discussion,
    Story,
}

impl PostKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Discussion => "Discussion",
            Self::Story => "Story",
        }
    }

    pub fn collection(self) -> &'static str {
        match self {
            Self::Standard => POSTS_COLLECTION,
            Self::Discussion => DISCUSSION_POSTS_COLLECTION,
            Self::Story => STORIES_COLLECTION,
        }
    }

    /// Entity name reported in decoding errors.
    pub fn entity(self) -> &'static str {
        match self {
            Self::Standard => "Post",
            Self::Discussion => "DiscussionPost",
            Self::Story => "Story",
        }
    }
}

impl FromStr for PostKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Standard" => Ok(Self::Standard),
            "Discussion" => Ok(Self::Discussion),
            "Story" => Ok(Self::Story),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Deleted,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "Public",
            Self::Private => "Private",
            Self::Deleted => "Deleted",
        }
    }

    /// `Public` and `Private` swap freely; nothing leaves `Deleted`.
    pub fn can_become(self, next: Visibility) -> bool {
        self != Self::Deleted || next == Self::Deleted
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Public" => Ok(Self::Public),
            "Private" => Ok(Self::Private),
            "Deleted" => Ok(Self::Deleted),
            _ => Err(()),
        }
    }
}

/// Payload shared by every member of the post family.
#[derive(Debug, Clone, PartialEq)]
pub struct PostBase {
    pub id: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    media: Vec<Media>,
    comments: Vec<Comment>,
    likes: u64,
    shares: u64,
    impressions: u64,
    tags: Vec<String>,
    visibility: Visibility,
    edit: EditMark,
}

impl PostBase {
    pub fn new(id: impl Into<String>, author_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            author_id: author_id.into(),
            created_at,
            media: Vec::new(),
            comments: Vec::new(),
            likes: 0,
            shares: 0,
            impressions: 0,
            tags: Vec::new(),
            visibility: Visibility::Public,
            edit: EditMark::default(),
        }
    }

    pub fn media(&self) -> &[Media] {
        &self.media
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn likes(&self) -> u64 {
        self.likes
    }

    pub fn shares(&self) -> u64 {
        self.shares
    }

    pub fn impressions(&self) -> u64 {
        self.impressions
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn edit_mark(&self) -> EditMark {
        self.edit
    }

    // Counters

    pub fn like(&mut self) {
        self.likes = self.likes.saturating_add(1);
    }

    /// No-op at zero.
    pub fn unlike(&mut self) {
        self.likes = self.likes.saturating_sub(1);
    }

    pub fn increment_shares(&mut self) {
        self.shares = self.shares.saturating_add(1);
    }

    pub fn increment_impressions(&mut self) {
        self.impressions = self.impressions.saturating_add(1);
    }

    // Comments

    pub fn add_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    /// Removes a top-level comment by id.
    pub fn remove_comment(&mut self, comment_id: &str) -> Option<Comment> {
        let index = self.comments.iter().position(|c| c.id == comment_id)?;
        Some(self.comments.remove(index))
    }

    /// Every comment on the post, replies included.
    pub fn comment_count(&self) -> usize {
        self.comments.iter().map(|c| 1 + c.reply_count()).sum()
    }

    // Media. Out-of-range indices leave the list untouched and return `None`.

    pub fn add_media(&mut self, media: Media) {
        self.media.push(media);
    }

    pub fn remove_media_at(&mut self, index: usize) -> Option<Media> {
        (index < self.media.len()).then(|| self.media.remove(index))
    }

    pub fn remove_media_by_id(&mut self, media_id: &str) -> Option<Media> {
        let index = self.media.iter().position(|m| m.id == media_id)?;
        Some(self.media.remove(index))
    }

    /// Returns the replaced item.
    pub fn replace_media_at(&mut self, index: usize, media: Media) -> Option<Media> {
        let slot = self.media.get_mut(index)?;
        Some(std::mem::replace(slot, media))
    }

    pub fn clear_media(&mut self) {
        self.media.clear();
    }

    // Tags

    pub fn add_tag(&mut self, tag: &str) -> bool {
        insert_unique(&mut self.tags, tag)
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        remove_value(&mut self.tags, tag)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    // Edits

    /// The single side effect every content edit shares.
    pub fn mark_as_edited(&mut self, at: DateTime<Utc>) {
        self.edit.stamp(at);
    }

    /// Refuses to leave `Deleted`; returns whether the change was applied.
    pub fn edit_visibility(&mut self, visibility: Visibility, at: DateTime<Utc>) -> bool {
        if !self.visibility.can_become(visibility) {
            return false;
        }
        self.visibility = visibility;
        self.mark_as_edited(at);
        true
    }

    fn write(&self, record: &mut Record) {
        record.insert("postID".into(), self.id.as_str().into());
        record.insert("userID".into(), self.author_id.as_str().into());
        record.insert("media".into(), encode_documents(&self.media));
        record.insert("comments".into(), encode_documents(&self.comments));
        record.insert("likes".into(), self.likes.into());
        record.insert("shares".into(), self.shares.into());
        record.insert("impressions".into(), self.impressions.into());
        record.insert("tags".into(), self.tags.as_slice().into());
        record.insert("timestamp".into(), self.created_at.into());
        record.insert("visibility".into(), self.visibility.as_str().into());
        self.edit.write(record);
    }

    fn read(r: &RecordReader<'_>) -> Result<Self> {
        let mut tags = Vec::new();
        for tag in r.strings("tags")? {
            insert_unique(&mut tags, &tag);
        }
        Ok(Self {
            id: r.string("postID")?,
            author_id: r.string("userID")?,
            created_at: r.timestamp("timestamp")?,
            media: r.documents("media")?,
            comments: r.documents("comments")?,
            likes: r.count("likes")?,
            shares: r.count("shares")?,
            impressions: r.count("impressions")?,
            tags,
            visibility: r.parsed("visibility")?,
            edit: EditMark::read(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscussionDetails {
    pub community_id: String,
    pub title: String,
    pub body: String,
    pub verified_only: bool,
    flairs: Vec<String>,
}

impl DiscussionDetails {
    pub fn new(community_id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            community_id: community_id.into(),
            title: title.into(),
            body: body.into(),
            verified_only: false,
            flairs: Vec::new(),
        }
    }

    pub fn flairs(&self) -> &[String] {
        &self.flairs
    }

    pub fn add_flair(&mut self, flair: &str) -> bool {
        insert_unique(&mut self.flairs, flair)
    }

    pub fn remove_flair(&mut self, flair: &str) -> bool {
        remove_value(&mut self.flairs, flair)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoryDetails {
    pub caption: String,
    expires_at: DateTime<Utc>,
    reactions: Vec<String>,
}

impl StoryDetails {
    /// Expiration is `created_at + lifetime`.
    pub fn new(caption: impl Into<String>, created_at: DateTime<Utc>, lifetime: std::time::Duration) -> Self {
        Self {
            caption: caption.into(),
            expires_at: add_saturating(created_at, lifetime),
            reactions: Vec::new(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Recomputed on every call, never stored.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn extend_expiration(&mut self, by: std::time::Duration) {
        self.expires_at = add_saturating(self.expires_at, by);
    }

    pub fn reactions(&self) -> &[String] {
        &self.reactions
    }

    pub fn react(&mut self, reaction: impl Into<String>) {
        self.reactions.push(reaction.into());
    }
}

/// Saturates instead of failing on absurdly long lifetimes.
pub fn to_delta(duration: std::time::Duration) -> Duration {
    Duration::from_std(duration).unwrap_or_else(|_| Duration::days(365 * 1000))
}

/// `at + by`, pinned to the latest representable instant on overflow.
fn add_saturating(at: DateTime<Utc>, by: std::time::Duration) -> DateTime<Utc> {
    Duration::from_std(by)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[derive(Debug, Clone, PartialEq)]
pub enum PostVariant {
    Standard { caption: String, short_form: bool },
    Discussion(DiscussionDetails),
    Story(StoryDetails),
}

/// A member of the post family: shared base plus variant payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub base: PostBase,
    pub variant: PostVariant,
}

impl Post {
    pub fn standard(
        id: impl Into<String>,
        author_id: impl Into<String>,
        caption: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            base: PostBase::new(id, author_id, created_at),
            variant: PostVariant::Standard {
                caption: caption.into(),
                short_form: false,
            },
        }
    }

    pub fn discussion(
        id: impl Into<String>,
        author_id: impl Into<String>,
        details: DiscussionDetails,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            base: PostBase::new(id, author_id, created_at),
            variant: PostVariant::Discussion(details),
        }
    }

    pub fn story(
        id: impl Into<String>,
        author_id: impl Into<String>,
        caption: impl Into<String>,
        created_at: DateTime<Utc>,
        lifetime: std::time::Duration,
    ) -> Self {
        Self {
            base: PostBase::new(id, author_id, created_at),
            variant: PostVariant::Story(StoryDetails::new(caption, created_at, lifetime)),
        }
    }

    pub fn kind(&self) -> PostKind {
        match self.variant {
            PostVariant::Standard { .. } => PostKind::Standard,
            PostVariant::Discussion(_) => PostKind::Discussion,
            PostVariant::Story(_) => PostKind::Story,
        }
    }

    pub fn id(&self) -> &str {
        &self.base.id
    }

    pub fn as_discussion(&self) -> Option<&DiscussionDetails> {
        match &self.variant {
            PostVariant::Discussion(details) => Some(details),
            _ => None,
        }
    }

    pub fn as_discussion_mut(&mut self) -> Option<&mut DiscussionDetails> {
        match &mut self.variant {
            PostVariant::Discussion(details) => Some(details),
            _ => None,
        }
    }

    pub fn as_story(&self) -> Option<&StoryDetails> {
        match &self.variant {
            PostVariant::Story(details) => Some(details),
            _ => None,
        }
    }

    pub fn as_story_mut(&mut self) -> Option<&mut StoryDetails> {
        match &mut self.variant {
            PostVariant::Story(details) => Some(details),
            _ => None,
        }
    }

    /// Caption of a standard post or story; discussions carry a title instead.
    pub fn caption(&self) -> Option<&str> {
        match &self.variant {
            PostVariant::Standard { caption, .. } => Some(caption),
            PostVariant::Story(story) => Some(&story.caption),
            PostVariant::Discussion(_) => None,
        }
    }

    /// `false` for stories and discussions, or when the flag is unset.
    pub fn is_short_form(&self) -> bool {
        matches!(self.variant, PostVariant::Standard { short_form: true, .. })
    }

    pub fn set_short_form(&mut self, value: bool) -> bool {
        match &mut self.variant {
            PostVariant::Standard { short_form, .. } => {
                *short_form = value;
                true
            }
            _ => false,
        }
    }

    pub fn edit_caption(&mut self, text: impl Into<String>, at: DateTime<Utc>) -> bool {
        let caption = match &mut self.variant {
            PostVariant::Standard { caption, .. } => caption,
            PostVariant::Story(story) => &mut story.caption,
            PostVariant::Discussion(_) => return false,
        };
        *caption = text.into();
        self.base.mark_as_edited(at);
        true
    }

    pub fn edit_title(&mut self, title: impl Into<String>, at: DateTime<Utc>) -> bool {
        let Some(details) = self.as_discussion_mut() else {
            return false;
        };
        details.title = title.into();
        self.base.mark_as_edited(at);
        true
    }

    pub fn edit_body(&mut self, body: impl Into<String>, at: DateTime<Utc>) -> bool {
        let Some(details) = self.as_discussion_mut() else {
            return false;
        };
        details.body = body.into();
        self.base.mark_as_edited(at);
        true
    }

    pub fn edit_visibility(&mut self, visibility: Visibility, at: DateTime<Utc>) -> bool {
        self.base.edit_visibility(visibility, at)
    }

    /// Always `false` for anything but a story.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.as_story().is_some_and(|story| story.is_expired_at(now))
    }
}

impl Document for Post {
    const ENTITY: &'static str = "Post";

    fn id(&self) -> &str {
        &self.base.id
    }

    fn collection(&self) -> &'static str {
        self.kind().collection()
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("postType".into(), self.kind().as_str().into());
        self.base.write(&mut record);
        match &self.variant {
            PostVariant::Standard { caption, short_form } => {
                record.insert("caption".into(), caption.as_str().into());
                record.insert("isShortForm".into(), (*short_form).into());
            }
            PostVariant::Discussion(details) => {
                record.insert("communityID".into(), details.community_id.as_str().into());
                record.insert("title".into(), details.title.as_str().into());
                record.insert("textContent".into(), details.body.as_str().into());
                record.insert("verifiedOnly".into(), details.verified_only.into());
                record.insert("flairs".into(), details.flairs.as_slice().into());
            }
            PostVariant::Story(story) => {
                record.insert("caption".into(), story.caption.as_str().into());
                record.insert("expirationDate".into(), story.expires_at.into());
                record.insert("reactions".into(), story.reactions.as_slice().into());
            }
        }
        record
    }

    fn from_record(record: &Record) -> Result<Self> {
        let kind: PostKind = RecordReader::new(record, Self::ENTITY).parsed("postType")?;
        let r = RecordReader::new(record, kind.entity());
        let base = PostBase::read(&r)?;
        let variant = match kind {
            PostKind::Standard => PostVariant::Standard {
                caption: r.string("caption")?,
                short_form: r.opt_bool("isShortForm")?.unwrap_or(false),
            },
            PostKind::Discussion => {
                let mut details = DiscussionDetails::new(
                    r.string("communityID")?,
                    r.string("title")?,
                    r.string("textContent")?,
                );
                details.verified_only = r.opt_bool("verifiedOnly")?.unwrap_or(false);
                for flair in r.strings("flairs")? {
                    details.add_flair(&flair);
                }
                PostVariant::Discussion(details)
            }
            PostKind::Story => PostVariant::Story(StoryDetails {
                caption: r.string("caption")?,
                expires_at: r.timestamp("expirationDate")?,
                reactions: r.strings("reactions")?,
            }),
        };
        Ok(Self { base, variant })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContentError;
    use crate::models::MediaType;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 13, hour, 0, 0).unwrap()
    }

    fn post() -> Post {
        Post::standard("p1", "u1", "sunset", at(0))
    }

    #[test]
    fn test_tags_have_set_semantics() {
        let mut p = post();
        assert!(p.base.add_tag("rust"));
        assert!(!p.base.add_tag("rust"));
        assert_eq!(p.base.tags(), ["rust".to_string()]);
        assert!(p.base.remove_tag("rust"));
        assert!(p.base.add_tag("rust"));
        assert!(p.base.has_tag("rust"));
    }

    #[test]
    fn test_counters_never_go_negative() {
        let mut p = post();
        p.base.unlike();
        assert_eq!(p.base.likes(), 0);
        p.base.like();
        p.base.increment_shares();
        p.base.increment_impressions();
        assert_eq!((p.base.likes(), p.base.shares(), p.base.impressions()), (1, 1, 1));
    }

    #[test]
    fn test_media_index_bounds_are_checked() {
        let mut p = post();
        p.base.add_media(Media::image("m1", None));
        assert!(p.base.remove_media_at(3).is_none());
        assert!(p.base.replace_media_at(1, Media::image("m2", None)).is_none());
        assert_eq!(p.base.media().len(), 1);

        let old = p.base.replace_media_at(0, Media::image("m2", None)).unwrap();
        assert_eq!(old.id, "m1");
        assert_eq!(p.base.remove_media_by_id("m2").map(|m| m.id), Some("m2".to_string()));
        assert!(p.base.media().is_empty());
    }

    #[test]
    fn test_every_edit_marks_the_post() {
        let mut p = post();
        assert!(!p.base.edit_mark().is_edited);
        assert!(p.edit_caption("sunrise", at(1)));
        assert_eq!(p.base.edit_mark().edited_at, Some(at(1)));
        assert!(!p.edit_title("no title on a standard post", at(2)));
        assert_eq!(p.base.edit_mark().edited_at, Some(at(1)));

        let mut d = Post::discussion("d1", "u1", DiscussionDetails::new("c1", "Q", "body"), at(0));
        assert!(d.edit_body("new body", at(3)));
        assert!(d.edit_title("new title", at(4)));
        assert_eq!(d.base.edit_mark().edited_at, Some(at(4)));
        assert!(!d.edit_caption("nope", at(5)));
    }

    #[test]
    fn test_visibility_cannot_leave_deleted() {
        let mut p = post();
        assert!(p.edit_visibility(Visibility::Private, at(1)));
        assert!(p.edit_visibility(Visibility::Public, at(2)));
        assert!(p.edit_visibility(Visibility::Deleted, at(3)));
        assert!(!p.edit_visibility(Visibility::Public, at(4)));
        assert_eq!(p.base.visibility(), Visibility::Deleted);
        assert_eq!(p.base.edit_mark().edited_at, Some(at(3)));
    }

    #[test]
    fn test_story_expiration() {
        let mut s = Post::story("s1", "u1", "hi", at(0), DEFAULT_STORY_DURATION);
        assert!(!s.is_expired_at(at(23)));
        assert!(s.is_expired_at(at(0) + Duration::hours(25)));

        s.as_story_mut().unwrap().extend_expiration(std::time::Duration::from_secs(2 * 3600));
        assert!(!s.is_expired_at(at(0) + Duration::hours(25)));
        assert!(!post().is_expired_at(at(0) + Duration::days(400)));
    }

    #[test]
    fn test_round_trip_each_variant() {
        let mut p = post();
        p.set_short_form(true);
        p.base.add_tag("golden-hour");
        p.base.add_media(Media::new(
            "m1",
            MediaType::Sound,
            Some(std::time::Duration::from_secs(30)),
            Some("waves".into()),
            None,
            Some("https://cdn.example/m1".into()),
        ));
        let mut c = Comment::new("c1", "u2", "p1", "nice", at(1));
        c.add_reply(Comment::new("c2", "u1", "p1", "thanks", at(2)));
        p.base.add_comment(c);

        let mut d = Post::discussion("d1", "u1", DiscussionDetails::new("c1", "Q", "body"), at(0));
        d.as_discussion_mut().unwrap().add_flair("help");
        d.as_discussion_mut().unwrap().verified_only = true;

        let mut s = Post::story("s1", "u1", "hi", at(0), DEFAULT_STORY_DURATION);
        s.as_story_mut().unwrap().react("🔥");

        for original in [p, d, s] {
            let back = Post::from_record(&original.to_record()).unwrap();
            assert_eq!(back, original);
            assert_eq!(back.collection(), original.kind().collection());
        }
    }

    #[test]
    fn test_bogus_visibility_is_invalid() {
        let mut record = post().to_record();
        record.insert("visibility".into(), "Bogus".into());
        assert!(matches!(
            Post::from_record(&record),
            Err(ContentError::InvalidData { entity: "Post", .. })
        ));
    }

    #[test]
    fn test_story_errors_name_the_story() {
        let mut record = Post::story("s1", "u1", "hi", at(0), DEFAULT_STORY_DURATION).to_record();
        record.remove("expirationDate");
        assert!(matches!(
            Post::from_record(&record),
            Err(ContentError::InvalidData { entity: "Story", .. })
        ));
    }

    #[test]
    fn test_huge_extension_saturates() {
        let huge = std::time::Duration::from_secs(10_000_000_000_000);
        let mut s = Post::story("s1", "u1", "hi", at(0), DEFAULT_STORY_DURATION);
        s.as_story_mut().unwrap().extend_expiration(huge);
        assert_eq!(s.as_story().unwrap().expires_at(), DateTime::<Utc>::MAX_UTC);
        s.as_story_mut().unwrap().extend_expiration(huge);
        assert!(!s.is_expired_at(at(0) + Duration::days(365 * 1000)));

        let forever = Post::story("s2", "u1", "hi", at(0), std::time::Duration::MAX);
        assert_eq!(forever.as_story().unwrap().expires_at(), DateTime::<Utc>::MAX_UTC);
    }
}
