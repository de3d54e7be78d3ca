//! # Media
//!
//! One attached asset. Embedded in posts and stories, and also stored on its
//! own in the `media` collection.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ContentError, Result};
use crate::record::{Document, Record, RecordReader, RecordValue};

pub const MEDIA_COLLECTION: &str = "media";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Image,
    Video,
    Sound,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Video => "Video",
            Self::Sound => "Sound",
        }
    }

    /// Only time-based media carry a duration.
    pub fn is_timed(self) -> bool {
        !matches!(self, Self::Image)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Image" => Ok(Self::Image),
            "Video" => Ok(Self::Video),
            "Sound" => Ok(Self::Sound),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Media {
    pub id: String,
    media_type: MediaType,
    /// Always `None` for images.
    duration: Option<Duration>,
    pub title: Option<String>,
    pub owner_id: Option<String>,
    pub url: Option<String>,
}

impl Media {
    /// A duration passed for an image is dropped.
    pub fn new(
        id: impl Into<String>,
        media_type: MediaType,
        duration: Option<Duration>,
        title: Option<String>,
        owner_id: Option<String>,
        url: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            media_type,
            duration: duration.filter(|_| media_type.is_timed()),
            title,
            owner_id,
            url,
        }
    }

    pub fn image(id: impl Into<String>, url: Option<String>) -> Self {
        Self::new(id, MediaType::Image, None, None, None, url)
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Ignored for images. Returns whether the duration was stored.
    pub fn set_duration(&mut self, duration: Duration) -> bool {
        if !self.media_type.is_timed() {
            return false;
        }
        self.duration = Some(duration);
        true
    }

    /// Switching to `Image` clears any duration.
    pub fn set_media_type(&mut self, media_type: MediaType) {
        self.media_type = media_type;
        if !media_type.is_timed() {
            self.duration = None;
        }
    }
}

impl Document for Media {
    const ENTITY: &'static str = "Media";

    fn id(&self) -> &str {
        &self.id
    }

    fn collection(&self) -> &'static str {
        MEDIA_COLLECTION
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("mediaID".into(), self.id.as_str().into());
        record.insert("mediaType".into(), self.media_type.as_str().into());
        record.insert("duration".into(), duration_value(self.duration));
        record.insert("title".into(), self.title.clone().into());
        record.insert("userID".into(), self.owner_id.clone().into());
        record.insert("fileURL".into(), self.url.clone().into());
        record
    }

    fn from_record(record: &Record) -> Result<Self> {
        let r = RecordReader::new(record, Self::ENTITY);
        let duration = match r.opt_double("duration")? {
            Some(secs) if secs.is_finite() && secs >= 0.0 => Some(Duration::from_secs_f64(secs)),
            Some(secs) => {
                return Err(ContentError::invalid(
                    Self::ENTITY,
                    format!("duration {secs} is not a valid length"),
                ))
            }
            None => None,
        };
        Ok(Self::new(
            r.string("mediaID")?,
            r.parsed("mediaType")?,
            duration,
            r.opt_string("title")?,
            r.opt_string("userID")?,
            r.opt_string("fileURL")?,
        ))
    }
}

/// Record value for a standalone duration field.
pub fn duration_value(duration: Option<Duration>) -> RecordValue {
    duration.map(|d| d.as_secs_f64()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> Media {
        Media::new(
            "m1",
            MediaType::Video,
            Some(Duration::from_millis(12_500)),
            Some("intro".into()),
            Some("u1".into()),
            None,
        )
    }

    #[test]
    fn test_image_never_keeps_duration() {
        let mut image = Media::new("m2", MediaType::Image, Some(Duration::from_secs(3)), None, None, None);
        assert_eq!(image.duration(), None);
        assert!(!image.set_duration(Duration::from_secs(1)));
        assert_eq!(image.duration(), None);
    }

    #[test]
    fn test_switching_to_image_clears_duration() {
        let mut media = clip();
        media.set_media_type(MediaType::Image);
        assert_eq!(media.duration(), None);
    }

    #[test]
    fn test_record_keeps_explicit_nulls() {
        let record = clip().to_record();
        assert_eq!(record.get("fileURL"), Some(&RecordValue::Null));
        assert_eq!(Media::from_record(&record).unwrap(), clip());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let mut record = clip().to_record();
        record.insert("mediaType".into(), "Effect".into());
        assert!(Media::from_record(&record).is_err());
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let mut record = clip().to_record();
        record.remove("mediaID");
        assert!(Media::from_record(&record).is_err());
    }
}
