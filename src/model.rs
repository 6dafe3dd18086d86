//! Core data types for the four metadata sources.
//!
//! - [`AudioProperties`]: immutable audio characteristics, read once at open
//! - [`AudioTag`]: the seven normalized tag fields
//! - [`PropertyMap`]: free-form string properties, multi-valued
//! - [`ComplexPropertyMap`]: structured properties (e.g. embedded pictures)
//!
//! The absent-field invariant lives here: a tag field is `None`, never an
//! empty string or zero. [`non_empty`] and [`non_zero`] are the
//! normalization helpers every boundary uses.

use crate::key::TagField;
use crate::value::VariantMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form properties: uppercase-ish key to an ordered, non-empty list of
/// strings. A key with an empty list does not exist; [`prune_empty`]
/// enforces that on write-back.
pub type PropertyMap = BTreeMap<String, Vec<String>>;

/// Structured properties: key to an ordered list of string-keyed variant
/// maps, one entry per record.
pub type ComplexPropertyMap = BTreeMap<String, Vec<VariantMap>>;

/// Immutable audio characteristics. Fetched at most once, at open time, and
/// kept across close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioProperties {
    pub length_ms: u32,
    pub bitrate_kbps: u32,
    pub sample_rate_hz: u32,
    pub channels: u32,
}

/// The seven normalized tag fields. Absent fields are omitted from
/// serialization so equality and serialized form agree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioTag {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<u32>,
}

impl AudioTag {
    pub fn is_empty(&self) -> bool {
        TagField::ALL.iter().all(|f| self.get(*f).is_none())
    }

    /// Apply the absent-not-empty invariant to every field.
    pub fn normalized(self) -> AudioTag {
        AudioTag {
            title: self.title.and_then(non_empty),
            artist: self.artist.and_then(non_empty),
            album: self.album.and_then(non_empty),
            genre: self.genre.and_then(non_empty),
            comment: self.comment.and_then(non_empty),
            year: self.year.and_then(non_zero),
            track: self.track.and_then(non_zero),
        }
    }

    pub fn get(&self, field: TagField) -> Option<TagValue> {
        match field {
            TagField::Title => self.title.clone().map(TagValue::Text),
            TagField::Artist => self.artist.clone().map(TagValue::Text),
            TagField::Album => self.album.clone().map(TagValue::Text),
            TagField::Genre => self.genre.clone().map(TagValue::Text),
            TagField::Comment => self.comment.clone().map(TagValue::Text),
            TagField::Year => self.year.map(TagValue::Number),
            TagField::Track => self.track.map(TagValue::Number),
        }
    }

    /// Overwrite one field, normalizing empty/zero to absent. A mismatched
    /// scalar shape clears the field; staging validation upstream makes that
    /// unreachable through the facade.
    pub fn set(&mut self, field: TagField, value: Option<TagValue>) {
        let text = match &value {
            Some(TagValue::Text(s)) => non_empty(s.clone()),
            _ => None,
        };
        let number = match &value {
            Some(TagValue::Number(n)) => non_zero(*n),
            _ => None,
        };
        match field {
            TagField::Title => self.title = text,
            TagField::Artist => self.artist = text,
            TagField::Album => self.album = text,
            TagField::Genre => self.genre = text,
            TagField::Comment => self.comment = text,
            TagField::Year => self.year = number,
            TagField::Track => self.track = number,
        }
    }
}

/// A scalar tag value: text for the five string fields, a non-negative
/// number for year and track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Text(String),
    Number(u32),
}

/// A partial tag update: only the listed fields are overwritten, `None`
/// clears a field.
pub type TagPatch = BTreeMap<TagField, Option<TagValue>>;

/// Empty-to-absent normalization for string fields.
pub fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Zero-to-absent normalization for numeric fields.
pub fn non_zero(n: u32) -> Option<u32> {
    if n == 0 {
        None
    } else {
        Some(n)
    }
}

/// Drop keys whose value list is empty.
pub fn prune_empty(map: &mut PropertyMap) {
    map.retain(|_, values| !values.is_empty());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_drops_empty_strings_and_zeroes() {
        let tag = AudioTag {
            title: Some(String::new()),
            artist: Some("Ana".to_string()),
            year: Some(0),
            track: Some(3),
            ..AudioTag::default()
        }
        .normalized();

        assert_eq!(tag.title, None);
        assert_eq!(tag.artist.as_deref(), Some("Ana"));
        assert_eq!(tag.year, None);
        assert_eq!(tag.track, Some(3));
    }

    #[test]
    fn set_normalizes_on_write() {
        let mut tag = AudioTag::default();
        tag.set(TagField::Title, Some(TagValue::Text(String::new())));
        assert_eq!(tag.title, None);

        tag.set(TagField::Year, Some(TagValue::Number(0)));
        assert_eq!(tag.year, None);

        tag.set(TagField::Year, Some(TagValue::Number(1999)));
        assert_eq!(tag.year, Some(1999));

        tag.set(TagField::Year, None);
        assert_eq!(tag.year, None);
    }

    #[test]
    fn get_returns_scalars_by_field() {
        let tag = AudioTag {
            title: Some("Sky".to_string()),
            track: Some(3),
            ..AudioTag::default()
        };
        assert_eq!(tag.get(TagField::Title), Some(TagValue::Text("Sky".into())));
        assert_eq!(tag.get(TagField::Track), Some(TagValue::Number(3)));
        assert_eq!(tag.get(TagField::Album), None);
    }

    #[test]
    fn serialization_omits_absent_fields() {
        let tag = AudioTag {
            title: Some("Sky".to_string()),
            ..AudioTag::default()
        };
        assert_eq!(serde_json::to_string(&tag).unwrap(), r#"{"title":"Sky"}"#);
    }

    #[test]
    fn empty_tag_serializes_to_empty_object() {
        assert_eq!(serde_json::to_string(&AudioTag::default()).unwrap(), "{}");
    }

    #[test]
    fn prune_empty_removes_empty_lists() {
        let mut map = PropertyMap::new();
        map.insert("TITLE".into(), vec!["X".into()]);
        map.insert("GONE".into(), vec![]);
        prune_empty(&mut map);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("TITLE"));
    }
}
