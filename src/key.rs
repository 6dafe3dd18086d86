//! # Key Resolution
//!
//! Every read or write against a media file is addressed by a [`Key`], a
//! discriminant over the three canonical key classes:
//!
//! - [`TagField`]: one of the seven normalized tag fields (title, artist,
//!   album, genre, comment, year, track)
//! - [`AudioField`]: one of the four immutable audio properties (read-only)
//! - `Property`: an arbitrary, format-specific, multi-valued property name
//!
//! The resolver replaces the dynamic method dispatch a host language would
//! use with an explicit lookup table: well-known lowercase names classify as
//! fields, everything else passes through as a property name.
//!
//! [`Accessor`] covers the attribute-style surface (`title`,
//! `all_musicbrainz__album_id`, `isrc=`): the accessor body is mangled into
//! an uppercase property name, with `all_` selecting list-form reads and a
//! trailing `=` marking a setter.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The seven normalized tag fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagField {
    Title,
    Artist,
    Album,
    Genre,
    Comment,
    Year,
    Track,
}

impl TagField {
    pub const ALL: [TagField; 7] = [
        TagField::Title,
        TagField::Artist,
        TagField::Album,
        TagField::Genre,
        TagField::Comment,
        TagField::Year,
        TagField::Track,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TagField::Title => "title",
            TagField::Artist => "artist",
            TagField::Album => "album",
            TagField::Genre => "genre",
            TagField::Comment => "comment",
            TagField::Year => "year",
            TagField::Track => "track",
        }
    }

    pub fn from_name(name: &str) -> Option<TagField> {
        TAG_FIELDS.get(name).copied()
    }

    /// Year and track hold non-negative integers; the rest hold strings.
    pub fn is_numeric(self) -> bool {
        matches!(self, TagField::Year | TagField::Track)
    }
}

impl fmt::Display for TagField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The four audio property fields. Read-only: staging a write against one
/// fails with [`Error::ReadOnlyField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioField {
    Length,
    Bitrate,
    SampleRate,
    Channels,
}

impl AudioField {
    pub const ALL: [AudioField; 4] = [
        AudioField::Length,
        AudioField::Bitrate,
        AudioField::SampleRate,
        AudioField::Channels,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AudioField::Length => "length_ms",
            AudioField::Bitrate => "bitrate",
            AudioField::SampleRate => "sample_rate",
            AudioField::Channels => "channels",
        }
    }

    pub fn from_name(name: &str) -> Option<AudioField> {
        AUDIO_FIELDS.get(name).copied()
    }
}

impl fmt::Display for AudioField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static TAG_FIELDS: Lazy<HashMap<&'static str, TagField>> =
    Lazy::new(|| TagField::ALL.iter().map(|f| (f.name(), *f)).collect());

static AUDIO_FIELDS: Lazy<HashMap<&'static str, AudioField>> =
    Lazy::new(|| AudioField::ALL.iter().map(|f| (f.name(), *f)).collect());

/// A fully classified key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Tag(TagField),
    Audio(AudioField),
    Property(String),
}

impl Key {
    /// Classify an identifier. Lowercase well-known names resolve to their
    /// field; any other non-empty string passes through verbatim as a
    /// property name. Only the empty string is rejected.
    pub fn resolve(identifier: &str) -> Result<Key> {
        if identifier.is_empty() {
            return Err(Error::InvalidKey(identifier.to_string()));
        }
        if let Some(field) = TagField::from_name(identifier) {
            return Ok(Key::Tag(field));
        }
        if let Some(field) = AudioField::from_name(identifier) {
            return Ok(Key::Audio(field));
        }
        Ok(Key::Property(identifier.to_string()))
    }

    pub fn property(name: impl Into<String>) -> Key {
        Key::Property(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Key::Tag(f) => f.name(),
            Key::Audio(f) => f.name(),
            Key::Property(name) => name,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<TagField> for Key {
    fn from(field: TagField) -> Key {
        Key::Tag(field)
    }
}

impl From<AudioField> for Key {
    fn from(field: AudioField) -> Key {
        Key::Audio(field)
    }
}

/// Mangle an accessor body into a property name: uppercase, single
/// underscores deleted, doubled underscores collapsed to one literal
/// underscore.
///
/// ```
/// use mediafile::key::mangle;
///
/// assert_eq!(mangle("musicbrainz__album_id"), "MUSICBRAINZ_ALBUMID");
/// assert_eq!(mangle("title"), "TITLE");
/// ```
pub fn mangle(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut underscores = 0usize;
    for ch in name.chars() {
        if ch == '_' {
            underscores += 1;
            continue;
        }
        for _ in 0..underscores / 2 {
            out.push('_');
        }
        underscores = 0;
        out.push(ch.to_ascii_uppercase());
    }
    for _ in 0..underscores / 2 {
        out.push('_');
    }
    out
}

/// A parsed dynamic accessor: `(all_)?(body)(=)?`.
///
/// The body must consist of `a-z` and `_` only; anything else cannot be
/// resolved dynamically and fails with [`Error::InvalidKey`], which lets a
/// binding layer fall through to normal method dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accessor {
    pub key: Key,
    /// `all_` prefix: return every value instead of the first. Meaningless
    /// on writes.
    pub all: bool,
    /// Trailing `=`: this accessor is a setter.
    pub assign: bool,
}

impl Accessor {
    pub fn parse(name: &str) -> Result<Accessor> {
        let (body, assign) = match name.strip_suffix('=') {
            Some(rest) => (rest, true),
            None => (name, false),
        };
        let (body, all) = match body.strip_prefix("all_") {
            Some(rest) => (rest, true),
            None => (body, false),
        };
        if body.is_empty() || !body.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
            return Err(Error::InvalidKey(name.to_string()));
        }
        Ok(Accessor {
            key: Key::Property(mangle(body)),
            all,
            assign,
        })
    }
}
