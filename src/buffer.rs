//! Staged mutation buffer.
//!
//! Writes never touch the cache or the engine directly: they are validated,
//! then staged here, and only a successful save pushes them out. The buffer
//! is what makes uncommitted-wins reads and safe save retries possible.
//!
//! Validation is eager. A value that fails shape validation is never
//! staged, so a caller cannot discover a type error after other valid
//! changes were already pushed to the engine.

use crate::error::{Error, Result};
use crate::key::{Key, TagField};
use crate::model::{ComplexPropertyMap, PropertyMap, TagPatch, TagValue};
use crate::value::{expect_complex_list, expect_string_list, Variant, VariantMap};
use std::collections::BTreeMap;

/// A single staged write.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationEntry {
    /// Scalar write to a tag field.
    Tag(TagValue),
    /// Standard property write: ordered list of strings.
    Strings(Vec<String>),
    /// Complex property write: ordered list of variant maps.
    Complex(Vec<VariantMap>),
    /// Explicit deletion.
    Clear,
}

/// The drained buffer, partitioned into the three engine push groups.
///
/// Deletions appear as empty lists (standard/complex) or `None` (tag);
/// the engine contract prunes empty lists on merge. A cleared property key
/// is staged in both the standard and the complex group, since the key
/// spaces overlap and clearing the absent side is a no-op.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedGroups {
    pub standard: PropertyMap,
    pub complex: ComplexPropertyMap,
    pub tag: TagPatch,
}

impl StagedGroups {
    pub fn is_empty(&self) -> bool {
        self.standard.is_empty() && self.complex.is_empty() && self.tag.is_empty()
    }
}

/// Key → pending value, last-write-wins.
#[derive(Debug, Default)]
pub struct MutationBuffer {
    entries: BTreeMap<Key, MutationEntry>,
}

impl MutationBuffer {
    pub fn new() -> MutationBuffer {
        MutationBuffer::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Validate and stage one write. `None` stages an explicit deletion.
    /// Prior staged values for the key are overwritten, never merged.
    pub fn stage(&mut self, key: Key, value: Option<Variant>) -> Result<()> {
        let entry = match (&key, value) {
            (Key::Audio(field), _) => return Err(Error::ReadOnlyField(*field)),
            (_, None) => MutationEntry::Clear,
            (Key::Tag(field), Some(value)) => match validate_tag_scalar(*field, &value)? {
                Some(scalar) => MutationEntry::Tag(scalar),
                None => MutationEntry::Clear,
            },
            (Key::Property(_), Some(value)) => match validate_property(&value)? {
                PropertyWrite::Strings(values) => MutationEntry::Strings(values),
                PropertyWrite::Complex(entries) => MutationEntry::Complex(entries),
                PropertyWrite::Empty => MutationEntry::Clear,
            },
        };
        self.entries.insert(key, entry);
        Ok(())
    }

    pub fn get(&self, key: &Key) -> Option<&MutationEntry> {
        self.entries.get(key)
    }

    /// Property keys with a staged, non-empty complex write.
    pub fn staged_complex_keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|(key, entry)| match (key, entry) {
            (Key::Property(name), MutationEntry::Complex(_)) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Partition the staged set by key class for the engine pushes. The
    /// buffer itself is untouched, so a failed push leaves every staged
    /// mutation in place for retry.
    pub fn partition(&self) -> StagedGroups {
        let mut groups = StagedGroups::default();
        for (key, entry) in &self.entries {
            match (key, entry) {
                (Key::Tag(field), MutationEntry::Tag(scalar)) => {
                    groups.tag.insert(*field, Some(scalar.clone()));
                }
                (Key::Tag(field), MutationEntry::Clear) => {
                    groups.tag.insert(*field, None);
                }
                (Key::Property(name), MutationEntry::Strings(values)) => {
                    groups.standard.insert(name.clone(), values.clone());
                }
                (Key::Property(name), MutationEntry::Complex(entries)) => {
                    groups.complex.insert(name.clone(), entries.clone());
                }
                (Key::Property(name), MutationEntry::Clear) => {
                    groups.standard.insert(name.clone(), Vec::new());
                    groups.complex.insert(name.clone(), Vec::new());
                }
                // Audio keys are rejected at stage time; tag keys never
                // carry list entries.
                _ => {}
            }
        }
        groups
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

enum PropertyWrite {
    Strings(Vec<String>),
    Complex(Vec<VariantMap>),
    Empty,
}

/// A property write takes its group from the value shape: strings go to the
/// standard group, maps to the complex group.
fn validate_property(value: &Variant) -> Result<PropertyWrite> {
    match value {
        Variant::Text(_) => Ok(PropertyWrite::Strings(expect_string_list(value)?)),
        Variant::Map(_) => Ok(PropertyWrite::Complex(expect_complex_list(value)?)),
        Variant::List(items) => match items.first() {
            None => Ok(PropertyWrite::Empty),
            Some(Variant::Map(_)) => Ok(PropertyWrite::Complex(expect_complex_list(value)?)),
            Some(_) => Ok(PropertyWrite::Strings(expect_string_list(value)?)),
        },
        other => Err(Error::InvalidValueType(format!(
            "property values must be strings or maps, got {other:?}"
        ))),
    }
}

/// Tag scalars: text for the string fields, non-negative integers for year
/// and track. Empty/zero normalizes to a clear (`Ok(None)`).
fn validate_tag_scalar(field: TagField, value: &Variant) -> Result<Option<TagValue>> {
    if field.is_numeric() {
        match value {
            Variant::Int(n) if *n == 0 => Ok(None),
            Variant::Int(n) if *n > 0 && *n <= i64::from(u32::MAX) => {
                Ok(Some(TagValue::Number(*n as u32)))
            }
            other => Err(Error::InvalidValueType(format!(
                "tag field '{field}' takes a non-negative integer, got {other:?}"
            ))),
        }
    } else {
        match value {
            Variant::Text(s) if s.is_empty() => Ok(None),
            Variant::Text(s) => Ok(Some(TagValue::Text(s.clone()))),
            other => Err(Error::InvalidValueType(format!(
                "tag field '{field}' takes a string, got {other:?}"
            ))),
        }
    }
}
