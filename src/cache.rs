//! Lazy per-source property cache.
//!
//! Each cached source sits in a three-state [`Slot`]: unfetched, fetched and
//! present, or fetched and absent. "Have we asked the engine yet" is an
//! explicit fact rather than a default-value trick, which is what makes the
//! at-most-once fetch guarantees testable.
//!
//! The known-complex-keys list is the one slot [`PropertyCache::reset`]
//! leaves alone: it is additive-only and survives every commit, including a
//! replace-all that clears the underlying values.

use crate::model::{AudioTag, PropertyMap};
use crate::value::VariantMap;
use std::collections::BTreeMap;

/// One memoized fetch result.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Slot<T> {
    #[default]
    Unfetched,
    Present(T),
    Absent,
}

impl<T> Slot<T> {
    pub fn is_unfetched(&self) -> bool {
        matches!(self, Slot::Unfetched)
    }

    pub fn is_fetched(&self) -> bool {
        !self.is_unfetched()
    }

    /// Record a fetch result, absent included.
    pub fn fill(&mut self, value: Option<T>) {
        *self = match value {
            Some(v) => Slot::Present(v),
            None => Slot::Absent,
        };
    }

    /// The cached value, if fetched and present.
    pub fn value(&self) -> Option<&T> {
        match self {
            Slot::Present(v) => Some(v),
            _ => None,
        }
    }
}

/// Memoized storage for everything behind one open interval.
#[derive(Debug, Default)]
pub struct PropertyCache {
    tag: Slot<AudioTag>,
    properties: Slot<PropertyMap>,
    complex_keys: Slot<Vec<String>>,
    complex: BTreeMap<String, Slot<Vec<VariantMap>>>,
}

impl PropertyCache {
    pub fn new() -> PropertyCache {
        PropertyCache::default()
    }

    pub fn tag(&self) -> &Slot<AudioTag> {
        &self.tag
    }

    pub fn fill_tag(&mut self, tag: Option<AudioTag>) {
        self.tag.fill(tag);
    }

    pub fn properties(&self) -> &Slot<PropertyMap> {
        &self.properties
    }

    pub fn fill_properties(&mut self, properties: PropertyMap) {
        self.properties.fill(Some(properties));
    }

    pub fn complex_keys(&self) -> &Slot<Vec<String>> {
        &self.complex_keys
    }

    pub fn fill_complex_keys(&mut self, keys: Vec<String>) {
        self.complex_keys.fill(Some(keys));
    }

    /// Extend the known-keys list without refetching. No-op while the list
    /// has never been established; duplicates are skipped.
    pub fn note_complex_keys<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = String>,
    {
        if let Slot::Present(known) = &mut self.complex_keys {
            for key in keys {
                if !known.contains(&key) {
                    known.push(key);
                }
            }
        }
    }

    /// Whether `key` is in the established known-keys list. `None` while
    /// the list has not been fetched.
    pub fn knows_complex_key(&self, key: &str) -> Option<bool> {
        self.complex_keys
            .value()
            .map(|keys| keys.iter().any(|k| k == key))
    }

    pub fn complex(&self, key: &str) -> &Slot<Vec<VariantMap>> {
        self.complex.get(key).unwrap_or(&Slot::Unfetched)
    }

    pub fn fill_complex(&mut self, key: &str, value: Option<Vec<VariantMap>>) {
        self.complex.entry(key.to_string()).or_default().fill(value);
    }

    /// Keys with a fetched-present complex entry.
    pub fn fetched_complex(&self) -> impl Iterator<Item = (&String, &Vec<VariantMap>)> {
        self.complex
            .iter()
            .filter_map(|(k, slot)| slot.value().map(|v| (k, v)))
    }

    /// Forget everything fetched this interval, except the additive-only
    /// known-complex-keys list. AudioProperties lives outside the cache and
    /// is unaffected by design.
    pub fn reset(&mut self) {
        self.tag = Slot::Unfetched;
        self.properties = Slot::Unfetched;
        self.complex.clear();
    }
}
