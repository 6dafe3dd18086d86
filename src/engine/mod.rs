//! # Engine Layer
//!
//! The [`TagEngine`] trait is the contract the facade consumes from the
//! native tag-reading engine. It handles the "how" of container access
//! (parsing, merging, persisting), while the facade handles the "what"
//! (key resolution, caching, mutation buffering, commit ordering).
//!
//! Methods take `&self`: the crate is single-threaded by design, so
//! implementations use interior mutability (`RefCell`) instead of locks.
//!
//! ## Implementations
//!
//! - [`memory::MemoryEngine`]: in-memory engine for tests and fixtures.
//!   Records every call it receives, which is how the commit-ordering and
//!   at-most-once-fetch guarantees are asserted.
//!
//! A production engine wraps a native tag library behind this same trait;
//! that adapter lives outside this crate.

use crate::error::Result;
use crate::model::{AudioProperties, AudioTag, ComplexPropertyMap, PropertyMap, TagPatch};
use crate::value::VariantMap;
use serde::{Deserialize, Serialize};

pub mod memory;

/// How much work the engine may spend computing audio properties at open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStyle {
    Fast,
    #[default]
    Average,
    Accurate,
}

/// Primitive get/set operations over the four metadata sources.
pub trait TagEngine {
    /// True iff the handle is usable. Everything else is valid to call only
    /// while this holds.
    fn is_valid(&self) -> bool;

    /// Whether the underlying media is writable. Meaningful only when
    /// `is_valid()`.
    fn is_read_only(&self) -> bool;

    /// One-shot audio characteristics read. Requested at open time only;
    /// `None` when the engine cannot compute them.
    fn read_audio_properties(&self, style: ReadStyle) -> Result<Option<AudioProperties>>;

    /// The normalized tag, `None` when the container has no tag support.
    /// Implementations uphold the absent-not-empty field invariant.
    fn read_tag(&self) -> Result<Option<AudioTag>>;

    /// The free-form property map. Empty lists never appear.
    fn read_properties(&self) -> Result<PropertyMap>;

    /// Keys with structured values. May be empty when the engine lacks
    /// complex-property support.
    fn read_complex_keys(&self) -> Result<Vec<String>>;

    /// Structured values for one key; empty when the key is absent.
    fn read_complex(&self, key: &str) -> Result<Vec<VariantMap>>;

    /// Overwrite only the supplied tag fields; `None` clears a field.
    fn merge_tag(&self, patch: &TagPatch) -> Result<()>;

    /// Merge string properties. `replace_all` clears the map before
    /// merging; keys merged with an empty list are pruned.
    fn merge_properties(&self, properties: &PropertyMap, replace_all: bool) -> Result<()>;

    /// Merge structured properties. `replace_all` clears every known
    /// complex key's values before merging; an empty list clears a key.
    fn merge_complex(&self, properties: &ComplexPropertyMap, replace_all: bool) -> Result<()>;

    /// Persist all merges to storage.
    fn commit_to_storage(&self) -> Result<()>;

    /// Release the handle. Idempotent.
    fn release(&self);
}
