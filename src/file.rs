//! # MediaFile Facade
//!
//! [`MediaFile`] is the single entry point callers interact with. It
//! orchestrates key resolution, the lazy cache, the mutation buffer, and
//! the commit protocol against a [`TagEngine`], and owns the
//! open-writable / open-read-only / closed state machine.
//!
//! ## Read path
//!
//! A requested key is classified, then resolved in order: mutation buffer
//! first (uncommitted wins; a staged clear reads as "found, absent"), then
//! the lazy cache, fetching through the engine at most once per source per
//! open interval — and only while open.
//!
//! ## Write path
//!
//! Writes are validated eagerly and staged in the buffer; nothing reaches
//! the engine until [`MediaFile::save`]. The staged set is partitioned into
//! the standard, complex, and tag groups and pushed strictly in that order,
//! then persisted. A failed push or persist leaves the buffer intact, so
//! retrying the save is safe.
//!
//! ## Generic over TagEngine
//!
//! `MediaFile<E: TagEngine>` is generic over the engine: production wraps a
//! native tag library, tests run against
//! [`MemoryEngine`](crate::engine::memory::MemoryEngine).

use crate::buffer::{MutationBuffer, MutationEntry};
use crate::cache::PropertyCache;
use crate::engine::{ReadStyle, TagEngine};
use crate::error::{Error, Result};
use crate::key::{Accessor, AudioField, Key, TagField};
use crate::model::{AudioProperties, AudioTag, ComplexPropertyMap, PropertyMap, TagValue};
use crate::value::{Variant, VariantMap};
use log::{debug, warn};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Writable,
    ReadOnly,
    Closed,
}

/// Which complex properties to prefetch at open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ComplexRetrieval {
    #[default]
    None,
    All,
    Keys(Vec<String>),
}

/// Declarative what-to-retrieve configuration for [`MediaFile::open`].
/// The default retrieves nothing; every source stays lazy.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    pub tag: bool,
    pub properties: bool,
    pub audio: Option<ReadStyle>,
    pub complex: ComplexRetrieval,
}

impl OpenOptions {
    pub fn new() -> OpenOptions {
        OpenOptions::default()
    }

    /// Prefetch the normalized tag.
    pub fn tag(mut self) -> Self {
        self.tag = true;
        self
    }

    /// Prefetch the string property map.
    pub fn properties(mut self) -> Self {
        self.properties = true;
        self
    }

    /// Read audio characteristics at open, with the given effort.
    pub fn audio(mut self, style: ReadStyle) -> Self {
        self.audio = Some(style);
        self
    }

    /// Prefetch complex properties: all of them, or specific keys.
    pub fn complex(mut self, retrieval: ComplexRetrieval) -> Self {
        self.complex = retrieval;
        self
    }

    /// Prefetch every source.
    pub fn everything(self) -> Self {
        self.tag()
            .properties()
            .audio(ReadStyle::default())
            .complex(ComplexRetrieval::All)
    }
}

/// Per-group replace-all switches for [`MediaFile::save_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    pub replace_properties: bool,
    pub replace_complex: bool,
}

/// Flattened read-only view of everything currently readable, staged
/// mutations applied. The serialization surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_properties: Option<AudioProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<AudioTag>,
    #[serde(skip_serializing_if = "PropertyMap::is_empty")]
    pub properties: PropertyMap,
    #[serde(skip_serializing_if = "ComplexPropertyMap::is_empty")]
    pub complex: ComplexPropertyMap,
}

enum Resolved {
    Value(Variant),
    ExplicitAbsent,
    Missing,
}

/// The unified, lazily-populated, mutation-buffering view over one media
/// item's metadata.
pub struct MediaFile<E: TagEngine> {
    engine: E,
    state: State,
    audio: Option<AudioProperties>,
    cache: PropertyCache,
    buffer: MutationBuffer,
}

impl<E: TagEngine> MediaFile<E> {
    /// Open a view over the engine's media item. Fails with
    /// [`Error::CannotOpen`] when the engine has no valid handle. Sources
    /// named in `options` are prefetched; audio characteristics are read
    /// here or never.
    pub fn open(engine: E, options: OpenOptions) -> Result<MediaFile<E>> {
        if !engine.is_valid() {
            return Err(Error::CannotOpen);
        }
        let state = if engine.is_read_only() {
            State::ReadOnly
        } else {
            State::Writable
        };
        let audio = match options.audio {
            Some(style) => engine.read_audio_properties(style)?,
            None => None,
        };
        let mut file = MediaFile {
            engine,
            state,
            audio,
            cache: PropertyCache::new(),
            buffer: MutationBuffer::new(),
        };
        if options.tag {
            file.ensure_tag()?;
        }
        if options.properties {
            file.ensure_properties()?;
        }
        match &options.complex {
            ComplexRetrieval::None => {}
            ComplexRetrieval::All => {
                file.ensure_complex_keys()?;
                let keys = file.cache.complex_keys().value().cloned().unwrap_or_default();
                for key in keys {
                    file.ensure_complex(&key)?;
                }
            }
            ComplexRetrieval::Keys(keys) => {
                for key in keys {
                    file.ensure_complex(key)?;
                }
            }
        }
        Ok(file)
    }

    /// Run `f` against a freshly opened view, closing it on every exit
    /// path. (On unwind, the `Drop` impl releases the handle.)
    pub fn with<T>(
        engine: E,
        options: OpenOptions,
        f: impl FnOnce(&mut MediaFile<E>) -> Result<T>,
    ) -> Result<T> {
        let mut file = MediaFile::open(engine, options)?;
        let result = f(&mut file);
        file.close();
        result
    }

    pub fn is_writable(&self) -> bool {
        self.state == State::Writable
    }

    pub fn is_read_only(&self) -> bool {
        self.state == State::ReadOnly
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    pub fn has_staged_changes(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Close the view and release the engine handle. Idempotent: repeat
    /// closes are a no-op. Unsaved staged mutations are warned about and
    /// will never reach storage, but stay readable through this instance.
    pub fn close(&mut self) {
        if self.state == State::Closed {
            return;
        }
        if !self.buffer.is_empty() {
            warn!(
                "closing media with {} unsaved staged mutation(s); they will not be persisted",
                self.buffer.len()
            );
        }
        self.engine.release();
        self.state = State::Closed;
    }

    // --- Reads ---

    /// Resolve a key, collapsing multi-valued properties to their first
    /// value. A key found nowhere fails with [`Error::KeyNotFound`]; a
    /// staged clear is found-but-absent and yields `Ok(None)`.
    pub fn fetch(&mut self, key: &Key) -> Result<Option<Variant>> {
        match self.resolve(key, false)? {
            Resolved::Value(v) => Ok(Some(v)),
            Resolved::ExplicitAbsent => Ok(None),
            Resolved::Missing => Err(Error::KeyNotFound(key.name().to_string())),
        }
    }

    /// Like [`MediaFile::fetch`], but multi-valued properties keep the
    /// full list form.
    pub fn fetch_all(&mut self, key: &Key) -> Result<Option<Variant>> {
        match self.resolve(key, true)? {
            Resolved::Value(v) => Ok(Some(v)),
            Resolved::ExplicitAbsent => Ok(None),
            Resolved::Missing => Err(Error::KeyNotFound(key.name().to_string())),
        }
    }

    /// [`MediaFile::fetch`] with a default for the not-found case.
    pub fn fetch_or(&mut self, key: &Key, default: impl Into<Variant>) -> Result<Option<Variant>> {
        match self.resolve(key, false)? {
            Resolved::Value(v) => Ok(Some(v)),
            Resolved::ExplicitAbsent => Ok(None),
            Resolved::Missing => Ok(Some(default.into())),
        }
    }

    /// [`MediaFile::fetch`] with a not-found handler.
    pub fn fetch_or_else(
        &mut self,
        key: &Key,
        handler: impl FnOnce(&Key) -> Option<Variant>,
    ) -> Result<Option<Variant>> {
        match self.resolve(key, false)? {
            Resolved::Value(v) => Ok(Some(v)),
            Resolved::ExplicitAbsent => Ok(None),
            Resolved::Missing => Ok(handler(key)),
        }
    }

    /// Non-failing read: not-found collapses into `Ok(None)`.
    pub fn get(&mut self, key: &Key) -> Result<Option<Variant>> {
        match self.resolve(key, false)? {
            Resolved::Value(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    /// Non-failing list-form read.
    pub fn get_all(&mut self, key: &Key) -> Result<Option<Variant>> {
        match self.resolve(key, true)? {
            Resolved::Value(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    /// Attribute-style read (`title`, `all_musicbrainz__album_id`). Setter
    /// accessors fail with [`Error::InvalidKey`].
    pub fn read_dynamic(&mut self, accessor: &str) -> Result<Option<Variant>> {
        let accessor = Accessor::parse(accessor)?;
        if accessor.assign {
            return Err(Error::InvalidKey("setter accessor used for a read".to_string()));
        }
        if accessor.all {
            self.get_all(&accessor.key)
        } else {
            self.get(&accessor.key)
        }
    }

    /// Attribute-style write (`isrc=`). Requires a setter accessor; the
    /// `all_` prefix carries no meaning here.
    pub fn write_dynamic(&mut self, accessor: &str, value: Option<Variant>) -> Result<()> {
        let accessor = Accessor::parse(accessor)?;
        if !accessor.assign {
            return Err(Error::InvalidKey("reader accessor used for a write".to_string()));
        }
        self.set(accessor.key, value)
    }

    // --- Typed tag accessors ---

    pub fn title(&mut self) -> Result<Option<String>> {
        self.tag_text(TagField::Title)
    }

    pub fn artist(&mut self) -> Result<Option<String>> {
        self.tag_text(TagField::Artist)
    }

    pub fn album(&mut self) -> Result<Option<String>> {
        self.tag_text(TagField::Album)
    }

    pub fn genre(&mut self) -> Result<Option<String>> {
        self.tag_text(TagField::Genre)
    }

    pub fn comment(&mut self) -> Result<Option<String>> {
        self.tag_text(TagField::Comment)
    }

    pub fn year(&mut self) -> Result<Option<u32>> {
        self.tag_number(TagField::Year)
    }

    pub fn track(&mut self) -> Result<Option<u32>> {
        self.tag_number(TagField::Track)
    }

    pub fn set_title(&mut self, value: Option<&str>) -> Result<()> {
        self.set(TagField::Title, value.map(Variant::from))
    }

    pub fn set_artist(&mut self, value: Option<&str>) -> Result<()> {
        self.set(TagField::Artist, value.map(Variant::from))
    }

    pub fn set_album(&mut self, value: Option<&str>) -> Result<()> {
        self.set(TagField::Album, value.map(Variant::from))
    }

    pub fn set_genre(&mut self, value: Option<&str>) -> Result<()> {
        self.set(TagField::Genre, value.map(Variant::from))
    }

    pub fn set_comment(&mut self, value: Option<&str>) -> Result<()> {
        self.set(TagField::Comment, value.map(Variant::from))
    }

    pub fn set_year(&mut self, value: Option<u32>) -> Result<()> {
        self.set(TagField::Year, value.map(Variant::from))
    }

    pub fn set_track(&mut self, value: Option<u32>) -> Result<()> {
        self.set(TagField::Track, value.map(Variant::from))
    }

    // --- Source-level views (engine-side state; staged mutations are not
    //     applied here — use fetch/get/snapshot for the unified view) ---

    pub fn audio_properties(&self) -> Option<&AudioProperties> {
        self.audio.as_ref()
    }

    pub fn tag(&mut self) -> Result<Option<&AudioTag>> {
        self.ensure_tag()?;
        Ok(self.cache.tag().value())
    }

    pub fn properties(&mut self) -> Result<Option<&PropertyMap>> {
        self.ensure_properties()?;
        Ok(self.cache.properties().value())
    }

    /// The known complex property keys plus any staged complex writes.
    /// Fetched at most once, additive-only: keys committed later extend the
    /// list, and nothing ever prunes it — not even a replace-all save that
    /// cleared every value.
    pub fn complex_property_keys(&mut self) -> Result<Vec<String>> {
        self.ensure_complex_keys()?;
        let mut keys = self.cache.complex_keys().value().cloned().unwrap_or_default();
        for staged in self.buffer.staged_complex_keys() {
            if !keys.iter().any(|k| k == staged) {
                keys.push(staged.to_string());
            }
        }
        Ok(keys)
    }

    pub fn complex_property(&mut self, key: &str) -> Result<Option<Vec<VariantMap>>> {
        self.ensure_complex(key)?;
        Ok(self.cache.complex(key).value().cloned())
    }

    /// Flattened view of everything readable right now, staged mutations
    /// applied. While open this pulls every source (and every known
    /// complex entry); after close it reflects only what was already
    /// cached.
    pub fn snapshot(&mut self) -> Result<MediaSnapshot> {
        self.ensure_tag()?;
        self.ensure_properties()?;
        self.ensure_complex_keys()?;
        let known = self.cache.complex_keys().value().cloned().unwrap_or_default();
        for key in known {
            self.ensure_complex(&key)?;
        }

        let mut tag = self.cache.tag().value().cloned();
        let mut properties = self.cache.properties().value().cloned().unwrap_or_default();
        let mut complex: ComplexPropertyMap = self
            .cache
            .fetched_complex()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let staged = self.buffer.partition();
        if !staged.tag.is_empty() {
            let mut merged = tag.take().unwrap_or_default();
            for (field, value) in &staged.tag {
                merged.set(*field, value.clone());
            }
            tag = Some(merged);
        }
        for (key, values) in &staged.standard {
            if values.is_empty() {
                properties.remove(key);
            } else {
                properties.insert(key.clone(), values.clone());
            }
        }
        for (key, entries) in &staged.complex {
            if entries.is_empty() {
                complex.remove(key);
            } else {
                complex.insert(key.clone(), entries.clone());
            }
        }

        Ok(MediaSnapshot {
            audio_properties: self.audio,
            tag: tag.filter(|t| !t.is_empty()),
            properties,
            complex,
        })
    }

    // --- Writes ---

    /// Validate and stage one write; `None` stages an explicit deletion.
    /// Nothing reaches the engine until [`MediaFile::save`].
    pub fn set(&mut self, key: impl Into<Key>, value: Option<Variant>) -> Result<()> {
        if self.state != State::Writable {
            return Err(Error::NotWritable);
        }
        self.buffer.stage(key.into(), value)
    }

    /// Stage an explicit deletion.
    pub fn delete(&mut self, key: impl Into<Key>) -> Result<()> {
        self.set(key, None)
    }

    /// Drop all staged mutations without committing.
    pub fn discard(&mut self) {
        self.buffer.clear();
    }

    /// Push staged mutations to the engine — standard properties, then
    /// complex properties, then tag fields — and persist. On success the
    /// cache and buffer reset (audio characteristics and the known
    /// complex-keys list are kept). On failure the buffer stays intact and
    /// a retry is safe.
    pub fn save(&mut self) -> Result<()> {
        self.save_with(SaveOptions::default())
    }

    pub fn save_with(&mut self, options: SaveOptions) -> Result<()> {
        if self.state != State::Writable {
            return Err(Error::NotWritable);
        }
        let staged = self.buffer.partition();
        debug!(
            "saving: {} standard, {} complex, {} tag field(s) staged",
            staged.standard.len(),
            staged.complex.len(),
            staged.tag.len()
        );
        if !staged.standard.is_empty() || options.replace_properties {
            self.engine
                .merge_properties(&staged.standard, options.replace_properties)?;
        }
        if !staged.complex.is_empty() || options.replace_complex {
            self.engine
                .merge_complex(&staged.complex, options.replace_complex)?;
        }
        if !staged.tag.is_empty() {
            self.engine.merge_tag(&staged.tag)?;
        }
        self.engine.commit_to_storage()?;

        let committed_keys: Vec<String> = staged
            .complex
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(key, _)| key.clone())
            .collect();
        self.cache.note_complex_keys(committed_keys);
        self.cache.reset();
        self.buffer.clear();
        Ok(())
    }

    /// Wipe the media item: stages a clear for every tag field and saves
    /// with replace-all on the standard and complex groups.
    pub fn clear_all(&mut self) -> Result<()> {
        if self.state != State::Writable {
            return Err(Error::NotWritable);
        }
        for field in TagField::ALL {
            self.buffer.stage(Key::Tag(field), None)?;
        }
        self.save_with(SaveOptions {
            replace_properties: true,
            replace_complex: true,
        })
    }

    // --- Resolution internals ---

    fn is_open(&self) -> bool {
        self.state != State::Closed
    }

    fn resolve(&mut self, key: &Key, all: bool) -> Result<Resolved> {
        if let Some(entry) = self.buffer.get(key) {
            return Ok(match staged_variant(entry, all) {
                Some(value) => Resolved::Value(value),
                None => Resolved::ExplicitAbsent,
            });
        }
        match key {
            Key::Audio(field) => Ok(match self.audio {
                Some(props) => Resolved::Value(audio_variant(&props, *field)),
                None => Resolved::Missing,
            }),
            Key::Tag(field) => {
                self.ensure_tag()?;
                Ok(self
                    .cache
                    .tag()
                    .value()
                    .and_then(|tag| tag.get(*field))
                    .map(|scalar| Resolved::Value(scalar_variant(scalar)))
                    .unwrap_or(Resolved::Missing))
            }
            Key::Property(name) => {
                self.ensure_properties()?;
                if let Some(value) = self
                    .cache
                    .properties()
                    .value()
                    .and_then(|map| map.get(name))
                    .and_then(|values| strings_variant(values, all))
                {
                    return Ok(Resolved::Value(value));
                }
                self.ensure_complex_keys()?;
                self.ensure_complex(name)?;
                Ok(self
                    .cache
                    .complex(name)
                    .value()
                    .and_then(|entries| complex_variant(entries, all))
                    .map(Resolved::Value)
                    .unwrap_or(Resolved::Missing))
            }
        }
    }

    fn tag_text(&mut self, field: TagField) -> Result<Option<String>> {
        Ok(self
            .get(&Key::Tag(field))?
            .and_then(|v| v.as_text().map(str::to_string)))
    }

    fn tag_number(&mut self, field: TagField) -> Result<Option<u32>> {
        Ok(self
            .get(&Key::Tag(field))?
            .and_then(|v| v.as_int())
            .and_then(|n| u32::try_from(n).ok()))
    }

    fn ensure_tag(&mut self) -> Result<()> {
        if self.cache.tag().is_unfetched() && self.is_open() {
            debug!("fetching tag from engine");
            let tag = self.engine.read_tag()?.map(AudioTag::normalized);
            self.cache.fill_tag(tag);
        }
        Ok(())
    }

    fn ensure_properties(&mut self) -> Result<()> {
        if self.cache.properties().is_unfetched() && self.is_open() {
            debug!("fetching property map from engine");
            let properties = self.engine.read_properties()?;
            self.cache.fill_properties(properties);
        }
        Ok(())
    }

    fn ensure_complex_keys(&mut self) -> Result<()> {
        if self.cache.complex_keys().is_unfetched() && self.is_open() {
            debug!("fetching complex property keys from engine");
            let keys = self.engine.read_complex_keys()?;
            self.cache.fill_complex_keys(keys);
        }
        Ok(())
    }

    fn ensure_complex(&mut self, key: &str) -> Result<()> {
        if self.cache.complex(key).is_unfetched() && self.is_open() {
            // Established known-keys list rules out the key: record the
            // absence without an engine round trip.
            if self.cache.knows_complex_key(key) == Some(false) {
                self.cache.fill_complex(key, None);
                return Ok(());
            }
            debug!("fetching complex property {key:?} from engine");
            let entries = self.engine.read_complex(key)?;
            let value = if entries.is_empty() { None } else { Some(entries) };
            self.cache.fill_complex(key, value);
        }
        Ok(())
    }
}

impl<E: TagEngine> Drop for MediaFile<E> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<E: TagEngine> fmt::Display for MediaFile<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Writable => "writable",
            State::ReadOnly => "read-only",
            State::Closed => "closed",
        };
        if self.buffer.is_empty() {
            write!(f, "MediaFile [{state}]")
        } else {
            write!(f, "MediaFile [{state}, {} staged]", self.buffer.len())
        }
    }
}

impl<E: TagEngine> fmt::Debug for MediaFile<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaFile")
            .field("state", &self.state)
            .field("audio", &self.audio)
            .field("staged", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

fn staged_variant(entry: &MutationEntry, all: bool) -> Option<Variant> {
    match entry {
        MutationEntry::Clear => None,
        MutationEntry::Tag(scalar) => Some(scalar_variant(scalar.clone())),
        MutationEntry::Strings(values) => strings_variant(values, all),
        MutationEntry::Complex(entries) => complex_variant(entries, all),
    }
}

fn scalar_variant(scalar: TagValue) -> Variant {
    match scalar {
        TagValue::Text(s) => Variant::Text(s),
        TagValue::Number(n) => Variant::Int(i64::from(n)),
    }
}

fn audio_variant(props: &AudioProperties, field: AudioField) -> Variant {
    let value = match field {
        AudioField::Length => props.length_ms,
        AudioField::Bitrate => props.bitrate_kbps,
        AudioField::SampleRate => props.sample_rate_hz,
        AudioField::Channels => props.channels,
    };
    Variant::Int(i64::from(value))
}

fn strings_variant(values: &[String], all: bool) -> Option<Variant> {
    if all {
        Some(Variant::strings(values.iter().cloned()))
    } else {
        values.first().map(|first| Variant::Text(first.clone()))
    }
}

fn complex_variant(entries: &[VariantMap], all: bool) -> Option<Variant> {
    if all {
        Some(Variant::List(
            entries.iter().cloned().map(Variant::Map).collect(),
        ))
    } else {
        entries.first().map(|first| Variant::Map(first.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::MemoryEngine;

    fn open(engine: MemoryEngine) -> MediaFile<MemoryEngine> {
        MediaFile::open(engine, OpenOptions::new()).unwrap()
    }

    #[test]
    fn open_fails_on_invalid_engine() {
        let err = MediaFile::open(MemoryEngine::invalid(), OpenOptions::new()).unwrap_err();
        assert!(matches!(err, Error::CannotOpen));
    }

    #[test]
    fn open_state_follows_engine_writability() {
        let file = open(MemoryEngine::new());
        assert!(file.is_writable());

        let file = open(MemoryEngine::new().read_only());
        assert!(file.is_read_only());
        assert!(!file.is_closed());
    }

    #[test]
    fn audio_properties_read_only_when_requested() {
        let props = AudioProperties {
            length_ms: 180_000,
            bitrate_kbps: 320,
            sample_rate_hz: 44_100,
            channels: 2,
        };
        let engine = MemoryEngine::new().with_audio(props);

        let file = open(engine.clone());
        assert_eq!(file.audio_properties(), None);
        assert_eq!(engine.call_count("read_audio_properties"), 0);

        let file =
            MediaFile::open(engine.clone(), OpenOptions::new().audio(ReadStyle::Fast)).unwrap();
        assert_eq!(file.audio_properties(), Some(&props));
        assert_eq!(engine.call_count("read_audio_properties"), 1);
    }

    #[test]
    fn audio_fields_resolve_through_keys() {
        let engine = MemoryEngine::new().with_audio(AudioProperties {
            length_ms: 1000,
            bitrate_kbps: 128,
            sample_rate_hz: 48_000,
            channels: 2,
        });
        let mut file =
            MediaFile::open(engine, OpenOptions::new().audio(ReadStyle::default())).unwrap();
        assert_eq!(
            file.fetch(&Key::Audio(AudioField::SampleRate)).unwrap(),
            Some(Variant::Int(48_000))
        );
    }

    #[test]
    fn set_fails_on_read_only_store() {
        let mut file = open(MemoryEngine::new().read_only());
        let err = file.set_title(Some("Sky")).unwrap_err();
        assert!(matches!(err, Error::NotWritable));
        assert!(!file.has_staged_changes());
    }

    #[test]
    fn set_fails_after_close() {
        let mut file = open(MemoryEngine::new());
        file.close();
        assert!(matches!(file.set_title(Some("Sky")), Err(Error::NotWritable)));
    }

    #[test]
    fn staged_write_shadows_cache() {
        let engine = MemoryEngine::new().with_tag(AudioTag {
            track: Some(1),
            ..AudioTag::default()
        });
        let mut file = open(engine);
        file.set_track(Some(3)).unwrap();
        assert_eq!(file.track().unwrap(), Some(3));
    }

    #[test]
    fn staged_clear_reads_as_found_absent() {
        let engine = MemoryEngine::new().with_tag(AudioTag {
            title: Some("Sky".into()),
            ..AudioTag::default()
        });
        let mut file = open(engine);
        file.set_title(None).unwrap();
        assert_eq!(file.fetch(&Key::Tag(TagField::Title)).unwrap(), None);
    }

    #[test]
    fn fetch_without_default_fails_on_miss() {
        let mut file = open(MemoryEngine::new());
        let err = file.fetch(&Key::property("TITLE")).unwrap_err();
        assert!(matches!(err, Error::KeyNotFound(name) if name == "TITLE"));
    }

    #[test]
    fn fetch_or_returns_default_on_miss() {
        let mut file = open(MemoryEngine::new());
        assert_eq!(
            file.fetch_or(&Key::property("TITLE"), "fallback").unwrap(),
            Some(Variant::Text("fallback".into()))
        );
    }

    #[test]
    fn fetch_or_else_receives_the_key() {
        let mut file = open(MemoryEngine::new());
        let value = file
            .fetch_or_else(&Key::property("TITLE"), |key| {
                Some(Variant::Text(key.name().to_lowercase()))
            })
            .unwrap();
        assert_eq!(value, Some(Variant::Text("title".into())));
    }

    #[test]
    fn fetch_collapses_to_first_value_fetch_all_keeps_list() {
        let engine = MemoryEngine::new().with_property("ARTISTS", &["Ana", "Ben"]);
        let mut file = open(engine);
        let key = Key::property("ARTISTS");
        assert_eq!(
            file.fetch(&key).unwrap(),
            Some(Variant::Text("Ana".into()))
        );
        assert_eq!(
            file.fetch_all(&key).unwrap(),
            Some(Variant::strings(["Ana", "Ben"]))
        );
    }

    #[test]
    fn dynamic_accessors_read_mangled_properties() {
        let engine = MemoryEngine::new().with_property("MUSICBRAINZ_ALBUMID", &["abc"]);
        let mut file = open(engine);
        assert_eq!(
            file.read_dynamic("musicbrainz__album_id").unwrap(),
            Some(Variant::Text("abc".into()))
        );
        assert_eq!(
            file.read_dynamic("all_musicbrainz__album_id").unwrap(),
            Some(Variant::strings(["abc"]))
        );
        assert!(matches!(
            file.read_dynamic("musicbrainz__album_id="),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn dynamic_writes_require_setter_accessors() {
        let mut file = open(MemoryEngine::new());
        file.write_dynamic("isrc=", Some(Variant::from("US-ABC-01")))
            .unwrap();
        assert_eq!(
            file.fetch(&Key::property("ISRC")).unwrap(),
            Some(Variant::Text("US-ABC-01".into()))
        );
        assert!(matches!(
            file.write_dynamic("isrc", Some(Variant::from("x"))),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn save_on_read_only_store_fails_even_with_empty_buffer() {
        let mut file = open(MemoryEngine::new().read_only());
        assert!(matches!(file.save(), Err(Error::NotWritable)));
    }

    #[test]
    fn save_after_close_fails() {
        let mut file = open(MemoryEngine::new());
        file.close();
        assert!(matches!(file.save(), Err(Error::NotWritable)));
    }

    #[test]
    fn close_is_idempotent() {
        let engine = MemoryEngine::new();
        let mut file = open(engine.clone());
        file.close();
        file.close();
        file.close();
        assert!(file.is_closed());
        assert_eq!(engine.release_count(), 1);
    }

    #[test]
    fn drop_releases_the_handle_once() {
        let engine = MemoryEngine::new();
        {
            let _file = open(engine.clone());
        }
        assert_eq!(engine.release_count(), 1);

        let mut file = open(engine.clone());
        file.close();
        drop(file);
        assert_eq!(engine.release_count(), 2);
    }

    #[test]
    fn with_closes_on_success_and_on_error() {
        let engine = MemoryEngine::new();
        let title = MediaFile::with(engine.clone(), OpenOptions::new(), |file| {
            file.set_title(Some("Sky"))?;
            file.save()?;
            file.title()
        })
        .unwrap();
        assert_eq!(title.as_deref(), Some("Sky"));
        assert_eq!(engine.release_count(), 1);

        let result: Result<()> = MediaFile::with(engine.clone(), OpenOptions::new(), |file| {
            file.fetch(&Key::property("MISSING")).map(|_| ())
        });
        assert!(matches!(result, Err(Error::KeyNotFound(_))));
        assert_eq!(engine.release_count(), 2);
    }

    #[test]
    fn display_reflects_state_and_staged_count() {
        let mut file = open(MemoryEngine::new());
        assert_eq!(file.to_string(), "MediaFile [writable]");
        file.set_title(Some("Sky")).unwrap();
        assert_eq!(file.to_string(), "MediaFile [writable, 1 staged]");
        file.close();
        assert_eq!(file.to_string(), "MediaFile [closed, 1 staged]");
    }
}
