//! In-memory engine for tests and fixtures.
//!
//! Uses `RefCell` for interior mutability since the crate is
//! single-threaded; clones share one underlying store (`Rc`), which models
//! several handles opened onto the same media over time. The engine records
//! every call it receives so tests can assert push ordering and fetch
//! counts, and it can simulate a persist failure.

use super::{ReadStyle, TagEngine};
use crate::error::{Error, Result};
use crate::model::{
    prune_empty, AudioProperties, AudioTag, ComplexPropertyMap, PropertyMap, TagPatch,
};
use crate::value::VariantMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Debug, Default)]
struct Store {
    valid: Cell<bool>,
    read_only: Cell<bool>,
    audio: RefCell<Option<AudioProperties>>,
    tag: RefCell<AudioTag>,
    properties: RefCell<PropertyMap>,
    complex: RefCell<ComplexPropertyMap>,
    simulate_save_error: Cell<bool>,
    release_count: Cell<u32>,
    save_count: Cell<u32>,
    calls: RefCell<Vec<String>>,
}

/// An engine over plain in-memory state.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    store: Rc<Store>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        MemoryEngine::new()
    }
}

impl MemoryEngine {
    /// A valid, writable, empty engine.
    pub fn new() -> MemoryEngine {
        let store = Store::default();
        store.valid.set(true);
        MemoryEngine { store: Rc::new(store) }
    }

    /// An engine whose handle never becomes usable.
    pub fn invalid() -> MemoryEngine {
        let engine = MemoryEngine::new();
        engine.store.valid.set(false);
        engine
    }

    pub fn read_only(self) -> MemoryEngine {
        self.store.read_only.set(true);
        self
    }

    pub fn with_audio(self, audio: AudioProperties) -> MemoryEngine {
        *self.store.audio.borrow_mut() = Some(audio);
        self
    }

    pub fn with_tag(self, tag: AudioTag) -> MemoryEngine {
        *self.store.tag.borrow_mut() = tag.normalized();
        self
    }

    pub fn with_property<S: Into<String>>(self, key: S, values: &[&str]) -> MemoryEngine {
        self.store
            .properties
            .borrow_mut()
            .insert(key.into(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn with_complex<S: Into<String>>(self, key: S, entries: Vec<VariantMap>) -> MemoryEngine {
        self.store.complex.borrow_mut().insert(key.into(), entries);
        self
    }

    /// Make the next `commit_to_storage` fail, until switched off again.
    pub fn set_simulate_save_error(&self, simulate: bool) {
        self.store.simulate_save_error.set(simulate);
    }

    /// Every engine call received so far, in order. Read calls carry their
    /// key (`"read_complex:PICTURE"`).
    pub fn calls(&self) -> Vec<String> {
        self.store.calls.borrow().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.store
            .calls
            .borrow()
            .iter()
            .filter(|c| c.as_str() == name)
            .count()
    }

    pub fn release_count(&self) -> u32 {
        self.store.release_count.get()
    }

    pub fn save_count(&self) -> u32 {
        self.store.save_count.get()
    }

    /// Direct view of the stored tag, bypassing the call log.
    pub fn stored_tag(&self) -> AudioTag {
        self.store.tag.borrow().clone()
    }

    pub fn stored_properties(&self) -> PropertyMap {
        self.store.properties.borrow().clone()
    }

    pub fn stored_complex(&self) -> ComplexPropertyMap {
        self.store.complex.borrow().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.store.calls.borrow_mut().push(call.into());
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.store.valid.get() {
            Ok(())
        } else {
            Err(Error::Engine("handle is closed or invalid".to_string()))
        }
    }
}

impl TagEngine for MemoryEngine {
    fn is_valid(&self) -> bool {
        self.store.valid.get()
    }

    fn is_read_only(&self) -> bool {
        self.store.read_only.get()
    }

    fn read_audio_properties(&self, _style: ReadStyle) -> Result<Option<AudioProperties>> {
        self.ensure_valid()?;
        self.record("read_audio_properties");
        Ok(*self.store.audio.borrow())
    }

    fn read_tag(&self) -> Result<Option<AudioTag>> {
        self.ensure_valid()?;
        self.record("read_tag");
        Ok(Some(self.store.tag.borrow().clone()))
    }

    fn read_properties(&self) -> Result<PropertyMap> {
        self.ensure_valid()?;
        self.record("read_properties");
        Ok(self.store.properties.borrow().clone())
    }

    fn read_complex_keys(&self) -> Result<Vec<String>> {
        self.ensure_valid()?;
        self.record("read_complex_keys");
        Ok(self.store.complex.borrow().keys().cloned().collect())
    }

    fn read_complex(&self, key: &str) -> Result<Vec<VariantMap>> {
        self.ensure_valid()?;
        self.record(format!("read_complex:{key}"));
        Ok(self
            .store
            .complex
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    fn merge_tag(&self, patch: &TagPatch) -> Result<()> {
        self.ensure_valid()?;
        self.record("merge_tag");
        let mut tag = self.store.tag.borrow_mut();
        for (field, value) in patch {
            tag.set(*field, value.clone());
        }
        Ok(())
    }

    fn merge_properties(&self, properties: &PropertyMap, replace_all: bool) -> Result<()> {
        self.ensure_valid()?;
        self.record("merge_properties");
        let mut stored = self.store.properties.borrow_mut();
        if replace_all {
            stored.clear();
        }
        for (key, values) in properties {
            stored.insert(key.clone(), values.clone());
        }
        prune_empty(&mut stored);
        Ok(())
    }

    fn merge_complex(&self, properties: &ComplexPropertyMap, replace_all: bool) -> Result<()> {
        self.ensure_valid()?;
        self.record("merge_complex");
        let mut stored = self.store.complex.borrow_mut();
        if replace_all {
            stored.clear();
        }
        for (key, entries) in properties {
            if entries.is_empty() {
                stored.remove(key);
            } else {
                stored.insert(key.clone(), entries.clone());
            }
        }
        Ok(())
    }

    fn commit_to_storage(&self) -> Result<()> {
        self.ensure_valid()?;
        self.record("commit_to_storage");
        if self.store.simulate_save_error.get() {
            return Err(Error::SaveError("simulated save error".to_string()));
        }
        self.store.save_count.set(self.store.save_count.get() + 1);
        Ok(())
    }

    fn release(&self) {
        self.record("release");
        self.store.release_count.set(self.store.release_count.get() + 1);
    }
}
