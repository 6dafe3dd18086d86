//! # mediafile Architecture
//!
//! mediafile presents a single, uniform, lazily-populated, mutation-buffering
//! view over the four metadata sources of a media item: immutable audio
//! characteristics, the seven normalized tag fields, free-form string
//! properties, and structured ("complex") properties such as embedded
//! pictures.
//!
//! Reading any one source is the engine's job; this crate's job is
//! reconciling four key spaces and value shapes into one consistent
//! read/write surface with correct laziness, correct caching, and an
//! ordered commit protocol.
//!
//! ## The Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Facade (file.rs)                                           │
//! │  - MediaFile: the object callers interact with              │
//! │  - Open/read-only/closed state machine, commit ordering     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Core (key.rs, cache.rs, buffer.rs, model.rs, value.rs)     │
//! │  - Key classification and accessor mangling                 │
//! │  - Three-state lazy cache, staged mutation buffer           │
//! │  - Pure types, no engine knowledge                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Engine (engine/)                                           │
//! │  - Abstract TagEngine trait                                 │
//! │  - MemoryEngine (tests); native adapters live elsewhere     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Principles
//!
//! - **Buffer shadows cache**: uncommitted writes win on every read; a
//!   staged deletion reads as "found, absent".
//! - **At most one fetch** per source per open interval, absent results
//!   included; nothing is fetched after close.
//! - **Validate at stage time**: a type error can never surface after
//!   other valid changes were pushed to the engine.
//! - **Commit order is fixed**: standard properties, complex properties,
//!   tag fields, persist. A failed push leaves the staged set intact.
//!
//! ## Module Overview
//!
//! - [`file`]: the [`MediaFile`] facade
//! - [`key`]: key classification and dynamic-accessor mangling
//! - [`cache`]: the lazy three-state property cache
//! - [`buffer`]: the staged mutation buffer
//! - [`model`]: core data types
//! - [`value`]: the [`Variant`] union for structured values
//! - [`engine`]: the [`TagEngine`] contract and the in-memory engine
//! - [`error`]: error types

pub mod buffer;
pub mod cache;
pub mod engine;
pub mod error;
pub mod file;
pub mod key;
pub mod model;
pub mod value;

pub use engine::memory::MemoryEngine;
pub use engine::{ReadStyle, TagEngine};
pub use error::{Error, Result};
pub use file::{ComplexRetrieval, MediaFile, MediaSnapshot, OpenOptions, SaveOptions};
pub use key::{Accessor, AudioField, Key, TagField};
pub use model::{AudioProperties, AudioTag, ComplexPropertyMap, PropertyMap, TagPatch, TagValue};
pub use value::{Variant, VariantMap};
