use crate::key::AudioField;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The engine could not establish a valid handle. Fatal, no retry.
    #[error("cannot open media: engine has no valid handle")]
    CannotOpen,

    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// Shape validation failed while staging; the value was never staged.
    #[error("invalid value type: {0}")]
    InvalidValueType(String),

    #[error("audio property '{0}' is read-only")]
    ReadOnlyField(AudioField),

    #[error("media is not writable")]
    NotWritable,

    #[error("key not found: {0:?}")]
    KeyNotFound(String),

    /// The engine failed to persist. Staged mutations are left intact, so
    /// retrying the save is safe.
    #[error("save failed: {0}")]
    SaveError(String),

    #[error("engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, Error>;
