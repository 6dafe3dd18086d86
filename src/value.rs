//! Variant values for structured ("complex") properties.
//!
//! A [`Variant`] is the runtime representation of any property value the
//! engine can hold: strings, integers, booleans, ordered lists, and nested
//! string-keyed maps. It replaces the duck typing of a dynamic host language
//! with a closed tagged union, so every reachable leaf is valid by
//! construction.
//!
//! Shape validation against a key class still matters: a standard property
//! only accepts strings, a complex property only accepts lists of maps. The
//! `expect_*` helpers perform those checks before anything is staged.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A string-keyed map of variants, e.g. one embedded picture.
pub type VariantMap = BTreeMap<String, Variant>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Variant {
    Text(String),
    Int(i64),
    Bool(bool),
    List(Vec<Variant>),
    Map(VariantMap),
}

impl Variant {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Variant::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Variant::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Variant]> {
        match self {
            Variant::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&VariantMap> {
        match self {
            Variant::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Build a list variant from plain strings.
    pub fn strings<I, S>(values: I) -> Variant
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Variant::List(values.into_iter().map(|s| Variant::Text(s.into())).collect())
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Variant {
        Variant::Text(s)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Variant {
        Variant::Text(s.to_string())
    }
}

impl From<i64> for Variant {
    fn from(n: i64) -> Variant {
        Variant::Int(n)
    }
}

impl From<u32> for Variant {
    fn from(n: u32) -> Variant {
        Variant::Int(i64::from(n))
    }
}

impl From<bool> for Variant {
    fn from(b: bool) -> Variant {
        Variant::Bool(b)
    }
}

impl From<Vec<Variant>> for Variant {
    fn from(v: Vec<Variant>) -> Variant {
        Variant::List(v)
    }
}

impl From<VariantMap> for Variant {
    fn from(m: VariantMap) -> Variant {
        Variant::Map(m)
    }
}

/// Coerce a variant into the list-of-strings shape a standard property
/// requires. A bare string becomes a one-element list; a list must contain
/// strings only.
pub fn expect_string_list(value: &Variant) -> Result<Vec<String>> {
    match value {
        Variant::Text(s) => Ok(vec![s.clone()]),
        Variant::List(items) => items
            .iter()
            .map(|item| match item {
                Variant::Text(s) => Ok(s.clone()),
                other => Err(Error::InvalidValueType(format!(
                    "property values must be strings, got {other:?}"
                ))),
            })
            .collect(),
        other => Err(Error::InvalidValueType(format!(
            "property values must be a string or list of strings, got {other:?}"
        ))),
    }
}

/// Coerce a variant into the list-of-maps shape a complex property
/// requires. A bare map becomes a one-element list.
pub fn expect_complex_list(value: &Variant) -> Result<Vec<VariantMap>> {
    match value {
        Variant::Map(m) => Ok(vec![m.clone()]),
        Variant::List(items) => items
            .iter()
            .map(|item| match item {
                Variant::Map(m) => Ok(m.clone()),
                other => Err(Error::InvalidValueType(format!(
                    "complex property entries must be maps, got {other:?}"
                ))),
            })
            .collect(),
        other => Err(Error::InvalidValueType(format!(
            "complex property values must be a map or list of maps, got {other:?}"
        ))),
    }
}
