//! Ordered option sources.
//!
//! Every setting that can come from more than one place (a flag, an
//! environment variable, a preset, the config file, a built-in default) is
//! resolved by listing its sources in priority order and taking the first one
//! that carries a value.

use std::fmt;

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Flag,
    Env(&'static str),
    Preset,
    Config,
    Default,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Flag => write!(f, "flag"),
            Origin::Env(name) => write!(f, "env:{}", name),
            Origin::Preset => write!(f, "preset"),
            Origin::Config => write!(f, "config"),
            Origin::Default => write!(f, "default"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptionSource<T> {
    pub origin: Origin,
    pub value: Option<T>,
}

impl<T> OptionSource<T> {
    pub fn flag(value: Option<T>) -> Self {
        Self { origin: Origin::Flag, value }
    }

    pub fn preset(value: Option<T>) -> Self {
        Self { origin: Origin::Preset, value }
    }

    pub fn config(value: Option<T>) -> Self {
        Self { origin: Origin::Config, value }
    }
}

impl OptionSource<String> {
    /// Reads an environment variable through `lookup`; empty values count as unset
    pub fn env(name: &'static str, lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            origin: Origin::Env(name),
            value: lookup(name).filter(|v| !v.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub origin: Origin,
}

/// Returns the first source that carries a value, in the order given
pub fn resolve<T>(sources: impl IntoIterator<Item = OptionSource<T>>) -> Option<Resolved<T>> {
    sources.into_iter().find_map(|source| {
        source.value.map(|value| Resolved {
            value,
            origin: source.origin,
        })
    })
}

/// Resolves and parses a string option; a value from any source must parse
pub fn resolve_parsed<T, E>(
    sources: impl IntoIterator<Item = OptionSource<String>>,
    default: T,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<Resolved<T>, E> {
    match resolve(sources) {
        Some(found) => Ok(Resolved {
            value: parse(&found.value)?,
            origin: found.origin,
        }),
        None => Ok(Resolved {
            value: default,
            origin: Origin::Default,
        }),
    }
}

/// Process environment lookup used outside of tests
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
