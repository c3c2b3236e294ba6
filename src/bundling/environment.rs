//! Build environment variables.

use crate::error::{BundleError, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Environment variables passed to the build.
///
/// Built from caller-supplied defaults overlaid with explicit overrides; on the
/// host they are layered on top of the ambient process environment, in the
/// container they are the whole extra environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BuildEnvironment(BTreeMap<String, String>);

impl BuildEnvironment {
    /// Empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from `defaults` and applies `overrides` on top (overrides win).
    pub fn merged<D, O, K, V>(defaults: D, overrides: O) -> Self
    where
        D: IntoIterator<Item = (K, V)>,
        O: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut env = Self::new();
        for (key, value) in defaults.into_iter().chain(overrides) {
            env.0.insert(key.into(), value.into());
        }
        env
    }

    /// Parses `KEY=VALUE` pairs (as given on the command line).
    pub fn parse_pairs<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut env = Self::new();
        for pair in pairs {
            let (key, value) = parse_pair(pair)?;
            env.0.insert(key, value);
        }
        Ok(env)
    }

    /// Sets a variable, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Looks up a variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterates in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no variables are set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Splits `KEY=VALUE` on the first `=`. The value may be empty or contain `=`.
pub fn parse_pair(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(BundleError::configuration(format!(
            "Invalid environment entry '{}' (expected KEY=VALUE)",
            pair
        ))),
    }
}
