//! Hierarchical string properties for host configuration.
//!
//! Operations receive their configuration as a chain of string maps where
//! each layer shadows its parent: project properties over user properties
//! over tool defaults. The resolver consults this store for version
//! overrides (`javelin.override.*` keys).

use std::collections::BTreeMap;
use std::path::Path;

/// A string→string lookup with an optional parent overlay.
#[derive(Debug, Clone, Default)]
pub struct HierarchicalProperties {
    values: BTreeMap<String, String>,
    parent: Option<Box<HierarchicalProperties>>,
}

impl HierarchicalProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a child layer whose lookups fall back to `parent`.
    pub fn with_parent(parent: HierarchicalProperties) -> Self {
        Self {
            values: BTreeMap::new(),
            parent: Some(Box::new(parent)),
        }
    }

    /// Set a value in this layer, shadowing any parent value.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Look up a value, walking up through parent layers.
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(value) => Some(value),
            None => self.parent.as_ref().and_then(|p| p.get(key)),
        }
    }

    /// Whether the key is present in this layer or any parent.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Load `KEY=value` lines into this layer, skipping comments and blanks.
    pub fn load_file(&mut self, path: &Path) -> miette::Result<()> {
        if !path.is_file() {
            return Ok(());
        }
        let content =
            std::fs::read_to_string(path).map_err(javelin_util::errors::JavelinError::Io)?;
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = trimmed.split_once('=') {
                self.put(key.trim(), value.trim());
            }
        }
        Ok(())
    }

    /// Keys visible in this layer only (not parents).
    pub fn local_keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// All visible key/value pairs with child layers shadowing parents.
    pub fn flattened(&self) -> BTreeMap<String, String> {
        let mut map = match self.parent {
            Some(ref parent) => parent.flattened(),
            None => BTreeMap::new(),
        };
        for (k, v) in &self.values {
            map.insert(k.clone(), v.clone());
        }
        map
    }
}
