//! Revision layers.
//!
//! A project pins its toolchain versions and defaults in successive
//! revisions. Older revisions are kept as records, but only the active one
//! contributes values, all tagged [`Provenance::RevisionOverride`].

use anyhow::{bail, Result};

use crate::core::config_value::{ConfigPayload, ConfigValue, Provenance};

/// One named set of overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionLayer {
    name: String,
    settings: Vec<(String, ConfigPayload)>,
}

impl RevisionLayer {
    pub fn new(name: impl Into<String>) -> Self {
        RevisionLayer {
            name: name.into(),
            settings: Vec::new(),
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, payload: impl Into<ConfigPayload>) -> Self {
        self.settings.push((key.into(), payload.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &[(String, ConfigPayload)] {
        &self.settings
    }
}

/// Ordered revision layers with an explicit active pointer.
#[derive(Debug, Clone, Default)]
pub struct RevisionStore {
    layers: Vec<RevisionLayer>,
    active: Option<usize>,
}

impl RevisionStore {
    pub fn new() -> Self {
        RevisionStore::default()
    }

    /// Append a layer. The newest layer becomes active unless a pointer
    /// is set explicitly afterwards.
    pub fn push(&mut self, layer: RevisionLayer) -> Result<()> {
        if self.layers.iter().any(|l| l.name == layer.name) {
            bail!("duplicate revision `{}`", layer.name);
        }
        self.layers.push(layer);
        self.active = Some(self.layers.len() - 1);
        Ok(())
    }

    /// Point the store at a named layer.
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        match self.layers.iter().position(|l| l.name == name) {
            Some(idx) => {
                self.active = Some(idx);
                Ok(())
            }
            None => {
                let known: Vec<&str> = self.layers.iter().map(|l| l.name.as_str()).collect();
                if known.is_empty() {
                    bail!("active revision `{}` does not exist; no revisions are declared", name);
                }
                bail!(
                    "active revision `{}` does not exist; known revisions: {}",
                    name,
                    known.join(", ")
                )
            }
        }
    }

    pub fn active(&self) -> Option<&RevisionLayer> {
        self.active.and_then(|idx| self.layers.get(idx))
    }

    pub fn layers(&self) -> &[RevisionLayer] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Values contributed by the active layer.
    pub fn active_values(&self) -> Vec<ConfigValue> {
        let Some(layer) = self.active() else {
            return Vec::new();
        };
        layer
            .settings
            .iter()
            .map(|(key, payload)| {
                ConfigValue::new(key.clone(), Provenance::RevisionOverride, payload.clone())
                    .with_origin(format!("revision {}", layer.name))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RevisionStore {
        let mut store = RevisionStore::new();
        store
            .push(RevisionLayer::new("r1").with_setting("ndk_version", "27.2.12479018"))
            .unwrap();
        store
            .push(
                RevisionLayer::new("r2")
                    .with_setting("ndk_version", "29.0.13113456")
                    .with_setting("min_sdk", 32i64),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_latest_layer_is_active_by_default() {
        let store = store();
        assert_eq!(store.active().unwrap().name(), "r2");

        let values = store.active_values();
        assert_eq!(values.len(), 2);
        assert!(values
            .iter()
            .all(|v| v.provenance == Provenance::RevisionOverride));
    }

    #[test]
    fn test_older_layers_are_inert() {
        let mut store = store();
        store.set_active("r1").unwrap();

        let values = store.active_values();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].payload.render(), "27.2.12479018");
        assert_eq!(store.layers().len(), 2);
    }

    #[test]
    fn test_unknown_active_revision() {
        let mut store = store();
        let err = store.set_active("r9").unwrap_err().to_string();
        assert!(err.contains("r9"));
        assert!(err.contains("r1, r2"));
    }

    #[test]
    fn test_duplicate_revision_rejected() {
        let mut store = store();
        assert!(store.push(RevisionLayer::new("r1")).is_err());
    }

    #[test]
    fn test_empty_store_contributes_nothing() {
        assert!(RevisionStore::new().active_values().is_empty());
    }
}
