//! Declarative manifest of a project's warning classes.
//!
//! Library authors keep their deprecation cycle in one YAML file and build
//! [`WarningClass`] values from it by id, so version bumps touch a single
//! place.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DeprecationError;
use crate::kind::{DeprecationKind, WarningClass};

/// Declared warning classes for one deprecation cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeprecationManifest {
    /// Product name applied to entries that do not set their own
    #[serde(default)]
    pub product: Option<String>,

    /// Declared warning classes
    #[serde(default)]
    pub classes: Vec<ClassEntry>,
}

/// One declared warning class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassEntry {
    /// Unique identifier, e.g. "removed-in-3-0"
    pub id: String,

    /// Warning kind: "imminent" or "pending"
    pub kind: String,

    /// Product override for this entry
    #[serde(default)]
    pub product: Option<String>,

    /// Removal version; required for imminent entries
    #[serde(default)]
    pub version: Option<String>,
}

impl DeprecationManifest {
    /// Load a manifest from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let manifest: Self = serde_yaml::from_str(&content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate every entry.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.classes {
            if entry.id.is_empty() {
                anyhow::bail!("Class id cannot be empty");
            }
            if !seen.insert(entry.id.as_str()) {
                anyhow::bail!("Duplicate class id: {}", entry.id);
            }
            self.build_entry(entry)?;
        }
        Ok(())
    }

    /// Build every declared class, keyed by id.
    pub fn build(&self) -> Result<HashMap<String, WarningClass>, DeprecationError> {
        self.classes
            .iter()
            .map(|entry| Ok((entry.id.clone(), self.build_entry(entry)?)))
            .collect()
    }

    /// Build the class declared under `id`.
    pub fn class(&self, id: &str) -> Result<WarningClass, DeprecationError> {
        let entry = self
            .classes
            .iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| {
                DeprecationError::Configuration(format!("no warning class declared with id `{id}`"))
            })?;
        self.build_entry(entry)
    }

    fn build_entry(&self, entry: &ClassEntry) -> Result<WarningClass, DeprecationError> {
        let kind: DeprecationKind = entry.kind.parse()?;
        let product = entry
            .product
            .clone()
            .or_else(|| self.product.clone())
            .unwrap_or_default();
        WarningClass::new(kind, product, entry.version.clone())
    }
}
