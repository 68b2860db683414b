use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

/// One pre-loaded study material from `materials.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub title: String,
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<String, Material>,
}

impl Catalog {
    /// A missing file is an empty catalog; a malformed one is an error.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No pre-loaded materials found at {}", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read materials from {}", path.display()))
            }
        };

        let entries: BTreeMap<String, Material> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse materials file {}", path.display()))?;

        tracing::info!(
            "Pre-loaded materials available: {:?}",
            entries.keys().collect::<Vec<_>>()
        );
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: BTreeMap<String, Material>) -> Self {
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&Material> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Material)> {
        self.entries.iter().map(|(id, material)| (id.as_str(), material))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
