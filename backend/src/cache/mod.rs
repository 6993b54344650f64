//! Mapping Registry - Store and reuse mapping configurations
//!
//! Saves mappings to disk together with the headers they were built for, and
//! matches them against the headers of newly loaded sheets.
//!
//! ```text
//! .sheetjson/mappings/
//! ├── orders-export-1a2b3c4d.json
//! └── customer-list-9f8e7d6c.json
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::DEFAULT_REGISTRY_DIR;
use crate::error::{RegistryError, RegistryResult};
use crate::transform::mapping::MappingConfig;

/// Minimum share of a mapping's source columns that must be present.
const COMPATIBILITY_THRESHOLD: f64 = 0.5;

/// A stored mapping with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMapping {
    pub id: String,
    /// Human-readable name
    pub name: String,
    pub mapping: MappingConfig,
    /// Headers of the sheet the mapping was built for
    pub headers: Vec<String>,
    /// RFC 3339 creation time
    pub created_at: String,
    pub last_used: Option<String>,
    #[serde(default)]
    pub use_count: u32,
}

/// On-disk registry of mapping configurations
pub struct MappingRegistry {
    registry_dir: PathBuf,
    mappings: HashMap<String, StoredMapping>,
}

impl MappingRegistry {
    /// Open the registry in the default directory
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_REGISTRY_DIR)
    }

    /// Open a registry in a custom directory, loading what is already there.
    ///
    /// Unreadable or malformed files are skipped.
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: dir.as_ref().to_path_buf(),
            mappings: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    fn load_all(&mut self) {
        let Ok(entries) = fs::read_dir(&self.registry_dir) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(stored) = serde_json::from_str::<StoredMapping>(&content) {
                        self.mappings.insert(stored.id.clone(), stored);
                    }
                }
            }
        }
    }

    /// All stored mappings, most recently created first
    pub fn list(&self) -> Vec<&StoredMapping> {
        let mut all: Vec<_> = self.mappings.values().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub fn get(&self, id: &str) -> Option<&StoredMapping> {
        self.mappings.get(id)
    }

    /// Like [`get`](Self::get) but missing ids are an error
    pub fn require(&self, id: &str) -> RegistryResult<&StoredMapping> {
        self.get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Mappings usable with `headers`, best match first.
    ///
    /// The score is the share of a mapping's source columns found in
    /// `headers` (case-insensitive). Only scores above 0.5 are returned.
    pub fn find_compatible(&self, headers: &[String]) -> Vec<(&StoredMapping, f64)> {
        let mut compatible: Vec<_> = self
            .mappings
            .values()
            .filter_map(|m| {
                let score = compatibility(&m.mapping.source_columns(), headers);
                (score > COMPATIBILITY_THRESHOLD).then_some((m, score))
            })
            .collect();

        compatible.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.use_count.cmp(&a.0.use_count))
        });

        compatible
    }

    /// Store a mapping and return its id
    pub fn save(
        &mut self,
        mapping: MappingConfig,
        name: &str,
        headers: Vec<String>,
    ) -> RegistryResult<String> {
        if mapping.is_empty() {
            return Err(RegistryError::InvalidTemplate("mapping has no fields".into()));
        }

        let stored = StoredMapping {
            id: generate_id(name),
            name: name.to_string(),
            mapping,
            headers,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_used: None,
            use_count: 0,
        };
        self.write(&stored)?;

        let id = stored.id.clone();
        self.mappings.insert(id.clone(), stored);
        Ok(id)
    }

    /// Import a mapping JSON file (`{"fields": [...]}` or a bare array).
    ///
    /// The source columns of its rules stand in for the headers.
    pub fn import(&mut self, path: &Path, name: Option<&str>) -> RegistryResult<String> {
        let content = fs::read_to_string(path)?;
        let mapping = MappingConfig::from_json(&content)
            .map_err(|e| RegistryError::InvalidTemplate(e.to_string()))?;

        let name = name.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("imported")
        });

        let headers = mapping.source_columns();
        self.save(mapping, name, headers)
    }

    /// Record one use of a mapping
    pub fn mark_used(&mut self, id: &str) -> RegistryResult<()> {
        let stored = self
            .mappings
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        stored.use_count += 1;
        stored.last_used = Some(chrono::Utc::now().to_rfc3339());

        let stored = stored.clone();
        self.write(&stored)
    }

    /// Remove a mapping from disk, then from memory.
    ///
    /// A file that is already gone is not an error; any other removal
    /// failure leaves the entry in place.
    pub fn delete(&mut self, id: &str) -> RegistryResult<()> {
        if !self.mappings.contains_key(id) {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.mappings.remove(id);
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }

    fn write(&self, stored: &StoredMapping) -> RegistryResult<()> {
        fs::create_dir_all(&self.registry_dir)?;
        let content = serde_json::to_string_pretty(stored)?;
        fs::write(self.path_for(&stored.id), content)?;
        Ok(())
    }
}

impl Default for MappingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Share of `columns` present in `headers`, ignoring case.
fn compatibility(columns: &[String], headers: &[String]) -> f64 {
    if columns.is_empty() {
        return 0.0;
    }

    let headers_lower: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    let matched = columns
        .iter()
        .filter(|c| headers_lower.contains(&c.to_lowercase()))
        .count();

    matched as f64 / columns.len() as f64
}

/// Slug of the name plus a random suffix
fn generate_id(name: &str) -> String {
    let slug = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug = if slug.is_empty() { "mapping".to_string() } else { slug };

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", slug, &suffix[..8])
}
