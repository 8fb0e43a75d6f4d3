use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use crate::errors::{SettingsError, SettingsResult};

/// ## Structure
/// This module contains the data structures for the lifecycle settings file.
///
/// ```text
/// LifecycleSettings
///   ├── active_cycle_id: Option<String>
///   └── cycles: Vec<CycleProfile>
///       ├── id: String
///       ├── name: String
///       ├── stage_type_ids: Vec<i32>
///       ├── stage_labels: HashMap<i32, String>
///       └── max_auto_stage_count: usize
/// ```
///
/// A cycle profile names the ordered invoice-type stages a report tracks.
/// An empty `stage_type_ids` list means "pick the first
/// `max_auto_stage_count` active types by sort order".

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LifecycleSettings {
    #[serde(default)]
    pub active_cycle_id: Option<String>,
    #[serde(default)]
    pub cycles: Vec<CycleProfile>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CycleProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stage_type_ids: Vec<i32>,
    #[serde(default)]
    pub stage_labels: HashMap<i32, String>,
    #[serde(default = "default_max_auto_stage_count")]
    pub max_auto_stage_count: usize,
}

fn default_max_auto_stage_count() -> usize {
    4
}

impl Default for CycleProfile {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            name: "Default Cycle".to_string(),
            stage_type_ids: Vec::new(),
            stage_labels: HashMap::new(),
            max_auto_stage_count: default_max_auto_stage_count(),
        }
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            active_cycle_id: Some("default".to_string()),
            cycles: vec![CycleProfile::default()],
        }
    }
}

impl LifecycleSettings {
    /// Load settings from a YAML file. A missing file yields the default
    /// single-profile settings; a present but malformed file is an error.
    pub fn load(path: &str) -> SettingsResult<Self> {
        if !Path::new(path).is_file() {
            warn!("Settings file {} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_string(),
            source,
        })?;
        let mut settings: LifecycleSettings =
            serde_yaml::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.to_string(),
                source,
            })?;
        settings.normalize();
        Ok(settings)
    }

    pub fn save(&self, path: &str) -> SettingsResult<()> {
        let content = serde_yaml::to_string(self).expect("settings are always serializable");
        std::fs::write(path, content).map_err(|source| SettingsError::Write {
            path: path.to_string(),
            source,
        })
    }

    /// Repair the loaded structure: slugified non-empty profile ids,
    /// positive deduplicated stage ids, positive label keys, a stage count
    /// of at least one, and an active id that points at a real profile.
    pub fn normalize(&mut self) {
        if self.cycles.is_empty() {
            self.cycles.push(CycleProfile::default());
        }

        let mut seen_ids: Vec<String> = Vec::new();
        for profile in &mut self.cycles {
            let seed = if profile.id.trim().is_empty() {
                profile.name.clone()
            } else {
                profile.id.clone()
            };
            let mut id = generate_cycle_id(&seed);
            let mut suffix = 1;
            while seen_ids.contains(&id) {
                id = generate_cycle_id(&format!("{}_{}", seed, suffix));
                suffix += 1;
            }
            seen_ids.push(id.clone());
            profile.id = id;

            if profile.name.trim().is_empty() {
                profile.name = profile.id.clone();
            }
            profile.stage_type_ids = normalize_ordered_ids(&profile.stage_type_ids);
            profile.stage_labels.retain(|id, label| *id > 0 && !label.is_empty());
            if profile.max_auto_stage_count == 0 {
                profile.max_auto_stage_count = 1;
            }
        }

        let active_is_known = self
            .active_cycle_id
            .as_ref()
            .map(|id| self.cycles.iter().any(|c| &c.id == id))
            .unwrap_or(false);
        if !active_is_known {
            self.active_cycle_id = self.cycles.first().map(|c| c.id.clone());
        }
    }

    /// Pick the profile for a request: the requested id when it exists,
    /// else the active profile, else the first one.
    pub fn select_profile(&self, requested: Option<&str>) -> Option<&CycleProfile> {
        if let Some(id) = requested {
            if let Some(profile) = self.cycles.iter().find(|c| c.id == id) {
                return Some(profile);
            }
        }
        if let Some(id) = &self.active_cycle_id {
            if let Some(profile) = self.cycles.iter().find(|c| &c.id == id) {
                return Some(profile);
            }
        }
        self.cycles.first()
    }
}

/// Positive ids only, first occurrence wins, order preserved.
pub fn normalize_ordered_ids(ids: &[i32]) -> Vec<i32> {
    let mut result = Vec::new();
    for &id in ids {
        if id > 0 && !result.contains(&id) {
            result.push(id);
        }
    }
    result
}

fn generate_cycle_id(seed: &str) -> String {
    let mut id = String::new();
    let mut last_was_sep = false;
    for c in seed.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            id.push(c);
            last_was_sep = false;
        } else if !last_was_sep && !id.is_empty() {
            id.push('_');
            last_was_sep = true;
        }
    }
    let id = id.trim_matches('_').to_string();
    if id.is_empty() {
        "cycle".to_string()
    } else {
        id
    }
}
