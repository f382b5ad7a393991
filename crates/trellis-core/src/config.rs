use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EngineError;

/// Directory holding project state, relative to the project root.
pub const PROJECT_DIR: &str = ".trellis";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub ordering: OrderingConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
}

impl ProjectConfig {
    /// Check value ranges that `serde` cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.ordering.validate()?;
        if self.workspace.default.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "workspace.default must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Smallest accepted `min_gap`. Below 2 a floored midpoint can land on its
/// lower neighbour.
pub const MIN_GAP_FLOOR: f64 = 2.0;

/// Spacing constants for sibling order keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderingConfig {
    /// Distance between keys after renormalization, and the step used when
    /// inserting at either end of a group.
    #[serde(default = "default_base_spacing")]
    pub base_spacing: f64,
    /// Adjacent keys closer than this trigger renormalization.
    #[serde(default = "default_min_gap")]
    pub min_gap: f64,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            base_spacing: default_base_spacing(),
            min_gap: default_min_gap(),
        }
    }
}

impl OrderingConfig {
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] unless both values are finite,
    /// `min_gap` is at least [`MIN_GAP_FLOOR`] and `base_spacing >= min_gap`.
    pub fn validate(&self) -> Result<(), EngineError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.base_spacing) {
            return Err(EngineError::InvalidConfig(format!(
                "ordering.base_spacing must be a positive number, got {}",
                self.base_spacing
            )));
        }
        if !(self.min_gap.is_finite() && self.min_gap >= MIN_GAP_FLOOR) {
            return Err(EngineError::InvalidConfig(format!(
                "ordering.min_gap must be a number of at least {MIN_GAP_FLOOR}, got {}",
                self.min_gap
            )));
        }
        if self.base_spacing < self.min_gap {
            return Err(EngineError::InvalidConfig(format!(
                "ordering.base_spacing ({}) must be at least ordering.min_gap ({})",
                self.base_spacing, self.min_gap
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace")]
    pub default: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            default: default_workspace(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Statuses (case-insensitive) that count as complete.
    #[serde(default = "default_done_statuses")]
    pub done_statuses: Vec<String>,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            done_statuses: default_done_statuses(),
        }
    }
}

impl ProgressConfig {
    #[must_use]
    pub fn is_done(&self, status: &str) -> bool {
        let status = status.trim();
        self.done_statuses
            .iter()
            .any(|done| done.trim().eq_ignore_ascii_case(status))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

/// Load `.trellis/config.toml`, falling back to defaults when absent.
///
/// # Errors
///
/// Returns an error if the file cannot be read, does not parse, or holds
/// out-of-range values.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid values in {}", path.display()))?;
    Ok(config)
}

/// Load `<config_dir>/trellis/config.toml`, falling back to defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("trellis/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Default `config.toml` written by `tl init`.
#[must_use]
pub fn default_config_toml() -> String {
    format!(
        "[ordering]\n\
         base_spacing = {:.1}\n\
         min_gap = {:.1}\n\
         \n\
         [workspace]\n\
         default = \"{}\"\n\
         \n\
         [progress]\n\
         done_statuses = [\"done\"]\n",
        default_base_spacing(),
        default_min_gap(),
        default_workspace()
    )
}

const fn default_base_spacing() -> f64 {
    1000.0
}

const fn default_min_gap() -> f64 {
    100.0
}

fn default_workspace() -> String {
    "default".to_string()
}

fn default_done_statuses() -> Vec<String> {
    vec!["done".to_string()]
}
