//! # Vault configuration — `vault.toml`
//!
//! Client-side settings for the data layer. The same structure is embedded as
//! the `[vault]` section of the `api` crate's settings, so it can come from a
//! TOML file or from the environment.
//!
//! ## Structure
//!
//! ```toml
//! [dashboard]
//! recent_notes = 3          # how many notes the dashboard lists
//!
//! [passwords]
//! suggested_categories = ["Email", "Development", "Entertainment", "Social", "Banking", "Other"]
//! ```
//!
//! All structs derive `Default` so that a missing or empty file is equivalent to
//! the default configuration.

use serde::{Deserialize, Serialize};

use crate::dashboard::DEFAULT_RECENT_NOTES;
use crate::models::SUGGESTED_CATEGORIES;

/// Top-level configuration stored in `vault.toml`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub passwords: PasswordsConfig,
}

/// Dashboard configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_recent_notes")]
    pub recent_notes: usize,
}

fn default_recent_notes() -> usize {
    DEFAULT_RECENT_NOTES
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            recent_notes: default_recent_notes(),
        }
    }
}

/// Password vault configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PasswordsConfig {
    /// Categories offered by forms. Entries may still use any category.
    #[serde(default = "default_categories")]
    pub suggested_categories: Vec<String>,
}

fn default_categories() -> Vec<String> {
    SUGGESTED_CATEGORIES.iter().map(|c| c.to_string()).collect()
}

impl Default for PasswordsConfig {
    fn default() -> Self {
        Self {
            suggested_categories: default_categories(),
        }
    }
}

impl VaultConfig {
    /// Builder method to set the number of recent notes.
    pub fn with_recent_notes(mut self, count: usize) -> Self {
        self.dashboard.recent_notes = count;
        self
    }

    /// The well-known filename for the config file.
    pub fn filename() -> &'static str {
        "vault.toml"
    }

    /// Parse from TOML string.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = VaultConfig::from_toml("").unwrap();
        assert_eq!(config, VaultConfig::default());
        assert_eq!(config.dashboard.recent_notes, 3);
        assert_eq!(config.passwords.suggested_categories.len(), 6);
    }

    #[test]
    fn test_partial_toml() {
        let config = VaultConfig::from_toml("[dashboard]\nrecent_notes = 5\n").unwrap();
        assert_eq!(config.dashboard.recent_notes, 5);
        assert_eq!(config.passwords, PasswordsConfig::default());

        let text = VaultConfig::default().with_recent_notes(7).to_toml().unwrap();
        assert_eq!(VaultConfig::from_toml(&text).unwrap().dashboard.recent_notes, 7);
    }
}
