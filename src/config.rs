//! Admin configuration.
//!
//! Loaded from a sparse `shutter-admin.toml`: stock defaults are the base
//! layer and the file overrides only the keys it names. Unknown keys are
//! rejected to catch typos early.
//!
//! ```toml
//! [storage]
//! data_dir = ".shutter-admin"          # Durable store directory
//! settings_key = "shutterCreationImages"
//! gallery_key = "shutterCreationGallery"
//! session_key = "imageUpdates"
//!
//! [defaults]
//! profile_photo = "https://images.unsplash.com/..."
//! portfolio_placeholders = ["https://...", "https://...", "https://...", "https://..."]
//!
//! [markers]
//! profile_alt = ["Professional Photographer"]
//! profile_class = "profile-photo"
//! logo_class = "logo-img"
//! portfolio_class = "portfolio-item"
//!
//! [export]
//! settings_file = "shutter-creation-images.json"
//! gallery_file = "shutter-creation-gallery.json"
//! ```

use crate::settings::{DEFAULT_PROFILE_PHOTO, ImageRef, ImageSettings, PORTFOLIO_SLOTS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full admin configuration. Every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdminConfig {
    pub storage: StorageConfig,
    pub defaults: DefaultsConfig,
    pub markers: MarkerConfig,
    pub export: ExportConfig,
}

impl AdminConfig {
    /// Validate values that serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let keys = [
            ("storage.settings_key", &self.storage.settings_key),
            ("storage.gallery_key", &self.storage.gallery_key),
            ("storage.session_key", &self.storage.session_key),
        ];
        for (name, value) in keys {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{name} must not be empty")));
            }
        }
        if self.storage.settings_key == self.storage.gallery_key {
            return Err(ConfigError::Validation(
                "storage.settings_key and storage.gallery_key must differ".into(),
            ));
        }
        if self.storage.data_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.data_dir must not be empty".into(),
            ));
        }
        if ImageRef::new(self.defaults.profile_photo.as_str()).is_none() {
            return Err(ConfigError::Validation(
                "defaults.profile_photo must not be empty".into(),
            ));
        }
        if self.defaults.portfolio_placeholders.len() != PORTFOLIO_SLOTS {
            return Err(ConfigError::Validation(format!(
                "defaults.portfolio_placeholders must have exactly {PORTFOLIO_SLOTS} entries"
            )));
        }
        if self.markers.logo_class.trim().is_empty()
            || self.markers.portfolio_class.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "markers.logo_class and markers.portfolio_class must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Where and under which keys records are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory of the durable store.
    pub data_dir: String,
    /// Durable key of the image settings record.
    pub settings_key: String,
    /// Durable key of the gallery array.
    pub gallery_key: String,
    /// Session-channel key for the latest settings.
    pub session_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: ".shutter-admin".to_string(),
            settings_key: "shutterCreationImages".to_string(),
            gallery_key: "shutterCreationGallery".to_string(),
            session_key: "imageUpdates".to_string(),
        }
    }
}

/// Placeholder imagery shown before the operator picks anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Profile photo of the default settings record.
    pub profile_photo: String,
    /// What the site template shows in each unfilled portfolio slot.
    pub portfolio_placeholders: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            profile_photo: DEFAULT_PROFILE_PHOTO.to_string(),
            portfolio_placeholders: [
                "https://images.unsplash.com/photo-1519741497674-611481863552?ixlib=rb-4.0.3&auto=format&fit=crop&w=500&q=80",
                "https://images.unsplash.com/photo-1511285560929-80b456fea0bc?ixlib=rb-4.0.3&auto=format&fit=crop&w=500&q=80",
                "https://images.unsplash.com/photo-1476703993599-0035a21b17a9?ixlib=rb-4.0.3&auto=format&fit=crop&w=500&q=80",
                "https://images.unsplash.com/photo-1492691527719-9d1e07e534b4?ixlib=rb-4.0.3&auto=format&fit=crop&w=500&q=80",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl DefaultsConfig {
    /// The default settings record.
    pub fn settings(&self) -> ImageSettings {
        ImageRef::new(self.profile_photo.as_str())
            .map(ImageSettings::with_profile_photo)
            .unwrap_or_default()
    }

    /// Placeholder for a 0-based slot index.
    pub fn placeholder(&self, index: usize) -> &str {
        self.portfolio_placeholders
            .get(index)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// How the site templates mark their image elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkerConfig {
    /// An image whose alt text contains any of these is a profile photo.
    pub profile_alt: Vec<String>,
    /// An image with this class is a profile photo.
    pub profile_class: String,
    /// An image with this class is a logo.
    pub logo_class: String,
    /// Images inside elements with this class are portfolio items, in document order.
    pub portfolio_class: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            profile_alt: vec!["Professional Photographer".to_string()],
            profile_class: "profile-photo".to_string(),
            logo_class: "logo-img".to_string(),
            portfolio_class: "portfolio-item".to_string(),
        }
    }
}

/// File names used by the export commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub settings_file: String,
    pub gallery_file: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            settings_file: "shutter-creation-images.json".to_string(),
            gallery_file: "shutter-creation-gallery.json".to_string(),
        }
    }
}

// =============================================================================
// Loading and merging
// =============================================================================

/// Stock defaults as a TOML table, the base layer for user overrides.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AdminConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key by key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => value,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Parse a config from TOML text, merged over the stock defaults.
pub fn parse_config(content: &str) -> Result<AdminConfig, ConfigError> {
    let overlay: toml::Value = toml::from_str(content)?;
    let config: AdminConfig = merge_toml(stock_defaults_value(), overlay).try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`; a missing file yields the stock defaults.
pub fn load_config(path: &Path) -> Result<AdminConfig, ConfigError> {
    if !path.exists() {
        return Ok(AdminConfig::default());
    }
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// A fully commented stock config file, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# Shutter Admin Configuration
# ===========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Directory holding the durable records (one JSON file per key).
data_dir = ".shutter-admin"

# Key of the site image settings record.
settings_key = "shutterCreationImages"

# Key of the uploaded-image gallery.
gallery_key = "shutterCreationGallery"

# Session-channel key read by windows opened from the admin.
session_key = "imageUpdates"

# ---------------------------------------------------------------------------
# Default imagery
# ---------------------------------------------------------------------------
[defaults]
# Profile photo used until one is chosen.
profile_photo = "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?ixlib=rb-4.0.3&auto=format&fit=crop&w=500&q=80"

# What the site shows in unfilled portfolio slots (exactly four).
portfolio_placeholders = [
    "https://images.unsplash.com/photo-1519741497674-611481863552?ixlib=rb-4.0.3&auto=format&fit=crop&w=500&q=80",
    "https://images.unsplash.com/photo-1511285560929-80b456fea0bc?ixlib=rb-4.0.3&auto=format&fit=crop&w=500&q=80",
    "https://images.unsplash.com/photo-1476703993599-0035a21b17a9?ixlib=rb-4.0.3&auto=format&fit=crop&w=500&q=80",
    "https://images.unsplash.com/photo-1492691527719-9d1e07e534b4?ixlib=rb-4.0.3&auto=format&fit=crop&w=500&q=80",
]

# ---------------------------------------------------------------------------
# Page markers
# ---------------------------------------------------------------------------
[markers]
# Images whose alt text contains any of these are profile photos.
profile_alt = ["Professional Photographer"]

# Images with this class are profile photos too.
profile_class = "profile-photo"

# Images with this class show the logo.
logo_class = "logo-img"

# Images inside elements with this class are portfolio slots, in page order.
portfolio_class = "portfolio-item"

# ---------------------------------------------------------------------------
# Export
# ---------------------------------------------------------------------------
[export]
settings_file = "shutter-creation-images.json"
gallery_file = "shutter-creation-gallery.json"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        AdminConfig::default().validate().unwrap();
    }

    #[test]
    fn default_keys() {
        let config = AdminConfig::default();
        assert_eq!(config.storage.settings_key, "shutterCreationImages");
        assert_eq!(config.storage.gallery_key, "shutterCreationGallery");
        assert_eq!(config.storage.session_key, "imageUpdates");
        assert_eq!(config.defaults.portfolio_placeholders.len(), 4);
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config = parse_config(stock_config_toml()).unwrap();
        assert_eq!(config, AdminConfig::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config = parse_config(
            r#"
            [storage]
            data_dir = "/srv/studio/admin"

            [markers]
            profile_alt = ["Mansur Khan", "Professional Photographer"]
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.data_dir, "/srv/studio/admin");
        assert_eq!(config.storage.settings_key, "shutterCreationImages");
        assert_eq!(config.markers.profile_alt.len(), 2);
        assert_eq!(config.markers.logo_class, "logo-img");
    }

    #[test]
    fn unknown_key_rejected() {
        let err = parse_config("[storage]\ndata_dri = \"x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn unknown_section_rejected() {
        assert!(parse_config("[theme]\ncolor = \"red\"\n").is_err());
    }

    #[test]
    fn wrong_placeholder_count_rejected() {
        let err = parse_config("[defaults]\nportfolio_placeholders = [\"a\", \"b\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn same_settings_and_gallery_key_rejected() {
        let err = parse_config("[storage]\ngallery_key = \"shutterCreationImages\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn empty_profile_photo_rejected() {
        assert!(parse_config("[defaults]\nprofile_photo = \"\"\n").is_err());
    }

    #[test]
    fn load_config_missing_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("shutter-admin.toml")).unwrap();
        assert_eq!(config, AdminConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("shutter-admin.toml");
        fs::write(&path, "[export]\nsettings_file = \"images.json\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.export.settings_file, "images.json");
        assert_eq!(config.export.gallery_file, "shutter-creation-gallery.json");
    }

    #[test]
    fn merge_toml_replaces_arrays_wholesale() {
        let base: toml::Value = toml::from_str("a = [1, 2, 3]\n[t]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("a = [9]\n[t]\ny = 5\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_array().unwrap().len(), 1);
        assert_eq!(merged["t"]["x"].as_integer(), Some(1));
        assert_eq!(merged["t"]["y"].as_integer(), Some(5));
    }

    #[test]
    fn defaults_settings_uses_configured_photo() {
        let defaults = DefaultsConfig {
            profile_photo: "https://studio/ph.jpg".into(),
            ..DefaultsConfig::default()
        };
        assert_eq!(defaults.settings().profile_photo.as_str(), "https://studio/ph.jpg");
        assert_eq!(defaults.placeholder(9), "");
    }
}
