//! JSON exports of the site imagery.
//!
//! Two download-style exports, written as pretty-printed JSON:
//!
//! | Export | Default file | Content |
//! |--------|--------------|---------|
//! | settings | `shutter-creation-images.json` | the [`ImageSettings`] record |
//! | gallery | `shutter-creation-gallery.json` | `{ gallery, settings, exportDate }` |
//!
//! There is no import path; the files are backups for the operator.

use crate::config::ExportConfig;
use crate::gallery::GalleryImage;
use crate::settings::ImageSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Gallery backup: every image plus the settings at export time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryExport {
    pub gallery: Vec<GalleryImage>,
    pub settings: ImageSettings,
    pub export_date: DateTime<Utc>,
}

pub fn settings_json(settings: &ImageSettings) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(settings)?)
}

pub fn gallery_json(export: &GalleryExport) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(export)?)
}

fn write_export(dir: &Path, file_name: &str, json: &str) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, json)?;
    info!(path = %path.display(), bytes = json.len(), "export written");
    Ok(path)
}

/// Write the settings export into `dir`; returns the file written.
pub fn export_settings(
    settings: &ImageSettings,
    dir: &Path,
    config: &ExportConfig,
) -> Result<PathBuf, ExportError> {
    write_export(dir, &config.settings_file, &settings_json(settings)?)
}

/// Write the gallery export into `dir`, stamped with `now`.
pub fn export_gallery(
    gallery: &[GalleryImage],
    settings: &ImageSettings,
    now: DateTime<Utc>,
    dir: &Path,
    config: &ExportConfig,
) -> Result<PathBuf, ExportError> {
    let export = GalleryExport {
        gallery: gallery.to_vec(),
        settings: settings.clone(),
        export_date: now,
    };
    write_export(dir, &config.gallery_file, &gallery_json(&export)?)
}
