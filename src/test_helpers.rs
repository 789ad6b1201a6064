//! Shared test utilities for the shutter-admin test suite.
//!
//! Provides sample image bytes, gallery record builders, a store that always
//! fails, and a temp-dir backed site fixture.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = TestSite::new();
//! let tab = site.browser.open_tab();
//! let mut manager = site.manager(&tab);
//! manager.update_logo("https://example.com/logo.png").unwrap();
//! ```

use chrono::Utc;
use std::sync::Arc;
use tempfile::TempDir;

use crate::admin::ImageManager;
use crate::config::AdminConfig;
use crate::gallery::{Category, Gallery, GalleryImage, GalleryStore, ImageId};
use crate::settings::SettingsStore;
use crate::storage::{FileStore, KeyValueStore, StorageError};
use crate::sync::{Broadcaster, Browser, Tab};
use crate::upload::embed;

// =========================================================================
// Sample images
// =========================================================================

/// A complete 1x1 RGBA PNG.
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// JPEG header bytes (SOI + JFIF APP0) followed by EOI. Enough for format detection.
pub const JPEG_BYTES: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0xFF, 0xD9,
];

/// A freshly uploaded gallery record for `name`.
///
/// `.png` names get PNG content, everything else JPEG. The file name is
/// appended to the payload so every record has a distinct `src`.
pub fn gallery_image(name: &str) -> GalleryImage {
    let (mime_type, base) = if name.ends_with(".png") {
        ("image/png", PNG_BYTES)
    } else {
        ("image/jpeg", JPEG_BYTES)
    };
    let mut bytes = base.to_vec();
    bytes.extend_from_slice(name.as_bytes());
    let now = Utc::now();
    GalleryImage {
        id: ImageId::generate(now),
        name: name.to_string(),
        src: embed(mime_type, &bytes),
        category: Category::Other,
        upload_date: now,
        size: bytes.len() as u64,
        mime_type: mime_type.to_string(),
    }
}

// =========================================================================
// Stores
// =========================================================================

/// A store where every operation fails, like a browser with storage disabled.
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }
}

// =========================================================================
// Site fixture
// =========================================================================

/// One site origin with a durable store in a temp directory.
pub struct TestSite {
    pub dir: TempDir,
    pub config: AdminConfig,
    pub browser: Browser,
    durable: Arc<FileStore>,
}

impl TestSite {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let durable = Arc::new(FileStore::open(dir.path().join("data")).unwrap());
        let browser = Browser::new(durable.clone());
        Self {
            dir,
            config: AdminConfig::default(),
            browser,
            durable,
        }
    }

    /// The durable store without any tab's change notifications.
    pub fn durable(&self) -> Arc<dyn KeyValueStore> {
        self.durable.clone()
    }

    pub fn broadcaster(&self, tab: &Tab) -> Broadcaster {
        let store = SettingsStore::new(
            tab.durable(),
            &self.config.storage.settings_key,
            self.config.defaults.settings(),
        );
        Broadcaster::new(store, tab, &self.config.storage.session_key)
    }

    pub fn manager(&self, tab: &Tab) -> ImageManager {
        ImageManager::new(self.broadcaster(tab), &self.config.defaults).unwrap()
    }

    pub fn gallery(&self, tab: &Tab) -> Gallery {
        Gallery::load(GalleryStore::new(tab.durable(), &self.config.storage.gallery_key)).unwrap()
    }
}
