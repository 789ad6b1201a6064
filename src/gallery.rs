//! Bulk-upload gallery.
//!
//! The gallery is an ordered collection of uploaded images, stored as one JSON
//! array under its own durable key, independent of the site settings. Order
//! is insertion order; entries only leave through an explicit delete.
//!
//! [`Gallery`] owns the in-memory collection and the transient selection set.
//! Every mutation changes memory first and then replaces the stored array in
//! a single write.

use crate::settings::ImageRef;
use crate::storage::{KeyValueStore, StorageError};
use crate::types::{Confirm, Notice, Outcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Image not found: {0}")]
    NotFound(ImageId),
    #[error("No images selected.")]
    NothingSelected,
}

/// Gallery category used for filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Wedding,
    Portrait,
    Event,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Wedding,
        Category::Portrait,
        Category::Event,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Wedding => "wedding",
            Category::Portrait => "portrait",
            Category::Event => "event",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown category '{s}' (expected wedding, portrait, event or other)")
            })
    }
}

/// Listing filter: everything, or one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(self, image: &GalleryImage) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => image.category == category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(CategoryFilter::All)
        } else {
            s.parse().map(CategoryFilter::Only)
        }
    }
}

/// Gallery entry identifier: `<unix millis>-<8 hex digits>`.
///
/// Records written by older versions of the site used a bare number; those
/// are read back as their decimal text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawId", into = "String")]
pub struct ImageId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl TryFrom<RawId> for ImageId {
    type Error = String;

    fn try_from(raw: RawId) -> Result<Self, Self::Error> {
        let text = match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        };
        if text.is_empty() {
            Err("image id must not be empty".into())
        } else {
            Ok(Self(text))
        }
    }
}

impl From<ImageId> for String {
    fn from(id: ImageId) -> Self {
        id.0
    }
}

impl ImageId {
    /// Fresh id from a timestamp plus a random component.
    ///
    /// Uniqueness is not checked against the collection.
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self(format!(
            "{}-{:08x}",
            now.timestamp_millis(),
            rand::random::<u32>()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ImageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            Err("image id must not be empty".into())
        } else {
            Ok(Self(s.to_string()))
        }
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    pub id: ImageId,
    /// Original file name, display only.
    pub name: String,
    /// Embedded image data.
    pub src: ImageRef,
    #[serde(default)]
    pub category: Category,
    pub upload_date: DateTime<Utc>,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
}

/// Durable home of the gallery array.
#[derive(Clone)]
pub struct GalleryStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl GalleryStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// Stored collection, empty if nothing (or nothing parseable) is stored.
    pub fn load(&self) -> Result<Vec<GalleryImage>, StorageError> {
        let Some(json) = self.backend.get(&self.key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&json) {
            Ok(images) => Ok(images),
            Err(e) => {
                warn!(key = %self.key, error = %e, "stored gallery is malformed, starting empty");
                Ok(Vec::new())
            }
        }
    }

    /// Replace the stored collection.
    pub fn save(&self, images: &[GalleryImage]) -> Result<(), StorageError> {
        let json = serde_json::to_string(images)?;
        self.backend.set(&self.key, &json)
    }
}

/// Ordered set of selected ids. Keeps selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<ImageId>,
}

impl Selection {
    pub fn contains(&self, id: &ImageId) -> bool {
        self.ids.contains(id)
    }

    /// Add `id`; returns false if it was already selected.
    pub fn insert(&mut self, id: ImageId) -> bool {
        if self.contains(&id) {
            false
        } else {
            self.ids.push(id);
            true
        }
    }

    pub fn remove(&mut self, id: &ImageId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|i| i != id);
        self.ids.len() != before
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageId> {
        self.ids.iter()
    }
}

/// Counts shown in the gallery header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GalleryStats {
    pub total: usize,
    pub selected: usize,
}

/// The gallery as the admin works with it.
pub struct Gallery {
    store: GalleryStore,
    images: Vec<GalleryImage>,
    selection: Selection,
}

impl Gallery {
    /// Load the stored collection with an empty selection.
    pub fn load(store: GalleryStore) -> Result<Self, GalleryError> {
        let images = store.load()?;
        Ok(Self {
            store,
            images,
            selection: Selection::default(),
        })
    }

    pub fn images(&self) -> &[GalleryImage] {
        &self.images
    }

    pub fn get(&self, id: &ImageId) -> Result<&GalleryImage, GalleryError> {
        self.images
            .iter()
            .find(|img| &img.id == id)
            .ok_or_else(|| GalleryError::NotFound(id.clone()))
    }

    /// Images passing `filter`, in collection order.
    pub fn visible(&self, filter: CategoryFilter) -> Vec<&GalleryImage> {
        self.images.iter().filter(|img| filter.matches(img)).collect()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn stats(&self) -> GalleryStats {
        GalleryStats {
            total: self.images.len(),
            selected: self.selection.len(),
        }
    }

    fn save(&self) -> Result<(), GalleryError> {
        self.store.save(&self.images)?;
        Ok(())
    }

    /// Append a batch of freshly ingested images and persist once.
    pub fn add_uploaded(&mut self, images: Vec<GalleryImage>) -> Result<usize, GalleryError> {
        let count = images.len();
        self.images.extend(images);
        self.save()?;
        info!(count, total = self.images.len(), "gallery images added");
        Ok(count)
    }

    pub fn set_category(&mut self, id: &ImageId, category: Category) -> Result<(), GalleryError> {
        let image = self
            .images
            .iter_mut()
            .find(|img| &img.id == id)
            .ok_or_else(|| GalleryError::NotFound(id.clone()))?;
        image.category = category;
        self.save()
    }

    /// Flip selection of `id`; returns whether it is now selected.
    pub fn toggle_selection(&mut self, id: &ImageId) -> Result<bool, GalleryError> {
        self.get(id)?;
        if self.selection.remove(id) {
            Ok(false)
        } else {
            self.selection.insert(id.clone());
            Ok(true)
        }
    }

    /// Add `id` to the selection (no-op if already selected).
    pub fn select(&mut self, id: &ImageId) -> Result<(), GalleryError> {
        self.get(id)?;
        self.selection.insert(id.clone());
        Ok(())
    }

    /// Select every image currently visible under `filter`.
    pub fn select_all(&mut self, filter: CategoryFilter) -> usize {
        let ids: Vec<ImageId> = self
            .images
            .iter()
            .filter(|img| filter.matches(img))
            .map(|img| img.id.clone())
            .collect();
        ids.into_iter()
            .filter(|id| self.selection.insert(id.clone()))
            .count()
    }

    /// Hand over the current selection in selection order, clearing it.
    pub fn take_selection(&mut self) -> Vec<ImageId> {
        std::mem::take(&mut self.selection.ids)
    }

    /// Delete one image after confirmation.
    pub fn delete(
        &mut self,
        id: &ImageId,
        confirm: &mut dyn Confirm,
    ) -> Result<Outcome, GalleryError> {
        self.get(id)?;
        if !confirm.confirm("Are you sure you want to delete this image?") {
            return Ok(Outcome::Cancelled);
        }
        self.images.retain(|img| &img.id != id);
        self.selection.remove(id);
        self.save()?;
        info!(%id, "gallery image deleted");
        Ok(Outcome::Done(Notice::success("Image deleted!")))
    }

    /// Delete every selected image after confirmation.
    pub fn delete_selected(&mut self, confirm: &mut dyn Confirm) -> Result<Outcome, GalleryError> {
        if self.selection.is_empty() {
            return Err(GalleryError::NothingSelected);
        }
        let prompt = format!("Delete {} selected images?", self.selection.len());
        if !confirm.confirm(&prompt) {
            return Ok(Outcome::Cancelled);
        }
        let selection = std::mem::take(&mut self.selection);
        let before = self.images.len();
        self.images.retain(|img| !selection.contains(&img.id));
        self.save()?;
        info!(deleted = before - self.images.len(), "selected gallery images deleted");
        Ok(Outcome::Done(Notice::success("Selected images deleted!")))
    }
}
