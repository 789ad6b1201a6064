//! Operator actions on the site imagery.
//!
//! [`ImageManager`] owns the working copy of [`ImageSettings`] and the admin
//! preview [`Document`]. Every successful change follows the same path:
//!
//! ```text
//! input (URL / file / drop / gallery image)
//!   → validate           (nothing changes on failure)
//!   → Broadcaster::publish  (durable store → session → page event)
//!   → commit working copy + refresh the affected preview element
//! ```
//!
//! The working copy is only replaced after the durable write succeeds, so a
//! storage failure leaves both the store and the manager as they were.
//!
//! ## Preview element ids
//!
//! | Target | Element id |
//! |--------|------------|
//! | profile photo | `profile-preview` |
//! | logo | `logo-preview` |
//! | portfolio slot N | `portfolio-N` |

use crate::config::DefaultsConfig;
use crate::gallery::{Gallery, GalleryError, ImageId};
use crate::render::{Document, ImageElement};
use crate::settings::{ImageRef, ImageSettings, ImageTarget, PORTFOLIO_SLOTS, Slot};
use crate::storage::StorageError;
use crate::sync::Broadcaster;
use crate::types::{Confirm, Notice, Outcome};
use crate::upload::{FileInput, UploadError, first_dropped_image};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),
    #[error("Gallery error: {0}")]
    Gallery(#[from] GalleryError),
}

/// Id of the admin preview element showing `target`.
pub fn preview_id(target: ImageTarget) -> String {
    match target {
        ImageTarget::Profile => "profile-preview".to_string(),
        ImageTarget::Logo => "logo-preview".to_string(),
        ImageTarget::Portfolio(slot) => format!("portfolio-{}", slot.number()),
    }
}

fn updated_message(target: ImageTarget) -> String {
    match target {
        ImageTarget::Profile => "Profile photo updated!".to_string(),
        ImageTarget::Logo => "Logo updated!".to_string(),
        ImageTarget::Portfolio(slot) => {
            format!("Portfolio image {} updated successfully!", slot.number())
        }
    }
}

/// The admin page: current settings, preview, and every operator action.
pub struct ImageManager {
    broadcaster: Broadcaster,
    settings: ImageSettings,
    preview: Document,
    placeholders: Vec<String>,
}

impl ImageManager {
    /// Load the current settings and build the preview from them.
    pub fn new(broadcaster: Broadcaster, defaults: &DefaultsConfig) -> Result<Self, AdminError> {
        let settings = broadcaster.store().load()?;
        let placeholders = (0..PORTFOLIO_SLOTS)
            .map(|i| defaults.placeholder(i).to_string())
            .collect();
        let mut manager = Self {
            broadcaster,
            settings,
            preview: admin_preview(),
            placeholders,
        };
        manager.refresh_preview();
        Ok(manager)
    }

    pub fn settings(&self) -> &ImageSettings {
        &self.settings
    }

    pub fn preview(&self) -> &Document {
        &self.preview
    }

    fn refresh_preview(&mut self) {
        self.refresh_target(ImageTarget::Profile);
        self.refresh_target(ImageTarget::Logo);
        for slot in Slot::all() {
            self.refresh_target(ImageTarget::Portfolio(slot));
        }
    }

    /// Show the current value of `target`; unfilled slots show their placeholder.
    fn refresh_target(&mut self, target: ImageTarget) {
        let src = match (self.settings.get(target), target) {
            (Some(src), _) => Some(src.as_str().to_string()),
            (None, ImageTarget::Portfolio(slot)) => Some(self.placeholders[slot.index()].clone()),
            (None, _) => None,
        };
        if let Some(element) = self.preview.element_by_id_mut(&preview_id(target)) {
            match src {
                Some(src) => {
                    element.src = src;
                    element.visible = true;
                }
                None => element.visible = false,
            }
        }
    }

    /// Publish `next`, then adopt it as the working copy.
    fn commit(&mut self, next: ImageSettings) -> Result<(), AdminError> {
        self.broadcaster.publish(&next)?;
        self.settings = next;
        Ok(())
    }

    fn set_image(&mut self, target: ImageTarget, src: ImageRef) -> Result<Notice, AdminError> {
        let mut next = self.settings.clone();
        next.set(target, src);
        self.commit(next)?;
        self.refresh_target(target);
        info!(%target, "site image updated");
        Ok(Notice::success(updated_message(target)))
    }

    fn set_from_url(&mut self, target: ImageTarget, url: &str) -> Result<Notice, AdminError> {
        let src = ImageRef::new(url)
            .ok_or_else(|| AdminError::InvalidInput("Please enter an image URL.".to_string()))?;
        self.set_image(target, src)
    }

    fn set_from_file(&mut self, target: ImageTarget, file: &FileInput) -> Result<Notice, AdminError> {
        if !file.is_image() {
            return Err(UploadError::NotAnImage(file.name.clone()).into());
        }
        let src = file.read_as_data_url()?;
        self.set_image(target, src)
    }

    pub fn update_profile_photo(&mut self, url: &str) -> Result<Notice, AdminError> {
        self.set_from_url(ImageTarget::Profile, url)
    }

    pub fn update_logo(&mut self, url: &str) -> Result<Notice, AdminError> {
        self.set_from_url(ImageTarget::Logo, url)
    }

    /// Set portfolio slot `number` (1-based) from a URL.
    pub fn update_portfolio_image(&mut self, number: usize, url: &str) -> Result<Notice, AdminError> {
        let slot = Slot::new(number).ok_or_else(|| {
            AdminError::InvalidInput(format!(
                "Portfolio slot must be between 1 and {PORTFOLIO_SLOTS}, got {number}."
            ))
        })?;
        self.set_from_url(ImageTarget::Portfolio(slot), url)
    }

    pub fn upload_profile_file(&mut self, file: &FileInput) -> Result<Notice, AdminError> {
        self.set_from_file(ImageTarget::Profile, file)
    }

    pub fn upload_logo_file(&mut self, file: &FileInput) -> Result<Notice, AdminError> {
        self.set_from_file(ImageTarget::Logo, file)
    }

    /// Files dropped on a preview: the first one is used if it is an image.
    pub fn drop_on(&mut self, target: ImageTarget, files: Vec<FileInput>) -> Result<Notice, AdminError> {
        let file = first_dropped_image(files)?;
        self.set_from_file(target, &file)
    }

    /// Copy a gallery image into the profile photo.
    pub fn use_as_profile(&mut self, gallery: &Gallery, id: &ImageId) -> Result<Notice, AdminError> {
        let src = gallery.get(id)?.src.clone();
        self.set_image(ImageTarget::Profile, src)
    }

    /// Copy a gallery image into the lowest unfilled portfolio slot.
    ///
    /// With every slot filled nothing changes and a warning is returned.
    pub fn add_to_portfolio(&mut self, gallery: &Gallery, id: &ImageId) -> Result<Notice, AdminError> {
        let src = gallery.get(id)?.src.clone();
        let Some(slot) = self.settings.first_unfilled_slot() else {
            return Ok(Notice::warning("All portfolio slots are full!"));
        };
        self.set_image(ImageTarget::Portfolio(slot), src)?;
        Ok(Notice::success(format!("Added to portfolio slot {slot}!")))
    }

    /// Fill slots 1.. with the selected images, in selection order.
    ///
    /// Existing slot contents are overwritten. Selections beyond the slot
    /// count are ignored. The selection is cleared once the change is saved.
    pub fn add_selected_to_portfolio(&mut self, gallery: &mut Gallery) -> Result<Notice, AdminError> {
        if gallery.selection().is_empty() {
            return Err(GalleryError::NothingSelected.into());
        }
        let mut next = self.settings.clone();
        let mut count = 0;
        for (slot, id) in Slot::all().zip(gallery.selection().iter()) {
            next.set(ImageTarget::Portfolio(slot), gallery.get(id)?.src.clone());
            count += 1;
        }
        self.commit(next)?;
        gallery.take_selection();
        for slot in Slot::all().take(count) {
            self.refresh_target(ImageTarget::Portfolio(slot));
        }
        info!(count, "selected images assigned to portfolio");
        Ok(Notice::success(format!("Added {count} images to portfolio!")))
    }

    /// Re-publish the current settings everywhere.
    pub fn save_all(&mut self) -> Result<Notice, AdminError> {
        self.broadcaster.publish(&self.settings)?;
        Ok(Notice::success("All changes saved!"))
    }

    /// Drop the stored record and return to the defaults.
    ///
    /// Nothing is announced; open pages keep their images until reloaded.
    pub fn reset_to_defaults(&mut self, confirm: &mut dyn Confirm) -> Result<Outcome, AdminError> {
        if !confirm.confirm("Are you sure you want to reset all images to defaults?") {
            return Ok(Outcome::Cancelled);
        }
        let store = self.broadcaster.store();
        store.reset()?;
        self.broadcaster.clear_session();
        self.settings = store.load()?;
        self.refresh_preview();
        info!("image settings reset to defaults");
        Ok(Outcome::Done(Notice::info("All images reset to defaults.")))
    }
}

/// The admin page's preview elements, before any settings are shown.
pub fn admin_preview() -> Document {
    let mut doc = Document::new("Shutter Creation | Image Manager");
    doc.push(
        ImageElement::new("")
            .with_id(preview_id(ImageTarget::Profile))
            .with_alt("Current profile photo"),
    );
    doc.push(
        ImageElement::new("")
            .with_id(preview_id(ImageTarget::Logo))
            .with_alt("Current logo")
            .hidden(),
    );
    for slot in Slot::all() {
        doc.push(
            ImageElement::new("")
                .with_id(preview_id(ImageTarget::Portfolio(slot)))
                .with_alt(format!("Portfolio {slot}")),
        );
    }
    doc
}
