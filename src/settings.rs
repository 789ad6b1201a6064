//! The site's image configuration and its durable store.
//!
//! [`ImageSettings`] is a singleton record: one profile photo, an optional
//! logo, and exactly [`PORTFOLIO_SLOTS`] portfolio slots. It is stored as a
//! single JSON value under one key and always read and written whole.
//!
//! ## Wire format
//!
//! ```json
//! {
//!   "profilePhoto": "https://images.unsplash.com/photo-1507003211169-...",
//!   "logo": "",
//!   "portfolio": ["data:image/png;base64,iVBOR...", null, null, null]
//! }
//! ```
//!
//! An absent logo is written as `""`. An unfilled portfolio slot is written
//! as `null`; `""` is also read as unfilled. Unfilled slots are explicit
//! `None` values in memory, never recognised by inspecting the URL.

use crate::storage::{KeyValueStore, StorageError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Number of portfolio positions on the site.
pub const PORTFOLIO_SLOTS: usize = 4;

/// Profile photo used until the operator picks one.
pub const DEFAULT_PROFILE_PHOTO: &str = "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?ixlib=rb-4.0.3&auto=format&fit=crop&w=500&q=80";

/// Source of a site image: a remote URL or an embedded `data:` URL.
///
/// Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageRef(String);

impl ImageRef {
    /// Wrap a source string, rejecting empty (or whitespace-only) input.
    pub fn new(src: impl Into<String>) -> Option<Self> {
        let src = src.into();
        let trimmed = src.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == src.len() {
            Some(Self(src))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Embedded source for a base64 payload.
    pub fn data_url(mime_type: &str, payload: &str) -> Self {
        Self(format!("data:{mime_type};base64,{payload}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for self-contained `data:` sources.
    pub fn is_embedded(&self) -> bool {
        self.0.starts_with("data:")
    }

    /// Media type of an embedded source (`image/png` for `data:image/png;base64,...`).
    pub fn media_type(&self) -> Option<&str> {
        let rest = self.0.strip_prefix("data:")?;
        let end = rest.find([';', ','])?;
        Some(&rest[..end])
    }

    /// Decoded byte length of an embedded base64 payload.
    pub fn embedded_len(&self) -> Option<usize> {
        if !self.is_embedded() {
            return None;
        }
        let (_, payload) = self.0.split_once(";base64,")?;
        let padding = payload.bytes().rev().take_while(|b| *b == b'=').count();
        (payload.len() / 4 * 3).checked_sub(padding)
    }
}

impl TryFrom<String> for ImageRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "image source must not be empty".to_string())
    }
}

impl From<ImageRef> for String {
    fn from(value: ImageRef) -> Self {
        value.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A portfolio position, numbered 1..=4 for operators and indexed 0..4 internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(usize);

impl Slot {
    /// Slot from its 1-based number as shown to the operator.
    pub fn new(number: usize) -> Option<Self> {
        (1..=PORTFOLIO_SLOTS)
            .contains(&number)
            .then(|| Self(number - 1))
    }

    pub fn from_index(index: usize) -> Option<Self> {
        (index < PORTFOLIO_SLOTS).then_some(Self(index))
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn number(self) -> usize {
        self.0 + 1
    }

    pub fn all() -> impl Iterator<Item = Slot> {
        (0..PORTFOLIO_SLOTS).map(Slot)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Which site image an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTarget {
    Profile,
    Logo,
    Portfolio(Slot),
}

impl fmt::Display for ImageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageTarget::Profile => f.write_str("profile photo"),
            ImageTarget::Logo => f.write_str("logo"),
            ImageTarget::Portfolio(slot) => write!(f, "portfolio image {slot}"),
        }
    }
}

/// The site's current image configuration.
///
/// Deserializing fills a missing profile photo with [`DEFAULT_PROFILE_PHOTO`];
/// [`SettingsStore`] fills it from its own defaults instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredSettings")]
pub struct ImageSettings {
    pub profile_photo: ImageRef,
    #[serde(serialize_with = "logo_format::serialize")]
    pub logo: Option<ImageRef>,
    #[serde(serialize_with = "portfolio_format::serialize")]
    pub portfolio: [Option<ImageRef>; PORTFOLIO_SLOTS],
}

/// A settings record as read back from storage; any field may be missing.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSettings {
    #[serde(default)]
    profile_photo: Option<ImageRef>,
    #[serde(default, with = "logo_format")]
    logo: Option<ImageRef>,
    #[serde(default, with = "portfolio_format")]
    portfolio: [Option<ImageRef>; PORTFOLIO_SLOTS],
}

impl From<StoredSettings> for ImageSettings {
    fn from(stored: StoredSettings) -> Self {
        stored.or_defaults(&ImageSettings::default())
    }
}

impl StoredSettings {
    fn or_defaults(self, defaults: &ImageSettings) -> ImageSettings {
        ImageSettings {
            profile_photo: self
                .profile_photo
                .unwrap_or_else(|| defaults.profile_photo.clone()),
            logo: self.logo,
            portfolio: self.portfolio,
        }
    }
}

fn default_profile_photo() -> ImageRef {
    ImageRef(DEFAULT_PROFILE_PHOTO.to_string())
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self::with_profile_photo(default_profile_photo())
    }
}

impl ImageSettings {
    /// Default record with a specific placeholder profile photo.
    pub fn with_profile_photo(profile_photo: ImageRef) -> Self {
        Self {
            profile_photo,
            logo: None,
            portfolio: Default::default(),
        }
    }

    /// Lowest-numbered slot that has not been filled yet.
    pub fn first_unfilled_slot(&self) -> Option<Slot> {
        Slot::all().find(|slot| self.portfolio[slot.index()].is_none())
    }

    pub fn slot(&self, slot: Slot) -> Option<&ImageRef> {
        self.portfolio[slot.index()].as_ref()
    }

    /// Current value for a target, if any.
    pub fn get(&self, target: ImageTarget) -> Option<&ImageRef> {
        match target {
            ImageTarget::Profile => Some(&self.profile_photo),
            ImageTarget::Logo => self.logo.as_ref(),
            ImageTarget::Portfolio(slot) => self.slot(slot),
        }
    }

    pub fn set(&mut self, target: ImageTarget, src: ImageRef) {
        match target {
            ImageTarget::Profile => self.profile_photo = src,
            ImageTarget::Logo => self.logo = Some(src),
            ImageTarget::Portfolio(slot) => self.portfolio[slot.index()] = Some(src),
        }
    }
}

/// Parse a stored settings record, filling a missing profile photo with the stock default.
pub fn parse_settings(json: &str) -> Result<ImageSettings, serde_json::Error> {
    serde_json::from_str(json)
}

/// Parse a stored settings record, filling a missing profile photo from `defaults`.
pub fn parse_settings_with(
    json: &str,
    defaults: &ImageSettings,
) -> Result<ImageSettings, serde_json::Error> {
    serde_json::from_str::<StoredSettings>(json).map(|stored| stored.or_defaults(defaults))
}

/// Serialize a settings record for storage (compact JSON).
pub fn settings_to_json(settings: &ImageSettings) -> Result<String, serde_json::Error> {
    serde_json::to_string(settings)
}

mod logo_format {
    use super::*;

    pub fn serialize<S: Serializer>(logo: &Option<ImageRef>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(logo.as_ref().map(ImageRef::as_str).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ImageRef>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(raw.and_then(ImageRef::new))
    }
}

mod portfolio_format {
    use super::*;
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(
        slots: &[Option<ImageRef>; PORTFOLIO_SLOTS],
        s: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(PORTFOLIO_SLOTS))?;
        for slot in slots {
            seq.serialize_element(&slot.as_ref().map(ImageRef::as_str))?;
        }
        seq.end()
    }

    /// Lenient about length: extra entries are dropped, missing ones are unfilled.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<[Option<ImageRef>; PORTFOLIO_SLOTS], D::Error> {
        let raw: Option<Vec<Option<String>>> = Option::deserialize(d)?;
        let mut slots: [Option<ImageRef>; PORTFOLIO_SLOTS] = Default::default();
        for (slot, value) in slots.iter_mut().zip(raw.unwrap_or_default()) {
            *slot = value.and_then(ImageRef::new);
        }
        Ok(slots)
    }
}

/// Durable home of the [`ImageSettings`] record.
#[derive(Clone)]
pub struct SettingsStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    defaults: ImageSettings,
}

impl SettingsStore {
    pub fn new(
        backend: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        defaults: ImageSettings,
    ) -> Self {
        Self {
            backend,
            key: key.into(),
            defaults,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn defaults(&self) -> &ImageSettings {
        &self.defaults
    }

    /// Parse a record for this store; missing fields come from its defaults.
    pub fn parse(&self, json: &str) -> Result<ImageSettings, serde_json::Error> {
        parse_settings_with(json, &self.defaults)
    }

    /// Current record, or the defaults if nothing is stored.
    ///
    /// Defaults are not written back; persistence happens on the first save.
    /// A stored record that fails to parse also yields the defaults.
    pub fn load(&self) -> Result<ImageSettings, StorageError> {
        let Some(json) = self.backend.get(&self.key)? else {
            debug!(key = %self.key, "no stored settings, using defaults");
            return Ok(self.defaults.clone());
        };
        match self.parse(&json) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!(key = %self.key, error = %e, "stored settings are malformed, using defaults");
                Ok(self.defaults.clone())
            }
        }
    }

    /// Replace the stored record with `settings`.
    pub fn save(&self, settings: &ImageSettings) -> Result<(), StorageError> {
        let json = settings_to_json(settings)?;
        self.backend.set(&self.key, &json)
    }

    /// Delete the stored record. Callers reload afterwards.
    pub fn reset(&self) -> Result<(), StorageError> {
        self.backend.remove(&self.key)
    }
}

impl fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn img(s: &str) -> ImageRef {
        ImageRef::new(s).unwrap()
    }

    fn store() -> (Arc<MemoryStore>, SettingsStore) {
        let backend = Arc::new(MemoryStore::new());
        let store = SettingsStore::new(
            backend.clone(),
            "shutterCreationImages",
            ImageSettings::default(),
        );
        (backend, store)
    }

    // =========================================================================
    // ImageRef
    // =========================================================================

    #[test]
    fn image_ref_rejects_empty() {
        assert!(ImageRef::new("").is_none());
        assert!(ImageRef::new("   ").is_none());
    }

    #[test]
    fn image_ref_trims_whitespace() {
        assert_eq!(img("  https://a/b.jpg ").as_str(), "https://a/b.jpg");
    }

    #[test]
    fn image_ref_embedded_detection() {
        assert!(img("data:image/png;base64,AAAA").is_embedded());
        assert!(!img("https://example.com/a.png").is_embedded());
    }

    #[test]
    fn image_ref_media_type() {
        assert_eq!(
            img("data:image/jpeg;base64,AAAA").media_type(),
            Some("image/jpeg")
        );
        assert_eq!(img("https://example.com/a.png").media_type(), None);
    }

    #[test]
    fn image_ref_embedded_len_accounts_for_padding() {
        // "abcd" → YWJjZA==
        assert_eq!(img("data:image/png;base64,YWJjZA==").embedded_len(), Some(4));
        // "abc" → YWJj
        assert_eq!(img("data:image/png;base64,YWJj").embedded_len(), Some(3));
        assert_eq!(img("https://x/y.png").embedded_len(), None);
    }

    #[test]
    fn image_ref_embedded_len_of_truncated_payload_is_unknown() {
        assert_eq!(img("data:image/png;base64,=").embedded_len(), None);
        assert_eq!(img("data:image/png;base64,==").embedded_len(), None);
        assert_eq!(img("data:image/png;base64,").embedded_len(), Some(0));
    }

    // =========================================================================
    // Slot / ImageSettings
    // =========================================================================

    #[test]
    fn slot_numbers_are_one_based() {
        assert!(Slot::new(0).is_none());
        assert_eq!(Slot::new(1).unwrap().index(), 0);
        assert_eq!(Slot::new(4).unwrap().index(), 3);
        assert!(Slot::new(5).is_none());
        assert_eq!(Slot::from_index(2).unwrap().number(), 3);
        assert_eq!(Slot::all().count(), PORTFOLIO_SLOTS);
    }

    #[test]
    fn default_settings_shape() {
        let s = ImageSettings::default();
        assert_eq!(s.profile_photo.as_str(), DEFAULT_PROFILE_PHOTO);
        assert_eq!(s.logo, None);
        assert!(s.portfolio.iter().all(Option::is_none));
        assert_eq!(s.portfolio.len(), 4);
    }

    #[test]
    fn first_unfilled_slot_is_lowest_none() {
        let mut s = ImageSettings::default();
        assert_eq!(s.first_unfilled_slot(), Slot::new(1));
        s.set(ImageTarget::Portfolio(Slot::new(1).unwrap()), img("a"));
        s.set(ImageTarget::Portfolio(Slot::new(3).unwrap()), img("c"));
        assert_eq!(s.first_unfilled_slot(), Slot::new(2));
        s.set(ImageTarget::Portfolio(Slot::new(2).unwrap()), img("b"));
        s.set(ImageTarget::Portfolio(Slot::new(4).unwrap()), img("d"));
        assert_eq!(s.first_unfilled_slot(), None);
    }

    #[test]
    fn set_and_get_targets() {
        let mut s = ImageSettings::default();
        s.set(ImageTarget::Logo, img("logo.png"));
        s.set(ImageTarget::Profile, img("me.jpg"));
        assert_eq!(s.get(ImageTarget::Logo).unwrap().as_str(), "logo.png");
        assert_eq!(s.get(ImageTarget::Profile).unwrap().as_str(), "me.jpg");
        assert!(s.get(ImageTarget::Portfolio(Slot::new(2).unwrap())).is_none());
    }

    // =========================================================================
    // Wire format
    // =========================================================================

    #[test]
    fn serializes_absent_logo_as_empty_string_and_unfilled_as_null() {
        let json = settings_to_json(&ImageSettings::with_profile_photo(img("p.jpg"))).unwrap();
        assert_eq!(
            json,
            r#"{"profilePhoto":"p.jpg","logo":"","portfolio":[null,null,null,null]}"#
        );
    }

    #[test]
    fn parses_legacy_record_with_empty_strings() {
        let s = parse_settings(
            r#"{"profilePhoto":"p.jpg","logo":"","portfolio":["a.jpg","","c.jpg",null]}"#,
        )
        .unwrap();
        assert_eq!(s.logo, None);
        assert_eq!(s.portfolio[0].as_ref().unwrap().as_str(), "a.jpg");
        assert!(s.portfolio[1].is_none());
        assert_eq!(s.portfolio[2].as_ref().unwrap().as_str(), "c.jpg");
        assert!(s.portfolio[3].is_none());
    }

    #[test]
    fn parses_partial_record_with_defaults() {
        let s = parse_settings(r#"{"logo":"l.png"}"#).unwrap();
        assert_eq!(s.profile_photo.as_str(), DEFAULT_PROFILE_PHOTO);
        assert_eq!(s.logo.unwrap().as_str(), "l.png");
        assert!(s.portfolio.iter().all(Option::is_none));
    }

    #[test]
    fn portfolio_length_is_always_four() {
        let short = parse_settings(r#"{"portfolio":["a"]}"#).unwrap();
        assert_eq!(short.portfolio.len(), 4);
        assert!(short.portfolio[1..].iter().all(Option::is_none));

        let long = parse_settings(r#"{"portfolio":["a","b","c","d","e","f"]}"#).unwrap();
        assert_eq!(long.portfolio[3].as_ref().unwrap().as_str(), "d");
    }

    #[test]
    fn empty_profile_photo_is_rejected() {
        assert!(parse_settings(r#"{"profilePhoto":""}"#).is_err());
    }

    // =========================================================================
    // SettingsStore
    // =========================================================================

    #[test]
    fn load_without_record_returns_defaults_without_persisting() {
        let (backend, store) = store();
        assert_eq!(store.load().unwrap(), ImageSettings::default());
        assert!(backend.is_empty());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let (_, store) = store();
        let mut s = store.load().unwrap();
        s.set(ImageTarget::Profile, img("data:image/png;base64,iVBORw0KGgo="));
        s.set(ImageTarget::Logo, img("https://example.com/logo.svg"));
        s.set(ImageTarget::Portfolio(Slot::new(3).unwrap()), img("https://x/3.jpg"));
        store.save(&s).unwrap();
        assert_eq!(store.load().unwrap(), s);
    }

    #[test]
    fn reset_restores_defaults_not_last_saved() {
        let (backend, store) = store();
        let mut s = ImageSettings::default();
        s.set(ImageTarget::Profile, img("saved.jpg"));
        store.save(&s).unwrap();
        store.reset().unwrap();
        assert!(backend.get("shutterCreationImages").unwrap().is_none());
        assert_eq!(store.load().unwrap(), ImageSettings::default());
    }

    #[test]
    fn malformed_record_falls_back_to_defaults() {
        let (backend, store) = store();
        backend.set("shutterCreationImages", "{not json").unwrap();
        assert_eq!(store.load().unwrap(), ImageSettings::default());
    }

    #[test]
    fn custom_defaults_are_used() {
        let backend = Arc::new(MemoryStore::new());
        let defaults = ImageSettings::with_profile_photo(img("https://studio/placeholder.jpg"));
        let store = SettingsStore::new(backend, "k", defaults.clone());
        assert_eq!(store.load().unwrap(), defaults);
        assert_eq!(store.defaults(), &defaults);
        assert_eq!(store.key(), "k");
    }

    #[test]
    fn missing_profile_photo_comes_from_store_defaults() {
        let backend = Arc::new(MemoryStore::new());
        let defaults = ImageSettings::with_profile_photo(img("https://studio/placeholder.jpg"));
        let store = SettingsStore::new(backend.clone(), "k", defaults);
        backend.set("k", r#"{"logo":"l.png"}"#).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.profile_photo.as_str(), "https://studio/placeholder.jpg");
        assert_eq!(loaded.logo.unwrap().as_str(), "l.png");
        assert_eq!(
            store.parse(r#"{"profilePhoto":null}"#).unwrap().profile_photo.as_str(),
            "https://studio/placeholder.jpg"
        );
    }
}
