//! # Shutter Admin
//!
//! Site-imagery administration for a small photography business website.
//! The operator swaps the profile photo, the logo, and four portfolio images
//! (by URL, file upload, or drop), keeps a bulk-upload gallery to pick from,
//! and every change shows up on the live pages.
//!
//! # Architecture: Store, Announce, Render
//!
//! ```text
//! operator action ──▶ upload (files → data URLs)
//!        │
//!        ▼
//! ImageSettings / Gallery ──▶ Broadcaster ──▶ durable store   (every tab, via StorageEvent)
//!                                        ├─▶ session store   (windows of this session)
//!                                        └─▶ page event      (this document)
//!                                                   │
//!                                                   ▼
//!                                      SiteRenderer applies to each Document
//! ```
//!
//! Storage is whole-value JSON records under fixed keys, so every consumer
//! sees either the old record or the new one, never a mix.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`storage`] | `KeyValueStore` trait, durable `FileStore`, transient `MemoryStore` |
//! | [`settings`] | `ImageSettings` record, its wire format, and `SettingsStore` |
//! | [`gallery`] | Uploaded image records, selection, categories, `Gallery` mutations |
//! | [`upload`] | File inputs → embedded data URLs → gallery records, with progress events |
//! | [`sync`] | `Browser`/`Tab` session model, `StorageBus`, `PageEvents`, `Broadcaster` |
//! | [`render`] | `Document` image elements, `SiteRenderer`, `LivePage`, HTML output via Maud |
//! | [`admin`] | `ImageManager`: every operator action and the admin preview |
//! | [`export`] | Settings and gallery JSON exports |
//! | [`config`] | `shutter-admin.toml` loading, merging over stock defaults, validation |
//! | [`types`] | Notices, confirmation outcomes, the `Confirm` seam |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Unfilled Slots Are Explicit
//!
//! A portfolio slot is `Option<ImageRef>`. "Not chosen yet" is `None`, written
//! as `null`; placeholder imagery is a presentation concern owned by the
//! configuration and the admin preview. Nothing ever inspects a URL to decide
//! whether a slot is free.
//!
//! ## Browser Storage as Values
//!
//! The durable store, the session store, and page events are passed around as
//! explicit values (`Arc<dyn KeyValueStore>`, `Tab`, `PageEvents`). No module
//! reaches for a global, so tests can open several tabs against one temp
//! directory and watch changes propagate.
//!
//! ## Embedded Uploads
//!
//! Uploaded files become `data:<mime>;base64,...` sources and are copied by
//! value into the settings. Deleting a gallery image never breaks the site.

pub mod admin;
pub mod config;
pub mod export;
pub mod gallery;
pub mod output;
pub mod render;
pub mod settings;
pub mod storage;
pub mod sync;
pub mod types;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;
