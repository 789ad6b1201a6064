//! Applying image settings to site pages.
//!
//! A [`Document`] is the list of image elements on one page, each carrying
//! the markers the templates put on it (alt text, classes, and the classes of
//! its container). [`SiteRenderer`] maps [`ImageSettings`] onto those
//! elements:
//!
//! - the profile photo goes to every element with a profile marker;
//! - the logo goes to every logo element, and only when a logo is set (an
//!   empty logo never blanks the template's own logo);
//! - portfolio slot `i` goes to the `i`-th portfolio element in document
//!   order, and only when that slot is filled.
//!
//! Applying is idempotent: a second pass with the same settings changes
//! nothing, and [`ApplyReport::changed`] is zero.
//!
//! [`LivePage`] keeps a document in sync. On open it applies the durable
//! record and then the session record (the session record wins), and
//! [`LivePage::pump`] applies any in-page or cross-tab updates that arrived
//! since.

use crate::config::{AdminConfig, DefaultsConfig, MarkerConfig};
use crate::settings::{
    ImageRef, ImageSettings, ImageTarget, PORTFOLIO_SLOTS, SettingsStore, Slot,
};
use crate::storage::{KeyValueStore, StorageError};
use crate::sync::{PageEvent, StorageEvent, Tab, TabUpdate};
use maud::{DOCTYPE, Markup, html};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use tracing::{debug, warn};

/// One `<img>` on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageElement {
    pub id: Option<String>,
    pub alt: String,
    pub classes: Vec<String>,
    /// Classes of the wrapping element, if the image is wrapped.
    pub container_classes: Vec<String>,
    pub src: String,
    pub visible: bool,
}

impl ImageElement {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            id: None,
            alt: String::new(),
            classes: Vec::new(),
            container_classes: Vec::new(),
            src: src.into(),
            visible: true,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = alt.into();
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn in_container(mut self, class: impl Into<String>) -> Self {
        self.container_classes.push(class.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Set the source; returns whether anything changed.
    fn set_src(&mut self, src: &ImageRef) -> bool {
        if self.src == src.as_str() {
            false
        } else {
            self.src = src.as_str().to_string();
            true
        }
    }
}

/// The image elements of one page, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub images: Vec<ImageElement>,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            images: Vec::new(),
        }
    }

    pub fn push(&mut self, element: ImageElement) {
        self.images.push(element);
    }

    pub fn element_by_id(&self, id: &str) -> Option<&ImageElement> {
        self.images.iter().find(|e| e.id.as_deref() == Some(id))
    }

    pub fn element_by_id_mut(&mut self, id: &str) -> Option<&mut ImageElement> {
        self.images.iter_mut().find(|e| e.id.as_deref() == Some(id))
    }

    /// All sources in document order.
    pub fn sources(&self) -> Vec<&str> {
        self.images.iter().map(|e| e.src.as_str()).collect()
    }
}

/// The public home page template with its placeholder imagery.
pub fn home_page(markers: &MarkerConfig, defaults: &DefaultsConfig) -> Document {
    let mut doc = Document::new("Shutter Creation | Wedding & Portrait Photography");
    doc.push(
        ImageElement::new("images/logo.png")
            .with_alt("Shutter Creation")
            .with_class(&markers.logo_class)
            .hidden(),
    );
    let profile_alt = markers
        .profile_alt
        .first()
        .cloned()
        .unwrap_or_else(|| "Profile photo".to_string());
    doc.push(
        ImageElement::new(&defaults.profile_photo)
            .with_alt(profile_alt)
            .with_class(&markers.profile_class),
    );
    for index in 0..PORTFOLIO_SLOTS {
        doc.push(
            ImageElement::new(defaults.placeholder(index))
                .with_alt(format!("Portfolio {}", index + 1))
                .in_container(&markers.portfolio_class),
        );
    }
    doc
}

/// What one [`SiteRenderer::apply`] pass touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub profile: usize,
    pub logo: usize,
    pub portfolio: usize,
    /// Elements whose source or visibility actually changed.
    pub changed: usize,
}

/// Maps settings onto marked image elements.
#[derive(Debug, Clone)]
pub struct SiteRenderer {
    markers: MarkerConfig,
}

impl SiteRenderer {
    pub fn new(markers: MarkerConfig) -> Self {
        Self { markers }
    }

    fn is_profile(&self, element: &ImageElement) -> bool {
        (!self.markers.profile_class.is_empty() && element.has_class(&self.markers.profile_class))
            || self
                .markers
                .profile_alt
                .iter()
                .any(|needle| !needle.is_empty() && element.alt.contains(needle.as_str()))
    }

    fn is_logo(&self, element: &ImageElement) -> bool {
        element.has_class(&self.markers.logo_class)
    }

    fn is_portfolio(&self, element: &ImageElement) -> bool {
        element
            .container_classes
            .iter()
            .any(|c| *c == self.markers.portfolio_class)
    }

    pub fn apply(&self, doc: &mut Document, settings: &ImageSettings) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut portfolio_index = 0;

        for element in &mut doc.images {
            if self.is_profile(element) {
                report.profile += 1;
                report.changed += usize::from(element.set_src(&settings.profile_photo));
            }
            if self.is_logo(element) {
                if let Some(logo) = &settings.logo {
                    report.logo += 1;
                    let changed = element.set_src(logo) | !element.visible;
                    element.visible = true;
                    report.changed += usize::from(changed);
                }
            }
            if self.is_portfolio(element) {
                if let Some(Some(src)) = settings.portfolio.get(portfolio_index) {
                    report.portfolio += 1;
                    report.changed += usize::from(element.set_src(src));
                }
                portfolio_index += 1;
            }
        }
        report
    }

    /// Set one target's elements to `src`, regardless of the rest of the settings.
    pub fn apply_target(&self, doc: &mut Document, target: ImageTarget, src: &ImageRef) -> usize {
        let mut changed = 0;
        let mut portfolio_index = 0;
        for element in &mut doc.images {
            let hit = match target {
                ImageTarget::Profile => self.is_profile(element),
                ImageTarget::Logo => self.is_logo(element),
                ImageTarget::Portfolio(slot) => {
                    let hit = self.is_portfolio(element) && portfolio_index == slot.index();
                    portfolio_index += usize::from(self.is_portfolio(element));
                    hit
                }
            };
            if hit {
                let mut element_changed = element.set_src(src);
                if target == ImageTarget::Logo {
                    element_changed |= !element.visible;
                    element.visible = true;
                }
                changed += usize::from(element_changed);
            }
        }
        changed
    }
}

/// A site page kept in sync with the stored settings.
pub struct LivePage {
    document: Document,
    renderer: SiteRenderer,
    store: SettingsStore,
    updates: Receiver<TabUpdate>,
}

impl LivePage {
    /// Open `document` in `tab`: subscribe to updates, then apply what is stored.
    pub fn open(tab: &Tab, document: Document, config: &AdminConfig) -> Self {
        let store = SettingsStore::new(
            tab.durable(),
            &config.storage.settings_key,
            config.defaults.settings(),
        );
        let mut page = Self {
            document,
            renderer: SiteRenderer::new(config.markers.clone()),
            store,
            updates: tab.subscribe_updates(),
        };
        page.load_saved(&tab.durable(), &config.storage.settings_key);
        page.load_saved(&tab.session(), &config.storage.session_key);
        page
    }

    fn load_saved(&mut self, store: &Arc<dyn KeyValueStore>, key: &str) {
        match store.get(key) {
            Ok(Some(json)) => self.apply_json(key, &json),
            Ok(None) => debug!(key, "nothing stored"),
            Err(e) => warn!(key, error = %e, "could not read saved images"),
        }
    }

    fn apply_json(&mut self, key: &str, json: &str) {
        match self.store.parse(json) {
            Ok(settings) => {
                self.renderer.apply(&mut self.document, &settings);
            }
            Err(e) => warn!(key, error = %e, "ignoring malformed image settings"),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Apply every update received since the last pump, in arrival order.
    /// Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.updates.try_recv() {
            applied += usize::from(match update {
                TabUpdate::Page(PageEvent::ImagesUpdated(settings)) => {
                    self.renderer.apply(&mut self.document, &settings);
                    true
                }
                TabUpdate::Storage(event) => self.apply_storage_event(event),
            });
        }
        applied
    }

    fn apply_storage_event(&mut self, event: StorageEvent) -> bool {
        if event.key != self.store.key() {
            return false;
        }
        match event.new_value {
            Some(json) => {
                let key = self.store.key().to_string();
                self.apply_json(&key, &json);
                true
            }
            None => {
                debug!("image settings removed in another tab");
                false
            }
        }
    }

    /// Change one image on this page and record it in the durable settings.
    ///
    /// Reads the stored record, replaces the one field, and writes the whole
    /// record back, so other tabs pick the change up.
    pub fn change_image(&mut self, target: ImageTarget, src: &str) -> Result<usize, StorageError> {
        let Some(src) = ImageRef::new(src) else {
            return Ok(0);
        };
        let changed = self.renderer.apply_target(&mut self.document, target, &src);
        let mut settings = self.store.load()?;
        settings.set(target, src);
        self.store.save(&settings)?;
        Ok(changed)
    }

    pub fn change_profile_photo(&mut self, src: &str) -> Result<usize, StorageError> {
        self.change_image(ImageTarget::Profile, src)
    }

    pub fn change_logo(&mut self, src: &str) -> Result<usize, StorageError> {
        self.change_image(ImageTarget::Logo, src)
    }

    pub fn change_portfolio_image(
        &mut self,
        slot: Slot,
        src: &str,
    ) -> Result<usize, StorageError> {
        self.change_image(ImageTarget::Portfolio(slot), src)
    }

    pub fn to_html(&self) -> Markup {
        render_html(&self.document)
    }
}

fn image_tag(element: &ImageElement) -> Markup {
    let classes = (!element.classes.is_empty()).then(|| element.classes.join(" "));
    let style = (!element.visible).then_some("display: none");
    html! {
        img id=[element.id.as_deref()] class=[classes] src=(element.src) alt=(element.alt) style=[style];
    }
}

/// Serialize a document as a standalone HTML page.
pub fn render_html(doc: &Document) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (doc.title) }
            }
            body {
                @for element in &doc.images {
                    @if element.container_classes.is_empty() {
                        (image_tag(element))
                    } @else {
                        div class=(element.container_classes.join(" ")) {
                            (image_tag(element))
                        }
                    }
                }
            }
        }
    }
}
