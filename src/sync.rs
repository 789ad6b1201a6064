//! Propagating settings changes to every place they must appear.
//!
//! The browser environment the site runs in is modelled with three pieces:
//!
//! | Piece | Browser equivalent | Reach |
//! |-------|--------------------|-------|
//! | [`Browser`] durable store + [`StorageBus`] | `localStorage` + `storage` event | every tab of the origin |
//! | [`Tab`] session store | `sessionStorage` | the tab and windows opened from it |
//! | [`PageEvents`] | `window.dispatchEvent(new CustomEvent(..))` | listeners in one document |
//!
//! After every settings mutation the [`Broadcaster`] runs three steps, in order,
//! synchronously:
//!
//! 1. persist the whole record in the durable store (errors propagate);
//! 2. copy it to the session store under the session key;
//! 3. dispatch [`PageEvent::ImagesUpdated`] with the full record.
//!
//! Steps 2 and 3 are best-effort: a failure is logged and swallowed, because
//! the durable record is the source of truth and is picked up on next load.
//!
//! Other tabs never see steps 2 or 3. They learn about the change from the
//! [`StorageEvent`] the durable store publishes on the bus, which (as in a
//! browser) is delivered to every tab except the one that wrote, and only
//! when the stored value actually changed.
//!
//! A document that needs both kinds of notification takes them from
//! [`Tab::subscribe_updates`], a single queue that keeps the order in which
//! they were delivered.

use crate::settings::{ImageSettings, SettingsStore, settings_to_json};
use crate::storage::{KeyValueStore, MemoryStore, StorageError};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Identifies one tab or window.
pub type TabId = u64;

/// A durable-store change as seen by another tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    /// New value, or `None` if the key was removed.
    pub new_value: Option<String>,
}

/// Receives events until it reports that its consumer is gone.
type Listener<E> = Box<dyn Fn(E) -> bool + Send>;

fn forward_to<E, T>(tx: Sender<T>, wrap: fn(E) -> T) -> Listener<E>
where
    E: 'static,
    T: Send + 'static,
{
    Box::new(move |event| tx.send(wrap(event)).is_ok())
}

/// Cross-tab change notifications for one origin's durable store.
#[derive(Default)]
pub struct StorageBus {
    subscribers: Mutex<Vec<(TabId, Listener<StorageEvent>)>>,
}

impl StorageBus {
    /// Receive changes made by any tab other than `tab`.
    pub fn subscribe(&self, tab: TabId) -> Receiver<StorageEvent> {
        let (tx, rx) = mpsc::channel();
        self.listen(tab, forward_to(tx, |event| event));
        rx
    }

    fn listen(&self, tab: TabId, listener: Listener<StorageEvent>) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((tab, listener));
    }

    /// Deliver `event` to every subscriber except `origin`.
    ///
    /// Subscribers whose receiver is gone are dropped. Returns the number of
    /// deliveries.
    pub fn notify(&self, origin: TabId, event: StorageEvent) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        subscribers.retain(|(tab, listener)| {
            if *tab == origin {
                return true;
            }
            let alive = listener(event.clone());
            delivered += usize::from(alive);
            alive
        });
        delivered
    }
}

/// The durable store as one tab sees it: writes notify the other tabs.
struct TabStorage {
    backend: Arc<dyn KeyValueStore>,
    bus: Arc<StorageBus>,
    tab: TabId,
}

impl KeyValueStore for TabStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.backend.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let previous = self.backend.get(key)?;
        self.backend.set(key, value)?;
        if previous.as_deref() != Some(value) {
            self.bus.notify(
                self.tab,
                StorageEvent {
                    key: key.to_string(),
                    new_value: Some(value.to_string()),
                },
            );
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let previous = self.backend.get(key)?;
        self.backend.remove(key)?;
        if previous.is_some() {
            self.bus.notify(
                self.tab,
                StorageEvent {
                    key: key.to_string(),
                    new_value: None,
                },
            );
        }
        Ok(())
    }
}

/// Events dispatched within one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    ImagesUpdated(ImageSettings),
}

/// Listener registry for one document.
#[derive(Clone, Default)]
pub struct PageEvents {
    listeners: Arc<Mutex<Vec<Listener<PageEvent>>>>,
}

impl PageEvents {
    pub fn subscribe(&self) -> Receiver<PageEvent> {
        let (tx, rx) = mpsc::channel();
        self.listen(forward_to(tx, |event| event));
        rx
    }

    fn listen(&self, listener: Listener<PageEvent>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Deliver `event` to every live listener; returns how many received it.
    pub fn dispatch(&self, event: PageEvent) -> usize {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|listener| listener(event.clone()));
        listeners.len()
    }
}

/// Anything a document hears about, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabUpdate {
    Page(PageEvent),
    Storage(StorageEvent),
}

impl fmt::Debug for PageEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("PageEvents").field("listeners", &count).finish()
    }
}

/// One site origin: a shared durable store plus its change bus.
#[derive(Clone)]
pub struct Browser {
    durable: Arc<dyn KeyValueStore>,
    bus: Arc<StorageBus>,
    next_tab: Arc<AtomicU64>,
}

impl Browser {
    pub fn new(durable: Arc<dyn KeyValueStore>) -> Self {
        Self {
            durable,
            bus: Arc::new(StorageBus::default()),
            next_tab: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Open a tab with a fresh browsing session.
    pub fn open_tab(&self) -> Tab {
        self.open_tab_with_session(Arc::new(MemoryStore::new()))
    }

    /// Open a tab whose session store is `session`.
    pub fn open_tab_with_session(&self, session: Arc<dyn KeyValueStore>) -> Tab {
        let id = self.next_tab.fetch_add(1, Ordering::Relaxed);
        debug!(tab = id, "tab opened");
        Tab {
            id,
            browser: self.clone(),
            durable: Arc::new(TabStorage {
                backend: self.durable.clone(),
                bus: self.bus.clone(),
                tab: id,
            }),
            session,
            events: PageEvents::default(),
        }
    }
}

/// One tab or window: its view of the durable store, its session store, and
/// its document's event listeners.
pub struct Tab {
    id: TabId,
    browser: Browser,
    durable: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
    events: PageEvents,
}

impl Tab {
    pub fn id(&self) -> TabId {
        self.id
    }

    pub fn durable(&self) -> Arc<dyn KeyValueStore> {
        self.durable.clone()
    }

    pub fn session(&self) -> Arc<dyn KeyValueStore> {
        self.session.clone()
    }

    pub fn events(&self) -> &PageEvents {
        &self.events
    }

    /// Changes to the durable store made by other tabs.
    pub fn subscribe_storage(&self) -> Receiver<StorageEvent> {
        self.browser.bus.subscribe(self.id)
    }

    /// This document's events and other tabs' storage changes on one queue,
    /// in delivery order.
    pub fn subscribe_updates(&self) -> Receiver<TabUpdate> {
        let (tx, rx) = mpsc::channel();
        self.events.listen(forward_to(tx.clone(), TabUpdate::Page));
        self.browser
            .bus
            .listen(self.id, forward_to(tx, TabUpdate::Storage));
        rx
    }

    /// Open a new window from this tab. It shares this tab's session store
    /// but has its own document.
    pub fn open_window(&self) -> Tab {
        self.browser.open_tab_with_session(self.session.clone())
    }
}

impl fmt::Debug for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tab").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Persists a settings change and announces it.
pub struct Broadcaster {
    store: SettingsStore,
    session: Arc<dyn KeyValueStore>,
    session_key: String,
    events: PageEvents,
}

impl Broadcaster {
    /// Broadcaster for changes made in `tab`.
    pub fn new(store: SettingsStore, tab: &Tab, session_key: impl Into<String>) -> Self {
        Self {
            store,
            session: tab.session(),
            session_key: session_key.into(),
            events: tab.events().clone(),
        }
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    /// Persist, copy to the session channel, then notify this document.
    ///
    /// Only a failure to persist is returned; the mutation is not complete
    /// without it.
    pub fn publish(&self, settings: &ImageSettings) -> Result<(), StorageError> {
        self.store.save(settings)?;

        if let Err(e) = self.write_session(settings) {
            warn!(error = %e, "cross-page update not available");
        }

        let listeners = self
            .events
            .dispatch(PageEvent::ImagesUpdated(settings.clone()));
        info!(listeners, "image settings published");
        Ok(())
    }

    /// Drop the session copy so windows opened later start from the durable record.
    pub fn clear_session(&self) {
        if let Err(e) = self.session.remove(&self.session_key) {
            warn!(error = %e, "could not clear cross-page update");
        }
    }

    fn write_session(&self, settings: &ImageSettings) -> Result<(), StorageError> {
        let json = settings_to_json(settings)?;
        self.session.set(&self.session_key, &json)
    }
}
