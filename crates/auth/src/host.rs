//! In-process [`BrowserHost`]
//!
//! [`MemoryHost`] keeps the current location in memory, records navigations
//! and opened popups, and fans posted messages out to every subscriber. An
//! embedder (a desktop shell, a webview bridge, or a test) feeds it the
//! location it was started with and the messages it receives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, Notify};
use tracing::debug;
use url::Url;

use crate::error::AuthError;
use crate::traits::{BrowserHost, PopupWindow};
use crate::types::WindowMessage;

const MESSAGE_CAPACITY: usize = 64;
const DEFAULT_SCREEN: (u32, u32) = (1920, 1080);

/// Location a [`MemoryHost`] starts at when none is configured
pub const DEFAULT_LOCATION: &str = "https://localhost/";

/// Popup handle whose closed flag is shared with the host
#[derive(Debug, Clone, Default)]
pub struct MemoryPopup {
    closed: Arc<AtomicBool>,
}

impl MemoryPopup {
    /// Simulate the user closing the window
    pub fn close_window(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl PopupWindow for MemoryPopup {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.close_window();
    }
}

/// Popup opened through a [`MemoryHost`]
#[derive(Debug, Clone)]
pub struct PopupRecord {
    pub url: Url,
    pub name: String,
    pub features: String,
    pub window: MemoryPopup,
}

#[derive(Debug)]
struct HostState {
    location: RwLock<Url>,
    replaced: Mutex<Vec<Url>>,
    navigations: Mutex<Vec<Url>>,
    popups: Mutex<Vec<PopupRecord>>,
    screen: RwLock<(u32, u32)>,
    messages: broadcast::Sender<WindowMessage>,
    changed: Notify,
}

/// In-memory host environment
///
/// Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    state: Arc<HostState>,
}

impl MemoryHost {
    /// Create a host whose current location is `location`
    #[must_use]
    pub fn new(location: Url) -> Self {
        let (messages, _) = broadcast::channel(MESSAGE_CAPACITY);
        Self {
            state: Arc::new(HostState {
                location: RwLock::new(location),
                replaced: Mutex::new(Vec::new()),
                navigations: Mutex::new(Vec::new()),
                popups: Mutex::new(Vec::new()),
                screen: RwLock::new(DEFAULT_SCREEN),
                messages,
                changed: Notify::new(),
            }),
        }
    }

    /// Create a host from a location string
    ///
    /// # Errors
    /// Returns [`AuthError::Config`] if `location` is not an absolute URL
    pub fn parse(location: &str) -> Result<Self, AuthError> {
        Ok(Self::new(Url::parse(location)?))
    }

    /// Set the screen size used to center popups
    #[must_use]
    pub fn with_screen_size(self, width: u32, height: u32) -> Self {
        *self.state.screen.write() = (width, height);
        self
    }

    /// Overwrite the current location (as if the page had been loaded there)
    pub fn set_location(&self, location: Url) {
        *self.state.location.write() = location;
    }

    /// Deliver a message to every current subscriber
    ///
    /// Returns the number of subscribers that received it.
    pub fn post_message(&self, message: WindowMessage) -> usize {
        debug!(origin = %message.origin, "posting window message");
        self.state.messages.send(message).unwrap_or(0)
    }

    /// Number of live message subscribers
    #[must_use]
    pub fn message_subscribers(&self) -> usize {
        self.state.messages.receiver_count()
    }

    /// Locations installed through `replace_location`, oldest first
    #[must_use]
    pub fn replaced_locations(&self) -> Vec<Url> {
        self.state.replaced.lock().clone()
    }

    /// Navigations requested through `navigate`, oldest first
    #[must_use]
    pub fn navigations(&self) -> Vec<Url> {
        self.state.navigations.lock().clone()
    }

    /// Popups opened so far, oldest first
    #[must_use]
    pub fn popups(&self) -> Vec<PopupRecord> {
        self.state.popups.lock().clone()
    }

    /// Wait until at least `count` popups have been opened
    pub async fn wait_for_popups(&self, count: usize, timeout: Duration) -> Option<PopupRecord> {
        let count = count.max(1);
        self.wait_for(timeout, || self.state.popups.lock().get(count - 1).cloned()).await
    }

    /// Wait until at least one navigation has been requested
    pub async fn wait_for_navigation(&self, timeout: Duration) -> Option<Url> {
        self.wait_for(timeout, || self.state.navigations.lock().last().cloned()).await
    }

    async fn wait_for<T>(
        &self,
        timeout: Duration,
        mut probe: impl FnMut() -> Option<T>,
    ) -> Option<T> {
        let wait = async {
            loop {
                let notified = self.state.changed.notified();
                if let Some(found) = probe() {
                    return found;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.ok()
    }
}

impl BrowserHost for MemoryHost {
    fn location(&self) -> Url {
        self.state.location.read().clone()
    }

    fn replace_location(&self, url: &Url) {
        *self.state.location.write() = url.clone();
        self.state.replaced.lock().push(url.clone());
        self.state.changed.notify_waiters();
    }

    fn navigate(&self, url: &Url) {
        debug!(%url, "navigating away");
        self.state.navigations.lock().push(url.clone());
        self.state.changed.notify_waiters();
    }

    fn screen_size(&self) -> (u32, u32) {
        *self.state.screen.read()
    }

    fn open_popup(&self, url: &Url, name: &str, features: &str) -> Box<dyn PopupWindow> {
        let window = MemoryPopup::default();
        self.state.popups.lock().push(PopupRecord {
            url: url.clone(),
            name: name.to_string(),
            features: features.to_string(),
            window: window.clone(),
        });
        self.state.changed.notify_waiters();
        Box::new(window)
    }

    fn subscribe_messages(&self) -> broadcast::Receiver<WindowMessage> {
        self.state.messages.subscribe()
    }
}
