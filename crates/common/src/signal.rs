//! Observable single-value cell
//!
//! A [`Signal`] holds one value and broadcasts every assignment to its
//! listeners, synchronously and in registration order. Assigning the same
//! value twice notifies twice.
//!
//! Dispatch runs over a snapshot of the listener list taken after the new
//! value is stored, so a listener may subscribe, unsubscribe or even set the
//! cell again from inside its callback. A listener registered during a
//! dispatch only sees later assignments.
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! use sessionkit_common::signal::Signal;
//!
//! let loading = Signal::new(false);
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//!
//! let subscription = loading.listen(move |_| { counter.fetch_add(1, Ordering::SeqCst); }, true);
//! loading.set(true);
//! subscription.unsubscribe();
//! loading.set(false);
//!
//! assert_eq!(seen.load(Ordering::SeqCst), 2);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Shared<T> {
    value: RwLock<T>,
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    next_id: AtomicU64,
}

/// Observable cell with subscribe/unsubscribe
///
/// Cloning a `Signal` yields another handle to the same cell.
pub struct Signal<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("value", &*self.shared.value.read())
            .field("listeners", &self.shared.listeners.lock().len())
            .finish()
    }
}

impl<T: Default + Clone + Send + Sync + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a cell holding `value`
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            shared: Arc::new(Shared {
                value: RwLock::new(value),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Current value
    #[must_use]
    pub fn value(&self) -> T {
        self.shared.value.read().clone()
    }

    /// Borrow the current value without cloning it
    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.shared.value.read())
    }

    /// Store `value` and notify every listener registered before this call
    pub fn set(&self, value: T) {
        *self.shared.value.write() = value.clone();

        let snapshot: Vec<Listener<T>> =
            self.shared.listeners.lock().iter().map(|(_, listener)| Arc::clone(listener)).collect();

        for listener in snapshot {
            listener(&value);
        }
    }

    /// Register a listener
    ///
    /// When `call_now` is true the listener is invoked with the current value
    /// before this method returns.
    pub fn listen<F>(&self, listener: F, call_now: bool) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener<T> = Arc::new(listener);
        self.shared.listeners.lock().push((id, Arc::clone(&listener)));

        if call_now {
            let current = self.value();
            listener(&current);
        }

        let weak: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.listeners.lock().retain(|(existing, _)| *existing != id);
            }
        })
    }

    /// Number of registered listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.shared.listeners.lock().len()
    }

    /// Read-only view exposing only the getter and `listen`
    #[must_use]
    pub fn read_only(&self) -> ReadOnlyCell<T> {
        ReadOnlyCell { inner: self.clone() }
    }
}

/// Read-only view of a [`Signal`]
pub struct ReadOnlyCell<T> {
    inner: Signal<T>,
}

impl<T> Clone for ReadOnlyCell<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadOnlyCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadOnlyCell").field(&self.inner).finish()
    }
}

impl<T> ReadOnlyCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Current value
    #[must_use]
    pub fn value(&self) -> T {
        self.inner.value()
    }

    /// Borrow the current value without cloning it
    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.with_value(f)
    }

    /// Register a listener, see [`Signal::listen`]
    pub fn listen<F>(&self, listener: F, call_now: bool) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.listen(listener, call_now)
    }
}

/// Handle returned by `listen`
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    cancel: Box<dyn FnOnce() + Send + Sync>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self { cancel: Box::new(cancel) }
    }

    /// Remove the listener from its cell
    pub fn unsubscribe(self) {
        (self.cancel)();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
