#![forbid(unsafe_code)]

//! Cross-modal event bus.
//!
//! A loosely typed publish/subscribe channel for modal instances that have no
//! structural relationship in the stack (a "create cashier" modal telling a
//! "store details" modal underneath it to refresh, for example). Event names
//! are plain strings; the payload is whatever the emitter sends.
//!
//! # Invariants
//!
//! 1. Listeners for one event run synchronously, in registration order.
//! 2. A `once` listener runs at most one time, however it is reached.
//! 3. A panicking listener is isolated: it is logged, the remaining listeners
//!    still run, and the panic never reaches the caller of [`EventBus::emit`].
//! 4. Every emit is recorded in a per-event ring buffer of the most recent
//!    payloads, whether or not anyone is listening.
//! 5. No internal borrow is held while a listener runs, so listeners may emit,
//!    subscribe, or unsubscribe re-entrantly.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Listener panic | Bug in listener | Logged at `error`, isolated |
//! | Unknown event | Nobody subscribed | Emit records history, invokes nothing |
//! | Stale handle | Bus dropped | `unsubscribe()` returns `false` |
//!
//! # Example
//!
//! ```
//! use bodesk_bus::EventBus;
//! use serde_json::json;
//!
//! let bus: EventBus = EventBus::new();
//! let sub = bus.on("cashier:saved", |payload| {
//!     assert_eq!(payload["id"], 7);
//! });
//! bus.emit("cashier:saved", json!({ "id": 7 }));
//! sub.unsubscribe();
//!
//! assert_eq!(bus.history("cashier:saved", None).len(), 1);
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use ahash::AHashMap;

/// Default number of payloads retained per event name.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

type Listener<P> = Rc<dyn Fn(&P)>;

struct ListenerEntry<P> {
    id: u64,
    once: bool,
    callback: Listener<P>,
}

struct BusState<P> {
    listeners: AHashMap<String, Vec<ListenerEntry<P>>>,
    history: AHashMap<String, VecDeque<P>>,
    capacity: usize,
    next_id: u64,
}

impl<P> BusState<P> {
    fn is_registered(&self, event: &str, id: u64) -> bool {
        self.listeners
            .get(event)
            .is_some_and(|list| list.iter().any(|l| l.id == id))
    }

    fn remove(&mut self, event: &str, id: u64) -> bool {
        let Some(list) = self.listeners.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| l.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.listeners.remove(event);
        }
        removed
    }
}

/// Shared handle to a publish/subscribe channel.
///
/// Cloning the handle shares the same listeners and history.
pub struct EventBus<P = serde_json::Value> {
    state: Rc<RefCell<BusState<P>>>,
}

impl<P> Clone for EventBus<P> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<P: Clone + 'static> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for EventBus<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventBus")
            .field("events", &state.listeners.len())
            .field("capacity", &state.capacity)
            .finish()
    }
}

impl<P: Clone + 'static> EventBus<P> {
    /// Create a bus with the default history capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a bus retaining `capacity` payloads per event. Zero disables
    /// history.
    #[must_use]
    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(BusState {
                listeners: AHashMap::new(),
                history: AHashMap::new(),
                capacity,
                next_id: 1,
            })),
        }
    }

    /// Subscribe to `event`.
    pub fn on(&self, event: &str, callback: impl Fn(&P) + 'static) -> BusSubscription<P> {
        self.register(event, false, Rc::new(callback))
    }

    /// Subscribe to the next emission of `event` only.
    pub fn once(&self, event: &str, callback: impl Fn(&P) + 'static) -> BusSubscription<P> {
        self.register(event, true, Rc::new(callback))
    }

    fn register(&self, event: &str, once: bool, callback: Listener<P>) -> BusSubscription<P> {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state
            .listeners
            .entry(event.to_owned())
            .or_default()
            .push(ListenerEntry { id, once, callback });
        tracing::trace!(event, id, once, "bus listener registered");
        BusSubscription {
            state: Rc::downgrade(&self.state),
            event: event.to_owned(),
            id,
        }
    }

    /// Publish `payload` to every current listener of `event`.
    ///
    /// Returns the number of listeners invoked (including ones that
    /// panicked).
    pub fn emit(&self, event: &str, payload: P) -> usize {
        let snapshot: Vec<(u64, bool, Listener<P>)> = {
            let mut state = self.state.borrow_mut();
            let capacity = state.capacity;
            if capacity > 0 {
                let ring = state.history.entry(event.to_owned()).or_default();
                ring.push_back(payload.clone());
                while ring.len() > capacity {
                    ring.pop_front();
                }
            }

            let snapshot: Vec<_> = state
                .listeners
                .get(event)
                .map(|list| {
                    list.iter()
                        .map(|l| (l.id, l.once, Rc::clone(&l.callback)))
                        .collect()
                })
                .unwrap_or_default();

            // Once-listeners leave before anything runs, so a re-entrant emit
            // from inside a listener cannot reach them a second time.
            for (id, once, _) in &snapshot {
                if *once {
                    state.remove(event, *id);
                }
            }
            snapshot
        };

        tracing::debug!(event, listeners = snapshot.len(), "bus emit");

        let mut invoked = 0;
        for (id, once, callback) in snapshot {
            if !once && !self.state.borrow().is_registered(event, id) {
                continue;
            }
            invoked += 1;
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(&payload))) {
                tracing::error!(
                    event,
                    listener = id,
                    reason = panic_message(panic.as_ref()),
                    "bus listener panicked"
                );
            }
        }
        invoked
    }

    /// Remove every listener of `event`. History is untouched.
    pub fn clear(&self, event: &str) {
        if let Some(list) = self.state.borrow_mut().listeners.remove(event) {
            tracing::debug!(event, removed = list.len(), "bus listeners cleared");
        }
    }

    /// Drop the recorded history of `event`.
    pub fn clear_history(&self, event: &str) {
        self.state.borrow_mut().history.remove(event);
    }

    /// Recent payloads of `event`, oldest first.
    ///
    /// With `limit`, only the newest `limit` entries are returned.
    #[must_use]
    pub fn history(&self, event: &str, limit: Option<usize>) -> Vec<P> {
        let state = self.state.borrow();
        let Some(ring) = state.history.get(event) else {
            return Vec::new();
        };
        let skip = limit.map_or(0, |n| ring.len().saturating_sub(n));
        ring.iter().skip(skip).cloned().collect()
    }

    /// Number of listeners currently registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.state
            .borrow()
            .listeners
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Retained payloads per event.
    #[must_use]
    pub fn history_capacity(&self) -> usize {
        self.state.borrow().capacity
    }

    /// Remove all listeners and all history.
    pub fn reset(&self) {
        let mut state = self.state.borrow_mut();
        state.listeners.clear();
        state.history.clear();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Handle returned by [`EventBus::on`] and [`EventBus::once`].
///
/// Dropping the handle does not unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe) explicitly.
pub struct BusSubscription<P> {
    state: Weak<RefCell<BusState<P>>>,
    event: String,
    id: u64,
}

impl<P> BusSubscription<P> {
    /// Remove the listener. Returns `false` if it was already gone (a fired
    /// `once` listener, a cleared event, or a dropped bus).
    pub fn unsubscribe(&self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        let removed = state.borrow_mut().remove(&self.event, self.id);
        removed
    }

    /// Whether the listener is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state
            .upgrade()
            .is_some_and(|state| state.borrow().is_registered(&self.event, self.id))
    }

    /// Event name this subscription listens to.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }
}

impl<P> fmt::Debug for BusSubscription<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusSubscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}
