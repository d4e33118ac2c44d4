#![forbid(unsafe_code)]

//! Modal stack store: the single source of truth for open modals.
//!
//! The store holds one active modal plus an ordered stack of suspended ones.
//! Callers open, push, pop, and close; renderers read snapshots or subscribe.
//!
//! # Invariants
//!
//! - Every mutation is one "read → compute next → replace" step on an
//!   [`Observable`]; subscribers never see a half-applied change.
//! - A mutation that leaves the stack structurally equal is dropped without
//!   notifying anyone.
//! - `push` always attaches to the current top, so parent links form a path.
//! - A deferred clear (after `close`/`close_all`) only wipes memory if the
//!   store is still closed when it fires. Reopening inside the exit window
//!   keeps the new modal intact.
//!
//! # Failure Modes
//!
//! - Every lookup and every targeted update is total: an unknown id is a
//!   silent no-op (traced at `trace` level), never a panic.
//! - `pop()` on a stack with nothing suspended behaves like `close()`.
//! - `push()` with nothing active behaves like `open()`.
//!
//! # Example
//!
//! ```
//! use bodesk_modal::{ModalConfiguration, ModalStore};
//!
//! let store: ModalStore = ModalStore::new();
//! let store_id = store.open(ModalConfiguration::entity("store", "12"));
//! let cashier_id = store.push(ModalConfiguration::entity("cashier", "4"));
//!
//! assert_eq!(store.depth(), 2);
//! assert_eq!(store.get_parent_modal(cashier_id).and_then(|m| m.id), Some(store_id));
//!
//! store.pop();
//! assert_eq!(store.active_id(), Some(store_id));
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use ahash::AHashSet;
use bodesk_reactive::{Binding, Observable, Subscription, bind_mapped};
use web_time::Instant;

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigPatch, ModalConfiguration};
use crate::data::{JsonBag, MergeData};
use crate::id::{IdGenerator, ModalId};
use crate::state::ModalStackState;

/// How long a closed modal keeps its data for the exit transition.
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ClearScope {
    Active,
    All,
}

#[derive(Debug, Clone, Copy)]
struct PendingClear {
    deadline: Instant,
    scope: ClearScope,
}

pub(crate) struct StoreInner<D> {
    pub(crate) state: Observable<ModalStackState<D>>,
    ids: IdGenerator,
    clock: Rc<dyn Clock>,
    close_grace: Duration,
    pending_clear: Cell<Option<PendingClear>>,
    pub(crate) in_flight: RefCell<AHashSet<ModalId>>,
}

/// Shared handle to the modal stack.
///
/// Cloning the handle shares the same stack. Construct one per application
/// (or per test) and pass it to whoever needs it.
pub struct ModalStore<D: MergeData = JsonBag> {
    pub(crate) inner: Rc<StoreInner<D>>,
}

impl<D: MergeData> Clone for ModalStore<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<D: MergeData> Default for ModalStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: MergeData> fmt::Debug for ModalStore<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (depth, open) = self.inner.state.with(|s| (s.depth(), s.open));
        f.debug_struct("ModalStore")
            .field("depth", &depth)
            .field("open", &open)
            .field("pending_clear", &self.inner.pending_clear.get().is_some())
            .finish()
    }
}

/// Builder for [`ModalStore`].
pub struct ModalStoreBuilder {
    close_grace: Duration,
    clock: Rc<dyn Clock>,
    first_id: Option<u64>,
}

impl fmt::Debug for ModalStoreBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalStoreBuilder")
            .field("close_grace", &self.close_grace)
            .field("first_id", &self.first_id)
            .finish_non_exhaustive()
    }
}

impl Default for ModalStoreBuilder {
    fn default() -> Self {
        Self {
            close_grace: DEFAULT_CLOSE_GRACE,
            clock: Rc::new(SystemClock),
            first_id: None,
        }
    }
}

impl ModalStoreBuilder {
    /// Exit-transition window after `close`. Zero clears immediately.
    #[must_use]
    pub fn close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start id generation at `first` instead of a timestamp seed.
    #[must_use]
    pub fn first_id(mut self, first: u64) -> Self {
        self.first_id = Some(first);
        self
    }

    #[must_use]
    pub fn build<D: MergeData>(self) -> ModalStore<D> {
        let ids = match self.first_id {
            Some(first) => IdGenerator::starting_at(first),
            None => IdGenerator::seeded_now(),
        };
        ModalStore {
            inner: Rc::new(StoreInner {
                state: Observable::new(ModalStackState::default()),
                ids,
                clock: self.clock,
                close_grace: self.close_grace,
                pending_clear: Cell::new(None),
                in_flight: RefCell::new(AHashSet::new()),
            }),
        }
    }
}

impl ModalStore {
    /// Configure a store. [`ModalStoreBuilder::build`] picks the data type.
    #[must_use]
    pub fn builder() -> ModalStoreBuilder {
        ModalStoreBuilder::default()
    }
}

impl<D: MergeData> ModalStore<D> {
    /// A store with the default exit window and the system clock.
    #[must_use]
    pub fn new() -> Self {
        ModalStoreBuilder::default().build()
    }

    // --- Reads ---

    /// Clone of the whole stack.
    #[must_use]
    pub fn snapshot(&self) -> ModalStackState<D> {
        self.inner.state.get()
    }

    /// Borrow the stack for the duration of `f`.
    pub fn with_state<R>(&self, f: impl FnOnce(&ModalStackState<D>) -> R) -> R {
        self.inner.state.with(f)
    }

    /// Register a callback that runs after every committed change.
    pub fn subscribe(&self, callback: impl Fn(&ModalStackState<D>) + 'static) -> Subscription {
        self.inner.state.subscribe(callback)
    }

    /// Number of committed changes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.state.version()
    }

    /// Whether a modal is visible (false during an exit window).
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.state.with(|s| s.open)
    }

    #[must_use]
    pub fn active(&self) -> Option<ModalConfiguration<D>> {
        self.inner.state.with(|s| s.active.clone())
    }

    #[must_use]
    pub fn active_id(&self) -> Option<ModalId> {
        self.inner.state.with(ModalStackState::active_id)
    }

    /// Suspended modals, bottom to top.
    #[must_use]
    pub fn suspended(&self) -> Vec<ModalConfiguration<D>> {
        self.inner.state.with(|s| s.suspended.clone())
    }

    /// Total number of modals held, active included.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.inner.state.with(ModalStackState::depth)
    }

    /// Live view of the open flag.
    #[must_use]
    pub fn bind_open(&self) -> Binding<bool> {
        bind_mapped(&self.inner.state, |s| s.open)
    }

    /// Live view of the active modal id.
    #[must_use]
    pub fn bind_active_id(&self) -> Binding<Option<ModalId>> {
        bind_mapped(&self.inner.state, ModalStackState::active_id)
    }

    // --- Lookups ---

    #[must_use]
    pub fn get_modal_by_id(&self, id: ModalId) -> Option<ModalConfiguration<D>> {
        self.inner.state.with(|s| s.find(id).cloned())
    }

    #[must_use]
    pub fn get_parent_modal(&self, id: ModalId) -> Option<ModalConfiguration<D>> {
        self.inner.state.with(|s| {
            let parent_id = s.find(id)?.parent_id?;
            s.find(parent_id).cloned()
        })
    }

    /// Every ancestor of `id`, nearest first.
    #[must_use]
    pub fn get_all_parents(&self, id: ModalId) -> Vec<ModalConfiguration<D>> {
        self.inner
            .state
            .with(|s| s.ancestors(id).into_iter().cloned().collect())
    }

    /// Children of `id` that are still on the stack.
    #[must_use]
    pub fn get_children(&self, id: ModalId) -> Vec<ModalConfiguration<D>> {
        self.inner.state.with(|s| {
            s.find(id)
                .map(|m| {
                    m.children
                        .iter()
                        .filter_map(|child| s.find(*child).cloned())
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    /// Index within the suspended stack, `suspended.len()` for the active
    /// modal, `None` if absent.
    #[must_use]
    pub fn get_stack_position(&self, id: ModalId) -> Option<usize> {
        self.inner.state.with(|s| s.position(id))
    }

    // --- Stack operations ---

    fn prepare(&self, mut config: ModalConfiguration<D>) -> (ModalId, ModalConfiguration<D>) {
        let id = match config.id {
            Some(id) => id,
            None => self.inner.ids.next_id(),
        };
        config.id = Some(id);
        config.clamp_current_step();
        (id, config)
    }

    /// Replace the whole stack with `config`.
    ///
    /// This is a reset, not a push: suspended modals are discarded and no
    /// close hooks run for the modal being replaced.
    pub fn open(&self, config: ModalConfiguration<D>) -> ModalId {
        let (id, mut config) = self.prepare(config);
        config.parent_id = None;
        config.children.clear();
        self.inner.state.set(ModalStackState {
            active: Some(config),
            suspended: Vec::new(),
            open: true,
        });
        tracing::debug!(modal = %id, "modal opened");
        id
    }

    /// Hide the active modal. Its data stays until the exit window passes.
    ///
    /// The suspended stack is not touched.
    pub fn close(&self) {
        let had_active = self.inner.state.with(|s| s.active.is_some());
        self.inner.state.update(|s| s.open = false);
        if had_active {
            tracing::debug!("modal closed");
            self.schedule_clear(ClearScope::Active);
        } else {
            tracing::trace!("close with nothing open");
        }
    }

    /// Stack `config` on top of the active modal.
    pub fn push(&self, config: ModalConfiguration<D>) -> ModalId {
        if self.inner.state.with(|s| s.active.is_none()) {
            return self.open(config);
        }
        let (id, mut config) = self.prepare(config);
        config.children.clear();
        self.inner.state.update(move |s| {
            if let Some(mut parent) = s.active.take() {
                parent.children.push(id);
                config.parent_id = parent.id;
                s.suspended.push(parent);
            }
            s.active = Some(config);
            s.open = true;
        });
        tracing::debug!(modal = %id, depth = self.depth(), "modal pushed");
        id
    }

    /// Return to the modal beneath the active one.
    ///
    /// Returns the id of the modal that was removed. With nothing suspended
    /// this falls through to [`close`](Self::close) and returns `None`.
    pub fn pop(&self) -> Option<ModalId> {
        if !self.inner.state.with(ModalStackState::has_stack) {
            self.close();
            return None;
        }
        let mut removed = None;
        self.inner.state.update(|s| {
            let Some(mut next) = s.suspended.pop() else {
                return;
            };
            removed = s.active.take().and_then(|m| m.id);
            if let Some(removed) = removed {
                next.children.retain(|child| *child != removed);
            }
            s.active = Some(next);
            s.open = true;
        });
        tracing::debug!(
            removed = ?removed,
            active = ?self.active_id(),
            depth = self.depth(),
            "modal popped"
        );
        removed
    }

    /// Hide everything; active and suspended modals are cleared after the
    /// exit window.
    pub fn close_all(&self) {
        let held = self.depth();
        self.inner.state.update(|s| s.open = false);
        if held > 0 {
            tracing::debug!(held, "all modals closed");
            self.schedule_clear(ClearScope::All);
        }
    }

    /// Shallow-merge routing/presentation fields into a modal.
    ///
    /// Returns `true` if anything changed.
    pub fn update_config(&self, patch: ConfigPatch, target: Option<ModalId>) -> bool {
        self.modify(target, |config| patch.apply(config))
    }

    /// Merge `patch` into a modal's data bag.
    ///
    /// Returns `true` if anything changed.
    pub fn update_data(&self, patch: D::Patch, target: Option<ModalId>) -> bool {
        self.modify(target, |config| config.data.merge(patch))
    }

    /// Apply `f` to the targeted modal as one committed change.
    pub(crate) fn modify(
        &self,
        target: Option<ModalId>,
        f: impl FnOnce(&mut ModalConfiguration<D>),
    ) -> bool {
        let Some(id) = self.inner.state.with(|s| s.resolve(target)) else {
            tracing::trace!("update with no target and nothing active");
            return false;
        };
        let mut found = false;
        let changed = self.inner.state.update(|s| {
            if let Some(config) = s.find_mut(id) {
                found = true;
                f(config);
            }
        });
        if !found {
            tracing::trace!(modal = %id, "update for unknown modal ignored");
        }
        changed
    }

    /// Read the targeted modal without cloning it.
    pub(crate) fn read<R>(
        &self,
        target: Option<ModalId>,
        f: impl FnOnce(&ModalConfiguration<D>) -> R,
    ) -> Option<R> {
        self.inner.state.with(|s| {
            let id = s.resolve(target)?;
            s.find(id).map(f)
        })
    }

    // --- Deferred clear ---

    fn schedule_clear(&self, scope: ClearScope) {
        if self.inner.close_grace.is_zero() {
            self.apply_clear(scope);
            return;
        }
        let deadline = self.inner.clock.now() + self.inner.close_grace;
        let scope = match self.inner.pending_clear.get() {
            Some(pending) => pending.scope.max(scope),
            None => scope,
        };
        self.inner
            .pending_clear
            .set(Some(PendingClear { deadline, scope }));
    }

    fn apply_clear(&self, scope: ClearScope) -> bool {
        let cleared = self.inner.state.update(|s| {
            if s.open {
                return;
            }
            s.active = None;
            if scope == ClearScope::All {
                s.suspended.clear();
            }
        });
        if cleared {
            tracing::debug!(?scope, "closed modal memory cleared");
        }
        cleared
    }

    /// Whether a deferred clear is waiting for its deadline.
    #[must_use]
    pub fn has_pending_clear(&self) -> bool {
        self.inner.pending_clear.get().is_some()
    }

    /// Apply the deferred clear if its deadline has passed.
    ///
    /// Call this from the host's timer or frame loop. Returns `true` if
    /// memory was cleared; a store reopened in the meantime is left alone.
    pub fn tick(&self) -> bool {
        let Some(pending) = self.inner.pending_clear.get() else {
            return false;
        };
        if self.inner.clock.now() < pending.deadline {
            return false;
        }
        self.inner.pending_clear.set(None);
        if self.is_open() {
            tracing::trace!("deferred clear skipped, store reopened");
            return false;
        }
        self.apply_clear(pending.scope)
    }

    /// Apply a pending clear now, ignoring its deadline (still guarded by
    /// the open flag).
    pub fn flush_pending_clear(&self) -> bool {
        match self.inner.pending_clear.take() {
            Some(pending) => self.apply_clear(pending.scope),
            None => false,
        }
    }

    /// Drop every modal, pending clear, and in-flight transition.
    pub fn reset(&self) {
        self.inner.pending_clear.set(None);
        self.inner.in_flight.borrow_mut().clear();
        self.inner.state.set(ModalStackState::default());
    }

    /// The clock deadlines are measured against.
    #[must_use]
    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.inner.clock)
    }
}
