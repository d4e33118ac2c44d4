#![forbid(unsafe_code)]

//! Two-way bridge between the modal store and the address bar.
//!
//! # Store → address
//!
//! The synchronizer subscribes to the store. Whenever the address projection
//! of the stack changes (open flag plus the active modal's routing fields),
//! it rewrites the modal keys of the current address and asks the navigator
//! to go there without scrolling. Before navigating it arms a guard holding
//! the target address and a deadline. While a guard is armed the navigator's
//! location is stale, so the next target is derived from the guard's target
//! instead, and every new target re-arms the guard.
//!
//! # Address → store
//!
//! The host reports every address change with
//! [`on_location_change`](UrlSynchronizer::on_location_change). While the
//! guard is armed, reports are treated as the synchronizer's own navigation
//! settling: the report matching the target releases the guard, anything
//! else is ignored. Without a guard the address is reconciled: a modal in the
//! query with the store closed opens it, no modal with the store open closes
//! it. Store changes made while reconciling are not mirrored back.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Guard too short | Navigation commits after the deadline | Stale report may revert the store |
//! | Unparseable address | Host bug | Logged at `warn`, ignored |
//! | Navigator dropped mid-flight | Host teardown | Guard expires on `tick()` |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use bodesk_modal::{Clock, JsonBag, MergeData, ModalId, ModalStackState, ModalStore};
use bodesk_reactive::Subscription;
use web_time::Instant;

use crate::address::Address;
use crate::navigator::{NavigateOptions, Navigator};
use crate::query::{self, ModalQuery};

/// How long a self-initiated navigation suppresses reconciliation.
pub const DEFAULT_NAV_GUARD: Duration = Duration::from_millis(150);

/// What [`UrlSynchronizer::on_location_change`] did with a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The report was the synchronizer's own navigation landing.
    Echo,
    /// Ignored because a self-initiated navigation is still settling.
    Guarded,
    /// The address encoded a modal and the store was closed.
    Opened(ModalId),
    /// The address encoded no modal and the store was open.
    Closed,
    /// Address and store already agree.
    Unchanged,
    /// The address could not be parsed.
    Invalid,
}

#[derive(Debug, Clone)]
struct NavGuard {
    target: String,
    deadline: Instant,
}

struct SyncInner<D: MergeData> {
    store: ModalStore<D>,
    navigator: Rc<dyn Navigator>,
    clock: Rc<dyn Clock>,
    nav_guard: Duration,
    options: NavigateOptions,
    guard: RefCell<Option<NavGuard>>,
    applying: Cell<bool>,
    last: RefCell<Option<ModalQuery>>,
}

/// Clears the reconciling flag on every exit path.
struct Applying<'a>(&'a Cell<bool>);

impl<'a> Applying<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for Applying<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

fn projection<D>(state: &ModalStackState<D>) -> Option<ModalQuery> {
    state
        .active
        .as_ref()
        .filter(|_| state.open)
        .map(ModalQuery::from_config)
}

impl<D: MergeData + Default> SyncInner<D> {
    fn on_store_change(&self, state: &ModalStackState<D>) {
        let next = projection(state);
        if *self.last.borrow() == next {
            return;
        }
        self.last.replace(next.clone());
        if self.applying.get() {
            tracing::trace!("store change from reconcile not mirrored");
            return;
        }

        self.guard_expired();
        let in_flight = self.guard.borrow().as_ref().map(|g| g.target.clone());
        let base = in_flight
            .clone()
            .unwrap_or_else(|| self.navigator.location());
        let current = match Address::parse(&base) {
            Ok(address) => address,
            Err(err) => {
                tracing::warn!(%err, "cannot mirror modal state into address");
                return;
            }
        };
        let query = match &next {
            Some(q) => q.apply_to(current.query()),
            None => query::strip(current.query()),
        };
        let target = current.with_query(&query).to_string();
        let deadline = self.clock.now() + self.nav_guard;

        if in_flight.as_deref() == Some(target.as_str()) {
            self.guard.replace(Some(NavGuard { target, deadline }));
            tracing::trace!("target already in flight");
            return;
        }
        if in_flight.is_none() && target == current.to_string() {
            return;
        }

        self.guard.replace(Some(NavGuard {
            target: target.clone(),
            deadline,
        }));
        tracing::debug!(%target, open = next.is_some(), "mirroring modal state into address");
        self.navigator.navigate(&target, self.options);
    }

    fn guard_expired(&self) -> bool {
        let expired = self
            .guard
            .borrow()
            .as_ref()
            .is_some_and(|g| self.clock.now() >= g.deadline);
        if expired {
            self.guard.replace(None);
            tracing::debug!("navigation guard expired");
        }
        expired
    }

    fn reconcile(&self, address: &Address) -> Reconciled {
        let encoded = ModalQuery::parse(address.query());
        let open = self.store.is_open();
        let _applying = Applying::enter(&self.applying);
        match encoded {
            Some(q) if !open => {
                let id = self.store.open(q.to_config());
                tracing::debug!(modal = %id, %address, "modal opened from address");
                Reconciled::Opened(id)
            }
            None if open => {
                self.store.close();
                tracing::debug!(%address, "modal closed from address");
                Reconciled::Closed
            }
            _ => Reconciled::Unchanged,
        }
    }
}

/// Keeps a [`ModalStore`] and a [`Navigator`] in agreement.
///
/// Dropping the synchronizer unsubscribes it from the store.
pub struct UrlSynchronizer<D: MergeData + Default = JsonBag> {
    inner: Rc<SyncInner<D>>,
    _subscription: Subscription,
}

impl<D: MergeData + Default> fmt::Debug for UrlSynchronizer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlSynchronizer")
            .field("nav_guard", &self.inner.nav_guard)
            .field("guarded", &self.is_guarded())
            .finish_non_exhaustive()
    }
}

/// Builder for [`UrlSynchronizer`].
pub struct UrlSyncBuilder<D: MergeData> {
    store: ModalStore<D>,
    navigator: Rc<dyn Navigator>,
    clock: Option<Rc<dyn Clock>>,
    nav_guard: Duration,
    options: NavigateOptions,
}

impl<D: MergeData + Default> UrlSyncBuilder<D> {
    /// Window in which reports are treated as the synchronizer's own echo.
    #[must_use]
    pub fn nav_guard(mut self, window: Duration) -> Self {
        self.nav_guard = window;
        self
    }

    /// Clock for guard deadlines. Defaults to the store's clock.
    #[must_use]
    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace history entries instead of pushing new ones.
    #[must_use]
    pub fn replace_history(mut self, replace: bool) -> Self {
        self.options.replace = replace;
        self
    }

    #[must_use]
    pub fn build(self) -> UrlSynchronizer<D> {
        let initial = self.store.with_state(projection);
        let inner = Rc::new(SyncInner {
            clock: self.clock.unwrap_or_else(|| self.store.clock()),
            store: self.store,
            navigator: self.navigator,
            nav_guard: self.nav_guard,
            options: self.options,
            guard: RefCell::new(None),
            applying: Cell::new(false),
            last: RefCell::new(initial),
        });
        let weak: Weak<SyncInner<D>> = Rc::downgrade(&inner);
        let subscription = inner.store.subscribe(move |state| {
            if let Some(inner) = weak.upgrade() {
                inner.on_store_change(state);
            }
        });
        UrlSynchronizer {
            inner,
            _subscription: subscription,
        }
    }
}

impl<D: MergeData + Default> UrlSynchronizer<D> {
    /// Synchronizer with the default guard window and the store's clock.
    pub fn new(store: &ModalStore<D>, navigator: Rc<dyn Navigator>) -> Self {
        Self::builder(store, navigator).build()
    }

    pub fn builder(store: &ModalStore<D>, navigator: Rc<dyn Navigator>) -> UrlSyncBuilder<D> {
        UrlSyncBuilder {
            store: store.clone(),
            navigator,
            clock: None,
            nav_guard: DEFAULT_NAV_GUARD,
            options: NavigateOptions::push(),
        }
    }

    /// Reconcile the store with the navigator's current address.
    ///
    /// Call once at mount, before any navigation has been requested.
    pub fn sync_from_location(&self) -> Reconciled {
        let location = self.inner.navigator.location();
        match Address::parse(&location) {
            Ok(address) => self.inner.reconcile(&address),
            Err(err) => {
                tracing::warn!(%err, "cannot read modal state from address");
                Reconciled::Invalid
            }
        }
    }

    /// Handle an address change reported by the host.
    pub fn on_location_change(&self, address: &str) -> Reconciled {
        let address = match Address::parse(address) {
            Ok(address) => address,
            Err(err) => {
                tracing::warn!(%err, "ignoring unparseable address change");
                return Reconciled::Invalid;
            }
        };
        self.inner.guard_expired();

        let echo = self
            .inner
            .guard
            .borrow()
            .as_ref()
            .map(|g| g.target == address.to_string());
        match echo {
            Some(true) => {
                self.inner.guard.replace(None);
                tracing::trace!(%address, "navigation landed");
                Reconciled::Echo
            }
            Some(false) => {
                tracing::debug!(%address, "address change ignored while navigation settles");
                Reconciled::Guarded
            }
            None => self.inner.reconcile(&address),
        }
    }

    /// Drop an expired guard. Returns `true` if one was dropped.
    pub fn tick(&self) -> bool {
        self.inner.guard_expired()
    }

    /// Whether a self-initiated navigation is still settling.
    #[must_use]
    pub fn is_guarded(&self) -> bool {
        self.inner.guard.borrow().is_some()
    }

    #[must_use]
    pub fn store(&self) -> &ModalStore<D> {
        &self.inner.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::MemoryNavigator;
    use bodesk_modal::{ConfigPatch, ManualClock, ModalConfiguration, ModalMode};
    use pretty_assertions::assert_eq;

    struct Harness {
        store: ModalStore,
        nav: Rc<MemoryNavigator>,
        clock: Rc<ManualClock>,
        sync: UrlSynchronizer,
    }

    impl Harness {
        fn new(initial: &str) -> Self {
            Self::with_guard(initial, DEFAULT_NAV_GUARD)
        }

        fn with_guard(initial: &str, guard: Duration) -> Self {
            let clock = Rc::new(ManualClock::new());
            let store: ModalStore = ModalStore::builder()
                .clock(clock.clone())
                .close_grace(Duration::ZERO)
                .first_id(1)
                .build();
            let nav = Rc::new(MemoryNavigator::new(initial));
            let sync = UrlSynchronizer::builder(&store, nav.clone())
                .nav_guard(guard)
                .build();
            Self {
                store,
                nav,
                clock,
                sync,
            }
        }

        /// Commit pending navigations and report them like a router would.
        fn settle(&self) -> Vec<Reconciled> {
            self.nav
                .commit()
                .iter()
                .map(|address| self.sync.on_location_change(address))
                .collect()
        }
    }

    #[test]
    fn open_writes_modal_keys() {
        let h = Harness::new("/stores");
        h.store.open(ModalConfiguration::entity("x", "1"));

        assert_eq!(h.settle(), vec![Reconciled::Echo]);
        assert_eq!(h.nav.location(), "/stores?modal=true&modalEntity=x&modalId=1");
        assert!(!h.sync.is_guarded());
    }

    #[test]
    fn close_strips_every_modal_key() {
        let h = Harness::new("/stores?page=2");
        h.store.open(ModalConfiguration::entity("x", "1").with_param("from", "list"));
        h.settle();
        h.store.close();
        h.settle();

        assert_eq!(h.nav.location(), "/stores?page=2");
    }

    #[test]
    fn navigation_never_scrolls() {
        let h = Harness::new("/");
        h.store.open(ModalConfiguration::entity("x", "1"));
        let requested = h.nav.requested();
        assert_eq!(requested.len(), 1);
        assert!(!requested[0].1.scroll);
        assert!(!requested[0].1.replace);
    }

    #[test]
    fn push_and_pop_follow_active_modal() {
        let h = Harness::new("/");
        h.store.open(ModalConfiguration::entity("store", "1"));
        h.settle();
        h.store.push(ModalConfiguration::entity("cashier", "2").with_mode(ModalMode::Edit));
        h.settle();
        assert_eq!(
            h.nav.location(),
            "/?modal=true&modalEntity=cashier&modalId=2&modalMode=edit"
        );

        h.store.pop();
        h.settle();
        assert_eq!(h.nav.location(), "/?modal=true&modalEntity=store&modalId=1");
    }

    #[test]
    fn tab_change_is_mirrored() {
        let h = Harness::new("/");
        h.store.open(ModalConfiguration::entity("store", "1").with_tabs(["general", "staff"]));
        h.settle();
        h.store.update_config(ConfigPatch::new().active_tab("staff"), None);
        h.settle();
        assert_eq!(
            h.nav.location(),
            "/?modal=true&modalEntity=store&modalId=1&modalTab=staff"
        );
    }

    #[test]
    fn data_changes_do_not_navigate() {
        let h = Harness::new("/");
        h.store.open(ModalConfiguration::entity("store", "1"));
        h.settle();
        let mut patch = JsonBag::new();
        patch.insert("name".to_owned(), "Depot".into());
        assert!(h.store.update_data(patch, None));
        assert_eq!(h.nav.pending(), 0);
    }

    #[test]
    fn back_button_closes_modal() {
        let h = Harness::new("/stores");
        h.store.open(ModalConfiguration::entity("x", "1"));
        h.settle();

        let previous = h.nav.back().expect("history entry");
        assert_eq!(h.sync.on_location_change(&previous), Reconciled::Closed);
        assert!(!h.store.is_open());
        assert_eq!(h.nav.pending(), 0, "reconcile must not navigate back");
    }

    #[test]
    fn forward_button_reopens_modal() {
        let h = Harness::new("/stores");
        h.store.open(ModalConfiguration::entity("store", "9").with_mode(ModalMode::Details));
        h.settle();
        let back = h.nav.back().expect("history entry");
        h.sync.on_location_change(&back);

        let forward = h.nav.forward().expect("forward entry");
        let Reconciled::Opened(id) = h.sync.on_location_change(&forward) else {
            panic!("expected the modal to reopen");
        };
        let active = h.store.get_modal_by_id(id).expect("reopened");
        assert_eq!(active.entity_id.as_deref(), Some("9"));
        assert_eq!(active.mode, Some(ModalMode::Details));
        assert_eq!(h.nav.pending(), 0);
    }

    #[test]
    fn deep_link_opens_at_mount() {
        let h = Harness::new("/stores?modal=true&modalEntity=store&modalId=4&mp_ref=mail");
        assert!(matches!(h.sync.sync_from_location(), Reconciled::Opened(_)));
        let active = h.store.active().expect("opened");
        assert_eq!(active.params.get("ref").map(String::as_str), Some("mail"));
        assert_eq!(h.nav.pending(), 0);
    }

    #[test]
    fn open_address_with_store_open_is_unchanged() {
        let h = Harness::new("/");
        h.store.open(ModalConfiguration::entity("store", "1"));
        h.settle();
        let visited = h.nav.visit("/?modal=true&modalEntity=user&modalId=2");
        assert_eq!(h.sync.on_location_change(&visited), Reconciled::Unchanged);
        assert_eq!(h.store.active().and_then(|m| m.entity_tag).as_deref(), Some("store"));
    }

    #[test]
    fn stale_report_inside_guard_cannot_revert_open() {
        let h = Harness::new("/stores");
        h.store.open(ModalConfiguration::entity("x", "1"));

        assert_eq!(h.sync.on_location_change("/stores"), Reconciled::Guarded);
        assert!(h.store.is_open());

        assert_eq!(h.settle(), vec![Reconciled::Echo]);
        assert!(h.store.is_open());
    }

    #[test]
    fn stale_report_after_guard_expiry_reverts_open() {
        let h = Harness::new("/stores");
        h.store.open(ModalConfiguration::entity("x", "1"));
        h.clock.advance(DEFAULT_NAV_GUARD);

        assert_eq!(h.sync.on_location_change("/stores"), Reconciled::Closed);
        assert!(!h.store.is_open());
    }

    #[test]
    fn close_before_open_lands_is_not_lost() {
        let h = Harness::new("/stores");
        h.store.open(ModalConfiguration::entity("x", "1"));
        h.store.close();

        assert_eq!(h.settle(), vec![Reconciled::Guarded, Reconciled::Echo]);
        assert_eq!(h.nav.location(), "/stores");
        assert!(!h.store.is_open());
        assert!(!h.sync.is_guarded());
    }

    #[test]
    fn reopen_before_close_lands_is_not_lost() {
        let h = Harness::new("/stores");
        h.store.open(ModalConfiguration::entity("x", "1"));
        h.settle();
        h.store.close();
        h.store.open(ModalConfiguration::entity("x", "1"));

        assert_eq!(h.settle(), vec![Reconciled::Guarded, Reconciled::Echo]);
        assert_eq!(h.nav.location(), "/stores?modal=true&modalEntity=x&modalId=1");
        assert!(h.store.is_open());
    }

    #[test]
    fn tick_drops_expired_guard() {
        let h = Harness::new("/");
        h.store.open(ModalConfiguration::entity("x", "1"));
        assert!(h.sync.is_guarded());
        assert!(!h.sync.tick());

        h.clock.advance(Duration::from_millis(200));
        assert!(h.sync.tick());
        assert!(!h.sync.is_guarded());
    }

    #[test]
    fn invalid_address_is_ignored() {
        let h = Harness::new("/");
        assert_eq!(h.sync.on_location_change("http://[::1"), Reconciled::Invalid);
    }

    #[test]
    fn dropping_synchronizer_stops_mirroring() {
        let h = Harness::new("/");
        let Harness { store, nav, sync, .. } = h;
        drop(sync);
        store.open(ModalConfiguration::entity("x", "1"));
        assert_eq!(nav.pending(), 0);
    }

    #[test]
    fn replace_history_option() {
        let store: ModalStore = ModalStore::new();
        let nav = Rc::new(MemoryNavigator::new("/"));
        let _sync = UrlSynchronizer::builder(&store, nav.clone())
            .replace_history(true)
            .build();
        store.open(ModalConfiguration::entity("x", "1"));
        nav.commit();
        assert_eq!(nav.entries().len(), 1);
    }
}
