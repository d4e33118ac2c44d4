#![forbid(unsafe_code)]

//! One explicitly constructed container for the modal layer.
//!
//! A [`ModalContext`] owns the store, the event bus, and (once a navigator is
//! attached) the address synchronizer, all configured from one
//! [`ModalPolicy`]. Create it at the application's composition root and
//! hand out clones of the store and bus handles. Tests create a fresh
//! context each, so nothing leaks between them.

use std::fmt;
use std::rc::Rc;

use bodesk_bus::EventBus;
use bodesk_modal::{Clock, JsonBag, MergeData, ModalStore, SystemClock};
use bodesk_url::{Navigator, Reconciled, UrlSynchronizer};

use crate::policy::ModalPolicy;

pub struct ModalContext<D: MergeData + Default = JsonBag> {
    policy: ModalPolicy,
    store: ModalStore<D>,
    bus: EventBus,
    sync: Option<UrlSynchronizer<D>>,
}

impl<D: MergeData + Default> fmt::Debug for ModalContext<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalContext")
            .field("policy", &self.policy)
            .field("depth", &self.store.depth())
            .field("bus", &self.bus)
            .field("synchronized", &self.sync.is_some())
            .finish()
    }
}

impl<D: MergeData + Default> Default for ModalContext<D> {
    fn default() -> Self {
        Self::new(ModalPolicy::default())
    }
}

impl<D: MergeData + Default> ModalContext<D> {
    #[must_use]
    pub fn new(policy: ModalPolicy) -> Self {
        Self::with_clock(policy, Rc::new(SystemClock))
    }

    /// Context whose deadlines are measured against `clock`.
    #[must_use]
    pub fn with_clock(policy: ModalPolicy, clock: Rc<dyn Clock>) -> Self {
        let store = ModalStore::builder()
            .close_grace(policy.close_grace)
            .clock(clock)
            .build();
        tracing::debug!(?policy, "modal context created");
        Self {
            policy,
            store,
            bus: EventBus::with_history_capacity(policy.history_capacity),
            sync: None,
        }
    }

    /// Start mirroring the store into `navigator` and reconcile the store
    /// with its current address (deep links open here).
    ///
    /// Replaces any navigator attached earlier.
    pub fn attach_navigator(&mut self, navigator: Rc<dyn Navigator>) -> Reconciled {
        let sync = UrlSynchronizer::builder(&self.store, navigator)
            .nav_guard(self.policy.nav_guard)
            .build();
        let outcome = sync.sync_from_location();
        self.sync = Some(sync);
        outcome
    }

    /// Stop mirroring. The store keeps its state.
    pub fn detach_navigator(&mut self) {
        self.sync = None;
    }

    /// Forward a host address change. `None` without a navigator.
    pub fn on_location_change(&self, address: &str) -> Option<Reconciled> {
        self.sync.as_ref().map(|s| s.on_location_change(address))
    }

    /// Run deferred work whose deadline has passed. Returns `true` if
    /// anything changed.
    pub fn tick(&self) -> bool {
        let cleared = self.store.tick();
        let released = self.sync.as_ref().is_some_and(UrlSynchronizer::tick);
        cleared || released
    }

    /// Drop every modal, listener, and history entry.
    pub fn reset(&self) {
        self.store.reset();
        self.bus.reset();
    }

    #[must_use]
    pub fn policy(&self) -> ModalPolicy {
        self.policy
    }

    #[must_use]
    pub fn store(&self) -> &ModalStore<D> {
        &self.store
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub fn synchronizer(&self) -> Option<&UrlSynchronizer<D>> {
        self.sync.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bodesk_modal::{ManualClock, ModalConfiguration};
    use bodesk_url::MemoryNavigator;
    use std::time::Duration;

    #[test]
    fn policy_flows_into_parts() {
        let ctx: ModalContext = ModalContext::new(ModalPolicy::default().history_capacity(5));
        assert_eq!(ctx.bus().history_capacity(), 5);
        assert!(ctx.synchronizer().is_none());
    }

    #[test]
    fn tick_applies_close_grace() {
        let clock = Rc::new(ManualClock::new());
        let ctx: ModalContext = ModalContext::with_clock(ModalPolicy::default(), clock.clone());
        ctx.store().open(ModalConfiguration::entity("store", "1"));
        ctx.store().close();
        assert!(!ctx.tick());

        clock.advance(Duration::from_millis(300));
        assert!(ctx.tick());
        assert!(ctx.store().active().is_none());
    }

    #[test]
    fn attach_navigator_opens_deep_link() {
        let mut ctx: ModalContext = ModalContext::new(ModalPolicy::headless());
        let nav = Rc::new(MemoryNavigator::new("/users?modal=true&modalEntity=user&modalId=8"));
        assert!(matches!(ctx.attach_navigator(nav), Reconciled::Opened(_)));
        assert_eq!(
            ctx.store().active().and_then(|m| m.entity_id).as_deref(),
            Some("8")
        );
    }

    #[test]
    fn detached_context_ignores_locations() {
        let mut ctx: ModalContext = ModalContext::new(ModalPolicy::headless());
        ctx.attach_navigator(Rc::new(MemoryNavigator::new("/")));
        ctx.detach_navigator();
        assert_eq!(ctx.on_location_change("/?modal=true"), None);
    }

    #[test]
    fn reset_clears_store_and_bus() {
        let ctx: ModalContext = ModalContext::default();
        ctx.store().open(ModalConfiguration::entity("store", "1"));
        let _sub = ctx.bus().on("e", |_| {});
        ctx.bus().emit("e", serde_json::json!(1));
        ctx.reset();
        assert_eq!(ctx.store().depth(), 0);
        assert_eq!(ctx.bus().listener_count("e"), 0);
        assert!(ctx.bus().history("e", None).is_empty());
    }
}
