#![forbid(unsafe_code)]

//! Step wizard engine.
//!
//! Step state lives on the modal configuration (`steps`, `current_step`,
//! `steps_validation`); this module only adds the rules for moving through it.
//!
//! # Two-phase transitions
//!
//! `next_step` and `prev_step` first ask permission (step validation, the
//! modal-wide guard, the step hook), awaiting each in turn without holding a
//! borrow of the store. Only then do they re-read the modal by id and commit.
//! A rejection leaves `current_step` untouched. If the modal disappeared or
//! its step moved while the hooks ran, nothing is committed.
//!
//! # Re-entrancy
//!
//! One transition per modal at a time: a second `next_step`/`prev_step` for
//! the same id while the first is suspended returns [`StepOutcome::Busy`]
//! without running any hook.
//!
//! # Accessibility
//!
//! [`is_step_accessible`](ModalStore::is_step_accessible) is advisory, for
//! step pickers. [`go_to_step`](ModalStore::go_to_step) honors any in-range
//! index regardless of it.

use std::cell::RefCell;

use ahash::AHashSet;

use crate::config::{GuardFn, HookFn, ModalConfiguration};
use crate::data::MergeData;
use crate::id::ModalId;
use crate::store::ModalStore;

/// Result of a step navigation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Moved forward to `step`.
    Advanced { step: usize },
    /// Moved back to `step`.
    Retreated { step: usize },
    /// Last step passed; the completion hook (if any) ran.
    Completed,
    /// A validation or guard returned `false`.
    Rejected,
    /// Another transition for the same modal is still in flight.
    Busy,
    /// Nothing to do (no steps, already there, at the first step, or the
    /// step moved while hooks were running).
    Unchanged,
    /// No modal with that id (or nothing active).
    NotFound,
}

impl StepOutcome {
    /// Whether `current_step` changed or the wizard completed.
    #[must_use]
    pub const fn is_committed(self) -> bool {
        matches!(
            self,
            Self::Advanced { .. } | Self::Retreated { .. } | Self::Completed
        )
    }
}

/// Hooks captured in phase one of a transition.
struct StepPlan {
    id: ModalId,
    step: usize,
    validate: Option<GuardFn>,
    guard: Option<GuardFn>,
    hook: Option<HookFn>,
}

impl StepPlan {
    fn forward<D>(m: &ModalConfiguration<D>) -> Option<Self> {
        Some(Self {
            id: m.id?,
            step: m.current_step,
            validate: m.current().and_then(|s| s.validate.clone()),
            guard: m.hooks.before_next.clone(),
            hook: m.current().and_then(|s| s.on_next.clone()),
        })
    }

    fn backward<D>(m: &ModalConfiguration<D>) -> Option<Self> {
        Some(Self {
            id: m.id?,
            step: m.current_step,
            validate: None,
            guard: m.hooks.before_back.clone(),
            hook: m.current().and_then(|s| s.on_back.clone()),
        })
    }

    /// Run the permission phase. `false` means a gate said no.
    async fn permit(&self) -> bool {
        if let Some(validate) = &self.validate {
            if !validate().await {
                return false;
            }
        }
        if let Some(guard) = &self.guard {
            if !guard().await {
                return false;
            }
        }
        if let Some(hook) = &self.hook {
            hook().await;
        }
        true
    }
}

/// Marks a modal as mid-transition until dropped.
struct InFlight<'a> {
    set: &'a RefCell<AHashSet<ModalId>>,
    id: ModalId,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a RefCell<AHashSet<ModalId>>, id: ModalId) -> Option<Self> {
        let inserted = set.borrow_mut().insert(id);
        inserted.then(|| Self { set, id })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.borrow_mut().remove(&self.id);
    }
}

impl<D: MergeData> ModalStore<D> {
    /// Jump to `index`, clamped into the step range.
    ///
    /// Does not consult [`is_step_accessible`](Self::is_step_accessible).
    pub fn go_to_step(&self, index: isize, target: Option<ModalId>) -> StepOutcome {
        let Some((id, len, current)) = self
            .read(target, |m| m.id.map(|id| (id, m.steps.len(), m.current_step)))
            .flatten()
        else {
            return StepOutcome::NotFound;
        };
        if len == 0 {
            return StepOutcome::Unchanged;
        }
        let step = usize::try_from(index).unwrap_or(0).min(len - 1);
        if step == current {
            return StepOutcome::Unchanged;
        }
        self.modify(Some(id), |m| m.current_step = step);
        tracing::debug!(modal = %id, from = current, to = step, "step jump");
        if step > current {
            StepOutcome::Advanced { step }
        } else {
            StepOutcome::Retreated { step }
        }
    }

    /// Advance one step, or complete the wizard from its last step.
    ///
    /// Order: step `validate`, then `before_next`, then the step's `on_next`.
    /// The first two gate the transition; `on_next` is awaited for its
    /// effect only.
    pub async fn next_step(&self, target: Option<ModalId>) -> StepOutcome {
        let Some(plan) = self.read(target, StepPlan::forward).flatten() else {
            tracing::trace!("next_step with no modal");
            return StepOutcome::NotFound;
        };
        let Some(_in_flight) = InFlight::acquire(&self.inner.in_flight, plan.id) else {
            tracing::debug!(modal = %plan.id, "next_step while a transition is in flight");
            return StepOutcome::Busy;
        };
        if !plan.permit().await {
            tracing::debug!(modal = %plan.id, step = plan.step, "step advance rejected");
            return StepOutcome::Rejected;
        }

        let Some((current, last)) = self.read(Some(plan.id), |m| (m.current_step, m.is_last_step()))
        else {
            tracing::trace!(modal = %plan.id, "modal closed during step transition");
            return StepOutcome::NotFound;
        };
        if current != plan.step {
            tracing::debug!(modal = %plan.id, expected = plan.step, current, "stale step transition dropped");
            return StepOutcome::Unchanged;
        }
        if !last {
            let step = current + 1;
            self.modify(Some(plan.id), |m| m.current_step = step);
            tracing::debug!(modal = %plan.id, step, "step advanced");
            return StepOutcome::Advanced { step };
        }

        let complete = self
            .read(Some(plan.id), |m| {
                m.hooks.on_complete.clone().map(|hook| (hook, m.data.clone()))
            })
            .flatten();
        if let Some((hook, data)) = complete {
            hook(data).await;
        }
        tracing::debug!(modal = %plan.id, "wizard completed");
        StepOutcome::Completed
    }

    /// Go back one step. Guarded by `before_back`; the step's `on_back` runs
    /// before the move. No validation going backwards.
    pub async fn prev_step(&self, target: Option<ModalId>) -> StepOutcome {
        let Some(plan) = self.read(target, StepPlan::backward).flatten() else {
            tracing::trace!("prev_step with no modal");
            return StepOutcome::NotFound;
        };
        if plan.step == 0 {
            return StepOutcome::Unchanged;
        }
        let Some(_in_flight) = InFlight::acquire(&self.inner.in_flight, plan.id) else {
            tracing::debug!(modal = %plan.id, "prev_step while a transition is in flight");
            return StepOutcome::Busy;
        };
        if !plan.permit().await {
            tracing::debug!(modal = %plan.id, step = plan.step, "step retreat rejected");
            return StepOutcome::Rejected;
        }

        let Some(current) = self.read(Some(plan.id), |m| m.current_step) else {
            return StepOutcome::NotFound;
        };
        if current != plan.step {
            return StepOutcome::Unchanged;
        }
        let step = current - 1;
        self.modify(Some(plan.id), |m| m.current_step = step);
        tracing::debug!(modal = %plan.id, step, "step retreated");
        StepOutcome::Retreated { step }
    }

    /// Record whether `step_id` passed validation. `current_step` is left
    /// alone. Returns `true` if the record changed.
    pub fn set_step_validated(
        &self,
        step_id: &str,
        validated: bool,
        target: Option<ModalId>,
    ) -> bool {
        self.modify(target, |m| {
            m.steps_validation.insert(step_id.to_owned(), validated);
        })
    }

    /// Whether a step picker may jump straight to `index`.
    ///
    /// Step 0 and every visited step are accessible. A later step is
    /// accessible only when every step before it is recorded as validated.
    /// Invalidating an earlier step does not retract access to steps at or
    /// below `current_step`.
    #[must_use]
    pub fn is_step_accessible(&self, index: usize, target: Option<ModalId>) -> bool {
        self.read(target, |m| {
            if index >= m.steps.len() {
                return false;
            }
            if index == 0 || index <= m.current_step {
                return true;
            }
            m.steps[..index]
                .iter()
                .all(|s| m.steps_validation.get(&s.id).copied() == Some(true))
        })
        .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModalStep;
    use crate::data::{JsonBag, json_bag};
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn store() -> ModalStore {
        ModalStore::builder()
            .close_grace(Duration::ZERO)
            .first_id(1)
            .build()
    }

    fn abc() -> Vec<ModalStep> {
        vec![
            ModalStep::new("a", "Details"),
            ModalStep::new("b", "Staff"),
            ModalStep::new("c", "Review"),
        ]
    }

    fn wizard(steps: Vec<ModalStep>) -> ModalConfiguration {
        ModalConfiguration::entity("store", "new").with_steps(steps)
    }

    fn current(store: &ModalStore) -> Option<usize> {
        store.active().map(|m| m.current_step)
    }

    #[test]
    fn in_flight_rejects_second_acquire_and_keeps_first() {
        let set = RefCell::new(AHashSet::new());
        let id = ModalId::from_raw(7);

        let first = InFlight::acquire(&set, id).expect("free slot");
        assert!(InFlight::acquire(&set, id).is_none());
        assert!(set.borrow().contains(&id));

        drop(first);
        assert!(set.borrow().is_empty());
        assert!(InFlight::acquire(&set, id).is_some());
    }

    #[test]
    fn go_to_step_clamps() {
        let s = store();
        s.open(wizard(abc()));
        assert_eq!(s.go_to_step(5, None), StepOutcome::Advanced { step: 2 });
        assert_eq!(current(&s), Some(2));
        assert_eq!(s.go_to_step(-1, None), StepOutcome::Retreated { step: 0 });
        assert_eq!(current(&s), Some(0));
        assert_eq!(s.go_to_step(0, None), StepOutcome::Unchanged);
    }

    #[test]
    fn go_to_step_ignores_accessibility() {
        let s = store();
        s.open(wizard(abc()));
        assert!(!s.is_step_accessible(2, None));
        assert_eq!(s.go_to_step(2, None), StepOutcome::Advanced { step: 2 });
    }

    #[test]
    fn go_to_step_without_steps_or_modal() {
        let s = store();
        assert_eq!(s.go_to_step(1, None), StepOutcome::NotFound);
        s.open(ModalConfiguration::entity("store", "1"));
        let before = s.version();
        assert_eq!(s.go_to_step(1, None), StepOutcome::Unchanged);
        assert_eq!(s.version(), before);
    }

    #[test]
    fn step_zero_is_always_accessible() {
        let s = store();
        s.open(wizard(abc()));
        assert!(s.is_step_accessible(0, None));
        s.set_step_validated("a", false, None);
        assert!(s.is_step_accessible(0, None));
    }

    #[test]
    fn accessibility_requires_all_earlier_steps() {
        let s = store();
        s.open(wizard(abc()));
        s.set_step_validated("a", true, None);
        assert!(s.is_step_accessible(1, None));
        assert!(!s.is_step_accessible(2, None));

        s.set_step_validated("b", true, None);
        assert!(s.is_step_accessible(2, None));
        assert!(!s.is_step_accessible(3, None), "out of range");
    }

    #[test]
    fn visited_steps_stay_accessible_after_invalidation() {
        let s = store();
        s.open(wizard(abc()));
        s.go_to_step(2, None);
        s.set_step_validated("a", false, None);
        assert!(s.is_step_accessible(1, None));
        assert!(s.is_step_accessible(2, None));
    }

    #[test]
    fn accessibility_for_unknown_modal_is_false() {
        let s = store();
        assert!(!s.is_step_accessible(0, None));
        s.open(ModalConfiguration::entity("store", "1"));
        assert!(!s.is_step_accessible(0, None), "no steps");
    }

    #[test]
    fn set_step_validated_keeps_current_step() {
        let s = store();
        s.open(wizard(abc()));
        assert!(s.set_step_validated("b", true, None));
        assert!(!s.set_step_validated("b", true, None));
        let active = s.active().expect("active modal");
        assert_eq!(active.current_step, 0);
        assert_eq!(active.steps_validation.get("b"), Some(&true));
    }

    #[test]
    fn next_step_without_validate_advances() {
        let s = store();
        s.open(wizard(abc()));
        assert_eq!(block_on(s.next_step(None)), StepOutcome::Advanced { step: 1 });
        assert_eq!(current(&s), Some(1));
    }

    #[test]
    fn next_step_rejected_by_validation_does_not_move() {
        let s = store();
        let mut steps = abc();
        steps[0] = ModalStep::new("a", "Details").validate(|| async { false });
        s.open(wizard(steps));
        let before = s.version();

        assert_eq!(block_on(s.next_step(None)), StepOutcome::Rejected);
        assert_eq!(current(&s), Some(0));
        assert_eq!(s.version(), before);
    }

    #[test]
    fn next_step_passing_validation_advances() {
        let s = store();
        let mut steps = abc();
        steps[0] = ModalStep::new("a", "Details").validate(|| async { true });
        s.open(wizard(steps));
        assert_eq!(block_on(s.next_step(None)), StepOutcome::Advanced { step: 1 });
    }

    #[test]
    fn hooks_run_in_order_and_on_next_does_not_gate() {
        let log: Log = Rc::default();
        let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
        let step = ModalStep::new("a", "Details")
            .validate(move || {
                let l = l1.clone();
                async move {
                    l.borrow_mut().push("validate");
                    true
                }
            })
            .on_next(move || {
                let l = l3.clone();
                async move { l.borrow_mut().push("on_next") }
            });
        let config = wizard(vec![step, ModalStep::new("b", "Staff")]).before_next(move || {
            let l = l2.clone();
            async move {
                l.borrow_mut().push("before_next");
                true
            }
        });

        let s = store();
        s.open(config);
        assert_eq!(block_on(s.next_step(None)), StepOutcome::Advanced { step: 1 });
        assert_eq!(*log.borrow(), vec!["validate", "before_next", "on_next"]);
    }

    #[test]
    fn before_next_rejection_skips_on_next() {
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        let step = ModalStep::new("a", "Details").on_next(move || {
            let r = r.clone();
            async move { r.set(true) }
        });
        let s = store();
        s.open(wizard(vec![step, ModalStep::new("b", "Staff")]).before_next(|| async { false }));

        assert_eq!(block_on(s.next_step(None)), StepOutcome::Rejected);
        assert!(!ran.get());
        assert_eq!(current(&s), Some(0));
    }

    #[test]
    fn last_step_completes_with_fresh_data() {
        let seen: Rc<RefCell<Option<JsonBag>>> = Rc::default();
        let out = seen.clone();
        let config = wizard(abc()).on_complete(move |data| {
            let out = out.clone();
            async move { *out.borrow_mut() = Some(data) }
        });
        let s = store();
        s.open(config);
        s.go_to_step(2, None);
        s.update_data(json_bag(json!({ "name": "Depot" })), None);

        assert_eq!(block_on(s.next_step(None)), StepOutcome::Completed);
        assert_eq!(current(&s), Some(2));
        let data = seen.borrow().clone().expect("on_complete ran");
        assert_eq!(data.get("name"), Some(&json!("Depot")));
    }

    #[test]
    fn no_steps_completes() {
        let s = store();
        s.open(ModalConfiguration::entity("store", "1"));
        assert_eq!(block_on(s.next_step(None)), StepOutcome::Completed);
    }

    #[test]
    fn prev_step_at_start_is_unchanged() {
        let s = store();
        s.open(wizard(abc()));
        assert_eq!(block_on(s.prev_step(None)), StepOutcome::Unchanged);
    }

    #[test]
    fn prev_step_guarded_by_before_back() {
        let allow = Rc::new(Cell::new(false));
        let a = allow.clone();
        let s = store();
        s.open(wizard(abc()).before_back(move || {
            let ok = a.get();
            async move { ok }
        }));
        s.go_to_step(2, None);

        assert_eq!(block_on(s.prev_step(None)), StepOutcome::Rejected);
        assert_eq!(current(&s), Some(2));

        allow.set(true);
        assert_eq!(block_on(s.prev_step(None)), StepOutcome::Retreated { step: 1 });
    }

    #[test]
    fn prev_step_ignores_validation() {
        let mut steps = abc();
        steps[1] = ModalStep::new("b", "Staff").validate(|| async { false });
        let s = store();
        s.open(wizard(steps));
        s.go_to_step(1, None);
        assert_eq!(block_on(s.prev_step(None)), StepOutcome::Retreated { step: 0 });
    }

    #[test]
    fn next_step_targets_suspended_modal() {
        let s = store();
        let parent = s.open(wizard(abc()));
        s.push(ModalConfiguration::entity("cashier", "1"));
        assert_eq!(
            block_on(s.next_step(Some(parent))),
            StepOutcome::Advanced { step: 1 }
        );
        assert_eq!(s.get_modal_by_id(parent).map(|m| m.current_step), Some(1));
        assert_eq!(current(&s), Some(0));
    }

    fn pending_step() -> (ModalStep, oneshot::Sender<bool>) {
        let (tx, rx) = oneshot::channel::<bool>();
        let rx = Rc::new(RefCell::new(Some(rx)));
        let step = ModalStep::new("a", "Details").validate(move || {
            let rx = rx.borrow_mut().take();
            async move {
                match rx {
                    Some(rx) => rx.await.unwrap_or(false),
                    None => true,
                }
            }
        });
        (step, tx)
    }

    #[test]
    fn concurrent_next_step_is_busy() {
        let (step, tx) = pending_step();
        let s = store();
        s.open(wizard(vec![step, ModalStep::new("b", "Staff"), ModalStep::new("c", "Review")]));

        block_on(async {
            let mut first = Box::pin(s.next_step(None));
            assert!(futures::poll!(first.as_mut()).is_pending());

            assert_eq!(s.next_step(None).await, StepOutcome::Busy);
            assert_eq!(s.next_step(None).await, StepOutcome::Busy);
            assert_eq!(s.prev_step(None).await, StepOutcome::Unchanged);

            tx.send(true).expect("receiver alive");
            assert_eq!(first.await, StepOutcome::Advanced { step: 1 });
        });

        assert_eq!(block_on(s.next_step(None)), StepOutcome::Advanced { step: 2 });
    }

    #[test]
    fn step_moved_during_validation_is_not_committed() {
        let (step, tx) = pending_step();
        let s = store();
        s.open(wizard(vec![step, ModalStep::new("b", "Staff"), ModalStep::new("c", "Review")]));

        block_on(async {
            let mut first = Box::pin(s.next_step(None));
            assert!(futures::poll!(first.as_mut()).is_pending());
            s.go_to_step(2, None);
            tx.send(true).expect("receiver alive");
            assert_eq!(first.await, StepOutcome::Unchanged);
        });
        assert_eq!(current(&s), Some(2));
    }

    #[test]
    fn modal_closed_during_validation_is_a_noop() {
        let (step, tx) = pending_step();
        let s = store();
        s.open(wizard(vec![step, ModalStep::new("b", "Staff")]));

        block_on(async {
            let mut first = Box::pin(s.next_step(None));
            assert!(futures::poll!(first.as_mut()).is_pending());
            s.close();
            tx.send(true).expect("receiver alive");
            assert_eq!(first.await, StepOutcome::NotFound);
        });
        assert!(s.active().is_none());
    }

    #[test]
    fn outcome_commit_flag() {
        assert!(StepOutcome::Advanced { step: 1 }.is_committed());
        assert!(StepOutcome::Completed.is_committed());
        assert!(!StepOutcome::Busy.is_committed());
        assert!(!StepOutcome::Rejected.is_committed());
    }
}
