#![forbid(unsafe_code)]

//! Snapshot of the modal stack.

use crate::config::ModalConfiguration;
use crate::id::ModalId;

/// The active modal plus the modals suspended beneath it.
///
/// # Invariants
///
/// - `suspended` is ordered bottom to top (oldest first).
/// - `active` is the logical top of the stack.
/// - If `active.parent_id` is set, a modal with that id is in `suspended`.
/// - `open == false` with a non-empty `active` means a close is in its exit
///   window: the renderer hides the modal, the data is still there.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalStackState<D> {
    pub active: Option<ModalConfiguration<D>>,
    pub suspended: Vec<ModalConfiguration<D>>,
    pub open: bool,
}

impl<D> Default for ModalStackState<D> {
    fn default() -> Self {
        Self {
            active: None,
            suspended: Vec::new(),
            open: false,
        }
    }
}

impl<D> ModalStackState<D> {
    /// Id of the active modal.
    #[must_use]
    pub fn active_id(&self) -> Option<ModalId> {
        self.active.as_ref().and_then(ModalConfiguration::id)
    }

    /// Resolve an optional target to a concrete id: `None` means the active
    /// modal.
    #[must_use]
    pub fn resolve(&self, target: Option<ModalId>) -> Option<ModalId> {
        target.or_else(|| self.active_id())
    }

    /// Look a modal up by id, active first, then the suspended stack.
    #[must_use]
    pub fn find(&self, id: ModalId) -> Option<&ModalConfiguration<D>> {
        self.active
            .iter()
            .chain(self.suspended.iter().rev())
            .find(|m| m.id == Some(id))
    }

    /// Mutable variant of [`find`](Self::find).
    pub fn find_mut(&mut self, id: ModalId) -> Option<&mut ModalConfiguration<D>> {
        self.active
            .iter_mut()
            .chain(self.suspended.iter_mut().rev())
            .find(|m| m.id == Some(id))
    }

    /// Index in `suspended`, or `suspended.len()` for the active modal.
    #[must_use]
    pub fn position(&self, id: ModalId) -> Option<usize> {
        if self.active_id() == Some(id) {
            return Some(self.suspended.len());
        }
        self.suspended.iter().position(|m| m.id == Some(id))
    }

    /// Total number of modals held, active included.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.suspended.len() + usize::from(self.active.is_some())
    }

    /// Whether a suspended modal is waiting beneath the active one.
    #[must_use]
    pub fn has_stack(&self) -> bool {
        !self.suspended.is_empty()
    }

    /// Walk `parent_id` links from `id` towards the root, nearest first.
    ///
    /// The walk is bounded by the stack depth, so a corrupted cycle cannot
    /// loop forever.
    #[must_use]
    pub fn ancestors(&self, id: ModalId) -> Vec<&ModalConfiguration<D>> {
        let mut out = Vec::new();
        let mut cursor = self.find(id).and_then(|m| m.parent_id);
        while let Some(parent_id) = cursor {
            if out.len() > self.depth() {
                break;
            }
            let Some(parent) = self.find(parent_id) else {
                break;
            };
            out.push(parent);
            cursor = parent.parent_id;
        }
        out
    }
}
