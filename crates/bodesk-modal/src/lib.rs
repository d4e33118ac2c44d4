#![forbid(unsafe_code)]

//! Modal stack store and step wizard engine.
//!
//! # Overview
//!
//! - [`ModalStore`]: the active modal plus a stack of suspended ones, with
//!   open/push/pop/close and targeted updates.
//! - Wizard operations on the same store ([`ModalStore::next_step`],
//!   [`ModalStore::prev_step`], [`ModalStore::go_to_step`],
//!   [`ModalStore::is_step_accessible`]) with two-phase, async-gated
//!   transitions.
//! - [`ModalRegistry`]: entity tag → content component lookup for renderers.
//!
//! The store is single-threaded (`Rc`, not `Arc`) and never blocks. Deferred
//! work (clearing a closed modal after its exit transition) is applied when
//! the host calls [`ModalStore::tick`].
//!
//! # Example
//!
//! ```
//! use bodesk_modal::{ModalConfiguration, ModalStep, ModalStore, StepOutcome};
//! use futures::executor::block_on;
//!
//! let store: ModalStore = ModalStore::new();
//! store.open(
//!     ModalConfiguration::entity("store", "new")
//!         .with_steps([ModalStep::new("details", "Details"), ModalStep::new("staff", "Staff")]),
//! );
//!
//! assert_eq!(block_on(store.next_step(None)), StepOutcome::Advanced { step: 1 });
//! assert_eq!(block_on(store.next_step(None)), StepOutcome::Completed);
//! ```

pub mod clock;
pub mod config;
pub mod data;
pub mod id;
pub mod registry;
pub mod state;
pub mod store;
pub mod wizard;

#[cfg(any(test, feature = "test-helpers"))]
pub use clock::ManualClock;
pub use clock::{Clock, SystemClock};
pub use config::{
    ActionFn, CompleteFn, ConfigPatch, GuardFn, HookFn, ModalCallbacks, ModalConfiguration,
    ModalMode, ModalSize, ModalStep, Presentation, UnknownVariant, WizardHooks,
};
pub use data::{JsonBag, MergeData, json_bag};
pub use id::ModalId;
pub use registry::{ContentFn, ModalContent, ModalRegistry};
pub use state::ModalStackState;
pub use store::{DEFAULT_CLOSE_GRACE, ModalStore, ModalStoreBuilder};
pub use wizard::StepOutcome;
