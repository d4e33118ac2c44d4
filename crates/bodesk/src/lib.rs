#![forbid(unsafe_code)]

//! Modal orchestration for back-office applications.
//!
//! `bodesk` ties together the modal building blocks:
//!
//! - [`modal`]: the modal stack store and step wizard engine.
//! - [`url`]: two-way sync between the stack and the address bar.
//! - [`bus`]: a cross-modal event bus with bounded history.
//! - [`reactive`]: the observable primitives the store is built on.
//!
//! [`ModalContext`] wires them together from one [`ModalPolicy`].
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use bodesk::prelude::*;
//!
//! let mut ctx: ModalContext = ModalContext::new(ModalPolicy::headless());
//! let nav = Rc::new(MemoryNavigator::new("/stores"));
//! ctx.attach_navigator(nav.clone());
//!
//! ctx.store().open(ModalConfiguration::entity("store", "12"));
//! for address in nav.commit() {
//!     ctx.on_location_change(&address);
//! }
//! assert_eq!(nav.location(), "/stores?modal=true&modalEntity=store&modalId=12");
//! ```

pub mod context;
pub mod logging;
pub mod policy;

pub use bodesk_bus as bus;
pub use bodesk_modal as modal;
pub use bodesk_reactive as reactive;
pub use bodesk_url as url;

pub use context::ModalContext;
pub use policy::{ModalPolicy, PolicyError};

/// Common imports for hosts.
pub mod prelude {
    pub use crate::context::ModalContext;
    pub use crate::policy::ModalPolicy;
    pub use bodesk_bus::{BusSubscription, EventBus};
    #[cfg(feature = "test-helpers")]
    pub use bodesk_modal::ManualClock;
    pub use bodesk_modal::{
        Clock, ConfigPatch, JsonBag, ModalConfiguration, ModalContent, ModalId, ModalMode,
        ModalRegistry, ModalSize, ModalStep, ModalStore, StepOutcome, SystemClock, json_bag,
    };
    pub use bodesk_url::{MemoryNavigator, NavigateOptions, Navigator, Reconciled, UrlSynchronizer};
}
