#![forbid(unsafe_code)]

//! Reactive state primitives for the bodesk modal layer.
//!
//! This crate provides the change-tracking primitives the modal store is
//! built on:
//!
//! - [`Observable`]: A shared, version-tracked value wrapper with change
//!   notification via subscriber callbacks.
//! - [`Subscription`]: RAII guard that automatically unsubscribes on drop.
//! - [`Binding`]: A read-only, lazily evaluated view over an observable.
//! - [`BindingScope`]: Owner for a group of subscriptions with one lifetime.
//!
//! # Architecture
//!
//! `Observable<T>` uses `Rc<RefCell<..>>` for single-threaded shared ownership.
//! Subscribers are stored as `Weak` function pointers and cleaned up lazily
//! during notification. The whole modal layer runs on one cooperative event
//! loop, so there is no locking anywhere in this crate.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op (no version bump,
//!    no notifications).
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 5. No internal borrow is held while subscribers run, so a subscriber may
//!    read or write any observable, including the one that notified it.

pub mod binding;
pub mod observable;

pub use binding::{Binding, BindingScope, bind_mapped, bind_observable};
pub use observable::{Observable, Subscription};
