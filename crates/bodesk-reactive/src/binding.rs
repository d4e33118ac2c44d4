#![forbid(unsafe_code)]

//! Read bindings and subscription scopes over [`Observable`] values.
//!
//! A [`Binding<T>`] encapsulates an observable source plus an optional
//! transform, so a renderer can derive display values (is a modal open, which
//! id is on top) without holding the whole stack snapshot.
//!
//! # Usage
//!
//! ```
//! use bodesk_reactive::{Observable, bind_mapped, bind_observable};
//!
//! let depth = Observable::new(0usize);
//! let raw = bind_observable(&depth);
//! let label = bind_mapped(&depth, |d| format!("{d} open"));
//!
//! depth.set(2);
//! assert_eq!(raw.get(), 2);
//! assert_eq!(label.get(), "2 open");
//! ```
//!
//! # Invariants
//!
//! 1. `Binding::get()` always returns the current (not stale) value.
//! 2. A binding's transform is applied on every `get()` call (no caching).
//! 3. Bindings are `Clone` and share their source.
//! 4. Dropping a [`BindingScope`] releases every subscription it holds.

use std::fmt;
use std::rc::Rc;

use super::observable::{Observable, Subscription};

/// A read-only binding to an [`Observable`] value with an optional transform.
pub struct Binding<T> {
    eval: Rc<dyn Fn() -> T>,
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            eval: Rc::clone(&self.eval),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("value", &self.get())
            .finish()
    }
}

impl<T: 'static> Binding<T> {
    /// Get the current bound value.
    #[must_use]
    pub fn get(&self) -> T {
        (self.eval)()
    }
}

/// Create a direct binding to an observable.
pub fn bind_observable<T: Clone + PartialEq + 'static>(source: &Observable<T>) -> Binding<T> {
    let src = source.clone();
    Binding {
        eval: Rc::new(move || src.get()),
    }
}

/// Create a mapped binding: `source` value transformed by `map`.
///
/// The map borrows the source value, so large snapshots are never cloned.
pub fn bind_mapped<S: Clone + PartialEq + 'static, T: 'static>(
    source: &Observable<S>,
    map: impl Fn(&S) -> T + 'static,
) -> Binding<T> {
    let src = source.clone();
    Binding {
        eval: Rc::new(move || src.with(|v| map(v))),
    }
}

/// Collects subscriptions for one logical owner (a mounted modal host, a
/// synchronizer). Dropping the scope disconnects all of them.
#[derive(Default)]
pub struct BindingScope {
    subscriptions: Vec<Subscription>,
}

impl BindingScope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `sub` alive until the scope is dropped or cleared.
    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the scope holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release all subscriptions now. The scope stays usable.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

impl fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingScope")
            .field("binding_count", &self.subscriptions.len())
            .finish()
    }
}
