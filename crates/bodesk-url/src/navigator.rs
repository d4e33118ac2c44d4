#![forbid(unsafe_code)]

//! Host navigation boundary.
//!
//! The synchronizer never touches a router directly. It asks a [`Navigator`]
//! for the current address and requests navigations; the host commits them
//! on its own schedule and reports every address change back through
//! [`UrlSynchronizer::on_location_change`](crate::UrlSynchronizer::on_location_change).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// How a navigation should be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Replace the current history entry instead of pushing a new one.
    pub replace: bool,
    /// Scroll to the top after navigating. Modal navigations never do.
    pub scroll: bool,
}

impl NavigateOptions {
    /// New history entry, no scroll.
    #[must_use]
    pub const fn push() -> Self {
        Self {
            replace: false,
            scroll: false,
        }
    }

    /// Overwrite the current entry, no scroll.
    #[must_use]
    pub const fn replace() -> Self {
        Self {
            replace: true,
            scroll: false,
        }
    }
}

/// A router or history API the synchronizer can drive.
pub trait Navigator {
    /// Current address: a full URL or a path with query.
    fn location(&self) -> String;

    /// Request a navigation. Completion may happen later.
    fn navigate(&self, address: &str, options: NavigateOptions);
}

impl<N: Navigator + ?Sized> Navigator for Rc<N> {
    fn location(&self) -> String {
        (**self).location()
    }

    fn navigate(&self, address: &str, options: NavigateOptions) {
        (**self).navigate(address, options);
    }
}

#[derive(Debug, Default)]
struct History {
    entries: Vec<String>,
    index: usize,
    pending: VecDeque<(String, NavigateOptions)>,
    requested: Vec<(String, NavigateOptions)>,
}

/// In-memory history with deferred commits.
///
/// `navigate` only queues; [`commit`](Self::commit) applies the queue and
/// returns the addresses the host would report. This mirrors a browser
/// router, where the address changes after the call that requested it.
#[derive(Debug)]
pub struct MemoryNavigator {
    history: RefCell<History>,
}

impl MemoryNavigator {
    #[must_use]
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            history: RefCell::new(History {
                entries: vec![initial.into()],
                ..History::default()
            }),
        }
    }

    /// Apply queued navigations in order. Returns the committed addresses.
    pub fn commit(&self) -> Vec<String> {
        let mut h = self.history.borrow_mut();
        let mut committed = Vec::with_capacity(h.pending.len());
        while let Some((address, options)) = h.pending.pop_front() {
            if options.replace {
                let index = h.index;
                h.entries[index] = address.clone();
            } else {
                let keep = h.index + 1;
                h.entries.truncate(keep);
                h.entries.push(address.clone());
                h.index = keep;
            }
            committed.push(address);
        }
        committed
    }

    /// Simulate the user entering an address. Returns it for reporting.
    pub fn visit(&self, address: impl Into<String>) -> String {
        let address = address.into();
        let mut h = self.history.borrow_mut();
        let keep = h.index + 1;
        h.entries.truncate(keep);
        h.entries.push(address.clone());
        h.index = keep;
        address
    }

    /// Step back in history. Returns the new address, if there was one.
    pub fn back(&self) -> Option<String> {
        let mut h = self.history.borrow_mut();
        h.index = h.index.checked_sub(1)?;
        h.entries.get(h.index).cloned()
    }

    /// Step forward in history. Returns the new address, if there was one.
    pub fn forward(&self) -> Option<String> {
        let mut h = self.history.borrow_mut();
        if h.index + 1 >= h.entries.len() {
            return None;
        }
        h.index += 1;
        h.entries.get(h.index).cloned()
    }

    /// Number of navigations requested but not yet committed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.history.borrow().pending.len()
    }

    /// Every navigation ever requested, committed or not.
    #[must_use]
    pub fn requested(&self) -> Vec<(String, NavigateOptions)> {
        self.history.borrow().requested.clone()
    }

    /// History entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.history.borrow().entries.clone()
    }
}

impl Navigator for MemoryNavigator {
    fn location(&self) -> String {
        let h = self.history.borrow();
        h.entries.get(h.index).cloned().unwrap_or_default()
    }

    fn navigate(&self, address: &str, options: NavigateOptions) {
        let mut h = self.history.borrow_mut();
        h.pending.push_back((address.to_owned(), options));
        h.requested.push((address.to_owned(), options));
    }
}
