#![forbid(unsafe_code)]

//! Address-bar synchronization for the modal stack.
//!
//! Makes the active modal reconstructable from the address the user sees,
//! so back/forward navigation and shared links reopen the right modal.
//!
//! - [`ModalQuery`]: the query-string codec (`modal`, `modalEntity`, ...,
//!   `mp_<name>`).
//! - [`Navigator`]: the host router boundary, with [`MemoryNavigator`] for
//!   headless hosts and tests.
//! - [`UrlSynchronizer`]: keeps a store and a navigator in agreement without
//!   the two fighting over who changed what.

pub mod address;
pub mod navigator;
pub mod query;
pub mod sync;

pub use address::{Address, AddressError};
pub use navigator::{MemoryNavigator, NavigateOptions, Navigator};
pub use query::{ModalQuery, is_modal_key, strip};
pub use sync::{DEFAULT_NAV_GUARD, Reconciled, UrlSyncBuilder, UrlSynchronizer};
