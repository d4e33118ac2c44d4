#![forbid(unsafe_code)]

//! Navigable addresses.
//!
//! Hosts report either absolute URLs (`https://host/stores?page=2`) or
//! path-relative ones (`/stores?page=2`). Both parse into an [`Address`] that
//! renders back in the form it came in, so the synchronizer can compare what
//! it navigated to with what the host later reports.

use std::fmt;

use url::Url;

/// Base used to resolve path-relative addresses. Never rendered.
const RELATIVE_BASE: &str = "http://localhost/";

/// Errors from [`Address::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The address could not be parsed as a URL or a path.
    Malformed {
        address: String,
        source: url::ParseError,
    },
    /// The URL has no path component (`mailto:`, `data:` and the like).
    CannotBeABase { address: String },
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { address, source } => {
                write!(f, "malformed address {address:?}: {source}")
            }
            Self::CannotBeABase { address } => {
                write!(f, "address {address:?} has no navigable path")
            }
        }
    }
}

impl std::error::Error for AddressError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Malformed { source, .. } => Some(source),
            Self::CannotBeABase { .. } => None,
        }
    }
}

/// A parsed navigable address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    url: Url,
    absolute: bool,
}

impl Address {
    /// Parse an absolute URL or a path-relative address (`/a?b=c`, `?b=c`).
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let malformed = |source| AddressError::Malformed {
            address: address.to_owned(),
            source,
        };
        let (url, absolute) = match Url::parse(address) {
            Ok(url) => (url, true),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = Url::parse(RELATIVE_BASE).map_err(malformed)?;
                (base.join(address).map_err(malformed)?, false)
            }
            Err(source) => return Err(malformed(source)),
        };
        if url.cannot_be_a_base() {
            return Err(AddressError::CannotBeABase {
                address: address.to_owned(),
            });
        }
        Ok(Self { url, absolute })
    }

    /// Raw query string without the leading `?`; empty if absent.
    #[must_use]
    pub fn query(&self) -> &str {
        self.url.query().unwrap_or("")
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Same address with its query replaced. An empty query drops the `?`.
    #[must_use]
    pub fn with_query(&self, query: &str) -> Self {
        let mut url = self.url.clone();
        url.set_query((!query.is_empty()).then_some(query));
        Self {
            url,
            absolute: self.absolute,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            return f.write_str(self.url.as_str());
        }
        f.write_str(self.url.path())?;
        if let Some(query) = self.url.query() {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = self.url.fragment() {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}
