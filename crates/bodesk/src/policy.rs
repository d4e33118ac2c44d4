#![forbid(unsafe_code)]

//! Timing and capacity policy for the modal layer.
//!
//! | Field | Default | Env override |
//! |-------|---------|--------------|
//! | `close_grace` | 300 ms | `BODESK_CLOSE_GRACE_MS` |
//! | `nav_guard` | 150 ms | `BODESK_NAV_GUARD_MS` |
//! | `history_capacity` | 50 | `BODESK_HISTORY_CAPACITY` |
//!
//! With the `policy-config` feature, a policy can also be read from TOML or
//! JSON. Durations are written in milliseconds:
//!
//! ```toml
//! close_grace_ms = 200
//! nav_guard_ms = 250
//! history_capacity = 100
//! ```
//!
//! Missing keys keep their defaults.

use std::fmt;
use std::time::Duration;

use bodesk_bus::DEFAULT_HISTORY_CAPACITY;
use bodesk_modal::DEFAULT_CLOSE_GRACE;
use bodesk_url::DEFAULT_NAV_GUARD;

pub const ENV_CLOSE_GRACE_MS: &str = "BODESK_CLOSE_GRACE_MS";
pub const ENV_NAV_GUARD_MS: &str = "BODESK_NAV_GUARD_MS";
pub const ENV_HISTORY_CAPACITY: &str = "BODESK_HISTORY_CAPACITY";

/// Errors from loading or overriding a [`ModalPolicy`].
#[derive(Debug)]
pub enum PolicyError {
    /// An environment override is not a non-negative integer.
    InvalidEnv { var: &'static str, value: String },
    #[cfg(feature = "policy-config")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[cfg(feature = "policy-config")]
    Toml(toml::de::Error),
    #[cfg(feature = "policy-config")]
    Json(serde_json::Error),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnv { var, value } => {
                write!(f, "{var} must be a non-negative integer, got {value:?}")
            }
            #[cfg(feature = "policy-config")]
            Self::Io { path, source } => {
                write!(f, "cannot read policy file {}: {source}", path.display())
            }
            #[cfg(feature = "policy-config")]
            Self::Toml(e) => write!(f, "invalid TOML policy: {e}"),
            #[cfg(feature = "policy-config")]
            Self::Json(e) => write!(f, "invalid JSON policy: {e}"),
        }
    }
}

impl std::error::Error for PolicyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidEnv { .. } => None,
            #[cfg(feature = "policy-config")]
            Self::Io { source, .. } => Some(source),
            #[cfg(feature = "policy-config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "policy-config")]
            Self::Json(e) => Some(e),
        }
    }
}

/// Tunables shared by the store, the synchronizer, and the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ModalPolicy {
    /// Exit-transition window before a closed modal's data is cleared.
    #[cfg_attr(feature = "policy-config", serde(rename = "close_grace_ms", with = "millis"))]
    pub close_grace: Duration,
    /// How long a self-initiated navigation suppresses reconciliation.
    #[cfg_attr(feature = "policy-config", serde(rename = "nav_guard_ms", with = "millis"))]
    pub nav_guard: Duration,
    /// Payloads kept per bus event.
    pub history_capacity: usize,
}

impl Default for ModalPolicy {
    fn default() -> Self {
        Self {
            close_grace: DEFAULT_CLOSE_GRACE,
            nav_guard: DEFAULT_NAV_GUARD,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl ModalPolicy {
    /// Policy for headless hosts: no exit window, so closes clear at once.
    #[must_use]
    pub fn headless() -> Self {
        Self {
            close_grace: Duration::ZERO,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    #[must_use]
    pub fn nav_guard(mut self, window: Duration) -> Self {
        self.nav_guard = window;
        self
    }

    #[must_use]
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Apply `BODESK_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self, PolicyError> {
        self.with_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, PolicyError> {
        let read = |var: &'static str| -> Result<Option<u64>, PolicyError> {
            let Some(value) = lookup(var) else {
                return Ok(None);
            };
            match value.trim().parse() {
                Ok(n) => Ok(Some(n)),
                Err(_) => Err(PolicyError::InvalidEnv { var, value }),
            }
        };
        if let Some(ms) = read(ENV_CLOSE_GRACE_MS)? {
            self.close_grace = Duration::from_millis(ms);
        }
        if let Some(ms) = read(ENV_NAV_GUARD_MS)? {
            self.nav_guard = Duration::from_millis(ms);
        }
        if let Some(n) = read(ENV_HISTORY_CAPACITY)? {
            self.history_capacity = usize::try_from(n).unwrap_or(usize::MAX);
        }
        Ok(self)
    }
}

#[cfg(feature = "policy-config")]
impl ModalPolicy {
    pub fn from_toml_str(s: &str) -> Result<Self, PolicyError> {
        toml::from_str(s).map_err(PolicyError::Toml)
    }

    pub fn from_json_str(s: &str) -> Result<Self, PolicyError> {
        serde_json::from_str(s).map_err(PolicyError::Json)
    }

    /// Read a policy file. `.json` files are JSON, anything else is TOML.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let policy = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            _ => Self::from_toml_str(&text)?,
        };
        tracing::debug!(path = %path.display(), ?policy, "modal policy loaded");
        Ok(policy)
    }
}

#[cfg(feature = "policy-config")]
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
