//! Failure types.
//!
//! The access surface of the cache is infallible by design: misses, absent
//! keys, and repeated removals all resolve to benign return values. Errors
//! exist at exactly two edges, and each edge gets its own type so callers
//! can match on intent instead of parsing strings:
//!
//! - [`ConfigError`]: a builder was handed parameters the cache cannot run
//!   with; produced by
//!   [`MemoryCacheBuilder::try_build`](crate::builder::MemoryCacheBuilder::try_build).
//! - [`InvariantError`]: a `check_invariants` call found the internal
//!   structures out of agreement; raised by tests and fuzz harnesses, never
//!   by normal operation.
//!
//! ```
//! use std::time::Duration;
//!
//! use memkit::cache::MemoryCache;
//!
//! let err = MemoryCache::<u64, u64>::builder()
//!     .auto_trim_interval(Duration::ZERO)
//!     .try_build()
//!     .unwrap_err();
//!
//! assert!(err.reason().contains("interval"));
//! assert!(err.to_string().starts_with("invalid cache configuration"));
//! ```

use std::error::Error;
use std::fmt;

/// Rejected cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    reason: String,
}

impl ConfigError {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Why the configuration was refused.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid cache configuration: {}", self.reason)
    }
}

impl Error for ConfigError {}

/// Violated structural invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError {
    violation: String,
}

impl InvariantError {
    pub(crate) fn new(violation: impl Into<String>) -> Self {
        Self {
            violation: violation.into(),
        }
    }

    /// Which invariant failed.
    pub fn violation(&self) -> &str {
        &self.violation
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cache invariant violated: {}", self.violation)
    }
}

impl Error for InvariantError {}
