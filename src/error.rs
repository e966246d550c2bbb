//! Error taxonomy for the harness.
//!
//! Locator and wait failures abort the current check and carry the facet, selector or
//! value that could not be resolved. Lifecycle problems (stale server, closed browser)
//! are logged by their callers and never surface through here.

use std::time::Duration;

use thiserror::Error;

use crate::invariants::InvariantViolation;

/// Errors raised while driving a listing page
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Zero elements matched where at least one was required
    #[error("no element matched {what}")]
    NotFound { what: String },

    /// More than one element matched where exactly one was required
    #[error("expected exactly one element for {what}, found {count}")]
    AmbiguousMatch { what: String, count: usize },

    /// A bounded wait ran out of budget
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    /// The server port is already bound by another listener
    #[error("port {port} on {host} is already in use")]
    ResourceInUse { host: String, port: u16 },

    /// A distance-sequence step was invoked from the wrong state
    #[error("nearby sequence out of order: {0}")]
    OutOfOrder(String),

    /// An observed visible-set broke the filter-state contract
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    /// The automation driver reported a failure
    #[error("browser automation error: {0}")]
    Browser(#[from] playwright_rs::Error),

    /// A page script returned nothing the harness can act on
    #[error("unexpected page script result: {0}")]
    Script(String),

    /// Configuration could not be loaded
    #[error("config error: {0}")]
    Config(String),

    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The readiness check could not reach the content server
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl HarnessError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub(crate) fn timeout(what: impl Into<String>, waited: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            waited,
        }
    }

    /// True for conditions that mean "the page did not contain what we asked for"
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::AmbiguousMatch { .. } | Self::Timeout { .. }
        )
    }
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_unresolved_target() {
        let err = HarnessError::AmbiguousMatch {
            what: "input.cuisine-checkbox[data-cuisine='Biryani']".to_string(),
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "expected exactly one element for input.cuisine-checkbox[data-cuisine='Biryani'], found 2"
        );

        let err = HarnessError::timeout(".food-place-card", Duration::from_secs(15));
        assert_eq!(
            err.to_string(),
            "timed out after 15s waiting for .food-place-card"
        );
    }

    #[test]
    fn lookup_failures_are_classified() {
        assert!(HarnessError::not_found("x").is_lookup_failure());
        assert!(HarnessError::timeout("x", Duration::from_millis(1)).is_lookup_failure());
        assert!(!HarnessError::Config("bad".into()).is_lookup_failure());
        assert!(
            !HarnessError::ResourceInUse {
                host: "127.0.0.1".into(),
                port: 8888
            }
            .is_lookup_failure()
        );
    }
}
