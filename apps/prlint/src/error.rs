//! Error taxonomy.
//!
//! `FatalError` stops the run and maps to a distinguished exit status.
//! `Unavailable` is an ordinary value: one operation for one file could not
//! be computed, the file is recorded as skipped, and the run continues.

use thiserror::Error;

/// Exit status for configuration errors.
pub const EXIT_CONFIG: i32 = 2;
/// Exit status for repository and checkout errors.
pub const EXIT_CHECKOUT: i32 = 3;

#[derive(Debug, Error)]
pub enum FatalError {
    #[error("not a git repository: {0}")]
    MissingRepository(String),
    #[error("checkout mismatch: expected {expected}, found {actual}")]
    CheckoutMismatch { expected: String, actual: String },
    #[error("revision does not resolve to a commit: {0}")]
    UnresolvableRevision(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FatalError {
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::Config(_) => EXIT_CONFIG,
            FatalError::MissingRepository(_)
            | FatalError::CheckoutMismatch { .. }
            | FatalError::UnresolvableRevision(_) => EXIT_CHECKOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{what} unavailable: {reason}")]
/// An operation's result could not be computed; never read as "zero issues".
pub struct Unavailable {
    pub what: &'static str,
    pub reason: String,
}

impl Unavailable {
    pub fn new(what: &'static str, reason: impl Into<String>) -> Self {
        Self {
            what,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinguished() {
        let mismatch = FatalError::CheckoutMismatch {
            expected: "a".into(),
            actual: "b".into(),
        };
        assert_eq!(mismatch.exit_code(), EXIT_CHECKOUT);
        assert_eq!(FatalError::Config("x".into()).exit_code(), EXIT_CONFIG);
        assert_ne!(EXIT_CHECKOUT, 1);
    }

    #[test]
    fn test_unavailable_display() {
        let u = Unavailable::new("blame", "file absent at abc");
        assert_eq!(u.to_string(), "blame unavailable: file absent at abc");
    }
}
