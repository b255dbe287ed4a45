//! Shared-secret gate used by the leader, the router and the leaf echo check.

use std::fmt;

use subtle::ConstantTimeEq;

use crate::error::CoreError;

/// The mesh-wide shared key.
///
/// Equal-length keys are compared in constant time. The value never appears
/// in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(String);

impl SharedSecret {
    /// Wrap a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key, for placing in outbound request bodies only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Constant-time equality against a presented key.
    pub fn matches(&self, presented: &str) -> bool {
        bool::from(self.0.as_bytes().ct_eq(presented.as_bytes()))
    }

    /// Reject a request whose key is absent or wrong.
    pub fn authenticate(&self, presented: Option<&str>) -> Result<(), CoreError> {
        match presented {
            Some(key) if self.matches(key) => Ok(()),
            _ => Err(CoreError::Authentication),
        }
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}
