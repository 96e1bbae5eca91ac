//! Identity seam - Who is calling.
//!
//! The ledger never authenticates anyone itself. Front ends implement
//! [`IdentityProvider`] and the facade asks it for the caller before every action.

use crate::errors::{Error, Result};

/// The authenticated caller of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    /// Profile ID
    pub id: String,
}

/// Source of the current caller's identity.
pub trait IdentityProvider {
    /// Returns the caller, or [`Error::Unauthenticated`] if there is none.
    fn current_user(&self) -> Result<CurrentUser>;
}

/// Identity fixed at construction, used by background jobs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<String>);

impl StaticIdentity {
    /// An authenticated caller.
    pub fn user(id: impl Into<String>) -> Self {
        Self(Some(id.into()))
    }

    /// No caller at all.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Result<CurrentUser> {
        self.0
            .as_ref()
            .filter(|id| !id.trim().is_empty())
            .map(|id| CurrentUser { id: id.clone() })
            .ok_or(Error::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_static_identity() {
        assert_eq!(StaticIdentity::user("alice").current_user().unwrap().id, "alice");
        assert!(matches!(
            StaticIdentity::anonymous().current_user(),
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            StaticIdentity::user("  ").current_user(),
            Err(Error::Unauthenticated)
        ));
    }
}
