//! Resolution of the user a cart belongs to.
//!
//! Authentication itself is handled upstream; the store only needs to know
//! whether there is a user and which one.

use async_trait::async_trait;
use thiserror::Error;

use iwishbag_core::UserId;

/// Failure to determine the current user.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The identity source could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Source of the currently authenticated user.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns `Ok(None)` when nobody is signed in.
    async fn current_user(&self) -> Result<Option<UserId>, IdentityError>;
}

/// Always resolves to the same user.
#[derive(Debug, Clone, Copy)]
pub struct FixedIdentity(pub UserId);

#[async_trait]
impl IdentityProvider for FixedIdentity {
    async fn current_user(&self) -> Result<Option<UserId>, IdentityError> {
        Ok(Some(self.0))
    }
}

/// Never resolves to a user; the cart runs in guest mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuestIdentity;

#[async_trait]
impl IdentityProvider for GuestIdentity {
    async fn current_user(&self) -> Result<Option<UserId>, IdentityError> {
        Ok(None)
    }
}
