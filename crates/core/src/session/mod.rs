//! Authentication state for the running application.
//!
//! [`SessionManager`] is the single owner of "who is logged in". It resolves the
//! persisted credential at startup, exposes logout, and enforces the inactivity
//! timeout. Route guards read its snapshots through [`guard::evaluate`].

pub mod guard;
pub mod inactivity;
mod manager;

use async_trait::async_trait;

use crate::{error::ApiError, models::User};

pub use guard::{evaluate, GuardOutcome, GuardPolicy};
pub use inactivity::{ActivitySignal, InactivityWatch};
pub use manager::{SessionManager, SessionNotice};

/// Remote identity lookup consumed by the session manager.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// User owning the stored credential ("who am I").
    async fn current_user(&self) -> Result<User, ApiError>;

    /// Best-effort notification that `token` has been discarded locally.
    async fn end_session(&self, _token: &str) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// Logged-in user; always `Some` while authenticated.
    pub user: Option<User>,
    /// `true` once a credential has been confirmed by the server.
    pub is_authenticated: bool,
    /// `true` only until the startup resolution has finished.
    pub loading: bool,
}

impl SessionState {
    /// State at application start, before the credential has been checked.
    pub fn initial() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            loading: true,
        }
    }

    /// Resolved state for the given user, or logged out for `None`.
    pub fn resolved(user: Option<User>) -> Self {
        Self {
            is_authenticated: user.is_some(),
            user,
            loading: false,
        }
    }

    /// Authenticated with the admin role.
    pub fn is_admin(&self) -> bool {
        self.is_authenticated && self.user.as_ref().is_some_and(User::is_admin)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initial()
    }
}
