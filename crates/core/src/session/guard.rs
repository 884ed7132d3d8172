//! Access checks for protected views.

use super::SessionState;
use crate::navigation::View;

/// Requirements a view places on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardPolicy {
    /// Only authenticated users may render the view.
    pub require_auth: bool,
    /// Only admins may render the view. Implies `require_auth`.
    pub require_admin: bool,
}

impl GuardPolicy {
    /// Open to everyone.
    pub const PUBLIC: Self = Self {
        require_auth: false,
        require_admin: false,
    };
    /// Any logged-in user.
    pub const AUTHENTICATED: Self = Self {
        require_auth: true,
        require_admin: false,
    };
    /// Admins only.
    pub const ADMIN: Self = Self {
        require_auth: true,
        require_admin: true,
    };

    fn is_public(&self) -> bool {
        !self.require_auth && !self.require_admin
    }
}

/// What the host should do with a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Session still resolving; show a waiting indicator and ask again later.
    Loading,
    /// Show this view instead.
    Redirect(View),
    /// Show the requested view.
    Render,
}

/// Decide whether a view guarded by `policy` may be shown for `state`.
///
/// Unauthenticated users are sent to login. Authenticated non-admins asking for an
/// admin view are sent home. Nothing protected renders while the session is loading.
pub fn evaluate(policy: GuardPolicy, state: &SessionState) -> GuardOutcome {
    if policy.is_public() {
        return GuardOutcome::Render;
    }
    if state.loading {
        return GuardOutcome::Loading;
    }
    if !state.is_authenticated {
        return GuardOutcome::Redirect(View::Login);
    }
    if policy.require_admin && !state.is_admin() {
        return GuardOutcome::Redirect(View::Home);
    }
    GuardOutcome::Render
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, User};

    fn signed_in(role: Role) -> SessionState {
        SessionState::resolved(Some(User {
            id: 3,
            name: "Nimal".to_string(),
            email: "nimal@example.lk".to_string(),
            role,
            is_verified: None,
            created_at: None,
            total_bookings: None,
        }))
    }

    #[test]
    fn loading_blocks_protected_views_only() {
        let state = SessionState::initial();
        assert_eq!(evaluate(GuardPolicy::PUBLIC, &state), GuardOutcome::Render);
        assert_eq!(evaluate(GuardPolicy::AUTHENTICATED, &state), GuardOutcome::Loading);
        assert_eq!(evaluate(GuardPolicy::ADMIN, &state), GuardOutcome::Loading);
    }

    #[test]
    fn anonymous_users_go_to_login() {
        let state = SessionState::resolved(None);
        assert_eq!(
            evaluate(GuardPolicy::AUTHENTICATED, &state),
            GuardOutcome::Redirect(View::Login)
        );
        assert_eq!(
            evaluate(GuardPolicy::ADMIN, &state),
            GuardOutcome::Redirect(View::Login)
        );
    }

    #[test]
    fn customers_are_sent_home_from_admin() {
        let state = signed_in(Role::Customer);
        assert_eq!(evaluate(GuardPolicy::AUTHENTICATED, &state), GuardOutcome::Render);
        assert_eq!(
            evaluate(GuardPolicy::ADMIN, &state),
            GuardOutcome::Redirect(View::Home)
        );
    }

    #[test]
    fn admins_render_everything() {
        let state = signed_in(Role::Admin);
        for policy in [GuardPolicy::PUBLIC, GuardPolicy::AUTHENTICATED, GuardPolicy::ADMIN] {
            assert_eq!(evaluate(policy, &state), GuardOutcome::Render);
        }
    }

    #[test]
    fn admin_flag_alone_requires_login() {
        let policy = GuardPolicy {
            require_auth: false,
            require_admin: true,
        };
        assert_eq!(
            evaluate(policy, &SessionState::resolved(None)),
            GuardOutcome::Redirect(View::Login)
        );
    }
}
