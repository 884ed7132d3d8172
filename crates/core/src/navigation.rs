//! Screens the front end can show and their access policies.

use std::fmt;

use crate::session::GuardPolicy;

/// Back-office sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub enum AdminSection {
    #[default]
    Dashboard,
    Buses,
    Routes,
    Trips,
    Bookings,
    Users,
}

impl AdminSection {
    /// Sections in menu order.
    pub const ALL: [AdminSection; 6] = [
        AdminSection::Dashboard,
        AdminSection::Buses,
        AdminSection::Routes,
        AdminSection::Trips,
        AdminSection::Bookings,
        AdminSection::Users,
    ];

    /// Menu title.
    pub fn title(self) -> &'static str {
        match self {
            AdminSection::Dashboard => "Dashboard",
            AdminSection::Buses => "Buses",
            AdminSection::Routes => "Routes",
            AdminSection::Trips => "Trips",
            AdminSection::Bookings => "Bookings",
            AdminSection::Users => "Users",
        }
    }

    /// Next section in menu order, wrapping around.
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    /// Previous section in menu order, wrapping around.
    pub fn previous(self) -> Self {
        let idx = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// A navigable screen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum View {
    /// Search form.
    #[default]
    Home,
    /// Search results.
    Trips,
    /// Booking form for one trip.
    Booking {
        /// Trip being booked.
        trip_id: u64,
    },
    /// Login form.
    Login,
    /// Account creation.
    Signup,
    /// Request a reset email.
    ForgotPassword,
    /// Set a new password from a reset token.
    ResetPassword,
    /// Confirm an email address from a verification token.
    VerifyEmail,
    /// Back office.
    Admin(AdminSection),
}

impl View {
    /// Session requirements for this view.
    pub fn policy(&self) -> GuardPolicy {
        match self {
            View::Booking { .. } => GuardPolicy::AUTHENTICATED,
            View::Admin(_) => GuardPolicy::ADMIN,
            _ => GuardPolicy::PUBLIC,
        }
    }

    /// Where to go after an inactivity logout. `None` when already on login.
    pub fn expiry_redirect(&self) -> Option<View> {
        match self {
            View::Login => None,
            _ => Some(View::Login),
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Home => f.write_str("Search"),
            View::Trips => f.write_str("Available Trips"),
            View::Booking { trip_id } => write!(f, "Book Trip #{trip_id}"),
            View::Login => f.write_str("Login"),
            View::Signup => f.write_str("Sign Up"),
            View::ForgotPassword => f.write_str("Forgot Password"),
            View::ResetPassword => f.write_str("Reset Password"),
            View::VerifyEmail => f.write_str("Verify Email"),
            View::Admin(section) => write!(f, "Admin · {}", section.title()),
        }
    }
}
