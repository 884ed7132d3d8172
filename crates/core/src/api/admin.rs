use reqwest::Method;

use super::ApiClient;
use crate::{
    error::ApiError,
    models::{DashboardStats, User, UserDetails, UserUpdate},
};

impl ApiClient {
    /// Totals and recent bookings for the admin dashboard.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.get_json("/admin/stats", &[], "Failed to load dashboard")
            .await
    }

    /// Every registered account.
    pub async fn users(&self) -> Result<Vec<User>, ApiError> {
        self.get_json("/admin/users", &[], "Failed to load users")
            .await
    }

    /// One user together with their bookings.
    pub async fn user_details(&self, id: u64) -> Result<UserDetails, ApiError> {
        self.get_json(
            &format!("/admin/users/{id}"),
            &[],
            "Failed to load user details",
        )
        .await
    }

    /// Change name, email or role of an account.
    pub async fn update_user(&self, id: u64, update: &UserUpdate) -> Result<User, ApiError> {
        self.send_body(
            Method::PUT,
            &format!("/admin/users/{id}"),
            update,
            "Failed to update user",
        )
        .await
    }

    /// Remove an account.
    pub async fn delete_user(&self, id: u64) -> Result<(), ApiError> {
        self.send_unit(
            Method::DELETE,
            &format!("/admin/users/{id}"),
            None::<&()>,
            "Failed to delete user",
        )
        .await
    }
}
