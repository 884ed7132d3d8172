use reqwest::Method;

use super::ApiClient;
use crate::{
    error::ApiError,
    models::{Bus, BusInput, Route, RouteInput},
};

impl ApiClient {
    /// All buses in the fleet.
    pub async fn buses(&self) -> Result<Vec<Bus>, ApiError> {
        self.get_json("/buses", &[], "Failed to load buses").await
    }

    /// Register a bus.
    pub async fn create_bus(&self, input: &BusInput) -> Result<Bus, ApiError> {
        self.send_body(Method::POST, "/buses", input, "Failed to save bus")
            .await
    }

    /// Replace a bus record.
    pub async fn update_bus(&self, id: u64, input: &BusInput) -> Result<Bus, ApiError> {
        self.send_body(
            Method::PUT,
            &format!("/buses/{id}"),
            input,
            "Failed to save bus",
        )
        .await
    }

    /// Remove a bus.
    pub async fn delete_bus(&self, id: u64) -> Result<(), ApiError> {
        self.send_unit(
            Method::DELETE,
            &format!("/buses/{id}"),
            None::<&()>,
            "Failed to delete bus",
        )
        .await
    }

    /// All routes with their stops.
    pub async fn routes(&self) -> Result<Vec<Route>, ApiError> {
        self.get_json("/routes", &[], "Failed to load routes").await
    }

    /// Add a route.
    pub async fn create_route(&self, input: &RouteInput) -> Result<Route, ApiError> {
        self.send_body(Method::POST, "/routes", input, "Failed to save route")
            .await
    }

    /// Replace a route record.
    pub async fn update_route(&self, id: u64, input: &RouteInput) -> Result<Route, ApiError> {
        self.send_body(
            Method::PUT,
            &format!("/routes/{id}"),
            input,
            "Failed to save route",
        )
        .await
    }

    /// Remove a route.
    pub async fn delete_route(&self, id: u64) -> Result<(), ApiError> {
        self.send_unit(
            Method::DELETE,
            &format!("/routes/{id}"),
            None::<&()>,
            "Failed to delete route",
        )
        .await
    }
}
