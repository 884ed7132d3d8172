use reqwest::Method;
use serde_json::json;

use super::ApiClient;
use crate::{
    error::ApiError,
    models::{Booking, BookingStatus, NewBooking},
};

impl ApiClient {
    /// Reserve seats on a trip, optionally for a section of its route.
    pub async fn create_booking(&self, request: &NewBooking) -> Result<Booking, ApiError> {
        self.send_body(
            Method::POST,
            "/bookings",
            request,
            "Failed to create booking",
        )
        .await
    }

    /// All bookings visible to the caller.
    pub async fn bookings(&self) -> Result<Vec<Booking>, ApiError> {
        self.get_json("/bookings", &[], "Failed to load bookings")
            .await
    }

    /// Move a booking to another status.
    pub async fn update_booking_status(
        &self,
        id: u64,
        status: BookingStatus,
    ) -> Result<Booking, ApiError> {
        self.send_body(
            Method::PUT,
            &format!("/bookings/{id}"),
            &json!({ "status": status }),
            "Failed to update booking",
        )
        .await
    }

    /// Remove a booking.
    pub async fn delete_booking(&self, id: u64) -> Result<(), ApiError> {
        self.send_unit(
            Method::DELETE,
            &format!("/bookings/{id}"),
            None::<&()>,
            "Failed to delete booking",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{api::testing::serve_once, storage::MemoryCredentialStore};

    #[tokio::test]
    async fn create_booking_sends_section() {
        let (base, server) = serve_once(
            "201 Created",
            r#"{"id":11,"seats":2,"status":"pending","userId":3,"tripId":4,"startStop":"Colombo","endStop":"Kegalle"}"#,
        )
        .await;
        let client = ApiClient::with_http(
            reqwest::Client::new(),
            &base,
            Arc::new(MemoryCredentialStore::with_token("tok")),
        );

        let booking = client
            .create_booking(&NewBooking {
                user_id: 3,
                trip_id: 4,
                seats: 2,
                start_stop: Some("Colombo".to_string()),
                end_stop: Some("Kegalle".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.end_stop.as_deref(), Some("Kegalle"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/bookings"));
        assert!(request.contains(r#""startStop":"Colombo""#));
    }

    #[tokio::test]
    async fn delete_accepts_empty_body() {
        let (base, server) = serve_once("204 No Content", "").await;
        let client = ApiClient::with_http(
            reqwest::Client::new(),
            &base,
            Arc::new(MemoryCredentialStore::with_token("tok")),
        );
        client.delete_booking(11).await.unwrap();
        let request = server.await.unwrap();
        assert!(request.starts_with("DELETE /api/bookings/11"));
    }
}
