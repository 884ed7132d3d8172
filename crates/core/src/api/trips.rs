use reqwest::Method;

use super::ApiClient;
use crate::{
    error::ApiError,
    models::{Trip, TripInput, TripQuery},
};

impl ApiClient {
    /// List trips, filtered by whatever the query carries.
    pub async fn trips(&self, query: &TripQuery) -> Result<Vec<Trip>, ApiError> {
        self.get_json("/trips", &query.pairs(), "Failed to load trips")
            .await
    }

    /// Single trip with its stops and bus.
    pub async fn trip(&self, id: u64) -> Result<Trip, ApiError> {
        self.get_json(&format!("/trips/{id}"), &[], "Failed to load trip details")
            .await
    }

    /// Schedule a trip.
    pub async fn create_trip(&self, input: &TripInput) -> Result<Trip, ApiError> {
        self.send_body(Method::POST, "/trips", input, "Failed to create trip")
            .await
    }

    /// Replace a trip record.
    pub async fn update_trip(&self, id: u64, input: &TripInput) -> Result<Trip, ApiError> {
        self.send_body(
            Method::PUT,
            &format!("/trips/{id}"),
            input,
            "Failed to update trip",
        )
        .await
    }

    /// Cancel and remove a trip.
    pub async fn delete_trip(&self, id: u64) -> Result<(), ApiError> {
        self.send_unit(
            Method::DELETE,
            &format!("/trips/{id}"),
            None::<&()>,
            "Failed to delete trip",
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
    async fn search_sends_only_filled_filters() {
        let body = r#"[{"id":4,"origin":"Colombo","destination":"Galle","departureTime":"2025-02-01T05:30:00Z","arrivalTime":"2025-02-01T08:00:00Z","price":"620.00","busId":2,"stops":["Colombo","Panadura","Galle"]}]"#;
        let (base, server) = serve_once("200 OK", body).await;
        let client = ApiClient::with_http(
            reqwest::Client::new(),
            &base,
            Arc::new(MemoryCredentialStore::new()),
        );

        let trips = client
            .trips(&TripQuery::from_form("Colombo", " ", "2025-02-01"))
            .await
            .unwrap();
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].price, 620.0);
        assert_eq!(trips[0].stops.len(), 3);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/trips?origin=Colombo&date=2025-02-01 "));
    }
}
