#![allow(missing_docs)]

//! Shared domain models mirrored from the booking API.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

/// Account role as reported by the identity endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular passenger account.
    #[default]
    Customer,
    /// Back-office account with access to the admin screens.
    Admin,
}

/// Authenticated account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Server-side identifier.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Login email address.
    pub email: String,
    /// Role used to gate admin screens.
    #[serde(default)]
    pub role: Role,
    /// Whether the email address has been confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    /// Account creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Number of bookings, only present on admin listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bookings: Option<u64>,
}

impl User {
    /// Returns `true` when the account carries the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Bus class as stored by the back office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BusType {
    XL,
    AC,
    S,
    #[default]
    N,
}

impl BusType {
    /// Every class in the order the back office lists them.
    pub const ALL: [BusType; 4] = [BusType::XL, BusType::AC, BusType::S, BusType::N];

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            BusType::XL => "Luxury-XL",
            BusType::AC => "Air conditioned-AC",
            BusType::S => "Semi Luxury-S",
            BusType::N => "Normal-N",
        }
    }
}

/// Vehicle operating trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bus {
    pub id: u64,
    pub number_plate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub bus_type: BusType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub total_seats: u32,
}

/// Payload for creating or updating a bus.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusInput {
    pub number_plate: String,
    #[serde(rename = "type")]
    pub bus_type: BusType,
    pub company: String,
    pub total_seats: u32,
}

/// Named route with its ordered stop list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: u64,
    pub route_number: String,
    pub origin: String,
    pub destination: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub stops: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Payload for creating or updating a route.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteInput {
    pub route_number: String,
    pub origin: String,
    pub destination: String,
    pub stops: Vec<String>,
    pub category: Option<String>,
}

impl RouteInput {
    /// Split a comma separated stop list, dropping blanks.
    pub fn parse_stops(text: &str) -> Vec<String> {
        text.split(',')
            .map(str::trim)
            .filter(|stop| !stop.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Scheduled departure of a bus on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: u64,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    /// Full-route price per seat.
    #[serde(deserialize_with = "decimal_from_any")]
    pub price: f64,
    pub bus_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_number: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub stops: Vec<String>,
    #[serde(rename = "Bus", default, skip_serializing_if = "Option::is_none")]
    pub bus: Option<Bus>,
}

impl Trip {
    /// Seat capacity of the assigned bus, if the server included it.
    pub fn capacity(&self) -> Option<u32> {
        self.bus.as_ref().map(|bus| bus.total_seats)
    }

    /// Bus label shown in summaries.
    pub fn bus_label(&self) -> &str {
        self.bus
            .as_ref()
            .and_then(|bus| bus.name.as_deref())
            .unwrap_or("Express Bus")
    }
}

/// Payload for creating or updating a trip.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripInput {
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price: String,
    pub bus_id: u64,
}

/// Search filters for the trip listing. Empty fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripQuery {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub date: Option<String>,
}

impl TripQuery {
    /// Build a query from raw form input, treating blank strings as absent.
    pub fn from_form(origin: &str, destination: &str, date: &str) -> Self {
        fn non_blank(value: &str) -> Option<String> {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Self {
            origin: non_blank(origin),
            destination: non_blank(destination),
            date: non_blank(date),
        }
    }

    /// Query string pairs for the request.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(origin) = self.origin.as_deref() {
            pairs.push(("origin", origin));
        }
        if let Some(destination) = self.destination.as_deref() {
            pairs.push(("destination", destination));
        }
        if let Some(date) = self.date.as_deref() {
            pairs.push(("date", date));
        }
        pairs
    }
}

/// Lifecycle state of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    /// Next status in the admin edit cycle.
    pub fn next(self) -> Self {
        match self {
            BookingStatus::Pending => BookingStatus::Confirmed,
            BookingStatus::Confirmed => BookingStatus::Cancelled,
            BookingStatus::Cancelled => BookingStatus::Pending,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Seat reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: u64,
    pub seats: u32,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub user_id: u64,
    #[serde(default)]
    pub trip_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_stop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_stop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "Trip", default, skip_serializing_if = "Option::is_none")]
    pub trip: Option<Trip>,
}

impl Booking {
    /// Full-route amount as shown on the admin listing.
    pub fn listed_amount(&self) -> Option<f64> {
        self.trip
            .as_ref()
            .map(|trip| trip.price * f64::from(self.seats))
    }
}

/// Booking request submitted from the booking screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub user_id: u64,
    pub trip_id: u64,
    pub seats: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_stop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_stop: Option<String>,
}

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_buses: u64,
    pub total_trips: u64,
    pub total_bookings: u64,
    pub total_users: u64,
    #[serde(deserialize_with = "decimal_from_any")]
    pub revenue: f64,
    #[serde(default)]
    pub recent_bookings: Vec<Booking>,
}

/// Admin view of a single user with their bookings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDetails {
    #[serde(flatten)]
    pub user: User,
    #[serde(rename = "Bookings", default)]
    pub bookings: Vec<Booking>,
}

/// Admin edit of a user account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Credential returned by login and email verification.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Email verification outcome. Token and user are only present on auto-login.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyEmailResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub message: Option<String>,
}

fn decimal_from_any<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Decimal {
        Number(f64),
        Text(String),
    }

    match Decimal::deserialize(deserializer)? {
        Decimal::Number(value) => Ok(value),
        Decimal::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("invalid decimal '{text}'"))),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trip_price_accepts_string_and_number() {
        let base = json!({
            "id": 7,
            "origin": "Colombo",
            "destination": "Kandy",
            "departureTime": "2025-01-10T06:00:00Z",
            "arrivalTime": "2025-01-10T09:30:00Z",
            "busId": 3,
        });

        let mut as_text = base.clone();
        as_text["price"] = json!("450.50");
        let trip: Trip = serde_json::from_value(as_text).unwrap();
        assert_eq!(trip.price, 450.5);
        assert!(trip.stops.is_empty());

        let mut as_number = base;
        as_number["price"] = json!(300);
        as_number["stops"] = serde_json::Value::Null;
        let trip: Trip = serde_json::from_value(as_number).unwrap();
        assert_eq!(trip.price, 300.0);
        assert!(trip.stops.is_empty());
        assert_eq!(trip.bus_label(), "Express Bus");
    }

    #[test]
    fn user_role_drives_admin_flag() {
        let user: User = serde_json::from_value(json!({
            "id": 1,
            "name": "Ada",
            "email": "ada@example.com",
            "role": "admin"
        }))
        .unwrap();
        assert!(user.is_admin());

        let user: User = serde_json::from_value(json!({
            "id": 2,
            "name": "Bo",
            "email": "bo@example.com"
        }))
        .unwrap();
        assert_eq!(user.role, Role::Customer);
    }

    #[test]
    fn query_skips_blank_filters() {
        let query = TripQuery::from_form(" Colombo ", "", "2025-01-10");
        assert_eq!(
            query.pairs(),
            vec![("origin", "Colombo"), ("date", "2025-01-10")]
        );
    }

    #[test]
    fn new_booking_omits_missing_section() {
        let request = NewBooking {
            user_id: 1,
            trip_id: 2,
            seats: 3,
            start_stop: None,
            end_stop: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"userId": 1, "tripId": 2, "seats": 3}));
    }

    #[test]
    fn route_stops_parse_from_text() {
        assert_eq!(
            RouteInput::parse_stops("Colombo, Kegalle ,, Kandy"),
            vec!["Colombo", "Kegalle", "Kandy"]
        );
    }
}
