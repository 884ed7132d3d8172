//! REST client for the booking API.
//!
//! Every request carries `Authorization: Bearer <token>` when the credential store
//! holds a token. A `401` from any endpoint clears the store and is broadcast as
//! [`ApiEvent::Unauthorized`] so the host can drop its session and show the login
//! screen; the caller still receives [`ApiError::Unauthorized`].

/// Authentication endpoints.
pub mod auth;
/// Bookings.
pub mod bookings;
/// Buses and routes.
pub mod fleet;
/// Admin dashboard and user management.
pub mod admin;
/// Trip search and management.
pub mod trips;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    config::AppConfig,
    error::{ApiError, ErrorEnvelope},
    storage::CredentialStore,
};

const UNAUTHORIZED_FALLBACK: &str = "Session expired. Please log in again.";
const EVENT_CAPACITY: usize = 16;

/// Cross-cutting notifications raised by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiEvent {
    /// A request was rejected with `401`; the stored credential has been cleared.
    Unauthorized,
}

/// Shared HTTP client. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    events: broadcast::Sender<ApiEvent>,
}

impl ApiClient {
    /// Build a client from configuration.
    pub fn new(config: &AppConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("busbook/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ApiError::InvalidRequest(err.to_string()))?;
        Ok(Self::with_http(http, &config.api_url, store))
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_http(
        http: reqwest::Client,
        base_url: &str,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
                store,
                events,
            }),
        }
    }

    /// Receive [`ApiEvent`]s raised by any clone of this client.
    pub fn subscribe(&self) -> broadcast::Receiver<ApiEvent> {
        self.inner.events.subscribe()
    }

    /// Credential store the client reads its bearer token from.
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.store
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.inner.http.request(method, self.url(path));
        match self.inner.store.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        fallback: &str,
    ) -> Result<T, ApiError> {
        let builder = self.request(Method::GET, path).query(query);
        self.send_json(builder, fallback).await
    }

    pub(crate) async fn send_body<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let builder = self.request(method, path).json(body);
        self.send_json(builder, fallback).await
    }

    pub(crate) async fn send_unit<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        fallback: &str,
    ) -> Result<(), ApiError> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = self.dispatch(builder, fallback).await?;
        self.check(response, fallback).await.map(|_| ())
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let response = self.dispatch(builder, fallback).await?;
        let body = self.check(response, fallback).await?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            context: fallback.to_string(),
            source,
        })
    }

    async fn dispatch(&self, builder: RequestBuilder, fallback: &str) -> Result<Response, ApiError> {
        builder.send().await.map_err(|source| ApiError::Network {
            context: fallback.to_string(),
            source,
        })
    }

    async fn check(&self, response: Response, fallback: &str) -> Result<String, ApiError> {
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.text().await.map_err(|source| ApiError::Network {
            context: fallback.to_string(),
            source,
        })?;
        if status.is_success() {
            debug!(%status, path = %url, "request succeeded");
            return Ok(body);
        }
        Err(self.error_for(status, &url, &body, fallback))
    }

    fn error_for(&self, status: StatusCode, path: &str, body: &str, fallback: &str) -> ApiError {
        if status == StatusCode::UNAUTHORIZED {
            warn!(path, "request unauthorized; clearing stored credential");
            if let Err(err) = self.inner.store.clear() {
                warn!(%err, "failed to clear credential after 401");
            }
            let _ = self.inner.events.send(ApiEvent::Unauthorized);
            let fallback = if fallback.is_empty() {
                UNAUTHORIZED_FALLBACK
            } else {
                fallback
            };
            return ApiError::Unauthorized(ErrorEnvelope::message_or(body, fallback));
        }

        let message = ErrorEnvelope::message_or(body, fallback);
        warn!(%status, path, %message, "request failed");
        ApiError::Http { status, message }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Single-shot HTTP responder for exercising the client against real sockets.

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    /// Serve one canned response and hand back the raw request text.
    pub async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let read = socket.read(&mut buf).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
                if let Some(end) = find_header_end(&request) {
                    let headers = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let length = headers
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|value| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}/api"), handle)
    }

    fn find_header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|window| window == b"\r\n\r\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Role, User},
        storage::MemoryCredentialStore,
    };
    use serde_json::Value;

    fn client(base: &str, store: Arc<dyn CredentialStore>) -> ApiClient {
        ApiClient::with_http(reqwest::Client::new(), base, store)
    }

    #[test]
    fn joins_paths_onto_base() {
        let client = client("http://localhost:4000/api/", Arc::new(MemoryCredentialStore::new()));
        assert_eq!(client.url("/trips"), "http://localhost:4000/api/trips");
        assert_eq!(client.url("auth/me"), "http://localhost:4000/api/auth/me");
    }

    #[tokio::test]
    async fn attaches_bearer_token_when_present() {
        let (base, server) = testing::serve_once("200 OK", "[]").await;
        let store = Arc::new(MemoryCredentialStore::with_token("abc123"));
        let client = client(&base, store);

        let trips: Vec<Value> = client.get_json("/trips", &[], "Failed").await.unwrap();
        assert!(trips.is_empty());

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/trips"));
        assert!(request.to_lowercase().contains("authorization: bearer abc123"));
    }

    #[tokio::test]
    async fn omits_authorization_without_token() {
        let (base, server) = testing::serve_once("200 OK", "[]").await;
        let client = client(&base, Arc::new(MemoryCredentialStore::new()));
        let _: Vec<Value> = client.get_json("/trips", &[], "Failed").await.unwrap();
        let request = server.await.unwrap();
        assert!(!request.to_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn unauthorized_clears_store_and_broadcasts() {
        let (base, server) = testing::serve_once(
            "401 Unauthorized",
            r#"{"message":"Token expired"}"#,
        )
        .await;
        let store = Arc::new(MemoryCredentialStore::new());
        store
            .save(
                "stale",
                &User {
                    id: 1,
                    name: "Kamala".to_string(),
                    email: "kamala@example.lk".to_string(),
                    role: Role::Admin,
                    is_verified: None,
                    created_at: None,
                    total_bookings: None,
                },
            )
            .unwrap();
        let client = client(&base, store.clone());
        let mut events = client.subscribe();

        let err = client
            .get_json::<Vec<Value>>("/bookings", &[], "Failed to load bookings")
            .await
            .unwrap_err();
        server.await.unwrap();

        assert!(err.is_unauthorized());
        assert_eq!(err.user_message(), "Token expired");
        assert!(store.token().is_none());
        assert!(store.user().is_none());
        assert_eq!(events.try_recv().unwrap(), ApiEvent::Unauthorized);
    }

    #[tokio::test]
    async fn other_failures_surface_envelope_or_fallback() {
        let (base, server) =
            testing::serve_once("400 Bad Request", r#"{"message":"Not enough seats"}"#).await;
        let store = Arc::new(MemoryCredentialStore::with_token("keep"));
        let client = client(&base, store.clone());
        let err = client
            .get_json::<Value>("/trips/1", &[], "Failed to load trip details")
            .await
            .unwrap_err();
        server.await.unwrap();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(err.user_message(), "Not enough seats");
        assert_eq!(store.token().as_deref(), Some("keep"));

        let (base, server) = testing::serve_once("500 Internal Server Error", "oops").await;
        let client = ApiClient::with_http(reqwest::Client::new(), &base, store);
        let err = client
            .get_json::<Value>("/trips/1", &[], "Failed to load trip details")
            .await
            .unwrap_err();
        server.await.unwrap();
        assert_eq!(err.user_message(), "Failed to load trip details");
    }
}
