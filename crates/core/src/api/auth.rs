use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};

use super::ApiClient;
use crate::{
    error::ApiError,
    models::{AuthResponse, User, VerifyEmailResponse},
    session::IdentityProvider,
};

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

impl ApiClient {
    /// Exchange email and password for a token and user record.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.send_body(
            Method::POST,
            "/auth/login",
            &Credentials { email, password },
            "Login failed",
        )
        .await
    }

    /// Create a customer account. The account must be verified by email before login.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<(), ApiError> {
        let body = json!({ "name": name, "email": email, "password": password });
        self.send_unit(Method::POST, "/auth/register", Some(&body), "Registration failed")
            .await
    }

    /// Identity of the holder of the stored token.
    pub async fn me(&self) -> Result<User, ApiError> {
        self.get_json("/auth/me", &[], "Failed to load profile").await
    }

    /// Tell the server a token is no longer in use.
    ///
    /// The token is passed explicitly because the local credential is cleared before
    /// this call is made.
    pub async fn notify_logout(&self, token: &str) -> Result<(), ApiError> {
        let builder = self
            .inner
            .http
            .post(self.url("/auth/logout"))
            .bearer_auth(token);
        builder.send().await.map_err(|source| ApiError::Network {
            context: "Logout notification failed".to_string(),
            source,
        })?;
        Ok(())
    }

    /// Request a password reset email.
    pub async fn forgot_password(&self, email: &str) -> Result<Option<String>, ApiError> {
        let body = json!({ "email": email });
        let response: Value = self
            .send_body(
                Method::POST,
                "/auth/forgot-password",
                &body,
                "Failed to send reset email",
            )
            .await?;
        Ok(message_of(&response))
    }

    /// Set a new password using the token from a reset email.
    pub async fn reset_password(
        &self,
        token: &str,
        password: &str,
    ) -> Result<Option<String>, ApiError> {
        let body = json!({ "token": token, "password": password });
        let response: Value = self
            .send_body(
                Method::POST,
                "/auth/reset-password",
                &body,
                "Failed to reset password",
            )
            .await?;
        Ok(message_of(&response))
    }

    /// Confirm an email address. Some servers log the user in on success.
    pub async fn verify_email(&self, token: &str) -> Result<VerifyEmailResponse, ApiError> {
        self.get_json(
            "/auth/verify-email",
            &[("token", token)],
            "Email verification failed",
        )
        .await
    }
}

fn message_of(value: &Value) -> Option<String> {
    value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl IdentityProvider for ApiClient {
    async fn current_user(&self) -> Result<User, ApiError> {
        self.me().await
    }

    async fn end_session(&self, token: &str) -> Result<(), ApiError> {
        self.notify_logout(token).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{api::testing::serve_once, models::Role, storage::MemoryCredentialStore};

    #[tokio::test]
    async fn login_posts_credentials_and_decodes_user() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"token":"t-1","user":{"id":9,"name":"Sunil","email":"sunil@example.lk","role":"admin"}}"#,
        )
        .await;
        let client = ApiClient::with_http(
            reqwest::Client::new(),
            &base,
            Arc::new(MemoryCredentialStore::new()),
        );

        let auth = client.login("sunil@example.lk", "secret1").await.unwrap();
        assert_eq!(auth.token, "t-1");
        assert_eq!(auth.user.role, Role::Admin);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/auth/login"));
        assert!(request.contains(r#""email":"sunil@example.lk""#));
    }

    #[tokio::test]
    async fn verify_email_passes_token_as_query() {
        let (base, server) = serve_once("200 OK", r#"{"message":"Email verified"}"#).await;
        let client = ApiClient::with_http(
            reqwest::Client::new(),
            &base,
            Arc::new(MemoryCredentialStore::new()),
        );
        let outcome = client.verify_email("v-77").await.unwrap();
        assert!(outcome.token.is_none());
        assert_eq!(outcome.message.as_deref(), Some("Email verified"));
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/auth/verify-email?token=v-77"));
    }
}
