//! # Hosted identity provider — GoTrue REST API
//!
//! [`GoTrueIdentity`] signs users in against the project's `/auth/v1`
//! endpoints and turns the response into a [`Session`] whose access token is
//! then used as the bearer for data calls.
//!
//! | Method | Endpoint |
//! |--------|----------|
//! | [`authenticate`](IdentityProvider::authenticate) | `POST /auth/v1/token?grant_type=password` |
//! | [`sign_up`](GoTrueIdentity::sign_up) | `POST /auth/v1/signup` |
//! | [`restore`](GoTrueIdentity::restore) | `GET /auth/v1/user` with a stored access token |
//! | [`sign_out`](IdentityProvider::sign_out) | `POST /auth/v1/logout` |
//!
//! The local session ends on sign-out even when the logout call fails, so no
//! repository keeps working for a user who asked to leave.

use std::sync::{Mutex, MutexGuard, PoisonError};

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use store::{AuthError, IdentityProvider, OwnerId, Session, UserInfo};
use tracing::{debug, info, warn};

use crate::settings::Settings;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: GoTrueUser,
}

#[derive(Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<Value>,
}

impl GoTrueUser {
    fn into_info(self) -> UserInfo {
        let name = self.user_metadata.as_ref().and_then(|meta| {
            ["name", "full_name"]
                .iter()
                .find_map(|key| meta.get(key).and_then(Value::as_str))
                .map(str::to_string)
        });
        UserInfo {
            id: self.id,
            email: self.email.unwrap_or_default(),
            name,
        }
    }
}

pub struct GoTrueIdentity {
    client: Client,
    auth_url: String,
    anon_key: String,
    current: Mutex<Option<Session>>,
}

impl GoTrueIdentity {
    pub fn new(settings: &Settings) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(settings.http.timeout())
            .build()
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        Ok(Self::with_client(
            client,
            settings.supabase.auth_url(),
            settings.supabase.anon_key.clone(),
        ))
    }

    pub fn with_client(client: Client, auth_url: String, anon_key: String) -> Self {
        Self {
            client,
            auth_url,
            anon_key,
            current: Mutex::new(None),
        }
    }

    /// Create an account. `Ok(None)` when the project requires email
    /// confirmation before the first sign-in.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AuthError> {
        let response = self
            .client
            .post(format!("{}/signup", self.auth_url))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email.trim(), "password": password }))
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if body.to_lowercase().contains("already") {
                AuthError::AlreadyRegistered
            } else if status.is_client_error() {
                AuthError::Validation(error_message(&body))
            } else {
                AuthError::Unavailable(format!("{status}: {body}"))
            });
        }

        let body: Value = response.json().await.map_err(unavailable)?;
        if body.get("access_token").is_none() {
            info!("sign-up pending email confirmation");
            return Ok(None);
        }
        let token: TokenResponse = serde_json::from_value(body).map_err(unavailable)?;
        Ok(Some(self.start(token.user.into_info(), token.access_token)))
    }

    /// Resume a session from a previously issued access token.
    pub async fn restore(&self, access_token: &str) -> Result<Session, AuthError> {
        let response = self
            .client
            .get(format!("{}/user", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(unavailable)?;
        let user: GoTrueUser = check(response).await?.json().await.map_err(unavailable)?;
        debug!(user_id = %user.id, "restored session");
        Ok(self.start(user.into_info(), access_token.to_string()))
    }

    /// The active session, if any.
    pub fn session(&self) -> Option<Session> {
        lock(&self.current).clone().filter(Session::is_active)
    }

    fn start(&self, info: UserInfo, access_token: String) -> Session {
        let session = Session::new(info, Some(access_token));
        if let Some(previous) = lock(&self.current).replace(session.clone()) {
            previous.end();
        }
        session
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unavailable(e: impl std::fmt::Display) -> AuthError {
    AuthError::Unavailable(e.to_string())
}

/// GoTrue reports errors under different keys depending on version.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["msg", "error_description", "message", "error"]
                .iter()
                .find_map(|key| v.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

async fn check(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AuthError::InvalidCredentials
        }
        _ => AuthError::Unavailable(format!("{status}: {}", error_message(&body))),
    })
}

impl IdentityProvider for GoTrueIdentity {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email.trim(), "password": password }))
            .send()
            .await
            .map_err(unavailable)?;

        let token: TokenResponse = check(response).await?.json().await.map_err(unavailable)?;
        info!(user_id = %token.user.id, "signed in");
        Ok(self.start(token.user.into_info(), token.access_token))
    }

    fn current_owner(&self) -> Option<OwnerId> {
        self.session().map(|s| s.owner().clone())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let session = lock(&self.current).take().ok_or(AuthError::NotSignedIn)?;
        session.end();

        let Some(token) = session.access_token() else {
            return Ok(());
        };
        let result = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                info!(owner = %session.owner(), "signed out");
                Ok(())
            }
            Ok(response) => {
                warn!(status = %response.status(), "logout rejected, local session ended anyway");
                Ok(())
            }
            Err(e) => Err(unavailable(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn identity(server: &MockServer) -> GoTrueIdentity {
        GoTrueIdentity::with_client(
            Client::new(),
            format!("{}/auth/v1", server.uri()),
            "anon".into(),
        )
    }

    fn token_body() -> Value {
        json!({
            "access_token": "jwt-token",
            "token_type": "bearer",
            "user": {
                "id": "11111111-2222-3333-4444-555555555555",
                "email": "alice@example.com",
                "user_metadata": { "full_name": "Alice" }
            }
        })
    }

    #[tokio::test]
    async fn test_authenticate_and_sign_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon"))
            .and(body_json(json!({"email": "alice@example.com", "password": "pw123456"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .and(header("authorization", "Bearer jwt-token"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let identity = identity(&server);
        let session = identity
            .authenticate(" alice@example.com", "pw123456")
            .await
            .unwrap();
        assert_eq!(session.access_token(), Some("jwt-token"));
        assert_eq!(session.user().display_name(), "Alice");
        assert_eq!(
            identity.current_owner(),
            Some(OwnerId::new("11111111-2222-3333-4444-555555555555"))
        );

        identity.sign_out().await.unwrap();
        assert!(!session.is_active());
        assert_eq!(identity.current_owner(), None);
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let err = identity(&server)
            .authenticate("alice@example.com", "nope")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_restore_and_sign_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer stored-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u-restored",
                "email": "bob@example.com"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u-new",
                "email": "new@example.com",
                "confirmation_sent_at": "2024-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let identity = identity(&server);
        let restored = identity.restore("stored-token").await.unwrap();
        assert_eq!(restored.owner().as_str(), "u-restored");
        assert_eq!(restored.user().display_name(), "bob@example.com");

        let pending = identity.sign_up("new@example.com", "pw123456").await.unwrap();
        assert!(pending.is_none());
        assert!(identity.session().is_some());
    }

    #[tokio::test]
    async fn test_sign_up_existing_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(json!({"code": 422, "msg": "User already registered"})),
            )
            .mount(&server)
            .await;

        let err = identity(&server)
            .sign_up("alice@example.com", "pw123456")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::AlreadyRegistered);
    }
}
