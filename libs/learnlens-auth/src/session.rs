use http::Method;

use crate::api::{ApiClient, RequestOptions};
use crate::error::{ApiError, AuthError};
use crate::types::{
    AUTHENTICATIONS_PATH, Credentials, Envelope, NewUser, PROFILE_PATH, ProfileData,
    RefreshTokenBody, Registered, TokenPair, USERS_PATH, UserProfile,
};

const LOGIN_FAILED: &str = "Login failed.";
const REGISTRATION_FAILED: &str = "Registration failed.";

/// Outcome of [`Session::restore`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Stored tokens are valid; the current user's profile.
    Authenticated(UserProfile),
    /// Tokens were present but unusable; they have been removed.
    Expired,
    /// No tokens stored.
    Anonymous,
}

/// Authentication flows over an [`ApiClient`].
#[derive(Debug, Clone)]
pub struct Session {
    api: ApiClient,
}

impl Session {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Exchange credentials for a token pair and store it.
    ///
    /// Does not fetch the profile; see [`sign_in`](Self::sign_in).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Failed`] with the server's message, or
    /// `"Login failed."` when the server gave none.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let credentials = Credentials { email, password };
        let envelope: Envelope<TokenPair> = self
            .api
            .post_with(
                AUTHENTICATIONS_PATH,
                &credentials,
                &RequestOptions::unauthenticated(),
            )
            .await
            .map_err(|e| AuthError::failed(e, LOGIN_FAILED))?;

        let tokens = envelope.data;
        self.api
            .store()
            .set_tokens(tokens.access_token.clone(), tokens.refresh_token.clone());
        tracing::info!("logged in");
        Ok(tokens)
    }

    /// Revoke the refresh token on the server and forget both tokens.
    ///
    /// Never fails: a server error is logged and the local tokens are removed
    /// regardless.
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.api.store().refresh_token() {
            let body = RefreshTokenBody {
                refresh_token: refresh_token.expose(),
            };
            if let Err(e) = self
                .api
                .dispatch(
                    Method::DELETE,
                    AUTHENTICATIONS_PATH,
                    Some(&body),
                    &RequestOptions::default(),
                )
                .await
            {
                tracing::warn!(error = %e, "logout request failed; removing local tokens anyway");
            }
        }
        self.api.store().remove_tokens();
        tracing::info!("logged out");
    }

    /// Create an account. Returns the new user's id.
    ///
    /// Does not log in.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Failed`] with the server's message, or
    /// `"Registration failed."` when the server gave none.
    pub async fn register(&self, user: &NewUser) -> Result<String, AuthError> {
        let envelope: Envelope<Registered> = self
            .api
            .post_with(USERS_PATH, user, &RequestOptions::unauthenticated())
            .await
            .map_err(|e| AuthError::failed(e, REGISTRATION_FAILED))?;
        tracing::info!(user_id = %envelope.data.user_id, "registered");
        Ok(envelope.data.user_id)
    }

    /// Fetch the current user's profile.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`]; [`ApiError::SessionExpired`] when the access token
    /// could not be refreshed.
    pub async fn get_profile(&self) -> Result<UserProfile, ApiError> {
        let envelope: Envelope<ProfileData> = self.api.get(PROFILE_PATH).await?;
        Ok(envelope.data.user)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.api.store().is_authenticated()
    }

    /// Log in and load the profile. If either step fails the session is
    /// logged out before the error is returned.
    ///
    /// # Errors
    ///
    /// As [`login`](Self::login); a failed profile fetch is reported as
    /// [`AuthError::Failed`] too.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        let result = async {
            self.login(email, password).await?;
            self.get_profile()
                .await
                .map_err(|e| AuthError::failed(e, LOGIN_FAILED))
        }
        .await;
        if result.is_err() {
            self.logout().await;
        }
        result
    }

    /// Resume a stored session.
    pub async fn restore(&self) -> SessionState {
        if !self.is_authenticated() {
            return SessionState::Anonymous;
        }
        match self.get_profile().await {
            Ok(profile) => SessionState::Authenticated(profile),
            Err(e) => {
                tracing::info!(error = %e, "stored session is no longer valid");
                self.logout().await;
                SessionState::Expired
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ApiClientConfig;
    use crate::store::{MemoryTokenStore, TokenStore};
    use httpmock::prelude::*;
    use serde_json::json;
    use url::Url;

    fn session(server: &MockServer, store: Arc<dyn TokenStore>) -> Session {
        let config = ApiClientConfig::for_testing(Url::parse(&server.base_url()).unwrap());
        Session::new(ApiClient::new(&config, store).unwrap())
    }

    #[tokio::test]
    async fn login_stores_tokens_without_bearer() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/authentications")
                .json_body(json!({"email": "ada@example.com", "password": "pw"}));
            then.status(201).json_body(json!({
                "status": "success",
                "data": {"accessToken": "a1", "refreshToken": "r1"}
            }));
        });

        let store = Arc::new(MemoryTokenStore::new());
        let session = session(&server, store.clone());
        let tokens = session.login("ada@example.com", "pw").await.unwrap();

        assert_eq!(tokens.access_token.expose(), "a1");
        assert_eq!(store.access_token().unwrap().expose(), "a1");
        assert_eq!(store.refresh_token().unwrap().expose(), "r1");
        assert!(session.is_authenticated());
        mock.assert();
    }

    #[tokio::test]
    async fn login_failure_carries_server_message() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(POST).path("/authentications");
            then.status(401)
                .json_body(json!({"status": "fail", "message": "Invalid credentials"}));
        });

        let store = Arc::new(MemoryTokenStore::new());
        let session = session(&server, store.clone());
        let err = session.login("ada@example.com", "bad").await.unwrap_err();

        assert_eq!(err.to_string(), "Invalid credentials");
        assert_eq!(
            err.api_error().and_then(ApiError::status),
            Some(http::StatusCode::UNAUTHORIZED)
        );
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn login_failure_without_message_uses_fallback() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(POST).path("/authentications");
            then.status(500).body("oops");
        });

        let session = session(&server, Arc::new(MemoryTokenStore::new()));
        let err = session.login("ada@example.com", "pw").await.unwrap_err();
        assert_eq!(err.to_string(), "Login failed.");
    }

    #[tokio::test]
    async fn logout_revokes_refresh_token_and_clears() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE)
                .path("/authentications")
                .header("authorization", "Bearer a1")
                .json_body(json!({"refreshToken": "r1"}));
            then.status(200).json_body(json!({"status": "success"}));
        });

        let store = Arc::new(MemoryTokenStore::with_tokens("a1", "r1"));
        session(&server, store.clone()).logout().await;

        mock.assert();
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
    }

    #[tokio::test]
    async fn logout_without_tokens_makes_no_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.path("/authentications");
            then.status(200);
        });

        session(&server, Arc::new(MemoryTokenStore::new()))
            .logout()
            .await;
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn register_returns_user_id_without_authenticating() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/users").json_body(json!({
                "name": "Ada",
                "email": "ada@example.com",
                "phone": "0800",
                "city": "London",
                "password": "pw"
            }));
            then.status(201)
                .json_body(json!({"status": "success", "data": {"userId": "user-42"}}));
        });

        let store = Arc::new(MemoryTokenStore::new());
        let user = NewUser {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            phone: "0800".into(),
            city: "London".into(),
            password: "pw".into(),
        };
        let id = session(&server, store.clone())
            .register(&user)
            .await
            .unwrap();

        assert_eq!(id, "user-42");
        assert!(!store.is_authenticated());
        mock.assert();
    }

    #[tokio::test]
    async fn register_failure_uses_fallback() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(POST).path("/users");
            then.status(400).json_body(json!({"status": "fail"}));
        });

        let user = NewUser {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            phone: "0800".into(),
            city: "London".into(),
            password: "pw".into(),
        };
        let err = session(&server, Arc::new(MemoryTokenStore::new()))
            .register(&user)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Registration failed.");
    }

    #[tokio::test]
    async fn restore_without_tokens_is_anonymous() {
        let server = MockServer::start();
        let state = session(&server, Arc::new(MemoryTokenStore::new()))
            .restore()
            .await;
        assert_eq!(state, SessionState::Anonymous);
    }

    #[tokio::test]
    async fn restore_with_valid_tokens_loads_profile() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(GET)
                .path("/users/me")
                .header("authorization", "Bearer a1");
            then.status(200).json_body(json!({
                "data": {"user": {"id": "user-1", "name": "Ada", "city": "London"}}
            }));
        });

        let state = session(&server, Arc::new(MemoryTokenStore::with_tokens("a1", "r1")))
            .restore()
            .await;

        let profile = match state {
            SessionState::Authenticated(profile) => profile,
            other => panic!("expected authenticated, got {other:?}"),
        };
        assert_eq!(profile.name.as_deref(), Some("Ada"));
        assert_eq!(profile.extra["city"], "London");
    }

    #[tokio::test]
    async fn sign_in_logs_out_when_profile_fails() {
        let server = MockServer::start();
        let _login = server.mock(|when, then| {
            when.method(POST).path("/authentications");
            then.status(201)
                .json_body(json!({"data": {"accessToken": "a1", "refreshToken": "r1"}}));
        });
        let _profile = server.mock(|when, then| {
            when.method(GET).path("/users/me");
            then.status(500)
                .json_body(json!({"status": "error", "message": "Internal error"}));
        });
        let revoke = server.mock(|when, then| {
            when.method(DELETE).path("/authentications");
            then.status(200);
        });

        let store = Arc::new(MemoryTokenStore::new());
        let err = session(&server, store.clone())
            .sign_in("ada@example.com", "pw")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Internal error");
        assert_eq!(revoke.calls(), 1);
        assert!(!store.is_authenticated());
    }
}
