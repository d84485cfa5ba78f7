//! Wire types of the dashboard API.
//!
//! Every success body is wrapped in a `{ "data": ... }` envelope.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::secret::SecretString;

/// Path of the authentication resource (login, refresh, logout).
pub const AUTHENTICATIONS_PATH: &str = "/authentications";
/// Path used to register a new user.
pub const USERS_PATH: &str = "/users";
/// Path of the current user's profile.
pub const PROFILE_PATH: &str = "/users/me";

/// `{ "data": T }` success envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Access/refresh token pair issued by `POST /authentications`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

/// Body of `PUT /authentications`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshedToken {
    pub(crate) access_token: SecretString,
}

/// Body of `POST /authentications`.
#[derive(Serialize)]
pub(crate) struct Credentials<'a> {
    pub(crate) email: &'a str,
    pub(crate) password: &'a str,
}

/// Body of `PUT`/`DELETE /authentications`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshTokenBody<'a> {
    pub(crate) refresh_token: &'a str,
}

/// Body of `POST /users`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub password: String,
}

/// Registration form as filled in by the user.
///
/// The confirmation password is checked locally and never sent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub password: String,
    pub confirm_password: String,
}

impl Registration {
    /// Validate the form and produce the wire body.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::PasswordMismatch`] when the two passwords differ.
    pub fn into_new_user(self) -> Result<NewUser, AuthError> {
        if self.password != self.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }
        Ok(NewUser {
            name: self.name,
            email: self.email,
            phone: self.phone,
            city: self.city,
            password: self.password,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Registered {
    pub(crate) user_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileData {
    pub(crate) user: UserProfile,
}

/// Current user as returned by `GET /users/me`.
///
/// Fields beyond `id`, `name` and `email` are kept verbatim in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(confirm: &str) -> Registration {
        Registration {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            phone: "0812".into(),
            city: "Bandung".into(),
            password: "secret".into(),
            confirm_password: confirm.into(),
        }
    }

    #[test]
    fn registration_drops_confirm_password() {
        let user = form("secret").into_new_user().unwrap();
        let body = serde_json::to_value(&user).unwrap();
        assert_eq!(
            body,
            json!({
                "name": "Ada",
                "email": "ada@example.com",
                "phone": "0812",
                "city": "Bandung",
                "password": "secret"
            })
        );
    }

    #[test]
    fn registration_rejects_mismatched_passwords() {
        assert!(matches!(
            form("other").into_new_user(),
            Err(AuthError::PasswordMismatch)
        ));
    }

    #[test]
    fn token_pair_from_envelope() {
        let env: Envelope<TokenPair> = serde_json::from_value(json!({
            "data": {"accessToken": "a1", "refreshToken": "r1"}
        }))
        .unwrap();
        assert_eq!(env.data.access_token.expose(), "a1");
        assert_eq!(env.data.refresh_token.expose(), "r1");
    }

    #[test]
    fn profile_keeps_unknown_fields() {
        let env: Envelope<ProfileData> = serde_json::from_value(json!({
            "data": {"user": {"id": "u1", "name": "Ada", "email": "ada@example.com", "city": "Bandung"}}
        }))
        .unwrap();
        let user = env.data.user;
        assert_eq!(user.id.as_deref(), Some("u1"));
        assert_eq!(user.extra.get("city"), Some(&json!("Bandung")));
    }

    #[test]
    fn refresh_body_uses_camel_case() {
        let body = serde_json::to_value(RefreshTokenBody { refresh_token: "r1" }).unwrap();
        assert_eq!(body, json!({"refreshToken": "r1"}));
    }
}
