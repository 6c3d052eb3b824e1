//! The signed-in user's session and the bearer token that carries it.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::JWT_SECRET;
use crate::models::AuthMethod;

/// Storage key the session blob lives under on the client.
pub const SESSION_KEY: &str = "userSession";

/// Sessions older than this are discarded.
pub fn session_ttl() -> Duration {
    Duration::days(30)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Epoch milliseconds
    pub login_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<AuthMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Session {
    /// A session that starts now.
    pub fn start(
        user_id: impl Into<String>,
        name: impl Into<String>,
        email: Option<String>,
        phone: Option<String>,
        auth_method: AuthMethod,
    ) -> Self {
        Session {
            user_id: user_id.into(),
            name: name.into(),
            email,
            phone,
            login_time: Utc::now().timestamp_millis(),
            auth_method: Some(auth_method),
            token: None,
        }
    }

    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        now_millis - self.login_time >= session_ttl().num_milliseconds()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp_millis())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub login_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<AuthMethod>,
    pub exp: u64,
}

impl Claims {
    pub fn into_session(self, token: Option<String>) -> Session {
        Session {
            user_id: self.sub,
            name: self.name,
            email: self.email,
            phone: self.phone,
            login_time: self.login_time,
            auth_method: self.auth_method,
            token,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum TokenError {
    #[error("Session expired")]
    Expired,

    #[error("Invalid session token: {0}")]
    Invalid(String),
}

/// Signs a token for `session` with the configured secret.
pub fn issue_token(session: &Session) -> Result<String, TokenError> {
    encode_token(session, JWT_SECRET.as_bytes())
}

/// Validates `token` with the configured secret.
pub fn decode_token(token: &str) -> Result<Claims, TokenError> {
    decode_token_with(token, JWT_SECRET.as_bytes())
}

pub fn encode_token(session: &Session, secret: &[u8]) -> Result<String, TokenError> {
    let expires_millis = session.login_time + session_ttl().num_milliseconds();
    let claims = Claims {
        sub: session.user_id.clone(),
        name: session.name.clone(),
        email: session.email.clone(),
        phone: session.phone.clone(),
        login_time: session.login_time,
        auth_method: session.auth_method,
        exp: (expires_millis / 1000).max(0) as u64,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
        .map_err(|e| TokenError::Invalid(e.to_string()))
}

pub fn decode_token_with(token: &str, secret: &[u8]) -> Result<Claims, TokenError> {
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &Validation::default())
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        })?;

    // exp has a leeway; the login time is the authority
    let claims = data.claims;
    if claims.clone().into_session(None).is_expired() {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}
