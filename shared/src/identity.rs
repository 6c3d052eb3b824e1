//! Server-side checks of Google and phone sign-in tokens.
//!
//! The browser signs in with the identity provider and hands the resulting ID
//! token to `POST /users/provision`. Only the identity the provider vouches for
//! is used to find or create an account; the request body's contact fields are
//! never trusted on their own.

use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::config::{FIREBASE_API_KEY, IDENTITY_TOOLKIT_URL};
use crate::models::AuthMethod;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("A sign-in token is required.")]
    Missing,

    #[error("Sign-in token rejected: {0}")]
    Rejected(String),

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Who the provider says the token belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    pub method: AuthMethod,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, method: AuthMethod, proof: &str)
        -> Result<VerifiedIdentity, VerifyError>;
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    phone_number: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    provider_user_info: Vec<ProviderInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderInfo {
    provider_id: String,
}

fn provider_id(method: AuthMethod) -> Option<&'static str> {
    match method {
        AuthMethod::Email => None,
        AuthMethod::Google => Some("google.com"),
        AuthMethod::Phone => Some("phone"),
    }
}

/// Looks ID tokens up with the identity toolkit `accounts:lookup` endpoint.
pub struct FirebaseIdentityVerifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FirebaseIdentityVerifier {
    pub fn new() -> Self {
        Self::with_endpoint(IDENTITY_TOOLKIT_URL.clone(), FIREBASE_API_KEY.clone())
    }

    pub fn with_endpoint(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

impl Default for FirebaseIdentityVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseIdentityVerifier {
    async fn verify(
        &self,
        method: AuthMethod,
        proof: &str,
    ) -> Result<VerifiedIdentity, VerifyError> {
        let proof = proof.trim();
        if proof.is_empty() {
            return Err(VerifyError::Missing);
        }
        let Some(expected_provider) = provider_id(method) else {
            return Err(VerifyError::Rejected(
                "email accounts sign in with a password".into(),
            ));
        };
        if self.api_key.is_empty() {
            return Err(VerifyError::Unavailable("no API key configured".into()));
        }

        let url = format!("{}/v1/accounts:lookup", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({ "idToken": proof }))
            .send()
            .await
            .map_err(|e| VerifyError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            warn!("Identity provider rejected a {} token: {}", method, status);
            return Err(VerifyError::Rejected(format!(
                "provider answered {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(VerifyError::Unavailable(format!(
                "provider answered {}",
                status
            )));
        }

        let lookup: LookupResponse = response
            .json()
            .await
            .map_err(|e| VerifyError::Unavailable(e.to_string()))?;
        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| VerifyError::Rejected("no user behind this token".into()))?;

        if !user
            .provider_user_info
            .iter()
            .any(|p| p.provider_id == expected_provider)
        {
            return Err(VerifyError::Rejected(format!(
                "token was not issued for {} sign-in",
                method
            )));
        }

        let identity = match method {
            AuthMethod::Phone => {
                let phone = user
                    .phone_number
                    .ok_or_else(|| VerifyError::Rejected("no phone number on token".into()))?;
                VerifiedIdentity {
                    method,
                    email: None,
                    phone: Some(phone),
                    name: user.display_name,
                }
            }
            _ => {
                let email = user
                    .email
                    .filter(|_| user.email_verified)
                    .ok_or_else(|| VerifyError::Rejected("email is not verified".into()))?;
                VerifiedIdentity {
                    method,
                    email: Some(email),
                    phone: None,
                    name: user.display_name,
                }
            }
        };

        debug!(
            "Verified {} token for {:?}",
            method,
            identity.email.as_ref().or(identity.phone.as_ref())
        );
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    async fn lookup_server(
        status: usize,
        body: serde_json::Value,
    ) -> (mockito::ServerGuard, mockito::Mock) {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/accounts:lookup")
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_body(Matcher::PartialJson(json!({ "idToken": "id-token" })))
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;
        (server, mock)
    }

    #[tokio::test]
    async fn test_google_token_yields_verified_email() {
        let (server, mock) = lookup_server(
            200,
            json!({ "users": [{
                "email": "gina@example.com",
                "emailVerified": true,
                "displayName": "Gina Google",
                "providerUserInfo": [{ "providerId": "google.com" }]
            }]}),
        )
        .await;
        let verifier = FirebaseIdentityVerifier::with_endpoint(server.url(), "test-key".into());

        let identity = verifier.verify(AuthMethod::Google, "id-token").await.unwrap();

        mock.assert_async().await;
        assert_eq!(identity.email.as_deref(), Some("gina@example.com"));
        assert_eq!(identity.name.as_deref(), Some("Gina Google"));
        assert_eq!(identity.phone, None);
    }

    #[tokio::test]
    async fn test_phone_token_must_come_from_phone_provider() {
        let (server, _mock) = lookup_server(
            200,
            json!({ "users": [{
                "email": "gina@example.com",
                "emailVerified": true,
                "providerUserInfo": [{ "providerId": "google.com" }]
            }]}),
        )
        .await;
        let verifier = FirebaseIdentityVerifier::with_endpoint(server.url(), "test-key".into());

        let result = verifier.verify(AuthMethod::Phone, "id-token").await;

        assert!(matches!(result, Err(VerifyError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_invalid_token_is_rejected() {
        let (server, _mock) = lookup_server(
            400,
            json!({ "error": { "message": "INVALID_ID_TOKEN" } }),
        )
        .await;
        let verifier = FirebaseIdentityVerifier::with_endpoint(server.url(), "test-key".into());

        let result = verifier.verify(AuthMethod::Google, "id-token").await;

        assert!(matches!(result, Err(VerifyError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_unverified_google_email_is_rejected() {
        let (server, _mock) = lookup_server(
            200,
            json!({ "users": [{
                "email": "gina@example.com",
                "emailVerified": false,
                "providerUserInfo": [{ "providerId": "google.com" }]
            }]}),
        )
        .await;
        let verifier = FirebaseIdentityVerifier::with_endpoint(server.url(), "test-key".into());

        let result = verifier.verify(AuthMethod::Google, "id-token").await;

        assert!(matches!(result, Err(VerifyError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_empty_token_and_email_method() {
        let verifier =
            FirebaseIdentityVerifier::with_endpoint("http://127.0.0.1:9".into(), "test-key".into());

        assert!(matches!(
            verifier.verify(AuthMethod::Google, "  ").await,
            Err(VerifyError::Missing)
        ));
        assert!(matches!(
            verifier.verify(AuthMethod::Email, "id-token").await,
            Err(VerifyError::Rejected(_))
        ));
    }
}
