use async_trait::async_trait;

use crate::identity::{IdentityVerifier, VerifiedIdentity, VerifyError};
use crate::models::AuthMethod;

const GOOGLE_PREFIX: &str = "test-google:";
const PHONE_PREFIX: &str = "test-phone:";

/// A Google token the mock verifier accepts for `email`.
pub fn google_proof(email: &str) -> String {
    format!("{GOOGLE_PREFIX}{email}")
}

/// A phone token the mock verifier accepts for `phone`.
pub fn phone_proof(phone: &str) -> String {
    format!("{PHONE_PREFIX}{phone}")
}

/// Accepts only tokens built by `google_proof` and `phone_proof`.
#[derive(Default)]
pub struct MockIdentityVerifier;

impl MockIdentityVerifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IdentityVerifier for MockIdentityVerifier {
    async fn verify(
        &self,
        method: AuthMethod,
        proof: &str,
    ) -> Result<VerifiedIdentity, VerifyError> {
        if proof.trim().is_empty() {
            return Err(VerifyError::Missing);
        }

        let rejected = || VerifyError::Rejected(format!("not a {} test token", method));
        match method {
            AuthMethod::Google => {
                let email = proof.strip_prefix(GOOGLE_PREFIX).ok_or_else(rejected)?;
                Ok(VerifiedIdentity {
                    method,
                    email: Some(email.to_string()),
                    phone: None,
                    name: None,
                })
            }
            AuthMethod::Phone => {
                let phone = proof.strip_prefix(PHONE_PREFIX).ok_or_else(rejected)?;
                Ok(VerifiedIdentity {
                    method,
                    email: None,
                    phone: Some(phone.to_string()),
                    name: None,
                })
            }
            AuthMethod::Email => Err(rejected()),
        }
    }
}
