use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status written on every new account and family row.
pub const STATUS_ACTIVE: &str = "Active";

/// Password column value for accounts created through Google sign-in.
pub const GOOGLE_AUTH_PASSWORD: &str = "GOOGLE_AUTH";

/// Password column value for accounts created through phone verification.
pub const PHONE_AUTH_PASSWORD: &str = "PHONE_AUTH";

/// Get the current time as an RFC 3339 string
pub fn now_str() -> String {
    Utc::now().to_rfc3339()
}

/// Obscures a clear-text password before it leaves the client.
///
/// This is base64, not a hash. It only keeps the password out of plain sight in
/// request logs and the users table.
pub fn obscure_password(clear: &str) -> String {
    STANDARD.encode(clear.as_bytes())
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Email,
    Google,
    Phone,
}

impl AuthMethod {
    /// The sentinel stored in place of a password for federated methods.
    pub fn password_sentinel(self) -> Option<&'static str> {
        match self {
            AuthMethod::Email => None,
            AuthMethod::Google => Some(GOOGLE_AUTH_PASSWORD),
            AuthMethod::Phone => Some(PHONE_AUTH_PASSWORD),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Email => write!(f, "email"),
            AuthMethod::Google => write!(f, "google"),
            AuthMethod::Phone => write!(f, "phone"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
    pub status: String,
    pub created_at: String,
}

impl UserAccount {
    /// True when the account was provisioned by Google or phone sign-in and
    /// therefore has no usable password.
    pub fn is_federated(&self) -> bool {
        self.password == GOOGLE_AUTH_PASSWORD || self.password == PHONE_AUTH_PASSWORD
    }
}

/// One row of the individuals table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_id: Option<String>,
    // Rows written before accounts existed carry neither of these
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_email: Option<String>,
    pub timestamp: String,
}

impl Registration {
    pub fn is_registered_by(&self, user_id: &str) -> bool {
        self.registered_by.as_deref() == Some(user_id)
    }

    pub fn belongs_to_family(&self, family_id: &str) -> bool {
        self.family_id.as_deref() == Some(family_id)
    }
}

/// One row of the families table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub family_id: String,
    pub family_head: String,
    /// Cached count of member rows; refreshed on every membership change.
    pub member_count: usize,
    pub status: String,
    pub owner_id: String,
    pub timestamp: String,
}

/// Contact details of a single person as they travel over the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberDetails {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

impl MemberDetails {
    /// Names of the required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        for (field, value) in [
            ("name", &self.name),
            ("phone", &self.phone),
            ("email", &self.email),
            ("address", &self.address),
        ] {
            if value.trim().is_empty() {
                missing.push(field);
            }
        }
        missing
    }

    pub fn into_registration(
        self,
        family_id: Option<String>,
        registered_by: &str,
        creator_email: Option<String>,
        timestamp: &str,
    ) -> Registration {
        Registration {
            id: self.id,
            name: self.name,
            phone: self.phone,
            email: self.email,
            address: self.address,
            family_id,
            registered_by: Some(registered_by.to_string()),
            creator_email,
            timestamp: timestamp.to_string(),
        }
    }
}

impl From<&Registration> for MemberDetails {
    fn from(reg: &Registration) -> Self {
        MemberDetails {
            id: reg.id.clone(),
            name: reg.name.clone(),
            phone: reg.phone.clone(),
            email: reg.email.clone(),
            address: reg.address.clone(),
        }
    }
}

/// Generic message response
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}
