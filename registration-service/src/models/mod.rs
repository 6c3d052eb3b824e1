use retreat_shared::models::{AuthMethod, MemberDetails, Registration};
use serde::{Deserialize, Serialize};

// Request DTOs
#[derive(Deserialize, Debug)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Deserialize, Debug)]
pub struct AuthenticateRequest {
    pub email: String,
    /// Obscured on the client before transmission
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct CreateUserRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub password: String,
}

/// Contact details come from the verified `proof`, never from the body.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    #[serde(default)]
    pub name: String,
    pub auth_method: AuthMethod,
    /// ID token issued by the identity provider
    #[serde(default)]
    pub proof: String,
}

/// Body of `POST /registrations`, tagged by `type`.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SubmitRequest {
    Individual(MemberDetails),
    Family(FamilySubmission),
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FamilySubmission {
    pub family_id: String,
    pub family_head: String,
    pub members: Vec<MemberDetails>,
    #[serde(default)]
    pub is_existing: bool,
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateRegistrationRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl UpdateRegistrationRequest {
    pub fn has_updates(&self) -> bool {
        [&self.name, &self.phone, &self.email, &self.address]
            .iter()
            .any(|field| field.is_some())
    }
}

// Response DTOs
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub success: bool,
    pub user_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
}

/// A single registration as returned by `GET /registrations/:id`.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub family_id: Option<String>,
    pub user_id: Option<String>,
}

impl From<Registration> for RegistrationResponse {
    fn from(reg: Registration) -> Self {
        RegistrationResponse {
            id: reg.id,
            name: reg.name,
            phone: reg.phone,
            email: reg.email,
            address: reg.address,
            family_id: reg.family_id,
            user_id: reg.registered_by,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMembersResponse {
    pub family_id: String,
    pub family_head: String,
    pub owner_id: String,
    pub members: Vec<MemberDetails>,
}
