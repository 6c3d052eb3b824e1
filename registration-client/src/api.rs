use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::{Client, RequestBuilder, Url};
use retreat_shared::dashboard::Dashboard;
use retreat_shared::models::{AuthMethod, MemberDetails, MessageResponse};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{ClientError, Result};

/// Account as returned by the user routes. `token` is present whenever a session
/// was started.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub created: Option<bool>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Already obscured
    pub password: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionAccount {
    pub name: String,
    pub auth_method: AuthMethod,
    /// ID token from the identity provider; the service reads the contact details from it
    pub proof: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDetails {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    #[serde(default)]
    pub family_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// A family with its current members.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMembers {
    pub family_id: String,
    pub family_head: String,
    #[serde(default)]
    pub owner_id: String,
    pub members: Vec<MemberDetails>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FamilySubmission {
    pub family_id: String,
    pub family_head: String,
    pub members: Vec<MemberDetails>,
    pub is_existing: bool,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FamilyReceipt {
    pub family_id: String,
    pub member_count: usize,
    pub added_count: usize,
    pub created: bool,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct RegistrationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// The operations the registration service exposes.
#[async_trait]
pub trait RecordStoreApi: Send + Sync {
    /// Token sent with every later request; `None` signs the client out.
    async fn set_session_token(&self, token: Option<String>);

    async fn check_user(&self, email: &str) -> Result<bool>;
    async fn authenticate_user(&self, email: &str, obscured_password: &str) -> Result<AccountInfo>;
    async fn get_user_by_email(&self, email: &str) -> Result<AccountInfo>;
    async fn create_user(&self, account: &NewAccount) -> Result<AccountInfo>;
    async fn provision_user(&self, account: &ProvisionAccount) -> Result<AccountInfo>;

    async fn get_user_registrations(&self) -> Result<Dashboard>;
    async fn get_registration(&self, id: &str) -> Result<RegistrationDetails>;
    async fn get_family_members(&self, family_id: &str) -> Result<FamilyMembers>;
    async fn search_family_by_email(&self, email: &str) -> Result<Vec<FamilyMembers>>;
    async fn submit_individual(&self, details: &MemberDetails) -> Result<String>;
    async fn submit_family(&self, submission: &FamilySubmission) -> Result<FamilyReceipt>;
    async fn update_registration(
        &self,
        id: &str,
        update: &RegistrationUpdate,
    ) -> Result<RegistrationDetails>;
    async fn delete_registration(&self, id: &str) -> Result<()>;
    async fn delete_family(&self, family_id: &str) -> Result<usize>;
    async fn quit_family(&self, family_id: &str) -> Result<usize>;
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ExistsResponse {
    exists: bool,
}

#[derive(Deserialize)]
struct SubmittedIndividual {
    id: String,
}

#[derive(Deserialize)]
struct FamilySearchResponse {
    families: Vec<FamilyMembers>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeletedCount {
    deleted_count: usize,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Tagged body of `POST /registrations`.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Submission<'a> {
    Individual(&'a MemberDetails),
    Family(&'a FamilySubmission),
}

/// `RecordStoreApi` over HTTP. Nothing is retried; a failed call is returned to
/// the caller as is.
pub struct HttpRecordStore {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpRecordStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Registration service client for {}", base_url);
        Self {
            client: Client::new(),
            base_url,
            token: RwLock::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Appends percent-encoded `segments` to the base URL, so an id is always a
    /// single path segment.
    fn resource_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ClientError::Transport(format!("invalid service URL {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Transport(format!("service URL {} cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = match self.token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            error!("Request to registration service failed: {}", e);
            ClientError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<MessageResponse>(&text)
                .map(|body| body.message)
                .unwrap_or(text);
            error!(
                "Registration service returned error status {}: {}",
                status, message
            );
            return Err(ClientError::from_status(status.as_u16(), message));
        }

        response.json::<T>().await.map_err(|e| {
            error!("Failed to parse registration service response: {}", e);
            ClientError::Decode(e.to_string())
        })
    }
}

#[async_trait]
impl RecordStoreApi for HttpRecordStore {
    async fn set_session_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    async fn check_user(&self, email: &str) -> Result<bool> {
        let request = self
            .client
            .get(self.url("/users/check"))
            .query(&[("email", email)]);
        let body: ExistsResponse = self.send(request).await?;
        Ok(body.exists)
    }

    async fn authenticate_user(&self, email: &str, obscured_password: &str) -> Result<AccountInfo> {
        let request = self
            .client
            .post(self.url("/users/authenticate"))
            .json(&Credentials {
                email,
                password: obscured_password,
            });
        self.send(request).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<AccountInfo> {
        let request = self
            .client
            .get(self.url("/users/by-email"))
            .query(&[("email", email)]);
        self.send(request).await
    }

    async fn create_user(&self, account: &NewAccount) -> Result<AccountInfo> {
        let request = self.client.post(self.url("/users")).json(account);
        self.send(request).await
    }

    async fn provision_user(&self, account: &ProvisionAccount) -> Result<AccountInfo> {
        let request = self.client.post(self.url("/users/provision")).json(account);
        self.send(request).await
    }

    async fn get_user_registrations(&self) -> Result<Dashboard> {
        let request = self.client.get(self.url("/registrations"));
        let body: DataEnvelope<Dashboard> = self.send(request).await?;
        debug!(
            "Dashboard: {} individual(s), {} famil(ies)",
            body.data.individuals.len(),
            body.data.families.len()
        );
        Ok(body.data)
    }

    async fn get_registration(&self, id: &str) -> Result<RegistrationDetails> {
        let request = self.client.get(self.resource_url(&["registrations", id])?);
        let body: DataEnvelope<RegistrationDetails> = self.send(request).await?;
        Ok(body.data)
    }

    async fn get_family_members(&self, family_id: &str) -> Result<FamilyMembers> {
        let request = self
            .client
            .get(self.resource_url(&["families", family_id, "members"])?);
        self.send(request).await
    }

    async fn search_family_by_email(&self, email: &str) -> Result<Vec<FamilyMembers>> {
        let request = self
            .client
            .get(self.url("/families/search"))
            .query(&[("email", email)]);
        let body: FamilySearchResponse = self.send(request).await?;
        Ok(body.families)
    }

    async fn submit_individual(&self, details: &MemberDetails) -> Result<String> {
        let request = self
            .client
            .post(self.url("/registrations"))
            .json(&Submission::Individual(details));
        let body: SubmittedIndividual = self.send(request).await?;
        Ok(body.id)
    }

    async fn submit_family(&self, submission: &FamilySubmission) -> Result<FamilyReceipt> {
        let request = self
            .client
            .post(self.url("/registrations"))
            .json(&Submission::Family(submission));
        self.send(request).await
    }

    async fn update_registration(
        &self,
        id: &str,
        update: &RegistrationUpdate,
    ) -> Result<RegistrationDetails> {
        let request = self
            .client
            .patch(self.resource_url(&["registrations", id])?)
            .json(update);
        let body: DataEnvelope<RegistrationDetails> = self.send(request).await?;
        Ok(body.data)
    }

    async fn delete_registration(&self, id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.resource_url(&["registrations", id])?);
        let _: MessageResponse = self.send(request).await?;
        Ok(())
    }

    async fn delete_family(&self, family_id: &str) -> Result<usize> {
        let request = self
            .client
            .delete(self.resource_url(&["families", family_id])?);
        let body: DeletedCount = self.send(request).await?;
        Ok(body.deleted_count)
    }

    async fn quit_family(&self, family_id: &str) -> Result<usize> {
        let request = self
            .client
            .post(self.resource_url(&["families", family_id, "quit"])?);
        let body: DeletedCount = self.send(request).await?;
        Ok(body.deleted_count)
    }
}
