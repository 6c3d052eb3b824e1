use async_trait::async_trait;
use retreat_shared::dashboard::Dashboard;
use retreat_shared::models::{MemberDetails, GOOGLE_AUTH_PASSWORD, PHONE_AUTH_PASSWORD};
use tokio::sync::Mutex;

use crate::api::{
    AccountInfo, FamilyMembers, FamilyReceipt, FamilySubmission, NewAccount, ProvisionAccount,
    RecordStoreApi, RegistrationDetails, RegistrationUpdate,
};
use crate::error::{ClientError, Result};

struct Account {
    user_id: String,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    password: String,
}

impl Account {
    fn info(&self, created: Option<bool>) -> AccountInfo {
        AccountInfo {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            token: Some(format!("token-{}", self.user_id)),
            created,
        }
    }
}

struct Row {
    details: MemberDetails,
    family_id: Option<String>,
}

struct FamilyRow {
    family_id: String,
    family_head: String,
    owner_id: String,
}

#[derive(Default)]
struct State {
    token: Option<String>,
    accounts: Vec<Account>,
    rows: Vec<Row>,
    families: Vec<FamilyRow>,
    submissions: usize,
}

impl State {
    fn family_view(&self, family: &FamilyRow) -> FamilyMembers {
        FamilyMembers {
            family_id: family.family_id.clone(),
            family_head: family.family_head.clone(),
            owner_id: family.owner_id.clone(),
            members: self
                .rows
                .iter()
                .filter(|row| row.family_id.as_deref() == Some(family.family_id.as_str()))
                .map(|row| row.details.clone())
                .collect(),
        }
    }
}

/// In-memory stand-in for the registration service.
#[derive(Default)]
pub struct FakeRecordStore {
    state: Mutex<State>,
}

impl FakeRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_family(&self, family_id: &str, family_head: &str, members: &[MemberDetails]) {
        let mut state = self.state.lock().await;
        state.families.push(FamilyRow {
            family_id: family_id.to_string(),
            family_head: family_head.to_string(),
            owner_id: "USER-OWNER".to_string(),
        });
        for member in members {
            state.rows.push(Row {
                details: member.clone(),
                family_id: Some(family_id.to_string()),
            });
        }
    }

    pub async fn current_token(&self) -> Option<String> {
        self.state.lock().await.token.clone()
    }

    pub async fn password_of(&self, email: &str) -> Option<String> {
        let state = self.state.lock().await;
        state
            .accounts
            .iter()
            .find(|a| a.email.as_deref() == Some(email))
            .map(|a| a.password.clone())
    }

    pub async fn account_count(&self) -> usize {
        self.state.lock().await.accounts.len()
    }

    pub async fn submissions(&self) -> usize {
        self.state.lock().await.submissions
    }

    pub async fn family_size(&self, family_id: &str) -> usize {
        let state = self.state.lock().await;
        state
            .rows
            .iter()
            .filter(|row| row.family_id.as_deref() == Some(family_id))
            .count()
    }
}

fn matches_email(account: &Account, email: &str) -> bool {
    account
        .email
        .as_deref()
        .is_some_and(|e| e.eq_ignore_ascii_case(email))
}

#[async_trait]
impl RecordStoreApi for FakeRecordStore {
    async fn set_session_token(&self, token: Option<String>) {
        self.state.lock().await.token = token;
    }

    async fn check_user(&self, email: &str) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.accounts.iter().any(|a| matches_email(a, email)))
    }

    async fn authenticate_user(&self, email: &str, obscured_password: &str) -> Result<AccountInfo> {
        let state = self.state.lock().await;
        state
            .accounts
            .iter()
            .find(|a| matches_email(a, email))
            .filter(|a| {
                a.password == obscured_password
                    && a.password != GOOGLE_AUTH_PASSWORD
                    && a.password != PHONE_AUTH_PASSWORD
            })
            .map(|a| a.info(None))
            .ok_or_else(|| ClientError::Unauthenticated("Invalid email or password.".into()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<AccountInfo> {
        let state = self.state.lock().await;
        state
            .accounts
            .iter()
            .find(|a| matches_email(a, email))
            .map(|a| a.info(None))
            .ok_or_else(|| ClientError::NotFound("User not found".into()))
    }

    async fn create_user(&self, account: &NewAccount) -> Result<AccountInfo> {
        let mut state = self.state.lock().await;
        if let Some(email) = &account.email {
            if state.accounts.iter().any(|a| matches_email(a, email)) {
                return Err(ClientError::Conflict("Account exists".into()));
            }
        }
        let created = Account {
            user_id: format!("USER-{}", state.accounts.len() + 1),
            name: account.name.clone(),
            email: account.email.clone(),
            phone: account.phone.clone(),
            password: account.password.clone(),
        };
        let info = created.info(Some(true));
        state.accounts.push(created);
        Ok(info)
    }

    async fn provision_user(&self, account: &ProvisionAccount) -> Result<AccountInfo> {
        let mut state = self.state.lock().await;
        let sentinel = account
            .auth_method
            .password_sentinel()
            .ok_or_else(|| ClientError::Validation("Email accounts need a password".into()))?;

        // Tokens look like "google:<email>" or "phone:<number>"
        let (email, phone) = match account.proof.split_once(':') {
            Some(("google", email)) if !email.is_empty() => (Some(email.to_string()), None),
            Some(("phone", phone)) if !phone.is_empty() => (None, Some(phone.to_string())),
            _ => return Err(ClientError::Unauthenticated("Sign-in token rejected".into())),
        };

        let existing = state.accounts.iter().find(|a| {
            email.as_deref().is_some_and(|e| matches_email(a, e))
                || (phone.is_some() && a.phone == phone)
        });
        if let Some(existing) = existing {
            if existing.password != sentinel {
                return Err(ClientError::Conflict("Account exists".into()));
            }
            return Ok(existing.info(Some(false)));
        }

        let name = if account.name.is_empty() {
            phone.clone().or(email.clone()).unwrap_or_default()
        } else {
            account.name.clone()
        };
        let created = Account {
            user_id: format!("USER-{}", state.accounts.len() + 1),
            name,
            email,
            phone,
            password: sentinel.to_string(),
        };
        let info = created.info(Some(true));
        state.accounts.push(created);
        Ok(info)
    }

    async fn get_user_registrations(&self) -> Result<Dashboard> {
        Ok(Dashboard::default())
    }

    async fn get_registration(&self, id: &str) -> Result<RegistrationDetails> {
        let state = self.state.lock().await;
        state
            .rows
            .iter()
            .find(|row| row.details.id == id)
            .map(|row| RegistrationDetails {
                id: row.details.id.clone(),
                name: row.details.name.clone(),
                phone: row.details.phone.clone(),
                email: row.details.email.clone(),
                address: row.details.address.clone(),
                family_id: row.family_id.clone(),
                user_id: None,
            })
            .ok_or_else(|| ClientError::NotFound(format!("Registration {} not found", id)))
    }

    async fn get_family_members(&self, family_id: &str) -> Result<FamilyMembers> {
        let state = self.state.lock().await;
        state
            .families
            .iter()
            .find(|f| f.family_id == family_id)
            .map(|f| state.family_view(f))
            .ok_or_else(|| ClientError::NotFound(format!("Family ID {} not found", family_id)))
    }

    async fn search_family_by_email(&self, email: &str) -> Result<Vec<FamilyMembers>> {
        let state = self.state.lock().await;
        let found: Vec<_> = state
            .families
            .iter()
            .map(|f| state.family_view(f))
            .filter(|view| {
                view.members
                    .iter()
                    .any(|m| m.email.eq_ignore_ascii_case(email))
            })
            .collect();
        if found.is_empty() {
            return Err(ClientError::NotFound(format!(
                "No family registration found for {}",
                email
            )));
        }
        Ok(found)
    }

    async fn submit_individual(&self, details: &MemberDetails) -> Result<String> {
        let mut state = self.state.lock().await;
        state.submissions += 1;
        if state.rows.iter().any(|row| row.details.id == details.id) {
            return Err(ClientError::Conflict(format!("{} already exists", details.id)));
        }
        state.rows.push(Row {
            details: details.clone(),
            family_id: None,
        });
        Ok(details.id.clone())
    }

    async fn submit_family(&self, submission: &FamilySubmission) -> Result<FamilyReceipt> {
        let mut state = self.state.lock().await;
        state.submissions += 1;

        if submission.members.is_empty() {
            return Err(ClientError::Validation("Nothing to submit".into()));
        }
        let exists = state
            .families
            .iter()
            .any(|f| f.family_id == submission.family_id);
        match (submission.is_existing, exists) {
            (true, false) => return Err(ClientError::NotFound("Family not found".into())),
            (false, true) => return Err(ClientError::Conflict("Family exists".into())),
            _ => {}
        }

        if !submission.is_existing {
            let owner_id = state.token.clone().unwrap_or_default();
            state.families.push(FamilyRow {
                family_id: submission.family_id.clone(),
                family_head: submission.family_head.clone(),
                owner_id,
            });
        }
        for member in &submission.members {
            state.rows.push(Row {
                details: member.clone(),
                family_id: Some(submission.family_id.clone()),
            });
        }

        let member_count = state
            .rows
            .iter()
            .filter(|row| row.family_id.as_deref() == Some(submission.family_id.as_str()))
            .count();
        Ok(FamilyReceipt {
            family_id: submission.family_id.clone(),
            member_count,
            added_count: submission.members.len(),
            created: !submission.is_existing,
        })
    }

    async fn update_registration(
        &self,
        id: &str,
        _update: &RegistrationUpdate,
    ) -> Result<RegistrationDetails> {
        self.get_registration(id).await
    }

    async fn delete_registration(&self, id: &str) -> Result<()> {
        self.state.lock().await.rows.retain(|row| row.details.id != id);
        Ok(())
    }

    async fn delete_family(&self, family_id: &str) -> Result<usize> {
        let mut state = self.state.lock().await;
        let before = state.rows.len();
        state
            .rows
            .retain(|row| row.family_id.as_deref() != Some(family_id));
        state.families.retain(|f| f.family_id != family_id);
        Ok(before - state.rows.len())
    }

    async fn quit_family(&self, _family_id: &str) -> Result<usize> {
        Ok(0)
    }
}
