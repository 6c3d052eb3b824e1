use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::models::{Family, Registration, UserAccount};
use crate::store::{RegistrationStore, UserStore};

#[derive(Default)]
struct Tables {
    users: Vec<UserAccount>,
    registrations: Vec<Registration>,
    families: Vec<Family>,
}

/// In-memory record store. Rows keep the order they were written in, like the
/// spreadsheet the service replaces.
#[derive(Default)]
pub struct MockRecordStore {
    tables: RwLock<Tables>,
    failures: Mutex<HashMap<&'static str, usize>>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `operation` succeed `after` more times, then fails it with a backend error.
    pub fn fail_after(&self, operation: &'static str, after: usize) {
        self.lock_failures().insert(operation, after);
    }

    fn lock_failures(&self) -> MutexGuard<'_, HashMap<&'static str, usize>> {
        self.failures.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self, operation: &str) -> Result<()> {
        let mut failures = self.lock_failures();
        let Some(remaining) = failures.get_mut(operation) else {
            return Ok(());
        };
        if *remaining == 0 {
            return Err(StoreError::Backend(format!("{} unavailable", operation)));
        }
        *remaining -= 1;
        Ok(())
    }
}

#[async_trait]
impl UserStore for MockRecordStore {
    async fn create_user(&self, user: UserAccount) -> Result<UserAccount> {
        self.check("create_user")?;
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.user_id == user.user_id) {
            return Err(StoreError::AlreadyExists(user.user_id));
        }
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        self.check("get_user_by_email")?;
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| {
                u.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned())
    }

    async fn get_user_by_phone(&self, phone: &str) -> Result<Option<UserAccount>> {
        self.check("get_user_by_phone")?;
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.phone.as_deref() == Some(phone))
            .cloned())
    }
}

#[async_trait]
impl RegistrationStore for MockRecordStore {
    async fn create_registration(&self, registration: Registration) -> Result<Registration> {
        self.check("create_registration")?;
        let mut tables = self.tables.write().await;
        if tables.registrations.iter().any(|r| r.id == registration.id) {
            return Err(StoreError::AlreadyExists(registration.id));
        }
        tables.registrations.push(registration.clone());
        Ok(registration)
    }

    async fn get_registration(&self, id: &str) -> Result<Registration> {
        self.check("get_registration")?;
        let tables = self.tables.read().await;
        tables
            .registrations
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Registration {}", id)))
    }

    async fn update_registration(&self, registration: Registration) -> Result<Registration> {
        self.check("update_registration")?;
        let mut tables = self.tables.write().await;
        let row = tables
            .registrations
            .iter_mut()
            .find(|r| r.id == registration.id)
            .ok_or_else(|| StoreError::NotFound(format!("Registration {}", registration.id)))?;
        *row = registration.clone();
        Ok(registration)
    }

    async fn delete_registration(&self, id: &str) -> Result<()> {
        self.check("delete_registration")?;
        let mut tables = self.tables.write().await;
        tables.registrations.retain(|r| r.id != id);
        Ok(())
    }

    async fn list_registrations(&self) -> Result<Vec<Registration>> {
        self.check("list_registrations")?;
        Ok(self.tables.read().await.registrations.clone())
    }

    async fn get_family_registrations(&self, family_id: &str) -> Result<Vec<Registration>> {
        self.check("get_family_registrations")?;
        let tables = self.tables.read().await;
        Ok(tables
            .registrations
            .iter()
            .filter(|r| r.belongs_to_family(family_id))
            .cloned()
            .collect())
    }

    async fn create_family(&self, family: Family) -> Result<Family> {
        self.check("create_family")?;
        let mut tables = self.tables.write().await;
        if tables.families.iter().any(|f| f.family_id == family.family_id) {
            return Err(StoreError::AlreadyExists(family.family_id));
        }
        tables.families.push(family.clone());
        Ok(family)
    }

    async fn get_family(&self, family_id: &str) -> Result<Family> {
        self.check("get_family")?;
        let tables = self.tables.read().await;
        tables
            .families
            .iter()
            .find(|f| f.family_id == family_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Family {}", family_id)))
    }

    async fn update_family(&self, family: Family) -> Result<Family> {
        self.check("update_family")?;
        let mut tables = self.tables.write().await;
        let row = tables
            .families
            .iter_mut()
            .find(|f| f.family_id == family.family_id)
            .ok_or_else(|| StoreError::NotFound(format!("Family {}", family.family_id)))?;
        *row = family.clone();
        Ok(family)
    }

    async fn delete_family(&self, family_id: &str) -> Result<()> {
        self.check("delete_family")?;
        let mut tables = self.tables.write().await;
        tables.families.retain(|f| f.family_id != family_id);
        Ok(())
    }

    async fn list_families(&self) -> Result<Vec<Family>> {
        self.check("list_families")?;
        Ok(self.tables.read().await.families.clone())
    }
}
