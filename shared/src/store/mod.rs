use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Family, Registration, UserAccount};

pub mod dynamo;

/// Account lookups and creation.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `AlreadyExists` when the user id is taken.
    async fn create_user(&self, user: UserAccount) -> Result<UserAccount>;

    /// Case-insensitive match on the email column.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserAccount>>;

    async fn get_user_by_phone(&self, phone: &str) -> Result<Option<UserAccount>>;
}

/// The individuals and families tables.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Fails with `AlreadyExists` when the registration id is taken.
    async fn create_registration(&self, registration: Registration) -> Result<Registration>;

    async fn get_registration(&self, id: &str) -> Result<Registration>;

    /// Fails with `NotFound` when the row does not exist.
    async fn update_registration(&self, registration: Registration) -> Result<Registration>;

    async fn delete_registration(&self, id: &str) -> Result<()>;

    /// Every row, in insertion order where the backend preserves it.
    async fn list_registrations(&self) -> Result<Vec<Registration>>;

    async fn get_family_registrations(&self, family_id: &str) -> Result<Vec<Registration>>;

    /// Fails with `AlreadyExists` when the family id is taken.
    async fn create_family(&self, family: Family) -> Result<Family>;

    async fn get_family(&self, family_id: &str) -> Result<Family>;

    async fn update_family(&self, family: Family) -> Result<Family>;

    async fn delete_family(&self, family_id: &str) -> Result<()>;

    async fn list_families(&self) -> Result<Vec<Family>>;
}
