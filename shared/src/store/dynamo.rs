use async_trait::async_trait;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use log::{debug, error, info};
use serde_dynamo::{from_item, from_items, to_item};
use std::collections::HashMap;

use super::{RegistrationStore, UserStore};
use crate::config::{dynamodb_endpoint, FAMILIES_TABLE, INDIVIDUALS_TABLE, USERS_TABLE};
use crate::error::{Result, StoreError};
use crate::models::{Family, Registration, UserAccount};

type Item = HashMap<String, AttributeValue>;

/// Builds a DynamoDB client, honouring `DYNAMODB_ENDPOINT` for local tables.
pub async fn create_client() -> Client {
    let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await;

    match dynamodb_endpoint() {
        Some(endpoint) => {
            info!("Using DynamoDB endpoint override: {}", endpoint);
            let dynamo_config = aws_sdk_dynamodb::config::Builder::from(&config)
                .endpoint_url(endpoint)
                .build();
            Client::from_conf(dynamo_config)
        }
        None => Client::new(&config),
    }
}

/// Record store backed by three DynamoDB tables keyed by
/// `userId`, `id` and `familyId` respectively.
#[derive(Clone)]
pub struct DynamoRecordStore {
    client: Client,
    users_table: String,
    individuals_table: String,
    families_table: String,
}

impl DynamoRecordStore {
    pub async fn new() -> Self {
        let client = create_client().await;
        Self::with_client_and_tables(
            client,
            USERS_TABLE.clone(),
            INDIVIDUALS_TABLE.clone(),
            FAMILIES_TABLE.clone(),
        )
    }

    pub fn with_client_and_tables(
        client: Client,
        users_table: String,
        individuals_table: String,
        families_table: String,
    ) -> Self {
        debug!(
            "DynamoRecordStore tables: users={}, individuals={}, families={}",
            users_table, individuals_table, families_table
        );
        Self {
            client,
            users_table,
            individuals_table,
            families_table,
        }
    }

    /// Writes `item` only if nothing is stored under `key_name` yet.
    async fn put_new(&self, table: &str, key_name: &str, key: &str, item: Item) -> Result<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(#k)")
            .expression_attribute_names("#k", key_name)
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                PutItemError::ConditionalCheckFailedException(_) => {
                    StoreError::AlreadyExists(key.to_string())
                }
                other => {
                    error!("put_item on {} failed: {}", table, other);
                    StoreError::Backend(other.to_string())
                }
            })?;
        Ok(())
    }

    /// Overwrites `item` only if something is already stored under `key_name`.
    async fn put_existing(&self, table: &str, key_name: &str, key: &str, item: Item) -> Result<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .condition_expression("attribute_exists(#k)")
            .expression_attribute_names("#k", key_name)
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                PutItemError::ConditionalCheckFailedException(_) => {
                    StoreError::NotFound(key.to_string())
                }
                other => {
                    error!("put_item on {} failed: {}", table, other);
                    StoreError::Backend(other.to_string())
                }
            })?;
        Ok(())
    }

    async fn get(&self, table: &str, key_name: &str, key: &str) -> Result<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .key(key_name, AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| {
                error!("get_item on {} failed: {}", table, e);
                StoreError::Backend(e.to_string())
            })?;
        Ok(output.item)
    }

    async fn delete(&self, table: &str, key_name: &str, key: &str) -> Result<()> {
        self.client
            .delete_item()
            .table_name(table)
            .key(key_name, AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| {
                error!("delete_item on {} failed: {}", table, e);
                StoreError::Backend(e.to_string())
            })?;
        Ok(())
    }

    /// Full scan, following pagination, with an optional `attr = value` filter.
    async fn scan(&self, table: &str, filter: Option<(&str, &str)>) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let mut request = self
                .client
                .scan()
                .table_name(table)
                .set_exclusive_start_key(start_key.take());

            if let Some((attr, value)) = filter {
                request = request
                    .filter_expression("#f = :v")
                    .expression_attribute_names("#f", attr)
                    .expression_attribute_values(":v", AttributeValue::S(value.to_string()));
            }

            let output = request.send().await.map_err(|e| {
                error!("scan on {} failed: {}", table, e);
                StoreError::Backend(e.to_string())
            })?;

            if let Some(page) = output.items {
                items.extend(page);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn scan_users(&self) -> Result<Vec<UserAccount>> {
        let items = self.scan(&self.users_table, None).await?;
        Ok(from_items(items)?)
    }
}

// Scans come back in hash order; timestamps restore the order rows were written in
fn sort_by_timestamp(rows: &mut [Registration]) {
    rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
}

#[async_trait]
impl UserStore for DynamoRecordStore {
    async fn create_user(&self, user: UserAccount) -> Result<UserAccount> {
        let item: Item = to_item(&user)?;
        self.put_new(&self.users_table, "userId", &user.user_id, item)
            .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        Ok(self.scan_users().await?.into_iter().find(|u| {
            u.email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(email))
        }))
    }

    async fn get_user_by_phone(&self, phone: &str) -> Result<Option<UserAccount>> {
        Ok(self
            .scan_users()
            .await?
            .into_iter()
            .find(|u| u.phone.as_deref() == Some(phone)))
    }
}

#[async_trait]
impl RegistrationStore for DynamoRecordStore {
    async fn create_registration(&self, registration: Registration) -> Result<Registration> {
        let item: Item = to_item(&registration)?;
        self.put_new(&self.individuals_table, "id", &registration.id, item)
            .await?;
        Ok(registration)
    }

    async fn get_registration(&self, id: &str) -> Result<Registration> {
        match self.get(&self.individuals_table, "id", id).await? {
            Some(item) => Ok(from_item(item)?),
            None => Err(StoreError::NotFound(format!("Registration {}", id))),
        }
    }

    async fn update_registration(&self, registration: Registration) -> Result<Registration> {
        let item: Item = to_item(&registration)?;
        self.put_existing(&self.individuals_table, "id", &registration.id, item)
            .await?;
        Ok(registration)
    }

    async fn delete_registration(&self, id: &str) -> Result<()> {
        self.delete(&self.individuals_table, "id", id).await
    }

    async fn list_registrations(&self) -> Result<Vec<Registration>> {
        let items = self.scan(&self.individuals_table, None).await?;
        let mut rows: Vec<Registration> = from_items(items)?;
        sort_by_timestamp(&mut rows);
        Ok(rows)
    }

    async fn get_family_registrations(&self, family_id: &str) -> Result<Vec<Registration>> {
        let items = self
            .scan(&self.individuals_table, Some(("familyId", family_id)))
            .await?;
        let mut rows: Vec<Registration> = from_items(items)?;
        sort_by_timestamp(&mut rows);
        Ok(rows)
    }

    async fn create_family(&self, family: Family) -> Result<Family> {
        let item: Item = to_item(&family)?;
        self.put_new(&self.families_table, "familyId", &family.family_id, item)
            .await?;
        Ok(family)
    }

    async fn get_family(&self, family_id: &str) -> Result<Family> {
        match self.get(&self.families_table, "familyId", family_id).await? {
            Some(item) => Ok(from_item(item)?),
            None => Err(StoreError::NotFound(format!("Family {}", family_id))),
        }
    }

    async fn update_family(&self, family: Family) -> Result<Family> {
        let item: Item = to_item(&family)?;
        self.put_existing(&self.families_table, "familyId", &family.family_id, item)
            .await?;
        Ok(family)
    }

    async fn delete_family(&self, family_id: &str) -> Result<()> {
        self.delete(&self.families_table, "familyId", family_id)
            .await
    }

    async fn list_families(&self) -> Result<Vec<Family>> {
        let items = self.scan(&self.families_table, None).await?;
        let mut families: Vec<Family> = from_items(items)?;
        families.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(families)
    }
}
