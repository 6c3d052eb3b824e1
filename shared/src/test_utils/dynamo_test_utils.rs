use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType,
    ScalarAttributeType,
};
use aws_sdk_dynamodb::Client;
use log::{debug, info};
use std::env;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Tests run against the in-memory mock unless `USE_DYNAMODB=true`.
pub fn use_dynamodb() -> bool {
    env::var("USE_DYNAMODB")
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false)
}

/// Client for a local DynamoDB (`DYNAMODB_ENDPOINT`, default `http://localhost:8000`).
pub async fn create_dynamo_client() -> Client {
    let endpoint =
        env::var("DYNAMODB_ENDPOINT").unwrap_or_else(|_| "http://localhost:8000".to_string());
    info!("Connecting to local DynamoDB at {}", endpoint);

    let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new("test", "test", None, None, "test"))
        .load()
        .await;

    let dynamo_config = aws_sdk_dynamodb::config::Builder::from(&config)
        .endpoint_url(endpoint)
        .build();
    Client::from_conf(dynamo_config)
}

/// Creates a table with a single string hash key. An existing table is not an error.
pub async fn create_table(client: &Client, table_name: &str, key: &str) -> Result<(), BoxError> {
    let result = client
        .create_table()
        .table_name(table_name)
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name(key)
                .key_type(KeyType::Hash)
                .build()?,
        )
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name(key)
                .attribute_type(ScalarAttributeType::S)
                .build()?,
        )
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await;

    match result {
        Ok(_) => {
            info!("Created table {}", table_name);
            Ok(())
        }
        Err(e) => match e.into_service_error() {
            CreateTableError::ResourceInUseException(_) => {
                debug!("Table {} already exists", table_name);
                Ok(())
            }
            other => Err(other.into()),
        },
    }
}

pub async fn create_users_table(client: &Client, table_name: &str) -> Result<(), BoxError> {
    create_table(client, table_name, "userId").await
}

pub async fn create_individuals_table(client: &Client, table_name: &str) -> Result<(), BoxError> {
    create_table(client, table_name, "id").await
}

pub async fn create_families_table(client: &Client, table_name: &str) -> Result<(), BoxError> {
    create_table(client, table_name, "familyId").await
}

/// Deletes every item in the table.
pub async fn clear_dynamo_table(client: &Client, table_name: &str, key: &str) -> Result<(), BoxError> {
    let output = client
        .scan()
        .table_name(table_name)
        .projection_expression("#k")
        .expression_attribute_names("#k", key)
        .send()
        .await?;

    let items = output.items.unwrap_or_default();
    debug!("Clearing {} items from {}", items.len(), table_name);

    for item in items {
        if let Some(value) = item.get(key) {
            client
                .delete_item()
                .table_name(table_name)
                .key(key, value.clone())
                .send()
                .await?;
        }
    }

    Ok(())
}
