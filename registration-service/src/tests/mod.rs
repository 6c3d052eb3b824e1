use axum::Router;
use log::{debug, error, info};
use std::sync::Arc;

use crate::routes::create_router_with_store;
use retreat_shared::models::{Family, MemberDetails, Registration, STATUS_ACTIVE};
use retreat_shared::store::dynamo::DynamoRecordStore;
use retreat_shared::store::{RegistrationStore, UserStore};
use retreat_shared::test_utils::dynamo_test_utils::{
    clear_dynamo_table, create_dynamo_client, create_families_table, create_individuals_table,
    create_users_table, use_dynamodb,
};
use retreat_shared::identity::IdentityVerifier;
use retreat_shared::test_utils::mock_identity::MockIdentityVerifier;
use retreat_shared::test_utils::mock_store::MockRecordStore;
use retreat_shared::test_utils::test_logging::init_test_logging;

mod family_handlers_test;

const USERS_TEST_TABLE: &str = "retreat-users-test";
const INDIVIDUALS_TEST_TABLE: &str = "retreat-individuals-test";
const FAMILIES_TEST_TABLE: &str = "retreat-families-test";

pub enum TestStore {
    Mock(Arc<MockRecordStore>),
    DynamoDB(Arc<DynamoRecordStore>),
}

impl TestStore {
    pub fn registrations(&self) -> &dyn RegistrationStore {
        match self {
            TestStore::Mock(mock) => mock.as_ref(),
            TestStore::DynamoDB(dynamo) => dynamo.as_ref(),
        }
    }

    pub fn users(&self) -> &dyn UserStore {
        match self {
            TestStore::Mock(mock) => mock.as_ref(),
            TestStore::DynamoDB(dynamo) => dynamo.as_ref(),
        }
    }
}

// Builds the app over the mock store, or over local DynamoDB when USE_DYNAMODB=true
pub async fn create_test_app() -> (Router, TestStore) {
    init_test_logging();
    let verifier: Arc<dyn IdentityVerifier> = Arc::new(MockIdentityVerifier::new());

    if use_dynamodb() {
        info!("Using DynamoDB for service tests");
        let client = create_dynamo_client().await;

        for (table, key, result) in [
            (USERS_TEST_TABLE, "userId", create_users_table(&client, USERS_TEST_TABLE).await),
            (
                INDIVIDUALS_TEST_TABLE,
                "id",
                create_individuals_table(&client, INDIVIDUALS_TEST_TABLE).await,
            ),
            (
                FAMILIES_TEST_TABLE,
                "familyId",
                create_families_table(&client, FAMILIES_TEST_TABLE).await,
            ),
        ] {
            if let Err(e) = result {
                error!("Error creating table {}: {}", table, e);
            }
            debug!("Clearing DynamoDB test table {}", table);
            if let Err(e) = clear_dynamo_table(&client, table, key).await {
                error!("Failed to clear table {}: {}", table, e);
            }
        }

        let store = Arc::new(DynamoRecordStore::with_client_and_tables(
            client,
            USERS_TEST_TABLE.to_string(),
            INDIVIDUALS_TEST_TABLE.to_string(),
            FAMILIES_TEST_TABLE.to_string(),
        ));
        let app = create_router_with_store(store.clone(), verifier, "");
        (app, TestStore::DynamoDB(store))
    } else {
        debug!("Using mock store for service tests");
        let store = Arc::new(MockRecordStore::new());
        let app = create_router_with_store(store.clone(), verifier, "");
        (app, TestStore::Mock(store))
    }
}

pub fn member(id: &str, name: &str, email: &str) -> MemberDetails {
    MemberDetails {
        id: id.to_string(),
        name: name.to_string(),
        phone: "555-0100".to_string(),
        email: email.to_string(),
        address: "1 Main St".to_string(),
    }
}

/// Writes a family row and its members straight into the store.
pub async fn seed_family(
    store: &TestStore,
    family_id: &str,
    owner_id: &str,
    members: &[(&str, &str, &str)],
) {
    let registrations = store.registrations();
    registrations
        .create_family(Family {
            family_id: family_id.to_string(),
            family_head: members.first().map(|m| m.1).unwrap_or("Head").to_string(),
            member_count: members.len(),
            status: STATUS_ACTIVE.to_string(),
            owner_id: owner_id.to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        })
        .await
        .unwrap();

    for (i, (id, name, registered_by)) in members.iter().enumerate() {
        registrations
            .create_registration(Registration {
                family_id: Some(family_id.to_string()),
                registered_by: Some(registered_by.to_string()),
                timestamp: format!("2026-01-01T00:00:0{}Z", i + 1),
                ..member(id, name, &format!("{}@example.com", id.to_lowercase()))
                    .into_registration(None, registered_by, None, "")
            })
            .await
            .unwrap();
    }
}
