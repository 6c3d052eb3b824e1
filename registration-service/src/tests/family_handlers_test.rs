use axum::http::StatusCode;
use tower::ServiceExt;

use super::{create_test_app, seed_family, TestStore};
use retreat_shared::auth::create_test_request;
use retreat_shared::test_utils::http_test_utils::response_to_json;

// John (USER-1) owns the family and registered himself and Jane; Bob (USER-2)
// joined later and registered himself.
async fn seed_smith_family(store: &super::TestStore) {
    seed_family(
        store,
        "SMITH-123456",
        "USER-1",
        &[
            ("JOHN-SMITH-001", "John Smith", "USER-1"),
            ("JANE-SMITH-002", "Jane Smith", "USER-1"),
            ("BOB-SMITH-003", "Bob Smith", "USER-2"),
        ],
    )
    .await;
}

#[tokio::test]
async fn test_get_family_members() {
    let (app, store) = create_test_app().await;
    seed_smith_family(&store).await;

    let response = app
        .clone()
        .oneshot(create_test_request("GET", "/families/SMITH-123456/members", "USER-3", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_to_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["familyHead"], "John Smith");
    assert_eq!(body["ownerId"], "USER-1");
    let members = body["members"].as_array().unwrap();
    assert_eq!(members.len(), 3);
    assert_eq!(members[0]["id"], "JOHN-SMITH-001");

    let response = app
        .oneshot(create_test_request("GET", "/families/NOPE-000000/members", "USER-3", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_family_members_backend_failure_is_not_a_404() {
    let (app, store) = create_test_app().await;
    seed_smith_family(&store).await;
    let TestStore::Mock(mock) = &store else {
        return;
    };
    mock.fail_after("get_family", 0);

    let response = app
        .clone()
        .oneshot(create_test_request("GET", "/families/SMITH-123456/members", "USER-3", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_to_json(response).await;
    assert_eq!(body["success"], false);
    assert!(!body["message"].as_str().unwrap().contains("not found"));

    let response = app
        .oneshot(create_test_request(
            "GET",
            "/families/search?email=jane-smith-002@example.com",
            "USER-3",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_search_family_by_email() {
    let (app, store) = create_test_app().await;
    seed_smith_family(&store).await;
    seed_family(&store, "JONES-654321", "USER-4", &[("AMY-JONES-001", "Amy Jones", "USER-4")]).await;

    let response = app
        .clone()
        .oneshot(create_test_request(
            "GET",
            "/families/search?email=JANE-SMITH-002@example.com",
            "USER-3",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_to_json(response).await;
    let families = body["families"].as_array().unwrap();
    assert_eq!(families.len(), 1);
    assert_eq!(families[0]["familyId"], "SMITH-123456");
    assert_eq!(families[0]["members"].as_array().unwrap().len(), 3);

    let response = app
        .oneshot(create_test_request(
            "GET",
            "/families/search?email=nobody@example.com",
            "USER-3",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_family_requires_owner() {
    let (app, store) = create_test_app().await;
    seed_smith_family(&store).await;

    let response = app
        .oneshot(create_test_request("DELETE", "/families/SMITH-123456", "USER-2", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert!(store.registrations().get_family("SMITH-123456").await.is_ok());
    assert_eq!(
        store
            .registrations()
            .get_family_registrations("SMITH-123456")
            .await
            .unwrap()
            .len(),
        3
    );
}

#[tokio::test]
async fn test_quit_then_delete_family() {
    let (app, store) = create_test_app().await;
    seed_smith_family(&store).await;

    // Bob leaves, taking only his own row with him
    let response = app
        .clone()
        .oneshot(create_test_request("POST", "/families/SMITH-123456/quit", "USER-2", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_to_json(response).await["deletedCount"], 1);

    let family = store.registrations().get_family("SMITH-123456").await.unwrap();
    assert_eq!(family.member_count, 2);

    // The owner deletes the family and the remaining rows
    let response = app
        .clone()
        .oneshot(create_test_request("DELETE", "/families/SMITH-123456", "USER-1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_to_json(response).await["deletedCount"], 2);

    assert!(store.registrations().get_family("SMITH-123456").await.is_err());
    assert!(store
        .registrations()
        .get_family_registrations("SMITH-123456")
        .await
        .unwrap()
        .is_empty());

    let response = app
        .oneshot(create_test_request("GET", "/registrations", "USER-1", None))
        .await
        .unwrap();
    assert_eq!(response_to_json(response).await["data"]["totalPeople"], 0);
}

#[tokio::test]
async fn test_quit_family_edge_cases() {
    let (app, store) = create_test_app().await;
    seed_smith_family(&store).await;

    let response = app
        .clone()
        .oneshot(create_test_request("POST", "/families/SMITH-123456/quit", "USER-1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(create_test_request("POST", "/families/NOPE-000000/quit", "USER-2", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // A user with no rows in the family removes nothing
    let response = app
        .oneshot(create_test_request("POST", "/families/SMITH-123456/quit", "USER-7", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_to_json(response).await["deletedCount"], 0);
    assert_eq!(
        store.registrations().get_family("SMITH-123456").await.unwrap().member_count,
        3
    );
}
