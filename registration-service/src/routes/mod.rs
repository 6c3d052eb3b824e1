use axum::{
    extract::Request,
    middleware,
    Extension,
    routing::{get, post},
    Router,
};
use log::{info, warn};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{
    family_handlers::{delete_family, get_family_members, quit_family, search_family_by_email},
    registration_handlers::{
        delete_registration, get_registration, get_user_registrations, submit_registration,
        update_registration,
    },
    user_handlers::{authenticate_user, check_user, create_user, get_user_by_email, provision_user},
};
use retreat_shared::auth::auth_middleware;
use retreat_shared::identity::{FirebaseIdentityVerifier, IdentityVerifier};
use retreat_shared::store::{dynamo::DynamoRecordStore, RegistrationStore, UserStore};

/// Creates a router backed by DynamoDB
pub async fn create_router() -> Router {
    info!("Creating router with DynamoDB store");

    let dynamo_store = Arc::new(DynamoRecordStore::new().await);
    let verifier: Arc<dyn IdentityVerifier> = Arc::new(FirebaseIdentityVerifier::new());

    let remove_base_path = std::env::var("REMOVE_BASE_PATH")
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false);

    let prefix = if remove_base_path { "" } else { "/Prod" };
    info!("Using API route prefix: {}", prefix);

    create_router_with_store(dynamo_store, verifier, prefix)
}

/// Creates a router with a given store and sign-in token verifier
pub fn create_router_with_store<S>(
    store: Arc<S>,
    verifier: Arc<dyn IdentityVerifier>,
    prefix: &str,
) -> Router
where
    S: RegistrationStore + UserStore + 'static,
{
    info!("Setting up API routes with prefix: '{}'", prefix);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    async fn logging_middleware(
        req: Request,
        next: axum::middleware::Next,
    ) -> impl axum::response::IntoResponse {
        info!(
            "Router received request: method={}, uri={}",
            req.method(),
            req.uri()
        );
        next.run(req).await
    }

    // Account routes run before a session exists
    let user_routes = Router::new()
        .route("/users", post(create_user))
        .route("/users/check", get(check_user))
        .route("/users/authenticate", post(authenticate_user))
        .route("/users/by-email", get(get_user_by_email))
        .route("/users/provision", post(provision_user))
        .layer(Extension(verifier))
        .with_state(store.clone());

    let registration_routes = Router::new()
        .route(
            "/registrations",
            get(get_user_registrations).post(submit_registration),
        )
        .route(
            "/registrations/:id",
            get(get_registration)
                .patch(update_registration)
                .delete(delete_registration),
        )
        .route("/families/search", get(search_family_by_email))
        .route("/families/:id", axum::routing::delete(delete_family))
        .route("/families/:id/members", get(get_family_members))
        .route("/families/:id/quit", post(quit_family))
        .layer(middleware::from_fn(auth_middleware))
        .with_state(store);

    let api_routes = user_routes.merge(registration_routes);

    let router = if prefix.is_empty() {
        api_routes
            .layer(cors)
            .layer(middleware::from_fn(logging_middleware))
    } else {
        Router::new()
            .nest(prefix, api_routes)
            .layer(cors)
            .layer(middleware::from_fn(logging_middleware))
    };

    info!(
        "Router configured with all routes and middleware under prefix: '{}'",
        prefix
    );

    router.fallback(|req: Request| async move {
        warn!("No route matched for: {} {}", req.method(), req.uri());
        (
            axum::http::StatusCode::NOT_FOUND,
            axum::Json(retreat_shared::models::MessageResponse {
                success: false,
                message: "The requested resource was not found".to_string(),
            }),
        )
    })
}
