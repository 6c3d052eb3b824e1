use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    Json,
};
use log::{info, warn};
use retreat_shared::identity::IdentityVerifier;
use retreat_shared::ids::generate_user_id;
use retreat_shared::models::{now_str, AuthMethod, UserAccount, STATUS_ACTIVE};
use retreat_shared::session::{issue_token, Session};
use retreat_shared::store::UserStore;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{
    AuthenticateRequest, CreateUserRequest, EmailQuery, ProvisionRequest, UserResponse,
};

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Starts a session for `account` and packages it with a signed token.
fn session_response(
    account: UserAccount,
    method: AuthMethod,
    created: Option<bool>,
) -> Result<UserResponse> {
    let session = Session::start(
        account.user_id.clone(),
        account.name.clone(),
        account.email.clone(),
        account.phone.clone(),
        method,
    );
    let token = issue_token(&session)?;

    Ok(UserResponse {
        success: true,
        user_id: account.user_id,
        name: account.name,
        email: account.email,
        phone: account.phone,
        token: Some(token),
        created,
    })
}

async fn find_existing<S>(store: &S, email: Option<&str>, phone: Option<&str>) -> Result<Option<UserAccount>>
where
    S: UserStore,
{
    if let Some(email) = email {
        if let Some(account) = store.get_user_by_email(email).await? {
            return Ok(Some(account));
        }
    }
    if let Some(phone) = phone {
        if let Some(account) = store.get_user_by_phone(phone).await? {
            return Ok(Some(account));
        }
    }
    Ok(None)
}

// GET /users/check?email=
pub async fn check_user<S>(
    State(store): State<Arc<S>>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<serde_json::Value>>
where
    S: UserStore,
{
    let exists = store.get_user_by_email(query.email.trim()).await?.is_some();

    Ok(Json(serde_json::json!({ "success": true, "exists": exists })))
}

// POST /users/authenticate
pub async fn authenticate_user<S>(
    State(store): State<Arc<S>>,
    Json(request): Json<AuthenticateRequest>,
) -> Result<Json<UserResponse>>
where
    S: UserStore,
{
    let invalid = || AppError::unauthenticated("Invalid email or password.".into());

    let account = store
        .get_user_by_email(request.email.trim())
        .await?
        .ok_or_else(invalid)?;

    // Sentinel passwords must never match a submitted one
    if account.is_federated() {
        warn!(
            "Password sign-in attempted for federated account {}",
            account.user_id
        );
        return Err(AppError::unauthenticated(
            "This account uses Google or phone sign-in.".into(),
        ));
    }

    if account.password != request.password {
        warn!("Failed password sign-in for {}", account.user_id);
        return Err(invalid());
    }

    info!("User {} signed in with email", account.user_id);
    Ok(Json(session_response(account, AuthMethod::Email, None)?))
}

// GET /users/by-email?email=
pub async fn get_user_by_email<S>(
    State(store): State<Arc<S>>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<serde_json::Value>>
where
    S: UserStore,
{
    let account = store
        .get_user_by_email(query.email.trim())
        .await?
        .ok_or_else(|| AppError::not_found("User not found".into()))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "userId": account.user_id,
        "name": account.name,
        "email": account.email,
    })))
}

// POST /users
pub async fn create_user<S>(
    State(store): State<Arc<S>>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>)>
where
    S: UserStore,
{
    let name = request.name.trim().to_string();
    let email = non_empty(request.email);
    let phone = non_empty(request.phone);

    if name.is_empty() {
        return Err(AppError::bad_request("Name is required.".into()));
    }
    if email.is_none() && phone.is_none() {
        return Err(AppError::bad_request(
            "An email address or phone number is required.".into(),
        ));
    }
    if request.password.is_empty() {
        return Err(AppError::bad_request("Password is required.".into()));
    }

    if find_existing(&*store, email.as_deref(), phone.as_deref())
        .await?
        .is_some()
    {
        return Err(AppError::conflict(
            "An account with these details already exists. Please sign in instead.".into(),
        ));
    }

    let account = store
        .create_user(UserAccount {
            user_id: generate_user_id(),
            name,
            email,
            phone,
            password: request.password,
            status: STATUS_ACTIVE.to_string(),
            created_at: now_str(),
        })
        .await?;

    info!("Created account {}", account.user_id);
    Ok((
        StatusCode::CREATED,
        Json(session_response(account, AuthMethod::Email, Some(true))?),
    ))
}

// POST /users/provision
// Google and phone sign-in land here with the provider's ID token. The account is
// looked up by the identity the token proves; unknown identities get an account on
// the spot. Password accounts are never handed out through this route.
pub async fn provision_user<S>(
    State(store): State<Arc<S>>,
    Extension(verifier): Extension<Arc<dyn IdentityVerifier>>,
    Json(request): Json<ProvisionRequest>,
) -> Result<Json<UserResponse>>
where
    S: UserStore,
{
    let Some(sentinel) = request.auth_method.password_sentinel() else {
        return Err(AppError::bad_request(
            "Email accounts are created with a password.".into(),
        ));
    };

    let identity = verifier
        .verify(request.auth_method, &request.proof)
        .await?;

    let email = non_empty(identity.email);
    let phone = non_empty(identity.phone);
    if email.is_none() && phone.is_none() {
        return Err(AppError::unauthenticated(
            "The sign-in token carries no email address or phone number.".into(),
        ));
    }

    if let Some(account) = find_existing(&*store, email.as_deref(), phone.as_deref()).await? {
        if account.password != sentinel {
            warn!(
                "Refusing {} sign-in for account {} created with another method",
                request.auth_method, account.user_id
            );
            return Err(AppError::conflict(
                "An account with these details already exists. Please sign in the way you signed up.".into(),
            ));
        }

        info!(
            "User {} signed in with {}",
            account.user_id, request.auth_method
        );
        return Ok(Json(session_response(
            account,
            request.auth_method,
            Some(false),
        )?));
    }

    let name = match request.name.trim() {
        "" => non_empty(identity.name)
            .or_else(|| email.clone())
            .or_else(|| phone.clone())
            .unwrap_or_default(),
        name => name.to_string(),
    };

    let account = store
        .create_user(UserAccount {
            user_id: generate_user_id(),
            name,
            email,
            phone,
            password: sentinel.to_string(),
            status: STATUS_ACTIVE.to_string(),
            created_at: now_str(),
        })
        .await?;

    info!(
        "Provisioned account {} via {}",
        account.user_id, request.auth_method
    );
    Ok(Json(session_response(
        account,
        request.auth_method,
        Some(true),
    )?))
}
