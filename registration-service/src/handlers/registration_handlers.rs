use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use log::{error, info, warn};
use retreat_shared::auth::CurrentUser;
use retreat_shared::dashboard::aggregate;
use retreat_shared::error::StoreError;
use retreat_shared::models::{now_str, Family, MemberDetails, Registration, STATUS_ACTIVE};
use retreat_shared::store::RegistrationStore;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::handlers::family_handlers::refresh_member_count;
use crate::models::{FamilySubmission, RegistrationResponse, SubmitRequest, UpdateRegistrationRequest};

// GET /registrations
pub async fn get_user_registrations<S>(
    State(store): State<Arc<S>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>>
where
    S: RegistrationStore,
{
    let registrations = store.list_registrations().await?;
    let families = store.list_families().await?;

    let dashboard = aggregate(
        &user.user_id,
        user.email.as_deref(),
        &registrations,
        &families,
    );

    Ok(Json(serde_json::json!({ "success": true, "data": dashboard })))
}

// POST /registrations
pub async fn submit_registration<S>(
    State(store): State<Arc<S>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)>
where
    S: RegistrationStore,
{
    match payload {
        SubmitRequest::Individual(details) => submit_individual(&*store, &user, details).await,
        SubmitRequest::Family(submission) => submit_family(&*store, &user, submission).await,
    }
}

fn validate_member(member: &MemberDetails) -> Result<()> {
    if member.id.trim().is_empty() {
        return Err(AppError::bad_request(format!(
            "Registration for {} is missing an ID.",
            member.name
        )));
    }
    let missing = member.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::bad_request(format!(
            "Please fill in all required fields for {}: {}",
            member.id,
            missing.join(", ")
        )));
    }
    Ok(())
}

async fn submit_individual<S>(
    store: &S,
    user: &CurrentUser,
    details: MemberDetails,
) -> Result<(StatusCode, Json<serde_json::Value>)>
where
    S: RegistrationStore,
{
    validate_member(&details)?;

    let registration = details.into_registration(
        None,
        &user.user_id,
        user.email.clone(),
        &now_str(),
    );
    let created = store.create_registration(registration).await?;

    info!(
        "User {} registered individual {}",
        user.user_id, created.id
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "Individual registration saved",
            "id": created.id
        })),
    ))
}

// Appends members to a new or existing family. Every check runs before the first
// write so a rejected submission leaves the tables untouched, and a write that fails
// part way is rolled back.
async fn submit_family<S>(
    store: &S,
    user: &CurrentUser,
    submission: FamilySubmission,
) -> Result<(StatusCode, Json<serde_json::Value>)>
where
    S: RegistrationStore,
{
    let family_id = submission.family_id.trim().to_string();
    if family_id.is_empty() {
        return Err(AppError::bad_request("Family ID is required.".into()));
    }
    if submission.members.is_empty() {
        return Err(AppError::bad_request(
            "Nothing to submit: no new family members.".into(),
        ));
    }

    let mut seen = HashSet::new();
    for member in &submission.members {
        validate_member(member)?;
        if !seen.insert(member.id.as_str()) {
            return Err(AppError::bad_request(format!(
                "Member {} appears more than once.",
                member.id
            )));
        }
    }

    if submission.is_existing {
        store.get_family(&family_id).await?;
    } else {
        if submission.family_head.trim().is_empty() {
            return Err(AppError::bad_request(
                "Please enter the head of family name.".into(),
            ));
        }
        match store.get_family(&family_id).await {
            Ok(_) => {
                return Err(AppError::conflict(format!(
                    "Family {} already exists.",
                    family_id
                )))
            }
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    for member in &submission.members {
        match store.get_registration(&member.id).await {
            Ok(_) => {
                return Err(AppError::conflict(format!(
                    "Registration {} already exists.",
                    member.id
                )))
            }
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    let timestamp = now_str();
    if !submission.is_existing {
        store
            .create_family(Family {
                family_id: family_id.clone(),
                family_head: submission.family_head.trim().to_string(),
                member_count: 0,
                status: STATUS_ACTIVE.to_string(),
                owner_id: user.user_id.clone(),
                timestamp: timestamp.clone(),
            })
            .await?;
        info!("User {} created family {}", user.user_id, family_id);
    }

    let added = submission.members.len();
    let mut written = Vec::with_capacity(added);
    for member in submission.members {
        let id = member.id.clone();
        let created = store
            .create_registration(member.into_registration(
                Some(family_id.clone()),
                &user.user_id,
                user.email.clone(),
                &timestamp,
            ))
            .await;
        if let Err(e) = created {
            roll_back_family_submission(store, &family_id, !submission.is_existing, &written)
                .await;
            return Err(e.into());
        }
        written.push(id);
    }

    let family = refresh_member_count(store, &family_id).await?;

    info!(
        "User {} added {} member(s) to family {} (now {})",
        user.user_id, added, family_id, family.member_count
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "Family registration saved",
            "familyId": family.family_id,
            "memberCount": family.member_count,
            "addedCount": added,
            "created": !submission.is_existing
        })),
    ))
}

/// Removes what a failed family submission already wrote.
async fn roll_back_family_submission<S>(
    store: &S,
    family_id: &str,
    created_family: bool,
    written: &[String],
) where
    S: RegistrationStore,
{
    warn!(
        "Rolling back {} member(s) written to family {}",
        written.len(),
        family_id
    );
    for id in written {
        if let Err(e) = store.delete_registration(id).await {
            error!("Failed to roll back registration {}: {}", id, e);
        }
    }
    if created_family {
        if let Err(e) = store.delete_family(family_id).await {
            error!("Failed to roll back family {}: {}", family_id, e);
        }
    }
}

// GET /registrations/:id
pub async fn get_registration<S>(
    State(store): State<Arc<S>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>>
where
    S: RegistrationStore,
{
    let registration = store.get_registration(&id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": RegistrationResponse::from(registration)
    })))
}

/// Loads a row and checks the caller registered it.
async fn owned_registration<S>(store: &S, id: &str, user_id: &str, action: &str) -> Result<Registration>
where
    S: RegistrationStore,
{
    let registration = store.get_registration(id).await?;

    if !registration.is_registered_by(user_id) {
        warn!(
            "User {} may not {} registration {} (registered by {:?})",
            user_id, action, id, registration.registered_by
        );
        return Err(AppError::forbidden(format!(
            "You do not have permission to {} this registration",
            action
        )));
    }

    Ok(registration)
}

fn apply_field(target: &mut String, value: Option<String>, field: &str) -> Result<()> {
    if let Some(value) = value {
        let value = value.trim();
        if value.is_empty() {
            return Err(AppError::bad_request(format!("{} cannot be empty.", field)));
        }
        *target = value.to_string();
    }
    Ok(())
}

// PATCH /registrations/:id
pub async fn update_registration<S>(
    State(store): State<Arc<S>>,
    Path(id): Path<String>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<UpdateRegistrationRequest>,
) -> Result<Json<serde_json::Value>>
where
    S: RegistrationStore,
{
    let mut registration = owned_registration(&*store, &id, &user.user_id, "edit").await?;

    if !payload.has_updates() {
        return Err(AppError::bad_request("No changes to save.".into()));
    }

    apply_field(&mut registration.name, payload.name, "Name")?;
    apply_field(&mut registration.phone, payload.phone, "Phone")?;
    apply_field(&mut registration.email, payload.email, "Email")?;
    apply_field(&mut registration.address, payload.address, "Address")?;

    let updated = store.update_registration(registration).await?;
    info!("User {} updated registration {}", user.user_id, id);

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Registration updated successfully",
        "data": RegistrationResponse::from(updated)
    })))
}

// DELETE /registrations/:id
pub async fn delete_registration<S>(
    State(store): State<Arc<S>>,
    Path(id): Path<String>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>>
where
    S: RegistrationStore,
{
    let registration = owned_registration(&*store, &id, &user.user_id, "delete").await?;

    store.delete_registration(&id).await?;
    info!("User {} deleted registration {}", user.user_id, id);

    if let Some(family_id) = &registration.family_id {
        match refresh_member_count(&*store, family_id).await {
            Ok(_) | Err(AppError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Registration deleted successfully"
    })))
}
