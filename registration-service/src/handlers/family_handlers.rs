use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use log::{info, warn};
use retreat_shared::auth::CurrentUser;
use retreat_shared::error::StoreError;
use retreat_shared::models::{Family, MemberDetails};
use retreat_shared::store::RegistrationStore;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{EmailQuery, FamilyMembersResponse};

/// Rewrites the family's cached member count from its live rows.
pub(crate) async fn refresh_member_count<S>(store: &S, family_id: &str) -> Result<Family>
where
    S: RegistrationStore,
{
    let mut family = store.get_family(family_id).await?;
    let count = store.get_family_registrations(family_id).await?.len();

    if family.member_count == count {
        return Ok(family);
    }

    family.member_count = count;
    Ok(store.update_family(family).await?)
}

async fn members_response<S>(store: &S, family: Family) -> Result<FamilyMembersResponse>
where
    S: RegistrationStore,
{
    let members = store
        .get_family_registrations(&family.family_id)
        .await?
        .iter()
        .map(MemberDetails::from)
        .collect();

    Ok(FamilyMembersResponse {
        family_id: family.family_id,
        family_head: family.family_head,
        owner_id: family.owner_id,
        members,
    })
}

// GET /families/:id/members
pub async fn get_family_members<S>(
    State(store): State<Arc<S>>,
    Path(family_id): Path<String>,
) -> Result<Json<serde_json::Value>>
where
    S: RegistrationStore,
{
    let family = match store.get_family(family_id.trim()).await {
        Ok(family) => family,
        Err(StoreError::NotFound(_)) => {
            return Err(AppError::not_found(format!(
                "Family ID {} not found",
                family_id
            )))
        }
        Err(e) => return Err(e.into()),
    };

    let response = members_response(&*store, family).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "familyId": response.family_id,
        "familyHead": response.family_head,
        "ownerId": response.owner_id,
        "members": response.members
    })))
}

// GET /families/search?email=
// The same email can sit in several families; every candidate is returned and the
// caller picks one.
pub async fn search_family_by_email<S>(
    State(store): State<Arc<S>>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<serde_json::Value>>
where
    S: RegistrationStore,
{
    let email = query.email.trim();
    if email.is_empty() {
        return Err(AppError::bad_request("Please enter an email address.".into()));
    }

    let registrations = store.list_registrations().await?;
    let mut family_ids = Vec::new();
    let mut seen = HashSet::new();
    for row in &registrations {
        if let Some(family_id) = &row.family_id {
            if row.email.eq_ignore_ascii_case(email) && seen.insert(family_id.as_str()) {
                family_ids.push(family_id.clone());
            }
        }
    }

    let mut families = Vec::new();
    for family_id in family_ids {
        match store.get_family(&family_id).await {
            Ok(family) => families.push(members_response(&*store, family).await?),
            // Member rows can outlive a family row
            Err(StoreError::NotFound(_)) => {
                warn!("Skipping family {} in search: no family row", family_id)
            }
            Err(e) => return Err(e.into()),
        }
    }

    if families.is_empty() {
        return Err(AppError::not_found(format!(
            "No family registration found for {}",
            email
        )));
    }

    Ok(Json(serde_json::json!({ "success": true, "families": families })))
}

// DELETE /families/:id
pub async fn delete_family<S>(
    State(store): State<Arc<S>>,
    Path(family_id): Path<String>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>>
where
    S: RegistrationStore,
{
    let family = store.get_family(&family_id).await?;

    if family.owner_id != user.user_id {
        warn!(
            "User {} may not delete family {} (owned by {})",
            user.user_id, family_id, family.owner_id
        );
        return Err(AppError::forbidden(
            "Only the family owner can delete this family".into(),
        ));
    }

    let members = store.get_family_registrations(&family_id).await?;
    for member in &members {
        store.delete_registration(&member.id).await?;
    }
    store.delete_family(&family_id).await?;

    info!(
        "User {} deleted family {} with {} member(s)",
        user.user_id,
        family_id,
        members.len()
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Family deleted successfully",
        "deletedCount": members.len()
    })))
}

// POST /families/:id/quit
pub async fn quit_family<S>(
    State(store): State<Arc<S>>,
    Path(family_id): Path<String>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>>
where
    S: RegistrationStore,
{
    let family = store.get_family(&family_id).await?;

    if family.owner_id == user.user_id {
        return Err(AppError::bad_request(
            "The family owner cannot quit. Delete the family instead.".into(),
        ));
    }

    let own_rows: Vec<_> = store
        .get_family_registrations(&family_id)
        .await?
        .into_iter()
        .filter(|row| row.is_registered_by(&user.user_id))
        .collect();

    for row in &own_rows {
        store.delete_registration(&row.id).await?;
    }
    refresh_member_count(&*store, &family_id).await?;

    info!(
        "User {} quit family {}, removing {} registration(s)",
        user.user_id,
        family_id,
        own_rows.len()
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "You have left the family",
        "deletedCount": own_rows.len()
    })))
}
