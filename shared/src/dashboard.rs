//! Reduces the two registration tables to what one user sees on their dashboard.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::{Family, Registration};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FamilyView {
    pub family_id: String,
    pub family_head: String,
    /// Live count of `members`, not the cached column
    pub member_count: usize,
    pub status: String,
    pub owner_id: String,
    pub timestamp: String,
    pub members: Vec<Registration>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    /// Registrations that are not part of any family
    pub individuals: Vec<Registration>,
    pub families: Vec<FamilyView>,
    pub total_people: usize,
}

fn email_matches(candidate: Option<&str>, user_email: &str) -> bool {
    candidate.is_some_and(|c| !c.is_empty() && c.eq_ignore_ascii_case(user_email))
}

/// Whether a row belongs to the user. Rows written before accounts existed have
/// no `registered_by`, so the registrant and creator emails are matched too.
pub fn row_matches_user(row: &Registration, user_id: &str, user_email: Option<&str>) -> bool {
    if row.is_registered_by(user_id) {
        return true;
    }
    match user_email.filter(|e| !e.is_empty()) {
        Some(email) => {
            email_matches(Some(&row.email), email)
                || email_matches(row.creator_email.as_deref(), email)
        }
        None => false,
    }
}

pub fn aggregate(
    user_id: &str,
    user_email: Option<&str>,
    registrations: &[Registration],
    families: &[Family],
) -> Dashboard {
    let mut individuals = Vec::new();
    let mut member_of = HashSet::new();

    for row in registrations
        .iter()
        .filter(|row| row_matches_user(row, user_id, user_email))
    {
        match &row.family_id {
            Some(family_id) => {
                member_of.insert(family_id.as_str());
            }
            None => individuals.push(row.clone()),
        }
    }

    let families: Vec<FamilyView> = families
        .iter()
        .filter(|family| {
            family.owner_id == user_id || member_of.contains(family.family_id.as_str())
        })
        .map(|family| {
            let members: Vec<Registration> = registrations
                .iter()
                .filter(|row| row.belongs_to_family(&family.family_id))
                .cloned()
                .collect();
            FamilyView {
                family_id: family.family_id.clone(),
                family_head: family.family_head.clone(),
                member_count: members.len(),
                status: family.status.clone(),
                owner_id: family.owner_id.clone(),
                timestamp: family.timestamp.clone(),
                members,
            }
        })
        .collect();

    let total_people = individuals.len() + families.iter().map(|f| f.member_count).sum::<usize>();

    Dashboard {
        individuals,
        families,
        total_people,
    }
}
