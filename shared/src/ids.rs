//! Human-readable identifiers generated without a server round-trip.
//!
//! None of these are unique by construction. The store rejects a create whose key is
//! already taken, so a collision surfaces as a conflict instead of an overwrite.

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

fn name_parts(name: &str) -> (String, Option<String>) {
    let mut tokens = name.split_whitespace();
    let first = tokens.next().unwrap_or_default().to_uppercase();
    let last = tokens.last().map(str::to_uppercase);
    (first, last)
}

fn random_suffix() -> u16 {
    rand::rng().random_range(0..1000)
}

/// `FIRST[-LAST]-YEAR-NNN` for a stand-alone registration.
pub fn individual_id(name: &str, year: i32, random: u16) -> String {
    let (first, last) = name_parts(name);
    match last {
        Some(last) => format!("{first}-{last}-{year}-{random:03}"),
        None => format!("{first}-{year}-{random:03}"),
    }
}

/// `FIRST[-LAST]-NNN` for a person added to a family.
pub fn member_id(name: &str, random: u16) -> String {
    let (first, last) = name_parts(name);
    match last {
        Some(last) => format!("{first}-{last}-{random:03}"),
        None => format!("{first}-{random:03}"),
    }
}

/// `SURNAME-NNNNNN`, the suffix being the last six digits of the millisecond clock.
/// A single-word head name is used as the surname.
pub fn family_id(head_name: &str, now: DateTime<Utc>) -> String {
    let (first, last) = name_parts(head_name);
    let surname = last.unwrap_or(first);
    let millis = now.timestamp_millis().rem_euclid(1_000_000);
    format!("{surname}-{millis:06}")
}

pub fn user_id(now: DateTime<Utc>) -> String {
    format!("USER-{}", now.timestamp_millis())
}

pub fn generate_individual_id(name: &str) -> String {
    individual_id(name, Utc::now().year(), random_suffix())
}

pub fn generate_member_id(name: &str) -> String {
    member_id(name, random_suffix())
}

pub fn generate_family_id(head_name: &str) -> String {
    family_id(head_name, Utc::now())
}

pub fn generate_user_id() -> String {
    user_id(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_individual_id_with_surname() {
        assert_eq!(individual_id("John Smith", 2026, 7), "JOHN-SMITH-2026-007");
        // Middle names are dropped
        assert_eq!(
            individual_id("  mary  ann   lee ", 2026, 123),
            "MARY-LEE-2026-123"
        );
    }

    #[test]
    fn test_individual_id_single_name() {
        assert_eq!(individual_id("Cher", 2026, 42), "CHER-2026-042");
    }

    #[test]
    fn test_member_id() {
        assert_eq!(member_id("Jane Smith", 42), "JANE-SMITH-042");
        assert_eq!(member_id("Jane", 999), "JANE-999");
    }

    #[test]
    fn test_family_id_uses_last_six_millis() {
        let now = Utc.timestamp_millis_opt(1_767_225_600_123).unwrap();
        assert_eq!(family_id("John Smith", now), "SMITH-600123");
        assert_eq!(family_id("Smith", now), "SMITH-600123");

        let early = Utc.timestamp_millis_opt(1_000_042).unwrap();
        assert_eq!(family_id("Ann Lee", early), "LEE-000042");
    }

    #[test]
    fn test_user_id() {
        let now = Utc.timestamp_millis_opt(1_767_225_600_123).unwrap();
        assert_eq!(user_id(now), "USER-1767225600123");
    }

    #[test]
    fn test_generated_ids_have_expected_shape() {
        let id = generate_individual_id("Jane Smith");
        let parts: Vec<_> = id.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "JANE");
        assert_eq!(parts[1], "SMITH");
        assert_eq!(parts[2], Utc::now().year().to_string());
        assert_eq!(parts[3].len(), 3);

        let member = generate_member_id("Jane Smith");
        assert!(member.starts_with("JANE-SMITH-"));
        assert_eq!(member.len(), "JANE-SMITH-".len() + 3);

        let family = generate_family_id("Jane Smith");
        assert!(family.starts_with("SMITH-"));
        assert_eq!(family.len(), "SMITH-".len() + 6);
    }
}
