use log::{info, warn};
use once_cell::sync::Lazy;
use std::env;

const DEV_JWT_SECRET: &str = "retreat-local-development-secret";

/// Name of the users table
pub static USERS_TABLE: Lazy<String> = Lazy::new(|| var_or("USERS_TABLE", "retreat-users"));

/// Name of the individual registrations table
pub static INDIVIDUALS_TABLE: Lazy<String> =
    Lazy::new(|| var_or("INDIVIDUALS_TABLE", "retreat-individuals"));

/// Name of the family registrations table
pub static FAMILIES_TABLE: Lazy<String> =
    Lazy::new(|| var_or("FAMILIES_TABLE", "retreat-families"));

/// Secret used to sign session tokens
pub static JWT_SECRET: Lazy<String> = Lazy::new(|| {
    env::var("JWT_SECRET").unwrap_or_else(|_| {
        warn!("JWT_SECRET not set, signing session tokens with the development secret");
        DEV_JWT_SECRET.to_string()
    })
});

/// Endpoint override for a local DynamoDB, if any
pub fn dynamodb_endpoint() -> Option<String> {
    env::var("DYNAMODB_ENDPOINT").ok().filter(|v| !v.is_empty())
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

/// Web API key of the identity provider project that issues Google and phone sign-in tokens
pub static FIREBASE_API_KEY: Lazy<String> = Lazy::new(|| {
    env::var("FIREBASE_API_KEY").unwrap_or_else(|_| {
        warn!("FIREBASE_API_KEY not set, Google and phone sign-in will be rejected");
        String::new()
    })
});

/// Base URL of the identity toolkit API used to look up sign-in tokens
pub static IDENTITY_TOOLKIT_URL: Lazy<String> = Lazy::new(|| {
    var_or(
        "IDENTITY_TOOLKIT_URL",
        "https://identitytoolkit.googleapis.com",
    )
});
