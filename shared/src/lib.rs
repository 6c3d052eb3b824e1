pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod identity;
pub mod ids;
pub mod models;
pub mod session;
pub mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
