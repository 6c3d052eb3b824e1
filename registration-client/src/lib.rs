//! Client side of the retreat registration system: the typed HTTP client for the
//! registration service, the registration wizard, session persistence and sign-in.

pub mod api;
pub mod auth;
pub mod error;
pub mod session;
pub mod wizard;

#[cfg(test)]
pub(crate) mod test_support;
