use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use log::{debug, warn};

use crate::models::MessageResponse;
use crate::session::{decode_token, TokenError};

/// The caller of an authenticated route, as carried by their session token.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub user_id: String,
    pub name: String,
    pub email: Option<String>,
}

fn reject(message: String) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(MessageResponse {
            success: false,
            message,
        }),
    )
        .into_response()
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Validates the bearer session token and exposes the caller as
/// `Extension<CurrentUser>` to the handlers behind it.
pub async fn auth_middleware(mut req: Request, next: Next) -> Response {
    let Some(token) = bearer_token(&req) else {
        warn!("Rejected {} {}: missing bearer token", req.method(), req.uri());
        return reject("Please sign in to continue.".to_string());
    };

    let claims = match decode_token(token) {
        Ok(claims) => claims,
        Err(TokenError::Expired) => {
            warn!("Rejected {} {}: session expired", req.method(), req.uri());
            return reject("Your session has expired. Please sign in again.".to_string());
        }
        Err(e) => {
            warn!("Rejected {} {}: {}", req.method(), req.uri(), e);
            return reject("Invalid session. Please sign in again.".to_string());
        }
    };

    debug!("Authenticated request for user {}", claims.sub);
    req.extensions_mut().insert(CurrentUser {
        user_id: claims.sub,
        name: claims.name,
        email: claims.email,
    });

    next.run(req).await
}

#[cfg(any(test, feature = "test_utils"))]
mod test_requests {
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Request};

    use crate::models::AuthMethod;
    use crate::session::{issue_token, Session};

    fn build(method: &str, path: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        builder.body(body).expect("valid test request")
    }

    /// Request signed in as `session`.
    pub fn create_test_request_as(
        method: &str,
        path: &str,
        session: &Session,
        body: Option<serde_json::Value>,
    ) -> Request<Body> {
        let token = issue_token(session).expect("token for test session");
        build(method, path, Some(&token), body)
    }

    /// Request signed in as `user_id`, with no email on the session.
    pub fn create_test_request(
        method: &str,
        path: &str,
        user_id: &str,
        body: Option<serde_json::Value>,
    ) -> Request<Body> {
        let session = Session::start(user_id, "Test User", None, None, AuthMethod::Email);
        create_test_request_as(method, path, &session, body)
    }

    /// Request without any session.
    pub fn create_anonymous_request(
        method: &str,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Request<Body> {
        build(method, path, None, body)
    }
}

#[cfg(any(test, feature = "test_utils"))]
pub use test_requests::{create_anonymous_request, create_test_request, create_test_request_as};
