use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;

/// Collects a response body and parses it as JSON.
pub async fn response_to_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("response body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("JSON response body")
}
