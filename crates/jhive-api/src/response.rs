//! Uniform response envelope.
//!
//! Every endpoint answers with `{statusCode, data, message, success}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// The response envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub status_code: u16,
    pub data: Option<T>,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    /// Envelope with data.
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data: Some(data),
            message: message.into(),
            success: status.as_u16() < 400,
        }
    }

    /// 200 OK with data.
    pub fn ok(data: T) -> Self {
        Self::new(StatusCode::OK, data, "OK")
    }

    /// 200 OK with data and a message.
    pub fn ok_with(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, data, message)
    }

    /// 201 Created with data and a message.
    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CREATED, data, message)
    }
}

impl ApiResponse<()> {
    /// Data-less envelope (message only).
    pub fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data: None,
            message: message.into(),
            success: status.as_u16() < 400,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_shape() {
        let response = ApiResponse::ok(json!({"user": {"name": "Jane"}}));
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "OK");
        assert_eq!(value["data"]["user"]["name"], "Jane");
    }

    #[test]
    fn created_is_successful() {
        let response = ApiResponse::created(json!(null), "Job created");
        assert!(response.success);
        assert_eq!(response.status_code, 201);
    }

    #[test]
    fn message_envelope_has_null_data() {
        let response = ApiResponse::message(StatusCode::OK, "Logged out successfully");
        let value = serde_json::to_value(&response).unwrap();
        assert!(value["data"].is_null());
    }
}
