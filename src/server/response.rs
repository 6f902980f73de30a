//! `/send-mail` 的响应格式
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::mail::SendError;

pub const SUCCESS_MESSAGE: &str = "📧 Email sent successfully";

pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const SEND_FAILED: &str = "SEND_FAILED";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMailSuccess {
    pub success: bool,
    pub message: &'static str,
    pub message_id: String,
}

impl SendMailSuccess {
    pub fn new(message_id: String) -> Self {
        Self {
            success: true,
            message: SUCCESS_MESSAGE,
            message_id,
        }
    }
}

impl IntoResponse for SendMailSuccess {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct SendMailFailure {
    pub success: bool,
    pub error: &'static str,
    pub message: String,
}

impl SendMailFailure {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: VALIDATION_ERROR,
            message: message.into(),
        }
    }

    pub fn send_failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: SEND_FAILED,
            message: message.into(),
        }
    }
}

impl From<&SendError> for SendMailFailure {
    fn from(err: &SendError) -> Self {
        match err {
            SendError::Validation(message) => SendMailFailure::validation(message.clone()),
            // Internal 的 Display 是通用描述，不暴露细节
            SendError::Auth(_) | SendError::Delivery { .. } | SendError::Internal(_) => {
                SendMailFailure::send_failed(err.to_string())
            }
        }
    }
}

impl IntoResponse for SendError {
    fn into_response(self) -> Response {
        let status = match self {
            SendError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(SendMailFailure::from(&self))).into_response()
    }
}
