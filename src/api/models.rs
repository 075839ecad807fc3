use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::alerting::Notification;
use crate::service;

fn yes() -> bool {
    true
}

fn default_tail() -> usize {
    100
}

#[derive(Debug, serde::Deserialize)]
pub struct ContainerListParams {
    #[serde(default = "yes")]
    pub all: bool,
    #[serde(default = "yes")]
    pub stats: bool,
}

#[derive(Debug, serde::Deserialize)]
pub struct ImageListParams {
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, serde::Deserialize)]
pub struct LogParams {
    #[serde(default = "default_tail")]
    pub tail: usize,
    #[serde(default)]
    pub timestamps: bool,
}

#[derive(Debug, serde::Deserialize)]
pub struct LifecycleParams {
    /// Seconds to wait before killing the container on stop or restart.
    pub t: Option<u32>,
}

#[derive(Debug, serde::Deserialize)]
pub struct RemoveImageParams {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct LogsResponse {
    pub logs: String,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

#[derive(Debug, serde::Serialize)]
struct ErrorBody {
    error: String,
}

/// An error answered with a status code and a JSON body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<service::Error> for ApiError {
    fn from(err: service::Error) -> Self {
        let status = if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else if err.is_invalid_input() {
            StatusCode::BAD_REQUEST
        } else {
            match err {
                service::Error::Transport(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        };
        if status.is_server_error() {
            log::error!("request failed: {err}");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}
