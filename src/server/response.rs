//! The `{ ok, ... }` JSON envelope shared by every endpoint.
//!
//! Handlers return `Result<Reply<T>, ApiError>`: [`Reply`] covers both the
//! success payload and expected rejections (unknown id, not the owner), while
//! [`ApiError`] turns unexpected failures into a 4xx/5xx envelope so no
//! request is ever left without a response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::models::Image;
use crate::Error;

pub const NOT_EXIST_ID: &str = "Not exist id.";
pub const NOT_DELETE: &str = "Not delete.";
pub const NOT_EXIST_ADDRESS: &str = "Not exist address.";
pub const NOT_EXIST_IMAGE: &str = "Not exist image.";
pub const INTERNAL_ERROR: &str = "Internal server error.";

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub ok: bool,
    #[serde(flatten)]
    pub body: T,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Failure {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ImageList {
    pub images: Vec<Image>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SingleImage {
    pub image: Image,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeletedImage {
    pub deleted_image: Image,
}

#[derive(Debug)]
pub enum Reply<T> {
    Ok(T),
    /// Expected refusal, reported as `ok: false` with a 200 status.
    Rejected(&'static str),
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        match self {
            Reply::Ok(body) => Json(Envelope { ok: true, body }).into_response(),
            Reply::Rejected(message) => failure(StatusCode::OK, message),
        }
    }
}

#[derive(Debug)]
pub struct ApiError(pub Error);

impl<E: Into<Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Request failed");
            failure(status, INTERNAL_ERROR)
        } else {
            tracing::warn!(status = %status, error = %self.0, "Rejected request");
            let message = match &self.0 {
                Error::Multipart(message) => message.clone(),
                other => other.to_string(),
            };
            failure(status, &message)
        }
    }
}

fn failure(status: StatusCode, message: &str) -> Response {
    let body = Envelope {
        ok: false,
        body: Failure {
            message: message.to_string(),
        },
    };
    (status, Json(body)).into_response()
}
