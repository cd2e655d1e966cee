//! Some helper functions for the API.

use pitbox_common::db_util::{
    PgPool, PgPooledConnection, get_pooled_database_connection, is_unique_violation,
};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::Response;
use rocket::response::status as rocket_status;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Clone, Copy)]
pub struct RequestTimingFairing;

#[rocket::async_trait]
impl Fairing for RequestTimingFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request timing",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _data: &mut rocket::Data<'_>) {
        request.local_cache(Instant::now);
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let started_at = request.local_cache(Instant::now);
        let elapsed = started_at.elapsed();
        let status = response.status().code;

        tracing::info!(
            method = %request.method(),
            path = %request.uri(),
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request Completed"
        );
    }
}

#[derive(Clone, Copy)]
pub struct CorsFairing;

#[rocket::async_trait]
impl Fairing for CorsFairing {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS, PATCH, HEAD",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Max-Age", "86400"));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    NotFound,
    BadRequest,
    Unauthorized,
    Forbidden,
    Conflict,
    UnprocessableEntity,
    Internal,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct ApiErrorBody {
    pub error: ApiErrorKind,
    pub message: String,
}

impl ApiErrorBody {
    pub fn new(error: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
        }
    }
}

pub type ApiError = rocket_status::Custom<Json<ApiErrorBody>>;
pub type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: Status, kind: ApiErrorKind, message: impl Into<String>) -> ApiError {
    rocket_status::Custom(status, Json(ApiErrorBody::new(kind, message)))
}

pub fn not_found_error(message: impl Into<String>) -> ApiError {
    api_error(Status::NotFound, ApiErrorKind::NotFound, message)
}

pub fn bad_request_error(message: impl Into<String>) -> ApiError {
    api_error(Status::BadRequest, ApiErrorKind::BadRequest, message)
}

pub fn conflict_error(message: impl Into<String>) -> ApiError {
    api_error(Status::Conflict, ApiErrorKind::Conflict, message)
}

pub fn unprocessable_entity_error(message: impl Into<String>) -> ApiError {
    api_error(
        Status::UnprocessableEntity,
        ApiErrorKind::UnprocessableEntity,
        message,
    )
}

pub fn internal_error(message: impl Into<String>) -> ApiError {
    api_error(Status::InternalServerError, ApiErrorKind::Internal, message)
}

/// Map a database failure to a response. Unique violations are the caller's
/// fault (409); everything else is logged and hidden behind a 500.
pub fn database_error(err: &anyhow::Error) -> ApiError {
    if is_unique_violation(err) {
        return conflict_error("A record with the same unique key already exists");
    }
    tracing::error!(error = %format!("{err:#}"), "Database error");
    internal_error("Database error")
}

pub fn get_connection(pool: &PgPool) -> Result<PgPooledConnection, ApiError> {
    get_pooled_database_connection(pool).map_err(|e| database_error(&e))
}

/// The body every catcher returns for a bare status.
pub fn status_body(status: Status) -> ApiErrorBody {
    let kind = match status.code {
        400 => ApiErrorKind::BadRequest,
        401 => ApiErrorKind::Unauthorized,
        403 => ApiErrorKind::Forbidden,
        404 => ApiErrorKind::NotFound,
        409 => ApiErrorKind::Conflict,
        422 => ApiErrorKind::UnprocessableEntity,
        503 => ApiErrorKind::Unavailable,
        _ => ApiErrorKind::Internal,
    };
    ApiErrorBody::new(kind, status.reason().unwrap_or("Unknown error"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_body_kinds() {
        assert_eq!(status_body(Status::Unauthorized).error, ApiErrorKind::Unauthorized);
        assert_eq!(status_body(Status::Forbidden).error, ApiErrorKind::Forbidden);
        assert_eq!(status_body(Status::NotFound).message, "Not Found");
        assert_eq!(status_body(Status::ImATeapot).error, ApiErrorKind::Internal);
    }

    #[test]
    fn test_error_helpers_set_status() {
        assert_eq!(not_found_error("x").0, Status::NotFound);
        assert_eq!(bad_request_error("x").0, Status::BadRequest);
        assert_eq!(conflict_error("x").0, Status::Conflict);
        assert_eq!(unprocessable_entity_error("x").0, Status::UnprocessableEntity);
        let err = internal_error("boom");
        assert_eq!(err.0, Status::InternalServerError);
        assert_eq!(err.1.message, "boom");
    }

    #[test]
    fn test_database_error_hides_details() {
        let err = database_error(&anyhow::anyhow!("relation \"picks\" does not exist"));
        assert_eq!(err.0, Status::InternalServerError);
        assert_eq!(err.1.message, "Database error");
    }
}
