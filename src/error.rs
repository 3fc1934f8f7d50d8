use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel_async::pooled_connection::deadpool::PoolError;
use serde::Serialize;
use std::borrow::Cow;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Domain and infrastructure errors for the whole API surface.
///
/// Every variant maps to a stable machine-discriminable `kind` string; storage
/// errors never leave the boundary raw.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(Cow<'static, str>),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Permission(Cow<'static, str>),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("already a member of this club")]
    AlreadyMember,
    #[error("not a member of this club")]
    NotMember,
    #[error("a membership request for this club is already pending")]
    DuplicateRequest,
    #[error("the president cannot leave the club; presidency must be transferred first")]
    PresidentCannotLeave,
    #[error("unrecognized action `{0}`")]
    InvalidAction(String),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::AlreadyMember
            | AppError::NotMember
            | AppError::DuplicateRequest
            | AppError::PresidentCannotLeave
            | AppError::InvalidAction(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Permission(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Permission(_) => "permission_denied",
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyMember => "already_member",
            AppError::NotMember => "not_member",
            AppError::DuplicateRequest => "duplicate_request",
            AppError::PresidentCannotLeave => "president_cannot_leave",
            AppError::InvalidAction(_) => "invalid_action",
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => "internal",
        }
    }

    fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct AppErrorResponse {
            status: u16,
            kind: &'static str,
            message: Cow<'static, str>,
        }

        let code = self.status_code();
        let kind = self.kind();

        let message = if self.is_server_error() {
            tracing::error!(error = %self, kind, "request failed");
            Cow::Borrowed("internal server error")
        } else {
            tracing::debug!(error = %self, kind, "request rejected");
            Cow::Owned(self.to_string())
        };

        (
            code,
            Json(AppErrorResponse {
                status: code.as_u16(),
                kind,
                message,
            }),
        )
            .into_response()
    }
}

/// Convert a uniqueness violation into the matching domain error.
///
/// The (club, user) unique constraints are the last line of defense against
/// concurrent duplicate joins; every other database error passes through.
pub fn unique_violation(e: diesel::result::Error, domain: AppError) -> AppError {
    match e {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        ) => domain,
        other => AppError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_stable_kinds_and_statuses() {
        let cases = [
            (AppError::Validation("bad input".into()), "validation", 400),
            (AppError::Permission("nope".into()), "permission_denied", 403),
            (AppError::NotFound("club"), "not_found", 404),
            (AppError::AlreadyMember, "already_member", 400),
            (AppError::NotMember, "not_member", 400),
            (AppError::DuplicateRequest, "duplicate_request", 400),
            (AppError::PresidentCannotLeave, "president_cannot_leave", 400),
            (AppError::InvalidAction("foo".into()), "invalid_action", 400),
            (AppError::Unauthorized("no token"), "unauthorized", 401),
        ];
        for (err, kind, status) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.status_code().as_u16(), status);
        }
    }

    #[test]
    fn storage_errors_are_internal() {
        let err = AppError::Database(diesel::result::Error::NotFound);
        assert_eq!(err.kind(), "internal");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unique_violations_become_the_given_domain_error() {
        let e = diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            Box::new(String::from("duplicate key value violates unique constraint")),
        );
        assert!(matches!(
            unique_violation(e, AppError::DuplicateRequest),
            AppError::DuplicateRequest
        ));

        let other = diesel::result::Error::NotFound;
        assert!(matches!(
            unique_violation(other, AppError::DuplicateRequest),
            AppError::Database(_)
        ));
    }
}
