//! Integrate twoface with other libraries, like Actix-web or Diesel.

use crate::twoface::{ExternalError, Fallible, TfError};
use actix_web::{
    error::BlockingError,
    http::{header, StatusCode},
    HttpResponse,
};
use anyhow::anyhow;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use tracing::error;

// Twoface errors can be used as Actix-web errors.
// If a handler returns a Twoface error, the external portion will be shown to the user.
// The internal portion will only be logged.
impl actix_web::ResponseError for TfError {
    fn status_code(&self) -> StatusCode {
        self.external.cause.into()
    }

    fn error_response(&self) -> HttpResponse {
        error!(cause = %self.external.cause, "{}", self.internal);
        let resp = serde_json::to_string(&ErrBody {
            error: self.to_string(),
        })
        .unwrap_or_else(|e| {
            error!("Serde error: {}", e.to_string());
            "{\"error\": \"ServerError: internal server error\"}".to_owned()
        });
        HttpResponse::build(self.external.cause.into())
            .header(header::CONTENT_TYPE, "application/json")
            .body(resp)
    }
}

#[derive(Serialize)]
struct ErrBody {
    error: String,
}

/// Convenience extension used to extract errors from `web::block`.
pub trait BlockingResp<T> {
    /// Convert the return from a web::block into a normal `Fallible<T>`.
    fn to_resp(self) -> Fallible<T>;
}

impl<T, I: std::fmt::Debug + Into<TfError>> BlockingResp<T> for Result<T, BlockingError<I>> {
    fn to_resp(self) -> Fallible<T> {
        match self {
            Ok(t) => Ok(t),
            Err(BlockingError::Error(err)) => Err(err.into()),
            Err(BlockingError::Canceled) => Err(TfError {
                internal: anyhow!("blocking operation cancelled"),
                external: ExternalError::default(),
            }),
        }
    }
}

/// A unique constraint rejected the write. Anything else stays a server error.
pub fn unique_violation(err: DieselError, external: ExternalError) -> TfError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => TfError {
            internal: err.into(),
            external,
        },
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use crate::twoface::externalerror::Cause;
    use crate::twoface::*;
    use actix_web::{http::StatusCode, test, web, App};

    #[actix_rt::test]
    async fn test_external_text_and_status_reach_the_user() {
        async fn index() -> Fallible<web::Json<String>> {
            let file = std::fs::read_to_string("secret-filename-do-not-leak-to-user");
            file.describe_err(ExternalError {
                cause: Cause::UserForbidden,
                text: "You do not own this post",
            })
            .map(web::Json)
        }

        let mut app =
            test::init_service(App::new().service(web::resource("/").route(web::get().to(index))))
                .await;

        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let body = test::read_body(resp).await;
        assert_eq!(
            String::from_utf8(body.to_vec()).unwrap(),
            "{\"error\":\"UserForbidden: You do not own this post\"}"
        );
    }

    #[test]
    fn test_unique_violation_only_matches_constraint_errors() {
        let external = ExternalError::invalid_field("A hashtag with this name already exists");
        let err = unique_violation(diesel::result::Error::NotFound, external);
        assert_eq!(err.cause(), Cause::ServerError);
    }
}
