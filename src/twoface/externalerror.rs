use actix_web::http::StatusCode;
use std::fmt;

/// Used to create HTTP responses with the given text and status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalError {
    /// A user-facing explanation of what caused the error.
    pub cause: Cause,
    /// Error text that will describe the problem to the user.
    pub text: &'static str,
}

/// A user-facing explanation of what caused the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    ServerError,
    /// The request was well-formed but the action breaks a rule, e.g. liking a post twice.
    UserActionInvalid,
    /// No credentials, bad credentials, or credentials for a user that no longer exists.
    UserBadAuth,
    /// Authenticated, but not the owner of the resource being changed.
    UserForbidden,
    UserInvalidField,
    NotFound,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        // Make fmt::Display the same as fmt::Debug, i.e. each variant's name.
        write!(f, "{:?}", self)
    }
}

/// Causes can be mapped to HTTP status codes. ExternalError doesn't use status codes directly,
/// because some components (e.g. the Datastore) shouldn't need to know about HTTP codes.
impl From<Cause> for StatusCode {
    fn from(cause: Cause) -> Self {
        match cause {
            Cause::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Cause::UserActionInvalid => StatusCode::BAD_REQUEST,
            Cause::UserInvalidField => StatusCode::BAD_REQUEST,
            Cause::UserBadAuth => StatusCode::UNAUTHORIZED,
            Cause::UserForbidden => StatusCode::FORBIDDEN,
            Cause::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl fmt::Display for ExternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}: {}", self.cause, self.text)
    }
}

impl Default for ExternalError {
    // Default to ServerError and a very vague generic message.
    fn default() -> Self {
        Self {
            cause: Cause::ServerError,
            text: "Internal server error",
        }
    }
}

impl ExternalError {
    pub const fn not_found(text: &'static str) -> Self {
        Self {
            cause: Cause::NotFound,
            text,
        }
    }

    pub const fn invalid_field(text: &'static str) -> Self {
        Self {
            cause: Cause::UserInvalidField,
            text,
        }
    }

    pub const fn invalid_action(text: &'static str) -> Self {
        Self {
            cause: Cause::UserActionInvalid,
            text,
        }
    }
}
