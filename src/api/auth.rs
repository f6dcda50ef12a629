//! Bearer-token authentication. Tokens are HS256 JWTs carrying the user id. Issuing them is
//! someone else's job; this module only checks them.
use crate::policy::{Caller, UNAUTHENTICATED};
use crate::twoface::{DescribeErr, ExternalError, Fallible, TfError};
use actix_web::{
    dev::Payload,
    http::header::{self, Header},
    web, FromRequest, HttpRequest,
};
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};
use digest::Digest;
use futures::future::{ready, Ready};
use jsonwebtoken as jwt;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    user_id: i32,
    exp: usize,
}

/// Checks bearer tokens against the shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: String,
}

impl TokenVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn verify(&self, token: &str) -> Fallible<i32> {
        let data = jwt::decode::<Claims>(
            token,
            &jwt::DecodingKey::from_secret(self.secret.as_bytes()),
            &jwt::Validation::default(),
        )
        .describe_err(UNAUTHENTICATED)?;
        Ok(data.claims.user_id)
    }

    #[cfg(test)]
    pub fn sign(&self, user_id: i32) -> String {
        let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize;
        jwt::encode(
            &jwt::Header::default(),
            &Claims { user_id, exp },
            &jwt::EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .unwrap()
    }
}

fn caller_from(req: &HttpRequest) -> Fallible<Caller> {
    if !req.headers().contains_key(header::AUTHORIZATION) {
        return Ok(Caller::anonymous());
    }
    guard!(let Some(verifier) = req.app_data::<web::Data<TokenVerifier>>() else {
        return Err(TfError::new(
            "no TokenVerifier registered",
            ExternalError::default(),
        ));
    });
    let auth =
        Authorization::<Bearer>::parse(req).map_err(|e| TfError::new(e, UNAUTHENTICATED))?;
    let bearer = auth.into_scheme();
    let user_id = verifier.verify(bearer.token())?;
    Ok(Caller::user(user_id))
}

/// No `Authorization` header means an anonymous caller. A header that doesn't verify is a 401,
/// even on endpoints that anonymous callers could use.
impl FromRequest for Caller {
    type Error = TfError;
    type Future = Ready<Result<Self, Self::Error>>;
    type Config = ();

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(caller_from(req))
    }
}

fn digest_hex(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Salted SHA-256, stored as `salt$hexdigest`.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().to_simple().to_string();
    let digest = digest_hex(&salt, password);
    format!("{}${}", salt, digest)
}

#[cfg(test)]
pub fn check_password(stored: &str, password: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, digest)) => digest_hex(salt, password) == digest,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twoface::Cause;
    use actix_web::test::TestRequest;

    #[test]
    fn test_password_hash_round_trip() {
        let stored = hash_password("testpassword");
        assert_ne!(stored, "testpassword");
        assert!(check_password(&stored, "testpassword"));
        assert!(!check_password(&stored, "wrongpassword"));
        assert_ne!(hash_password("testpassword"), stored, "salts differ");
    }

    #[test]
    fn test_missing_header_is_anonymous() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(caller_from(&req).unwrap(), Caller::anonymous());
    }

    #[test]
    fn test_valid_token_names_the_user() {
        let verifier = TokenVerifier::new("secret");
        let req = TestRequest::default()
            .data(verifier.clone())
            .header(header::AUTHORIZATION, format!("Bearer {}", verifier.sign(7)))
            .to_http_request();
        assert_eq!(caller_from(&req).unwrap(), Caller::user(7));
    }

    #[test]
    fn test_bad_tokens_are_rejected() {
        let other = TokenVerifier::new("other secret");
        let req = TestRequest::default()
            .data(TokenVerifier::new("secret"))
            .header(header::AUTHORIZATION, format!("Bearer {}", other.sign(7)))
            .to_http_request();
        assert_eq!(caller_from(&req).unwrap_err().cause(), Cause::UserBadAuth);

        let req = TestRequest::default()
            .data(TokenVerifier::new("secret"))
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .to_http_request();
        assert_eq!(caller_from(&req).unwrap_err().cause(), Cause::UserBadAuth);
    }
}
