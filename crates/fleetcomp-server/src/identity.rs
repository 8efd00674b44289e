//! Bearer-token verification against the external identity provider.
//!
//! Tokens are EdDSA (Ed25519) JWTs. Verification is stateless: the
//! signature, expiry and issuer are checked and the `sub` claim is
//! returned. Mapping the subject onto staff records happens in the CAF
//! service.

use std::future::{Ready, ready};

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{FromRequest, HttpRequest, web};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::ApiError;
use crate::config::IdentityConfig;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("bad public key: {0}")]
    Key(String),

    #[error("missing bearer token")]
    MissingToken,

    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Claims read from an identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub iss: String,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let key = DecodingKey::from_ed_pem(config.public_key_pem.as_bytes())
            .map_err(|e| IdentityError::Key(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iss"]);

        Ok(Self { key, validation })
    }

    pub fn verify(&self, token: &str) -> Result<IdentityClaims, IdentityError> {
        let claims = jsonwebtoken::decode::<IdentityClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => IdentityError::Expired,
                _ => IdentityError::Invalid(e.to_string()),
            })?;
        if claims.sub.trim().is_empty() {
            return Err(IdentityError::Invalid("empty subject".into()));
        }
        Ok(claims)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Verified identity subject of the request.
///
/// Requires a `web::Data<TokenVerifier>` in the application data.
#[derive(Debug, Clone)]
pub struct Identity(pub String);

impl Identity {
    pub fn subject(&self) -> &str {
        &self.0
    }
}

fn authenticate(req: &HttpRequest) -> Result<Identity, ApiError> {
    let verifier = req
        .app_data::<web::Data<TokenVerifier>>()
        .ok_or_else(|| ApiError::internal("token verifier is not configured"))?;

    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or(IdentityError::MissingToken)?;

    let claims = verifier.verify(token)?;
    Ok(Identity(claims.sub))
}

impl FromRequest for Identity {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = authenticate(req);
        if let Err(e) = &result {
            debug!(path = req.path(), error = %e, "Request not authenticated");
        }
        ready(result)
    }
}
