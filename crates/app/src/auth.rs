use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use hrm_core::policy::{Operation, Role};

use crate::problem::ProblemResponse;
use crate::router::AppState;

/// Verifies HS256 bearer tokens minted by the identity service.
#[derive(Clone)]
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        // Time claims are checked against the application clock below.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Caller, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| TokenError::Invalid(format!("{err}")))?
            .claims;

        let now_ts = now.timestamp();
        if let Some(nbf) = claims.nbf {
            if now_ts < nbf as i64 {
                return Err(TokenError::Invalid("token_not_yet_valid".to_string()));
            }
        }
        if now_ts >= claims.exp as i64 {
            return Err(TokenError::Invalid("token_expired".to_string()));
        }
        if claims.sub.trim().is_empty() {
            return Err(TokenError::Invalid("missing_subject".to_string()));
        }

        Ok(Caller {
            subject: claims.sub,
            role: Role::from_claim(&claims.role),
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub role: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<usize>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Identity resolved from the bearer token of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub subject: String,
    pub role: Role,
}

impl Caller {
    /// Single authorization gate for every employee operation.
    pub fn authorize(&self, state: &AppState, operation: Operation) -> Result<(), ProblemResponse> {
        state.access_policy().authorize(operation, self.role).map_err(|denied| {
            warn!(
                stage = "auth",
                subject = %self.subject,
                role = self.role.as_str(),
                operation = operation.as_str(),
                "{denied}"
            );
            ProblemResponse::forbidden()
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ProblemResponse;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ProblemResponse::unauthorized("missing bearer token"))?;

        let token = bearer_token(header)
            .ok_or_else(|| ProblemResponse::unauthorized("authorization must use the Bearer scheme"))?;

        state
            .token_validator()
            .validate(token, state.now())
            .map_err(|err| {
                warn!(stage = "auth", error = %err, "rejected bearer token");
                ProblemResponse::unauthorized("invalid bearer token")
            })
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
pub(crate) fn issue_token(secret: &[u8], subject: &str, role: &str, exp: i64) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = TokenClaims {
        sub: subject.to_string(),
        role: role.to_string(),
        exp: exp as usize,
        nbf: None,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .expect("encode token")
}
