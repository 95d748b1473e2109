use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use loupe_env::Environment;

use crate::env_const::LOUPE_JWT_SECRET;

const TOKEN_PREFIX: &str = "Bearer ";

/// Raw claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("Missing bearer token")]
    Missing,

    #[error("Malformed authorization header")]
    Malformed,

    #[error("Expired token")]
    Expired,

    #[error("Invalid token")]
    Invalid,
}

#[derive(Debug, Error)]
pub enum AuthConfigurationError {
    #[error("{LOUPE_JWT_SECRET} must be set")]
    MissingSecret,
}

/// Verifies a signed bearer token against the shared secret and extracts its
/// claims. Pure: no clock state beyond the `exp` check, no side effects.
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new_from_env(env: &dyn Environment) -> Result<Self, AuthConfigurationError> {
        let secret = env
            .get(LOUPE_JWT_SECRET)
            .ok_or(AuthConfigurationError::MissingSecret)?;
        Ok(Self::from_secret(&secret))
    }

    pub fn from_secret(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation: Validation::default(),
        }
    }

    /// Strip the `Bearer ` prefix from an authorization header value.
    ///
    /// An absent header is `Missing` (the caller decides whether anonymous
    /// access is an error); a present header without the prefix is
    /// `Malformed`.
    pub fn extract_bearer(header: Option<&str>) -> Result<&str, AuthenticationError> {
        match header {
            Some(value) => value
                .strip_prefix(TOKEN_PREFIX)
                .ok_or(AuthenticationError::Malformed),
            None => Err(AuthenticationError::Missing),
        }
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthenticationError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|error| {
                debug!(%error, "Token validation failed");
                match error.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AuthenticationError::Expired
                    }
                    _ => AuthenticationError::Invalid,
                }
            })
    }
}
