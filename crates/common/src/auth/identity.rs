use chrono::{DateTime, Utc};
use thiserror::Error;

use super::Claims;

/// The authenticated subject making a request.
///
/// Validated at construction: an `Identity` that exists is well-formed, so
/// downstream code never re-checks the subject or email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    subject: String,
    email: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity subject may not be empty")]
    EmptySubject,

    #[error("Malformed email `{0}`")]
    MalformedEmail(String),
}

impl Identity {
    pub fn new(
        subject: impl Into<String>,
        email: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, IdentityError> {
        let subject = subject.into();
        let email = email.into();

        if subject.trim().is_empty() {
            return Err(IdentityError::EmptySubject);
        }

        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(IdentityError::MalformedEmail(email)),
        }

        Ok(Self {
            subject,
            email,
            expires_at,
        })
    }

    pub fn from_claims(claims: &Claims) -> Result<Self, IdentityError> {
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC);
        Self::new(claims.sub.clone(), claims.email.clone(), expires_at)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}
