//! Identity verification for bearer tokens.

pub mod firebase;

pub use firebase::FirebaseVerifier;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AuthError;

/// Who a verified token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedIdentity {
    /// Identity-provider uid.
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Turns an opaque bearer token into an identity.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;
}

/// Extract the token from an `Authorization` header value.
///
/// Accepts `Bearer <token>`; any other shape yields the last
/// whitespace-separated word.
pub fn bearer_token(header: &str) -> Option<&str> {
    header.split_whitespace().last().filter(|t| !t.eq_ignore_ascii_case("bearer"))
}
