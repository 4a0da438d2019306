//! Firebase ID token verification.
//!
//! Tokens are RS256 JWTs signed by Google. Signing keys come from the
//! securetoken JWK set and are cached for the `max-age` the endpoint
//! advertises (at least five minutes).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{IdentityVerifier, VerifiedIdentity};
use crate::config::FirebaseConfig;
use crate::error::AuthError;

const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

const MIN_CACHE_TTL_SECS: i64 = 300;
const DEFAULT_CACHE_TTL_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    expires_at: DateTime<Utc>,
}

/// Verifies Firebase ID tokens for one project.
pub struct FirebaseVerifier {
    project_id: Option<String>,
    jwks_url: String,
    client: Client,
    cached: RwLock<Option<CachedKeys>>,
}

impl FirebaseVerifier {
    pub fn new(config: FirebaseConfig) -> Self {
        Self {
            project_id: config.project_id,
            jwks_url: FIREBASE_JWKS_URL.to_string(),
            client: Client::new(),
            cached: RwLock::new(None),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.project_id.is_some()
    }

    /// Signing key for `kid`.
    ///
    /// Keys are refetched only once the cached set has expired; an unknown
    /// `kid` against a fresh set is rejected outright.
    async fn key_for(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cache = self.cached.read().await;
            if let Some(fresh) = cache.as_ref().filter(|c| c.expires_at > Utc::now()) {
                return fresh.keys.get(kid).cloned().ok_or_else(unknown_key);
            }
        }

        self.refresh_keys().await?;

        let cache = self.cached.read().await;
        cache
            .as_ref()
            .and_then(|c| c.keys.get(kid))
            .cloned()
            .ok_or_else(unknown_key)
    }

    async fn refresh_keys(&self) -> Result<(), AuthError> {
        info!("Fetching Firebase signing keys");
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeyFetch(format!(
                "key endpoint returned {}",
                response.status()
            )));
        }

        let ttl = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_CACHE_TTL_SECS)
            .max(MIN_CACHE_TTL_SECS);

        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(format!("bad JWK set: {e}")))?;

        let mut keys = HashMap::new();
        for jwk in set.keys {
            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys.insert(jwk.kid, key);
                }
                Err(e) => warn!(kid = %jwk.kid, error = %e, "Skipping unusable signing key"),
            }
        }
        debug!(count = keys.len(), ttl, "Firebase signing keys cached");

        *self.cached.write().await = Some(CachedKeys {
            keys,
            expires_at: Utc::now() + Duration::seconds(ttl),
        });
        Ok(())
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let project_id = self.project_id.as_deref().ok_or(AuthError::NotConfigured)?;

        let header = decode_header(token)
            .map_err(|e| AuthError::InvalidToken(format!("malformed header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("missing key id".to_string()))?;

        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[project_id]);
        validation.set_issuer(&[format!("{FIREBASE_ISSUER_PREFIX}{project_id}")]);

        let data = decode::<FirebaseClaims>(token, &key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::InvalidToken(e.to_string()),
        })?;

        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(AuthError::InvalidToken("empty subject".to_string()));
        }
        debug!(uid = %claims.sub, "Firebase token verified");
        Ok(VerifiedIdentity {
            uid: claims.sub,
            email: claims.email,
            name: claims.name,
        })
    }
}

fn unknown_key() -> AuthError {
    AuthError::InvalidToken("unknown signing key".to_string())
}

/// `max-age` seconds from a Cache-Control header value.
fn parse_max_age(header: &str) -> Option<i64> {
    header
        .split(',')
        .filter_map(|part| part.trim().strip_prefix("max-age="))
        .find_map(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> FirebaseVerifier {
        FirebaseVerifier::new(FirebaseConfig {
            project_id: Some("demo-project".into()),
        })
    }

    #[test]
    fn max_age_parsing() {
        assert_eq!(parse_max_age("public, max-age=19302, must-revalidate"), Some(19302));
        assert_eq!(parse_max_age("no-cache"), None);
        assert_eq!(parse_max_age("max-age=abc"), None);
    }

    #[tokio::test]
    async fn unconfigured_rejects_everything() {
        let verifier = FirebaseVerifier::new(FirebaseConfig::default());
        assert!(!verifier.is_configured());
        let err = verifier.verify("anything").await.unwrap_err();
        assert!(matches!(err, AuthError::NotConfigured));
    }

    #[tokio::test]
    async fn malformed_token_is_invalid() {
        let err = configured().verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn wrong_algorithm_is_invalid() {
        // {"alg":"HS256","typ":"JWT"}.{"sub":"x"}.sig
        let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiJ4In0.c2ln";
        let err = configured().verify(token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(ref m) if m.contains("algorithm")));
    }

    #[tokio::test]
    async fn missing_kid_is_invalid() {
        // {"alg":"RS256","typ":"JWT"}.{"sub":"x"}.sig
        let token = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiJ4In0.c2ln";
        let err = configured().verify(token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(ref m) if m.contains("key id")));
    }

    /// A verifier whose key endpoint refuses connections.
    fn offline() -> FirebaseVerifier {
        let mut verifier = configured();
        verifier.jwks_url = "http://127.0.0.1:9/keys".to_string();
        verifier
    }

    // {"alg":"RS256","kid":"rotated-out","typ":"JWT"}.{"sub":"x"}.sig
    const UNKNOWN_KID_TOKEN: &str = "eyJhbGciOiJSUzI1NiIsImtpZCI6InJvdGF0ZWQtb3V0IiwidHlwIjoiSldUIn0.eyJzdWIiOiJ4In0.c2ln";

    #[tokio::test]
    async fn unknown_kid_with_fresh_keys_skips_refetch() {
        let verifier = offline();
        *verifier.cached.write().await = Some(CachedKeys {
            keys: HashMap::new(),
            expires_at: Utc::now() + Duration::seconds(600),
        });

        let err = verifier.verify(UNKNOWN_KID_TOKEN).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(ref m) if m == "unknown signing key"));
    }

    #[tokio::test]
    async fn expired_key_cache_is_refetched() {
        let verifier = offline();
        *verifier.cached.write().await = Some(CachedKeys {
            keys: HashMap::new(),
            expires_at: Utc::now() - Duration::seconds(1),
        });

        let err = verifier.verify(UNKNOWN_KID_TOKEN).await.unwrap_err();
        assert!(matches!(err, AuthError::KeyFetch(_)));
    }
}
