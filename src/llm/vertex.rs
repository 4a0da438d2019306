//! Vertex AI (Gemini) generator.
//!
//! Authentication uses Application Default Credentials:
//! - On Cloud Run / GCE: the metadata server
//! - Locally: `gcloud auth application-default print-access-token`
//!
//! Tokens are cached and refreshed five minutes before their one hour expiry.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::debug;

use super::TextGenerator;
use crate::config::VertexConfig;
use crate::error::LlmError;

const PROVIDER: &str = "vertex";

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const TOKEN_LIFETIME_SECS: u64 = 3600;
const TOKEN_REFRESH_BUFFER_SECS: u64 = 300;

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn build_request(prompt: &str) -> GenerateRequest<'_> {
    GenerateRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![RequestPart { text: prompt }],
        }],
    }
}

/// Text of the first part of the first candidate.
fn extract_text(response: GenerateResponse) -> Result<String, LlmError> {
    if let Some(error) = response.error {
        return Err(LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: error.message,
        });
    }
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "no text content in first candidate".to_string(),
        })
}

// ── GCP authentication ─────────────────────────────────────────────

struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
}

struct GcpAuth {
    cached: RwLock<Option<CachedToken>>,
    client: Client,
}

impl GcpAuth {
    fn new(client: Client) -> Self {
        Self {
            cached: RwLock::new(None),
            client,
        }
    }

    async fn token(&self) -> Result<String, LlmError> {
        {
            let cache = self.cached.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.expires_at > Instant::now()) {
                return Ok(cached.token.expose_secret().to_string());
            }
        }

        let token = self.fetch().await?;
        let exposed = token.expose_secret().to_string();
        *self.cached.write().await = Some(CachedToken {
            token,
            expires_at: Instant::now()
                + Duration::from_secs(TOKEN_LIFETIME_SECS - TOKEN_REFRESH_BUFFER_SECS),
        });
        Ok(exposed)
    }

    async fn fetch(&self) -> Result<SecretString, LlmError> {
        match self.fetch_from_metadata_server().await {
            Ok(token) => {
                debug!("Obtained GCP token from metadata server");
                return Ok(token);
            }
            Err(e) => debug!(error = %e, "Metadata server token unavailable"),
        }

        match self.fetch_from_gcloud_cli().await {
            Ok(token) => {
                debug!("Obtained GCP token from gcloud CLI");
                Ok(token)
            }
            Err(e) => Err(LlmError::AuthFailed {
                provider: PROVIDER.to_string(),
                reason: format!("no GCP credentials available ({e})"),
            }),
        }
    }

    async fn fetch_from_metadata_server(&self) -> Result<SecretString, String> {
        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map_err(|e| format!("metadata request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("metadata server returned {}", response.status()));
        }

        let body: MetadataTokenResponse = response
            .json()
            .await
            .map_err(|e| format!("bad metadata token response: {e}"))?;
        Ok(SecretString::from(body.access_token))
    }

    async fn fetch_from_gcloud_cli(&self) -> Result<SecretString, String> {
        token_from_command("gcloud", &["auth", "application-default", "print-access-token"]).await
    }
}

/// Run a CLI that prints an access token on stdout.
///
/// The child is killed if this future is dropped.
async fn token_from_command(program: &str, args: &[&str]) -> Result<SecretString, String> {
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("failed to run {program}: {e}"))?;

    if !output.status.success() {
        return Err(format!(
            "{program} auth failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(format!("{program} returned an empty token"));
    }
    Ok(SecretString::from(token))
}

// ── Generator ───────────────────────────────────────────────────────

/// Gemini on Vertex AI.
pub struct VertexGenerator {
    config: VertexConfig,
    endpoint: String,
    client: Client,
    auth: GcpAuth,
}

impl VertexGenerator {
    pub fn new(config: VertexConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            endpoint: config.endpoint(),
            auth: GcpAuth::new(client.clone()),
            client,
            config,
        })
    }
}

#[async_trait]
impl TextGenerator for VertexGenerator {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let token = self.auth.token().await?;

        debug!(model = %self.config.model, "Sending request to Vertex AI");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&token)
            .json(&build_request(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        provider: PROVIDER.to_string(),
                        timeout: self.config.timeout,
                    }
                } else {
                    LlmError::RequestFailed {
                        provider: PROVIDER.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: format!("failed to read response: {e}"),
        })?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            *self.auth.cached.write().await = None;
            return Err(LlmError::AuthFailed {
                provider: PROVIDER.to_string(),
                reason: format!("{status}: {body}"),
            });
        }
        if !status.is_success() {
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("{status}: {body}"),
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)?;
        extract_text(parsed)
    }
}

impl std::fmt::Debug for VertexGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexGenerator")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateResponse {
        serde_json::from_str(json).unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_token_is_trimmed() {
        let token = token_from_command("sh", &["-c", "echo '  ya29.token  '"]).await.unwrap();
        assert_eq!(token.expose_secret(), "ya29.token");

        let err = token_from_command("sh", &["-c", "echo nope >&2; exit 1"]).await.unwrap_err();
        assert_eq!(err, "sh auth failed: nope");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn abandoned_token_command_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let script = format!("sleep 0.5; touch '{}'; echo tok", marker.display());

        let args = ["-c", script.as_str()];
        let attempt = token_from_command("sh", &args);
        let timed_out = tokio::time::timeout(Duration::from_millis(100), attempt).await;
        assert!(timed_out.is_err());

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(!marker.exists(), "child outlived the dropped future");
    }

    #[test]
    fn request_shape() {
        let body = serde_json::to_value(build_request("hello")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"contents":[{"role":"user","parts":[{"text":"hello"}]}]})
        );
    }

    #[test]
    fn extracts_first_text_part() {
        let resp = parse(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Eat greens."},{"text":"ignored"}]}}]}"#,
        );
        assert_eq!(extract_text(resp).unwrap(), "Eat greens.");
    }

    #[test]
    fn rejects_empty_candidates() {
        for json in [
            r#"{}"#,
            r#"{"candidates":[]}"#,
            r#"{"candidates":[{"finishReason":"SAFETY"}]}"#,
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"x"}}]}}]}"#,
        ] {
            let err = extract_text(parse(json)).unwrap_err();
            assert!(matches!(err, LlmError::InvalidResponse { .. }), "{json}");
        }
    }

    #[test]
    fn surfaces_api_error_message() {
        let err = extract_text(parse(r#"{"error":{"code":429,"message":"quota"}}"#)).unwrap_err();
        assert!(err.to_string().contains("quota"));
    }

    #[test]
    fn debug_hides_client_state() {
        let generator = VertexGenerator::new(VertexConfig {
            project_id: "demo".into(),
            location: "us-central1".into(),
            model: "gemini-1.5-flash".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        let debug = format!("{generator:?}");
        assert!(debug.contains("projects/demo"));
        assert_eq!(generator.name(), "vertex");
    }
}
