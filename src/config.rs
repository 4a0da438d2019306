//! Configuration types, read once from the environment at startup.

use std::time::Duration;

use crate::error::ConfigError;

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// libSQL database file path (`:memory:` for an in-memory database).
    pub database_path: String,
    pub firebase: FirebaseConfig,
    pub coach: CoachConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_lookup(&lookup)?,
            database_path: lookup("MEAL_COACH_DB_PATH")
                .unwrap_or_else(|| "./data/meal-coach.db".to_string()),
            firebase: FirebaseConfig::from_lookup(&lookup),
            coach: CoachConfig::from_lookup(&lookup)?,
        })
    }
}

// ── Server ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

impl ServerConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", lookup("PORT"), defaults.port)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Identity ────────────────────────────────────────────────────────

/// Firebase token verification settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirebaseConfig {
    /// Project id tokens must be issued for. `None` disables verification.
    pub project_id: Option<String>,
}

impl FirebaseConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            project_id: project_id(&lookup),
        }
    }
}

// ── Coach ───────────────────────────────────────────────────────────

/// Coach engine settings. The generative fallback is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoachConfig {
    /// Set only when the feature flag is on and a project is known.
    pub vertex: Option<VertexConfig>,
    /// Upper bound on a single fallback call.
    pub fallback_timeout: Duration,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            vertex: None,
            fallback_timeout: Duration::from_secs(5),
        }
    }
}

impl CoachConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let timeout_secs: u64 = parse_or("VERTEX_AI_TIMEOUT_SECS", lookup("VERTEX_AI_TIMEOUT_SECS"), 5)?;
        let fallback_timeout = Duration::from_secs(timeout_secs);

        let enabled = lookup("VERTEX_AI_ENABLED")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1"))
            .unwrap_or(false);

        let vertex = match (enabled, project_id(&lookup)) {
            (true, Some(project_id)) => Some(VertexConfig {
                project_id,
                location: lookup("VERTEX_AI_LOCATION")
                    .unwrap_or_else(|| "us-central1".to_string()),
                model: lookup("VERTEX_AI_MODEL")
                    .unwrap_or_else(|| "gemini-1.5-flash".to_string()),
                timeout: fallback_timeout,
            }),
            _ => None,
        };

        Ok(Self {
            vertex,
            fallback_timeout,
        })
    }
}

/// Vertex AI endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexConfig {
    pub project_id: String,
    pub location: String,
    pub model: String,
    pub timeout: Duration,
}

impl VertexConfig {
    pub fn endpoint(&self) -> String {
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:generateContent",
            loc = self.location,
            project = self.project_id,
            model = self.model,
        )
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// First non-empty of the GCP project variables.
fn project_id(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    ["GCLOUD_PROJECT", "GCP_PROJECT", "FIREBASE_PROJECT_ID"]
        .into_iter()
        .filter_map(&lookup)
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(s) if s.trim().is_empty() => Ok(default),
        Some(s) => s.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{s:?}: {e}"),
        }),
    }
}
