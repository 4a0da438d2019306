//! Coach dialogue engine.
//!
//! Turns one user message plus the user's stored context into one reply:
//!
//! 1. If a generative fallback is configured, ask it first and use any
//!    non-empty answer.
//! 2. Otherwise, while onboarding is incomplete, drive the onboarding
//!    interview.
//! 3. Otherwise classify the message by keyword and run the matching
//!    reply generator.
//!
//! The engine holds no per-user state; everything it needs arrives in a
//! [`CoachTurn`].

pub mod intent;
pub mod onboarding;
pub mod prompt;
pub mod replies;

pub use intent::{Intent, classify};
pub use onboarding::{OnboardingField, OnboardingStep, apply_answer, current_step};

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::CoachConfig;
use crate::error::LlmError;
use crate::llm::{self, TextGenerator};
use crate::model::{Preferences, ProgressEntry, Stats};

/// Everything the engine sees for a single reply.
#[derive(Debug, Clone, Copy)]
pub struct CoachTurn<'a> {
    pub message: &'a str,
    pub preferences: Option<&'a Preferences>,
    pub stats: Option<&'a Stats>,
    /// Newest first.
    pub recent_activity: &'a [ProgressEntry],
}

impl<'a> CoachTurn<'a> {
    /// A turn with no stored context.
    pub fn new(message: &'a str) -> Self {
        Self {
            message,
            preferences: None,
            stats: None,
            recent_activity: &[],
        }
    }

    pub fn with_preferences(mut self, preferences: Option<&'a Preferences>) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_stats(mut self, stats: Option<&'a Stats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_activity(mut self, recent_activity: &'a [ProgressEntry]) -> Self {
        self.recent_activity = recent_activity;
        self
    }

    fn onboarding_complete(&self) -> bool {
        self.preferences.is_some_and(|p| p.onboarding_complete)
    }
}

/// Rule-based coach with an optional generative fallback.
#[derive(Clone)]
pub struct CoachEngine {
    generator: Option<Arc<dyn TextGenerator>>,
    fallback_timeout: Duration,
}

impl CoachEngine {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, fallback_timeout: Duration) -> Self {
        Self {
            generator,
            fallback_timeout,
        }
    }

    /// Engine with no fallback.
    pub fn rule_based() -> Self {
        Self::new(None, CoachConfig::default().fallback_timeout)
    }

    /// Build from config. A generator that cannot be constructed is logged
    /// and the engine runs rule-based only.
    pub fn from_config(config: &CoachConfig) -> Self {
        let generator = config.vertex.as_ref().and_then(|vertex| {
            llm::create_generator(vertex)
                .map_err(|e| warn!(error = %e, "Vertex AI unavailable, using rule-based coach"))
                .ok()
        });
        Self::new(generator, config.fallback_timeout)
    }

    pub fn has_fallback(&self) -> bool {
        self.generator.is_some()
    }

    /// Produce a reply using the thread RNG for phrase selection.
    pub async fn generate_reply(&self, turn: &CoachTurn<'_>) -> String {
        if let Some(reply) = self.try_fallback(turn).await {
            return reply;
        }
        rule_based_reply(turn, &mut rand::thread_rng())
    }

    /// Produce a reply with a caller-supplied RNG.
    pub async fn generate_reply_with_rng<R: Rng + Send + ?Sized>(
        &self,
        turn: &CoachTurn<'_>,
        rng: &mut R,
    ) -> String {
        if let Some(reply) = self.try_fallback(turn).await {
            return reply;
        }
        rule_based_reply(turn, rng)
    }

    /// Ask the fallback generator, if any. `None` means "use the rules".
    async fn try_fallback(&self, turn: &CoachTurn<'_>) -> Option<String> {
        let generator = self.generator.as_ref()?;
        let prompt = prompt::build_prompt(turn);

        let result = match tokio::time::timeout(self.fallback_timeout, generator.generate(&prompt)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                provider: generator.name().to_string(),
                timeout: self.fallback_timeout,
            }),
        };

        match result {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    warn!(provider = generator.name(), "Fallback returned empty text");
                    None
                } else {
                    debug!(provider = generator.name(), "Using fallback reply");
                    Some(text.to_string())
                }
            }
            Err(e) => {
                warn!(provider = generator.name(), error = %e, "Fallback failed, using rules");
                None
            }
        }
    }
}

impl std::fmt::Debug for CoachEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoachEngine")
            .field("generator", &self.generator.as_ref().map(|g| g.name().to_string()))
            .field("fallback_timeout", &self.fallback_timeout)
            .finish()
    }
}

/// The deterministic-given-RNG rule path.
pub fn rule_based_reply<R: Rng + ?Sized>(turn: &CoachTurn<'_>, rng: &mut R) -> String {
    if !turn.onboarding_complete() {
        let empty = Preferences::default();
        let prefs = turn.preferences.unwrap_or(&empty);
        return onboarding::onboarding_reply(turn.message, prefs);
    }

    match classify(turn.message) {
        Intent::CheckIn => replies::check_in_reply(turn.stats, rng),
        Intent::ProgressTracking => replies::progress_reply(turn.stats, turn.recent_activity),
        Intent::Timeline => replies::timeline_reply(turn.stats),
        Intent::Alternatives => replies::alternatives_reply(turn.preferences),
        Intent::Encouragement => replies::encouragement_reply(turn.stats, rng),
        Intent::MealPlan => replies::meal_plan_reply(turn.preferences),
        Intent::Grocery => replies::grocery_reply(),
        Intent::Rewards => replies::rewards_reply(turn.stats),
        Intent::Help => replies::help_reply(),
        Intent::Default => replies::default_reply(rng),
    }
}
