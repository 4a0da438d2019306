//! Prompt construction for the generative fallback.

use crate::coach::CoachTurn;
use crate::model::ProgressEntry;

const PERSONA: &[&str] = &[
    "You are a friendly nutrition coach for the Porygon Meal Planner app.",
    "Keep responses concise, supportive, and practical.",
];

/// Check-ins included in the prompt context.
const PROMPT_ACTIVITY: usize = 5;

/// Build the single-turn prompt sent to the external generator.
pub fn build_prompt(turn: &CoachTurn<'_>) -> String {
    let mut context: Vec<String> = PERSONA.iter().map(|s| s.to_string()).collect();

    let onboarded = turn.preferences.is_some_and(|p| p.onboarding_complete);
    if !onboarded {
        context.push("The user is in onboarding; help collect preferences.".to_string());
    }
    if let Some(stats) = turn.stats {
        context.push(format!(
            "User stats: {} points, {} day streak.",
            stats.points, stats.streak
        ));
    }
    if !turn.recent_activity.is_empty() {
        context.push(format!(
            "Recent check-ins: {}",
            render_activity(turn.recent_activity)
        ));
    }

    format!("{}\n\nUser: {}\nCoach:", context.join("\n"), turn.message)
}

fn render_activity(entries: &[ProgressEntry]) -> String {
    entries
        .iter()
        .take(PROMPT_ACTIVITY)
        .map(|e| match e.meals_logged.as_deref().filter(|m| !m.is_empty()) {
            Some(meals) => format!("{} ({meals})", e.date),
            None => e.date.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
