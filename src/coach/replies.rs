//! Reply generators, one per intent.
//!
//! Each generator is a pure function of the data it needs plus, for the
//! ones that open with an encouraging phrase, a single random draw.

use std::fmt::Write as _;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::model::{Preferences, ProgressEntry, Stats};

pub const ENCOURAGING_MESSAGES: &[&str] = &[
    "You're doing amazing! 💪✨",
    "Every step forward counts! 🌟",
    "I'm so proud of your progress! 🎉",
    "You've got this! Keep going! 💚",
    "Your dedication is inspiring! 🌈",
    "Small changes lead to big results! 🚀",
    "You're building healthier habits every day! 🌱",
];

const SUGAR_ALTERNATIVES: &[&str] = &[
    "Try fresh fruit instead of sugary snacks",
    "Use honey or maple syrup in moderation",
    "Dark chocolate (70%+) satisfies sweet cravings",
    "Frozen grapes are a great sweet treat",
];

const PROCESSED_ALTERNATIVES: &[&str] = &[
    "Choose whole foods over processed options",
    "Prepare meals at home when possible",
    "Read labels and avoid ingredients you can't pronounce",
];

const FAST_FOOD_ALTERNATIVES: &[&str] = &[
    "Meal prep on weekends for quick healthy meals",
    "Keep healthy snacks ready for when hunger strikes",
    "Try making your favorite fast food at home",
];

const WEEK1: &str = "Week 1: You may feel some adjustment as your body adapts to new eating patterns. Stay hydrated!";
const WEEK2: &str = "Week 2: Many people start noticing increased energy levels and better mood stability.";
const WEEK3: &str = "Week 3: Your taste buds will start adapting, and you may crave healthier foods naturally.";
const WEEK4: &str = "Week 4: Congratulations! You'll hit your first month milestone - a huge achievement!";
const MONTH2: &str = "Month 2: You'll likely see more consistent energy and improved sleep quality.";
const MONTH3: &str = "Month 3: Your new habits will feel more automatic, and you'll see clearer progress toward your goals.";

/// Streak at which the "Consistency King" badge unlocks.
pub const CONSISTENCY_STREAK: u32 = 7;

/// Entries shown in a progress summary.
const PROGRESS_PREVIEW: usize = 5;

pub const GROCERY_REPLY: &str = "Perfect! I've prepared your grocery list for this week! 🛒\n\nHead to the 'Grocery List' tab to see everything organized by category. I've calculated the exact quantities you need for your meal plan, so there's no waste. You can check off items as you shop!\n\nPro tip: Shopping on Sunday or Monday can help you prep for the week ahead!";

pub const HELP_REPLY: &str = "I'm here to make your nutrition journey easy and fun! Here's what I can do for you:\n\n🍽️ Create personalized meal plans\n🛒 Generate organized grocery lists\n📊 Track your progress & goals\n🏆 Celebrate your wins with rewards\n📅 Show you what to expect in upcoming weeks\n💪 Provide motivation and support\n🌱 Suggest healthier alternatives to bad habits\n📝 Check in with you about your meals\n\nJust ask me anything! Whether you need a new meal plan, want to check your progress, or need some encouragement - I'm here for you!";

/// One random pick from [`ENCOURAGING_MESSAGES`].
pub fn encouraging_message<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    ENCOURAGING_MESSAGES
        .choose(rng)
        .copied()
        .unwrap_or(ENCOURAGING_MESSAGES[0])
}

fn streak(stats: Option<&Stats>) -> u32 {
    stats.map_or(0, |s| s.streak)
}

fn points(stats: Option<&Stats>) -> u32 {
    stats.map_or(0, |s| s.points)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

pub fn check_in_reply<R: Rng + ?Sized>(stats: Option<&Stats>, rng: &mut R) -> String {
    let mut out = format!(
        "{}\n\nThanks for checking in! I've logged your meals. ",
        encouraging_message(rng)
    );
    let streak = streak(stats);
    if streak > 0 {
        let _ = write!(out, "You're on a {streak}-day streak - that's incredible! 🌟\n\n");
    }
    out.push_str(
        "Keep tracking your meals to see your progress. Would you like me to:\n• Create a meal plan for the week?\n• Suggest healthier alternatives?\n• Show you your progress?",
    );
    out
}

pub fn progress_reply(stats: Option<&Stats>, recent: &[ProgressEntry]) -> String {
    let mut out = format!(
        "Here's your progress! 📊\n\n🌟 Points: {}\n🔥 Streak: {} days\n\n",
        points(stats),
        streak(stats)
    );
    if recent.is_empty() {
        out.push_str("Start tracking your meals to see your progress here!");
    } else {
        out.push_str("Recent check-ins:\n");
        for entry in recent.iter().take(PROGRESS_PREVIEW) {
            let meals = non_empty(&entry.meals_logged).unwrap_or("Logged meals");
            let _ = writeln!(out, "• {}: {meals}", entry.date);
        }
    }
    out
}

/// Expectation text for a 1-based week number.
fn timeline_text(week: u32) -> Option<&'static str> {
    match week {
        1 => Some(WEEK1),
        2 => Some(WEEK2),
        3 => Some(WEEK3),
        4 => Some(WEEK4),
        w if w >= 8 => Some(MONTH2),
        // Unreachable: the arm above matches first.
        w if w >= 12 => Some(MONTH3),
        _ => None,
    }
}

pub fn timeline_reply(stats: Option<&Stats>) -> String {
    let streak = streak(stats);
    let week = streak / 7 + 1;
    let mut out = String::from("Great question! Here's what you can expect: 📅\n\n");
    if let Some(text) = timeline_text(week) {
        out.push_str(text);
        out.push_str("\n\n");
    }
    let _ = write!(
        out,
        "You're currently on day {streak} of your journey. Keep going - you're doing great! 💪"
    );
    out
}

pub fn alternatives_reply(preferences: Option<&Preferences>) -> String {
    let habits = preferences
        .and_then(|p| p.bad_habits.as_deref())
        .unwrap_or_default()
        .to_lowercase();

    let mut out = String::from("I'm here to help you make gradual, sustainable changes! 🌱\n\n");
    let blocks: [(bool, &str, &[&str]); 3] = [
        (habits.contains("sugar"), "For reducing sugar:\n", SUGAR_ALTERNATIVES),
        (
            habits.contains("processed"),
            "For avoiding processed foods:\n",
            PROCESSED_ALTERNATIVES,
        ),
        (
            habits.contains("fast food") || habits.contains("fast-food"),
            "For reducing fast food:\n",
            FAST_FOOD_ALTERNATIVES,
        ),
    ];
    for (matched, header, alternatives) in blocks {
        if !matched {
            continue;
        }
        out.push_str(header);
        for alt in alternatives {
            let _ = writeln!(out, "• {alt}");
        }
        out.push('\n');
    }
    out.push_str(
        "Remember: gradual change is sustainable change. We'll work on this together, one step at a time! 💚",
    );
    out
}

pub fn encouragement_reply<R: Rng + ?Sized>(stats: Option<&Stats>, rng: &mut R) -> String {
    let mut out = format!(
        "{}\n\nEvery healthy choice you make is an investment in your future self. ",
        encouraging_message(rng)
    );
    let streak = streak(stats);
    if streak > 0 {
        let _ = write!(
            out,
            "Your {streak}-day streak shows real commitment, and I'm so proud of you! "
        );
    }
    out.push_str("\n\nRemember: progress isn't always linear, but consistency is key. ");
    out.push_str(
        "You've already proven you have what it takes by showing up every single day.\n\n",
    );
    out.push_str("Your body is getting stronger, your habits are becoming automatic, ");
    out.push_str("and you're building a healthier, happier you. Keep going - you've got this! 🌟");
    out
}

pub fn meal_plan_reply(preferences: Option<&Preferences>) -> String {
    let mut out = String::from(
        "I've created a delicious and balanced meal plan for you! 🍽️\n\nCheck out the 'Meal Plan' tab to see your weekly menu. ",
    );
    if let Some(prefs) = preferences {
        if let Some(likes) = non_empty(&prefs.foods_like) {
            let _ = write!(out, "I've included your favorite foods ({likes}) ");
        }
        if let Some(allergies) = non_empty(&prefs.food_allergies) {
            let _ = write!(out, "and made sure to avoid your allergies ({allergies}). ");
        }
    }
    out.push_str(
        "Each meal is designed to provide optimal nutrition while being easy to prepare. Would you like me to adjust anything?",
    );
    out
}

pub fn grocery_reply() -> String {
    GROCERY_REPLY.to_string()
}

pub fn rewards_reply(stats: Option<&Stats>) -> String {
    let streak = streak(stats);
    let mut out = format!(
        "You're crushing it! 🌟\n\nYou've earned {} points and maintained a {streak}-day streak - that's incredible! ",
        points(stats)
    );
    if streak >= CONSISTENCY_STREAK {
        out.push_str("You've unlocked the 'Consistency King' badge! 🏆\n\n");
    }
    out.push_str(
        "Keep going and you'll unlock more badges! Your dedication is truly inspiring. What would you like to focus on this week?",
    );
    out
}

pub fn help_reply() -> String {
    HELP_REPLY.to_string()
}

pub fn default_reply<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "{}\n\nI'm here to help you with:\n\n• Creating personalized meal plans\n• Tracking your progress\n• Providing motivation and support\n• Answering questions about your health journey\n\nWhat would you like to focus on today? 😊",
        encouraging_message(rng)
    )
}
