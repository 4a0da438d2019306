//! Domain records shared by the coach, the check-in logic, and the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user, keyed by the identity provider's uid.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub firebase_uid: String,
    pub email: String,
    pub name: Option<String>,
}

/// Food preferences collected during onboarding.
///
/// Field order here is the onboarding question order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    #[serde(default)]
    pub food_allergies: Option<String>,
    #[serde(default)]
    pub foods_dislike: Option<String>,
    #[serde(default)]
    pub foods_like: Option<String>,
    #[serde(default)]
    pub meals_per_day: Option<u32>,
    #[serde(default)]
    pub meal_preference: Option<String>,
    #[serde(default)]
    pub goals: Option<String>,
    #[serde(default)]
    pub bad_habits: Option<String>,
    #[serde(default)]
    pub body_scan_info: Option<String>,
    #[serde(default)]
    pub onboarding_complete: bool,
}

impl Preferences {
    /// Collapse empty strings to `None` so "answered" checks stay uniform.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.food_allergies,
            &mut self.foods_dislike,
            &mut self.foods_like,
            &mut self.meal_preference,
            &mut self.goals,
            &mut self.bad_habits,
            &mut self.body_scan_info,
        ] {
            if field.as_deref().is_some_and(str::is_empty) {
                *field = None;
            }
        }
        self
    }
}

/// Points and streak counters. Only a check-in mutates these.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    pub points: u32,
    pub streak: u32,
    #[serde(default)]
    pub last_check_in_date: Option<NaiveDate>,
}

/// One logged check-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressEntry {
    pub id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub meals_logged: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ProgressEntry {
    pub fn new(date: NaiveDate, meals_logged: Option<String>, notes: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            meals_logged,
            notes,
        }
    }
}

/// An earned reward badge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Badge {
    pub id: Uuid,
    pub badge_name: String,
    #[serde(default)]
    pub badge_description: Option<String>,
    pub earned_at: DateTime<Utc>,
}

/// A stored weekly meal plan. `plan_data` is opaque client JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MealPlan {
    pub id: Uuid,
    pub week_start_date: NaiveDate,
    pub plan_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Date format used on the wire and in the database.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_drops_empty_strings() {
        let prefs = Preferences {
            food_allergies: Some(String::new()),
            foods_like: Some("salmon".into()),
            body_scan_info: Some(String::new()),
            ..Default::default()
        }
        .normalized();
        assert!(prefs.food_allergies.is_none());
        assert_eq!(prefs.foods_like.as_deref(), Some("salmon"));
        assert!(prefs.body_scan_info.is_none());
    }

    #[test]
    fn preferences_deserialize_partial_payload() {
        let prefs: Preferences = serde_json::from_str(
            r#"{"food_allergies":"nuts","meals_per_day":4,"user_id":7}"#,
        )
        .unwrap();
        assert_eq!(prefs.food_allergies.as_deref(), Some("nuts"));
        assert_eq!(prefs.meals_per_day, Some(4));
        assert!(!prefs.onboarding_complete);
    }

    #[test]
    fn stats_serialize_date_as_iso() {
        let stats = Stats {
            points: 20,
            streak: 2,
            last_check_in_date: Some(NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()),
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["last_check_in_date"], "2026-03-09");
    }

    #[test]
    fn user_hides_firebase_uid() {
        let user = User {
            id: Uuid::new_v4(),
            firebase_uid: "abc".into(),
            email: "a@example.com".into(),
            name: None,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("firebase_uid").is_none());
        assert_eq!(json["email"], "a@example.com");
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("2026-02-30").is_err());
        assert!(parse_date("yesterday").is_err());
        assert_eq!(
            parse_date("2026-01-05").unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
        );
    }
}
