//! Check-ins: points, streaks, and badges.

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use crate::coach::replies::CONSISTENCY_STREAK;
use crate::error::DatabaseError;
use crate::model::{ProgressEntry, Stats};
use crate::store::Database;

/// Points granted per check-in.
pub const CHECK_IN_POINTS: u32 = 10;

pub const CONSISTENCY_BADGE: &str = "Consistency King";
const CONSISTENCY_BADGE_DESCRIPTION: &str = "7-day streak!";

/// Stats after a check-in on `today`.
///
/// Consecutive days extend the streak, a gap resets it to 1, and a repeat
/// check-in on the same day (or a clock that moved backwards) keeps it.
pub fn apply_check_in(previous: Option<&Stats>, today: NaiveDate) -> Stats {
    let Some(prev) = previous else {
        return Stats {
            points: CHECK_IN_POINTS,
            streak: 1,
            last_check_in_date: Some(today),
        };
    };

    let streak = match prev.last_check_in_date {
        None => 1,
        Some(last) => match (today - last).num_days() {
            1 => prev.streak.saturating_add(1),
            d if d > 1 => 1,
            _ => prev.streak,
        },
    };

    Stats {
        points: prev.points.saturating_add(CHECK_IN_POINTS),
        streak,
        last_check_in_date: Some(today),
    }
}

/// Outcome of [`record_check_in`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckIn {
    pub entry: ProgressEntry,
    pub stats: Stats,
    /// Badges newly earned by this check-in.
    pub new_badges: Vec<String>,
}

/// Log a progress entry, then update stats and award any earned badges.
///
/// `date` is the day the meals belong to; `today` drives the streak.
pub async fn record_check_in(
    db: &dyn Database,
    user_id: Uuid,
    date: NaiveDate,
    meals_logged: Option<String>,
    notes: Option<String>,
    today: NaiveDate,
) -> Result<CheckIn, DatabaseError> {
    let entry = ProgressEntry::new(date, meals_logged, notes);
    db.add_progress_entry(user_id, &entry).await?;

    let previous = db.get_stats(user_id).await?;
    let stats = apply_check_in(previous.as_ref(), today);
    db.update_stats(user_id, &stats).await?;

    let mut new_badges = Vec::new();
    if stats.streak >= CONSISTENCY_STREAK
        && db
            .award_badge(user_id, CONSISTENCY_BADGE, Some(CONSISTENCY_BADGE_DESCRIPTION))
            .await?
    {
        info!(%user_id, badge = CONSISTENCY_BADGE, "Badge earned");
        new_badges.push(CONSISTENCY_BADGE.to_string());
    }

    info!(%user_id, points = stats.points, streak = stats.streak, "Check-in recorded");
    Ok(CheckIn {
        entry,
        stats,
        new_badges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    fn stats(points: u32, streak: u32, last: Option<NaiveDate>) -> Stats {
        Stats {
            points,
            streak,
            last_check_in_date: last,
        }
    }

    #[test]
    fn first_check_in() {
        assert_eq!(apply_check_in(None, day(1)), stats(10, 1, Some(day(1))));
        // Zeroed row from signup.
        assert_eq!(
            apply_check_in(Some(&Stats::default()), day(1)),
            stats(10, 1, Some(day(1)))
        );
    }

    #[test]
    fn consecutive_day_extends() {
        let prev = stats(30, 3, Some(day(4)));
        assert_eq!(apply_check_in(Some(&prev), day(5)), stats(40, 4, Some(day(5))));
    }

    #[test]
    fn gap_resets() {
        let prev = stats(30, 3, Some(day(4)));
        assert_eq!(apply_check_in(Some(&prev), day(7)), stats(40, 1, Some(day(7))));
    }

    #[test]
    fn same_day_keeps_streak() {
        let prev = stats(30, 3, Some(day(4)));
        assert_eq!(apply_check_in(Some(&prev), day(4)), stats(40, 3, Some(day(4))));
    }

    #[test]
    fn backwards_clock_keeps_streak() {
        let prev = stats(30, 3, Some(day(4)));
        assert_eq!(apply_check_in(Some(&prev), day(2)), stats(40, 3, Some(day(2))));
    }

    #[tokio::test]
    async fn record_check_in_persists() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let user = db.get_or_create_user("uid", "u@example.com", None).await.unwrap();

        let result = record_check_in(&db, user.id, day(3), Some("salad".into()), None, day(3))
            .await
            .unwrap();
        assert_eq!(result.stats, stats(10, 1, Some(day(3))));
        assert!(result.new_badges.is_empty());

        assert_eq!(db.get_stats(user.id).await.unwrap(), Some(result.stats));
        let entries = db.list_progress_entries(user.id, 30).await.unwrap();
        assert_eq!(entries, vec![result.entry]);
    }

    #[tokio::test]
    async fn badge_awarded_once_at_seven() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let user = db.get_or_create_user("uid", "u@example.com", None).await.unwrap();

        for d in 1..=6 {
            let r = record_check_in(&db, user.id, day(d), None, None, day(d)).await.unwrap();
            assert!(r.new_badges.is_empty(), "day {d}");
        }
        let seventh = record_check_in(&db, user.id, day(7), None, None, day(7)).await.unwrap();
        assert_eq!(seventh.stats.streak, 7);
        assert_eq!(seventh.new_badges, vec![CONSISTENCY_BADGE.to_string()]);

        let eighth = record_check_in(&db, user.id, day(8), None, None, day(8)).await.unwrap();
        assert!(eighth.new_badges.is_empty());
        assert_eq!(db.list_badges(user.id).await.unwrap().len(), 1);
    }
}
