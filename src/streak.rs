//! Completion and streak rules for goals.
//!
//! All functions here are pure over a goal and a calendar date, so they can be
//! driven by the CLI, the loader and tests alike. Days are compared by their
//! year/month/day components only.
use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone};
use log::{debug, trace};

use crate::Goal;

/// Outcome of a completion change, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionChange {
    pub completed: bool,
    pub streak_before: u32,
    pub streak_after: u32,
}

/// True when both values fall on the same calendar day.
pub fn is_same_day(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month() && a.day() == b.day()
}

/// Same-day check for timestamps, in the timezone they carry.
pub fn is_same_calendar_day<Tz: TimeZone>(a: &DateTime<Tz>, b: &DateTime<Tz>) -> bool {
    is_same_day(a.date_naive(), b.date_naive())
}

fn completed_on(goal: &Goal, day: NaiveDate) -> bool {
    goal.last_completed_date
        .is_some_and(|last| is_same_day(last, day))
}

/// Flips the completion state of a goal as of `today`.
pub fn toggle_completion(goal: &mut Goal, today: NaiveDate) -> CompletionChange {
    let target = !goal.completed;
    set_completed(goal, target, today)
}

/// Moves a goal to the requested completion state as of `today`.
///
/// Non-recurring goals only change their flag. For recurring goals a completion
/// counts toward the streak at most once per day: completing an already counted
/// goal is a no-op, and undoing a completion made today takes the point back.
pub fn set_completed(goal: &mut Goal, completed: bool, today: NaiveDate) -> CompletionChange {
    let streak_before = goal.streak;

    if !goal.is_recurring {
        goal.completed = completed;
        return CompletionChange {
            completed,
            streak_before,
            streak_after: goal.streak,
        };
    }

    if completed {
        let counted_today = goal.completed && completed_on(goal, today);
        if counted_today {
            trace!("Goal {} already counted for {}", goal.id, today);
        } else {
            goal.streak += 1;
            goal.last_completed_date = Some(today);
        }
        goal.completed = true;
    } else {
        if goal.completed && completed_on(goal, today) {
            goal.streak = goal.streak.saturating_sub(1);
        }
        goal.completed = false;
    }

    debug!(
        "Goal {} completion -> {}, streak {} -> {}",
        goal.id, goal.completed, streak_before, goal.streak
    );

    CompletionChange {
        completed: goal.completed,
        streak_before,
        streak_after: goal.streak,
    }
}

/// The most recent day before `today` on which a recurring goal was scheduled.
pub fn previous_scheduled_day(goal: &Goal, today: NaiveDate) -> Option<NaiveDate> {
    if !goal.is_recurring {
        return None;
    }
    (1..=7u64)
        .filter_map(|offset| today.checked_sub_days(Days::new(offset)))
        .find(|day| goal.is_scheduled_on(*day))
}

/// Brings a stored goal up to date when it is loaded on `today`.
///
/// A recurring goal completed on an earlier day becomes incomplete again, and
/// its streak drops to zero when the last scheduled day before today passed
/// without a completion. One-off goals never carry a streak. Returns whether
/// anything changed.
pub fn refresh_on_load(goal: &mut Goal, today: NaiveDate) -> bool {
    if !goal.is_recurring {
        if goal.streak == 0 {
            return false;
        }
        debug!("Goal {} is not recurring, clearing streak of {}", goal.id, goal.streak);
        goal.streak = 0;
        return true;
    }

    let mut changed = false;

    if goal.completed && !completed_on(goal, today) {
        goal.completed = false;
        changed = true;
    }

    if let Some(scheduled) = previous_scheduled_day(goal, today) {
        let kept_up = goal
            .last_completed_date
            .is_some_and(|last| last >= scheduled);
        if !kept_up && goal.streak > 0 {
            debug!(
                "Goal {} missed scheduled day {}, resetting streak of {}",
                goal.id, scheduled, goal.streak
            );
            goal.streak = 0;
            changed = true;
        }
    }

    changed
}
