//! Calendar views over the goal list.
use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::{Goal, NovaError, Result};

/// Why a goal shows up on a calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarReason {
    /// Recurring goal scheduled on that weekday
    Scheduled,
    /// Deadline falls on that day (UTC)
    Deadline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEntry {
    pub goal: Goal,
    pub reason: CalendarReason,
}

/// Goals scheduled on `date` followed by goals due that day.
///
/// A recurring goal that is also due that day is listed once, as scheduled.
pub fn goals_on(goals: &[Goal], date: NaiveDate) -> Vec<CalendarEntry> {
    let mut entries: Vec<CalendarEntry> = goals
        .iter()
        .filter(|g| g.is_scheduled_on(date))
        .map(|g| CalendarEntry {
            goal: g.clone(),
            reason: CalendarReason::Scheduled,
        })
        .collect();

    for goal in goals {
        let due_today = goal
            .deadline_at()
            .is_some_and(|deadline| deadline.date_naive() == date);
        if due_today && !goal.is_scheduled_on(date) {
            entries.push(CalendarEntry {
                goal: goal.clone(),
                reason: CalendarReason::Deadline,
            });
        }
    }
    entries
}

/// Every day of the month that has at least one goal, with its entries.
pub fn month_view(goals: &[Goal], year: i32, month: u32) -> Result<BTreeMap<NaiveDate, Vec<CalendarEntry>>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        NovaError::validation(format!("{}-{:02} is not a valid month", year, month))
    })?;

    let mut view = BTreeMap::new();
    let days = first.iter_days().take_while(|d| d.month() == month);
    for day in days {
        let entries = goals_on(goals, day);
        if !entries.is_empty() {
            view.insert(day, entries);
        }
    }
    Ok(view)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;

    use super::*;
    use crate::NewGoal;

    fn goal(id: i64, wish: &str, days: Option<BTreeSet<u8>>, deadline: Option<&str>) -> Goal {
        let mut goal = Goal::new(
            NewGoal {
                wish: wish.to_string(),
                recurring_days: days,
                deadline: deadline.map(str::to_string),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        goal.id = id;
        goal
    }

    #[test]
    fn day_lists_scheduled_and_due_goals() {
        let monday = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let goals = vec![
            goal(1, "Gym", Some([1, 3].into_iter().collect()), None),
            goal(2, "Report", None, Some("2024-05-06T17:00")),
            goal(3, "Read", Some(BTreeSet::new()), Some("2024-05-06")),
            goal(4, "Swim", Some([2].into_iter().collect()), None),
        ];

        let entries = goals_on(&goals, monday);
        let ids: Vec<(i64, CalendarReason)> =
            entries.iter().map(|e| (e.goal.id, e.reason)).collect();
        assert_eq!(
            ids,
            vec![
                (1, CalendarReason::Scheduled),
                (3, CalendarReason::Scheduled),
                (2, CalendarReason::Deadline),
            ]
        );
    }

    #[test]
    fn month_view_only_keeps_busy_days() {
        let goals = vec![
            goal(1, "Sunday review", Some([0].into_iter().collect()), None),
            goal(2, "Tax day", None, Some("2024-02-29")),
        ];
        let view = month_view(&goals, 2024, 2).unwrap();
        // Sundays in February 2024: 4, 11, 18, 25; plus the deadline on the 29th
        assert_eq!(view.len(), 5);
        assert!(view.contains_key(&NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(month_view(&goals, 2024, 13).is_err());
    }
}
