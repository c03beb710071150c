//! Core data structures for the Nova planner.
//!
//! A goal follows the WOOP structure (wish, outcome, obstacle, plan). Goals can
//! recur on chosen weekdays, carry a deadline, live inside a folder and be shared
//! with collaborators. The JSON shape (camelCase keys) is the one used by exports,
//! share links and the local store.
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{NovaError, Result};

/// Access level granted to a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Editor,
}

impl Role {
    pub fn can_edit(self) -> bool {
        matches!(self, Role::Editor)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Editor => "editor",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = NovaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "editor" => Ok(Role::Editor),
            other => Err(NovaError::validation(format!(
                "Unknown role '{}': expected viewer or editor",
                other
            ))),
        }
    }
}

/// A user granted access to a goal or folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub user_id: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
}

/// Represents a single WOOP goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    /// Timestamp-derived unique identifier
    pub id: i64,
    /// What the user wants to achieve
    pub wish: String,
    /// The best outcome of fulfilling the wish
    #[serde(default)]
    pub outcome: String,
    /// The main inner obstacle
    #[serde(default)]
    pub obstacle: String,
    /// If-then plan to overcome the obstacle
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub is_recurring: bool,
    /// Weekday indices, 0 = Sunday. Empty means every day.
    #[serde(default)]
    pub recurring_days: BTreeSet<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, deserialize_with = "deserialize_calendar_date")]
    pub last_completed_date: Option<NaiveDate>,
    #[serde(default)]
    pub streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaborators: Option<Vec<Collaborator>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_with: Option<BTreeMap<String, Role>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Optional fields supplied when creating a goal
#[derive(Debug, Clone, Default)]
pub struct NewGoal {
    pub wish: String,
    pub outcome: String,
    pub obstacle: String,
    pub plan: String,
    pub recurring_days: Option<BTreeSet<u8>>,
    pub deadline: Option<String>,
    pub folder_id: Option<i64>,
    pub category: Option<String>,
}

/// Partial update applied by the edit operation. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct GoalEdit {
    pub wish: Option<String>,
    pub outcome: Option<String>,
    pub obstacle: Option<String>,
    pub plan: Option<String>,
    /// `Some(None)` clears the deadline
    pub deadline: Option<Option<String>>,
    /// `Some(None)` turns recurrence off
    pub recurring_days: Option<Option<BTreeSet<u8>>>,
    pub category: Option<Option<String>>,
    pub folder_id: Option<Option<i64>>,
}

impl Goal {
    /// Creates a new goal from the given draft, using `now` for the id and creation time.
    pub fn new(draft: NewGoal, now: DateTime<Utc>) -> Result<Self> {
        if draft.wish.trim().is_empty() {
            return Err(NovaError::validation("A goal needs a wish"));
        }
        if let Some(days) = &draft.recurring_days {
            validate_weekdays(days)?;
        }
        if let Some(deadline) = draft.deadline.as_deref() {
            validate_deadline(deadline)?;
        }

        Ok(Goal {
            id: now.timestamp_millis(),
            wish: draft.wish.trim().to_string(),
            outcome: draft.outcome,
            obstacle: draft.obstacle,
            plan: draft.plan,
            is_recurring: draft.recurring_days.is_some(),
            recurring_days: draft.recurring_days.unwrap_or_default(),
            deadline: draft.deadline.filter(|d| !d.trim().is_empty()),
            completed: false,
            last_completed_date: None,
            streak: 0,
            folder_id: draft.folder_id,
            category: draft.category.filter(|c| !c.trim().is_empty()),
            collaborators: None,
            shared_with: None,
            created_at: now,
        })
    }

    /// Applies an edit to the free-text fields, deadline, recurrence and placement.
    pub fn apply_edit(&mut self, edit: GoalEdit) -> Result<()> {
        if let Some(wish) = edit.wish {
            if wish.trim().is_empty() {
                return Err(NovaError::validation("A goal needs a wish"));
            }
            self.wish = wish.trim().to_string();
        }
        if let Some(outcome) = edit.outcome {
            self.outcome = outcome;
        }
        if let Some(obstacle) = edit.obstacle {
            self.obstacle = obstacle;
        }
        if let Some(plan) = edit.plan {
            self.plan = plan;
        }
        if let Some(deadline) = edit.deadline {
            if let Some(d) = deadline.as_deref() {
                validate_deadline(d)?;
            }
            self.deadline = deadline.filter(|d| !d.trim().is_empty());
        }
        if let Some(recurrence) = edit.recurring_days {
            match recurrence {
                Some(days) => {
                    validate_weekdays(&days)?;
                    self.is_recurring = true;
                    self.recurring_days = days;
                }
                None => {
                    // Streaks only mean something for recurring goals
                    self.is_recurring = false;
                    self.recurring_days.clear();
                    self.streak = 0;
                }
            }
        }
        if let Some(category) = edit.category {
            self.category = category.filter(|c| !c.trim().is_empty());
        }
        if let Some(folder_id) = edit.folder_id {
            self.folder_id = folder_id;
        }
        Ok(())
    }

    /// Parsed deadline, if the goal has a non-empty one that can be understood.
    pub fn deadline_at(&self) -> Option<DateTime<Utc>> {
        self.deadline.as_deref().and_then(parse_deadline)
    }

    /// Whether a recurring goal is scheduled on the given date.
    pub fn is_scheduled_on(&self, date: NaiveDate) -> bool {
        self.is_recurring
            && (self.recurring_days.is_empty()
                || self.recurring_days.contains(&weekday_index(date)))
    }

    /// The role a user holds on this goal, looking at both sharing representations.
    pub fn role_for(&self, user_id: &str) -> Option<Role> {
        self.collaborators
            .as_ref()
            .and_then(|list| list.iter().find(|c| c.user_id == user_id))
            .map(|c| c.role)
            .or_else(|| {
                self.shared_with
                    .as_ref()
                    .and_then(|map| map.get(user_id).copied())
            })
    }
}

/// A folder grouping goals, optionally nested under another folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub collaborators: Vec<Collaborator>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Folder {
    pub fn new(name: String, parent_id: Option<i64>, owner_id: String, now: DateTime<Utc>) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(NovaError::validation("A folder needs a name"));
        }
        Ok(Folder {
            id: now.timestamp_millis(),
            name: name.trim().to_string(),
            parent_id,
            owner_id,
            collaborators: Vec::new(),
            created_at: now,
        })
    }

    pub fn role_for(&self, user_id: &str) -> Option<Role> {
        self.collaborators
            .iter()
            .find(|c| c.user_id == user_id)
            .map(|c| c.role)
    }
}

/// Weekday index of a date, 0 = Sunday through 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Parses a deadline string.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` (read as UTC) and a bare
/// `YYYY-MM-DD` (midnight UTC). Empty or unreadable strings yield `None`.
pub fn parse_deadline(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn validate_deadline(raw: &str) -> Result<()> {
    if raw.trim().is_empty() || parse_deadline(raw).is_some() {
        Ok(())
    } else {
        Err(NovaError::validation(format!(
            "Unrecognized deadline '{}': use YYYY-MM-DD or YYYY-MM-DDTHH:MM",
            raw
        )))
    }
}

fn validate_weekdays(days: &BTreeSet<u8>) -> Result<()> {
    match days.iter().find(|d| **d > 6) {
        Some(bad) => Err(NovaError::validation(format!(
            "Weekday index {} is out of range 0-6",
            bad
        ))),
        None => Ok(()),
    }
}

/// Reads a calendar date, tolerating full timestamps by keeping their date part.
fn deserialize_calendar_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => {
            let date_part = s.get(..10).unwrap_or(&s);
            NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
    }
}
