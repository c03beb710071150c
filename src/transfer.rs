//! Goal list export and import.
//!
//! Exports are a pretty-printed JSON array of goals written to
//! `nova_goals.json`. Imports accept the same shape and are all-or-nothing:
//! every element must be an object carrying at least `id` and `wish`, or
//! nothing is applied.
use std::{
    collections::{HashMap, HashSet},
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use log::{debug, error, info};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::{Goal, NovaError, Result};

/// File name used for exports.
pub const EXPORT_FILE_NAME: &str = "nova_goals.json";

/// How imported goals combine with the goals already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Imported list becomes the whole list
    #[default]
    Replace,
    /// Imported goals are upserted by id; the incoming copy wins
    Merge,
}

impl std::str::FromStr for ImportMode {
    type Err = NovaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(ImportMode::Replace),
            "merge" => Ok(ImportMode::Merge),
            other => Err(NovaError::validation(format!(
                "Unknown import mode '{}': expected replace or merge",
                other
            ))),
        }
    }
}

/// Summary of an import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Number of goals in the imported payload
    pub total: usize,
    /// Goals whose id was not present before
    pub added: usize,
    /// Existing goals overwritten by an imported copy
    pub updated: usize,
    /// Existing goals dropped by a replace
    pub removed: usize,
}

/// Serializes goals the way exports are written.
pub fn export_to_string(goals: &[Goal]) -> Result<String> {
    Ok(serde_json::to_string_pretty(goals)?)
}

/// Writes an export file. A directory target receives `nova_goals.json`.
pub fn export_to_path(goals: &[Goal], target: &Path) -> Result<PathBuf> {
    let path = if target.is_dir() {
        target.join(EXPORT_FILE_NAME)
    } else {
        target.to_path_buf()
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| {
            error!("Failed to create export directory {}: {}", dir.display(), e);
            NovaError::DirectoryError { path: dir.clone() }
        })?;
    }

    let json = export_to_string(goals)?;
    let mut temp_file = NamedTempFile::new_in(&dir)?;
    temp_file.write_all(json.as_bytes())?;
    temp_file.flush()?;
    temp_file.persist(&path).map_err(|e| {
        error!("Failed to persist export {}: {}", path.display(), e.error);
        NovaError::Io(e.error)
    })?;

    info!("Exported {} goals to {}", goals.len(), path.display());
    Ok(path)
}

/// Parses and shape-checks an imported goal list.
pub fn parse_import(json: &str) -> Result<Vec<Goal>> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| NovaError::import_failed(format!("Not valid JSON: {}", e)))?;
    goals_from_value(value)
}

/// Shape-checks an already parsed JSON value and converts it into goals.
pub fn goals_from_value(value: Value) -> Result<Vec<Goal>> {
    let Value::Array(items) = value else {
        return Err(NovaError::import_failed("Expected a JSON array of goals"));
    };

    for (index, item) in items.iter().enumerate() {
        let Some(object) = item.as_object() else {
            return Err(NovaError::import_failed(format!(
                "Element {} is not an object",
                index
            )));
        };
        for field in ["id", "wish"] {
            if object.get(field).map_or(true, Value::is_null) {
                return Err(NovaError::import_failed(format!(
                    "Element {} is missing '{}'",
                    index, field
                )));
            }
        }
        if let Some(Value::Array(days)) = object.get("recurringDays") {
            if days.iter().any(|d| d.as_u64().map_or(true, |d| d > 6)) {
                return Err(NovaError::import_failed(format!(
                    "Element {} has recurringDays outside 0-6",
                    index
                )));
            }
        }
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<Goal>(item).map_err(|e| {
                NovaError::import_failed(format!("Element {} is not a goal: {}", index, e))
            })
        })
        .collect()
}

/// Reads and parses an import file.
pub fn import_from_path(path: &Path) -> Result<Vec<Goal>> {
    debug!("Importing goals from {}", path.display());
    let content = fs::read_to_string(path).map_err(|e| {
        error!("Failed to read import file {}: {}", path.display(), e);
        NovaError::Io(e)
    })?;
    parse_import(&content)
}

/// Combines imported goals with the current ones.
pub fn apply_import(
    existing: Vec<Goal>,
    incoming: Vec<Goal>,
    mode: ImportMode,
) -> (Vec<Goal>, ImportSummary) {
    let incoming = dedupe_by_id(incoming);
    let total = incoming.len();

    match mode {
        ImportMode::Replace => {
            let old_ids: HashSet<i64> = existing.iter().map(|g| g.id).collect();
            let updated = incoming.iter().filter(|g| old_ids.contains(&g.id)).count();
            let removed = existing.len() - updated.min(existing.len());
            let summary = ImportSummary {
                total,
                added: total - updated,
                updated,
                removed,
            };
            (incoming, summary)
        }
        ImportMode::Merge => {
            let mut merged = existing;
            let mut positions: HashMap<i64, usize> = merged
                .iter()
                .enumerate()
                .map(|(i, g)| (g.id, i))
                .collect();
            let mut summary = ImportSummary {
                total,
                ..Default::default()
            };

            for goal in incoming {
                match positions.get(&goal.id) {
                    Some(&i) => {
                        merged[i] = goal;
                        summary.updated += 1;
                    }
                    None => {
                        positions.insert(goal.id, merged.len());
                        merged.push(goal);
                        summary.added += 1;
                    }
                }
            }
            (merged, summary)
        }
    }
}

/// Collapses goals sharing an id into one entry at the first position,
/// holding the last copy.
fn dedupe_by_id(goals: Vec<Goal>) -> Vec<Goal> {
    let mut positions: HashMap<i64, usize> = HashMap::new();
    let mut unique: Vec<Goal> = Vec::with_capacity(goals.len());
    for goal in goals {
        match positions.get(&goal.id) {
            Some(&i) => {
                debug!("Duplicate goal id {} in import, keeping the later copy", goal.id);
                unique[i] = goal;
            }
            None => {
                positions.insert(goal.id, unique.len());
                unique.push(goal);
            }
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::{Collaborator, NewGoal, Role};

    fn sample_goals() -> Vec<Goal> {
        let now = Utc::now();
        let mut daily = Goal::new(
            NewGoal {
                wish: "매일 한국어 공부하기".to_string(),
                outcome: "Talk with my grandmother".to_string(),
                obstacle: "Tired after work".to_string(),
                plan: "If I get home, then I open the flashcards".to_string(),
                recurring_days: Some([1, 2, 3, 4, 5].into_iter().collect()),
                category: Some("learning".to_string()),
                ..Default::default()
            },
            now,
        )
        .unwrap();
        daily.streak = 12;
        daily.completed = true;
        daily.last_completed_date = NaiveDate::from_ymd_opt(2024, 5, 1);
        daily.collaborators = Some(vec![Collaborator {
            user_id: "mentor".to_string(),
            email: "mentor@example.com".to_string(),
            role: Role::Viewer,
        }]);

        let mut once = Goal::new(
            NewGoal {
                wish: "Submit thesis".to_string(),
                deadline: Some("2024-06-30T17:00".to_string()),
                folder_id: Some(99),
                ..Default::default()
            },
            now,
        )
        .unwrap();
        once.id += 1;

        vec![daily, once]
    }

    #[test]
    fn export_then_import_is_identical() {
        let goals = sample_goals();
        let json = export_to_string(&goals).unwrap();
        assert!(json.contains("\n  {"), "export should be pretty-printed");
        assert!(json.contains("\"isRecurring\": true"));

        let imported = parse_import(&json).unwrap();
        assert_eq!(imported, goals);
    }

    #[test]
    fn export_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let goals = sample_goals();
        let path = export_to_path(&goals, dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), EXPORT_FILE_NAME);
        assert_eq!(import_from_path(&path).unwrap(), goals);
    }

    #[test]
    fn import_rejects_bad_shapes() {
        assert!(matches!(
            parse_import("{\"id\": 1}"),
            Err(NovaError::ImportFailed { .. })
        ));
        assert!(matches!(
            parse_import("[{\"id\": 1, \"wish\": \"ok\"}, {\"id\": 2}]"),
            Err(NovaError::ImportFailed { .. })
        ));
        assert!(matches!(
            parse_import("[{\"wish\": \"no id\"}]"),
            Err(NovaError::ImportFailed { .. })
        ));
        assert!(matches!(
            parse_import("not json"),
            Err(NovaError::ImportFailed { .. })
        ));
    }

    #[test]
    fn minimal_import_fills_defaults() {
        let goals = parse_import(r#"[{"id": 5, "wish": "Sleep early"}]"#).unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].streak, 0);
        assert!(!goals[0].is_recurring);
        assert!(!goals[0].completed);
    }

    #[test]
    fn merge_upserts_and_replace_swaps() {
        let existing = sample_goals();
        let mut changed = existing[1].clone();
        changed.wish = "Submit thesis draft".to_string();
        let fresh: Goal = serde_json::from_str(r#"{"id": 1, "wish": "New"}"#).unwrap();

        let (merged, summary) = apply_import(
            existing.clone(),
            vec![changed.clone(), fresh.clone()],
            ImportMode::Merge,
        );
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1].wish, "Submit thesis draft");
        assert_eq!(summary.added, 1);
        assert_eq!(summary.updated, 1);

        let (replaced, summary) = apply_import(existing, vec![fresh], ImportMode::Replace);
        assert_eq!(replaced.len(), 1);
        assert_eq!(summary.removed, 2);
        assert_eq!(summary.added, 1);
    }

    #[test]
    fn duplicate_ids_keep_the_last_copy() {
        let incoming = parse_import(
            r#"[{"id": 7, "wish": "first"}, {"id": 8, "wish": "other"}, {"id": 7, "wish": "second"}]"#,
        )
        .unwrap();

        let (merged, summary) = apply_import(Vec::new(), incoming.clone(), ImportMode::Merge);
        let ids: Vec<i64> = merged.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![7, 8]);
        assert_eq!(merged[0].wish, "second");
        assert_eq!(summary.added, 2);
        assert_eq!(summary.total, 2);

        let (replaced, _) = apply_import(sample_goals(), incoming, ImportMode::Replace);
        let ids: Vec<i64> = replaced.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![7, 8]);
        assert_eq!(replaced[0].wish, "second");
    }

    #[test]
    fn import_rejects_weekdays_out_of_range() {
        assert!(matches!(
            parse_import(r#"[{"id": 1, "wish": "Gym", "isRecurring": true, "recurringDays": [1, 7]}]"#),
            Err(NovaError::ImportFailed { .. })
        ));
        assert!(matches!(
            parse_import(r#"[{"id": 1, "wish": "Gym", "isRecurring": true, "recurringDays": [-1]}]"#),
            Err(NovaError::ImportFailed { .. })
        ));
        let goals =
            parse_import(r#"[{"id": 1, "wish": "Gym", "isRecurring": true, "recurringDays": [0, 6]}]"#)
                .unwrap();
        assert_eq!(goals[0].recurring_days.len(), 2);
    }
}
