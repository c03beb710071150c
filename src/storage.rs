use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, trace, warn};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

use crate::{
    apply_import, refresh_on_load, sort_goals, toggle_completion, CompletionChange, Config,
    Folder, Goal, GoalEdit, GoalFilter, ImportMode, ImportSummary, NewGoal, NotificationLog,
    NotificationSettings, NovaError, Result, SortPreference, Theme, UserRecord,
};

/// Names of the entries kept in the local store.
pub mod keys {
    pub const LANGUAGE: &str = "language";
    pub const THEME: &str = "theme";
    pub const GOALS: &str = "goals";
    pub const FOLDERS: &str = "folders";
    pub const SORT_PREFERENCE: &str = "sortPreference";
    pub const API_KEY: &str = "apiKey";
    pub const OFFLINE_MODE: &str = "offlineMode";
    pub const NOTIFICATION_SETTINGS: &str = "notificationSettings";
    pub const NOTIFICATION_LOG: &str = "notificationLog";
    pub const INVITATIONS: &str = "invitations";
}

/// Key-value store where every value is a JSON document in `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Opens the store, creating its directory if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            debug!("Data directory does not exist, creating: {}", dir.display());
            fs::create_dir_all(dir).map_err(|e| {
                error!("Failed to create data directory: {}", e);
                NovaError::DirectoryError {
                    path: dir.to_path_buf(),
                }
            })?;
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(NovaError::validation(format!("Invalid store key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }

    /// Raw JSON text stored under `key`.
    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path).map(Some).map_err(|e| {
            error!("Failed to read {}: {}", path.display(), e);
            NovaError::Io(e)
        })
    }

    /// Writes raw JSON text using a temp file and an atomic rename.
    pub fn set_raw(&self, key: &str, json: &str) -> Result<()> {
        let path = self.entry_path(key)?;

        let mut temp_file = NamedTempFile::new_in(&self.dir).map_err(|e| {
            error!("Failed to create temporary file: {}", e);
            NovaError::Io(e)
        })?;

        trace!("Writing {} bytes for '{}'", json.len(), key);
        temp_file.write_all(json.as_bytes()).map_err(|e| {
            error!("Failed to write to temporary file: {}", e);
            NovaError::Io(e)
        })?;
        temp_file.flush()?;

        temp_file.persist(&path).map_err(|e| {
            error!("Failed to persist file {}: {}", path.display(), e.error);
            NovaError::Io(e.error)
        })?;
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(|e| {
            error!("Failed to serialize '{}': {}", key, e);
            NovaError::Serialization(e)
        })?;
        self.set_raw(key, &json)
    }

    /// Removes an entry. Returns whether it existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let path = self.entry_path(key)?;
        if path.exists() {
            fs::remove_file(&path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Manages the storage and retrieval of goals, folders and preferences.
pub struct GoalStorage {
    /// Application configuration
    config: Config,

    /// Backing key-value store
    store: LocalStore,

    /// In-memory copy of the goal list, in stored order
    goals_cache: Arc<Mutex<Vec<Goal>>>,

    /// In-memory copy of the folder list
    folders_cache: Arc<Mutex<Vec<Folder>>>,

    /// Flag indicating if the storage system is ready
    initialized: bool,
}

impl GoalStorage {
    /// Creates a new GoalStorage over the data directory named in `config`.
    pub fn new(config: Config) -> Result<Self> {
        let store = LocalStore::open(&config.data_dir)?;
        Ok(Self {
            config,
            store,
            goals_cache: Arc::new(Mutex::new(Vec::new())),
            folders_cache: Arc::new(Mutex::new(Vec::new())),
            initialized: false,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Loads goals and folders, bringing recurring goals up to date for `today`.
    ///
    /// # Returns
    ///
    /// The number of goals loaded
    pub fn initialize(&mut self, today: NaiveDate) -> Result<usize> {
        info!(
            "Initializing GoalStorage with data_dir={}",
            self.config.data_dir.display()
        );

        let mut goals: Vec<Goal> = self.store.get(keys::GOALS)?.unwrap_or_default();
        let refreshed = goals
            .iter_mut()
            .map(|goal| refresh_on_load(goal, today))
            .filter(|changed| *changed)
            .count();
        if refreshed > 0 {
            info!("Refreshed {} recurring goals for {}", refreshed, today);
            self.store.set(keys::GOALS, &goals)?;
        }

        let folders: Vec<Folder> = self.store.get(keys::FOLDERS)?.unwrap_or_default();
        let count = goals.len();

        *self.lock_goals()? = goals;
        *self.lock_folders()? = folders;
        self.initialized = true;

        info!("Loaded {} goals", count);
        Ok(count)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn lock_goals(&self) -> Result<std::sync::MutexGuard<'_, Vec<Goal>>> {
        self.goals_cache
            .lock()
            .map_err(|_| NovaError::LockAcquisitionFailed {
                message: "Failed to acquire lock on goals cache".to_string(),
            })
    }

    fn lock_folders(&self) -> Result<std::sync::MutexGuard<'_, Vec<Folder>>> {
        self.folders_cache
            .lock()
            .map_err(|_| NovaError::LockAcquisitionFailed {
                message: "Failed to acquire lock on folders cache".to_string(),
            })
    }

    /// Applies `change` to a copy of the goal list and persists it; the cache
    /// only takes the new list once it is on disk.
    fn mutate_goals<T>(&self, change: impl FnOnce(&mut Vec<Goal>) -> Result<T>) -> Result<T> {
        let mut cache = self.lock_goals()?;
        let mut working = cache.clone();
        let outcome = change(&mut working)?;
        self.store.set(keys::GOALS, &working)?;
        *cache = working;
        Ok(outcome)
    }

    fn mutate_folders<T>(&self, change: impl FnOnce(&mut Vec<Folder>) -> Result<T>) -> Result<T> {
        let mut cache = self.lock_folders()?;
        let mut working = cache.clone();
        let outcome = change(&mut working)?;
        self.store.set(keys::FOLDERS, &working)?;
        *cache = working;
        Ok(outcome)
    }

    fn ensure_folder_exists(&self, folder_id: Option<i64>) -> Result<()> {
        if let Some(id) = folder_id {
            if self.get_folder(id).is_none() {
                return Err(NovaError::FolderNotFound { id });
            }
        }
        Ok(())
    }

    /// Creates and stores a goal. The id is derived from `now`, moved forward
    /// if another goal already holds it.
    pub fn create_goal(&self, draft: NewGoal, now: DateTime<Utc>) -> Result<Goal> {
        self.ensure_folder_exists(draft.folder_id)?;
        let mut goal = Goal::new(draft, now)?;

        self.mutate_goals(|goals| {
            let taken: Vec<i64> = goals.iter().map(|g| g.id).collect();
            goal.id = next_free_id(&taken, goal.id)?;
            goals.push(goal.clone());
            Ok(())
        })?;

        info!("Goal created: {}", goal.id);
        Ok(goal)
    }

    /// Retrieves a goal by its ID
    pub fn get_goal(&self, goal_id: i64) -> Option<Goal> {
        match self.lock_goals() {
            Ok(goals) => goals.iter().find(|g| g.id == goal_id).cloned(),
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }

    /// Every stored goal, in stored order.
    pub fn all_goals(&self) -> Result<Vec<Goal>> {
        Ok(self.lock_goals()?.clone())
    }

    /// Goals matching `filter`, ordered by `sort`.
    pub fn list_goals(&self, filter: &GoalFilter, sort: SortPreference) -> Result<Vec<Goal>> {
        let snapshot = self.all_goals()?;
        let mut matching: Vec<Goal> = snapshot.into_iter().filter(|g| filter.matches(g)).collect();
        sort_goals(&mut matching, sort);
        debug!("Listing {} goals", matching.len());
        Ok(matching)
    }

    /// Updates the free-text fields, deadline, recurrence and placement of a goal.
    pub fn update_goal(&self, goal_id: i64, edit: GoalEdit) -> Result<Goal> {
        if let Some(folder) = edit.folder_id {
            self.ensure_folder_exists(folder)?;
        }

        let updated = self.mutate_goals(|goals| {
            let goal = goals
                .iter_mut()
                .find(|g| g.id == goal_id)
                .ok_or(NovaError::GoalNotFound { id: goal_id })?;
            goal.apply_edit(edit)?;
            Ok(goal.clone())
        })?;

        info!("Goal {} updated", goal_id);
        Ok(updated)
    }

    /// Toggles completion of a goal as of `today`.
    pub fn toggle_goal(&self, goal_id: i64, today: NaiveDate) -> Result<(Goal, CompletionChange)> {
        self.mutate_goals(|goals| {
            let goal = goals
                .iter_mut()
                .find(|g| g.id == goal_id)
                .ok_or(NovaError::GoalNotFound { id: goal_id })?;
            let change = toggle_completion(goal, today);
            Ok((goal.clone(), change))
        })
    }

    /// Deletes a goal, returning the removed record.
    pub fn delete_goal(&self, goal_id: i64) -> Result<Goal> {
        info!("Deleting goal: {}", goal_id);
        let removed = self.mutate_goals(|goals| {
            let index = goals
                .iter()
                .position(|g| g.id == goal_id)
                .ok_or(NovaError::GoalNotFound { id: goal_id })?;
            Ok(goals.remove(index))
        })?;
        info!("Goal {} successfully deleted", goal_id);
        Ok(removed)
    }

    /// Deletes every goal whose id is listed. Unknown ids are ignored.
    pub fn bulk_delete(&self, goal_ids: &[i64]) -> Result<usize> {
        let removed = self.mutate_goals(|goals| {
            let before = goals.len();
            goals.retain(|g| !goal_ids.contains(&g.id));
            Ok(before - goals.len())
        })?;
        info!("Bulk delete removed {} goals", removed);
        Ok(removed)
    }

    /// Deletes every completed goal.
    pub fn delete_completed(&self) -> Result<usize> {
        let removed = self.mutate_goals(|goals| {
            let before = goals.len();
            goals.retain(|g| !g.completed);
            Ok(before - goals.len())
        })?;
        info!("Removed {} completed goals", removed);
        Ok(removed)
    }

    /// Searches goals across their WOOP fields using fuzzy matching.
    /// Returns goals sorted by relevance score, wish matches weighted double.
    pub fn search_goals(&self, query: &str) -> Result<Vec<Goal>> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        info!("Searching goals with query: '{}'", query);
        let matcher = SkimMatcherV2::default();
        let goals = self.all_goals()?;

        let mut scored: Vec<(i64, Goal)> = goals
            .into_iter()
            .filter_map(|goal| {
                let wish = matcher.fuzzy_match(&goal.wish, query).unwrap_or(0);
                let rest = [&goal.outcome, &goal.obstacle, &goal.plan]
                    .iter()
                    .filter_map(|field| matcher.fuzzy_match(field, query))
                    .max()
                    .unwrap_or(0);
                let score = wish * 2 + rest;
                (score > 0).then_some((score, goal))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        debug!("Found {} matching goals", scored.len());
        Ok(scored.into_iter().map(|(_, goal)| goal).collect())
    }

    /// Applies an imported goal list. Nothing changes if persisting fails.
    pub fn import_goals(&self, incoming: Vec<Goal>, mode: ImportMode, today: NaiveDate) -> Result<ImportSummary> {
        let summary = self.mutate_goals(|goals| {
            let current = std::mem::take(goals);
            let (mut combined, summary) = apply_import(current, incoming, mode);
            for goal in combined.iter_mut() {
                refresh_on_load(goal, today);
            }
            *goals = combined;
            Ok(summary)
        })?;
        info!(
            "Imported {} goals ({} added, {} updated, {} removed)",
            summary.total, summary.added, summary.updated, summary.removed
        );
        Ok(summary)
    }

    /// Retrieves a folder by its ID
    pub fn get_folder(&self, folder_id: i64) -> Option<Folder> {
        match self.lock_folders() {
            Ok(folders) => folders.iter().find(|f| f.id == folder_id).cloned(),
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }

    pub fn list_folders(&self) -> Result<Vec<Folder>> {
        Ok(self.lock_folders()?.clone())
    }

    pub fn create_folder(&self, name: String, parent_id: Option<i64>, now: DateTime<Utc>) -> Result<Folder> {
        self.ensure_folder_exists(parent_id)?;
        let mut folder = Folder::new(name, parent_id, self.config.user_id.clone(), now)?;

        self.mutate_folders(|folders| {
            let taken: Vec<i64> = folders.iter().map(|f| f.id).collect();
            folder.id = next_free_id(&taken, folder.id)?;
            folders.push(folder.clone());
            Ok(())
        })?;

        info!("Folder created: {} ({})", folder.name, folder.id);
        Ok(folder)
    }

    pub fn rename_folder(&self, folder_id: i64, name: String) -> Result<Folder> {
        if name.trim().is_empty() {
            return Err(NovaError::validation("A folder needs a name"));
        }
        self.mutate_folders(|folders| {
            let folder = folders
                .iter_mut()
                .find(|f| f.id == folder_id)
                .ok_or(NovaError::FolderNotFound { id: folder_id })?;
            folder.name = name.trim().to_string();
            Ok(folder.clone())
        })
    }

    /// Stores a modified folder record (collaborator changes).
    pub fn save_folder(&self, folder: Folder) -> Result<()> {
        self.mutate_folders(|folders| {
            let slot = folders
                .iter_mut()
                .find(|f| f.id == folder.id)
                .ok_or(NovaError::FolderNotFound { id: folder.id })?;
            *slot = folder;
            Ok(())
        })
    }

    /// Moves a goal into a folder, or to the top level with `None`.
    pub fn move_goal(&self, goal_id: i64, folder_id: Option<i64>) -> Result<Goal> {
        self.update_goal(
            goal_id,
            GoalEdit {
                folder_id: Some(folder_id),
                ..Default::default()
            },
        )
    }

    /// Deletes a folder. Its goals and sub-folders move up to its parent.
    pub fn delete_folder(&self, folder_id: i64) -> Result<Folder> {
        let previous = self.list_folders()?;
        let removed = self.mutate_folders(|folders| {
            let index = folders
                .iter()
                .position(|f| f.id == folder_id)
                .ok_or(NovaError::FolderNotFound { id: folder_id })?;
            let removed = folders.remove(index);
            for child in folders.iter_mut().filter(|f| f.parent_id == Some(folder_id)) {
                child.parent_id = removed.parent_id;
            }
            Ok(removed)
        })?;

        let moved = self
            .mutate_goals(|goals| {
                let mut moved = 0;
                for goal in goals.iter_mut().filter(|g| g.folder_id == Some(folder_id)) {
                    goal.folder_id = removed.parent_id;
                    moved += 1;
                }
                Ok(moved)
            })
            .map_err(|e| {
                error!("Failed to move goals out of folder {}: {}", folder_id, e);
                if let Err(restore) = self.mutate_folders(|folders| {
                    *folders = previous;
                    Ok(())
                }) {
                    error!("Failed to restore folder {}: {}", folder_id, restore);
                }
                e
            })?;

        info!(
            "Folder {} deleted, {} goals moved to {:?}",
            folder_id, moved, removed.parent_id
        );
        Ok(removed)
    }

    /// Names from the top-level folder down to `folder_id`.
    pub fn folder_path(&self, folder_id: i64) -> Result<Vec<String>> {
        let folders = self.list_folders()?;
        let mut path = Vec::new();
        let mut current = Some(folder_id);

        while let Some(id) = current {
            let folder = folders
                .iter()
                .find(|f| f.id == id)
                .ok_or(NovaError::FolderNotFound { id })?;
            path.push(folder.name.clone());
            if path.len() > folders.len() {
                warn!("Folder hierarchy under {} contains a cycle", folder_id);
                break;
            }
            current = folder.parent_id;
        }

        path.reverse();
        Ok(path)
    }

    pub fn sort_preference(&self) -> Result<SortPreference> {
        Ok(self.store.get(keys::SORT_PREFERENCE)?.unwrap_or_default())
    }

    pub fn set_sort_preference(&self, sort: SortPreference) -> Result<()> {
        self.store.set(keys::SORT_PREFERENCE, &sort)
    }

    pub fn language(&self) -> Result<String> {
        Ok(self
            .store
            .get(keys::LANGUAGE)?
            .unwrap_or_else(|| "en".to_string()))
    }

    pub fn set_language(&self, language: &str) -> Result<()> {
        self.store.set(keys::LANGUAGE, language)
    }

    pub fn theme(&self) -> Result<Theme> {
        Ok(self.store.get(keys::THEME)?.unwrap_or_default())
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.store.set(keys::THEME, &theme)
    }

    /// Stored AI key, overridden by `NOVA_API_KEY`.
    pub fn api_key(&self) -> Result<Option<String>> {
        if let Ok(key) = std::env::var("NOVA_API_KEY") {
            return Ok(Some(key));
        }
        let stored: Option<String> = self.store.get(keys::API_KEY)?;
        Ok(stored.filter(|k| !k.trim().is_empty()))
    }

    pub fn set_api_key(&self, key: Option<&str>) -> Result<()> {
        match key {
            Some(key) => self.store.set(keys::API_KEY, key),
            None => self.store.remove(keys::API_KEY).map(|_| ()),
        }
    }

    /// Offline flag, forced on by `NOVA_OFFLINE=1`.
    pub fn offline_mode(&self) -> Result<bool> {
        if std::env::var("NOVA_OFFLINE").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")) {
            return Ok(true);
        }
        Ok(self.store.get(keys::OFFLINE_MODE)?.unwrap_or(false))
    }

    pub fn set_offline_mode(&self, offline: bool) -> Result<()> {
        self.store.set(keys::OFFLINE_MODE, &offline)
    }

    pub fn notification_settings(&self) -> Result<NotificationSettings> {
        Ok(self
            .store
            .get(keys::NOTIFICATION_SETTINGS)?
            .unwrap_or_default())
    }

    pub fn set_notification_settings(&self, settings: &NotificationSettings) -> Result<()> {
        self.store.set(keys::NOTIFICATION_SETTINGS, settings)
    }

    pub fn notification_log(&self) -> Result<NotificationLog> {
        Ok(self.store.get(keys::NOTIFICATION_LOG)?.unwrap_or_default())
    }

    pub fn save_notification_log(&self, log: &NotificationLog) -> Result<()> {
        self.store.set(keys::NOTIFICATION_LOG, log)
    }

    /// The users whose goals the deadline check scans. A local store holds one profile.
    pub fn notification_users(&self) -> Result<Vec<UserRecord>> {
        Ok(vec![UserRecord {
            user_id: self.config.user_id.clone(),
            settings: self.notification_settings()?,
            goals: self.all_goals()?,
        }])
    }
}

/// `candidate` when it is above every taken id, otherwise the id after the
/// largest one. Falls back to the smallest free positive id at the top of the range.
fn next_free_id(taken: &[i64], candidate: i64) -> Result<i64> {
    let Some(&max_id) = taken.iter().max() else {
        return Ok(candidate);
    };
    if candidate > max_id {
        return Ok(candidate);
    }
    if let Some(id) = max_id.checked_add(1) {
        return Ok(id);
    }
    warn!("Largest id is {}, reusing a free id", max_id);
    (1..=i64::MAX)
        .find(|id| !taken.contains(id))
        .ok_or_else(|| NovaError::validation("No free id left"))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone;

    use super::*;

    fn storage() -> (tempfile::TempDir, GoalStorage) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().join("data"),
            ..Config::default()
        };
        let mut storage = GoalStorage::new(config).unwrap();
        storage.initialize(day(1)).unwrap();
        (dir, storage)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn draft(wish: &str) -> NewGoal {
        NewGoal {
            wish: wish.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        assert!(store.set("../escape", &1).is_err());
        store.set(keys::THEME, &Theme::Dark).unwrap();
        assert_eq!(store.get_raw(keys::THEME).unwrap().unwrap(), "\"dark\"");
        assert!(store.remove(keys::THEME).unwrap());
        assert!(!store.remove(keys::THEME).unwrap());
    }

    #[test]
    fn ids_stay_unique_when_created_in_same_millisecond() {
        let (_dir, storage) = storage();
        let a = storage.create_goal(draft("A"), now()).unwrap();
        let b = storage.create_goal(draft("B"), now()).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(storage.all_goals().unwrap().len(), 2);
    }

    #[test]
    fn goals_persist_across_instances() {
        let (dir, storage) = storage();
        let goal = storage.create_goal(draft("Persist me"), now()).unwrap();
        let config = storage.config().clone();
        drop(storage);

        let mut reopened = GoalStorage::new(config).unwrap();
        assert_eq!(reopened.initialize(day(1)).unwrap(), 1);
        assert_eq!(reopened.get_goal(goal.id).unwrap().wish, "Persist me");
        drop(dir);
    }

    #[test]
    fn load_resets_yesterdays_completion() {
        let (_dir, storage) = storage();
        let goal = storage
            .create_goal(
                NewGoal {
                    recurring_days: Some(BTreeSet::new()),
                    ..draft("Daily walk")
                },
                now(),
            )
            .unwrap();
        storage.toggle_goal(goal.id, day(1)).unwrap();

        let mut reopened = GoalStorage::new(storage.config().clone()).unwrap();
        reopened.initialize(day(2)).unwrap();
        let loaded = reopened.get_goal(goal.id).unwrap();
        assert!(!loaded.completed);
        assert_eq!(loaded.streak, 1);
    }

    #[test]
    fn delete_and_bulk_delete() {
        let (_dir, storage) = storage();
        let a = storage.create_goal(draft("A"), now()).unwrap();
        let b = storage.create_goal(draft("B"), now()).unwrap();
        let c = storage.create_goal(draft("C"), now()).unwrap();

        storage.delete_goal(a.id).unwrap();
        assert!(matches!(
            storage.delete_goal(a.id),
            Err(NovaError::GoalNotFound { .. })
        ));

        storage.toggle_goal(b.id, day(1)).unwrap();
        assert_eq!(storage.delete_completed().unwrap(), 1);
        assert_eq!(storage.bulk_delete(&[c.id, 12345]).unwrap(), 1);
        assert!(storage.all_goals().unwrap().is_empty());
    }

    #[test]
    fn deleting_folder_moves_contents_up() {
        let (_dir, storage) = storage();
        let top = storage.create_folder("Health".to_string(), None, now()).unwrap();
        let sub = storage
            .create_folder("Running".to_string(), Some(top.id), now())
            .unwrap();
        let inner = storage
            .create_folder("Races".to_string(), Some(sub.id), now())
            .unwrap();
        let goal = storage
            .create_goal(
                NewGoal {
                    folder_id: Some(sub.id),
                    ..draft("10k under 50min")
                },
                now(),
            )
            .unwrap();

        assert_eq!(
            storage.folder_path(inner.id).unwrap(),
            vec!["Health", "Running", "Races"]
        );

        storage.delete_folder(sub.id).unwrap();
        assert_eq!(storage.get_goal(goal.id).unwrap().folder_id, Some(top.id));
        assert_eq!(storage.get_folder(inner.id).unwrap().parent_id, Some(top.id));
    }

    #[test]
    fn unknown_folder_is_rejected() {
        let (_dir, storage) = storage();
        let result = storage.create_goal(
            NewGoal {
                folder_id: Some(404),
                ..draft("Orphan")
            },
            now(),
        );
        assert!(matches!(result, Err(NovaError::FolderNotFound { id: 404 })));
    }

    #[test]
    fn search_prefers_wish_matches() {
        let (_dir, storage) = storage();
        storage
            .create_goal(
                NewGoal {
                    plan: "practice guitar after dinner".to_string(),
                    ..draft("Be more musical")
                },
                now(),
            )
            .unwrap();
        storage.create_goal(draft("Learn guitar"), now()).unwrap();
        storage.create_goal(draft("Cook more"), now()).unwrap();

        let results = storage.search_goals("guitar").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].wish, "Learn guitar");
    }

    #[test]
    fn preferences_round_trip() {
        let (_dir, storage) = storage();
        assert_eq!(storage.sort_preference().unwrap(), SortPreference::Newest);
        storage.set_sort_preference(SortPreference::Deadline).unwrap();
        assert_eq!(storage.sort_preference().unwrap(), SortPreference::Deadline);

        storage.set_language("ko").unwrap();
        assert_eq!(storage.language().unwrap(), "ko");

        storage.set_offline_mode(true).unwrap();
        assert!(storage.offline_mode().unwrap());
    }

    #[test]
    fn new_ids_survive_an_imported_maximum() {
        let (_dir, storage) = storage();
        let incoming = crate::parse_import(r#"[{"id": 9223372036854775807, "wish": "big"}]"#).unwrap();
        storage.import_goals(incoming, ImportMode::Replace, day(1)).unwrap();

        let goal = storage.create_goal(draft("After the big one"), now()).unwrap();
        assert_eq!(goal.id, 1);
        let again = storage.create_goal(draft("And another"), now()).unwrap();
        assert_eq!(again.id, 2);

        assert_eq!(next_free_id(&[], 42).unwrap(), 42);
        assert_eq!(next_free_id(&[5, 9], 3).unwrap(), 10);
        assert_eq!(next_free_id(&[1, i64::MAX], 0).unwrap(), 2);
    }

    #[test]
    fn imported_one_off_goals_carry_no_streak() {
        let (_dir, storage) = storage();
        let incoming =
            crate::parse_import(r#"[{"id": 7, "wish": "once", "isRecurring": false, "streak": 5}]"#)
                .unwrap();
        storage.import_goals(incoming, ImportMode::Merge, day(1)).unwrap();
        assert_eq!(storage.get_goal(7).unwrap().streak, 0);
    }

    #[test]
    fn failed_folder_delete_keeps_the_folder() {
        let (dir, storage) = storage();
        let folder = storage.create_folder("Work".to_string(), None, now()).unwrap();
        let goal = storage
            .create_goal(
                NewGoal {
                    folder_id: Some(folder.id),
                    ..draft("Ship it")
                },
                now(),
            )
            .unwrap();

        // A directory where the goal file belongs makes the goal write fail
        let goals_path = dir.path().join("data").join("goals.json");
        fs::remove_file(&goals_path).unwrap();
        fs::create_dir(&goals_path).unwrap();

        assert!(storage.delete_folder(folder.id).is_err());
        assert!(storage.get_folder(folder.id).is_some());
        let on_disk: Vec<Folder> = storage.store().get(keys::FOLDERS).unwrap().unwrap();
        assert!(on_disk.iter().any(|f| f.id == folder.id));
        assert_eq!(storage.get_goal(goal.id).unwrap().folder_id, Some(folder.id));
    }
}
