//! Shared types for the Nova planner.
//!
//! Holds the Result alias, list ordering and filtering, display preferences and
//! the CLI subcommands.
use std::{cmp::Ordering, path::PathBuf};

use clap::Subcommand;
use serde::{Deserialize, Serialize};

use crate::{Goal, NovaError};

/// A specialized Result type for Nova operations.
pub type Result<T> = std::result::Result<T, NovaError>;

/// Order in which goal lists are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortPreference {
    /// Most recently created first
    #[default]
    Newest,
    Oldest,
    /// Soonest deadline first, goals without one last
    Deadline,
    /// By wish, case-insensitive
    Alphabetical,
    /// Highest streak first
    Streak,
}

impl SortPreference {
    pub const ALL: [SortPreference; 5] = [
        SortPreference::Newest,
        SortPreference::Oldest,
        SortPreference::Deadline,
        SortPreference::Alphabetical,
        SortPreference::Streak,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortPreference::Newest => "newest",
            SortPreference::Oldest => "oldest",
            SortPreference::Deadline => "deadline",
            SortPreference::Alphabetical => "alphabetical",
            SortPreference::Streak => "streak",
        }
    }
}

impl std::str::FromStr for SortPreference {
    type Err = NovaError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        SortPreference::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| {
                NovaError::validation(format!(
                    "Unknown sort '{}': expected newest, oldest, deadline, alphabetical or streak",
                    s
                ))
            })
    }
}

/// Sorts goals in place. Ties fall back to id so the order is stable across runs.
pub fn sort_goals(goals: &mut [Goal], sort: SortPreference) {
    goals.sort_by(|a, b| {
        let primary = match sort {
            SortPreference::Newest => b.created_at.cmp(&a.created_at),
            SortPreference::Oldest => a.created_at.cmp(&b.created_at),
            SortPreference::Deadline => match (a.deadline_at(), b.deadline_at()) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            SortPreference::Alphabetical => a.wish.to_lowercase().cmp(&b.wish.to_lowercase()),
            SortPreference::Streak => b.streak.cmp(&a.streak),
        };
        primary.then_with(|| match sort {
            SortPreference::Newest | SortPreference::Streak => b.id.cmp(&a.id),
            _ => a.id.cmp(&b.id),
        })
    });
}

/// Colour scheme preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl std::str::FromStr for Theme {
    type Err = NovaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(NovaError::validation(format!(
                "Unknown theme '{}': expected light or dark",
                other
            ))),
        }
    }
}

/// Restricts which goals a listing returns
#[derive(Debug, Clone, Default)]
pub struct GoalFilter {
    /// Only goals directly inside this folder
    pub folder_id: Option<i64>,
    /// Only goals with this category (case-insensitive)
    pub category: Option<String>,
    /// Hide completed goals
    pub active_only: bool,
    /// Only recurring goals
    pub recurring_only: bool,
}

impl GoalFilter {
    pub fn matches(&self, goal: &Goal) -> bool {
        if let Some(folder) = self.folder_id {
            if goal.folder_id != Some(folder) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            let same = goal
                .category
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(category));
            if !same {
                return false;
            }
        }
        if self.active_only && goal.completed {
            return false;
        }
        !(self.recurring_only && !goal.is_recurring)
    }
}

/// Available subcommands for the nova application
#[derive(Subcommand)]
pub enum Commands {
    /// Create a new WOOP goal
    Add {
        /// What you want to achieve
        wish: String,

        /// Best outcome of fulfilling the wish
        #[clap(short, long)]
        outcome: Option<String>,

        /// Main inner obstacle
        #[clap(short = 'b', long)]
        obstacle: Option<String>,

        /// If-then plan for the obstacle
        #[clap(short, long)]
        plan: Option<String>,

        /// Repeat on these weekdays ("mon,wed,fri", "1,3,5" or "daily")
        #[clap(short = 'r', long)]
        repeat: Option<String>,

        /// Deadline (YYYY-MM-DD or YYYY-MM-DDTHH:MM, UTC)
        #[clap(short, long)]
        deadline: Option<String>,

        /// Folder to place the goal in
        #[clap(short, long)]
        folder: Option<i64>,

        /// Category tag
        #[clap(short, long)]
        category: Option<String>,
    },

    /// List goals with optional filtering
    List {
        /// Only goals in this folder
        #[clap(short, long)]
        folder: Option<i64>,

        /// Only goals with this category
        #[clap(short, long)]
        category: Option<String>,

        /// Sort order (defaults to the saved preference)
        #[clap(short, long)]
        sort: Option<String>,

        /// Hide completed goals
        #[clap(short, long)]
        active: bool,

        /// Limit the number of goals shown
        #[clap(short = 'n', long)]
        limit: Option<usize>,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// View a goal by ID
    View {
        /// ID of the goal to view
        id: i64,

        /// Format output as raw JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Toggle completion of a goal for today
    Complete {
        /// ID of the goal
        id: i64,
    },

    /// Edit an existing goal
    Edit {
        /// ID of the goal to edit
        id: i64,

        #[clap(short, long)]
        wish: Option<String>,

        #[clap(short, long)]
        outcome: Option<String>,

        #[clap(short = 'b', long)]
        obstacle: Option<String>,

        #[clap(short, long)]
        plan: Option<String>,

        /// New deadline
        #[clap(short, long, conflicts_with = "clear_deadline")]
        deadline: Option<String>,

        /// Remove the deadline
        #[clap(long)]
        clear_deadline: bool,

        /// Repeat on these weekdays ("mon,wed,fri", "1,3,5" or "daily")
        #[clap(short = 'r', long, conflicts_with = "no_repeat")]
        repeat: Option<String>,

        /// Stop repeating (resets the streak)
        #[clap(long)]
        no_repeat: bool,

        /// Category tag (empty string clears it)
        #[clap(short, long)]
        category: Option<String>,
    },

    /// Delete a goal by ID
    Delete {
        /// ID of the goal to delete
        id: i64,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Delete several goals at once
    BulkDelete {
        /// Comma-separated goal IDs
        #[clap(short, long, required_unless_present = "completed")]
        ids: Option<String>,

        /// Delete every completed goal
        #[clap(short, long)]
        completed: bool,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Search goals across wish, outcome, obstacle and plan
    Search {
        /// Search query text
        query: String,

        /// Limit the number of search results
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Show goals on a date, or a whole month
    Calendar {
        /// Date to show (YYYY-MM-DD, defaults to today)
        #[clap(conflicts_with = "month")]
        date: Option<String>,

        /// Month to show (YYYY-MM)
        #[clap(short, long)]
        month: Option<String>,
    },

    /// Folder operations
    Folder {
        #[clap(subcommand)]
        command: FolderCommands,
    },

    /// Build a share link for goals or a folder
    Share {
        /// Comma-separated goal IDs (all goals when omitted)
        #[clap(short, long, conflicts_with = "folder")]
        ids: Option<String>,

        /// Share a whole folder instead
        #[clap(short, long)]
        folder: Option<i64>,

        /// Password required to open a folder share
        #[clap(short, long, requires = "folder")]
        password: Option<String>,

        /// Never pass the link through the shortener
        #[clap(long)]
        no_shorten: bool,
    },

    /// Open a share link, optionally importing its goals
    Open {
        /// The share link
        link: String,

        /// Password for a protected folder share
        #[clap(short, long)]
        password: Option<String>,

        /// Import the goals instead of only showing them
        #[clap(short, long)]
        import: bool,

        /// How imported goals combine with existing ones
        #[clap(short, long, value_parser = ["replace", "merge"], default_value = "merge")]
        mode: String,
    },

    /// Export all goals to nova_goals.json
    Export {
        /// File or directory to write to
        #[clap(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Import goals from an exported JSON file
    Import {
        /// Path to the JSON file
        source: PathBuf,

        /// How imported goals combine with existing ones
        #[clap(short, long, value_parser = ["replace", "merge"], default_value = "replace")]
        mode: String,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Deadline notifications
    Notify {
        #[clap(subcommand)]
        command: NotifyCommands,
    },

    /// Invite someone to collaborate on a folder
    Invite {
        /// Folder to share
        folder: i64,

        /// Email address of the invitee
        email: String,

        /// viewer or editor
        #[clap(short, long, default_value = "viewer")]
        role: String,
    },

    /// List collaboration invitations
    Invitations,

    /// Accept a pending invitation
    Accept {
        /// Invitation ID
        id: String,
    },

    /// Remove a collaborator from a folder you own
    RemoveCollaborator {
        /// Folder ID
        folder: i64,

        /// User ID of the collaborator
        user: String,
    },

    /// Ask the AI advisor for outcome, obstacle and plan
    Suggest {
        /// The wish to expand
        wish: String,

        /// Create the goal with the suggestion
        #[clap(short, long)]
        create: bool,
    },

    /// Ask the AI advisor to order active goals by priority
    AiSort {
        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Configuration management
    Config {
        /// Show current configuration
        #[clap(short = 'S', long)]
        show: bool,

        /// Update a configuration setting (key=value)
        #[clap(short, long)]
        set: Option<String>,

        /// Reset configuration to defaults
        #[clap(short, long)]
        reset: bool,
    },

    /// Show or change stored preferences
    Prefs {
        /// Default sort order
        #[clap(long)]
        sort: Option<String>,

        /// Interface language code
        #[clap(long)]
        language: Option<String>,

        /// light or dark
        #[clap(long)]
        theme: Option<String>,

        /// AI service key
        #[clap(long, conflicts_with = "clear_api_key")]
        api_key: Option<String>,

        /// Forget the stored AI key
        #[clap(long)]
        clear_api_key: bool,

        /// Turn offline mode on or off
        #[clap(long)]
        offline: Option<bool>,
    },
}

/// Folder subcommands
#[derive(Subcommand)]
pub enum FolderCommands {
    /// Create a folder
    Create {
        name: String,

        /// Parent folder
        #[clap(short, long)]
        parent: Option<i64>,
    },

    /// List folders as a tree
    List,

    /// Rename a folder
    Rename { id: i64, name: String },

    /// Delete a folder; its goals and sub-folders move to its parent
    Delete {
        id: i64,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Move a goal into a folder
    Move {
        /// Goal ID
        goal: i64,

        /// Destination folder (top level when omitted)
        folder: Option<i64>,
    },
}

/// Notification subcommands
#[derive(Subcommand)]
pub enum NotifyCommands {
    /// Show or change notification settings
    Settings {
        #[clap(long, conflicts_with = "disable")]
        enable: bool,

        #[clap(long)]
        disable: bool,

        /// Comma-separated lead intervals, e.g. "1hour,1day,7days"
        #[clap(short, long)]
        intervals: Option<String>,

        /// Register a device token
        #[clap(long)]
        add_token: Option<String>,
    },

    /// Run one deadline check now
    Run,

    /// Keep checking deadlines on a timer until interrupted
    Watch {
        /// Hours between checks (defaults to the configured value)
        #[clap(long)]
        hours: Option<u32>,
    },
}
