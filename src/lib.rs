//! Nova goal planner library
//!
//! This library tracks WOOP (wish, outcome, obstacle, plan) goals with recurring
//! streaks, deadline reminders, folders shared with collaborators, and goal lists
//! that travel as JSON files or Base64 share links.

mod ai;
mod calendar;
mod cli;
mod collaboration;
mod config;
mod errors;
mod goal;
mod helper;
mod notification;
mod notification_scheduler;
mod share;
mod storage;
mod streak;
mod transfer;
mod types;

// Re-export key components
pub use ai::*;
pub use calendar::*;
pub use cli::*;
pub use collaboration::*;
pub use config::*;
pub use errors::*;
pub use goal::*;
pub use helper::*;
pub use notification::*;
pub use notification_scheduler::*;
pub use share::*;
pub use storage::*;
pub use streak::*;
pub use transfer::*;
pub use types::*;
