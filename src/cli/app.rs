//! CLI module for the nova application
//!
//! This module handles the command-line interface for interacting with the
//! goal storage, sharing, notification and collaboration services.
use std::{
    io::{stdin, stdout, Write},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use chrono::{NaiveDate, Utc};
use console::style;
use log::{info, warn};
use tokio::sync::Mutex;

use crate::{
    calendar, describe_weekdays, export_to_path, folder_share_url, goals_share_url,
    import_from_path, parse_date, parse_ids, parse_intervals, parse_month, parse_share_url,
    parse_weekdays, prioritize, run_check_once, shorten_if_needed, truncate, AuthContext,
    CalendarReason, CollaborationService, Commands, Config, FolderCommands, FolderShare,
    GeminiAdvisor, Goal, GoalAdvisor, GoalEdit, GoalFilter, GoalStorage, HttpLinkShortener,
    ImportMode, InviteCollaboratorRequest, LinkShortener, LogDispatcher, LogMailer, NewGoal,
    NotificationScheduler, NotifyCommands, NovaError, RemoveCollaboratorRequest, Result,
    SharedLink, SortPreference, Theme,
};

/// CLI Application handler - processes CLI commands and interfaces with GoalStorage
pub struct App {
    /// The goal storage backend
    storage: Arc<Mutex<GoalStorage>>,

    /// Application configuration
    config: Config,

    /// Where `config --set` and `config --reset` write to
    config_path: Option<PathBuf>,

    /// Whether to display verbose output
    verbose: bool,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N]: ", prompt);
    stdout().flush().map_err(NovaError::Io)?;

    let mut input = String::new();
    stdin().read_line(&mut input).map_err(NovaError::Io)?;
    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

fn separator() -> String {
    let term_width = terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80);
    "-".repeat(term_width.min(50))
}

impl App {
    /// Create a new CLI application with the given storage backend and config
    pub fn new(storage: Arc<Mutex<GoalStorage>>, config: Config, config_path: Option<PathBuf>, verbose: bool) -> Self {
        Self {
            storage,
            config,
            config_path,
            verbose,
        }
    }

    /// Run the CLI application with the given command
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Add {
                wish,
                outcome,
                obstacle,
                plan,
                repeat,
                deadline,
                folder,
                category,
            } => {
                let draft = NewGoal {
                    wish,
                    outcome: outcome.unwrap_or_default(),
                    obstacle: obstacle.unwrap_or_default(),
                    plan: plan.unwrap_or_default(),
                    recurring_days: repeat.as_deref().map(parse_weekdays).transpose()?,
                    deadline,
                    folder_id: folder,
                    category,
                };
                self.add_goal(draft).await?
            }

            Commands::List {
                folder,
                category,
                sort,
                active,
                limit,
                json,
            } => {
                let filter = GoalFilter {
                    folder_id: folder,
                    category,
                    active_only: active,
                    recurring_only: false,
                };
                self.list_goals(filter, sort, limit, json).await?
            }

            Commands::View { id, json } => self.view_goal(id, json).await?,

            Commands::Complete { id } => self.complete_goal(id).await?,

            Commands::Edit {
                id,
                wish,
                outcome,
                obstacle,
                plan,
                deadline,
                clear_deadline,
                repeat,
                no_repeat,
                category,
            } => {
                let recurring_days = match (repeat, no_repeat) {
                    (Some(days), _) => Some(Some(parse_weekdays(&days)?)),
                    (None, true) => Some(None),
                    (None, false) => None,
                };
                let edit = GoalEdit {
                    wish,
                    outcome,
                    obstacle,
                    plan,
                    deadline: if clear_deadline {
                        Some(None)
                    } else {
                        deadline.map(Some)
                    },
                    recurring_days,
                    category: category.map(|c| (!c.trim().is_empty()).then_some(c)),
                    folder_id: None,
                };
                self.edit_goal(id, edit).await?
            }

            Commands::Delete { id, force } => self.handle_delete(id, force).await?,

            Commands::BulkDelete {
                ids,
                completed,
                force,
            } => self.handle_bulk_delete(ids, completed, force).await?,

            Commands::Search { query, limit, json } => self.handle_search(query, limit, json).await?,

            Commands::Calendar { date, month } => self.handle_calendar(date, month).await?,

            Commands::Folder { command } => self.handle_folder(command).await?,

            Commands::Share {
                ids,
                folder,
                password,
                no_shorten,
            } => self.handle_share(ids, folder, password, no_shorten).await?,

            Commands::Open {
                link,
                password,
                import,
                mode,
            } => self.handle_open(link, password, import, mode.parse()?).await?,

            Commands::Export { output } => {
                let goals = self.storage.lock().await.all_goals()?;
                let path = export_to_path(&goals, &output)?;
                println!("Exported {} goals to {}", goals.len(), path.display());
            }

            Commands::Import {
                source,
                mode,
                force,
            } => self.handle_import(source, mode.parse()?, force).await?,

            Commands::Notify { command } => self.handle_notify(command).await?,

            Commands::Invite {
                folder,
                email,
                role,
            } => self.handle_invite(folder, email, role).await?,

            Commands::Invitations => self.list_invitations().await?,

            Commands::Accept { id } => {
                let response = self
                    .collaboration()
                    .accept_invitation(self.auth().as_ref(), &id)
                    .await?;
                println!("{}", response.message);
            }

            Commands::RemoveCollaborator { folder, user } => {
                let response = self
                    .collaboration()
                    .remove_collaborator(
                        self.auth().as_ref(),
                        RemoveCollaboratorRequest {
                            folder_id: folder,
                            user_id: user,
                        },
                    )
                    .await?;
                println!("{}", response.message);
            }

            Commands::Suggest { wish, create } => self.handle_suggest(wish, create).await?,

            Commands::AiSort { json } => self.handle_ai_sort(json).await?,

            Commands::Config { show, set, reset } => {
                self.handle_config(show, set, reset)?;
            }

            Commands::Prefs {
                sort,
                language,
                theme,
                api_key,
                clear_api_key,
                offline,
            } => {
                self.handle_prefs(sort, language, theme, api_key, clear_api_key, offline)
                    .await?
            }
        }

        Ok(())
    }

    /// Signed-in identity; an empty configured email means signed out.
    fn auth(&self) -> Option<AuthContext> {
        (!self.config.user_email.trim().is_empty()).then(|| AuthContext {
            user_id: self.config.user_id.clone(),
            email: self.config.user_email.clone(),
        })
    }

    fn collaboration(&self) -> CollaborationService {
        CollaborationService::new(
            Arc::clone(&self.storage),
            Arc::new(LogMailer),
            self.config.share_base_url.clone(),
        )
    }

    async fn add_goal(&self, draft: NewGoal) -> Result<()> {
        let goal = self.storage.lock().await.create_goal(draft, Utc::now())?;
        println!("Goal created with ID: {}", goal.id);
        if self.verbose {
            self.display_goal_detail(&goal);
        }
        Ok(())
    }

    async fn list_goals(&self, filter: GoalFilter, sort: Option<String>, limit: Option<usize>, json: bool) -> Result<()> {
        let storage = self.storage.lock().await;
        let sort = match sort {
            Some(s) => s.parse()?,
            None => storage.sort_preference()?,
        };
        let mut goals = storage.list_goals(&filter, sort)?;
        drop(storage);

        if let Some(limit) = limit {
            goals.truncate(limit);
        }

        if json {
            println!("{}", serde_json::to_string_pretty(&goals)?);
            return Ok(());
        }
        if goals.is_empty() {
            println!("No goals found matching the criteria.");
            return Ok(());
        }

        println!(
            "Found {} goals (sorted by {}):\n",
            goals.len(),
            sort.as_str()
        );
        self.display_goals_text(&goals);
        Ok(())
    }

    /// Display goals in text format
    fn display_goals_text(&self, goals: &[Goal]) {
        for (i, goal) in goals.iter().enumerate() {
            if i > 0 {
                println!("{}", separator());
            }
            self.display_goal_line(goal);
        }
    }

    fn display_goal_line(&self, goal: &Goal) {
        let mark = if goal.completed {
            style("[x]").green()
        } else {
            style("[ ]").dim()
        };
        println!("{} {} {}", mark, goal.id, style(&goal.wish).bold());

        let mut details = Vec::new();
        if goal.is_recurring {
            details.push(format!(
                "repeats {} | streak {}",
                describe_weekdays(&goal.recurring_days),
                goal.streak
            ));
        }
        if let Some(deadline) = goal.deadline.as_deref().filter(|d| !d.is_empty()) {
            details.push(format!("due {}", deadline));
        }
        if let Some(category) = &goal.category {
            details.push(format!("#{}", category));
        }
        if !details.is_empty() {
            println!("    {}", style(details.join(" | ")).cyan());
        }
        if !goal.plan.is_empty() {
            println!("    Plan: {}", truncate(&goal.plan, 80));
        }
    }

    fn display_goal_detail(&self, goal: &Goal) {
        println!("ID:       {}", goal.id);
        println!("Wish:     {}", style(&goal.wish).bold());
        println!("Outcome:  {}", goal.outcome);
        println!("Obstacle: {}", goal.obstacle);
        println!("Plan:     {}", goal.plan);
        if goal.is_recurring {
            println!("Repeats:  {}", describe_weekdays(&goal.recurring_days));
            println!("Streak:   {}", goal.streak);
        }
        if let Some(deadline) = &goal.deadline {
            println!("Deadline: {}", deadline);
        }
        if let Some(last) = goal.last_completed_date {
            println!("Last completed: {}", last);
        }
        println!(
            "Status:   {}",
            if goal.completed { "completed" } else { "open" }
        );
        if let Some(category) = &goal.category {
            println!("Category: {}", category);
        }
        if let Some(folder) = goal.folder_id {
            println!("Folder:   {}", folder);
        }
        println!("Created:  {}", goal.created_at.format("%Y-%m-%d %H:%M:%S"));
    }

    async fn view_goal(&self, id: i64, json: bool) -> Result<()> {
        let goal = self
            .storage
            .lock()
            .await
            .get_goal(id)
            .ok_or(NovaError::GoalNotFound { id })?;

        if json {
            println!("{}", serde_json::to_string_pretty(&goal)?);
        } else {
            self.display_goal_detail(&goal);
        }
        Ok(())
    }

    async fn complete_goal(&self, id: i64) -> Result<()> {
        let (goal, change) = self.storage.lock().await.toggle_goal(id, today())?;

        if change.completed {
            println!("{} {}", style("Completed:").green(), goal.wish);
        } else {
            println!("{} {}", style("Reopened:").yellow(), goal.wish);
        }
        if goal.is_recurring && change.streak_before != change.streak_after {
            println!(
                "Streak: {} -> {}",
                change.streak_before, change.streak_after
            );
        }
        Ok(())
    }

    async fn edit_goal(&self, id: i64, edit: GoalEdit) -> Result<()> {
        let goal = self.storage.lock().await.update_goal(id, edit)?;
        println!("Goal {} updated successfully", goal.id);
        if self.verbose {
            self.display_goal_detail(&goal);
        }
        Ok(())
    }

    async fn handle_delete(&self, id: i64, force: bool) -> Result<()> {
        let goal = self
            .storage
            .lock()
            .await
            .get_goal(id)
            .ok_or(NovaError::GoalNotFound { id })?;

        if !force {
            println!("You are about to delete the following goal:");
            self.display_goal_line(&goal);
            println!("\nThis action cannot be undone!");
            if !confirm("Are you sure you want to delete this goal?")? {
                println!("Deletion cancelled.");
                return Ok(());
            }
        }

        self.storage.lock().await.delete_goal(id)?;
        println!("Goal '{}' ({}) has been permanently deleted.", goal.wish, goal.id);
        Ok(())
    }

    async fn handle_bulk_delete(&self, ids: Option<String>, completed: bool, force: bool) -> Result<()> {
        let ids = ids.as_deref().map(parse_ids).transpose()?.unwrap_or_default();

        if !force {
            let what = match (ids.is_empty(), completed) {
                (false, true) => format!("{} goals and every completed goal", ids.len()),
                (false, false) => format!("{} goals", ids.len()),
                (true, _) => "every completed goal".to_string(),
            };
            if !confirm(&format!("Delete {}?", what))? {
                println!("Deletion cancelled.");
                return Ok(());
            }
        }

        let storage = self.storage.lock().await;
        let mut removed = 0;
        if !ids.is_empty() {
            removed += storage.bulk_delete(&ids)?;
        }
        if completed {
            removed += storage.delete_completed()?;
        }
        println!("Deleted {} goals.", removed);
        Ok(())
    }

    async fn handle_search(&self, query: String, limit: usize, json: bool) -> Result<()> {
        let mut results = self.storage.lock().await.search_goals(&query)?;
        results.truncate(limit);

        if json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else if results.is_empty() {
            println!("No goals found matching query: \"{}\"", query);
        } else {
            self.display_goals_text(&results);
            println!("\nFound {} matching goals.", results.len());
        }
        Ok(())
    }

    async fn handle_calendar(&self, date: Option<String>, month: Option<String>) -> Result<()> {
        let goals = self.storage.lock().await.all_goals()?;

        if let Some(month) = month {
            let (year, month) = parse_month(&month)?;
            let view = calendar::month_view(&goals, year, month)?;
            if view.is_empty() {
                println!("Nothing planned for {}-{:02}.", year, month);
            }
            for (day, entries) in view {
                println!("{}", style(day.format("%a %Y-%m-%d")).bold());
                for entry in entries {
                    println!("    {}", entry.goal.wish);
                }
            }
            return Ok(());
        }

        let day = match date {
            Some(d) => parse_date(&d)?,
            None => today(),
        };
        let entries = calendar::goals_on(&goals, day);
        println!("{}", style(day.format("%A %Y-%m-%d")).bold());
        if entries.is_empty() {
            println!("Nothing planned.");
        }
        for entry in entries {
            let tag = match entry.reason {
                CalendarReason::Scheduled => style("repeat").cyan(),
                CalendarReason::Deadline => style("due").red(),
            };
            println!("  [{}] {} {}", tag, entry.goal.id, entry.goal.wish);
        }
        Ok(())
    }

    async fn handle_folder(&self, command: FolderCommands) -> Result<()> {
        let storage = self.storage.lock().await;
        match command {
            FolderCommands::Create { name, parent } => {
                let folder = storage.create_folder(name, parent, Utc::now())?;
                println!("Folder '{}' created with ID: {}", folder.name, folder.id);
            }
            FolderCommands::List => {
                let folders = storage.list_folders()?;
                if folders.is_empty() {
                    println!("No folders yet.");
                }
                for folder in &folders {
                    let path = storage.folder_path(folder.id)?;
                    let count = storage
                        .all_goals()?
                        .iter()
                        .filter(|g| g.folder_id == Some(folder.id))
                        .count();
                    let shared = if folder.collaborators.is_empty() {
                        String::new()
                    } else {
                        format!(" (shared with {})", folder.collaborators.len())
                    };
                    println!("{} {} [{} goals]{}", folder.id, path.join(" / "), count, shared);
                }
            }
            FolderCommands::Rename { id, name } => {
                let folder = storage.rename_folder(id, name)?;
                println!("Folder {} renamed to '{}'", folder.id, folder.name);
            }
            FolderCommands::Delete { id, force } => {
                let folder = storage
                    .get_folder(id)
                    .ok_or(NovaError::FolderNotFound { id })?;
                if !force
                    && !confirm(&format!(
                        "Delete folder '{}'? Its goals move to the parent folder.",
                        folder.name
                    ))?
                {
                    println!("Deletion cancelled.");
                    return Ok(());
                }
                storage.delete_folder(id)?;
                println!("Folder '{}' deleted.", folder.name);
            }
            FolderCommands::Move { goal, folder } => {
                let goal = storage.move_goal(goal, folder)?;
                match folder {
                    Some(f) => println!("Moved '{}' into folder {}", goal.wish, f),
                    None => println!("Moved '{}' to the top level", goal.wish),
                }
            }
        }
        Ok(())
    }

    fn shortener(&self) -> Option<Box<dyn LinkShortener>> {
        let endpoint = self.config.shortener_endpoint.as_deref()?;
        match HttpLinkShortener::new(endpoint, Duration::from_secs(self.config.http_timeout_secs)) {
            Ok(shortener) => Some(Box::new(shortener)),
            Err(e) => {
                warn!("Link shortener unavailable: {}", e);
                None
            }
        }
    }

    async fn handle_share(&self, ids: Option<String>, folder: Option<i64>, password: Option<String>, no_shorten: bool) -> Result<()> {
        let storage = self.storage.lock().await;
        let offline = storage.offline_mode()?;
        let all = storage.all_goals()?;

        let link = match folder {
            Some(folder_id) => {
                let folder = storage
                    .get_folder(folder_id)
                    .ok_or(NovaError::FolderNotFound { id: folder_id })?;
                let share = FolderShare {
                    folder_id,
                    folder_name: folder.name,
                    owner_email: self.config.user_email.clone(),
                    goals: all
                        .into_iter()
                        .filter(|g| g.folder_id == Some(folder_id))
                        .collect(),
                    password,
                };
                folder_share_url(&self.config.share_base_url, &share)?
            }
            None => {
                let goals: Vec<Goal> = match ids {
                    Some(ids) => {
                        let ids = parse_ids(&ids)?;
                        for id in &ids {
                            if !all.iter().any(|g| g.id == *id) {
                                return Err(NovaError::GoalNotFound { id: *id });
                            }
                        }
                        all.into_iter().filter(|g| ids.contains(&g.id)).collect()
                    }
                    None => all,
                };
                goals_share_url(&self.config.share_base_url, &goals)?
            }
        };
        drop(storage);

        let shortener = if no_shorten { None } else { self.shortener() };
        let link = shorten_if_needed(
            link,
            self.config.shorten_threshold,
            shortener.as_deref(),
            offline,
        )
        .await;
        println!("{}", link);
        Ok(())
    }

    async fn handle_open(&self, link: String, password: Option<String>, import: bool, mode: ImportMode) -> Result<()> {
        let goals = match parse_share_url(&link)? {
            SharedLink::Goals(goals) => goals,
            SharedLink::Folder(share) => {
                let goals = share.unlock(password.as_deref())?.to_vec();
                println!(
                    "Folder '{}' shared by {}",
                    style(&share.folder_name).bold(),
                    if share.owner_email.is_empty() {
                        "an unknown owner"
                    } else {
                        share.owner_email.as_str()
                    }
                );
                goals
            }
        };

        if !import {
            if goals.is_empty() {
                println!("The link holds no goals.");
            }
            self.display_goals_text(&goals);
            println!("\nRun again with --import to add these {} goals.", goals.len());
            return Ok(());
        }

        let summary = self
            .storage
            .lock()
            .await
            .import_goals(goals, mode, today())?;
        println!(
            "Imported {} goals ({} new, {} updated).",
            summary.total, summary.added, summary.updated
        );
        Ok(())
    }

    async fn handle_import(&self, source: PathBuf, mode: ImportMode, force: bool) -> Result<()> {
        let goals = import_from_path(&source)?;
        println!("Found {} goals in {}", goals.len(), source.display());

        if mode == ImportMode::Replace && !force {
            let current = self.storage.lock().await.all_goals()?.len();
            if current > 0
                && !confirm(&format!(
                    "Replace your {} current goals with the imported ones?",
                    current
                ))?
            {
                println!("Import cancelled.");
                return Ok(());
            }
        }

        let summary = self
            .storage
            .lock()
            .await
            .import_goals(goals, mode, today())?;

        println!("\nImport summary:");
        println!("  Goals in file:   {}", summary.total);
        println!("  Added:           {}", summary.added);
        println!("  Updated:         {}", summary.updated);
        println!("  Removed:         {}", summary.removed);
        Ok(())
    }

    async fn handle_notify(&self, command: NotifyCommands) -> Result<()> {
        match command {
            NotifyCommands::Settings {
                enable,
                disable,
                intervals,
                add_token,
            } => {
                let storage = self.storage.lock().await;
                let mut settings = storage.notification_settings()?;
                let mut changed = false;
                if enable || disable {
                    settings.enabled = enable;
                    changed = true;
                }
                if let Some(intervals) = intervals {
                    settings.intervals = parse_intervals(&intervals)?;
                    changed = true;
                }
                if let Some(token) = add_token.filter(|t| !t.trim().is_empty()) {
                    if !settings.device_tokens.contains(&token) {
                        settings.device_tokens.push(token);
                    }
                    changed = true;
                }
                if changed {
                    storage.set_notification_settings(&settings)?;
                }

                let intervals: Vec<&str> = settings.intervals.iter().map(|i| i.key()).collect();
                println!("Enabled:   {}", settings.enabled);
                println!(
                    "Intervals: {}",
                    if intervals.is_empty() {
                        "none".to_string()
                    } else {
                        intervals.join(", ")
                    }
                );
                println!("Devices:   {}", settings.device_tokens.len());
            }
            NotifyCommands::Run => {
                let storage = self.storage.lock().await;
                let summary = run_check_once(&storage, Arc::new(LogDispatcher), Utc::now()).await?;
                println!(
                    "Checked {} goals: {} reminders sent, {} already sent today, {} failed.",
                    summary.goals_scanned, summary.sent, summary.skipped_duplicates, summary.failed
                );
            }
            NotifyCommands::Watch { hours } => {
                let hours = hours.unwrap_or(self.config.notification_check_hours);
                let mut scheduler = NotificationScheduler::new(hours, Arc::new(LogDispatcher));
                scheduler.set_storage(Arc::clone(&self.storage));
                scheduler.start().await?;
                println!(
                    "Checking deadlines every {} hour(s). Press Ctrl-C to stop.",
                    hours.max(1)
                );

                tokio::signal::ctrl_c().await.map_err(NovaError::Io)?;
                info!("Interrupt received");
                scheduler.stop().await?;

                let status = scheduler.get_status();
                println!("Stopped. {} reminders sent.", status.total_sent);
            }
        }
        Ok(())
    }

    async fn handle_invite(&self, folder_id: i64, email: String, role: String) -> Result<()> {
        let folder_name = self
            .storage
            .lock()
            .await
            .get_folder(folder_id)
            .map(|f| f.name)
            .ok_or(NovaError::FolderNotFound { id: folder_id })?;

        let request = InviteCollaboratorRequest {
            folder_id,
            folder_name,
            invitee_email: email,
            inviter_email: self.config.user_email.clone(),
            role,
        };
        let response = self
            .collaboration()
            .invite_collaborator(self.auth().as_ref(), request, Utc::now())
            .await?;
        println!("{}", response.message);
        Ok(())
    }

    async fn list_invitations(&self) -> Result<()> {
        let invitations = self.collaboration().list_invitations().await?;
        if invitations.is_empty() {
            println!("No invitations.");
        }
        for invitation in invitations {
            println!(
                "{} | {} -> {} | '{}' as {} | {:?}",
                invitation.id,
                invitation.inviter_email,
                invitation.invitee_email,
                invitation.folder_name,
                invitation.role.as_str(),
                invitation.status
            );
        }
        Ok(())
    }

    async fn advisor(&self) -> Result<GeminiAdvisor> {
        let storage = self.storage.lock().await;
        GeminiAdvisor::from_config(&self.config, storage.api_key()?, storage.offline_mode()?)
    }

    async fn handle_suggest(&self, wish: String, create: bool) -> Result<()> {
        let advisor = self.advisor().await?;
        let suggestion = advisor.suggest(&wish).await?;

        println!("Wish:     {}", style(&wish).bold());
        println!("Outcome:  {}", suggestion.outcome);
        println!("Obstacle: {}", suggestion.obstacle);
        println!("Plan:     {}", suggestion.plan);

        if create {
            self.add_goal(NewGoal {
                wish,
                outcome: suggestion.outcome,
                obstacle: suggestion.obstacle,
                plan: suggestion.plan,
                ..Default::default()
            })
            .await?;
        }
        Ok(())
    }

    async fn handle_ai_sort(&self, json: bool) -> Result<()> {
        let advisor = self.advisor().await?;
        let filter = GoalFilter {
            active_only: true,
            ..Default::default()
        };
        let goals = self
            .storage
            .lock()
            .await
            .list_goals(&filter, SortPreference::Oldest)?;

        let order = prioritize(&advisor, &goals).await?;
        if json {
            println!("{}", serde_json::to_string(&order)?);
            return Ok(());
        }
        for (rank, id) in order.iter().enumerate() {
            if let Some(goal) = goals.iter().find(|g| g.id == *id) {
                println!("{:>2}. {} {}", rank + 1, goal.id, goal.wish);
            }
        }
        Ok(())
    }

    /// Without `--set` or `--reset` the effective configuration is printed.
    fn config_file(&self) -> Result<PathBuf> {
        self.config_path
            .clone()
            .or_else(Config::default_path)
            .ok_or_else(|| NovaError::ConfigError {
                message: "No configuration file location available".to_string(),
            })
    }

    /// Applies `--reset` or `--set`, then prints the resulting configuration
    /// when asked to or when nothing was changed.
    fn handle_config(&self, show: bool, set: Option<String>, reset: bool) -> Result<Config> {
        let changing = reset || set.is_some();
        let config = if reset {
            let path = self.config_file()?;
            let fresh = Config::default();
            fresh.save(&path)?;
            println!("Configuration reset to defaults at {}", path.display());
            fresh
        } else if let Some(pair) = set {
            let mut updated = self.config.clone();
            updated.set_from_pair(&pair)?;
            let path = self.config_file()?;
            updated.save(&path)?;
            println!("Updated {}", pair.trim());
            updated
        } else {
            self.config.clone()
        };

        if show || !changing {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Ok(config)
    }

    async fn handle_prefs(
        &self,
        sort: Option<String>,
        language: Option<String>,
        theme: Option<String>,
        api_key: Option<String>,
        clear_api_key: bool,
        offline: Option<bool>,
    ) -> Result<()> {
        let storage = self.storage.lock().await;

        if let Some(sort) = sort {
            storage.set_sort_preference(sort.parse::<SortPreference>()?)?;
        }
        if let Some(language) = language {
            storage.set_language(language.trim())?;
        }
        if let Some(theme) = theme {
            storage.set_theme(theme.parse::<Theme>()?)?;
        }
        if let Some(key) = api_key {
            storage.set_api_key(Some(key.trim()))?;
        }
        if clear_api_key {
            storage.set_api_key(None)?;
        }
        if let Some(offline) = offline {
            storage.set_offline_mode(offline)?;
        }

        println!("Sort:     {}", storage.sort_preference()?.as_str());
        println!("Language: {}", storage.language()?);
        println!("Theme:    {:?}", storage.theme()?);
        println!(
            "API key:  {}",
            if storage.api_key()?.is_some() { "set" } else { "not set" }
        );
        println!("Offline:  {}", storage.offline_mode()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(dir: &tempfile::TempDir) -> App {
        let config = Config {
            data_dir: dir.path().join("data"),
            ..Config::default()
        };
        let mut storage = GoalStorage::new(config.clone()).unwrap();
        storage.initialize(Utc::now().date_naive()).unwrap();
        App::new(
            Arc::new(Mutex::new(storage)),
            config,
            Some(dir.path().join("config.json")),
            false,
        )
    }

    #[test]
    fn config_set_and_reset_write_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);
        let path = dir.path().join("config.json");

        let updated = app
            .handle_config(false, Some("notification_log_days=7".to_string()), false)
            .unwrap();
        assert_eq!(updated.notification_log_days, 7);
        assert_eq!(Config::load_or_create(&path).unwrap().notification_log_days, 7);

        let reset = app.handle_config(true, None, true).unwrap();
        assert_eq!(reset, Config::default());
        assert_eq!(Config::load_or_create(&path).unwrap(), Config::default());
    }

    #[test]
    fn config_show_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);
        let shown = app.handle_config(true, None, false).unwrap();
        assert_eq!(shown.data_dir, dir.path().join("data"));
        assert!(!dir.path().join("config.json").exists());
    }
}
