use std::collections::BTreeSet;

use chrono::NaiveDate;
use log::trace;

use crate::{LeadInterval, NovaError, Result};

const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Parses a weekday list such as `"mon,wed,fri"`, `"1,3,5"` or `"daily"`.
///
/// `daily` (or an empty list) yields the empty set, which schedules every day.
pub fn parse_weekdays(input: &str) -> Result<BTreeSet<u8>> {
    let trimmed = input.trim().to_lowercase();
    if trimmed.is_empty() || trimmed == "daily" || trimmed == "everyday" {
        return Ok(BTreeSet::new());
    }

    let mut days = BTreeSet::new();
    for part in trimmed.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let day = match part.parse::<u8>() {
            Ok(n) if n <= 6 => n,
            Ok(n) => {
                return Err(NovaError::validation(format!(
                    "Weekday {} is out of range 0-6",
                    n
                )))
            }
            Err(_) => WEEKDAY_NAMES
                .iter()
                .position(|name| part.starts_with(name))
                .map(|i| i as u8)
                .ok_or_else(|| NovaError::validation(format!("Unknown weekday '{}'", part)))?,
        };
        days.insert(day);
    }
    trace!("Parsed weekdays {:?} from '{}'", days, input);
    Ok(days)
}

/// Short names for a weekday set, e.g. `Mon, Wed`. The empty set reads `every day`.
pub fn describe_weekdays(days: &BTreeSet<u8>) -> String {
    if days.is_empty() || days.len() == 7 {
        return "every day".to_string();
    }
    days.iter()
        .filter_map(|d| WEEKDAY_NAMES.get(*d as usize))
        .map(|name| {
            let mut chars = name.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// Helper for comma-separated id lists
pub fn parse_ids(input: &str) -> Result<Vec<i64>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| NovaError::validation(format!("'{}' is not a goal id", s)))
        })
        .collect()
}

/// Parses a comma-separated list of lead intervals.
pub fn parse_intervals(input: &str) -> Result<Vec<LeadInterval>> {
    let mut intervals = Vec::new();
    for part in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let interval: LeadInterval = part.parse()?;
        if !intervals.contains(&interval) {
            intervals.push(interval);
        }
    }
    Ok(intervals)
}

pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| NovaError::validation(format!("'{}' is not a YYYY-MM-DD date", input)))
}

/// Parses `YYYY-MM` into year and month.
pub fn parse_month(input: &str) -> Result<(i32, u32)> {
    let invalid = || NovaError::validation(format!("'{}' is not a YYYY-MM month", input));
    let (year, month) = input.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

/// Cuts a string to at most `max` characters, adding an ellipsis when shortened.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}
