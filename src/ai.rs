//! Generative-AI goal advisor.
//!
//! The advisor fills in the outcome, obstacle and plan for a wish, and orders
//! goals by priority. Requests are made once and never retried; offline mode
//! and a missing key are refused before anything goes over the network.
use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{Config, Goal, NovaError, Result};

/// Outcome, obstacle and plan proposed for a wish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WoopSuggestion {
    pub outcome: String,
    pub obstacle: String,
    pub plan: String,
}

#[async_trait]
pub trait GoalAdvisor: Send + Sync {
    /// Proposes outcome, obstacle and plan for a wish.
    async fn suggest(&self, wish: &str) -> Result<WoopSuggestion>;

    /// Goal ids in the order the advisor would work on them.
    async fn sort(&self, goals: &[Goal]) -> Result<Vec<i64>>;
}

/// Asks the advisor for a priority order and reconciles it with `goals`.
pub async fn prioritize(advisor: &dyn GoalAdvisor, goals: &[Goal]) -> Result<Vec<i64>> {
    if goals.len() < 2 {
        return Ok(goals.iter().map(|g| g.id).collect());
    }
    let proposed = advisor.sort(goals).await?;
    Ok(order_by_ids(goals, &proposed))
}

/// Keeps the proposed ids that name a goal (first occurrence only), then
/// appends the goals the proposal left out in their original order.
pub fn order_by_ids(goals: &[Goal], proposed: &[i64]) -> Vec<i64> {
    let known: HashSet<i64> = goals.iter().map(|g| g.id).collect();
    let mut seen = HashSet::new();
    let mut order: Vec<i64> = proposed
        .iter()
        .copied()
        .filter(|id| known.contains(id) && seen.insert(*id))
        .collect();
    order.extend(goals.iter().map(|g| g.id).filter(|id| !seen.contains(id)));
    order
}

/// Removes a surrounding Markdown code fence, if there is one.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) on the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Advisor backed by the Gemini `generateContent` endpoint.
pub struct GeminiAdvisor {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiAdvisor {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    /// Builds an advisor from configuration, refusing when offline or unkeyed.
    pub fn from_config(config: &Config, api_key: Option<String>, offline: bool) -> Result<Self> {
        if offline {
            return Err(NovaError::ApplicationError {
                message: "AI features are unavailable in offline mode".to_string(),
            });
        }
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| NovaError::ConfigError {
                message: "No AI API key set; use `nova prefs --api-key <KEY>` or NOVA_API_KEY"
                    .to_string(),
            })?;
        Self::new(
            config.ai_base_url.clone(),
            config.ai_model.clone(),
            api_key,
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        debug!("Calling {} ({} character prompt)", url, prompt.len());

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "contents": [{ "parts": [{ "text": prompt }] }] }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("AI service answered {}: {}", status, body);
            return Err(NovaError::RemoteService {
                message: format!("AI service answered {}", status),
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| NovaError::RemoteService {
                message: "AI service returned no text".to_string(),
            })
    }
}

fn unreadable(what: &str, e: impl std::fmt::Display) -> NovaError {
    NovaError::RemoteService {
        message: format!("AI {} was not in the expected format: {}", what, e),
    }
}

fn parse_id_list(text: &str) -> Result<Vec<i64>> {
    let value: Value = serde_json::from_str(strip_code_fences(text)).map_err(|e| unreadable("ordering", e))?;
    let Value::Array(items) = value else {
        return Err(unreadable("ordering", "expected a JSON array"));
    };
    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .collect())
}

#[async_trait]
impl GoalAdvisor for GeminiAdvisor {
    async fn suggest(&self, wish: &str) -> Result<WoopSuggestion> {
        let prompt = format!(
            "You are a coach using the WOOP method (Wish, Outcome, Obstacle, Plan).\n\
             For the wish below, answer with only a JSON object with the string fields \
             \"outcome\" (the best result of fulfilling it), \"obstacle\" (the main inner \
             obstacle) and \"plan\" (an if-then plan for the obstacle).\n\
             Answer in the language of the wish.\n\nWish: {}",
            wish.trim()
        );
        let text = self.generate(&prompt).await?;
        let suggestion: WoopSuggestion =
            serde_json::from_str(strip_code_fences(&text)).map_err(|e| unreadable("suggestion", e))?;
        info!("Received WOOP suggestion for '{}'", wish.trim());
        Ok(suggestion)
    }

    async fn sort(&self, goals: &[Goal]) -> Result<Vec<i64>> {
        let listing: Vec<Value> = goals
            .iter()
            .map(|g| {
                json!({
                    "id": g.id,
                    "wish": g.wish,
                    "deadline": g.deadline,
                    "isRecurring": g.is_recurring,
                    "streak": g.streak,
                })
            })
            .collect();
        let prompt = format!(
            "Order these goals by what the user should focus on first, considering \
             deadlines and momentum. Answer with only a JSON array of goal ids.\n\n{}",
            Value::Array(listing)
        );
        let text = self.generate(&prompt).await?;
        parse_id_list(&text)
    }
}
