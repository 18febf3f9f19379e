//! Chat relay to an external completion service.
//!
//! The relay adds nothing to the model's reasoning: it wraps the user's
//! question with a system prompt carrying the recent project context,
//! forwards the conversation to a [`CompletionProvider`], and keeps a short
//! rolling history so follow-up questions have context.
//!
//! Questions that look like project-management work (they mention meetings,
//! milestones, decisions, ...) are also logged as a meeting record, so the
//! conversation shows up in later summaries.
//!
//! # Providers
//!
//! - **[`DisabledProvider`]**: every call fails; used when `chat.provider =
//!   "disabled"`.
//! - **[`AnthropicProvider`]**: calls the Anthropic Messages API with
//!   retry and exponential backoff on 429, 5xx and network errors.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::models::MeetingRecord;
use crate::store::RecordStore;
use crate::summary::{render_context, summarize};

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Used when the project summary cannot be produced.
pub const DEFAULT_CONTEXT: &str = "No recent project activity is available. \
Answer from general software project management practice.";

const PM_KEYWORDS: &[&str] = &[
    "meeting",
    "milestone",
    "requirement",
    "progress",
    "task",
    "action item",
    "decision",
    "strategy",
];

const LOGGED_RESPONSE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Everything a provider needs for one completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

/// An external completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Builds the provider selected by `chat.provider`.
pub fn create_provider(config: &ChatConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "anthropic" => Ok(Arc::new(AnthropicProvider::new(config)?)),
        other => bail!("Unknown chat provider: {}", other),
    }
}

// ============ Disabled Provider ============

pub struct DisabledProvider;

#[async_trait]
impl CompletionProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        bail!("Chat provider is disabled")
    }
}

// ============ Anthropic Provider ============

/// Anthropic Messages API client.
///
/// Requires `ANTHROPIC_API_KEY` in the environment (a `.env` file is loaded
/// at startup).
pub struct AnthropicProvider {
    api_key: String,
    url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    max_retries: u32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_key,
            url: config
                .api_url
                .clone()
                .unwrap_or_else(|| ANTHROPIC_URL.to_string()),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    /// Sends the request, retrying 429/5xx/network failures with backoff
    /// 1s, 2s, 4s, ... Other 4xx responses fail immediately.
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": request.system,
            "messages": request.messages,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, ?delay, "retrying completion request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_anthropic_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, attempt, "completion request failed, will retry");
                        last_err = Some(anyhow::anyhow!(
                            "Anthropic API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    bail!("Anthropic API error {}: {}", status, body_text);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "completion request failed, will retry");
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Completion failed after retries")))
    }
}

/// Concatenates the `text` blocks of a Messages API response.
fn parse_anthropic_response(json: &serde_json::Value) -> Result<String> {
    let blocks = json
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Anthropic response: missing content array"))?;

    let text: Vec<&str> = blocks
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        bail!("Invalid Anthropic response: no text content");
    }
    Ok(text.join("\n"))
}

// ============ Conversation history ============

/// Rolling message history; the oldest messages are dropped once full.
///
/// The kept history always opens with a `user` turn, since completion APIs
/// reject conversations that start with the assistant.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    max_len: usize,
    messages: VecDeque<ChatMessage>,
}

impl ConversationHistory {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(1),
            messages: VecDeque::new(),
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        while self.messages.len() > self.max_len {
            self.messages.pop_front();
        }
        while self.messages.front().is_some_and(|m| m.role != "user") {
            self.messages.pop_front();
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

// ============ Relay ============

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("chat provider is disabled")]
    Disabled,

    #[error("completion failed: {0:#}")]
    Upstream(anyhow::Error),
}

/// The relay's answer to one query.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub response: String,
    /// Id of the meeting record logged for this exchange, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged_meeting: Option<String>,
}

pub struct ChatRelay {
    store: RecordStore,
    provider: Arc<dyn CompletionProvider>,
    history: Mutex<ConversationHistory>,
    window_days: i64,
}

impl ChatRelay {
    pub fn new(
        store: RecordStore,
        provider: Arc<dyn CompletionProvider>,
        max_history: usize,
        window_days: i64,
    ) -> Self {
        Self {
            store,
            provider,
            history: Mutex::new(ConversationHistory::new(max_history)),
            window_days,
        }
    }

    /// Forwards `query` with project context and the rolling history.
    ///
    /// History only records exchanges that succeeded.
    pub async fn ask(&self, query: &str) -> Result<ChatReply, ChatError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        if !self.provider.is_enabled() {
            return Err(ChatError::Disabled);
        }

        let mut messages = self.history();
        messages.push(ChatMessage::user(query));
        let request = CompletionRequest {
            system: system_prompt(&self.project_context().await),
            messages,
        };

        let response = self
            .provider
            .complete(&request)
            .await
            .map_err(ChatError::Upstream)?;

        {
            let mut history = self.lock_history();
            history.push(ChatMessage::user(query));
            history.push(ChatMessage::assistant(response.clone()));
        }

        let logged_meeting = if is_project_management_query(query) {
            self.log_interaction(query, &response).await
        } else {
            None
        };

        info!(
            provider = self.provider.name(),
            chars = response.len(),
            logged = logged_meeting.is_some(),
            "chat query answered"
        );
        Ok(ChatReply {
            response,
            logged_meeting,
        })
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.lock_history().messages()
    }

    pub fn reset(&self) {
        self.lock_history().clear();
        debug!("conversation history cleared");
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, ConversationHistory> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store reads run on the blocking pool.
    async fn project_context(&self) -> String {
        let store = self.store.clone();
        let window_days = self.window_days;
        let summary =
            tokio::task::spawn_blocking(move || summarize(&store, Utc::now(), window_days)).await;

        match summary {
            Ok(Ok(summary)) => render_context(&summary),
            Ok(Err(e)) => {
                warn!(error = %e, "could not build project context, using default");
                DEFAULT_CONTEXT.to_string()
            }
            Err(e) => {
                warn!(error = %e, "project context task failed, using default");
                DEFAULT_CONTEXT.to_string()
            }
        }
    }

    async fn log_interaction(&self, query: &str, response: &str) -> Option<String> {
        let record = MeetingRecord {
            id: String::new(),
            timestamp: Utc::now(),
            participants: vec!["User".to_string(), "AI Assistant".to_string()],
            key_discussions: vec![query.to_string()],
            action_items: vec![truncate_chars(response, LOGGED_RESPONSE_CHARS)],
            decisions: vec!["Recorded AI-assisted project management interaction".to_string()],
            next_steps: vec![],
        };
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || store.write(record)).await {
            Ok(Ok(id)) => Some(id),
            Ok(Err(e)) => {
                warn!(error = %e, "could not log chat interaction");
                None
            }
            Err(e) => {
                warn!(error = %e, "chat interaction logging task failed");
                None
            }
        }
    }
}

pub fn system_prompt(project_context: &str) -> String {
    format!(
        "You are an AI project management assistant helping to guide and document a software project.

Project Context:
{}

Your responsibilities:
- Provide clear, concise, and actionable advice
- Help document meetings, requirements, and milestones
- Offer insights into project progress and potential challenges
- Use markdown for code and structured answers",
        project_context
    )
}

pub fn is_project_management_query(query: &str) -> bool {
    let lower = query.to_lowercase();
    PM_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    format!("{}...", head)
}
