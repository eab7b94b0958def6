use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::SuggestError;
use crate::llm_manager::{ChatMessage, LLMManager, LLMProvider};

/// Upper bound on suggestions handed back to the caller.
pub const MAX_SUGGESTIONS: usize = 12;

const SYSTEM_PROMPT: &str = "You are a task planning assistant. Break the user's goal into 4 to 8 \
short, concrete, actionable tasks written in the same language as the user. \
Reply with a bare JSON array of strings and nothing else: no numbering, no explanations, \
no code fences.";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub tasks: Vec<String>,
}

/// The fixed two-turn conversation sent for a goal description.
pub fn build_messages(prompt: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)]
}

fn is_list_marker(c: char) -> bool {
    c.is_ascii_digit()
        || c.is_whitespace()
        || matches!(
            c,
            '.' | '．' | '、' | '(' | ')' | '（' | '）' | '-' | '–' | '—' | '*' | '•' | '·' | '●' | '▪'
        )
}

/// Strip leading list markers and collapse whitespace runs. Idempotent.
pub fn normalize(line: &str) -> String {
    line.trim_start_matches(is_list_marker)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// String elements of a task-shaped JSON value: a bare array, or `{"tasks": [...]}`.
fn tasks_from_json(text: &str) -> Option<Vec<String>> {
    let items = match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("tasks")? {
            Value::Array(items) => items,
            _ => return None,
        },
        _ => return None,
    };
    Some(
        items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
    )
}

fn whole_payload(reply: &str) -> Option<Vec<String>> {
    tasks_from_json(reply.trim())
}

fn embedded_array(reply: &str) -> Option<Vec<String>> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end <= start {
        return None;
    }
    tasks_from_json(&reply[start..=end])
}

/// An unmarked line ending in a colon introduces the list rather than being
/// part of it. Marked items keep their trailing colon.
fn is_preamble(line: &str) -> bool {
    let line = line.trim();
    if line.starts_with(is_list_marker) {
        return false;
    }
    line.ends_with(':') || line.ends_with('：')
}

fn split_lines(reply: &str) -> Option<Vec<String>> {
    Some(
        reply
            .lines()
            .filter(|line| !is_preamble(line))
            .map(normalize)
            .filter(|line| !line.is_empty())
            .collect(),
    )
}

type Strategy = fn(&str) -> Option<Vec<String>>;

/// Tried in order; the first one producing usable items wins.
const STRATEGIES: [(&str, Strategy); 3] = [
    ("json", whole_payload),
    ("embedded json", embedded_array),
    ("lines", split_lines),
];

/// Turn a free-form model reply into at most [`MAX_SUGGESTIONS`] clean task strings.
pub fn extract_tasks(reply: &str) -> Vec<String> {
    for (name, strategy) in STRATEGIES {
        let Some(candidates) = strategy(reply) else {
            continue;
        };
        let tasks: Vec<String> = candidates
            .iter()
            .map(|candidate| normalize(candidate))
            .filter(|task| !task.is_empty())
            .take(MAX_SUGGESTIONS)
            .collect();
        if !tasks.is_empty() {
            debug!("Extracted {} task(s) via {} strategy", tasks.len(), name);
            return tasks;
        }
    }
    debug!("No usable tasks in reply");
    Vec::new()
}

/// Ask `provider` to decompose `prompt` and extract the resulting tasks.
pub async fn suggest_with(
    provider: &dyn LLMProvider,
    prompt: &str,
) -> Result<Vec<String>, SuggestError> {
    let reply = provider.send_messages(&build_messages(prompt)).await?;
    Ok(extract_tasks(&reply))
}

/// Validates requests, resolves provider settings and runs the extraction.
pub struct Suggester {
    manager: Arc<LLMManager>,
}

impl Suggester {
    pub fn new(manager: Arc<LLMManager>) -> Self {
        Self { manager }
    }

    pub async fn suggest(&self, request: &SuggestRequest) -> Result<Vec<String>, SuggestError> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(SuggestError::validation("prompt is required"));
        }
        let settings = self
            .manager
            .resolve(request.api_key.as_deref(), request.model.as_deref())?;
        let provider = self.manager.provider(settings);

        info!("Requesting suggestions from {} ({})", provider.name(), provider.model_name());
        let tasks = suggest_with(&provider, prompt).await?;
        info!("Got {} suggestion(s)", tasks.len());
        Ok(tasks)
    }
}
