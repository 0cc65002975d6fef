//! Per-sentence session workflow engine
//!
//! Drives one sentence through the upstream protocol, strictly in order:
//! 1. Create session
//! 2. Send the analysis command
//! 3. Poll the session until it reports `idle`
//! 4. Resolve the result id from the latest chat message (bounded retries)
//! 5. Fetch the analysis payload (bounded retries)
//!
//! Any failure ends that sentence's workflow with an unsuccessful
//! [`SentenceWorkflowResult`]; the engine never returns an error to its
//! caller, so sibling sentences are unaffected.

use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use writeaid_common::config::{UpstreamConfig, WorkflowConfig};

use crate::models::{SentenceUnit, SentenceWorkflowResult};
use crate::services::remote_call::{RemoteCall, RemoteCallError};

const SESSIONS_PATH: &str = "/api/v1/sessions/";
const CHATS_PATH: &str = "/api/v1/chats/";
const IDLE_STATUS: &str = "idle";

/// Workflow step failures
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Failed to create session: {0}")]
    SessionCreation(#[source] RemoteCallError),

    #[error("Failed to send message: {0}")]
    SendMessage(#[source] RemoteCallError),

    #[error("Failed to check session status: {0}")]
    StatusPoll(#[source] RemoteCallError),

    #[error("Upstream {step} response missing field '{field}'")]
    MissingField {
        step: &'static str,
        field: &'static str,
    },

    #[error("No result id found after {attempts} attempts")]
    NoResultId { attempts: u32 },

    #[error("Failed to fetch result after {attempts} attempts: {source}")]
    ResultFetch {
        attempts: u32,
        #[source]
        source: RemoteCallError,
    },
}

/// Poll interval and retry bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowTiming {
    pub poll_interval: Duration,
    /// Log a progress line every N status checks
    pub log_every_checks: u32,
    pub result_id_attempts: u32,
    pub result_id_retry: Duration,
    pub result_fetch_attempts: u32,
    pub result_fetch_retry: Duration,
}

impl From<&WorkflowConfig> for WorkflowTiming {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            log_every_checks: config.log_every_checks.max(1),
            result_id_attempts: config.result_id_attempts.max(1),
            result_id_retry: Duration::from_secs(config.result_id_retry_secs),
            result_fetch_attempts: config.result_fetch_attempts.max(1),
            result_fetch_retry: Duration::from_secs(config.result_fetch_retry_secs),
        }
    }
}

impl Default for WorkflowTiming {
    fn default() -> Self {
        Self::from(&WorkflowConfig::default())
    }
}

/// Fixed identifiers sent upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamProfile {
    pub client_id: String,
    pub data_source: String,
    pub prompt_name: String,
    pub session_url_base: String,
}

impl From<&UpstreamConfig> for UpstreamProfile {
    fn from(config: &UpstreamConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            data_source: config.data_source.clone(),
            prompt_name: config.prompt_name.clone(),
            session_url_base: config.session_url_base.clone(),
        }
    }
}

impl Default for UpstreamProfile {
    fn default() -> Self {
        Self::from(&UpstreamConfig::default())
    }
}

impl UpstreamProfile {
    /// Human-viewable page for a session
    pub fn session_url(&self, session_id: &str) -> String {
        format!("{}?session_id={}", self.session_url_base, session_id)
    }
}

/// Build the upstream command string for one sentence
pub fn build_command_string(prompt_name: &str, sentence: &str, paragraph: &str, author: &str) -> String {
    format!(
        "cot {} $sentence:\"{}\" $paragraph:\"{}\" $author:{}",
        prompt_name, sentence, paragraph, author
    )
}

/// Rewritten sentence carried by an analysis payload (non-empty `content`)
pub fn extract_improved_sentence(analysis: &Value) -> Option<String> {
    analysis
        .get("content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .map(str::to_string)
}

/// Identifier fields arrive as strings or numbers
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Successful workflow payload
struct WorkflowOutput {
    analysis: Value,
    improved_sentence: Option<String>,
}

/// Per-sentence workflow engine
pub struct SessionWorkflowEngine {
    remote: Arc<dyn RemoteCall>,
    profile: UpstreamProfile,
    timing: WorkflowTiming,
}

impl SessionWorkflowEngine {
    pub fn new(remote: Arc<dyn RemoteCall>, profile: UpstreamProfile, timing: WorkflowTiming) -> Self {
        Self {
            remote,
            profile,
            timing,
        }
    }

    /// Run the full workflow for one sentence
    ///
    /// Always returns a result; failures are reported through
    /// `success == false` and `error`.
    pub async fn run(&self, unit: &SentenceUnit) -> SentenceWorkflowResult {
        let start = Instant::now();
        let mut session_id: Option<String> = None;

        let outcome = self.execute(unit, &mut session_id).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        let session_url = session_id.as_deref().map(|id| self.profile.session_url(id));

        match outcome {
            Ok(output) => {
                info!(
                    sentence_index = unit.index,
                    session_id = session_id.as_deref().unwrap_or_default(),
                    duration_ms,
                    improved = output.improved_sentence.is_some(),
                    "Sentence workflow completed"
                );
                SentenceWorkflowResult {
                    sentence_index: unit.index,
                    success: true,
                    sentence: unit.text.clone(),
                    improved_sentence: output.improved_sentence,
                    session_id,
                    session_url,
                    analysis: Some(output.analysis),
                    error: None,
                    duration_ms,
                }
            }
            Err(e) => {
                warn!(
                    sentence_index = unit.index,
                    session_id = session_id.as_deref().unwrap_or_default(),
                    error = %e,
                    "Sentence workflow failed"
                );
                SentenceWorkflowResult {
                    sentence_index: unit.index,
                    success: false,
                    sentence: unit.text.clone(),
                    improved_sentence: None,
                    session_id,
                    session_url,
                    analysis: None,
                    error: Some(e.to_string()),
                    duration_ms,
                }
            }
        }
    }

    async fn execute(
        &self,
        unit: &SentenceUnit,
        session_id_slot: &mut Option<String>,
    ) -> Result<WorkflowOutput, WorkflowError> {
        let session_id = self.create_session().await?;
        *session_id_slot = Some(session_id.clone());
        info!(sentence_index = unit.index, session_id = %session_id, "Session created");

        if let Some(preceding) = unit.preceding_context.as_deref() {
            debug!(sentence_index = unit.index, preceding = %preceding, "Carrying preceding context");
        }

        let command = build_command_string(
            &self.profile.prompt_name,
            &unit.text,
            &unit.paragraph_context,
            &unit.author,
        );
        self.send_message(&session_id, &command).await?;

        self.wait_until_idle(&session_id).await?;

        let result_id = self.resolve_result_id(&session_id).await?;
        debug!(session_id = %session_id, result_id = %result_id, "Result id resolved");

        let analysis = self.fetch_result(&result_id).await?;
        let improved_sentence = extract_improved_sentence(&analysis);

        Ok(WorkflowOutput {
            analysis,
            improved_sentence,
        })
    }

    /// Step 1 (not retried)
    async fn create_session(&self) -> Result<String, WorkflowError> {
        let payload = json!({
            "client_id": self.profile.client_id,
            "data_source": self.profile.data_source,
        });

        let body = self
            .remote
            .invoke(Method::POST, SESSIONS_PATH, payload)
            .await
            .map_err(WorkflowError::SessionCreation)?;

        body.get("id").and_then(id_string).ok_or(WorkflowError::MissingField {
            step: "session creation",
            field: "id",
        })
    }

    /// Step 2 (not retried)
    async fn send_message(&self, session_id: &str, command: &str) -> Result<(), WorkflowError> {
        let payload = json!({
            "session": session_id,
            "message": command,
            "use_live_cot": false,
        });

        self.remote
            .invoke(Method::POST, CHATS_PATH, payload)
            .await
            .map_err(WorkflowError::SendMessage)?;
        Ok(())
    }

    /// Step 3: no ceiling, only periodic progress logging
    async fn wait_until_idle(&self, session_id: &str) -> Result<(), WorkflowError> {
        let path = format!("{}{}/", SESSIONS_PATH, session_id);
        let mut checks: u32 = 0;

        loop {
            checks += 1;
            let body = self
                .remote
                .invoke(Method::GET, &path, Value::Null)
                .await
                .map_err(WorkflowError::StatusPoll)?;

            let status = body
                .get("status")
                .and_then(Value::as_str)
                .ok_or(WorkflowError::MissingField {
                    step: "session status",
                    field: "status",
                })?;

            if status == IDLE_STATUS {
                debug!(session_id = %session_id, checks, "Session idle");
                return Ok(());
            }

            if checks % self.timing.log_every_checks.max(1) == 0 {
                info!(session_id = %session_id, checks, status = %status, "Waiting for session to become idle");
            }

            tokio::time::sleep(self.timing.poll_interval).await;
        }
    }

    /// Step 4: last chat message's `result_id`, retried when absent or on error
    async fn resolve_result_id(&self, session_id: &str) -> Result<String, WorkflowError> {
        let attempts = self.timing.result_id_attempts;

        for attempt in 1..=attempts {
            match self
                .remote
                .invoke(Method::GET, CHATS_PATH, json!({ "session_id": session_id }))
                .await
            {
                Ok(body) => {
                    let result_id = body
                        .get("results")
                        .and_then(Value::as_array)
                        .and_then(|messages| messages.last())
                        .and_then(|message| message.get("result_id"))
                        .and_then(id_string);

                    if let Some(result_id) = result_id {
                        return Ok(result_id);
                    }
                    warn!(session_id = %session_id, attempt, attempts, "No result id yet");
                }
                Err(e) => {
                    warn!(session_id = %session_id, attempt, attempts, error = %e, "Chat lookup failed");
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.timing.result_id_retry).await;
            }
        }

        Err(WorkflowError::NoResultId { attempts })
    }

    /// Step 5: retried on any error
    async fn fetch_result(&self, result_id: &str) -> Result<Value, WorkflowError> {
        let attempts = self.timing.result_fetch_attempts;
        let path = format!("/api/v1/results/{}/", result_id);
        let mut attempt = 1;

        loop {
            match self.remote.invoke(Method::GET, &path, Value::Null).await {
                Ok(analysis) => return Ok(analysis),
                Err(e) if attempt >= attempts => {
                    return Err(WorkflowError::ResultFetch {
                        attempts,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(result_id = %result_id, attempt, attempts, error = %e, "Result fetch failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.timing.result_fetch_retry).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_string_format() {
        let command = build_command_string("write-aid-1", "Cats are great.", "Cats are great. Dogs are loyal.", "EB White");
        assert_eq!(
            command,
            "cot write-aid-1 $sentence:\"Cats are great.\" $paragraph:\"Cats are great. Dogs are loyal.\" $author:EB White"
        );
    }

    #[test]
    fn test_improved_sentence_requires_non_empty_content() {
        assert_eq!(
            extract_improved_sentence(&json!({"content": "Cats are wonderful."})),
            Some("Cats are wonderful.".to_string())
        );
        assert_eq!(extract_improved_sentence(&json!({"content": "   "})), None);
        assert_eq!(extract_improved_sentence(&json!({"content": 7})), None);
        assert_eq!(extract_improved_sentence(&json!({"other": "x"})), None);
    }

    #[test]
    fn test_id_string_accepts_strings_and_numbers() {
        assert_eq!(id_string(&json!("abc")), Some("abc".to_string()));
        assert_eq!(id_string(&json!(42)), Some("42".to_string()));
        assert_eq!(id_string(&json!("")), None);
        assert_eq!(id_string(&Value::Null), None);
    }

    #[test]
    fn test_session_url() {
        let profile = UpstreamProfile::default();
        assert_eq!(profile.session_url("17"), "https://finchat.adgo.dev/?session_id=17");
    }

    #[test]
    fn test_timing_from_defaults() {
        let timing = WorkflowTiming::default();
        assert_eq!(timing.poll_interval, Duration::from_secs(5));
        assert_eq!(timing.result_id_attempts, 5);
        assert_eq!(timing.result_id_retry, Duration::from_secs(15));
        assert_eq!(timing.result_fetch_attempts, 3);
        assert_eq!(timing.result_fetch_retry, Duration::from_secs(5));
    }
}
