//! In-memory upstream analysis service
//!
//! Implements the session protocol well enough to drive the workflow engine:
//! sessions get sequential numeric ids, every session is idle after a
//! configurable number of busy polls, the last chat message carries
//! `result_id = "r-<session>"`, and the result's `content` is produced by an
//! improver applied to the sentence that was sent.
//!
//! A session counts as in flight from its creation until its result has been
//! served; an optional per-sentence delay holds the fetch open.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use writeaid_svc::services::{RemoteCall, RemoteCallError};

type Improver = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;
type FetchDelay = Box<dyn Fn(&str) -> Duration + Send + Sync>;

pub struct ScriptedUpstream {
    next_session: AtomicU64,
    /// session id -> sentence sent on that session
    sentences: Mutex<HashMap<String, String>>,
    polls: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<(Method, String)>>,
    commands: Mutex<Vec<String>>,
    /// sentences in the order their results were served
    served: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    improver: Improver,
    fetch_delay: FetchDelay,
    failing_fetch: HashSet<String>,
    busy_polls: u32,
    without_result_id: bool,
    fail_session_creation: bool,
}

impl Default for ScriptedUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedUpstream {
    /// Improver rewrites "great" to "wonderful" and "loyal" to "faithful"
    pub fn new() -> Self {
        Self {
            next_session: AtomicU64::new(1),
            sentences: Mutex::new(HashMap::new()),
            polls: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            served: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            improver: Box::new(|sentence| {
                Some(sentence.replace("great", "wonderful").replace("loyal", "faithful"))
            }),
            fetch_delay: Box::new(|_| Duration::ZERO),
            failing_fetch: HashSet::new(),
            busy_polls: 0,
            without_result_id: false,
            fail_session_creation: false,
        }
    }

    pub fn with_improver(mut self, improver: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.improver = Box::new(improver);
        self
    }

    /// Hold each result fetch open for a sentence-dependent time
    pub fn fetch_delay(mut self, delay: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        self.fetch_delay = Box::new(delay);
        self
    }

    /// Result fetch answers 500 for this sentence
    pub fn failing_fetch_for(mut self, sentence: &str) -> Self {
        self.failing_fetch.insert(sentence.to_string());
        self
    }

    pub fn busy_polls(mut self, polls: u32) -> Self {
        self.busy_polls = polls;
        self
    }

    pub fn without_result_id(mut self) -> Self {
        self.without_result_id = true;
        self
    }

    pub fn failing_session_creation(mut self) -> Self {
        self.fail_session_creation = true;
        self
    }

    /// Number of calls with this method whose path starts with `prefix`
    pub fn calls_to(&self, method: Method, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, path)| *m == method && path.starts_with(prefix))
            .count()
    }

    pub fn sessions_created(&self) -> usize {
        self.calls_to(Method::POST, "/api/v1/sessions/")
    }

    /// Command strings in the order they were sent
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Sentences in the order their results were served
    pub fn served(&self) -> Vec<String> {
        self.served.lock().unwrap().clone()
    }

    /// Highest number of sessions open at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn server_error(method: Method, path: &str) -> RemoteCallError {
        RemoteCallError::Status {
            method,
            url: format!("http://scripted{}", path),
            status: 500,
            body: "internal error".to_string(),
        }
    }
}

/// Pull the sentence back out of a command string
fn sentence_of(command: &str) -> String {
    command
        .split("$sentence:\"")
        .nth(1)
        .and_then(|rest| rest.split("\" $paragraph:").next())
        .unwrap_or_default()
        .to_string()
}

fn id_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RemoteCall for ScriptedUpstream {
    async fn invoke(&self, method: Method, path: &str, params: Value) -> Result<Value, RemoteCallError> {
        self.calls.lock().unwrap().push((method.clone(), path.to_string()));

        if method == Method::POST && path == "/api/v1/sessions/" {
            if self.fail_session_creation {
                return Err(Self::server_error(method, path));
            }
            let id = self.next_session.fetch_add(1, Ordering::SeqCst);
            let open = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(open, Ordering::SeqCst);
            return Ok(json!({ "id": id }));
        }

        if method == Method::POST && path == "/api/v1/chats/" {
            let session = id_of(&params["session"]);
            let command = params["message"].as_str().unwrap_or_default().to_string();
            self.sentences.lock().unwrap().insert(session, sentence_of(&command));
            self.commands.lock().unwrap().push(command);
            return Ok(json!({ "ok": true }));
        }

        if method == Method::GET && path == "/api/v1/chats/" {
            let session = id_of(&params["session_id"]);
            let result_id = if self.without_result_id {
                Value::Null
            } else {
                json!(format!("r-{}", session))
            };
            return Ok(json!({
                "results": [
                    { "result_id": null },
                    { "result_id": result_id }
                ]
            }));
        }

        if method == Method::GET {
            if let Some(rest) = path.strip_prefix("/api/v1/results/r-") {
                let session = rest.trim_end_matches('/').to_string();
                let sentence = self.sentences.lock().unwrap().get(&session).cloned().unwrap_or_default();
                if self.failing_fetch.contains(&sentence) {
                    return Err(Self::server_error(method, path));
                }
                let delay = (self.fetch_delay)(&sentence);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let content = (self.improver)(&sentence).unwrap_or_default();
                self.served.lock().unwrap().push(sentence);
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                return Ok(json!({ "id": rest, "content": content }));
            }

            if let Some(rest) = path.strip_prefix("/api/v1/sessions/") {
                let session = rest.trim_end_matches('/').to_string();
                let mut polls = self.polls.lock().unwrap();
                let seen = polls.entry(session).or_insert(0);
                *seen += 1;
                let status = if *seen > self.busy_polls { "idle" } else { "processing" };
                return Ok(json!({ "status": status }));
            }
        }

        Err(RemoteCallError::UnsupportedMethod(method))
    }
}
