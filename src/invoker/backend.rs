//! Worker compute backends.
//!
//! The invoker talks to a backend through the `WorkerBackend` seam: an HTTP
//! implementation for the real provider and a scripted one for tests and dry
//! runs. Backends receive the full request (kind, instruction, scope files)
//! and answer with raw text that the artifact parser validates afterwards.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::batch::TaskKind;
use crate::config::ProviderConfig;
use crate::error::{InvokeError, OverseerError};

const ANTHROPIC_VERSION: &str = "2023-06-01";

const WORKER_SYSTEM_PROMPT: &str = "\
You are an isolated worker executing one delegated task against a read-only \
project snapshot. Respond with exactly these markdown sections: \
`## implementation`, `## changed-files` (lines of `new|edit|delete <path>`), \
`## explanation`, and optionally `## test-commands` and `## needs-review` \
(yes or no). Do not write outside these sections.";

/// One project file sent to the worker as task scope.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeFile {
    pub path: PathBuf,
    pub content: String,
}

/// The request handed to a backend for one task invocation.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerRequest {
    pub request_id: Uuid,
    pub kind: TaskKind,
    pub instruction: String,
    pub scope_files: Vec<ScopeFile>,
}

impl WorkerRequest {
    pub fn new(kind: TaskKind, instruction: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            kind,
            instruction: instruction.into(),
            scope_files: Vec::new(),
        }
    }

    pub fn with_scope_files(mut self, files: Vec<ScopeFile>) -> Self {
        self.scope_files = files;
        self
    }

    fn render_prompt(&self) -> String {
        let mut prompt = format!("Task kind: {}\n\n{}\n", self.kind, self.instruction);
        for file in &self.scope_files {
            prompt.push_str(&format!(
                "\n--- {} ---\n{}\n",
                file.path.display(),
                file.content
            ));
        }
        prompt
    }
}

#[async_trait]
pub trait WorkerBackend: Send + Sync {
    async fn complete(&self, request: &WorkerRequest) -> Result<String, InvokeError>;
}

/// Backend that talks to an Anthropic-style messages API over HTTP.
pub struct HttpBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl HttpBackend {
    pub fn new(api_key: impl Into<String>, config: &ProviderConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            max_tokens: config.max_tokens,
        }
    }

    /// Reads the API key from `ANTHROPIC_API_KEY`.
    pub fn try_from_env(config: &ProviderConfig) -> Result<Self, OverseerError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            OverseerError::Config("ANTHROPIC_API_KEY not found in environment".to_string())
        })?;
        Ok(Self::new(api_key, config))
    }
}

#[async_trait]
impl WorkerBackend for HttpBackend {
    async fn complete(&self, request: &WorkerRequest) -> Result<String, InvokeError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: WORKER_SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: request.render_prompt(),
            }],
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| InvokeError::Provider(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(InvokeError::Provider(format!(
                "backend returned {}: {}",
                status,
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| InvokeError::Provider(format!("unreadable response: {}", e)))?;

        parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| InvokeError::Provider("response carried no text content".to_string()))
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// A canned reply for one scripted invocation.
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    pub delay: Option<Duration>,
    pub outcome: Result<String, String>,
}

impl ScriptedReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            delay: None,
            outcome: Ok(text.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            delay: None,
            outcome: Err(message.into()),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Deterministic backend for tests and dry runs.
///
/// Replies are keyed by an instruction substring, so concurrent tasks get
/// stable answers regardless of completion order. Unmatched requests fall
/// back to the default reply when one is set.
#[derive(Default)]
pub struct ScriptedBackend {
    stubs: Mutex<Vec<(String, ScriptedReply)>>,
    default_reply: Mutex<Option<ScriptedReply>>,
    requests: Mutex<Vec<WorkerRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `reply` to any request whose instruction contains `key`.
    pub fn stub(&self, key: impl Into<String>, reply: ScriptedReply) {
        self.stubs.lock().push((key.into(), reply));
    }

    pub fn set_default(&self, reply: ScriptedReply) {
        *self.default_reply.lock() = Some(reply);
    }

    /// A dry-run backend answering every request with an empty change set.
    pub fn dry_run() -> Self {
        let backend = Self::new();
        backend.set_default(ScriptedReply::text(
            "## implementation\n(dry run, no implementation produced)\n\
             ## changed-files\n\
             ## explanation\nDry run: the request was parsed and dispatched without contacting a provider.\n",
        ));
        backend
    }

    /// Requests observed so far, in arrival order.
    pub fn requests(&self) -> Vec<WorkerRequest> {
        self.requests.lock().clone()
    }

    fn reply_for(&self, request: &WorkerRequest) -> Option<ScriptedReply> {
        let stubs = self.stubs.lock();
        if let Some((_, reply)) = stubs
            .iter()
            .find(|(key, _)| request.instruction.contains(key))
        {
            return Some(reply.clone());
        }
        drop(stubs);

        self.default_reply.lock().clone()
    }
}

#[async_trait]
impl WorkerBackend for ScriptedBackend {
    async fn complete(&self, request: &WorkerRequest) -> Result<String, InvokeError> {
        self.requests.lock().push(request.clone());

        let reply = self
            .reply_for(request)
            .ok_or_else(|| InvokeError::Provider("no scripted reply for request".to_string()))?;

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }

        reply.outcome.map_err(InvokeError::Provider)
    }
}
