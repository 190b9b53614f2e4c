//! Scripted provider for tests.
//!
//! Answers are served in the order they were queued, one per `complete`
//! call, so a test can script a whole run: planner JSON, drafts, critiques.

use async_trait::async_trait;
use brandforge_core::error::ProviderError;
use brandforge_core::message::Message;
use brandforge_core::provider::*;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Prompt/completion token counts reported for every scripted answer.
pub const SCRIPTED_USAGE: Usage = Usage {
    prompt_tokens: 100,
    completion_tokens: 50,
    total_tokens: 150,
};

struct Answer {
    content: String,
    tool_calls: Vec<ToolCall>,
}

#[derive(Default)]
struct Script {
    answers: VecDeque<Result<Answer, ProviderError>>,
    exhausted: Option<ProviderError>,
    requests: Vec<ProviderRequest>,
    embed_calls: usize,
}

/// A provider that replays queued answers.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<Script>,
    native_schema: bool,
    embedding: Vec<f32>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful answer.
    pub fn reply(self, content: impl Into<String>) -> Self {
        self.lock().answers.push_back(Ok(Answer {
            content: content.into(),
            tool_calls: Vec::new(),
        }));
        self
    }

    /// Queue an answer that asks for tool calls.
    pub fn reply_with_tool_calls(self, content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        self.lock().answers.push_back(Ok(Answer {
            content: content.into(),
            tool_calls,
        }));
        self
    }

    /// Queue a failure.
    pub fn fail(self, error: ProviderError) -> Self {
        self.lock().answers.push_back(Err(error));
        self
    }

    /// Error returned once the queue is empty.
    pub fn fail_always(self, error: ProviderError) -> Self {
        self.lock().exhausted = Some(error);
        self
    }

    /// Claim native schema support for every model.
    pub fn with_native_schema(mut self) -> Self {
        self.native_schema = true;
        self
    }

    /// Vector returned by every `embed` call.
    pub fn embedding(mut self, vector: Vec<f32>) -> Self {
        self.embedding = vector;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of `complete` calls received.
    pub fn calls(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn embed_calls(&self) -> usize {
        self.lock().embed_calls
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.lock().requests.clone()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.lock().requests.last().cloned()
    }

    /// Answers still queued.
    pub fn remaining(&self) -> usize {
        self.lock().answers.len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        let answer = {
            let mut script = self.lock();
            script.requests.push(request);
            match script.answers.pop_front() {
                Some(answer) => answer,
                None => Err(script.exhausted.clone().unwrap_or_else(|| {
                    ProviderError::InvalidResponse("scripted provider has no answers left".into())
                })),
            }
        }?;

        Ok(ProviderResponse {
            message: Message::assistant(answer.content),
            tool_calls: answer.tool_calls,
            usage: Some(SCRIPTED_USAGE),
            model,
            metadata: serde_json::Map::new(),
        })
    }

    fn supports_structured_output(&self, _model: &str) -> bool {
        self.native_schema
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        self.lock().embed_calls += 1;
        if self.embedding.is_empty() {
            return Err(ProviderError::NotConfigured("no scripted embedding".into()));
        }
        Ok(EmbeddingResponse {
            embeddings: request.inputs.iter().map(|_| self.embedding.clone()).collect(),
            model: request.model,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 0,
                total_tokens: 10,
            }),
        })
    }
}
