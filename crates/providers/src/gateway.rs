//! Model invocation gateway.
//!
//! Every stage reaches the model through [`ModelGateway`]. It prices the call
//! before issuing it, retries transient failures with backoff, stops retrying
//! once the run is cancelled, appends the successful attempt to the cost
//! ledger and recovers structured answers from providers without native
//! schema support.

use crate::retry::RetryPolicy;
use crate::structured::{self, StructuredOutput};
use brandforge_core::completion::{CompletionResult, EmbeddingResult};
use brandforge_core::error::{Error, ProviderError, Result};
use brandforge_core::provider::{EmbeddingRequest, Provider, ProviderRequest};
use brandforge_telemetry::{CostLedger, CostRecord, PricingTable, TelemetryError};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Resilient wrapper around a [`Provider`].
///
/// Cheap to clone; clones share the provider, pricing table and ledger.
#[derive(Clone)]
pub struct ModelGateway {
    provider: Arc<dyn Provider>,
    pricing: Arc<PricingTable>,
    ledger: Arc<dyn CostLedger>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl ModelGateway {
    pub fn new(
        provider: Arc<dyn Provider>,
        pricing: Arc<PricingTable>,
        ledger: Arc<dyn CostLedger>,
    ) -> Self {
        Self {
            provider,
            pricing,
            ledger,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// A gateway that stops retrying once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn ledger(&self) -> &Arc<dyn CostLedger> {
        &self.ledger
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn price_check(&self, model: &str) -> Result<()> {
        self.pricing
            .lookup(model)
            .map(|_| ())
            .map_err(pricing_error)
    }

    /// Run `op` until it succeeds, fails fatally, or retries run out.
    ///
    /// Returns the value and the latency of the successful attempt.
    async fn retrying<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<(T, Duration)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        let attempts = self.retry.max_retries + 1;
        for attempt in 0..attempts {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let started = Instant::now();
            let err = match op().await {
                Ok(value) => return Ok((value, started.elapsed())),
                Err(e) => e,
            };

            if !err.is_transient() {
                error!(operation, error = %err, "Non-retryable provider error");
                return Err(err.into());
            }
            if attempt + 1 == attempts {
                error!(operation, attempts, error = %err, "Provider call failed after all attempts");
                return Err(err.into());
            }

            let delay = self.retry.delay_for(attempt);
            warn!(
                operation,
                attempt = attempt + 1,
                delay_secs = delay.as_secs_f64(),
                error = %err,
                "Transient provider error, retrying"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => {
                    info!(operation, "Run cancelled during backoff");
                    return Err(Error::Cancelled);
                }
            }
        }
        // attempts >= 1, so the loop always returns
        Err(Error::Cancelled)
    }

    /// Append to the ledger on the blocking pool; ledgers may do file I/O.
    async fn log_call(&self, record: CostRecord) {
        let ledger = self.ledger.clone();
        match tokio::task::spawn_blocking(move || ledger.append(record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to append cost ledger record"),
            Err(e) => warn!(error = %e, "Cost ledger task failed"),
        }
    }

    /// One completion call.
    ///
    /// With `response_schema` set, the answer is parsed into
    /// `structured_output`, natively when the provider supports it and
    /// through the JSON instruction fallback otherwise.
    pub async fn complete(&self, request: ProviderRequest) -> Result<CompletionResult> {
        let model = request.model.clone();
        self.price_check(&model)?;

        let mut request = request;
        let schema = request.response_schema.clone();
        let native = schema.is_some() && self.provider.supports_structured_output(&model);
        if let Some(schema) = schema.as_ref().filter(|_| !native) {
            if !structured::append_json_instruction(&mut request.messages, &schema.schema) {
                warn!(model = %model, "No user message to carry the JSON instruction");
            }
            request.response_schema = None;
        }

        debug!(
            provider = %self.provider.name(),
            model = %model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            structured = schema.is_some(),
            native,
            "Initiating completion"
        );

        let timestamp = Utc::now();
        let (response, latency) = self
            .retrying("complete", || self.provider.complete(request.clone()))
            .await?;

        let usage = response.usage.unwrap_or_default();
        let cost = self
            .pricing
            .compute_cost(&model, usage.prompt_tokens, usage.completion_tokens)
            .map_err(pricing_error)?;
        let latency_secs = latency.as_secs_f64();

        self.log_call(CostRecord {
            timestamp,
            model: model.clone(),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            cost_eur: cost,
            latency_secs,
        })
        .await;
        info!(
            model = %model,
            input_tokens = usage.prompt_tokens,
            output_tokens = usage.completion_tokens,
            cost_eur = cost,
            latency_secs,
            "Completion finished"
        );

        let content = response.message.content;
        if !response.tool_calls.is_empty() {
            debug!(model = %model, tool_calls = response.tool_calls.len(), "Model requested tool calls");
        }
        let structured_output = match schema {
            Some(_) => Some(
                structured::parse_json_response(&content)
                    .map_err(|message| Error::validation(message, content.clone()))?,
            ),
            None => None,
        };

        Ok(CompletionResult {
            content,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            cost,
            latency_secs,
            model,
            timestamp,
            structured_output,
            tool_calls: response.tool_calls,
        })
    }

    /// A completion whose answer must deserialize into `T` and pass its checks.
    pub async fn complete_structured<T: StructuredOutput>(
        &self,
        request: ProviderRequest,
    ) -> Result<(T, CompletionResult)> {
        let request = request.with_schema(T::response_schema());
        let result = self.complete(request).await?;
        let value = result
            .structured_output
            .clone()
            .ok_or_else(|| Error::validation("missing structured output", result.content.clone()))?;
        let parsed = structured::validate_structured::<T>(value)
            .map_err(|message| Error::validation(message, result.content.clone()))?;
        Ok((parsed, result))
    }

    /// Embed one text.
    pub async fn embed(&self, model: &str, text: &str) -> Result<EmbeddingResult> {
        self.price_check(model)?;
        debug!(model = %model, text_len = text.len(), "Initiating embedding");

        let request = EmbeddingRequest {
            model: model.to_string(),
            inputs: vec![text.to_string()],
        };
        let timestamp = Utc::now();
        let (response, latency) = self
            .retrying("embed", || self.provider.embed(request.clone()))
            .await?;

        let embedding = response.embeddings.into_iter().next().ok_or_else(|| {
            Error::Provider(ProviderError::InvalidResponse(
                "embedding response contained no vectors".into(),
            ))
        })?;
        let input_tokens = response.usage.map_or(0, |u| u.prompt_tokens);
        let cost = self
            .pricing
            .compute_cost(model, input_tokens, 0)
            .map_err(pricing_error)?;
        let latency_secs = latency.as_secs_f64();

        self.log_call(CostRecord {
            timestamp,
            model: model.to_string(),
            input_tokens,
            output_tokens: 0,
            cost_eur: cost,
            latency_secs,
        })
        .await;
        info!(model = %model, input_tokens, cost_eur = cost, latency_secs, "Embedding finished");

        Ok(EmbeddingResult {
            embedding,
            input_tokens,
            cost,
            latency_secs,
            model: model.to_string(),
        })
    }
}

fn pricing_error(e: TelemetryError) -> Error {
    match e {
        TelemetryError::UnknownModel(model) => {
            Error::configuration(format!("Pricing not configured for model: {model}"))
        }
        other => Error::configuration(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use brandforge_core::message::Message;
    use brandforge_telemetry::InMemoryLedger;
    use schemars::JsonSchema;
    use serde::Deserialize;

    fn gateway(provider: Arc<ScriptedProvider>, ledger: Arc<InMemoryLedger>) -> ModelGateway {
        ModelGateway::new(provider, Arc::new(PricingTable::with_defaults()), ledger)
            .with_retry(RetryPolicy::new(
                3,
                Duration::from_secs(1),
                Duration::from_secs(60),
            ))
    }

    fn request(model: &str) -> ProviderRequest {
        ProviderRequest::new(model, vec![Message::system("sys"), Message::user("Write.")])
            .with_max_tokens(100)
    }

    #[tokio::test]
    async fn success_logs_one_record() {
        let provider = Arc::new(ScriptedProvider::new().reply("Draft one"));
        let ledger = Arc::new(InMemoryLedger::new());
        let gw = gateway(provider.clone(), ledger.clone());

        let result = gw.complete(request("openai/gpt-4o")).await.unwrap();
        assert_eq!(result.content, "Draft one");
        assert_eq!(result.model, "openai/gpt-4o");
        // 100 prompt / 50 completion tokens at gpt-4o prices
        assert!((result.cost - (0.5 + 0.75) / 1000.0).abs() < 1e-12);
        assert!(result.structured_output.is_none());
        assert_eq!(provider.calls(), 1);
        assert_eq!(ledger.len(), 1);
    }

    /// Records which thread each append ran on.
    #[derive(Default)]
    struct ThreadLedger {
        threads: std::sync::Mutex<Vec<std::thread::ThreadId>>,
    }

    impl CostLedger for ThreadLedger {
        fn append(&self, _record: CostRecord) -> std::result::Result<(), TelemetryError> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            Ok(())
        }

        fn records(&self) -> std::result::Result<Vec<CostRecord>, TelemetryError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn ledger_appends_run_off_the_async_thread() {
        let provider = Arc::new(ScriptedProvider::new().reply("Draft"));
        let ledger = Arc::new(ThreadLedger::default());
        let gw = ModelGateway::new(
            provider,
            Arc::new(PricingTable::with_defaults()),
            ledger.clone(),
        );

        gw.complete(request("gpt-4o")).await.unwrap();

        let threads = ledger.threads.lock().unwrap();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[tokio::test]
    async fn unknown_model_fails_before_calling() {
        let provider = Arc::new(ScriptedProvider::new().reply("unused"));
        let ledger = Arc::new(InMemoryLedger::new());
        let gw = gateway(provider.clone(), ledger.clone());

        let err = gw.complete(request("acme/mystery-1")).await.unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert!(err.to_string().contains("acme/mystery-1"));
        assert_eq!(provider.calls(), 0);
        assert!(ledger.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_then_succeed() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .fail(ProviderError::RateLimited { retry_after_secs: 1 })
                .fail(ProviderError::ApiError {
                    status_code: 503,
                    message: "overloaded".into(),
                })
                .reply("Finally"),
        );
        let ledger = Arc::new(InMemoryLedger::new());
        let gw = gateway(provider.clone(), ledger.clone());

        let started = Instant::now();
        let result = gw.complete(request("gpt-4o-mini")).await.unwrap();
        let waited = started.elapsed().as_secs_f64();

        assert_eq!(result.content, "Finally");
        assert_eq!(provider.calls(), 3);
        // Only the successful attempt is logged.
        assert_eq!(ledger.len(), 1);
        // Two backoffs: 1s and 2s, each with 10-30% jitter.
        assert!((3.3 - 1e-6..=3.9 + 1e-6).contains(&waited), "waited {waited}");
    }

    #[tokio::test(start_paused = true)]
    async fn retries_exhaust_after_max_plus_one_attempts() {
        let provider = Arc::new(ScriptedProvider::new().fail_always(ProviderError::Network(
            "connection reset".into(),
        )));
        let ledger = Arc::new(InMemoryLedger::new());
        let gw = gateway(provider.clone(), ledger.clone());

        let err = gw.complete(request("gpt-4o")).await.unwrap_err();
        assert_eq!(err.kind(), "transient_provider");
        assert_eq!(provider.calls(), 4);
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .fail(ProviderError::AuthenticationFailed("bad key".into()))
                .reply("never"),
        );
        let ledger = Arc::new(InMemoryLedger::new());
        let gw = gateway(provider.clone(), ledger.clone());

        let err = gw.complete(request("gpt-4o")).await.unwrap_err();
        assert_eq!(err.kind(), "provider");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_further_attempts() {
        let provider = Arc::new(ScriptedProvider::new().fail_always(ProviderError::Timeout(
            "slow".into(),
        )));
        let ledger = Arc::new(InMemoryLedger::new());
        let cancel = CancellationToken::new();
        let gw = gateway(provider.clone(), ledger.clone()).with_cancellation(cancel.clone());

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                cancel.cancel();
            })
        };

        let err = gw.complete(request("gpt-4o")).await.unwrap_err();
        canceller.await.unwrap();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn tools_reach_the_provider_and_calls_come_back() {
        use brandforge_core::provider::{ToolCall, ToolDefinition};

        let provider = Arc::new(ScriptedProvider::new().reply_with_tool_calls(
            "",
            vec![ToolCall {
                id: "call_1".into(),
                name: "knowledge_search".into(),
                arguments: r#"{"query": "zero trust"}"#.into(),
            }],
        ));
        let ledger = Arc::new(InMemoryLedger::new());
        let gw = gateway(provider.clone(), ledger.clone());

        let catalog = vec![ToolDefinition {
            name: "knowledge_search".into(),
            description: "Search brand documents".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let result = gw
            .complete(request("gpt-4o").with_tools(catalog))
            .await
            .unwrap();

        let sent = provider.last_request().unwrap();
        assert_eq!(sent.tools.len(), 1);
        assert_eq!(sent.tools[0].name, "knowledge_search");
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].name, "knowledge_search");
        assert_eq!(
            result.tool_calls[0].parsed_arguments().unwrap()["query"],
            "zero trust"
        );
        // Tool-call answers are billed like any other.
        assert_eq!(ledger.len(), 1);
    }

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Score {
        value: f64,
    }

    impl StructuredOutput for Score {
        fn output_name() -> &'static str {
            "score"
        }
        fn check(&self) -> std::result::Result<(), String> {
            if (1.0..=10.0).contains(&self.value) {
                Ok(())
            } else {
                Err(format!("value {} outside [1, 10]", self.value))
            }
        }
    }

    #[tokio::test]
    async fn fallback_path_appends_instruction_and_recovers_json() {
        let provider = Arc::new(
            ScriptedProvider::new().reply("Sure!\n```json\n{\"value\": 7.5}\n```"),
        );
        let ledger = Arc::new(InMemoryLedger::new());
        let gw = gateway(provider.clone(), ledger.clone());

        let (score, result) = gw
            .complete_structured::<Score>(request("anthropic/claude-sonnet-4"))
            .await
            .unwrap();
        assert_eq!(score.value, 7.5);
        assert_eq!(result.structured_output.unwrap()["value"], 7.5);

        let sent = provider.last_request().unwrap();
        assert!(sent.response_schema.is_none());
        let last = sent.messages.last().unwrap();
        assert!(last.content.contains("You must respond with ONLY valid JSON"));
    }

    #[tokio::test]
    async fn native_path_sends_schema() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_native_schema()
                .reply(r#"{"value": 9}"#),
        );
        let ledger = Arc::new(InMemoryLedger::new());
        let gw = gateway(provider.clone(), ledger.clone());

        let (score, _) = gw
            .complete_structured::<Score>(request("openai/gpt-4o"))
            .await
            .unwrap();
        assert_eq!(score.value, 9.0);

        let sent = provider.last_request().unwrap();
        assert_eq!(sent.response_schema.unwrap().name, "score");
        assert!(!sent.messages[1].content.contains("ONLY valid JSON"));
    }

    #[tokio::test]
    async fn unparseable_or_invalid_answer_is_validation_error() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .reply("I'd rather not score this.")
                .reply(r#"{"value": 42}"#),
        );
        let ledger = Arc::new(InMemoryLedger::new());
        let gw = gateway(provider.clone(), ledger.clone());

        let err = gw
            .complete_structured::<Score>(request("gpt-4o-mini"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { ref raw, .. } if raw.contains("rather not")));

        let err = gw
            .complete_structured::<Score>(request("gpt-4o-mini"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("outside [1, 10]"));
        // Validation failures are not retried; both calls were paid for.
        assert_eq!(provider.calls(), 2);
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn embed_prices_input_tokens_only() {
        let provider = Arc::new(ScriptedProvider::new().embedding(vec![0.1, 0.2, 0.3]));
        let ledger = Arc::new(InMemoryLedger::new());
        let gw = gateway(provider.clone(), ledger.clone());

        let result = gw.embed("text-embedding-3-small", "zero trust").await.unwrap();
        assert_eq!(result.embedding, vec![0.1, 0.2, 0.3]);
        assert!((result.cost - 0.00002 * 10.0 / 1000.0).abs() < 1e-15);
        let records = ledger.records().unwrap();
        assert_eq!(records[0].output_tokens, 0);
    }
}
