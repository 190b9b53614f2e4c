//! End-to-end integration tests for the brandforge content pipeline.
//!
//! These tests drive whole runs through `ContentEngine`: planning, research
//! over a seeded knowledge store and a stubbed web search backend,
//! generation, critique and revision, with a scripted model provider.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use brandforge_agent::InstructionVariant;
use brandforge_core::error::{Error, ProviderError, SearchError};
use brandforge_core::knowledge::{KnowledgeChunk, KnowledgeStore};
use brandforge_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse,
};
use brandforge_core::search::{WebSearchHit, WebSearchProvider, WebSearchQuery};
use brandforge_core::tool::Capability;
use brandforge_memory::InMemoryKnowledgeStore;
use brandforge_providers::RetryPolicy;
use brandforge_providers::test_helpers::ScriptedProvider;
use brandforge_telemetry::{CostLedger, InMemoryLedger, JsonlLedger};
use brandforge_workflow::{ContentEngine, Phase, RunRequest};
use tokio_util::sync::CancellationToken;

const ACME_YAML: &str = include_str!("../../../config/brands/acme.yaml");

// ── Fixtures ─────────────────────────────────────────────────────────────

fn brands_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("acme.yaml"), ACME_YAML).unwrap();
    dir
}

fn route(route: &str, tools: &[&str]) -> String {
    serde_json::json!({
        "route": route,
        "tools": tools,
        "reason": "The topic benefits from recent sources.",
        "confidence": 0.85
    })
    .to_string()
}

fn critique(brand_voice: f64, structure: f64, accuracy: f64, reasoning: &str) -> String {
    serde_json::json!({
        "brand_voice": brand_voice,
        "structure": structure,
        "accuracy": accuracy,
        "violations": ["Closing line uses 'revolutionary'"],
        "reasoning": reasoning
    })
    .to_string()
}

fn chunk(id: &str, text: &str, embedding: Vec<f32>, brand: &str) -> KnowledgeChunk {
    KnowledgeChunk {
        id: id.into(),
        text: text.into(),
        embedding,
        metadata: BTreeMap::from([
            ("brand".to_string(), brand.to_string()),
            ("source".to_string(), format!("{id}.md")),
        ]),
    }
}

async fn seeded_store() -> Arc<InMemoryKnowledgeStore> {
    let store = Arc::new(InMemoryKnowledgeStore::new());
    store
        .upsert(
            "brand_content",
            vec![
                chunk(
                    "acme-zt",
                    "Acme moved its own network to zero trust in 2023.",
                    vec![1.0, 0.0, 0.0],
                    "acme",
                ),
                chunk(
                    "acme-pricing",
                    "Acme pricing is per seat.",
                    vec![0.0, 1.0, 0.0],
                    "acme",
                ),
                chunk(
                    "globex-zt",
                    "Globex has a zero trust story too.",
                    vec![1.0, 0.0, 0.0],
                    "globex",
                ),
            ],
        )
        .await
        .unwrap();
    store
}

/// Web search backend with canned results.
struct StubSearch {
    fail: bool,
}

#[async_trait]
impl WebSearchProvider for StubSearch {
    fn name(&self) -> &str {
        "stub_search"
    }

    async fn search(&self, query: WebSearchQuery) -> Result<Vec<WebSearchHit>, SearchError> {
        if self.fail {
            return Err(SearchError::Api {
                status: 503,
                body: "upstream unavailable".into(),
            });
        }
        assert_eq!(query.query, "Zero trust security");
        Ok(vec![WebSearchHit {
            content: "NIST SP 800-207 defines zero trust architecture.".into(),
            url: "https://csrc.nist.gov/pubs/sp/800/207/final".into(),
            score: 0.92,
        }])
    }
}

/// Cancels a token once `trigger_after` completions have been served.
struct CancellingProvider {
    inner: ScriptedProvider,
    cancel: CancellationToken,
    trigger_after: usize,
}

#[async_trait]
impl Provider for CancellingProvider {
    fn name(&self) -> &str {
        "cancelling"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let response = self.inner.complete(request).await;
        if self.inner.calls() >= self.trigger_after {
            self.cancel.cancel();
        }
        response
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        self.inner.embed(request).await
    }
}

// ── E2E: Full run with research and one revision ────────────────────────

#[tokio::test]
async fn e2e_research_then_revise_until_passing() {
    let dir = brands_dir();
    let provider = Arc::new(
        ScriptedProvider::new()
            .embedding(vec![1.0, 0.0, 0.0])
            .reply(route("research", &["knowledge_search", "web_search"]))
            .reply("Zero trust is a revolutionary shift.")
            .reply(critique(6.0, 6.0, 6.5, "The hook is weak and the closing is hype."))
            .reply("Acme learned zero trust by moving its own network first.")
            .reply(critique(7.5, 7.5, 7.5, "Grounded and on voice.")),
    );
    let ledger = Arc::new(InMemoryLedger::new());
    let engine = ContentEngine::new(provider.clone(), ledger.clone(), dir.path())
        .with_knowledge_store(seeded_store().await)
        .with_search_provider(Arc::new(StubSearch { fail: false }));

    let request = RunRequest::new("Zero trust security", "acme")
        .with_max_iterations(3)
        .with_quality_threshold(7.0);
    let state = engine.run(&request).await.unwrap();

    assert_eq!(state.phase, Phase::Done);
    assert_eq!(state.iteration_count, 2);
    assert!(state.meets_quality_threshold);
    assert_eq!(
        state.content,
        "Acme learned zero trust by moving its own network first."
    );
    assert!((state.average_score().unwrap() - 7.5).abs() < 1e-9);

    // Research found one Acme document within distance and one web source.
    let research = state.research_result.as_ref().unwrap();
    assert_eq!(
        research.evidence[&Capability::KnowledgeSearch],
        "Found 1 relevant brand documents"
    );
    assert_eq!(research.evidence[&Capability::WebSearch], "Found 1 web sources");
    assert!(research.failures.is_empty());

    // The planner saw the tool catalog; the first draft saw both contexts.
    let requests = provider.requests();
    assert_eq!(requests.len(), 5);
    assert!(requests[0].messages[0].content.contains("Available tools:"));
    let first_prompt = &requests[1].messages[1].content;
    assert!(first_prompt.contains("Acme moved its own network to zero trust in 2023."));
    assert!(!first_prompt.contains("Globex"));
    assert!(first_prompt.contains("https://csrc.nist.gov/pubs/sp/800/207/final"));

    // The revision turn carried the critique.
    assert!(requests[3].messages[3]
        .content
        .contains("The hook is weak and the closing is hype."));
    assert_eq!(
        state.generation_metadata.as_ref().unwrap().variant,
        InstructionVariant::Optimization
    );

    // One ledger record per completion plus the embedding.
    assert_eq!(provider.embed_calls(), 1);
    assert_eq!(ledger.len(), 6);
    let total = state.usage.total();
    assert_eq!(total.calls, 6);
    assert!((ledger.summary().unwrap().total_cost_eur - total.cost).abs() < 1e-9);
    assert_eq!(state.cycles.len(), 2);
}

// ── E2E: Degraded research ──────────────────────────────────────────────

#[tokio::test]
async fn e2e_failed_web_search_degrades_to_knowledge_only() {
    let dir = brands_dir();
    let provider = Arc::new(
        ScriptedProvider::new()
            .embedding(vec![1.0, 0.0, 0.0])
            .reply(route("research", &["knowledge_search", "web_search"]))
            .reply("Draft grounded in brand documents.")
            .reply(critique(8.0, 8.0, 8.0, "Good.")),
    );
    let engine = ContentEngine::new(provider.clone(), Arc::new(InMemoryLedger::new()), dir.path())
        .with_knowledge_store(seeded_store().await)
        .with_search_provider(Arc::new(StubSearch { fail: true }));

    let state = engine
        .run(&RunRequest::new("Zero trust security", "acme"))
        .await
        .unwrap();

    let research = state.research_result.as_ref().unwrap();
    assert!(research.evidence.contains_key(&Capability::KnowledgeSearch));
    assert!(!research.evidence.contains_key(&Capability::WebSearch));
    assert!(research.failures[&Capability::WebSearch].contains("503"));

    // The failure is visible in the audit trail, and the run still finished.
    assert!(state
        .messages
        .iter()
        .any(|m| m.stage() == Some("research") && m.content.contains("Failed web_search")));
    assert_eq!(state.iteration_count, 1);
    assert!(state.meets_quality_threshold);

    let requests = provider.requests();
    assert!(!requests[1].messages[1].content.contains("RELEVANT SEARCH CONTENT"));
}

// ── E2E: Transient provider errors ──────────────────────────────────────

#[tokio::test]
async fn e2e_transient_errors_are_retried_and_not_billed() {
    let dir = brands_dir();
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(route("write", &[]))
            .fail(ProviderError::RateLimited { retry_after_secs: 1 })
            .fail(ProviderError::ApiError {
                status_code: 502,
                message: "bad gateway".into(),
            })
            .reply("Draft after retries.")
            .reply(critique(9.0, 9.0, 9.0, "Strong.")),
    );
    let ledger = Arc::new(InMemoryLedger::new());
    let engine = ContentEngine::new(provider.clone(), ledger.clone(), dir.path())
        .with_retry(RetryPolicy::immediate(3));

    let state = engine
        .run(&RunRequest::new("Zero trust security", "acme"))
        .await
        .unwrap();

    assert_eq!(state.content, "Draft after retries.");
    assert_eq!(provider.calls(), 5);
    assert_eq!(ledger.len(), 3);
}

#[tokio::test]
async fn e2e_exhausted_retries_fail_the_run_with_its_trail() {
    let dir = brands_dir();
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(route("write", &[]))
            .fail_always(ProviderError::Timeout("read timed out".into())),
    );
    let engine = ContentEngine::new(provider.clone(), Arc::new(InMemoryLedger::new()), dir.path())
        .with_retry(RetryPolicy::immediate(2));

    let failure = engine
        .run(&RunRequest::new("Zero trust security", "acme"))
        .await
        .unwrap_err();

    assert_eq!(failure.kind(), "transient_provider");
    assert_eq!(failure.phase, Phase::Generating);
    assert_eq!(failure.messages.len(), 1);
    assert!(failure.messages[0].content.starts_with("Planner decision: route='write'"));
    // One planning call, then three generation attempts.
    assert_eq!(provider.calls(), 4);
}

// ── E2E: Cancellation ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_cancellation_discards_the_stage_in_flight() {
    let dir = brands_dir();
    let cancel = CancellationToken::new();
    let provider = Arc::new(CancellingProvider {
        inner: ScriptedProvider::new()
            .reply(route("write", &[]))
            .reply("Draft that never lands."),
        cancel: cancel.clone(),
        trigger_after: 2,
    });
    let engine = ContentEngine::new(provider, Arc::new(InMemoryLedger::new()), dir.path());

    let failure = engine
        .run_with_cancellation(&RunRequest::new("Zero trust security", "acme"), cancel)
        .await
        .unwrap_err();

    assert!(matches!(failure.error, Error::Cancelled));
    assert_eq!(failure.phase, Phase::Generating);
    assert!(failure
        .messages
        .iter()
        .all(|m| m.content != "Draft that never lands."));
}

// ── E2E: Request validation and brand lookup ────────────────────────────

#[tokio::test]
async fn e2e_invalid_requests_are_rejected_before_any_call() {
    let dir = brands_dir();
    let provider = Arc::new(ScriptedProvider::new());
    let ledger = Arc::new(InMemoryLedger::new());
    let engine = ContentEngine::new(provider.clone(), ledger.clone(), dir.path());

    for request in [
        RunRequest::new("Zero trust security", "acme").with_max_iterations(0),
        RunRequest::new("Zero trust security", "acme").with_quality_threshold(11.0),
        RunRequest::new("Zero trust security", "acme").with_template("PODCAST"),
        RunRequest::new("Zero trust security", "initech"),
    ] {
        let failure = engine.run(&request).await.unwrap_err();
        assert_eq!(failure.kind(), "configuration", "{request:?}");
    }
    assert_eq!(provider.calls(), 0);
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn e2e_jsonl_ledger_feeds_the_usage_summary() {
    let dir = brands_dir();
    let ledger_path = dir.path().join("data/api_calls.jsonl");
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(route("write", &[]))
            .reply("Draft.")
            .reply(critique(5.0, 5.0, 5.0, "Off voice."))
            .reply("Draft, revised.")
            .reply(critique(5.5, 5.5, 5.5, "Still off voice.")),
    );
    let engine = ContentEngine::new(
        provider,
        Arc::new(JsonlLedger::new(ledger_path.clone())),
        dir.path(),
    );

    let state = engine
        .run(&RunRequest::new("Zero trust security", "acme").with_max_iterations(2))
        .await
        .unwrap();
    assert_eq!(state.iteration_count, 2);
    assert!(!state.meets_quality_threshold);

    // A fresh ledger over the same file sees every call.
    let summary = JsonlLedger::new(&ledger_path).summary().unwrap();
    assert_eq!(summary.calls, 5);
    assert_eq!(summary.by_model.len(), 2);
    assert!(Path::new(&ledger_path).exists());
}
