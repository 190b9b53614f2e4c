//! The run entry point front-ends call.

use crate::controller::{IterationController, RunFailure};
use crate::state::{RunRequest, WorkflowState};
use brandforge_agent::{
    EvaluationStage, GatewayRoutingAdapter, GenerationStage, Planner, ResearchStage,
};
use brandforge_config::{AppConfig, BrandConfig, EvaluationWeights, RunDefaults};
use brandforge_core::error::{Error, Result};
use brandforge_core::knowledge::KnowledgeStore;
use brandforge_core::provider::Provider;
use brandforge_core::search::WebSearchProvider;
use brandforge_memory::InMemoryKnowledgeStore;
use brandforge_providers::{ModelGateway, OpenAiCompatProvider, RetryPolicy};
use brandforge_telemetry::{CostLedger, JsonlLedger, ModelPricing, PricingTable};
use brandforge_tools::{TavilyClient, default_registry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Everything a run shares with other runs: provider, prices, ledger,
/// research backends and configuration. All of it is read-only apart from
/// the append-only ledger.
pub struct ContentEngine {
    brands_dir: PathBuf,
    provider: Arc<dyn Provider>,
    pricing: Arc<PricingTable>,
    ledger: Arc<dyn CostLedger>,
    retry: RetryPolicy,
    knowledge: Option<Arc<dyn KnowledgeStore>>,
    search: Option<Arc<dyn WebSearchProvider>>,
    weights: EvaluationWeights,
    defaults: RunDefaults,
}

impl ContentEngine {
    pub fn new(
        provider: Arc<dyn Provider>,
        ledger: Arc<dyn CostLedger>,
        brands_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            brands_dir: brands_dir.into(),
            provider,
            pricing: Arc::new(PricingTable::with_defaults()),
            ledger,
            retry: RetryPolicy::default(),
            knowledge: None,
            search: None,
            weights: EvaluationWeights::default(),
            defaults: RunDefaults::default(),
        }
    }

    /// Build the engine from application config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let provider = OpenAiCompatProvider::from_config(config)?;

        let pricing = PricingTable::with_defaults();
        for (family, price) in &config.custom_pricing {
            pricing.set(
                family.clone(),
                ModelPricing::new(price.input_per_1k, price.output_per_1k),
            );
        }

        let knowledge: Option<Arc<dyn KnowledgeStore>> = match &config.knowledge.seed_path {
            Some(path) => Some(Arc::new(
                InMemoryKnowledgeStore::from_seed_file(path)
                    .map_err(|e| Error::configuration(e.to_string()))?,
            )),
            None => {
                info!("No knowledge seed configured, knowledge search disabled");
                None
            }
        };
        let search: Option<Arc<dyn WebSearchProvider>> = match config.search.api_key {
            Some(_) => Some(Arc::new(
                TavilyClient::from_config(&config.search)
                    .map_err(|e| Error::configuration(e.to_string()))?,
            )),
            None => {
                info!("No search API key, web search disabled");
                None
            }
        };

        let mut engine = Self::new(
            Arc::new(provider),
            Arc::new(JsonlLedger::new(config.ledger.path.clone())),
            config.brands_dir.clone(),
        )
        .with_pricing(Arc::new(pricing))
        .with_retry(RetryPolicy::from(&config.retry))
        .with_weights(config.evaluation.weights.clone())
        .with_run_defaults(config.run.clone());
        engine.knowledge = knowledge;
        engine.search = search;
        Ok(engine)
    }

    pub fn with_pricing(mut self, pricing: Arc<PricingTable>) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_knowledge_store(mut self, store: Arc<dyn KnowledgeStore>) -> Self {
        self.knowledge = Some(store);
        self
    }

    pub fn with_search_provider(mut self, search: Arc<dyn WebSearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_weights(mut self, weights: EvaluationWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_run_defaults(mut self, defaults: RunDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn brands_dir(&self) -> &Path {
        &self.brands_dir
    }

    pub fn ledger(&self) -> &Arc<dyn CostLedger> {
        &self.ledger
    }

    pub fn list_available_brands(&self) -> Result<Vec<String>> {
        Ok(brandforge_config::list_available_brands(&self.brands_dir)?)
    }

    pub fn load_brand(&self, name: &str) -> Result<BrandConfig> {
        Ok(brandforge_config::load_brand(&self.brands_dir, name)?)
    }

    /// A request seeded from the configured run defaults.
    pub fn request(&self, topic: impl Into<String>, brand: impl Into<String>) -> RunRequest {
        RunRequest::from_defaults(topic, brand, &self.defaults)
    }

    pub async fn run(&self, request: &RunRequest) -> std::result::Result<WorkflowState, RunFailure> {
        self.run_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Run one request. Firing `cancel` stops the run between stages and
    /// stops pending gateway retries.
    pub async fn run_with_cancellation(
        &self,
        request: &RunRequest,
        cancel: CancellationToken,
    ) -> std::result::Result<WorkflowState, RunFailure> {
        let brand = self
            .load_brand(&request.brand)
            .map_err(RunFailure::before_start)?;

        // Threshold chain: request, brand, then the configured default.
        let mut request = request.clone();
        if request.quality_threshold.is_none() && brand.quality_threshold.is_none() {
            request.quality_threshold = Some(self.defaults.quality_threshold);
        }

        self.controller(cancel).run(&request, brand).await
    }

    fn controller(&self, cancel: CancellationToken) -> IterationController {
        let gateway = ModelGateway::new(
            self.provider.clone(),
            self.pricing.clone(),
            self.ledger.clone(),
        )
        .with_retry(self.retry)
        .with_cancellation(cancel.clone());

        let registry = Arc::new(default_registry(
            &gateway,
            self.knowledge.clone(),
            self.search.clone(),
        ));
        let router =
            GatewayRoutingAdapter::new(gateway.clone()).with_tool_catalog(registry.definitions());

        IterationController::new(
            Planner::new(Arc::new(router)),
            ResearchStage::new(registry),
            GenerationStage::new(gateway.clone()),
            EvaluationStage::new(gateway, self.weights.clone()),
        )
        .with_cancellation(cancel)
    }
}
