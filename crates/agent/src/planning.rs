//! Planning stage: decides whether a request needs research, and which.
//!
//! The model-facing side sits behind [`RoutingAdapter`] so a different host
//! runtime only has to translate its own routing call, not re-implement the
//! stage. Whatever the adapter returns is sanitized against the closed
//! [`Capability`] vocabulary before anything downstream sees it.

use crate::research::ResearchResult;
use async_trait::async_trait;
use brandforge_config::StageModelConfig;
use brandforge_core::completion::StageUsage;
use brandforge_core::error::Result;
use brandforge_core::message::{Message, recent_dialogue};
use brandforge_core::provider::{ProviderRequest, ToolDefinition};
use brandforge_core::tool::Capability;
use brandforge_providers::{ModelGateway, StructuredOutput};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Non-system history messages replayed to the planner.
pub const HISTORY_WINDOW: usize = 6;

/// Where the controller goes after planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Research,
    Write,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Research => "research",
            Route::Write => "write",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sanitized routing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningDecision {
    pub route: Route,
    /// Empty unless `route` is [`Route::Research`].
    pub tools: Vec<Capability>,
    pub reason: String,
    /// In [0, 1].
    pub confidence: f64,
}

impl PlanningDecision {
    /// The note appended to the audit trail.
    pub fn audit_message(&self) -> String {
        let tools: Vec<String> = self.tools.iter().map(|t| format!("'{t}'")).collect();
        format!(
            "Planner decision: route='{}', tools=[{}], confidence={:.3}.",
            self.route,
            tools.join(", "),
            self.confidence
        )
    }
}

/// The routing answer as the model writes it.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RoutingAnswer {
    pub route: Route,
    /// Capability names; anything outside the vocabulary is dropped.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

impl StructuredOutput for RoutingAnswer {
    fn output_name() -> &'static str {
        "planning_decision"
    }

    fn check(&self) -> std::result::Result<(), String> {
        if !self.confidence.is_finite() {
            return Err("confidence must be a finite number".into());
        }
        Ok(())
    }
}

/// What an adapter hands back before sanitization.
#[derive(Debug, Clone)]
pub struct RawRouting {
    pub answer: RoutingAnswer,
    /// Gateway usage spent producing the answer.
    pub usage: StageUsage,
}

/// Everything the initial planning pass looks at.
#[derive(Debug, Clone)]
pub struct PlanningInput {
    pub topic: String,
    pub brand: String,
    pub history: Vec<Message>,
    pub settings: StageModelConfig,
}

/// Translation layer between a routing backend and the planning stage.
#[async_trait]
pub trait RoutingAdapter: Send + Sync {
    /// Ask the backend for a routing answer.
    async fn invoke(&self, input: &PlanningInput) -> Result<RawRouting>;

    /// Turn the raw answer into a decision the controller can trust.
    fn extract(&self, raw: &RawRouting) -> PlanningDecision {
        sanitize(&raw.answer)
    }
}

/// Enforce the routing contract on a model answer.
///
/// Unknown tool names are dropped, research without tools becomes a write,
/// a write never carries tools, and confidence is clamped to [0, 1].
pub fn sanitize(answer: &RoutingAnswer) -> PlanningDecision {
    let mut tools: Vec<Capability> = Vec::new();
    for name in &answer.tools {
        match name.parse::<Capability>() {
            Ok(capability) if !tools.contains(&capability) => tools.push(capability),
            Ok(_) => {}
            Err(_) => warn!(tool = %name, "Planner returned an unknown tool, dropping it"),
        }
    }

    let route = match answer.route {
        Route::Research if tools.is_empty() => {
            warn!("Planner chose research without usable tools, routing to write");
            Route::Write
        }
        route => route,
    };
    if route == Route::Write {
        tools.clear();
    }

    PlanningDecision {
        route,
        tools,
        reason: answer.reason.trim().to_string(),
        confidence: if answer.confidence.is_finite() {
            answer.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        },
    }
}

/// The planner's user prompt.
pub fn planning_prompt(topic: &str, brand: &str) -> String {
    let vocabulary: Vec<&str> = Capability::ALL.iter().map(|c| c.as_str()).collect();
    format!(
        "Content request: {topic}\nBrand: {brand}\nDecide whether research is required. \
         If research is needed, choose from [{}] and return exactly those tool names.",
        vocabulary.join(", ")
    )
}

/// Routing through the model gateway with structured output.
pub struct GatewayRoutingAdapter {
    gateway: ModelGateway,
    catalog: Vec<ToolDefinition>,
}

impl GatewayRoutingAdapter {
    pub fn new(gateway: ModelGateway) -> Self {
        Self {
            gateway,
            catalog: Vec::new(),
        }
    }

    /// Describe the registered tools to the planner in its system message.
    pub fn with_tool_catalog(mut self, catalog: Vec<ToolDefinition>) -> Self {
        self.catalog = catalog;
        self
    }

    fn system_message(&self, base: &str) -> String {
        if self.catalog.is_empty() {
            return base.to_string();
        }
        let mut message = format!("{base}\n\nAvailable tools:");
        for tool in &self.catalog {
            message.push_str(&format!("\n- {}: {}", tool.name, tool.description));
        }
        message
    }

    fn messages(&self, input: &PlanningInput) -> Vec<Message> {
        let mut messages = vec![
            Message::system(self.system_message(&input.settings.system_message)),
            Message::user(planning_prompt(&input.topic, &input.brand)),
        ];
        messages.extend(recent_dialogue(&input.history, HISTORY_WINDOW));
        messages
    }
}

#[async_trait]
impl RoutingAdapter for GatewayRoutingAdapter {
    async fn invoke(&self, input: &PlanningInput) -> Result<RawRouting> {
        let request = ProviderRequest::new(input.settings.model.clone(), self.messages(input))
            .with_temperature(input.settings.temperature)
            .with_max_tokens(input.settings.max_tokens);

        let (answer, result) = self
            .gateway
            .complete_structured::<RoutingAnswer>(request)
            .await?;
        debug!(route = %answer.route, tools = ?answer.tools, "Raw routing answer");
        Ok(RawRouting {
            answer,
            usage: StageUsage::from_completion(&result),
        })
    }
}

/// A planning pass result.
#[derive(Debug, Clone)]
pub struct PlanningOutcome {
    pub decision: PlanningDecision,
    pub usage: StageUsage,
}

/// The planning stage.
pub struct Planner {
    adapter: Arc<dyn RoutingAdapter>,
}

impl Planner {
    pub fn new(adapter: Arc<dyn RoutingAdapter>) -> Self {
        Self { adapter }
    }

    /// Planner backed by the model gateway.
    pub fn with_gateway(gateway: ModelGateway) -> Self {
        Self::new(Arc::new(GatewayRoutingAdapter::new(gateway)))
    }

    /// Initial planning: ask the routing backend.
    pub async fn plan(&self, input: &PlanningInput) -> Result<PlanningOutcome> {
        let raw = self.adapter.invoke(input).await?;
        let decision = self.adapter.extract(&raw);
        info!(
            route = %decision.route,
            tools = ?decision.tools,
            confidence = decision.confidence,
            "Planning complete"
        );
        Ok(PlanningOutcome {
            decision,
            usage: raw.usage,
        })
    }
}

/// Post-research planning. Always routes to write; confidence reflects
/// whether any evidence came back.
pub fn plan_after_research(research: &ResearchResult) -> PlanningDecision {
    let decision = if research.has_evidence() {
        PlanningDecision {
            route: Route::Write,
            tools: Vec::new(),
            reason: "Research completed; evidence available. Proceed to writer using aggregated tool contexts.".into(),
            confidence: 0.9,
        }
    } else {
        PlanningDecision {
            route: Route::Write,
            tools: Vec::new(),
            reason: "No research evidence returned; proceed to writer using brand guidance only. \
                     Re-running research is not attempted."
                .into(),
            confidence: 0.6,
        }
    };
    info!(
        evidence = research.evidence.len(),
        confidence = decision.confidence,
        "Post-research planning"
    );
    decision
}
