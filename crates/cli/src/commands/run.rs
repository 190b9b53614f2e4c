//! `brandforge run`: generate, critique and revise one piece of content.

use super::load_config;
use brandforge_config::AppConfig;
use brandforge_workflow::{ContentEngine, RunFailure, WorkflowState};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct RunArgs {
    pub topic: String,
    pub brand: String,
    pub template: Option<String>,
    pub cot: bool,
    pub max_iterations: Option<u32>,
    pub threshold: Option<f64>,
    pub json: bool,
}

pub async fn run(
    config_path: Option<&Path>,
    args: RunArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;

    // Check for API key early, with setup hints
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    BRANDFORGE_API_KEY=...   (generic)");
        eprintln!("    OPENROUTER_API_KEY=...   (recommended)");
        eprintln!("    OPENAI_API_KEY=...       (OpenAI direct, set BRANDFORGE_BASE_URL too)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let engine = ContentEngine::from_config(&config)?;
    let mut request = engine.request(args.topic, args.brand);
    if args.cot {
        request = request.with_cot(true);
    }
    if let Some(template) = args.template {
        request = request.with_template(template);
    }
    if let Some(max_iterations) = args.max_iterations {
        request = request.with_max_iterations(max_iterations);
    }
    if let Some(threshold) = args.threshold {
        request = request.with_quality_threshold(threshold);
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, cancelling run");
                cancel.cancel();
            }
        })
    };
    let outcome = engine.run_with_cancellation(&request, cancel).await;
    ctrl_c.abort();

    match outcome {
        Ok(state) if args.json => println!("{}", serde_json::to_string_pretty(&state)?),
        Ok(state) => print_state(&state),
        Err(failure) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&failure_json(&failure))?);
            } else {
                eprintln!(
                    "Run failed during {} ({}): {}",
                    failure.phase,
                    failure.kind(),
                    failure.error
                );
                eprintln!("{} audit messages recorded before the failure", failure.messages.len());
            }
            return Err(failure.into());
        }
    }
    Ok(())
}

fn failure_json(failure: &RunFailure) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "kind": failure.kind(),
            "message": failure.error.to_string(),
            "phase": failure.phase,
        },
        "messages": failure.messages,
    })
}

fn print_state(state: &WorkflowState) {
    println!("{}", state.content);
    println!();
    println!("─────────────────────────────────────");
    let verdict = if state.meets_quality_threshold {
        "passed"
    } else {
        "below threshold"
    };
    if let Some(critique) = &state.critique {
        println!(
            "  Score:      {:.2}/10 ({verdict}, threshold {:.2})",
            critique.average_score(),
            state.quality_threshold
        );
        for (dimension, score) in critique.scores() {
            println!("    {dimension:<12} {score:.1}");
        }
        if !critique.violations.is_empty() {
            println!("  Violations:");
            for violation in &critique.violations {
                println!("    • {violation}");
            }
        }
    }
    println!(
        "  Iterations: {}/{}",
        state.iteration_count, state.max_iterations
    );
    for cycle in &state.cycles {
        println!(
            "    #{} score {:.2}  €{:.6}  {:.2}s",
            cycle.iteration,
            cycle.score,
            cycle.cost(),
            cycle.latency_secs()
        );
    }
    let total = state.usage.total();
    println!(
        "  Spend:      €{:.6} over {} calls ({} in / {} out tokens)",
        total.cost, total.calls, total.input_tokens, total.output_tokens
    );
}
