//! `brandforge usage`: summarize the cost ledger.

use super::load_config;
use brandforge_telemetry::{CostLedger, CostSummary, JsonlLedger};
use std::path::Path;

pub fn run(config_path: Option<&Path>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let ledger = JsonlLedger::new(config.ledger.path.clone());
    let summary = ledger.summary()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(ledger.path(), &summary);
    }
    Ok(())
}

fn print_summary(path: &Path, summary: &CostSummary) {
    println!("📊 Model Spend ({})", path.display());
    println!("─────────────────────────────────────");
    if summary.calls == 0 {
        println!("  No calls recorded yet.");
        return;
    }
    println!("  Total cost:     €{:.6}", summary.total_cost_eur);
    println!("  Calls:          {}", summary.calls);
    println!("  Avg per call:   €{:.6}", summary.average_cost_per_call);
    println!(
        "  Tokens:         {} in / {} out",
        summary.total_input_tokens, summary.total_output_tokens
    );
    if let (Some(from), Some(to)) = (summary.from, summary.to) {
        println!(
            "  Period:         {} → {}",
            from.format("%Y-%m-%d %H:%M"),
            to.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("{:<40} {:>12} {:>8} {:>10} {:>10}", "Model", "Cost", "Calls", "In", "Out");
    for model in &summary.by_model {
        println!(
            "{:<40} €{:>11.6} {:>8} {:>10} {:>10}",
            model.model, model.cost_eur, model.calls, model.input_tokens, model.output_tokens
        );
    }
}
