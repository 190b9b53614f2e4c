//! Brandforge CLI, the main entry point.
//!
//! Commands:
//! - `run`: generate, critique and revise one piece of content
//! - `brands`: list the brand configurations on disk
//! - `templates`: list the prompt templates
//! - `usage`: summarize the cost ledger

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "brandforge",
    about = "Brandforge: brand-aligned marketing copy with iterative critique",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.brandforge/config.toml)
    #[arg(short, long, global = true, env = "BRANDFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate content for a topic and brand
    Run {
        /// What the content is about
        #[arg(short, long)]
        topic: String,

        /// Brand configuration name (file stem in the brands directory)
        #[arg(short, long)]
        brand: String,

        /// Prompt template key
        #[arg(long)]
        template: Option<String>,

        /// Chain-of-thought prompting
        #[arg(long)]
        cot: bool,

        /// Maximum generate/evaluate cycles
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Score (0-10) a draft must reach
        #[arg(long)]
        threshold: Option<f64>,

        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available brands
    Brands,

    /// List prompt templates
    Templates,

    /// Summarize recorded model spend
    Usage {
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run {
            topic,
            brand,
            template,
            cot,
            max_iterations,
            threshold,
            json,
        } => {
            let args = commands::run::RunArgs {
                topic,
                brand,
                template,
                cot,
                max_iterations,
                threshold,
                json,
            };
            commands::run::run(config, args).await?
        }
        Commands::Brands => commands::brands::run(config)?,
        Commands::Templates => commands::templates::run(),
        Commands::Usage { json } => commands::usage::run(config, json)?,
    }

    Ok(())
}
