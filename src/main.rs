use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, Instrument};

use punchline::extract::{coerce_list, format_numbered_list};
use punchline::io::to_payload;
use punchline::{
    LoggingContext, OpenAiClient, OutputMode, Pipeline, PipelineConfig, RunConfig, RunLog,
    Settings,
};

#[derive(Parser)]
#[command(name = "punchline")]
#[command(author, version, about = "Multi-stage LLM joke generation pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a joke from a constraint
    Run {
        /// Model name (defaults to MODEL or gpt-5-nano)
        #[arg(long)]
        model: Option<String>,

        /// Input topic or constraint
        #[arg(long)]
        input: Option<String>,

        /// Number of angles and drafts to generate
        #[arg(long, default_value = "4", value_parser = clap::value_parser!(u64).range(1..))]
        k: u64,

        /// Request schema-validated outputs instead of free text
        #[arg(long)]
        structured: bool,

        /// Feed the template output into the context stage
        #[arg(long)]
        ground_context: bool,

        /// Directory for run.log, artifacts.jsonl and summary.json
        #[arg(long, default_value = "runs/latest")]
        run_dir: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Parse a list from raw model output without calling a model
    Extract {
        /// File with raw model output ("-" reads stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Expected item count (0 disables the count check)
        #[arg(long, default_value = "0")]
        k: usize,

        /// Name used in count-mismatch warnings
        #[arg(long, default_value = "extract")]
        label: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            model,
            input,
            k,
            structured,
            ground_context,
            run_dir,
            verbose,
        } => {
            let settings = Settings::from_env()?;
            let config = RunConfig {
                model: model.unwrap_or_else(|| settings.model.clone()),
                input,
                k: k as usize,
                mode: if structured {
                    OutputMode::Structured
                } else {
                    OutputMode::Permissive
                },
                ground_context,
                run_dir,
            };
            run(settings, config, verbose).await
        }
        Commands::Extract {
            input,
            k,
            label,
            verbose,
        } => {
            LoggingContext::init_console(verbose);
            extract(input, k, &label)
        }
    }
}

async fn run(settings: Settings, config: RunConfig, verbose: bool) -> Result<()> {
    let logging = LoggingContext::new(&config.run_dir, verbose);
    logging.init()?;
    info!("run directory={:?}", logging.run_dir());

    let run_log = logging.run_logger();
    run_log
        .log_step(
            "settings",
            json!({"base_url": settings.base_url, "model_default": settings.model}),
            None,
        )
        .context("Failed to write run log")?;
    run_log
        .log_step("run_config", to_payload(&config), None)
        .context("Failed to write run log")?;

    let client = OpenAiClient::new(settings, config.model.clone())
        .context("Failed to build model client")?;
    let pipeline = Pipeline::new(client, run_log, PipelineConfig::from(&config));

    let summary = pipeline
        .run(config.constraint())
        .instrument(logging.span())
        .await?;

    let summary_path = logging.run_dir().join("summary.json");
    summary.write_json(&summary_path)?;
    info!("Summary written to {:?}", summary_path);

    println!("{}", summary.selection);
    Ok(())
}

fn extract(input: PathBuf, k: usize, label: &str) -> Result<()> {
    let raw = if input.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        buffer
    } else {
        std::fs::read_to_string(&input)
            .with_context(|| format!("Failed to read file: {:?}", input))?
    };

    let outcome = coerce_list(label, &json!(raw), k);
    info!(
        "Extracted {} items ({} kept)",
        outcome.extracted,
        outcome.items.len()
    );

    println!("{}", format_numbered_list(&outcome.items));
    Ok(())
}
