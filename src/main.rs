//! Numeric Error Benchmark CLI
//!
//! Measures whether a chat model can tell when a number in a passage is wrong.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run the full pipeline on a dataset
//! export ZHIPUAI_API_KEY=...
//! ./numeric-error-bench run --dataset ./annotated.json
//!
//! # Quick run on a reproducible sample of 200 records
//! ./numeric-error-bench run --dataset ./annotated.json --sample 200 --seed 7
//!
//! # Re-score an existing predictions file
//! ./numeric-error-bench evaluate --predictions results/predictions.jsonl
//! ```
//!
//! ## Model Configuration
//!
//! The model and system prompt are configured in `model.toml`. Without the
//! file, `glm-4-flash` on the Zhipu endpoint is used with the fact-checker
//! persona.

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use numeric_error_bench::benchmark::{
    collect_remediation, format_report, parse_prediction, run_predictions, MetricsAccumulator,
    MetricsReport, ParsedLabel,
};
use numeric_error_bench::clients::{ChatBackend, OpenAiCompatibleBackend};
use numeric_error_bench::config::{parse_system_prompt, BenchConfig, RunSettings, SystemPromptStyle};
use numeric_error_bench::dataset::{zero_shot_prompt, Dataset, FEW_SHOT_EXAMPLES, FEW_SHOT_EVERY};
use numeric_error_bench::predictions::{
    load_predictions, save_json, save_jsonl, write_json_pretty, PredictionRecord,
};

#[derive(Parser)]
#[command(name = "numeric-error-bench")]
#[command(about = "Numeric error detection benchmark for chat models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark on an annotated dataset
    ///
    /// Every record yields a correct and an erroneous item; both are sent to
    /// the model and the answers are scored.
    Run {
        /// Path to the annotated dataset (JSON object of records)
        #[arg(short, long)]
        dataset: PathBuf,

        /// Output file for predictions (JSON array)
        #[arg(short, long, default_value = "results/results.json")]
        output: PathBuf,

        /// Output file for predictions (JSON Lines)
        #[arg(long, default_value = "results/predictions.jsonl")]
        jsonl: PathBuf,

        /// Path to model config file (TOML)
        #[arg(short, long, default_value = "model.toml")]
        model_config: PathBuf,

        /// Model ID, overriding the config file
        #[arg(long)]
        model: Option<String>,

        /// Built-in system prompt (fact-checker, analyst), overriding the config file
        #[arg(long, value_parser = parse_system_prompt)]
        system_prompt: Option<SystemPromptStyle>,

        /// Use only the first N records
        #[arg(short, long)]
        limit: Option<usize>,

        /// Use N records sampled at random (source order kept)
        #[arg(long, conflicts_with = "limit")]
        sample: Option<usize>,

        /// Seed for --sample
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Write expected-error items with unparseable answers here
        #[arg(long)]
        unparsed_output: Option<PathBuf>,

        /// Write the metrics summary (JSON) here
        #[arg(long)]
        metrics_output: Option<PathBuf>,
    },

    /// Re-score an existing predictions file
    Evaluate {
        /// Predictions file (JSONL, or JSON array with a .json extension)
        #[arg(short, long)]
        predictions: PathBuf,

        /// Write expected-error items with unparseable answers here
        #[arg(long)]
        unparsed_output: Option<PathBuf>,

        /// Write the metrics summary (JSON) here
        #[arg(long)]
        metrics_output: Option<PathBuf>,
    },

    /// Validate a dataset file
    ValidateDataset {
        /// Path to the annotated dataset
        #[arg(short, long)]
        dataset: PathBuf,
    },

    /// Send the worked examples to the configured model
    Test {
        /// Path to model config file (TOML)
        #[arg(short, long, default_value = "model.toml")]
        model_config: PathBuf,

        /// Model ID, overriding the config file
        #[arg(long)]
        model: Option<String>,

        /// Built-in system prompt (fact-checker, analyst), overriding the config file
        #[arg(long, value_parser = parse_system_prompt)]
        system_prompt: Option<SystemPromptStyle>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            dataset,
            output,
            jsonl,
            model_config,
            model,
            system_prompt,
            limit,
            sample,
            seed,
            unparsed_output,
            metrics_output,
        } => {
            let config = load_config(&model_config, model, system_prompt)?;
            run_benchmark(
                &dataset,
                &output,
                &jsonl,
                config,
                limit,
                sample,
                seed,
                unparsed_output.as_deref(),
                metrics_output.as_deref(),
            )
            .await?;
        }

        Commands::Evaluate {
            predictions,
            unparsed_output,
            metrics_output,
        } => {
            evaluate_predictions(&predictions, unparsed_output.as_deref(), metrics_output.as_deref())?;
        }

        Commands::ValidateDataset { dataset } => {
            validate_dataset(&dataset)?;
        }

        Commands::Test {
            model_config,
            model,
            system_prompt,
        } => {
            test_model(load_config(&model_config, model, system_prompt)?).await?;
        }
    }

    Ok(())
}

fn load_config(
    path: &Path,
    model: Option<String>,
    system_prompt: Option<SystemPromptStyle>,
) -> Result<BenchConfig> {
    if path.exists() {
        println!("Loading model config from {:?}...", path);
    } else {
        println!("Using default model config...");
    }
    Ok(BenchConfig::load_or_default(path)?.with_overrides(model, system_prompt))
}

/// Run the full pipeline: load, predict, save, score
#[allow(clippy::too_many_arguments)]
async fn run_benchmark(
    dataset_path: &Path,
    output: &Path,
    jsonl: &Path,
    config: BenchConfig,
    limit: Option<usize>,
    sample: Option<usize>,
    seed: u64,
    unparsed_output: Option<&Path>,
    metrics_output: Option<&Path>,
) -> Result<()> {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              NUMERIC ERROR BENCHMARK                         ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!(
        "  Model: {} ({})",
        config.model.name, config.model.base_url
    );
    println!(
        "  System prompt: {} - {}",
        config.prompt.label(),
        config.prompt.description()
    );

    // Dataset errors surface before any API call
    println!("\nLoading dataset from {:?}...", dataset_path);
    let mut dataset = Dataset::load(dataset_path)?;
    let full_len = dataset.len();
    if let Some(n) = limit {
        dataset = dataset.with_limit(n);
    } else if let Some(n) = sample {
        dataset = dataset.with_sample(n, seed);
    }
    let loaded = dataset.build_items();
    println!(
        "  {} of {} records selected, {} items ({} records few-shot, {} skipped)",
        dataset.len(),
        full_len,
        loaded.items.len(),
        loaded.few_shot_records,
        loaded.skipped.len()
    );

    let backend = OpenAiCompatibleBackend::new(&config.model)?;

    let pb = ProgressBar::new(loaded.items.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut running = MetricsAccumulator::new();
    let records = run_predictions(&backend, config.prompt.system_prompt(), loaded.items, |_, record| {
        running.record(record);
        pb.set_message(format!("acc {:.3}", running.overall.accuracy()));
        pb.inc(1);
    })
    .await;
    pb.finish_and_clear();
    println!("\n  {}", running.overall.format_summary());

    save_json(output, &records)?;
    save_jsonl(jsonl, &records)?;
    println!("\nPredictions saved to {:?} and {:?}", output, jsonl);

    let run = RunSettings {
        dataset: dataset_path.display().to_string(),
        model: config.model.name.clone(),
        base_url: config.model.base_url.clone(),
        system_prompt: config.prompt.label().to_string(),
        temperature: config.model.temperature,
        top_p: config.model.top_p,
        limit,
        sample,
        seed,
    };

    finish_scoring(&records, jsonl, Some(run), unparsed_output, metrics_output)
}

/// Re-score a saved predictions file
fn evaluate_predictions(
    predictions: &Path,
    unparsed_output: Option<&Path>,
    metrics_output: Option<&Path>,
) -> Result<()> {
    println!("Loading predictions from {:?}...", predictions);
    let records = load_predictions(predictions)?;
    println!("  {} records", records.len());

    finish_scoring(&records, predictions, None, unparsed_output, metrics_output)
}

fn finish_scoring(
    records: &[PredictionRecord],
    predictions: &Path,
    run: Option<RunSettings>,
    unparsed_output: Option<&Path>,
    metrics_output: Option<&Path>,
) -> Result<()> {
    let metrics = MetricsAccumulator::from_records(records);
    println!("\n{}", format_report(&metrics));

    if let Some(path) = unparsed_output {
        let remediation = collect_remediation(records);
        if remediation.is_empty() {
            println!("No unparseable error items; {:?} not written", path);
        } else {
            write_json_pretty(path, &remediation)?;
            println!("{} unparseable error items saved to {:?}", remediation.len(), path);
        }
    }

    if let Some(path) = metrics_output {
        MetricsReport::new(predictions, run, metrics).save(path)?;
        println!("Metrics saved to {:?}", path);
    }

    Ok(())
}

/// Validate a dataset file
fn validate_dataset(path: &Path) -> Result<()> {
    println!("Validating {:?}...", path);

    let dataset = Dataset::load(path)?;
    let loaded = dataset.build_items();

    println!("✓ Valid dataset");
    println!("  Records: {}", dataset.len());
    println!("  Items: {}", loaded.items.len());
    println!(
        "  Few-shot records: {} (every {}th record)",
        loaded.few_shot_records, FEW_SHOT_EVERY
    );
    if !loaded.skipped.is_empty() {
        println!("  Skipped records: {}", loaded.skipped.len());
        for key in loaded.skipped.iter().take(10) {
            println!("    {}", key);
        }
        if loaded.skipped.len() > 10 {
            println!("    ... and {} more", loaded.skipped.len() - 10);
        }
    }

    let mut by_dataset: indexmap::IndexMap<&str, usize> = indexmap::IndexMap::new();
    for item in &loaded.items {
        *by_dataset.entry(item.dataset.as_str()).or_default() += 1;
    }
    println!("  Items per dataset:");
    for (name, count) in by_dataset {
        println!("    {}: {}", name, count);
    }

    Ok(())
}

async fn test_model(config: BenchConfig) -> Result<()> {
    let backend = OpenAiCompatibleBackend::new(&config.model)?;

    println!(
        "Testing model: {} (system prompt: {})\n",
        backend.name(),
        config.prompt.label()
    );

    let mut correct = 0;
    for example in &FEW_SHOT_EXAMPLES {
        let prompt = zero_shot_prompt(example.passage, example.number);
        let (raw, parsed) = match backend.complete(config.prompt.system_prompt(), &prompt).await {
            Ok(text) => {
                let parsed = parse_prediction(&text);
                (text, parsed)
            }
            Err(e) => (format!("error: {:#}", e), ParsedLabel::Unparseable),
        };

        let expected = example.answer.to_lowercase();
        let ok = parsed.name() == expected;
        if ok {
            correct += 1;
        }
        println!(
            "  {} {:45} expected {:3} got {:11} {:?}",
            if ok { "✓" } else { "✗" },
            format!("\"{}\" in \"{}\"", example.number, example.passage)
                .chars()
                .take(45)
                .collect::<String>(),
            example.answer,
            parsed.name(),
            raw.trim()
        );
    }

    println!("\n{}/{} worked examples answered correctly", correct, FEW_SHOT_EXAMPLES.len());
    Ok(())
}
