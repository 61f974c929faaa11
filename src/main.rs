//! RAG Judge Bench CLI
//!
//! Generate agent answers, score them with an LLM judge, and summarize results.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rag_judge_bench::{
    config::{Config, OutputFormat, SplitSelection},
    dataset::{
        load_answered_csv, load_evaluations, load_questions_csv, save_answered_csv,
        save_evaluations,
    },
    eval::{
        BatchStatistics, BenchmarkRunner, ChatAgent, Evaluator, EvaluatorConfig, JudgeClient,
        ProgressBarObserver, RagAgent, answer_batch,
    },
    llm::LlmClient,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// RAG Judge Bench - LLM-as-judge evaluation for RAG agents
#[derive(Parser)]
#[command(name = "rag-bench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate agent answers for a question file
    Answer {
        /// Question CSV (query, standard_answer, course, material, page_range, question_type)
        input: PathBuf,

        /// Output path for the answered CSV
        #[arg(short, long, default_value = "rag_answers.csv")]
        output: PathBuf,

        /// Maximum number of questions to answer
        #[arg(long)]
        limit: Option<usize>,

        /// Concurrent agent calls (defaults to judge_evaluation.workers)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Score an answered CSV with the judge model
    Judge {
        /// Answered CSV produced by the `answer` command
        input: PathBuf,

        /// Output path (defaults to evaluation_<timestamp>.<format> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Concurrent judge calls (defaults to judge_evaluation.workers)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Run the full benchmark over the configured QA splits
    Run {
        /// Splits to run, overriding benchmark.splits
        #[arg(short, long, num_args = 1..)]
        splits: Option<Vec<String>>,

        /// Per-split question cap, overriding benchmark.max_questions_per_split
        #[arg(long)]
        max_questions: Option<i64>,
    },

    /// Print statistics for a saved evaluation file
    Summary {
        /// Evaluation results (.csv or .json)
        file: PathBuf,
    },

    /// Test judge (and agent, if configured) connections
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Answer {
            input,
            output,
            limit,
            workers,
        } => cmd_answer(config_path, input, output, limit, workers).await,
        Commands::Judge {
            input,
            output,
            workers,
        } => cmd_judge(config_path, input, output, workers).await,
        Commands::Run {
            splits,
            max_questions,
        } => cmd_run(config_path, splits, max_questions).await,
        Commands::Summary { file } => cmd_summary(file),
        Commands::Test => cmd_test(config_path).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::load(path).context("Failed to load configuration")
}

async fn cmd_answer(
    config_path: Option<&Path>,
    input: PathBuf,
    output: PathBuf,
    limit: Option<usize>,
    workers: Option<usize>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let agent_config = config.agent_config()?;
    if agent_config.base_url.is_empty() || agent_config.model_id.is_empty() {
        bail!("agent.base_url and agent.model_id must be set to generate answers");
    }
    let workers = workers.unwrap_or(config.judge_evaluation.workers).max(1);

    let questions = load_questions_csv(&input, limit)
        .with_context(|| format!("Failed to load questions from {}", input.display()))?;
    println!("Loaded {} questions from {}", questions.len(), input.display());
    println!("Using agent model: {}", agent_config.model_id);

    let start = Instant::now();
    let agent = Arc::new(ChatAgent::from_config(agent_config));
    let observer = ProgressBarObserver::new("answers");
    let answered = answer_batch(agent, questions, workers, &observer).await;

    save_answered_csv(&output, &answered).context("Failed to save answers")?;
    println!(
        "\nSaved {} answers to {} ({:.1}s)",
        answered.len(),
        output.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

async fn cmd_judge(
    config_path: Option<&Path>,
    input: PathBuf,
    output: Option<PathBuf>,
    workers: Option<usize>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(workers) = workers {
        config.judge_evaluation.workers = workers;
    }
    config.validate().context("Invalid configuration")?;

    let answered = load_answered_csv(&input)
        .with_context(|| format!("Failed to load answers from {}", input.display()))?;

    let (output, format) = match output {
        Some(path) => {
            let format = OutputFormat::from_path(&path);
            (path, format)
        }
        None => {
            let format = config.judge_evaluation.output.format;
            (default_judge_output(&input, format), format)
        }
    };

    println!("Evaluating {} answers from {}", answered.len(), input.display());
    println!("Judge model: {}", config.api.model_id);
    println!("Workers:     {}", config.judge_evaluation.workers);

    let start = Instant::now();
    let judge = JudgeClient::from_config(config.api.clone());
    let evaluator = Evaluator::new(judge, EvaluatorConfig::from(&config.judge_evaluation));
    let observer = ProgressBarObserver::new("judge");
    let results = evaluator.evaluate_batch(answered, &observer).await;

    save_evaluations(
        &output,
        &results,
        format,
        config.judge_evaluation.detailed_reasoning,
    )
    .context("Failed to save evaluation results")?;

    BatchStatistics::summarize(&results).print_summary("Evaluation Summary");
    println!(
        "Results saved to {} ({:.1}s)",
        output.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

fn default_judge_output(input: &Path, format: OutputFormat) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let name = format!("evaluation_{}.{}", timestamp, format.extension());
    match input.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

async fn cmd_run(
    config_path: Option<&Path>,
    splits: Option<Vec<String>>,
    max_questions: Option<i64>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(splits) = splits {
        config.benchmark.splits = SplitSelection::Many(splits);
    }
    if max_questions.is_some() {
        config.benchmark.max_questions_per_split = max_questions;
    }
    config.validate().context("Invalid configuration")?;

    let agent = Arc::new(ChatAgent::from_config(config.agent_config()?));
    let judge = JudgeClient::from_config(config.api.clone());
    let evaluator = Evaluator::new(judge, EvaluatorConfig::from(&config.judge_evaluation));

    println!("Benchmark Evaluation");
    println!("{}", "─".repeat(40));
    println!("  Splits:      {}", config.benchmark.splits.resolve()?.join(", "));
    match config.benchmark.question_limit() {
        Some(n) => println!("  Max per split: {}", n),
        None => println!("  Max per split: all"),
    }
    println!("  Workers:     {}", config.judge_evaluation.workers);
    println!("  Output dir:  {}", config.judge_evaluation.output.directory.display());
    println!();

    let report = BenchmarkRunner::new(config, agent, evaluator)
        .with_progress(true)
        .run()
        .await
        .context("Benchmark run failed")?;

    report.print_summary();
    if !report.all_succeeded() {
        bail!(
            "{} of {} splits failed",
            report.outcomes.len() - report.success_count(),
            report.outcomes.len()
        );
    }

    Ok(())
}

fn cmd_summary(file: PathBuf) -> Result<()> {
    let records = load_evaluations(&file)
        .with_context(|| format!("Failed to load evaluation results from {}", file.display()))?;

    let title = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Evaluation Summary".to_string());
    BatchStatistics::summarize(&records).print_summary(&title);

    Ok(())
}

async fn cmd_test(config_path: Option<&Path>) -> Result<()> {
    println!("Testing judge connection...\n");

    let config = load_config(config_path)?;

    println!("Configuration:");
    println!("  API Base:  {}", config.api.base_url);
    println!("  Model:     {}", config.api.model_id);
    println!(
        "  API Key:   {}...",
        config.api.api_key.chars().take(8).collect::<String>()
    );
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let client = LlmClient::new(config.api.clone());
    println!("Sending test request...");
    match client.test_connection().await {
        Ok(()) => println!("Judge connection successful!"),
        Err(e) => println!("Judge connection failed: {}", e),
    }

    if let Some(agent_config) = &config.agent {
        println!("\nTesting agent ({})...", agent_config.model_id);
        let agent = ChatAgent::from_config(agent_config);
        match agent.answer_question("Say 'hello' and nothing else.", None).await {
            Ok(answer) => println!("Agent replied: {}", answer),
            Err(e) => println!("Agent connection failed: {}", e),
        }
    }

    Ok(())
}
