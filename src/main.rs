//! Search Evaluator CLI
//!
//! Compares search engines by grading their results with an LLM.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use search_evaluator::{
    config::Config,
    evaluator::{EvaluationListener, Evaluator},
    llm::{LlmClient, dimension_criteria, stream::GraderTranscript},
    model::{
        Dimension, EvaluationProgress, EvaluationResult, LogEntry, ScoringSystem, SearchEngine,
        SearchResponse,
    },
    query::{load_queries_file, parse_queries},
    report,
    search::SearchClient,
    state::{AppState, SharedState},
};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Search Evaluator - compare search engine quality with an LLM grader
#[derive(Parser)]
#[command(name = "search-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML config file (defaults to the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one or more queries across the selected engines
    Run(RunArgs),

    /// List configured search engines
    Engines,

    /// List configured evaluation dimensions
    Dimensions,

    /// Show the grading instruction used for a dimension
    Prompt {
        /// Dimension name or id
        dimension: String,

        /// Scoring system (binary or five-point)
        #[arg(short, long)]
        scoring_system: Option<ScoringSystem>,
    },

    /// Test connectivity to the search and scoring endpoints
    Test,
}

#[derive(Args)]
struct RunArgs {
    /// Queries to evaluate
    queries: Vec<String>,

    /// File with one query per line
    #[arg(short = 'f', long)]
    queries_file: Option<PathBuf>,

    /// Comma-separated engine ids or codes (default: enabled in config)
    #[arg(short, long, value_delimiter = ',')]
    engines: Vec<String>,

    /// Comma-separated dimension names (default: enabled in config)
    #[arg(short, long, value_delimiter = ',')]
    dimensions: Vec<String>,

    /// Scoring rounds per engine
    #[arg(short, long)]
    rounds: Option<u32>,

    /// Scoring system (binary or five-point)
    #[arg(short, long)]
    scoring_system: Option<ScoringSystem>,

    /// Results requested per engine
    #[arg(short = 'k', long)]
    count: Option<usize>,

    /// Stream grader responses
    #[arg(long)]
    stream: bool,

    /// Print grader answers live as they stream (implies --stream)
    #[arg(long)]
    show_stream: bool,

    /// Pause between scoring calls in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Print the result list of each engine
    #[arg(long)]
    show_results: bool,

    /// Emit a JSON report instead of tables
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run(args) => cmd_run(cli.config, cli.verbose, args).await,
        Commands::Engines => cmd_engines(cli.config),
        Commands::Dimensions => cmd_dimensions(cli.config),
        Commands::Prompt {
            dimension,
            scoring_system,
        } => cmd_prompt(cli.config, dimension, scoring_system),
        Commands::Test => cmd_test(cli.config).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "warn,search_evaluator=debug"
    } else {
        "warn,search_evaluator=off"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    Config::load(path.as_deref()).context("Failed to load configuration")
}

/// Live view of a run: progress bar plus log lines, backed by [`SharedState`].
struct ConsoleListener {
    state: SharedState,
    bar: ProgressBar,
    print_logs: bool,
    show_stream: bool,
    transcript: Mutex<GraderTranscript>,
}

impl ConsoleListener {
    fn new(state: AppState, quiet: bool, print_logs: bool, show_stream: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        };

        Self {
            state: SharedState::new(state),
            bar,
            print_logs: print_logs && !quiet,
            show_stream: show_stream && !quiet,
            transcript: Mutex::new(GraderTranscript::new()),
        }
    }

    fn into_state(self) -> AppState {
        self.state.into_inner()
    }

    fn transcript(&self) -> std::sync::MutexGuard<'_, GraderTranscript> {
        self.transcript
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl EvaluationListener for ConsoleListener {
    fn on_search_results(&self, query: &str, engine: &SearchEngine, response: &SearchResponse) {
        self.state.on_search_results(query, engine, response);
    }

    fn on_result(&self, result: &EvaluationResult) {
        self.state.on_result(result);
    }

    fn on_progress(&self, progress: &EvaluationProgress) {
        self.state.on_progress(progress);
        self.bar.set_position(progress.percent as u64);
        if progress.complete {
            self.bar.finish_with_message("complete");
        } else {
            self.bar.set_message(format!(
                "{} round {}/{} ({}/{})",
                progress.current_engine,
                progress.current_round,
                progress.total_rounds,
                progress.completed,
                progress.total
            ));
        }
    }

    fn on_stream_chunk(&self, chunk: &str) {
        tracing::trace!("stream chunk: {}", chunk);
        if !self.show_stream {
            return;
        }
        for line in self.transcript().push(chunk) {
            self.bar.println(format!("  │ {}", line));
        }
    }

    fn on_dimension_scored(
        &self,
        engine: &SearchEngine,
        dimension: &Dimension,
        round: u32,
        score: f64,
    ) {
        if !self.show_stream {
            return;
        }
        if let Some(line) = self.transcript().finish() {
            self.bar.println(format!("  │ {}", line));
        }
        self.bar.println(format!(
            "  └ {} round {} {}: {}",
            engine.name, round, dimension.name, score
        ));
    }

    fn on_log(&self, entry: &LogEntry) {
        self.state.on_log(entry);
        if self.print_logs {
            self.bar.println(entry.to_string());
        }
    }
}

async fn cmd_run(config_path: Option<PathBuf>, verbose: bool, args: RunArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let mut state = AppState::from_config(config);

    if !args.engines.is_empty() {
        state.select_engines(&args.engines)?;
    }
    if !args.dimensions.is_empty() {
        state.select_dimensions(&args.dimensions)?;
    }
    if let Some(rounds) = args.rounds {
        state.set_rounds(rounds)?;
    }
    if let Some(system) = args.scoring_system {
        state.set_scoring_system(system);
    }
    if let Some(count) = args.count {
        state.set_result_count(count)?;
    }
    if args.stream || args.show_stream {
        state.set_stream(true);
    }

    let mut queries: Vec<String> = args
        .queries
        .iter()
        .flat_map(|q| parse_queries(q))
        .collect();
    if let Some(path) = &args.queries_file {
        queries.extend(load_queries_file(path).context("Failed to read queries file")?);
    }

    let request = state.evaluation_request(queries);
    request.validate()?;

    let mut evaluator = Evaluator::from_config(state.config()).context("Invalid configuration")?;
    if let Some(delay) = args.delay_ms {
        evaluator = evaluator.with_delay(Duration::from_millis(delay));
    }

    let system = request.scoring_system;
    if !args.json {
        println!(
            "Evaluating {} queries on {} engines ({} evaluations, {} scoring, model {})",
            request.active_queries().len(),
            request.enabled_engines().len(),
            request.planned_evaluations(),
            system,
            state.config().api.model
        );
    }

    let start = Instant::now();
    let listener = ConsoleListener::new(state, args.json, !verbose, args.show_stream);
    evaluator.run(&request, &listener).await?;
    let state = listener.into_state();

    if args.json {
        println!("{}", report::to_json(state.results())?);
        return Ok(());
    }

    if args.show_results {
        report::print_results(state.results(), request.result_count);
    }
    report::print_summary(state.results(), system);
    println!("Finished in {:.1?}", start.elapsed());

    Ok(())
}

fn cmd_engines(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{:<8} {:<20} {:<12} {}", "ID", "CODE", "NAME", "ENABLED");
    println!("{}", "─".repeat(50));
    for engine in &config.engines {
        println!(
            "{:<8} {:<20} {:<12} {}",
            engine.id,
            engine.code,
            engine.name,
            if engine.enabled { "yes" } else { "no" }
        );
    }

    Ok(())
}

fn cmd_dimensions(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{:<14} {:>6} {:<8} {}", "NAME", "WEIGHT", "ENABLED", "PROMPT");
    println!("{}", "─".repeat(50));
    for dim in &config.dimensions {
        println!(
            "{:<14} {:>6.2} {:<8} {}",
            dim.name,
            dim.weight,
            if dim.enabled { "yes" } else { "no" },
            if dim.prompt.is_some() { "custom" } else { "built-in" }
        );
    }
    println!();
    println!(
        "Scoring system: {}, rounds: {}",
        config.evaluation.scoring_system, config.evaluation.rounds
    );

    Ok(())
}

fn cmd_prompt(
    config_path: Option<PathBuf>,
    dimension: String,
    scoring_system: Option<ScoringSystem>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let system = scoring_system.unwrap_or(config.evaluation.scoring_system);

    let dim = config
        .dimensions
        .iter()
        .find(|d| d.name == dimension || d.id == dimension)
        .with_context(|| format!("Unknown dimension '{}'", dimension))?;

    println!("Dimension: {} ({} scoring)", dim.name, system);
    println!("{}", "─".repeat(60));
    println!("{}", dimension_criteria(dim, system));
    println!();
    println!("{}", system.describe());

    Ok(())
}

async fn cmd_test(config_path: Option<PathBuf>) -> Result<()> {
    println!("Testing API connectivity...\n");

    let config = load_config(config_path)?;

    println!("Configuration:");
    println!("  Search:    {}", config.api.search_endpoint);
    println!("  Scoring:   {}", config.api.scoring_endpoint);
    println!("  Model:     {}", config.api.model);
    println!(
        "  API Key:   {}...",
        config.api.api_key.chars().take(8).collect::<String>()
    );
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    if let Some(engine) = config.engines.iter().find(|e| e.enabled) {
        println!("Sending test search to {}...", engine.name);
        let search = SearchClient::new(&config.api, config.search.clone());
        match search.search("test", &engine.code, 1).await {
            Ok(response) => println!("Search OK ({} results)", response.results.len()),
            Err(e) => println!("Search failed: {}", e),
        }
    }

    println!("Sending test scoring request...");
    let client = LlmClient::new(config.api);
    match client.test_connection().await {
        Ok(()) => println!("Scoring OK"),
        Err(e) => println!("Scoring failed: {}", e),
    }

    Ok(())
}
