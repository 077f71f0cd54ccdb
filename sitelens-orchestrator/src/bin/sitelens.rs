//! SiteLens demo binary
//!
//! Runs one analysis against the simulated analyzer twice, so the second run
//! is served from the cache, then prints the report and cache statistics.
//!
//! Usage:
//!   cargo run -p sitelens-orchestrator --bin sitelens -- --kind standard a.com b.com

use clap::Parser;
use sitelens_core::{AnalysisRequest, OrchestratorConfig, Report, SiteLensResult};
use sitelens_orchestrator::{
    init_tracing, Orchestrator, OrchestratorStats, SimulatedAnalyzer, TelemetryConfig,
};
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "sitelens")]
#[command(about = "Analyze targets through the SiteLens orchestration cache", long_about = None)]
#[command(version)]
struct Cli {
    /// Analysis depth: quick, standard or comprehensive
    #[arg(short, long, default_value = "quick")]
    kind: String,

    /// Print the report and stats as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Optional TOML file with an [orchestrator] table
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Targets to analyze
    #[arg(required = true)]
    targets: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let telemetry = TelemetryConfig::from_env().with_json(cli.log_json);
    if let Err(e) = init_tracing(&telemetry) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> SiteLensResult<()> {
    let config = load_config(cli.config.as_deref())?;
    let orchestrator = Orchestrator::new(
        config,
        Arc::new(SimulatedAnalyzer::new()),
        sitelens_core::system_clock(),
    )?;
    let janitor = orchestrator.spawn_janitor();

    let request = AnalysisRequest::parse(cli.targets, &cli.kind, "cli")?;

    let started = Instant::now();
    let report = orchestrator.run_analysis(request.clone()).await?;
    let first_ms = started.elapsed().as_millis();

    let started = Instant::now();
    let repeat = orchestrator.run_analysis(request).await?;
    let repeat_ms = started.elapsed().as_millis();

    let stats = orchestrator.cache_stats()?;
    orchestrator.close();
    janitor.shutdown().await?;

    if cli.json {
        let output = serde_json::json!({
            "report": report,
            "repeat_cached": repeat.cached,
            "stats": stats,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to serialize report: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        print_report(&report);
        println!();
        println!(
            "First run: {}ms, repeat: {}ms (cached: {})",
            first_ms, repeat_ms, repeat.cached
        );
        print_stats(&stats);
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> SiteLensResult<OrchestratorConfig> {
    match path {
        Some(path) => {
            let source =
                std::fs::read_to_string(path).map_err(|e| sitelens_core::ConfigError::Parse {
                    reason: format!("{}: {}", path.display(), e),
                })?;
            OrchestratorConfig::from_toml_str(&source)
        }
        None => OrchestratorConfig::from_env(),
    }
}

fn print_report(report: &Report) {
    println!("Report {} ({})", report.id, report.kind);
    println!("Targets: {}", report.targets.join(", "));
    println!("Overall score: {}", report.overall_score);
    for (dimension, score) in report.scores.iter() {
        println!("  {:<16} {:>3}", dimension.label(), score);
    }

    if report.per_target.len() > 1 {
        println!("Per target:");
        for summary in &report.per_target {
            println!("  {:<24} {:>3}", summary.target, summary.overall_score);
        }
    }

    if !report.keywords.is_empty() {
        let keywords: Vec<String> = report
            .keywords
            .iter()
            .map(|k| format!("{} ({})", k.keyword, k.count))
            .collect();
        println!("Keywords: {}", keywords.join(", "));
    }

    if !report.recommendations.is_empty() {
        println!("Recommendations:");
        for rec in &report.recommendations {
            println!("  [{:?}] {} - {}", rec.priority, rec.title, rec.detail);
        }
    }
}

fn print_stats(stats: &OrchestratorStats) {
    println!(
        "Cache: {}/{} entries, {} hits, {} misses ({:.0}% hit rate)",
        stats.size,
        stats.max_size,
        stats.hits,
        stats.misses,
        stats.hit_rate() * 100.0
    );
    println!(
        "Gate: {} active, {} queued, peak {}/{}",
        stats.active_requests, stats.queued_requests, stats.peak_active, stats.max_concurrent
    );
}
