//! CLI front-end (C11, §4.11, §6).
//!
//! A thin adapter: all logic lives in the library crate. `main` only parses
//! arguments, builds a [`Config`]/[`EvidenceStore`]/[`AnyProvider`], and calls
//! into [`orchestrator`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use evidence_toolkit::ai::any::AnyProvider;
use evidence_toolkit::ai::mock::MockAiProvider;
use evidence_toolkit::ai::openai::OpenAiProvider;
use evidence_toolkit::ai::prompts::CaseType;
use evidence_toolkit::ai::retry::RetryProvider;
use evidence_toolkit::config::{AiBackend, Config};
use evidence_toolkit::models::evidence::EvidenceType;
use evidence_toolkit::orchestrator::{self, PipelineReport};
use evidence_toolkit::store::EvidenceStore;

#[derive(Parser)]
#[command(name = "evidence-toolkit", version, about = "Forensic evidence analysis pipeline")]
struct Cli {
    /// Evidence store root directory; overrides the configured/default store root.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Optional TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Suppress progress output; only the final report/errors are printed.
    #[arg(long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a single file (or every file directly under a directory) into the store.
    Ingest {
        path: PathBuf,
        #[arg(long = "case-id")]
        case_id: Option<String>,
        #[arg(long, default_value = "cli")]
        actor: String,
    },
    /// Run the analyzer for one already-ingested sha256.
    Analyze {
        sha256: String,
        #[arg(long = "case-id")]
        case_id: Option<String>,
        #[arg(long = "type")]
        evidence_type: Option<String>,
        #[arg(long)]
        force: bool,
    },
    /// Run correlation for a case and persist `correlation_analysis.json`.
    Correlate {
        #[arg(long = "case-id")]
        case_id: String,
        #[arg(long = "ai-resolve")]
        ai_resolve: bool,
        #[arg(long = "json-output")]
        json_output: Option<PathBuf>,
    },
    /// Copy a case's namespace out for delivery. ZIP packaging and report
    /// templating are external collaborators (§1); this only directory-copies.
    Package {
        #[arg(long = "case-id")]
        case_id: String,
        #[arg(long = "include-raw")]
        include_raw: bool,
        #[arg(long, default_value = "directory")]
        format: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// Run ingest → analyze → correlate → summarize over a directory of evidence.
    ProcessCase {
        dir: PathBuf,
        #[arg(long = "case-id")]
        case_id: String,
        #[arg(long = "case-type", default_value = "generic")]
        case_type: String,
        #[arg(long = "ai-resolve")]
        ai_resolve: bool,
        #[arg(long = "skip-package")]
        skip_package: bool,
    },
    /// Re-run analysis over evidence already linked into a case.
    Reanalyze {
        #[arg(long = "case-id")]
        case_id: String,
        #[arg(long = "evidence-type")]
        evidence_type: Option<String>,
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Case-scoped inspection commands.
    Case {
        #[command(subcommand)]
        command: CaseCommands,
    },
    /// Store-scoped maintenance commands.
    Storage {
        #[command(subcommand)]
        command: StorageCommands,
    },
}

#[derive(Subcommand)]
enum CaseCommands {
    List,
    Show {
        case_id: String,
    },
    Evidence {
        case_id: String,
        #[arg(long = "full-hash")]
        full_hash: bool,
    },
}

#[derive(Subcommand)]
enum StorageCommands {
    Stats,
    Cleanup {
        #[arg(long)]
        force: bool,
    },
    Prune {
        #[arg(long = "case-id")]
        case_id: String,
        #[arg(long)]
        force: bool,
    },
}

fn short_hash(sha256: &str) -> &str {
    &sha256[..sha256.len().min(12)]
}

fn init_tracing(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("evidence_toolkit={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Builds the configured AI provider, wrapped in the shared retry policy.
/// The mock backend (the default absent `OPENAI_API_KEY`) is still a real,
/// working [`AnyProvider`] value — it simply has no fixtures registered, so
/// any call it receives fails as `AiIncomplete`, which analyzers/correlation
/// already treat as a per-item failure or a `None` result (§4.10, §6, §8 S8).
fn build_provider(config: &Config) -> AnyProvider {
    match config.ai_backend {
        AiBackend::OpenAi => {
            let api_key = config.ai_api_key.clone().unwrap_or_default();
            let provider = OpenAiProvider::new(
                api_key,
                config.ai_model.clone(),
                config.ai_base_url.clone(),
                Duration::from_secs(config.ai_timeout_secs),
            );
            AnyProvider::OpenAi(RetryProvider::new(provider, config.retry.clone()))
        }
        AiBackend::Mock => AnyProvider::Mock(RetryProvider::new(MockAiProvider::empty(), config.retry.clone())),
    }
}

/// Whether the AI backend is a real, credentialed one (§6: absence of
/// `OPENAI_API_KEY` disables AI-dependent stages rather than running them
/// against an empty mock).
fn ai_is_configured(config: &Config) -> bool {
    matches!(config.ai_backend, AiBackend::OpenAi) && config.ai_api_key.is_some()
}

fn print_report(label: &str, report: &PipelineReport, quiet: bool) {
    if quiet {
        return;
    }
    println!(
        "{label}: ingested={} skipped_duplicate={} analyzed={} skipped_already_done={} failures={}",
        report.ingested,
        report.ingest_skipped_duplicates,
        report.analyzed,
        report.analyze_skipped_already_done,
        report.analyze_failures.len()
    );
    for failure in &report.analyze_failures {
        eprintln!("  FAILED {}: {}", short_hash(&failure.sha256), failure.message);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(2);
        }
    };
    if let Some(store) = &cli.store {
        config.store_root = store.clone();
    }

    let exit_code = run(cli.command, config, cli.quiet).await;
    std::process::exit(exit_code);
}

async fn run(command: Commands, config: Config, quiet: bool) -> i32 {
    let store = Arc::new(EvidenceStore::new(config.store_root.clone()));
    let cancellation = CancellationToken::new();

    match command {
        Commands::Ingest { path, case_id, actor } => {
            if path.is_dir() {
                let result = match &case_id {
                    Some(case_id) => orchestrator::run_ingest(&store, &path, case_id, &actor).await,
                    None => ingest_directory_without_case(&store, &path, &actor).await,
                };
                match result {
                    Ok(report) => {
                        print_report("ingest", &report, quiet);
                        0
                    }
                    Err(e) => {
                        eprintln!("ingest failed: {e}");
                        1
                    }
                }
            } else {
                match store.ingest(&path, case_id.as_deref(), &actor).await {
                    Ok((sha256, is_new)) => {
                        if !quiet {
                            println!("{sha256} ({})", if is_new { "new" } else { "duplicate" });
                        }
                        0
                    }
                    Err(e) => {
                        eprintln!("ingest failed: {e}");
                        1
                    }
                }
            }
        }

        Commands::Analyze { sha256, case_id, evidence_type: _, force } => {
            let provider = Arc::new(build_provider(&config));
            if let Some(case_id) = &case_id {
                if let Err(e) = store.associate_case(&sha256, case_id, &config.default_actor).await {
                    eprintln!("failed to associate {sha256} with case {case_id}: {e}");
                    return 1;
                }
            }
            let report = orchestrator::run_analyze(
                Arc::clone(&store),
                provider,
                vec![sha256],
                &config,
                force,
                &config.default_actor,
                &cancellation,
            )
            .await;
            print_report("analyze", &report, quiet);
            report.exit_code()
        }

        Commands::Correlate { case_id, ai_resolve, json_output } => {
            let provider = build_provider(&config);
            let result = if ai_is_configured(&config) {
                orchestrator::run_correlate(&store, &case_id, &config, Some(&provider), ai_resolve).await
            } else {
                orchestrator::run_correlate::<AnyProvider>(&store, &case_id, &config, None, ai_resolve).await
            };
            match result {
                Ok(correlation) => {
                    if let Some(path) = json_output {
                        match serde_json::to_string_pretty(&correlation) {
                            Ok(json) => {
                                if let Err(e) = tokio::fs::write(&path, json).await {
                                    eprintln!("failed to write {}: {e}", path.display());
                                    return 1;
                                }
                            }
                            Err(e) => {
                                eprintln!("failed to serialize correlation result: {e}");
                                return 1;
                            }
                        }
                    }
                    if !quiet {
                        println!(
                            "correlate {case_id}: evidence_count={} entities={} timeline_events={} sequences={} gaps={}",
                            correlation.evidence_count,
                            correlation.entity_correlations.len(),
                            correlation.timeline_events.len(),
                            correlation.temporal_sequences.len(),
                            correlation.timeline_gaps.len()
                        );
                    }
                    0
                }
                Err(e) => {
                    eprintln!("correlate failed: {e}");
                    1
                }
            }
        }

        Commands::Package { case_id, include_raw, format, out } => {
            if format != "directory" {
                eprintln!("package: only --format directory is implemented in this crate; ZIP packaging is an external collaborator (§1)");
                return 1;
            }
            match package_case(&store, &case_id, &out, include_raw).await {
                Ok(()) => {
                    if !quiet {
                        println!("packaged case {case_id} into {}", out.display());
                    }
                    0
                }
                Err(e) => {
                    eprintln!("package failed: {e}");
                    1
                }
            }
        }

        Commands::ProcessCase { dir, case_id, case_type, ai_resolve, skip_package: _ } => {
            let case_type = CaseType::from_str(&case_type);
            let provider = Arc::new(build_provider(&config));

            let ingest_report = match orchestrator::run_ingest(&store, &dir, &case_id, &config.default_actor).await {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("ingest stage failed: {e}");
                    return 1;
                }
            };
            print_report("ingest", &ingest_report, quiet);

            let shas = match store.list_case(&case_id).await {
                Ok(shas) => shas,
                Err(e) => {
                    eprintln!("failed to list case evidence: {e}");
                    return 1;
                }
            };
            let analyze_report = orchestrator::run_analyze(
                Arc::clone(&store),
                Arc::clone(&provider),
                shas,
                &config,
                false,
                &config.default_actor,
                &cancellation,
            )
            .await;
            print_report("analyze", &analyze_report, quiet);

            let correlate_result = if ai_is_configured(&config) {
                orchestrator::run_correlate(&store, &case_id, &config, Some(provider.as_ref()), ai_resolve).await
            } else {
                orchestrator::run_correlate::<AnyProvider>(&store, &case_id, &config, None, ai_resolve).await
            };
            if let Err(e) = correlate_result {
                eprintln!("correlate stage failed: {e}");
                return 1;
            }

            let summarize_result = if ai_is_configured(&config) {
                orchestrator::run_summarize(&store, &case_id, &config, Some(provider.as_ref()), case_type).await
            } else {
                orchestrator::run_summarize::<AnyProvider>(&store, &case_id, &config, None, case_type).await
            };
            match summarize_result {
                Ok(summary) => {
                    if !quiet {
                        println!(
                            "process-case {case_id}: evidence_count={} overall_legal_significance={:?} executive_summary={}",
                            summary.evidence_count,
                            summary.overall_assessment.overall_legal_significance,
                            if summary.executive_summary.is_some() { "present" } else { "null" }
                        );
                    }
                    if !analyze_report.analyze_failures.is_empty() { 1 } else { 0 }
                }
                Err(e) => {
                    eprintln!("summarize stage degraded: {e}");
                    1
                }
            }
        }

        Commands::Reanalyze { case_id, evidence_type, dry_run } => {
            let provider = Arc::new(build_provider(&config));
            let filter = evidence_type.as_deref().map(parse_evidence_type);
            match orchestrator::run_reanalyze(
                Arc::clone(&store),
                provider,
                &case_id,
                &config,
                filter,
                dry_run,
                &config.default_actor,
                &cancellation,
            )
            .await
            {
                Ok(report) => {
                    print_report("reanalyze", &report, quiet);
                    report.exit_code()
                }
                Err(e) => {
                    eprintln!("reanalyze failed: {e}");
                    1
                }
            }
        }

        Commands::Case { command } => run_case_command(&store, command).await,
        Commands::Storage { command } => run_storage_command(&store, command, quiet).await,
    }
}

fn parse_evidence_type(s: &str) -> EvidenceType {
    EvidenceType::from_extension(match s.to_ascii_lowercase().as_str() {
        "document" => "txt",
        "image" => "jpg",
        "email" => "eml",
        "pdf" => "pdf",
        "audio" => "mp3",
        "video" => "mp4",
        _ => "",
    })
}

async fn run_case_command(store: &EvidenceStore, command: CaseCommands) -> i32 {
    match command {
        CaseCommands::List => match store.list_cases().await {
            Ok(ids) => {
                for id in ids {
                    println!("{id}");
                }
                0
            }
            Err(e) => {
                eprintln!("case list failed: {e}");
                1
            }
        },
        CaseCommands::Show { case_id } => match store.get_case_summary(&case_id).await {
            Ok(Some(summary)) => {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("failed to serialize case summary: {e}");
                        return 1;
                    }
                }
                0
            }
            Ok(None) => {
                eprintln!("no case summary for {case_id}; run `correlate`/`process-case` first");
                1
            }
            Err(e) => {
                eprintln!("case show failed: {e}");
                1
            }
        },
        CaseCommands::Evidence { case_id, full_hash } => match store.list_case(&case_id).await {
            Ok(shas) => {
                for sha in shas {
                    if full_hash {
                        println!("{sha}");
                    } else {
                        println!("{}", short_hash(&sha));
                    }
                }
                0
            }
            Err(e) => {
                eprintln!("case evidence failed: {e}");
                1
            }
        },
    }
}

async fn run_storage_command(store: &EvidenceStore, command: StorageCommands, quiet: bool) -> i32 {
    match command {
        StorageCommands::Stats => match store.stats().await {
            Ok(stats) => {
                if !quiet {
                    println!(
                        "raw_items={} total_raw_bytes={} analyzed_items={} case_count={}",
                        stats.raw_items, stats.total_raw_bytes, stats.analyzed_items, stats.case_count
                    );
                }
                0
            }
            Err(e) => {
                eprintln!("storage stats failed: {e}");
                1
            }
        },
        StorageCommands::Cleanup { force } => match store.cleanup_orphans(!force).await {
            Ok(report) => {
                if !quiet {
                    println!(
                        "cleanup ({}): {} orphan item(s) {}",
                        if report.dry_run { "dry run" } else { "applied" },
                        report.orphans_removed.len(),
                        if report.dry_run { "would be removed" } else { "removed" }
                    );
                }
                0
            }
            Err(e) => {
                eprintln!("storage cleanup failed: {e}");
                1
            }
        },
        StorageCommands::Prune { case_id, force } => match store.prune(&case_id, !force, "cli").await {
            Ok(report) => {
                if !quiet {
                    println!(
                        "prune {case_id} ({}): {} link(s), {} item(s) {}, {} retained (referenced elsewhere)",
                        if report.dry_run { "dry run" } else { "applied" },
                        report.case_link_removed.len(),
                        report.raw_and_derived_removed.len(),
                        if report.dry_run { "would be removed" } else { "removed" },
                        report.retained_other_case_references.len()
                    );
                }
                0
            }
            Err(e) => {
                eprintln!("storage prune failed: {e}");
                1
            }
        },
    }
}

/// Ingests every file directly under `dir` without linking any of them into
/// a case, for `ingest DIR` runs with no `--case-id` given.
async fn ingest_directory_without_case(
    store: &EvidenceStore,
    dir: &std::path::Path,
    actor: &str,
) -> Result<PipelineReport, evidence_toolkit::Error> {
    let mut report = PipelineReport::default();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| evidence_toolkit::Error::io(dir, e))?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| evidence_toolkit::Error::io(dir, e))? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let (_, is_new) = store.ingest(&path, None, actor).await?;
        if is_new {
            report.ingested += 1;
        } else {
            report.ingest_skipped_duplicates += 1;
        }
    }
    Ok(report)
}

/// Directory-copy packaging (§1: ZIP packaging/report templating are external
/// collaborators; this crate only stages the case namespace for them to
/// consume).
async fn package_case(
    store: &EvidenceStore,
    case_id: &str,
    out: &std::path::Path,
    include_raw: bool,
) -> Result<(), evidence_toolkit::Error> {
    tokio::fs::create_dir_all(out).await.map_err(|e| evidence_toolkit::Error::io(out, e))?;

    let case_dir = store.layout().case_dir(case_id);
    for filename in ["correlation_analysis.json", "case_summary.json"] {
        let src = case_dir.join(filename);
        if tokio::fs::try_exists(&src).await.map_err(|e| evidence_toolkit::Error::io(&src, e))? {
            let dst = out.join(filename);
            tokio::fs::copy(&src, &dst).await.map_err(|e| evidence_toolkit::Error::io(&dst, e))?;
        }
    }

    let shas = store.list_case(case_id).await?;
    for sha256 in &shas {
        let metadata = store.get_metadata(sha256).await?;
        let analysis_dir = out.join("analysis");
        tokio::fs::create_dir_all(&analysis_dir).await.map_err(|e| evidence_toolkit::Error::io(&analysis_dir, e))?;
        if let Some(analysis) = store.get_analysis(sha256).await? {
            let dst = analysis_dir.join(format!("{sha256}.json"));
            let json = serde_json::to_string_pretty(&analysis)
                .map_err(|e| evidence_toolkit::Error::ValidationError(e.to_string()))?;
            tokio::fs::write(&dst, json).await.map_err(|e| evidence_toolkit::Error::io(&dst, e))?;
        }
        if include_raw {
            let raw_out = out.join("raw");
            tokio::fs::create_dir_all(&raw_out).await.map_err(|e| evidence_toolkit::Error::io(&raw_out, e))?;
            let src = store.layout().raw_file(sha256, &metadata.extension);
            let dst = raw_out.join(format!("{sha256}.{}", metadata.extension));
            tokio::fs::copy(&src, &dst).await.map_err(|e| evidence_toolkit::Error::io(&dst, e))?;
        }
    }
    Ok(())
}
