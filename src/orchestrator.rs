//! Pipeline orchestrator (C8, §4.8).
//!
//! Owns the Ingest → Analyze → Correlate → Summarize stage sequence, the
//! semaphore bounding concurrent AI calls during analyze, and the
//! cancellation token checked between fan-out items. Every stage is a plain
//! function here rather than a trait: the orchestrator is the one place that
//! knows the full stage order, so there is nothing to substitute it behind.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::ai::prompts::CaseType;
use crate::ai::AiProvider;
use crate::analyzers::{analyze_document, analyze_email, analyze_image, AnalysisFailure};
use crate::config::Config;
use crate::correlation;
use crate::error::Error;
use crate::extract::{PlainTextExtractor, RfcEmailParser};
use crate::models::correlation::CorrelationAnalysis;
use crate::models::evidence::{EvidenceType, TypedAnalysis, UnifiedAnalysis};
use crate::models::summary::CaseSummary;
use crate::store::EvidenceStore;
use crate::summary::build_case_summary;

/// Per-stage counts and per-item failures for one pipeline run (§4.8: "final
/// exit status reports per-stage counts"). Consumed by the CLI for both its
/// human-readable report and its exit-code mapping.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub ingested: usize,
    pub ingest_skipped_duplicates: usize,
    pub analyzed: usize,
    pub analyze_skipped_already_done: usize,
    pub analyze_failures: Vec<AnalysisFailure>,
    pub correlated: bool,
    pub summarized: bool,
}

impl PipelineReport {
    /// §6 exit code mapping: 0 only if every stage that ran succeeded
    /// cleanly; 1 if any per-item analyze failure occurred (still a
    /// completed run); the orchestrator never returns a report for a fatal,
    /// store-corrupt failure — those surface as `Err` from the stage calls.
    pub fn exit_code(&self) -> i32 {
        if !self.analyze_failures.is_empty() {
            1
        } else {
            0
        }
    }
}

/// Ingests every file directly under `dir` (non-recursive) into `case_id`.
/// Re-ingesting identical bytes is a no-op on raw content per the store's
/// own idempotence; the report distinguishes first-time ingests from
/// duplicates purely for operator visibility.
pub async fn run_ingest(store: &EvidenceStore, dir: &Path, case_id: &str, actor: &str) -> Result<PipelineReport, Error> {
    let mut report = PipelineReport::default();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| Error::io(dir, e))?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(dir, e))? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let (_, is_new) = store.ingest(&path, Some(case_id), actor).await?;
        if is_new {
            report.ingested += 1;
        } else {
            report.ingest_skipped_duplicates += 1;
        }
    }
    Ok(report)
}

/// Dispatches one evidence item to its analyzer. Documents whose extractor
/// reports `ExtractorUnsupported` are re-routed to the image analyzer per
/// §6's extractor contract, rather than surfacing as a failure.
async fn analyze_one<P: AiProvider>(
    store: &EvidenceStore,
    sha256: &str,
    provider: &P,
) -> Result<UnifiedAnalysis, Error> {
    let metadata = store.get_metadata(sha256).await?;
    let bytes = store.get_raw_bytes(sha256).await?;
    let declared_type = EvidenceType::from_extension(&metadata.extension);

    let (evidence_type, typed) = match declared_type {
        EvidenceType::Email => {
            let analysis = analyze_email(&bytes, &metadata, &RfcEmailParser, provider).await?;
            (EvidenceType::Email, TypedAnalysis::Email(analysis))
        }
        EvidenceType::Image => {
            let analysis = analyze_image(&bytes, &metadata, provider).await?;
            (EvidenceType::Image, TypedAnalysis::Image(analysis))
        }
        _ => match analyze_document(&bytes, &metadata, &PlainTextExtractor, provider).await {
            Ok(analysis) => (EvidenceType::Document, TypedAnalysis::Document(analysis)),
            Err(Error::ExtractorUnsupported(_)) => {
                let analysis = analyze_image(&bytes, &metadata, provider).await?;
                (EvidenceType::Image, TypedAnalysis::Image(analysis))
            }
            Err(e) => return Err(e),
        },
    };

    Ok(UnifiedAnalysis::new(
        evidence_type,
        metadata,
        typed,
        std::collections::BTreeSet::new(),
        std::collections::BTreeSet::new(),
        Vec::new(),
    ))
}

/// Runs the analyze stage over every sha256 in `shas`, bounded by
/// `config.ai_concurrency_limit` concurrent AI calls. Skips items that
/// already have an analysis record unless `force` is set. Checks
/// `cancellation` between dispatches; already-dispatched calls are allowed
/// to finish rather than aborted mid-flight, since a cancelled in-flight C3
/// call would otherwise leave no record of whether it had in fact completed.
pub async fn run_analyze<P: AiProvider + 'static>(
    store: Arc<EvidenceStore>,
    provider: Arc<P>,
    shas: Vec<String>,
    config: &Config,
    force: bool,
    actor: &str,
    cancellation: &CancellationToken,
) -> PipelineReport {
    let mut report = PipelineReport::default();
    let semaphore = Arc::new(Semaphore::new(config.ai_concurrency_limit.max(1)));
    let mut handles = Vec::with_capacity(shas.len());

    for sha256 in shas {
        if cancellation.is_cancelled() {
            break;
        }
        if !force {
            match store.get_analysis(&sha256).await {
                Ok(Some(_)) => {
                    report.analyze_skipped_already_done += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    report.analyze_failures.push(AnalysisFailure { sha256, message: e.to_string() });
                    continue;
                }
            }
        }

        let store = Arc::clone(&store);
        let provider = Arc::clone(&provider);
        let semaphore = Arc::clone(&semaphore);
        let actor = actor.to_string();
        let cancellation = cancellation.clone();

        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (sha256, Err(Error::ConfigMissing("analyze semaphore closed".to_string()))),
            };
            if cancellation.is_cancelled() {
                return (sha256, Err(Error::ConfigMissing("cancelled before dispatch".to_string())));
            }
            let result = analyze_one(&store, &sha256, provider.as_ref()).await;
            if let Ok(analysis) = &result {
                if let Err(e) = store.put_analysis(&sha256, analysis.clone(), &actor).await {
                    return (sha256, Err(e));
                }
            }
            (sha256, result)
        }));
    }

    for handle in handles {
        match handle.await {
            Ok((sha256, Ok(_))) => {
                let _ = sha256;
                report.analyzed += 1;
            }
            Ok((sha256, Err(e))) => {
                report.analyze_failures.push(AnalysisFailure { sha256, message: e.to_string() });
            }
            Err(join_err) => {
                report.analyze_failures.push(AnalysisFailure {
                    sha256: "unknown".to_string(),
                    message: format!("analyze task panicked: {join_err}"),
                });
            }
        }
    }

    report
}

/// Runs correlation over a case and persists the result, always overwriting
/// any prior `correlation_analysis.json` (§4.8: correlate is always
/// deterministic given the current analyses, so there is nothing to skip).
pub async fn run_correlate<P: AiProvider>(
    store: &EvidenceStore,
    case_id: &str,
    config: &Config,
    provider: Option<&P>,
    ai_resolve: bool,
) -> Result<CorrelationAnalysis, Error> {
    let analyses = store.case_analyses(case_id).await?;
    let mut result = correlation::correlate_analyses(store, case_id, &analyses, config).await?;

    if let Some(provider) = provider {
        if ai_resolve {
            let singletons = crate::correlation::extract::singleton_person_occurrences(&analyses);
            let resolved = crate::correlation::resolve::resolve_candidates(provider, &singletons, 50).await;
            let merged = crate::correlation::resolve::merge_confirmed(&resolved);
            for entity in &merged {
                tracing::debug!(entity = %entity.entity_name, "AI resolution merged a new correlated entity");
            }
            result.entity_correlations.extend(merged);
            result.entity_correlations.sort_by(|a, b| {
                b.occurrence_count
                    .cmp(&a.occurrence_count)
                    .then(b.confidence_average.total_cmp(&a.confidence_average))
            });
        }
        result.legal_patterns = crate::pattern::detect_patterns(
            provider,
            &result.entity_correlations,
            &result.timeline_events,
            &analyses,
        )
        .await;
    }

    store.put_correlation(case_id, &result).await?;
    Ok(result)
}

/// Runs the summary aggregator and persists the result.
pub async fn run_summarize<P: AiProvider>(
    store: &EvidenceStore,
    case_id: &str,
    config: &Config,
    provider: Option<&P>,
    case_type: CaseType,
) -> Result<CaseSummary, Error> {
    let summary = build_case_summary(store, case_id, config, provider, case_type).await?;
    store.put_case_summary(case_id, &summary).await?;
    Ok(summary)
}

/// Batches re-analysis over every evidence item already linked into
/// `case_id`, optionally filtered to one `EvidenceType` (§4.8 "reanalyze").
/// `dry_run` reports what would be reanalyzed without calling the AI port.
pub async fn run_reanalyze<P: AiProvider + 'static>(
    store: Arc<EvidenceStore>,
    provider: Arc<P>,
    case_id: &str,
    config: &Config,
    evidence_type_filter: Option<EvidenceType>,
    dry_run: bool,
    actor: &str,
    cancellation: &CancellationToken,
) -> Result<PipelineReport, Error> {
    let shas = store.list_case(case_id).await?;
    let mut filtered = Vec::new();
    for sha256 in shas {
        if let Some(filter) = evidence_type_filter {
            let metadata = store.get_metadata(&sha256).await?;
            if EvidenceType::from_extension(&metadata.extension) != filter {
                continue;
            }
        }
        filtered.push(sha256);
    }

    if dry_run {
        return Ok(PipelineReport {
            analyze_skipped_already_done: filtered.len(),
            ..PipelineReport::default()
        });
    }

    Ok(run_analyze(store, provider, filtered, config, true, actor, cancellation).await)
}
