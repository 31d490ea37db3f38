//! Content-addressed evidence store (C1, §4.1).
//!
//! A directory-per-record layout under `raw/derived/cases` with the
//! same atomic-write discipline throughout, built on `tokio::fs` so the
//! store composes with the async analysis pipeline.

mod atomic;
mod custody_lock;
pub mod exif;
mod layout;
mod mime;

pub use exif::ExifData;
pub use layout::Layout;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::models::evidence::{ChainOfCustodyEvent, CustodyAction, EvidenceType, FileMetadata, UnifiedAnalysis};
use custody_lock::CustodyLockTable;

/// Outcome of a `prune` run, listing what was (or, in a dry run, would be)
/// removed. §4.1: raw/derived content for a sha256 is only deleted once no
/// remaining case references it.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PruneReport {
    pub case_id: String,
    pub dry_run: bool,
    pub case_link_removed: Vec<String>,
    pub raw_and_derived_removed: Vec<String>,
    pub retained_other_case_references: Vec<String>,
}

pub struct EvidenceStore {
    layout: Layout,
    locks: CustodyLockTable,
}

impl EvidenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { layout: Layout::new(root), locks: CustodyLockTable::new() }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Ingests a file at `source_path`, returning its sha256 and whether this
    /// was a first-time ingest. Re-ingesting identical bytes is a no-op on
    /// the raw content (content addressing makes it inherently idempotent)
    /// but still records a custody event and, if `case_id` is given, an
    /// association even on repeat ingests.
    #[tracing::instrument(skip(self), fields(source = %source_path.display()))]
    pub async fn ingest(
        &self,
        source_path: &Path,
        case_id: Option<&str>,
        actor: &str,
    ) -> Result<(String, bool), Error> {
        let bytes = tokio::fs::read(source_path).await.map_err(|e| Error::io(source_path, e))?;
        let sha256 = sha256_hex(&bytes);

        let extension = source_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let evidence_type = EvidenceType::from_extension(&extension);

        let raw_file = self.layout.raw_file(&sha256, &extension);
        let is_new = !tokio::fs::try_exists(&raw_file).await.map_err(|e| Error::io(&raw_file, e))?;

        let _guard = self.locks.lock(&sha256).await;

        if is_new {
            if let Some(dir) = raw_file.parent() {
                tokio::fs::create_dir_all(dir).await.map_err(|e| Error::io(dir, e))?;
            }
            tokio::fs::write(&raw_file, &bytes).await.map_err(|e| Error::io(&raw_file, e))?;

            let fs_metadata =
                tokio::fs::metadata(source_path).await.map_err(|e| Error::io(source_path, e))?;
            let modified = fs_metadata
                .modified()
                .map(chrono::DateTime::<chrono::Utc>::from)
                .unwrap_or_else(|_| chrono::Utc::now());
            let metadata = FileMetadata {
                filename: source_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
                byte_size: bytes.len() as u64,
                mime: mime::guess(&extension),
                created: modified,
                modified,
                extension: extension.clone(),
                sha256: sha256.clone(),
            };
            metadata.validate()?;
            atomic::write_json(&self.layout.metadata_file(&sha256), &metadata).await?;
            self.append_custody_locked(
                &sha256,
                ChainOfCustodyEvent::new(actor, CustodyAction::Ingest, format!("ingested {}", metadata.filename)),
            )
            .await?;
        } else {
            self.append_custody_locked(
                &sha256,
                ChainOfCustodyEvent::new(actor, CustodyAction::Ingest, "re-ingested identical content"),
            )
            .await?;
        }

        if let Some(case_id) = case_id {
            self.associate_case_locked(&sha256, &extension, case_id, actor).await?;
        }

        Ok((sha256, is_new))
    }

    /// Links an already-ingested sha256 into a case, recording the
    /// association in chain-of-custody. Idempotent: re-associating an
    /// already-linked case is a no-op on disk but still logged.
    pub async fn associate_case(&self, sha256: &str, case_id: &str, actor: &str) -> Result<(), Error> {
        let metadata = self.get_metadata(sha256).await?;
        let _guard = self.locks.lock(sha256).await;
        self.associate_case_locked(sha256, &metadata.extension, case_id, actor).await
    }

    async fn associate_case_locked(
        &self,
        sha256: &str,
        extension: &str,
        case_id: &str,
        actor: &str,
    ) -> Result<(), Error> {
        let case_link = self.layout.case_link(case_id, sha256, extension);
        if let Some(dir) = case_link.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| Error::io(dir, e))?;
        }
        let raw_file = self.layout.raw_file(sha256, extension);
        if !tokio::fs::try_exists(&case_link).await.map_err(|e| Error::io(&case_link, e))? {
            // Hard link, not copy: the case view is a pointer into the one
            // content-addressed copy under `raw/`, never a second copy of it.
            // Falls back to a symlink, then a byte copy, when hard-linking
            // fails (e.g. raw/ and cases/ live on different filesystems).
            if let Err(hard_link_err) = tokio::fs::hard_link(&raw_file, &case_link).await {
                tracing::warn!(
                    sha256, case_id, error = %hard_link_err,
                    "hard link failed, falling back to symlink"
                );
                #[cfg(unix)]
                let symlink_result = tokio::fs::symlink(&raw_file, &case_link).await;
                #[cfg(not(unix))]
                let symlink_result: std::io::Result<()> =
                    Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "symlink not supported"));

                if let Err(symlink_err) = symlink_result {
                    tracing::warn!(
                        sha256, case_id, error = %symlink_err,
                        "symlink fallback failed, falling back to a byte copy"
                    );
                    tokio::fs::copy(&raw_file, &case_link).await.map_err(|e| Error::io(&case_link, e))?;
                }
            }
            self.append_custody_locked(
                sha256,
                ChainOfCustodyEvent::new(actor, CustodyAction::CaseAssociate, format!("associated with case {case_id}")),
            )
            .await?;
        }
        Ok(())
    }

    pub async fn get_metadata(&self, sha256: &str) -> Result<FileMetadata, Error> {
        let path = self.layout.metadata_file(sha256);
        atomic::read_json(&path)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no metadata for {sha256}")))
    }

    /// Reads an evidence item's raw bytes back from content-addressed
    /// storage, for the analyzers to operate on.
    pub async fn get_raw_bytes(&self, sha256: &str) -> Result<Vec<u8>, Error> {
        let metadata = self.get_metadata(sha256).await?;
        let path = self.layout.raw_file(sha256, &metadata.extension);
        tokio::fs::read(&path).await.map_err(|e| Error::io(&path, e))
    }

    pub async fn get_analysis(&self, sha256: &str) -> Result<Option<UnifiedAnalysis>, Error> {
        let path = self.layout.analysis_file(sha256);
        let analysis: Option<UnifiedAnalysis> = atomic::read_json(&path).await?;
        if let Some(a) = &analysis {
            a.validate()?;
        }
        Ok(analysis)
    }

    /// Writes an analysis record. If one already exists for this sha256 it is
    /// preserved as a timestamped backup before being overwritten (§9 Open
    /// Question: reanalyze backups are kept indefinitely, never pruned
    /// automatically).
    #[tracing::instrument(skip(self, analysis))]
    pub async fn put_analysis(&self, sha256: &str, analysis: UnifiedAnalysis, actor: &str) -> Result<(), Error> {
        analysis.validate()?;
        let _guard = self.locks.lock(sha256).await;

        let path = self.layout.analysis_file(sha256);
        let existing: Option<UnifiedAnalysis> = atomic::read_json(&path).await?;
        let action = if let Some(prior) = existing {
            let backup_ts = prior.analysis_timestamp.format("%Y%m%dT%H%M%S%.3fZ").to_string();
            let backup_path = self.layout.analysis_backup_file(sha256, &backup_ts);
            atomic::write_json(&backup_path, &prior).await?;
            CustodyAction::Reanalyze
        } else {
            CustodyAction::Analyze
        };

        atomic::write_json(&path, &analysis).await?;
        self.append_custody_locked(
            sha256,
            ChainOfCustodyEvent::new(actor, action, format!("recorded {:?} analysis", analysis.evidence_type)),
        )
        .await
    }

    pub async fn get_exif(&self, sha256: &str) -> Result<Option<ExifData>, Error> {
        atomic::read_json(&self.layout.exif_file(sha256)).await
    }

    pub async fn put_exif(&self, sha256: &str, exif: &ExifData) -> Result<(), Error> {
        atomic::write_json(&self.layout.exif_file(sha256), exif).await
    }

    /// Loads every analysis currently linked into a case, skipping any
    /// evidence that has not been analyzed yet. Taken as a single snapshot
    /// at call time, per §5: correlation never re-reads mid-run.
    pub async fn case_analyses(&self, case_id: &str) -> Result<Vec<UnifiedAnalysis>, Error> {
        let shas = self.list_case(case_id).await?;
        let mut analyses = Vec::with_capacity(shas.len());
        for sha256 in shas {
            if let Some(analysis) = self.get_analysis(&sha256).await? {
                analyses.push(analysis);
            }
        }
        Ok(analyses)
    }

    /// Persists a case's correlation result, always overwriting any prior
    /// one (§4.8: correlate is deterministic given the current analyses, so
    /// there is no idempotence check to make here).
    pub async fn put_correlation(
        &self,
        case_id: &str,
        correlation: &crate::models::correlation::CorrelationAnalysis,
    ) -> Result<(), Error> {
        atomic::write_json(&self.layout.correlation_file(case_id), correlation).await
    }

    pub async fn get_correlation(
        &self,
        case_id: &str,
    ) -> Result<Option<crate::models::correlation::CorrelationAnalysis>, Error> {
        atomic::read_json(&self.layout.correlation_file(case_id)).await
    }

    /// Persists a case's summary, always overwriting any prior one.
    pub async fn put_case_summary(
        &self,
        case_id: &str,
        summary: &crate::models::summary::CaseSummary,
    ) -> Result<(), Error> {
        atomic::write_json(&self.layout.case_summary_file(case_id), summary).await
    }

    pub async fn get_case_summary(
        &self,
        case_id: &str,
    ) -> Result<Option<crate::models::summary::CaseSummary>, Error> {
        atomic::read_json(&self.layout.case_summary_file(case_id)).await
    }

    pub async fn get_custody_log(&self, sha256: &str) -> Result<Vec<ChainOfCustodyEvent>, Error> {
        let path = self.layout.custody_file(sha256);
        Ok(atomic::read_json(&path).await?.unwrap_or_default())
    }

    /// Appends one event to the custody log, assuming the caller already
    /// holds this sha256's lock.
    async fn append_custody_locked(&self, sha256: &str, event: ChainOfCustodyEvent) -> Result<(), Error> {
        let path = self.layout.custody_file(sha256);
        let mut log: Vec<ChainOfCustodyEvent> = atomic::read_json(&path).await?.unwrap_or_default();
        log.push(event);
        atomic::write_json(&path, &log).await
    }

    /// Lists every sha256 currently linked into a case, derived from the
    /// hard-linked files under `cases/<case_id>/` (excluding the case-level
    /// JSON artifacts written by correlation/summarization).
    pub async fn list_case(&self, case_id: &str) -> Result<Vec<String>, Error> {
        let dir = self.layout.case_dir(case_id);
        let mut shas = BTreeSet::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&dir, e)),
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&dir, e))? {
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            if stem == "correlation_analysis" || stem == "case_summary" {
                continue;
            }
            shas.insert(stem.to_string());
        }
        Ok(shas.into_iter().collect())
    }

    /// Removes a case's links, and any raw/derived content for a sha256 that
    /// is no longer referenced by any other case. Dry-run by default per
    /// §4.1: callers must opt into `dry_run = false` to actually delete.
    #[tracing::instrument(skip(self))]
    pub async fn prune(&self, case_id: &str, dry_run: bool, actor: &str) -> Result<PruneReport, Error> {
        let mut report = PruneReport { case_id: case_id.to_string(), dry_run, ..Default::default() };
        let shas = self.list_case(case_id).await?;

        for sha256 in &shas {
            report.case_link_removed.push(sha256.clone());
            if !dry_run {
                let metadata = self.get_metadata(sha256).await?;
                let case_link = self.layout.case_link(case_id, sha256, &metadata.extension);
                if tokio::fs::try_exists(&case_link).await.map_err(|e| Error::io(&case_link, e))? {
                    tokio::fs::remove_file(&case_link).await.map_err(|e| Error::io(&case_link, e))?;
                }
            }

            if self.referenced_by_other_case(sha256, case_id).await? {
                report.retained_other_case_references.push(sha256.clone());
                continue;
            }

            report.raw_and_derived_removed.push(sha256.clone());
            if !dry_run {
                let metadata = self.get_metadata(sha256).await?;
                let raw_dir = self.layout.raw_dir(sha256);
                let derived_dir = self.layout.derived_dir(sha256);
                let _guard = self.locks.lock(sha256).await;
                if tokio::fs::try_exists(&raw_dir).await.map_err(|e| Error::io(&raw_dir, e))? {
                    tokio::fs::remove_dir_all(&raw_dir).await.map_err(|e| Error::io(&raw_dir, e))?;
                }
                if tokio::fs::try_exists(&derived_dir).await.map_err(|e| Error::io(&derived_dir, e))? {
                    tokio::fs::remove_dir_all(&derived_dir).await.map_err(|e| Error::io(&derived_dir, e))?;
                }
                let _ = metadata;
            }
        }

        if !dry_run {
            let case_dir = self.layout.case_dir(case_id);
            for filename in ["correlation_analysis.json", "case_summary.json"] {
                let path = case_dir.join(filename);
                if tokio::fs::try_exists(&path).await.map_err(|e| Error::io(&path, e))? {
                    tokio::fs::remove_file(&path).await.map_err(|e| Error::io(&path, e))?;
                }
            }
            if tokio::fs::try_exists(&case_dir).await.map_err(|e| Error::io(&case_dir, e))? {
                let _ = tokio::fs::remove_dir(&case_dir).await;
            }
            for sha256 in &shas {
                self.append_custody_locked(
                    sha256,
                    ChainOfCustodyEvent::new(actor, CustodyAction::Prune, format!("pruned from case {case_id}")),
                )
                .await?;
            }
        }

        Ok(report)
    }

    async fn referenced_by_other_case(&self, sha256: &str, excluding_case_id: &str) -> Result<bool, Error> {
        let cases_dir = self.layout.root().join("cases");
        let mut entries = match tokio::fs::read_dir(&cases_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::io(&cases_dir, e)),
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&cases_dir, e))? {
            let Some(other_case_id) = entry.file_name().to_str().map(str::to_string) else { continue };
            if other_case_id == excluding_case_id {
                continue;
            }
            if !entry.path().is_dir() {
                continue;
            }
            if self.list_case(&other_case_id).await?.iter().any(|s| s == sha256) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Lists every case_id with a `cases/<id>/` directory, for `case list`.
    pub async fn list_cases(&self) -> Result<Vec<String>, Error> {
        let cases_dir = self.layout.root().join("cases");
        let mut ids = BTreeSet::new();
        let mut entries = match tokio::fs::read_dir(&cases_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&cases_dir, e)),
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&cases_dir, e))? {
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.insert(name.to_string());
                }
            }
        }
        Ok(ids.into_iter().collect())
    }

    /// Aggregate counts for `storage stats`.
    pub async fn stats(&self) -> Result<StorageStats, Error> {
        let raw_dir = self.layout.root().join("raw");
        let mut stats = StorageStats::default();
        let mut entries = match tokio::fs::read_dir(&raw_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
            Err(e) => return Err(Error::io(&raw_dir, e)),
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&raw_dir, e))? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else { continue };
            let Some(sha256) = name.strip_prefix("sha256=") else { continue };
            stats.raw_items += 1;
            if let Ok(metadata) = self.get_metadata(sha256).await {
                stats.total_raw_bytes += metadata.byte_size;
            }
            if self.get_analysis(sha256).await.unwrap_or(None).is_some() {
                stats.analyzed_items += 1;
            }
        }
        stats.case_count = self.list_cases().await?.len();
        Ok(stats)
    }

    /// Removes raw/derived content for every sha256 not referenced by any
    /// case. Dry-run by default, mirroring `prune`'s discipline.
    pub async fn cleanup_orphans(&self, dry_run: bool) -> Result<CleanupReport, Error> {
        let raw_dir = self.layout.root().join("raw");
        let mut report = CleanupReport { dry_run, ..Default::default() };
        let mut entries = match tokio::fs::read_dir(&raw_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(Error::io(&raw_dir, e)),
        };
        let mut shas = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&raw_dir, e))? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else { continue };
            if let Some(sha256) = name.strip_prefix("sha256=") {
                shas.push(sha256.to_string());
            }
        }
        for sha256 in shas {
            if self.referenced_by_other_case(&sha256, "").await? {
                continue;
            }
            report.orphans_removed.push(sha256.clone());
            if !dry_run {
                let _guard = self.locks.lock(&sha256).await;
                let raw_dir = self.layout.raw_dir(&sha256);
                let derived_dir = self.layout.derived_dir(&sha256);
                if tokio::fs::try_exists(&raw_dir).await.map_err(|e| Error::io(&raw_dir, e))? {
                    tokio::fs::remove_dir_all(&raw_dir).await.map_err(|e| Error::io(&raw_dir, e))?;
                }
                if tokio::fs::try_exists(&derived_dir).await.map_err(|e| Error::io(&derived_dir, e))? {
                    tokio::fs::remove_dir_all(&derived_dir).await.map_err(|e| Error::io(&derived_dir, e))?;
                }
            }
        }
        Ok(report)
    }
}

/// Aggregate counts reported by `storage stats`.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct StorageStats {
    pub raw_items: usize,
    pub total_raw_bytes: u64,
    pub analyzed_items: usize,
    pub case_count: usize,
}

/// Outcome of a `storage cleanup` run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub orphans_removed: Vec<String>,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
