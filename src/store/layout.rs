//! On-disk path layout for the evidence store (§4.1, §6).
//!
//! Paths are part of the external contract, not an implementation detail —
//! tooling outside this crate is expected to read them directly.

use std::path::{Path, PathBuf};

pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self, sha256: &str) -> PathBuf {
        self.root.join("raw").join(format!("sha256={sha256}"))
    }

    pub fn raw_file(&self, sha256: &str, extension: &str) -> PathBuf {
        self.raw_dir(sha256).join(format!("original.{extension}"))
    }

    pub fn derived_dir(&self, sha256: &str) -> PathBuf {
        self.root.join("derived").join(format!("sha256={sha256}"))
    }

    pub fn metadata_file(&self, sha256: &str) -> PathBuf {
        self.derived_dir(sha256).join("metadata.json")
    }

    pub fn analysis_file(&self, sha256: &str) -> PathBuf {
        self.derived_dir(sha256).join("analysis.v1.json")
    }

    pub fn analysis_backup_file(&self, sha256: &str, timestamp: &str) -> PathBuf {
        self.derived_dir(sha256).join(format!("analysis.v1.bak.{timestamp}.json"))
    }

    pub fn custody_file(&self, sha256: &str) -> PathBuf {
        self.derived_dir(sha256).join("chain_of_custody.json")
    }

    pub fn exif_file(&self, sha256: &str) -> PathBuf {
        self.derived_dir(sha256).join("exif.json")
    }

    pub fn case_dir(&self, case_id: &str) -> PathBuf {
        self.root.join("cases").join(case_id)
    }

    pub fn case_link(&self, case_id: &str, sha256: &str, extension: &str) -> PathBuf {
        self.case_dir(case_id).join(format!("{sha256}.{extension}"))
    }

    pub fn correlation_file(&self, case_id: &str) -> PathBuf {
        self.case_dir(case_id).join("correlation_analysis.json")
    }

    pub fn case_summary_file(&self, case_id: &str) -> PathBuf {
        self.case_dir(case_id).join("case_summary.json")
    }
}
