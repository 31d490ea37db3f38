//! Optional EXIF sidecar (`derived/sha256=<h>/exif.json`, §4.1).
//!
//! Real binary EXIF decoding is out of scope for this crate (§1 treats
//! extraction of anything beyond plain text as a pluggable external
//! concern); this is the typed sidecar the timeline reconstruction reads
//! `DateTimeOriginal` from when a caller (or a future extractor) has
//! populated it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExifData {
    pub date_time_original: Option<DateTime<Utc>>,
    pub camera_model: Option<String>,
    pub gps_coordinates: Option<(f64, f64)>,
}
