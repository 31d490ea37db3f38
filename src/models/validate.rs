//! Shared validation helpers used at every write/read boundary (§3 invariants).

use once_cell_lite::Lazy;
use regex::Regex;

use crate::error::Error;

static SHA256_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-f0-9]{64}$").expect("valid regex"));

/// `sha256` must match `^[a-f0-9]{64}$`.
pub fn validate_sha256(sha256: &str) -> Result<(), Error> {
    if SHA256_RE.is_match(sha256) {
        Ok(())
    } else {
        Err(Error::ValidationError(format!("invalid sha256: {sha256}")))
    }
}

/// Confidence fields must lie in `[0, 1]`.
pub fn validate_confidence(confidence: f64) -> Result<(), Error> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(Error::ValidationError(format!(
            "confidence {confidence} out of range [0, 1]"
        )))
    }
}

/// Every float serialized in a persisted artifact is rounded to 4 decimal
/// places so that repeated runs over identical inputs produce
/// byte-identical JSON (the reproducibility property in §8).
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// A byte size field must be at least 1 (an empty file is not valid evidence).
pub fn validate_nonzero_size(size: u64) -> Result<(), Error> {
    if size >= 1 {
        Ok(())
    } else {
        Err(Error::ValidationError("file size must be >= 1 byte".to_string()))
    }
}

/// `mod once_cell_lite` avoids pulling in the `once_cell` crate for a
/// single lazily-initialized regex; `std::sync::OnceLock` already covers it.
mod once_cell_lite {
    use std::sync::OnceLock;

    pub struct Lazy<T> {
        cell: OnceLock<T>,
        init: fn() -> T,
    }

    impl<T> Lazy<T> {
        pub const fn new(init: fn() -> T) -> Self {
            Self { cell: OnceLock::new(), init }
        }
    }

    impl<T> std::ops::Deref for Lazy<T> {
        type Target = T;
        fn deref(&self) -> &T {
            self.cell.get_or_init(self.init)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_pattern_accepts_lowercase_hex() {
        let h = "a".repeat(64);
        assert!(validate_sha256(&h).is_ok());
    }

    #[test]
    fn sha256_pattern_rejects_uppercase_or_short() {
        assert!(validate_sha256(&"A".repeat(64)).is_err());
        assert!(validate_sha256("abc123").is_err());
    }

    #[test]
    fn confidence_bounds() {
        assert!(validate_confidence(0.0).is_ok());
        assert!(validate_confidence(1.0).is_ok());
        assert!(validate_confidence(-0.01).is_err());
        assert!(validate_confidence(1.01).is_err());
    }

    #[test]
    fn round4_rounds_half_up() {
        assert_eq!(round4(0.123_456), 0.1235);
        assert_eq!(round4(0.85), 0.85);
    }
}
