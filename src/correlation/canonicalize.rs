//! Deterministic entity-name canonicalization (§4.5).
//!
//! A pure function from a raw name to three index variants. Two original
//! names are considered the same entity iff any variant collides, which is
//! checked by indexing occurrences into a multi-variant bucket map in
//! [`crate::correlation::extract`].

use std::collections::HashMap;

use unicode_normalization::UnicodeNormalization;

/// Role-token synonyms normalized before tokenization (§9 Open Question,
/// resolved explicitly and versioned here rather than left ambiguous).
/// Longer phrases are listed before their abbreviations so the replacement
/// pass can match multi-word phrases first.
pub const ROLE_SYNONYMS: &[(&str, &str)] = &[
    ("chief executive officer", "ceo"),
    ("chief financial officer", "cfo"),
    ("chief operating officer", "coo"),
    ("chief technology officer", "cto"),
    ("human resources manager", "hr manager"),
    ("human resources", "hr"),
    ("information technology", "it"),
    ("vice president", "vp"),
];

/// The three canonicalization variants for one name, used as index keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalVariants {
    pub base: String,
    pub short: String,
    pub initials: String,
}

/// Canonicalizes a raw entity name through the §4.5 pipeline:
/// 1. Unicode NFKC normalize.
/// 2. Collapse whitespace; case-fold.
/// 3. Normalize role tokens via [`ROLE_SYNONYMS`].
/// 4. Detect a single-comma "Last, First" pattern and swap to "First Last".
/// 5. Extract alphanumeric word tokens in order.
/// 6. Emit `base` (all tokens joined), `short` (first + last token, or the
///    single token), and `initials` (first letter of each token).
pub fn canonicalize(raw: &str) -> CanonicalVariants {
    let normalized: String = raw.nfkc().collect();
    let mut folded = normalized.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

    folded = swap_last_comma_first(&folded);

    for (phrase, replacement) in ROLE_SYNONYMS {
        if folded == *phrase {
            folded = replacement.to_string();
        } else {
            folded = folded.replace(phrase, replacement);
        }
    }

    let tokens: Vec<String> = folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect();

    if tokens.is_empty() {
        return CanonicalVariants { base: String::new(), short: String::new(), initials: String::new() };
    }

    let base = tokens.join(" ");
    let short = if tokens.len() == 1 {
        tokens[0].clone()
    } else {
        format!("{} {}", tokens.first().unwrap(), tokens.last().unwrap())
    };
    let initials = tokens.iter().filter_map(|t| t.chars().next()).map(String::from).collect::<Vec<_>>().join(" ");

    CanonicalVariants { base, short, initials }
}

/// Detects a single-comma "Last, First [Middle...]" pattern and rewrites it
/// to "First [Middle...] Last". Names with zero or more than one comma are
/// left untouched (a second comma suggests a suffix like "Jr." rather than
/// an unambiguous last-first split, so it is safer not to guess).
fn swap_last_comma_first(name: &str) -> String {
    let parts: Vec<&str> = name.split(',').collect();
    if parts.len() != 2 {
        return name.to_string();
    }
    let last = parts[0].trim();
    let first = parts[1].trim();
    if last.is_empty() || first.is_empty() {
        return name.to_string();
    }
    format!("{first} {last}")
}

/// Buckets occurrences by canonicalization variant so lookups by any of the
/// three variants resolve to the same bucket key. Mirrors a disjoint-set
/// structure without pulling in a union-find crate: buckets are merged
/// lazily by re-keying every variant of a newly-seen name to the first
/// bucket id any of its variants already maps to.
#[derive(Default)]
pub struct VariantIndex {
    variant_to_bucket: HashMap<String, usize>,
    next_bucket: usize,
}

impl VariantIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `raw` to a bucket id, merging with any bucket already
    /// reachable through one of its three variants and creating a new one
    /// otherwise.
    pub fn bucket_for(&mut self, raw: &str) -> usize {
        let variants = canonicalize(raw);
        let keys = [
            format!("base:{}", variants.base),
            format!("short:{}", variants.short),
            format!("initials:{}", variants.initials),
        ];

        let existing = keys.iter().find_map(|k| self.variant_to_bucket.get(k).copied());
        let bucket = existing.unwrap_or_else(|| {
            let id = self.next_bucket;
            self.next_bucket += 1;
            id
        });

        for key in &keys {
            self.variant_to_bucket.insert(key.clone(), bucket);
        }

        bucket
    }
}
