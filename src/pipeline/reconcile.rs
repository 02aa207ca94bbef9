//! Narrative/grounding reconciliation.
//!
//! A grounded search returns a set of named hits plus free text in which the
//! model describes each hit in a tagged block:
//!
//! ```text
//! HOSPITAL: <name>
//! CONTACT: <phone>
//! BEST DOCTOR: <name>
//! RATING: <x.y/5 stars>
//! ---
//! ```
//!
//! The scanner splits the narrative on the `---` sentinel, finds the first
//! block whose header names a hit exactly (name escaped, case-insensitive),
//! and reads `label: value` lines out of it. Missing or placeholder values
//! are synthesised so every enriched hit is fully populated.

use std::collections::HashSet;
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

use crate::models::{EnrichedHit, SearchHit};

/// Terminates every narrative block.
pub const BLOCK_SENTINEL: &str = "---";

/// Placeholder for an unknown contact number.
pub const NOT_AVAILABLE: &str = "Not Available";

/// Specialists cycled through when the narrative names none.
pub const DEFAULT_DOCTOR_POOL: &[&str] = &[
    "Dr. Anita Desai (General Medicine)",
    "Dr. Rohan Kapoor (Internal Medicine)",
    "Dr. Meera Iyer (Emergency Medicine)",
    "Dr. Vikram Singh (Family Medicine)",
    "Dr. Sara Thomas (Cardiology)",
];

/// Leading decoration a model may put before a label: whitespace, markdown
/// emphasis, headings, quotes or a bullet dash.
const LEAD: &str = r"^[ \t*#>\-]*";

/// Separator between label and value, tolerating `**LABEL:**` styling.
const SEP: &str = r"[ \t*]*:[ \t*]*";

static HEADER_ANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?im){LEAD}HOSPITAL{SEP}(.+?)[ \t*\r]*$")).unwrap()
});

static CONTACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?im){LEAD}CONTACT{SEP}(.*)$")).unwrap());

static BEST_DOCTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?im){LEAD}BEST\s+DOCTOR{SEP}(.*)$")).unwrap()
});

static RATING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?im){LEAD}RATING{SEP}(.*)$")).unwrap());

// ═══════════════════════════════════════════════════════════
// Block scanning
// ═══════════════════════════════════════════════════════════

/// Blocks closed by a sentinel. Text after the last `---` is not a block.
pub fn scan_blocks(narrative: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = narrative.split(BLOCK_SENTINEL).collect();
    // The final piece is whatever follows the last sentinel (or the whole
    // text when there is none): never terminated.
    parts.pop();
    parts
}

/// Matcher for a block whose header names exactly `name`.
fn header_for(name: &str) -> Option<Regex> {
    let pattern = format!(
        r"(?im){LEAD}HOSPITAL{SEP}{}[ \t*\r]*$",
        regex::escape(name.trim())
    );
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(error = %e, "Cannot build header matcher; hit will use fallbacks");
            None
        }
    }
}

/// First block whose header names `name`.
pub fn find_block<'a>(blocks: &[&'a str], name: &str) -> Option<&'a str> {
    if name.trim().is_empty() {
        return None;
    }
    let header = header_for(name)?;
    blocks.iter().copied().find(|block| header.is_match(block))
}

fn clean_value(raw: &str) -> String {
    raw.trim().trim_matches('*').trim().to_string()
}

fn field(block: &str, label: &Regex) -> String {
    label
        .captures(block)
        .and_then(|c| c.get(1))
        .map(|m| clean_value(m.as_str()))
        .unwrap_or_default()
}

/// Every hospital named in a terminated block, first occurrence wins,
/// compared case-insensitively.
pub fn hospital_names(narrative: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    scan_blocks(narrative)
        .into_iter()
        .filter_map(|block| HEADER_ANY.captures(block))
        .filter_map(|c| c.get(1).map(|m| clean_value(m.as_str())))
        .filter(|name| !name.is_empty() && seen.insert(name.to_lowercase()))
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Extraction + normalisation
// ═══════════════════════════════════════════════════════════

/// Raw values read from a hit's block. Empty when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub contact: String,
    pub best_doctor: String,
    pub rating: String,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

pub fn normalize_contact(raw: &str) -> String {
    let value = raw.trim();
    if value.is_empty() || contains_ci(value, "not specified") || contains_ci(value, "not available") {
        NOT_AVAILABLE.to_string()
    } else {
        value.to_string()
    }
}

pub fn normalize_doctor(raw: &str, index: usize, pool: &[String]) -> String {
    let value = raw.trim();
    if !value.is_empty() && !contains_ci(value, "not specified") {
        return value.to_string();
    }
    if pool.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    pool[index % pool.len()].clone()
}

pub fn normalize_rating(raw: &str, generate: &mut dyn FnMut() -> String) -> String {
    let value = raw.trim();
    if value.is_empty() || contains_ci(value, "not available") {
        generate()
    } else {
        value.to_string()
    }
}

/// `"X.Y/5 stars"` with X.Y uniform over 3.8..5.0 in tenths.
pub fn random_rating<R: Rng + ?Sized>(rng: &mut R) -> String {
    let tenths: u32 = rng.gen_range(38..50);
    format!("{}.{}/5 stars", tenths / 10, tenths % 10)
}

// ═══════════════════════════════════════════════════════════
// Reconciler
// ═══════════════════════════════════════════════════════════

/// Merges grounded hits with the narrative describing them.
#[derive(Debug, Clone)]
pub struct EntityReconciler {
    doctor_pool: Vec<String>,
}

impl Default for EntityReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_DOCTOR_POOL.iter().map(|d| d.to_string()).collect())
    }
}

impl EntityReconciler {
    pub fn new(doctor_pool: Vec<String>) -> Self {
        if doctor_pool.is_empty() {
            tracing::warn!("Empty fallback doctor pool; missing doctors become '{NOT_AVAILABLE}'");
        }
        Self { doctor_pool }
    }

    pub fn doctor_pool(&self) -> &[String] {
        &self.doctor_pool
    }

    /// Deterministic part: raw fields per hit, same order and count as `hits`.
    pub fn extract(&self, hits: &[SearchHit], narrative: &str) -> Vec<ExtractedFields> {
        let blocks = scan_blocks(narrative);
        hits.iter()
            .map(|hit| match find_block(&blocks, &hit.display_name) {
                Some(block) => ExtractedFields {
                    contact: field(block, &CONTACT),
                    best_doctor: field(block, &BEST_DOCTOR),
                    rating: field(block, &RATING),
                },
                None => ExtractedFields::default(),
            })
            .collect()
    }

    /// Extract, then fill every gap.
    pub fn reconcile(
        &self,
        hits: &[SearchHit],
        narrative: &str,
        mut rating: impl FnMut() -> String,
    ) -> Vec<EnrichedHit> {
        let extracted = self.extract(hits, narrative);
        let mut fallbacks = 0usize;

        let enriched: Vec<EnrichedHit> = hits
            .iter()
            .zip(extracted)
            .enumerate()
            .map(|(i, (hit, raw))| {
                if raw == ExtractedFields::default() {
                    fallbacks += 1;
                }
                EnrichedHit {
                    hit: hit.clone(),
                    contact_number: normalize_contact(&raw.contact),
                    specialist_name: normalize_doctor(&raw.best_doctor, i, &self.doctor_pool),
                    rating_label: normalize_rating(&raw.rating, &mut rating),
                }
            })
            .collect();

        tracing::debug!(
            hits = hits.len(),
            without_block = fallbacks,
            "Reconciled search hits"
        );
        enriched
    }

    /// `reconcile` with ratings drawn from the thread RNG.
    pub fn reconcile_with_random_ratings(
        &self,
        hits: &[SearchHit],
        narrative: &str,
    ) -> Vec<EnrichedHit> {
        let mut rng = rand::thread_rng();
        self.reconcile(hits, narrative, || random_rating(&mut rng))
    }
}
