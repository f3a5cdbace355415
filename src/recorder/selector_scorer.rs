//! Locator Scoring
//!
//! Turns the descriptor of a recorded element into an ordered list of
//! locator candidates. Stability decides the order:
//!
//! Priority order: id > CSS path > text
//!
//! # Scoring Rules
//! - **id**: 100 points, 45 when the id looks auto-generated
//! - **CSS path**: 60 points, 70 when anchored on an id
//! - **Text (exact)**: 40 points, 30 when long or dynamic-looking
//!
//! An auto-generated id drops below the structural path but is still kept
//! as a candidate.

use regex::Regex;
use std::sync::LazyLock;

use super::capture::ElementDescriptor;
use crate::model::Locator;

/// Longest visible text still usable as a content locator
const MAX_TEXT_LEN: usize = 80;

/// A locator candidate with its score and metadata
#[derive(Debug, Clone)]
pub struct SelectorCandidate {
    pub locator: Locator,
    /// Score (0-100), higher is better
    pub score: u32,
    /// Human-readable explanation
    pub reason: String,
    /// Whether this locator is considered stable
    pub is_stable: bool,
}

impl SelectorCandidate {
    pub fn short_repr(&self) -> String {
        self.locator.to_string()
    }
}

/// Patterns that indicate auto-generated ids (less stable)
static AUTO_GENERATED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"[0-9a-f]{8}-[0-9a-f]{4}", // UUID pattern
        r"_\d{10,}",                // Timestamp suffix
        r"[A-Za-z]+\d{5,}",         // Random number suffix
        r"^(ember|react|mui|radix|headlessui)[-_:]?\d", // Framework counters
        r"^:r[0-9a-z]+:$",          // React useId
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Text that changes between visits (counters, dates, times)
static DYNAMIC_TEXT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\d{1,2}/\d{1,2}/\d{4}",
        r"\d{1,2}:\d{2}(:\d{2})?",
        r"\d{1,3}(,\d{3})+",
        r"^\d+$",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Locator scorer
#[derive(Debug, Default, Clone)]
pub struct SelectorScorer;

impl SelectorScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score every usable locator for an element, best first
    pub fn score_element(&self, element: &ElementDescriptor) -> Vec<SelectorCandidate> {
        let mut candidates = Vec::new();

        // 1. id
        if let Some(id) = non_empty(element.id.as_deref()) {
            let (score, reason, is_stable) = self.score_id(id);
            candidates.push(SelectorCandidate {
                locator: Locator::Id(id.to_string()),
                score,
                reason,
                is_stable,
            });
        }

        // 2. Structural path
        if let Some(path) = non_empty(element.css_path.as_deref()) {
            let anchored = path.contains('#');
            candidates.push(SelectorCandidate {
                locator: Locator::CssPath(path.to_string()),
                score: if anchored { 70 } else { 60 },
                reason: if anchored {
                    "CSS path anchored on an id".to_string()
                } else {
                    "CSS path from document root".to_string()
                },
                is_stable: anchored,
            });
        }

        // 3. Content
        if let Some(text) = non_empty(element.text.as_deref()) {
            let (score, reason, is_stable) = self.score_text(text);
            if score > 0 {
                candidates.push(SelectorCandidate {
                    locator: Locator::Text(text.to_string()),
                    score,
                    reason,
                    is_stable,
                });
            }
        }

        // Stable sort keeps strategy order on equal scores
        candidates.sort_by(|a, b| b.score.cmp(&a.score));
        candidates
    }

    /// Ordered locator list for a step target
    pub fn locators_for(&self, element: &ElementDescriptor) -> Vec<Locator> {
        self.score_element(element)
            .into_iter()
            .map(|c| c.locator)
            .collect()
    }

    fn score_id(&self, id: &str) -> (u32, String, bool) {
        if AUTO_GENERATED_PATTERNS.iter().any(|re| re.is_match(id)) {
            (45, "id looks auto-generated".to_string(), false)
        } else {
            (100, "Stable id".to_string(), true)
        }
    }

    fn score_text(&self, text: &str) -> (u32, String, bool) {
        if text.chars().count() > MAX_TEXT_LEN {
            return (0, "Text too long".to_string(), false);
        }
        if DYNAMIC_TEXT_PATTERNS.iter().any(|re| re.is_match(text)) {
            (30, "Text looks dynamic".to_string(), false)
        } else if text.split_whitespace().count() > 6 {
            (30, "Long text".to_string(), false)
        } else {
            (40, "Exact text".to_string(), true)
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
