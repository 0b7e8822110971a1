/*!
 * Markup extraction for the pages the core reads
 */

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static VILLAGE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<span class="quickedit-vn" data-id="(\d+)""#).unwrap()
});

static INCOMINGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""incomings":"(\d+)""#).unwrap());

pub trait PageExtractor: Send + Sync {
    /// Village identifiers on the overview page, first occurrence order
    fn village_ids(&self, overview: &str) -> Vec<String>;

    /// Incoming attack counter from the embedded game data
    fn incoming_attacks(&self, page: &str) -> Option<u32>;
}

/// Regex-based extraction from the game's HTML
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupExtractor;

impl PageExtractor for MarkupExtractor {
    fn village_ids(&self, overview: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        VILLAGE_ID
            .captures_iter(overview)
            .map(|c| c[1].to_string())
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }

    fn incoming_attacks(&self, page: &str) -> Option<u32> {
        INCOMINGS
            .captures(page)
            .and_then(|c| c[1].parse().ok())
    }
}
