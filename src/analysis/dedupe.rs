//! Near-duplicate detection by headline fingerprint.

use crate::models::{IntelItem, IntelMap};
use std::collections::HashSet;

/// Number of characters kept in a fingerprint.
pub const FINGERPRINT_LEN: usize = 40;

/// Lowercased ASCII alphanumerics of the headline, truncated.
pub fn fingerprint(headline: &str) -> String {
    headline
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(FINGERPRINT_LEN)
        .collect()
}

/// Keep the first item of every fingerprint, preserving input order.
pub fn dedupe(items: Vec<IntelItem>) -> Vec<IntelItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(fingerprint(&item.headline)))
        .collect()
}

/// Fingerprints of a previous cycle, for flagging new items.
#[derive(Debug, Clone, Default)]
pub struct FingerprintSet {
    keys: HashSet<String>,
}

impl FingerprintSet {
    pub fn from_intel(intel: &IntelMap) -> Self {
        Self {
            keys: intel
                .values()
                .flatten()
                .map(|item| fingerprint(&item.headline))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// An item is new when its fingerprint was not seen before.
    ///
    /// Nothing is new against an empty set, so the first cycle is not
    /// flagged wholesale.
    pub fn is_new(&self, item: &IntelItem) -> bool {
        !self.keys.is_empty() && !self.keys.contains(&fingerprint(&item.headline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn item(headline: &str, source: &str) -> IntelItem {
        IntelItem {
            headline: headline.to_string(),
            summary: String::new(),
            source: source.to_string(),
            time: String::new(),
            severity: 3,
            verified: false,
            location: None,
            agent_id: "osint".to_string(),
            category: "OSINT".to_string(),
            model: "m".to_string(),
            fetched_at: 0,
            extra: Map::new(),
        }
    }

    #[test]
    fn test_fingerprint() {
        assert_eq!(fingerprint("Strike Reported!"), "strikereported");
        assert_eq!(fingerprint("Über-Alert 2026"), "beralert2026");
        assert_eq!(fingerprint(&"a".repeat(60)).len(), FINGERPRINT_LEN);
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let items = vec![
            item("Strike reported in Isfahan", "A"),
            item("strike reported in isfahan!!", "B"),
            item("Ceasefire talks resume", "C"),
        ];

        let deduped = dedupe(items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].source, "A");
        assert_eq!(deduped[1].source, "C");
    }

    #[test]
    fn test_dedupe_long_headlines_share_prefix() {
        let base = "x".repeat(40);
        let items = vec![
            item(&format!("{} first ending", base), "A"),
            item(&format!("{} second ending", base), "B"),
        ];
        assert_eq!(dedupe(items).len(), 1);
    }

    #[test]
    fn test_dedupe_idempotent() {
        let items = vec![
            item("One", "A"),
            item("one", "B"),
            item("Two", "C"),
            item("T-W-O", "D"),
            item("Three", "E"),
        ];

        let once = dedupe(items);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_fingerprint_set_is_new() {
        let empty = FingerprintSet::default();
        assert!(empty.is_empty());
        assert!(!empty.is_new(&item("Anything", "A")));

        let mut previous = IntelMap::new();
        previous.insert("osint".to_string(), vec![item("Old news", "A")]);
        let set = FingerprintSet::from_intel(&previous);

        assert!(!set.is_new(&item("OLD NEWS", "B")));
        assert!(set.is_new(&item("Fresh news", "B")));
    }
}
