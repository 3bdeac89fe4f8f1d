//! Intel aggregation and statistics.
//!
//! This module provides utilities for ranking and counting items across
//! agents, shared by the synthesizer and the report generator.

use crate::models::{IntelItem, IntelMap, SeverityLevel};
use std::collections::HashMap;

/// Sort items by severity (critical first), keeping input order on ties.
pub fn sort_by_severity(items: &mut [IntelItem]) {
    items.sort_by(|a, b| b.severity.cmp(&a.severity));
}

/// Get the top N items by severity.
pub fn top_items(items: &[IntelItem], n: usize) -> Vec<IntelItem> {
    let mut sorted = items.to_vec();
    sort_by_severity(&mut sorted);
    sorted.truncate(n);
    sorted
}

/// Every item of a pass, most severe first.
pub fn all_items_by_severity(intel: &IntelMap) -> Vec<IntelItem> {
    let mut all: Vec<IntelItem> = intel.values().flatten().cloned().collect();
    sort_by_severity(&mut all);
    all
}

/// Count items per severity band.
pub fn count_by_level(intel: &IntelMap) -> HashMap<SeverityLevel, usize> {
    let mut counts: HashMap<SeverityLevel, usize> = HashMap::new();

    for item in intel.values().flatten() {
        *counts.entry(item.level()).or_default() += 1;
    }

    counts
}

/// Count items per reported source, most cited first.
pub fn source_distribution(intel: &IntelMap) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();

    for item in intel.values().flatten() {
        if !item.source.is_empty() {
            *counts.entry(item.source.clone()).or_default() += 1;
        }
    }

    let mut sources: Vec<_> = counts.into_iter().collect();
    sources.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn create_test_item(headline: &str, severity: u8, source: &str) -> IntelItem {
        IntelItem {
            headline: headline.to_string(),
            summary: String::new(),
            source: source.to_string(),
            time: String::new(),
            severity,
            verified: false,
            location: None,
            agent_id: "sigint".to_string(),
            category: "SIGINT".to_string(),
            model: "m".to_string(),
            fetched_at: 0,
            extra: Map::new(),
        }
    }

    #[test]
    fn test_sort_by_severity_is_stable() {
        let mut items = vec![
            create_test_item("low", 1, "A"),
            create_test_item("first high", 4, "A"),
            create_test_item("critical", 5, "A"),
            create_test_item("second high", 4, "A"),
        ];

        sort_by_severity(&mut items);

        let order: Vec<_> = items.iter().map(|i| i.headline.as_str()).collect();
        assert_eq!(order, vec!["critical", "first high", "second high", "low"]);
    }

    #[test]
    fn test_top_items() {
        let items = vec![
            create_test_item("a", 2, "A"),
            create_test_item("b", 5, "A"),
            create_test_item("c", 3, "A"),
        ];

        let top = top_items(&items, 2);

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].severity, 5);
        assert_eq!(top[1].severity, 3);
    }

    #[test]
    fn test_count_by_level_and_sources() {
        let mut intel = IntelMap::new();
        intel.insert(
            "sigint".to_string(),
            vec![
                create_test_item("a", 5, "Reuters"),
                create_test_item("b", 4, "AP"),
            ],
        );
        intel.insert(
            "osint".to_string(),
            vec![create_test_item("c", 1, "Reuters")],
        );

        let counts = count_by_level(&intel);
        assert_eq!(counts.get(&SeverityLevel::Critical), Some(&1));
        assert_eq!(counts.get(&SeverityLevel::High), Some(&1));
        assert_eq!(counts.get(&SeverityLevel::Low), Some(&1));
        assert_eq!(counts.get(&SeverityLevel::Medium), None);

        let sources = source_distribution(&intel);
        assert_eq!(sources[0], ("Reuters".to_string(), 2));
        assert_eq!(sources[1], ("AP".to_string(), 1));

        assert_eq!(all_items_by_severity(&intel)[0].headline, "a");
    }
}
