//! Rolling breaking-news ticker.

use crate::models::BreakingEntry;
use std::collections::VecDeque;

/// Entries kept across cycles.
pub const MAX_TICKER_ITEMS: usize = 30;

/// Newest-first list of ticker entries with a fixed capacity.
#[derive(Debug, Clone)]
pub struct Ticker {
    entries: VecDeque<BreakingEntry>,
    capacity: usize,
}

impl Default for Ticker {
    fn default() -> Self {
        Self::with_capacity(MAX_TICKER_ITEMS)
    }
}

impl Ticker {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Put a cycle's entries in front, keeping their order, and drop the oldest.
    pub fn push_cycle(&mut self, fresh: &[BreakingEntry]) {
        for entry in fresh.iter().rev() {
            self.entries.push_front(entry.clone());
        }
        self.entries.truncate(self.capacity);
    }

    pub fn entries(&self) -> Vec<BreakingEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str) -> BreakingEntry {
        BreakingEntry {
            text: text.to_string(),
            severity: 3,
            time: String::new(),
        }
    }

    #[test]
    fn test_newest_cycle_first() {
        let mut ticker = Ticker::default();
        ticker.push_cycle(&[entry("a1"), entry("a2")]);
        ticker.push_cycle(&[entry("b1"), entry("b2")]);

        let texts: Vec<_> = ticker.entries().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["b1", "b2", "a1", "a2"]);
    }

    #[test]
    fn test_capacity() {
        let mut ticker = Ticker::default();
        for cycle in 0..10 {
            let batch: Vec<_> = (0..6).map(|n| entry(&format!("{}-{}", cycle, n))).collect();
            ticker.push_cycle(&batch);
        }

        assert_eq!(ticker.len(), MAX_TICKER_ITEMS);
        assert_eq!(ticker.entries()[0].text, "9-0");
        assert_eq!(ticker.entries()[29].text, "5-5");
    }

    #[test]
    fn test_empty_cycle_keeps_entries() {
        let mut ticker = Ticker::with_capacity(2);
        assert!(ticker.is_empty());
        ticker.push_cycle(&[entry("x")]);
        ticker.push_cycle(&[]);
        assert_eq!(ticker.len(), 1);
    }
}
