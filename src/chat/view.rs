//! Presentation views over the most recent conversation turns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::history::{Entry, Role};

/// Number of turns included in history views.
pub const MAX_RECENT_PAIRS: usize = 10;

/// Which recent-turns view, if any, accompanies a reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryView {
    /// Reply only.
    #[default]
    Plain,
    /// Multi-line text in the `formatted` field.
    Formatted,
    /// Flat `user_N` / `assistant_N` map in the `history` field.
    Numbered,
}

/// One user question and the assistant answer that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentPair {
    pub user: String,
    pub assistant: String,
}

/// Up to `limit` user/assistant pairs, newest first.
///
/// Entries that are not part of an adjacent user→assistant pair are skipped.
pub fn recent_pairs(entries: &[Entry], limit: usize) -> Vec<RecentPair> {
    let mut pairs = Vec::new();
    let mut i = 0;
    while i + 1 < entries.len() {
        let (first, second) = (&entries[i], &entries[i + 1]);
        if first.role == Role::User && second.role == Role::Assistant {
            pairs.push(RecentPair {
                user: first.content.clone(),
                assistant: second.content.clone(),
            });
            i += 2;
        } else {
            i += 1;
        }
    }

    pairs.into_iter().rev().take(limit).collect()
}

/// Render pairs as numbered multi-line text, one block per turn.
pub fn format_pairs(pairs: &[RecentPair]) -> String {
    pairs
        .iter()
        .enumerate()
        .map(|(i, pair)| {
            format!(
                "{}. User: {}\n   Assistant: {}",
                i + 1,
                pair.user,
                pair.assistant
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render pairs as a flat map keyed `user_N` / `assistant_N` (1 = newest).
pub fn number_pairs(pairs: &[RecentPair]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for (i, pair) in pairs.iter().enumerate() {
        let n = i + 1;
        map.insert(format!("user_{n}"), pair.user.clone());
        map.insert(format!("assistant_{n}"), pair.assistant.clone());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(count: usize) -> Vec<Entry> {
        (1..=count)
            .flat_map(|i| [Entry::user(format!("q{i}")), Entry::assistant(format!("a{i}"))])
            .collect()
    }

    #[test]
    fn test_recent_pairs_newest_first_and_capped() {
        let pairs = recent_pairs(&turns(12), MAX_RECENT_PAIRS);
        assert_eq!(pairs.len(), 10);
        assert_eq!(pairs[0].user, "q12");
        assert_eq!(pairs[0].assistant, "a12");
        assert_eq!(pairs[9].user, "q3");
    }

    #[test]
    fn test_recent_pairs_skips_unpaired_entries() {
        let entries = vec![
            Entry::assistant("orphan"),
            Entry::user("q1"),
            Entry::assistant("a1"),
            Entry::user("dangling"),
        ];
        let pairs = recent_pairs(&entries, 10);
        assert_eq!(
            pairs,
            vec![RecentPair {
                user: "q1".into(),
                assistant: "a1".into()
            }]
        );
        assert!(recent_pairs(&[], 10).is_empty());
    }

    #[test]
    fn test_format_pairs() {
        let text = format_pairs(&recent_pairs(&turns(2), 10));
        assert_eq!(
            text,
            "1. User: q2\n   Assistant: a2\n\n2. User: q1\n   Assistant: a1"
        );
        assert_eq!(format_pairs(&[]), "");
    }

    #[test]
    fn test_number_pairs() {
        let map = number_pairs(&recent_pairs(&turns(2), 10));
        assert_eq!(map.len(), 4);
        assert_eq!(map["user_1"], "q2");
        assert_eq!(map["assistant_1"], "a2");
        assert_eq!(map["user_2"], "q1");
    }

    #[test]
    fn test_view_parses_lowercase() {
        let view: HistoryView = serde_json::from_str("\"numbered\"").unwrap();
        assert_eq!(view, HistoryView::Numbered);
        assert_eq!(HistoryView::default(), HistoryView::Plain);
    }
}
