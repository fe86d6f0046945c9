//! Pure entry-privacy gating.
//!
//! The same predicate runs on the initial full-entry fetch and on every
//! broadcast event before per-subscriber delivery, so a private entry can
//! never reach anyone but its author through either path.

use crate::JournalEntry;

/// Decides whether a single entry is visible to `viewer`.
///
/// An entry is visible iff it is not private, or the viewer *is* the
/// author. Anonymous viewers (`None`) see public entries only.
pub fn entry_visible_to(entry: &JournalEntry, viewer: Option<&str>) -> bool {
    !entry.is_private || viewer == Some(entry.author.as_str())
}

/// Filters a chronological entry list down to the subsequence visible to
/// `viewer`, preserving order. Pure and deterministic.
pub fn visible_entries(entries: Vec<JournalEntry>, viewer: Option<&str>) -> Vec<JournalEntry> {
    entries
        .into_iter()
        .filter(|e| entry_visible_to(e, viewer))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, author: &str, is_private: bool) -> JournalEntry {
        JournalEntry {
            id,
            journal_id: 1,
            author: author.to_string(),
            content: format!("entry {id}"),
            is_private,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: None,
        }
    }

    #[test]
    fn author_always_sees_own_entries() {
        let e = entry(1, "alice", true);
        assert!(entry_visible_to(&e, Some("alice")));
        assert!(!entry_visible_to(&e, Some("bob")));
        assert!(!entry_visible_to(&e, None));
    }

    #[test]
    fn public_entries_visible_to_everyone() {
        let e = entry(1, "alice", false);
        assert!(entry_visible_to(&e, Some("alice")));
        assert!(entry_visible_to(&e, Some("bob")));
        assert!(entry_visible_to(&e, None));
    }

    #[test]
    fn filter_preserves_order() {
        let entries = vec![
            entry(1, "alice", false),
            entry(2, "alice", true),
            entry(3, "bob", false),
            entry(4, "bob", true),
            entry(5, "alice", false),
        ];

        let for_bob = visible_entries(entries.clone(), Some("bob"));
        let ids: Vec<i64> = for_bob.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3, 4, 5]);

        let for_anon = visible_entries(entries, None);
        let ids: Vec<i64> = for_anon.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn filter_is_restartable() {
        let entries = vec![entry(1, "alice", true), entry(2, "bob", false)];
        let once = visible_entries(entries.clone(), Some("carol"));
        let twice = visible_entries(entries, Some("carol"));
        assert_eq!(once, twice);
    }
}
