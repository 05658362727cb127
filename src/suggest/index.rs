use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::normalize::Normalizer;

/// Addresses one independently cached completion index:
/// a logical field within a logical collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub collection: String,
    pub field: String,
}

impl FieldKey {
    pub fn new(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.field)
    }
}

/// One distinct (post-trim) corpus value: the display text, its folded
/// form used only for matching, and how many times it occurred.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub text: String,
    pub folded: String,
    pub count: u32,
}

/// A query result element derived from an IndexEntry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub text: String,
    pub count: u32,
}

/// Immutable, ranked, size-bounded index snapshot for one field.
/// A rebuild produces a whole new FieldIndex; existing ones never mutate.
#[derive(Debug, Default)]
pub struct FieldIndex {
    entries: Vec<IndexEntry>,
}

impl FieldIndex {
    /// Build an index from the raw values recorded for a field.
    ///
    /// Values are trimmed and empties discarded. Occurrences are counted
    /// per exact trimmed text: two values that agree only after folding
    /// (e.g. "Berlin" vs "berlin") stay separate entries, each with its
    /// own count. Folding supplies the match key only.
    ///
    /// Entries are ranked by count descending, then case-insensitive text
    /// ascending, then exact text ascending to keep the order fully
    /// deterministic, and truncated to `max_entries` so the rarest values
    /// are dropped first regardless of corpus size.
    pub fn build(raw_values: Vec<String>, max_entries: usize, normalizer: &dyn Normalizer) -> Self {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for v in raw_values {
            let t = v.trim();
            if t.is_empty() {
                continue;
            }
            *counts.entry(t.to_string()).or_insert(0) += 1;
        }

        let mut entries: Vec<IndexEntry> = counts
            .into_iter()
            .map(|(text, count)| IndexEntry {
                folded: normalizer.fold(&text),
                text,
                count,
            })
            .collect();

        entries.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.text.to_lowercase().cmp(&b.text.to_lowercase()))
                .then_with(|| a.text.cmp(&b.text))
        });
        entries.truncate(max_entries);

        Self { entries }
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
