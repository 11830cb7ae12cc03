use std::collections::{BTreeMap, BTreeSet};

use log::info;
use serde::Serialize;

use super::Dataset;
use crate::progress::{Progress, ProgressSink};

/// Records scanned between two progress updates while counting.
const COUNT_PROGRESS_STRIDE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeEntry {
    pub token: String,
    /// Number of puzzles tagged with `token`, when the catalog was counted.
    pub count: Option<usize>,
}

impl ThemeEntry {
    /// Label shown to users, e.g. `fork (1,204)`.
    pub fn display_key(&self) -> String {
        match self.count {
            Some(count) => format!("{} ({})", self.token, group_thousands(count)),
            None => self.token.clone(),
        }
    }
}

/// Distinct theme tokens of a dataset, sorted lexicographically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThemeCatalog {
    entries: Vec<ThemeEntry>,
}

impl ThemeCatalog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ThemeEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ThemeEntry> {
        self.entries.iter()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.token.as_str())
    }

    pub fn display_keys(&self) -> Vec<String> {
        self.entries.iter().map(ThemeEntry::display_key).collect()
    }

    pub fn get(&self, token: &str) -> Option<&ThemeEntry> {
        self.entries
            .binary_search_by(|e| e.token.as_str().cmp(token))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Canonical token behind a display key. Bare tokens are accepted too.
    pub fn token_for(&self, display_key: &str) -> Option<&str> {
        if let Some(entry) = self.get(display_key) {
            return Some(entry.token.as_str());
        }
        self.entries
            .iter()
            .find(|e| e.display_key() == display_key)
            .map(|e| e.token.as_str())
    }

    pub fn has_counts(&self) -> bool {
        self.entries.iter().any(|e| e.count.is_some())
    }
}

/// Sorted distinct theme tokens, without counts.
pub fn list_themes(dataset: &Dataset) -> ThemeCatalog {
    let tokens: BTreeSet<&str> = dataset.iter().flat_map(|r| r.theme_tokens()).collect();
    info!("Found {} distinct themes", tokens.len());
    ThemeCatalog {
        entries: tokens
            .into_iter()
            .map(|token| ThemeEntry {
                token: token.to_string(),
                count: None,
            })
            .collect(),
    }
}

/// Sorted distinct theme tokens with the number of puzzles carrying each.
/// A token repeated within one record's field is counted once for it.
pub fn count_themes(dataset: &Dataset, on_progress: &mut dyn ProgressSink) -> ThemeCatalog {
    let mut progress = Progress::new("count_themes", on_progress);
    let total = dataset.len();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

    for (i, record) in dataset.iter().enumerate() {
        let tokens: BTreeSet<&str> = record.theme_tokens().collect();
        for token in tokens {
            *counts.entry(token).or_insert(0) += 1;
        }
        if (i + 1) % COUNT_PROGRESS_STRIDE == 0 {
            progress.update_ratio((i + 1) as u64, total as u64);
        }
    }

    info!("Counted {} distinct themes over {} puzzles", counts.len(), total);
    progress.finish();
    ThemeCatalog {
        entries: counts
            .into_iter()
            .map(|(token, count)| ThemeEntry {
                token: token.to_string(),
                count: Some(count),
            })
            .collect(),
    }
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
