//! Theme filtering and pagination.
//!
//! A [`FilteredQuery`] is a view over a [`Dataset`]: it keeps the indices of
//! the matching rows in file order and hands out zero-indexed [`Page`]s of
//! them. Nothing is copied out of the dataset.

use log::debug;
use serde::{Deserialize, Serialize};

use super::{Dataset, PuzzleRecord};

/// How a theme token is matched against a record's theme field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMatch {
    /// The token must equal one whitespace separated tag.
    #[default]
    Token,
    /// The token may appear anywhere in the raw field, so `mate` also
    /// selects `mateIn2`.
    Substring,
}

impl ThemeMatch {
    pub fn matches(self, record: &PuzzleRecord, token: &str) -> bool {
        match self {
            ThemeMatch::Token => record.has_theme(token),
            ThemeMatch::Substring => record.themes.contains(token),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilteredQuery<'a> {
    dataset: &'a Dataset,
    token: String,
    mode: ThemeMatch,
    rows: Vec<usize>,
}

/// Records tagged with `token`, matched as a whole tag.
pub fn filter_by_theme<'a>(dataset: &'a Dataset, token: &str) -> FilteredQuery<'a> {
    FilteredQuery::new(dataset, token, ThemeMatch::Token)
}

impl<'a> FilteredQuery<'a> {
    pub fn new(dataset: &'a Dataset, token: &str, mode: ThemeMatch) -> Self {
        let rows: Vec<usize> = dataset
            .iter()
            .enumerate()
            .filter(|(_, record)| mode.matches(record, token))
            .map(|(i, _)| i)
            .collect();
        debug!(
            "Theme {:?} ({:?}) matched {} of {} puzzles",
            token,
            mode,
            rows.len(),
            dataset.len()
        );
        Self {
            dataset,
            token: token.to_string(),
            mode,
            rows,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn mode(&self) -> ThemeMatch {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a PuzzleRecord> + '_ {
        let dataset = self.dataset;
        self.rows.iter().map(move |&i| &dataset.records()[i])
    }

    /// Number of non-empty pages of `size` rows.
    pub fn page_count(&self, size: usize) -> usize {
        if size == 0 {
            0
        } else {
            self.rows.len().div_ceil(size)
        }
    }

    /// Rows `[index * size, (index + 1) * size)`, clipped to the result.
    /// Out of range pages and a zero size yield an empty page.
    pub fn page(&self, index: usize, size: usize) -> Page<'_> {
        let start = index.saturating_mul(size).min(self.rows.len());
        let end = start.saturating_add(size).min(self.rows.len());
        Page {
            dataset: self.dataset,
            rows: &self.rows[start..end],
            index,
        }
    }

    /// `count` consecutive pages starting at `start`, produced one at a time.
    pub fn pages(&self, start: usize, size: usize, count: usize) -> Pages<'_, 'a> {
        Pages {
            query: self,
            next: start,
            end: start.saturating_add(count),
            size,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Page<'q> {
    dataset: &'q Dataset,
    rows: &'q [usize],
    index: usize,
}

impl<'q> Page<'q> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'q PuzzleRecord> + 'q {
        let (dataset, rows) = (self.dataset, self.rows);
        rows.iter().map(move |&i| &dataset.records()[i])
    }

    pub fn records(&self) -> Vec<&'q PuzzleRecord> {
        self.iter().collect()
    }
}

pub struct Pages<'q, 'a> {
    query: &'q FilteredQuery<'a>,
    next: usize,
    end: usize,
    size: usize,
}

impl<'q> Iterator for Pages<'q, '_> {
    type Item = Page<'q>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let query = self.query;
        let page = query.page(self.next, self.size);
        self.next += 1;
        Some(page)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Pages<'_, '_> {}
