//! Puzzle dataset model and the operations built on top of it.
//!
//! - **loader**: streams a (compressed) CSV dump into a [`Dataset`]
//! - **themes**: derives the theme catalog, optionally with occurrence counts
//! - **query**: filters a dataset by theme and slices it into pages

pub mod loader;
pub mod query;
pub mod themes;

use serde::Serialize;

pub use loader::{load, load_with_options, Compression, LoaderOptions};
pub use query::{filter_by_theme, FilteredQuery, Page, Pages, ThemeMatch};
pub use themes::{count_themes, list_themes, ThemeCatalog, ThemeEntry};

use crate::{error::Result, pgn};

/// One row of the puzzle dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PuzzleRecord {
    pub id: String,
    pub fen: String,
    /// Solution line, whitespace separated UCI moves.
    pub moves: String,
    /// Whitespace separated theme tags.
    pub themes: String,
}

impl PuzzleRecord {
    pub fn move_list(&self) -> impl Iterator<Item = &str> {
        self.moves.split_whitespace()
    }

    pub fn theme_tokens(&self) -> impl Iterator<Item = &str> {
        self.themes.split_whitespace()
    }

    pub fn has_theme(&self, token: &str) -> bool {
        self.theme_tokens().any(|t| t == token)
    }

    /// Convert this puzzle into a game record labelled with its id.
    pub fn to_game_record(&self) -> Result<pgn::GameRecord> {
        pgn::to_game_record(&self.fen, &self.moves, &self.id)
    }

    pub fn to_pgn(&self) -> Result<String> {
        self.to_game_record().map(|record| pgn::serialize(&record))
    }
}

/// All puzzle rows of a loaded file, in file order. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    records: Vec<PuzzleRecord>,
}

impl Dataset {
    pub fn new(records: Vec<PuzzleRecord>) -> Self {
        Self { records }
    }

    pub(crate) fn from_chunks(chunks: Vec<Vec<PuzzleRecord>>) -> Self {
        Self {
            records: chunks.into_iter().flatten().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PuzzleRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PuzzleRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[PuzzleRecord] {
        &self.records
    }
}

impl FromIterator<PuzzleRecord> for Dataset {
    fn from_iter<I: IntoIterator<Item = PuzzleRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a PuzzleRecord;
    type IntoIter = std::slice::Iter<'a, PuzzleRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
