//! Themed chess puzzle export.
//!
//! Loads a puzzle dump (`PuzzleId`, `FEN`, `Moves`, `Themes` columns, plain or
//! compressed CSV), builds a catalog of the theme tags it contains, and
//! writes pages of puzzles for one theme as PGN files.
//!
//! ```no_run
//! use puzzle_pgn_lib::{export, puzzle, ExportJob};
//!
//! let dataset = puzzle::load("lichess_db_puzzle.csv.zst", &mut |p: f64| {
//!     println!("{:.0}%", p * 100.0)
//! })?;
//! let themes = puzzle::count_themes(&dataset, &mut |_: f64| {});
//! println!("{:?}", themes.display_keys());
//!
//! let job = ExportJob {
//!     theme: "fork".to_string(),
//!     theme_match: Default::default(),
//!     start_page: 0,
//!     page_size: 100,
//!     file_count: 5,
//!     filename_template: "forks".to_string(),
//! };
//! export::export(&dataset, &job, &mut |_: f64| {})?;
//! # Ok::<(), puzzle_pgn_lib::Error>(())
//! ```

pub mod error;
pub mod export;
pub mod pgn;
pub mod progress;
pub mod puzzle;
pub mod session;
pub mod tasks;

pub use error::{Error, Result};
pub use export::{ExportJob, ExportSummary};
pub use pgn::{GameNode, GameRecord};
pub use progress::{NoProgress, ProgressSink};
pub use puzzle::{Dataset, FilteredQuery, PuzzleRecord, ThemeCatalog, ThemeMatch};
pub use session::Session;
pub use tasks::TaskHandle;
