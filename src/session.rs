use std::{path::Path, sync::Arc};

use log::{info, warn};

use crate::{
    error::Result,
    export::{self, ExportJob, ExportSummary},
    progress::ProgressSink,
    puzzle::{self, Dataset, FilteredQuery, LoaderOptions, ThemeCatalog, ThemeMatch},
};

/// Caller-owned state between operations: the loaded dataset and the most
/// recently built theme catalog. Both are replaced wholesale, never mutated.
#[derive(Debug, Clone, Default)]
pub struct Session {
    dataset: Arc<Dataset>,
    catalog: Option<ThemeCatalog>,
    loader: LoaderOptions,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loader_options(loader: LoaderOptions) -> Self {
        Self {
            loader,
            ..Self::default()
        }
    }

    /// Load `path`, replacing the current dataset and dropping the catalog.
    /// On failure the previous dataset stays in place.
    pub fn load(
        &mut self,
        path: impl AsRef<Path>,
        on_progress: &mut dyn ProgressSink,
    ) -> Result<Arc<Dataset>> {
        match puzzle::load_with_options(path.as_ref(), &self.loader, on_progress) {
            Ok(dataset) => {
                self.install(Arc::new(dataset));
                Ok(self.dataset.clone())
            }
            Err(e) => {
                warn!("Failed to load {}: {}", path.as_ref().display(), e);
                Err(e)
            }
        }
    }

    /// Install an already loaded dataset, e.g. one produced by a background task.
    pub fn install(&mut self, dataset: Arc<Dataset>) {
        info!("Session dataset replaced ({} puzzles)", dataset.len());
        self.dataset = dataset;
        self.catalog = None;
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn catalog(&self) -> Option<&ThemeCatalog> {
        self.catalog.as_ref()
    }

    pub fn set_catalog(&mut self, catalog: ThemeCatalog) {
        self.catalog = Some(catalog);
    }

    pub fn list_themes(&mut self) -> &ThemeCatalog {
        self.catalog.insert(puzzle::list_themes(&self.dataset))
    }

    pub fn count_themes(&mut self, on_progress: &mut dyn ProgressSink) -> &ThemeCatalog {
        self.catalog.insert(puzzle::count_themes(&self.dataset, on_progress))
    }

    /// Map a catalog display key to its token. Bare tokens pass through.
    fn resolve_theme<'s>(&'s self, theme: &'s str) -> &'s str {
        self.catalog
            .as_ref()
            .and_then(|c| c.token_for(theme))
            .unwrap_or(theme)
    }

    /// Resolve a catalog display key (or a bare token) and filter by it.
    pub fn filter(&self, theme: &str, mode: ThemeMatch) -> FilteredQuery<'_> {
        FilteredQuery::new(&self.dataset, self.resolve_theme(theme), mode)
    }

    /// Export `job`, accepting a catalog display key as its theme.
    pub fn run_export(
        &self,
        job: &ExportJob,
        on_progress: &mut dyn ProgressSink,
    ) -> Result<ExportSummary> {
        let token = self.resolve_theme(&job.theme);
        if token == job.theme {
            return export::export(&self.dataset, job, on_progress);
        }
        let resolved = ExportJob {
            theme: token.to_string(),
            ..job.clone()
        };
        export::export(&self.dataset, &resolved, on_progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, progress::NoProgress};

    const CSV: &str = "\
PuzzleId,FEN,Moves,Themes
a,rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1,e2e4 e7e5,fork short
b,rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1,d2d4 d7d5,mateIn2
c,rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1,c2c4,fork
";

    #[test]
    fn test_session_flow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("puzzles.csv");
        std::fs::write(&path, CSV).unwrap();

        let mut session = Session::new();
        let dataset = session.load(&path, &mut |_: f64| {}).unwrap();
        assert_eq!(dataset.len(), 3);
        assert!(session.catalog().is_none());

        let keys = session.count_themes(&mut |_: f64| {}).display_keys();
        assert_eq!(keys, vec!["fork (2)", "mateIn2 (1)", "short (1)"]);

        let query = session.filter("fork (2)", ThemeMatch::Token);
        assert_eq!(query.token(), "fork");
        assert_eq!(query.len(), 2);

        let job = ExportJob {
            theme: query.token().to_string(),
            theme_match: ThemeMatch::Token,
            start_page: 0,
            page_size: 1,
            file_count: 2,
            filename_template: dir.path().join("forks").to_string_lossy().into_owned(),
        };
        let summary = session.run_export(&job, &mut NoProgress).unwrap();
        assert_eq!(summary.files_written, 2);
        assert!(dir.path().join("forks_part2.pgn").exists());
    }

    #[test]
    fn test_export_by_display_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("puzzles.csv");
        std::fs::write(&path, CSV).unwrap();

        let mut session = Session::new();
        session.load(&path, &mut NoProgress).unwrap();
        session.count_themes(&mut NoProgress);

        let job = ExportJob {
            theme: "mateIn2 (1)".to_string(),
            theme_match: ThemeMatch::Token,
            start_page: 0,
            page_size: 5,
            file_count: 1,
            filename_template: dir.path().join("mates").to_string_lossy().into_owned(),
        };
        let summary = session.run_export(&job, &mut NoProgress).unwrap();
        assert_eq!(summary.games_written, 1);
        let text = std::fs::read_to_string(dir.path().join("mates_part1.pgn")).unwrap();
        assert!(text.contains("[Event \"b\"]"));
    }

    #[test]
    fn test_failed_load_keeps_previous_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("puzzles.csv");
        std::fs::write(&path, CSV).unwrap();

        let mut session = Session::new();
        session.load(&path, &mut |_: f64| {}).unwrap();
        session.list_themes();

        let result = session.load(dir.path().join("missing.csv"), &mut |_: f64| {});
        assert!(matches!(result, Err(Error::FileNotFound(_))));
        assert_eq!(session.dataset().len(), 3);
        assert!(session.catalog().is_some());
    }

    #[test]
    fn test_install_resets_catalog() {
        let mut session = Session::new();
        session.list_themes();
        assert!(session.catalog().unwrap().is_empty());
        session.install(Arc::new(Dataset::default()));
        assert!(session.catalog().is_none());
    }
}
