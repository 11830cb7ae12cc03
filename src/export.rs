//! Batch export of themed puzzle pages to PGN files.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    progress::{Progress, ProgressSink},
    puzzle::{Dataset, FilteredQuery, ThemeMatch},
};

/// Export `file_count` pages of `page_size` puzzles tagged `theme`, starting
/// at zero-indexed page `start_page`. Page `i` of the job is written to
/// `{filename_template}_part{i + 1}.pgn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportJob {
    pub theme: String,
    #[serde(default)]
    pub theme_match: ThemeMatch,
    #[serde(default)]
    pub start_page: usize,
    pub page_size: usize,
    pub file_count: usize,
    pub filename_template: String,
}

impl ExportJob {
    pub fn output_path(&self, part: usize) -> PathBuf {
        PathBuf::from(format!("{}_part{}.pgn", self.filename_template, part))
    }

    fn validate(&self) -> Result<()> {
        if self.filename_template.is_empty() {
            return Err(Error::EmptyFilename);
        }
        if self.page_size == 0 {
            return Err(Error::InvalidExportJob(
                "page size must be at least 1".to_string(),
            ));
        }
        if self.file_count == 0 {
            return Err(Error::InvalidExportJob(
                "file count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub files_written: usize,
    pub games_written: usize,
    pub paths: Vec<PathBuf>,
}

pub fn export(
    dataset: &Dataset,
    job: &ExportJob,
    on_progress: &mut dyn ProgressSink,
) -> Result<ExportSummary> {
    let mut progress = Progress::new("export", on_progress);
    job.validate()?;

    let query = FilteredQuery::new(dataset, &job.theme, job.theme_match);
    info!(
        "Exporting {} files of {} puzzles for theme {:?} from page {} ({} matching)",
        job.file_count,
        job.page_size,
        job.theme,
        job.start_page,
        query.len()
    );

    let mut summary = ExportSummary::default();
    for (i, page) in query
        .pages(job.start_page, job.page_size, job.file_count)
        .enumerate()
    {
        let path = job.output_path(i + 1);

        // Conversion runs in parallel; writing stays in row order so games
        // preceding a failing puzzle still land in the file.
        let games: Vec<Result<String>> = page
            .records()
            .par_iter()
            .map(|record| record.to_pgn())
            .collect();

        let mut writer = BufWriter::new(File::create(&path)?);
        for game in games {
            let game = game?;
            writer.write_all(game.as_bytes())?;
            writer.write_all(b"\n\n")?;
            summary.games_written += 1;
        }
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        info!("Wrote {} puzzles to {}", page.len(), path.display());
        summary.files_written += 1;
        summary.paths.push(path);
        progress.update_ratio(i as u64, job.file_count as u64);
    }

    debug!(
        "Export finished: {} files, {} games",
        summary.files_written, summary.games_written
    );
    progress.finish();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::{test_support::START_FEN, PuzzleRecord};
    use std::path::Path;

    fn puzzle(id: &str, moves: &str, themes: &str) -> PuzzleRecord {
        PuzzleRecord {
            id: id.to_string(),
            fen: START_FEN.to_string(),
            moves: moves.to_string(),
            themes: themes.to_string(),
        }
    }

    fn job(dir: &Path, start_page: usize, page_size: usize, file_count: usize) -> ExportJob {
        ExportJob {
            theme: "fork".to_string(),
            theme_match: ThemeMatch::Token,
            start_page,
            page_size,
            file_count,
            filename_template: dir.join("out").to_string_lossy().into_owned(),
        }
    }

    fn five_forks() -> Dataset {
        let mut records = Vec::new();
        for i in 0..5 {
            records.push(puzzle(&format!("f{}", i), "e2e4 e7e5", "fork short"));
            records.push(puzzle(&format!("o{}", i), "d2d4", "opening"));
        }
        Dataset::new(records)
    }

    fn games_in(path: &Path) -> Vec<String> {
        let text = std::fs::read_to_string(path).unwrap();
        text.lines()
            .filter_map(|l| l.strip_prefix("[Event \""))
            .map(|l| l.trim_end_matches("\"]").to_string())
            .collect()
    }

    #[test]
    fn test_export_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), 0, 2, 3);
        let mut seen = Vec::new();
        let summary = export(&five_forks(), &job, &mut |f: f64| seen.push(f)).unwrap();

        assert_eq!(summary.files_written, 3);
        assert_eq!(summary.games_written, 5);
        assert_eq!(games_in(&dir.path().join("out_part1.pgn")), vec!["f0", "f1"]);
        assert_eq!(games_in(&dir.path().join("out_part2.pgn")), vec!["f2", "f3"]);
        assert_eq!(games_in(&dir.path().join("out_part3.pgn")), vec!["f4"]);
        assert_eq!(seen, vec![0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0]);
    }

    #[test]
    fn test_games_are_separated_by_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        export(&five_forks(), &job(dir.path(), 0, 2, 1), &mut |_: f64| {}).unwrap();

        let text = std::fs::read_to_string(dir.path().join("out_part1.pgn")).unwrap();
        let games: Vec<_> = text.split("\n\n[Event").collect();
        assert_eq!(games.len(), 2);
        assert!(text.ends_with("1. e4 e5 *\n\n"));
        assert!(text.contains("1. e4 e5 *\n\n[Event \"f1\"]"));
    }

    #[test]
    fn test_start_page_offset_and_empty_tail() {
        let dir = tempfile::tempdir().unwrap();
        let summary = export(&five_forks(), &job(dir.path(), 2, 2, 3), &mut |_: f64| {}).unwrap();

        assert_eq!(summary.files_written, 3);
        assert_eq!(summary.games_written, 1);
        assert_eq!(games_in(&dir.path().join("out_part1.pgn")), vec!["f4"]);
        assert_eq!(std::fs::read_to_string(dir.path().join("out_part2.pgn")).unwrap(), "");
        assert!(dir.path().join("out_part3.pgn").exists());
    }

    #[test]
    fn test_empty_template_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(dir.path(), 0, 2, 3);
        job.filename_template = String::new();
        let mut seen = Vec::new();

        let result = export(&five_forks(), &job, &mut |f: f64| seen.push(f));
        assert!(matches!(result, Err(Error::EmptyFilename)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(seen, vec![1.0]);
    }

    #[test]
    fn test_blank_template_is_a_filename() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(dir.path(), 0, 2, 1);
        job.filename_template = dir.path().join("  ").to_string_lossy().into_owned();

        let summary = export(&five_forks(), &job, &mut |_: f64| {}).unwrap();
        assert_eq!(summary.files_written, 1);
        assert!(dir.path().join("  _part1.pgn").exists());
    }

    #[test]
    fn test_invalid_sizes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let zero_size = job(dir.path(), 0, 0, 1);
        let zero_files = job(dir.path(), 0, 1, 0);
        assert!(matches!(
            export(&five_forks(), &zero_size, &mut |_: f64| {}),
            Err(Error::InvalidExportJob(_))
        ));
        assert!(matches!(
            export(&five_forks(), &zero_files, &mut |_: f64| {}),
            Err(Error::InvalidExportJob(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_invalid_move_aborts_and_keeps_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::new(vec![
            puzzle("a", "e2e4", "fork"),
            puzzle("b", "g1f3", "fork"),
            puzzle("c", "e2e4", "fork"),
            puzzle("bad", "e2e5", "fork"),
            puzzle("d", "e2e4", "fork"),
        ]);
        let mut seen = Vec::new();
        let result = export(&dataset, &job(dir.path(), 0, 3, 3), &mut |f: f64| seen.push(f));

        assert!(matches!(result, Err(Error::InvalidMove { ref puzzle, .. }) if puzzle == "bad"));
        assert_eq!(games_in(&dir.path().join("out_part1.pgn")), vec!["a", "b", "c"]);
        assert!(games_in(&dir.path().join("out_part2.pgn")).is_empty());
        assert!(!dir.path().join("out_part3.pgn").exists());
        assert_eq!(seen, vec![0.0, 1.0]);
    }

    #[test]
    fn test_unwritable_destination_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(&dir.path().join("missing"), 0, 2, 1);
        let result = export(&five_forks(), &job, &mut |_: f64| {});
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_job_from_json() {
        let job: ExportJob = serde_json::from_str(
            r#"{"theme":"fork","page_size":50,"file_count":2,"filename_template":"forks"}"#,
        )
        .unwrap();
        assert_eq!(job.start_page, 0);
        assert_eq!(job.theme_match, ThemeMatch::Token);
        assert_eq!(job.output_path(2), PathBuf::from("forks_part2.pgn"));
    }
}
