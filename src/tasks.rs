//! Background execution of the synchronous core operations.
//!
//! Each `spawn_*` function moves the work onto tokio's blocking pool and
//! returns a [`TaskHandle`]: a watch channel carrying the latest progress
//! fraction plus the awaitable result. The UI layer decides how often to look
//! at the channel.

use std::{path::PathBuf, sync::Arc};

use log::debug;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    error::Result,
    export::{self, ExportJob, ExportSummary},
    progress::ProgressSink,
    puzzle::{self, Dataset, LoaderOptions, ThemeCatalog},
};

pub struct TaskHandle<T> {
    progress: watch::Receiver<f64>,
    handle: JoinHandle<Result<T>>,
}

impl<T> TaskHandle<T> {
    /// A receiver that observes progress updates in `[0, 1]`.
    pub fn progress(&self) -> watch::Receiver<f64> {
        self.progress.clone()
    }

    pub fn current_progress(&self) -> f64 {
        *self.progress.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn join(self) -> Result<T> {
        self.handle.await?
    }
}

fn spawn<T, F>(name: &'static str, work: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn ProgressSink) -> Result<T> + Send + 'static,
{
    let (tx, rx) = watch::channel(0.0);
    let handle = tokio::task::spawn_blocking(move || {
        debug!("Starting background task {}", name);
        let mut sink = |fraction: f64| {
            // The receiver may already be gone; progress is best effort.
            let _ = tx.send(fraction);
        };
        work(&mut sink)
    });
    TaskHandle {
        progress: rx,
        handle,
    }
}

pub fn spawn_load(path: PathBuf, options: LoaderOptions) -> TaskHandle<Dataset> {
    spawn("load_dataset", move |sink| {
        puzzle::load_with_options(&path, &options, sink)
    })
}

pub fn spawn_count_themes(dataset: Arc<Dataset>) -> TaskHandle<ThemeCatalog> {
    spawn("count_themes", move |sink| {
        Ok(puzzle::count_themes(&dataset, sink))
    })
}

pub fn spawn_export(dataset: Arc<Dataset>, job: ExportJob) -> TaskHandle<ExportSummary> {
    spawn("export", move |sink| export::export(&dataset, &job, sink))
}
