//! Progress reporting for long-running operations.
//!
//! Loading, theme counting and exporting all report a fraction in `[0, 1]`
//! through a caller supplied callback. [`Progress`] wraps that callback and
//! guarantees the stream of values is monotonic and terminates with exactly
//! one `1.0`, including when the operation bails out early with `?`.

use log::{debug, info};

/// Synchronous progress sink invoked by the core operations.
pub trait ProgressSink {
    fn report(&mut self, fraction: f64);
}

impl<F> ProgressSink for F
where
    F: FnMut(f64),
{
    fn report(&mut self, fraction: f64) {
        self(fraction)
    }
}

/// Sink that discards every update.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _fraction: f64) {}
}

pub struct Progress<'a> {
    id: &'static str,
    sink: &'a mut dyn ProgressSink,
    last: f64,
    finished: bool,
}

impl<'a> Progress<'a> {
    pub fn new(id: &'static str, sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            id,
            sink,
            last: 0.0,
            finished: false,
        }
    }

    /// Report `fraction` unless it would move progress backwards.
    /// Values at or above `1.0` are held back for [`Progress::finish`].
    pub fn update(&mut self, fraction: f64) {
        if self.finished || fraction.is_nan() {
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction < self.last || fraction >= 1.0 {
            return;
        }
        self.last = fraction;
        debug!("Progress update for {}: {:.1}%", self.id, fraction * 100.0);
        self.sink.report(fraction);
    }

    /// Report a `done / total` ratio. An empty total counts as complete work
    /// and is left for [`Progress::finish`].
    pub fn update_ratio(&mut self, done: u64, total: u64) {
        if total > 0 {
            self.update(done as f64 / total as f64);
        }
    }

    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.last = 1.0;
        info!("Final progress update for {}: 100%", self.id);
        self.sink.report(1.0);
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for Progress<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}
