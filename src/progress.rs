//! Progress reporting and cooperative cancellation.
//!
//! Observers only ever see updates; nothing they do can feed back into the
//! geometry, so results are identical with or without one attached.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use derive_more::Display;

/// Coarse pipeline stage an update belongs to.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    #[display("validating configuration")]
    Validate,
    #[display("building spatial index")]
    Index,
    #[display("rainfall cast")]
    RainfallCast,
    #[display("forming top layer")]
    QuadForming,
    #[display("normal cast")]
    NormalCast,
    #[display("building color tables")]
    ColorTables,
    #[display("finished")]
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Completion in `0..=100`, never decreasing within a run.
    pub percent: u8,
    pub stage: Stage,
    pub message: String,
}

/// Receives progress updates. Must return quickly; it is called from worker threads.
pub trait ProgressObserver: Sync {
    fn report(&self, update: ProgressUpdate);
}

impl<F> ProgressObserver for F
where
    F: Fn(ProgressUpdate) + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        self(update)
    }
}

/// Observer that drops every update.
pub struct Silent;

impl ProgressObserver for Silent {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Milestones reported along a run.
pub mod milestone {
    pub const INDEX_BUILD: u8 = 41;
    pub const GRID_CAST_START: u8 = 42;
    pub const GRID_CAST_MIDPOINT: u8 = 53;
    pub const QUAD_FORMING: u8 = 64;
    pub const QUADS_DONE: u8 = 80;
    pub const NORMAL_CAST_SETUP: u8 = 81;
    pub const NORMAL_CAST_START: u8 = 82;
    pub const DONE: u8 = 100;
}

/// Wraps an observer and keeps reported percentages monotonic across threads.
pub struct Progress<'a> {
    observer: &'a dyn ProgressObserver,
    last: Mutex<u8>,
}

impl<'a> Progress<'a> {
    pub fn new(observer: &'a dyn ProgressObserver) -> Self {
        Self {
            observer,
            last: Mutex::new(0),
        }
    }

    /// Forwards the update unless a higher percentage was already reported.
    pub fn report(&self, percent: u8, stage: Stage, message: impl Into<String>) {
        let percent = percent.min(100);
        // Poisoning only means another observer call panicked; the counter is still valid.
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if percent < *last {
            return;
        }
        *last = percent;
        self.observer.report(ProgressUpdate {
            percent,
            stage,
            message: message.into(),
        });
    }

    pub fn last_percent(&self) -> u8 {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Shared flag a caller sets to abort a run between rays.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Terminal and intermediate status of a run as seen by consumers.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RunStatus {
    #[default]
    Queued,
    Running {
        percent: u8,
        stage: Stage,
    },
    Finished,
    Failed {
        stage: &'static str,
        message: String,
    },
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed { .. })
    }
}
