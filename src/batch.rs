//! Running conversions over a whole set of paths.

use chrono::Local;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::codec::RarCodec;
use crate::convert::{ConversionJob, Converter, Outcome};
use crate::discovery::{classify, discover};
use crate::error::{ConvertError, SetupError};
use crate::io::{FileSystem, normalize};
use crate::report::Reporter;

/// Failed conversions keyed by source path.
pub type FailureMap = BTreeMap<PathBuf, ConvertError>;

/// Shared stop request, checked between conversions.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Totals for a finished (or cancelled) batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Destinations written, in conversion order.
    pub converted: Vec<PathBuf>,
    pub transcoded: usize,
    pub renamed: usize,
    pub failures: FailureMap,
    /// Candidates never attempted because the batch was cancelled.
    pub skipped: usize,
    pub elapsed: Duration,
}

impl BatchOutcome {
    /// True if every candidate was converted.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0
    }

    fn record(&mut self, job: &ConversionJob, outcome: Outcome) {
        self.converted.push(job.destination.clone());
        match outcome {
            Outcome::Renamed => self.renamed += 1,
            Outcome::Transcoded { .. } => self.transcoded += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Report what would be converted without touching anything.
    pub dry_run: bool,
}

/// One candidate's place in a batch.
#[derive(Debug)]
pub enum Planned {
    Convert(ConversionJob),
    /// An earlier source already claimed this destination.
    Conflict(ConversionJob, ConvertError),
}

/// Pair every candidate with its destination, keeping candidate order.
///
/// The first source to claim a destination wins; later sources that map to
/// the same destination come back as [`ConvertError::DestinationConflict`].
pub fn plan(candidates: &[PathBuf]) -> Vec<Planned> {
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();

    candidates
        .iter()
        .map(|source| {
            let job = ConversionJob::new(source.clone());
            let key = normalize(&job.destination);
            match claimed.get(&key) {
                Some(other) => {
                    let err = ConvertError::DestinationConflict {
                        path: job.destination.clone(),
                        other: other.clone(),
                    };
                    Planned::Conflict(job, err)
                }
                None => {
                    claimed.insert(key, job.source.clone());
                    Planned::Convert(job)
                }
            }
        })
        .collect()
}

/// Drives a [`Converter`] over a batch, isolating per-item failures.
pub struct Batch<'a> {
    fs: &'a dyn FileSystem,
    converter: Converter<'a>,
    cancel: CancelFlag,
    options: BatchOptions,
}

impl<'a> Batch<'a> {
    pub fn new(fs: &'a dyn FileSystem, codec: &'a dyn RarCodec, cancel: CancelFlag) -> Self {
        Self {
            fs,
            converter: Converter::new(fs, codec),
            cancel,
            options: BatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Discover, classify and convert everything under `roots`.
    ///
    /// # Errors
    ///
    /// Only setup failures are returned; nothing has been modified when they
    /// are. Per-item failures end up in [`BatchOutcome::failures`].
    pub fn run<W: Write>(
        &self,
        roots: &[PathBuf],
        reporter: &mut Reporter<W>,
    ) -> Result<BatchOutcome, SetupError> {
        let started = Instant::now();

        let items = discover(self.fs, roots)?;
        let classified = classify(self.fs, &items)?;
        info!(
            files = classified.stats.total.count,
            candidates = classified.candidates.len(),
            "discovery finished"
        );

        reporter.header(Local::now().fixed_offset(), &classified.stats);
        let mut outcome = self.convert_all(&classified.candidates, reporter);
        outcome.elapsed = started.elapsed();
        reporter.summary(&outcome);

        Ok(outcome)
    }

    /// Convert `candidates` in order and collect the results.
    pub fn convert_all<W: Write>(
        &self,
        candidates: &[PathBuf],
        reporter: &mut Reporter<W>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let steps = plan(candidates);
        let total = steps.len();

        for (done, step) in steps.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                outcome.skipped = total - done;
                warn!(skipped = outcome.skipped, "batch cancelled");
                break;
            }

            let job = match step {
                Planned::Convert(job) => job,
                Planned::Conflict(job, err) => {
                    reporter.failed(&job, &err);
                    outcome.failures.insert(job.source, err);
                    continue;
                }
            };

            if self.options.dry_run {
                reporter.planned(&job);
                continue;
            }

            reporter.converting(&job);
            match self.converter.convert(&job) {
                Ok(result) => {
                    reporter.converted(&job, result);
                    outcome.record(&job, result);
                }
                Err(err) => {
                    warn!(source = %job.source.display(), error = %err, "conversion failed");
                    reporter.failed(&job, &err);
                    outcome.failures.insert(job.source, err);
                }
            }
        }

        outcome
    }
}
