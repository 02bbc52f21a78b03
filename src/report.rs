//! Human-readable run report.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use crate::batch::BatchOutcome;
use crate::convert::{ConversionJob, Outcome};
use crate::discovery::{RunStats, Tally};
use crate::error::ConvertError;

/// Writes the run report to a line-oriented sink.
///
/// Write errors do not interrupt the run: the first one is kept and returned
/// by [`Reporter::finish`].
pub struct Reporter<W: Write> {
    out: W,
    log_file: Option<PathBuf>,
    error: Option<io::Error>,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            log_file: None,
            error: None,
        }
    }

    /// Mention `path` at the end of the summary as the log destination.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.out.write_fmt(args).and_then(|()| self.out.write_all(b"\n")) {
            self.error = Some(e);
        }
    }

    pub fn header(&mut self, started: DateTime<FixedOffset>, stats: &RunStats) {
        self.line(format_args!("CBR2CBZ Batch Log"));
        self.line(format_args!("Version {}", env!("CARGO_PKG_VERSION")));
        self.line(format_args!("{}", env!("CARGO_PKG_REPOSITORY")));
        self.line(format_args!(
            "Batch Start Date & Time: {}",
            started.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
        self.line(format_args!(""));
        self.line(format_args!(
            "Considering {} files ({})",
            stats.total.count,
            format_size(stats.total.bytes)
        ));
        self.line(format_args!("   of which..."));
        self.tally("CBZ files", stats.converted);
        self.tally("CBR files", stats.candidates);
        let others = stats.others();
        if others.count > 0 {
            self.tally("Other files", others);
        }
    }

    fn tally(&mut self, label: &str, tally: Tally) {
        self.line(format_args!(
            "{}: {} ({})",
            label,
            tally.count,
            format_size(tally.bytes)
        ));
    }

    /// A conversion that a dry run would perform.
    pub fn planned(&mut self, job: &ConversionJob) {
        self.line(format_args!(
            "Would convert: {} -> {}",
            job.source.display(),
            job.destination.display()
        ));
    }

    pub fn converting(&mut self, job: &ConversionJob) {
        self.line(format_args!(
            "Converting: {} to {}",
            job.source.display(),
            job.destination.display()
        ));
    }

    pub fn converted(&mut self, job: &ConversionJob, outcome: Outcome) {
        match outcome {
            Outcome::Renamed => self.line(format_args!(
                "Renamed {} to {} (already a zip archive)",
                job.source.display(),
                job.destination.display()
            )),
            Outcome::Transcoded { .. } => self.line(format_args!(
                "Successfully Converted {} to {}...",
                job.source.display(),
                job.destination.display()
            )),
        }
    }

    pub fn failed(&mut self, job: &ConversionJob, error: &ConvertError) {
        self.line(format_args!(
            "Error converting {} - Skipping: {}",
            job.source.display(),
            error
        ));
    }

    pub fn summary(&mut self, outcome: &BatchOutcome) {
        self.line(format_args!(""));
        self.line(format_args!(
            "Converted: {} ({} repacked, {} renamed)",
            outcome.transcoded + outcome.renamed,
            outcome.transcoded,
            outcome.renamed
        ));

        self.line(format_args!("Failed files:"));
        for (path, error) in &outcome.failures {
            self.line(format_args!("\t{}\t{}", path.display(), error));
        }
        if outcome.failures.is_empty() {
            self.line(format_args!("  none"));
        }

        if outcome.skipped > 0 {
            self.line(format_args!(
                "Cancelled: {} files were not attempted",
                outcome.skipped
            ));
        }

        self.line(format_args!("Runtime: {}", format_elapsed(outcome.elapsed)));

        if let Some(log_file) = self.log_file.clone() {
            self.line(format_args!(
                "A log file has been written to {}",
                log_file.display()
            ));
        }
    }

    /// Flush the sink and return it, or the first write error.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Format a byte size using binary units.
///
/// # Examples
///
/// ```
/// use cbr2cbz::report::format_size;
///
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(1048576), "1.00 MB");
/// ```
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if size >= TB {
        format!("{:.2} TB", size as f64 / TB as f64)
    } else if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

fn unit(value: u64, name: &str) -> String {
    if value == 1 {
        format!("1 {}", name)
    } else {
        format!("{} {}s", value, name)
    }
}

/// Format a duration from its largest non-zero unit down to seconds.
///
/// `42 seconds`, `3 minutes 5 seconds`, `1 day 0 hours 2 minutes 1 second`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let parts = [
        (total / 86_400, "day"),
        (total / 3_600 % 24, "hour"),
        (total / 60 % 60, "minute"),
        (total % 60, "second"),
    ];

    let first = parts
        .iter()
        .position(|(value, _)| *value > 0)
        .unwrap_or(parts.len() - 1);

    parts[first..]
        .iter()
        .map(|(value, name)| unit(*value, name))
        .collect::<Vec<_>>()
        .join(" ")
}
