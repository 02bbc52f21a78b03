//! Main entry point for the cbr2cbz CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use cbr2cbz::{Batch, CancelFlag, Cli, Command, ConvertArgs, LocalFs, Reporter, UnrarCodec};

/// Duplicates the report to the terminal and the log file.
struct Tee {
    stdout: io::Stdout,
    log: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.log.write_all(buf)?;
        self.stdout.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.log.flush()?;
        self.stdout.flush()
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Convert(args) => convert(args).await,
    }
}

async fn convert(args: ConvertArgs) -> Result<ExitCode> {
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.log_file)
        .with_context(|| format!("unable to open log file {}", args.log_file.display()))?;
    let sink: Box<dyn Write + Send> = if args.quiet {
        Box::new(log)
    } else {
        Box::new(Tee {
            stdout: io::stdout(),
            log,
        })
    };
    let mut reporter = Reporter::new(sink).with_log_file(&args.log_file);

    // Ctrl-C stops the batch after the archive being converted
    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping after the current archive");
            on_interrupt.cancel();
        }
    });

    let options = args.batch_options();
    let paths = args.paths.clone();
    let (result, reporter) = tokio::task::spawn_blocking(move || {
        let fs = LocalFs::new();
        let codec = UnrarCodec;
        let result = Batch::new(&fs, &codec, cancel)
            .with_options(options)
            .run(&paths, &mut reporter);
        (result, reporter)
    })
    .await
    .context("conversion task failed")?;

    reporter.finish().context("unable to write report")?;
    let outcome = result?;

    if outcome.skipped > 0 {
        return Ok(ExitCode::from(130));
    }
    if args.fail_on_error && !outcome.failures.is_empty() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
