use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::batch::BatchOptions;

#[derive(Parser, Debug)]
#[command(name = "cbr2cbz")]
#[command(version)]
#[command(about = "Bulk convert CBR comic archives to CBZ", long_about = None)]
#[command(after_help = "Examples:\n  \
  cbr2cbz convert ~/Comics            convert every .cbr under ~/Comics\n  \
  cbr2cbz convert a.cbr b.cbr         convert two archives\n  \
  cbr2cbz convert --dry-run ~/Comics  list what would be converted\n\n\
  Converted sources are DELETED once their .cbz has been written and verified.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert .cbr files (or directories of them) to .cbz
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Files or directories to convert
    #[arg(value_name = "PATHS", required = true, num_args = 1..)]
    pub paths: Vec<PathBuf>,

    /// Append the run report to this file
    #[arg(
        long,
        value_name = "FILE",
        env = "CBR2CBZ_LOG_FILE",
        default_value = "cbr2cbz.log"
    )]
    pub log_file: PathBuf,

    /// Report what would be converted without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with a failure status if any archive could not be converted
    #[arg(long)]
    pub fail_on_error: bool,

    /// Quiet mode, the report only goes to the log file
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl ConvertArgs {
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            dry_run: self.dry_run,
        }
    }
}
