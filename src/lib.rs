//! # cbr2cbz
//!
//! Bulk conversion of CBR (RAR) comic archives into CBZ (ZIP) archives.
//!
//! Given files or directories, the library finds every `.cbr`, looks at what
//! each one really contains and then:
//!
//! - renames it to `.cbz` if it is already a ZIP,
//! - repacks it into a new `.cbz` if it is a RAR, deleting the source only
//!   after the new archive has been written and verified,
//! - leaves it alone and reports an error otherwise.
//!
//! One bad archive never stops the batch. All file access goes through
//! [`FileSystem`], so the whole pipeline can run against [`MemoryFs`].
//!
//! ## Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use cbr2cbz::{Batch, CancelFlag, LocalFs, Reporter, UnrarCodec};
//!
//! fn main() -> anyhow::Result<()> {
//!     let fs = LocalFs::new();
//!     let mut reporter = Reporter::new(std::io::stdout());
//!
//!     let outcome = Batch::new(&fs, &UnrarCodec, CancelFlag::new())
//!         .run(&[PathBuf::from("Comics")], &mut reporter)?;
//!     reporter.finish()?;
//!
//!     for (path, error) in &outcome.failures {
//!         eprintln!("{}: {}", path.display(), error);
//!     }
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cli;
pub mod codec;
pub mod convert;
pub mod discovery;
pub mod error;
pub mod io;
pub mod report;
pub mod sniff;
pub mod zip;

pub use batch::{Batch, BatchOptions, BatchOutcome, CancelFlag, FailureMap, Planned};
pub use cli::{Cli, Command, ConvertArgs};
pub use codec::{ArchiveEntry, RarCodec, SourceArchive, UnrarCodec};
pub use convert::{ConversionJob, Converter, Outcome};
pub use error::{ConvertError, SetupError};
pub use io::{FileStat, FileSystem, LocalFs, MemoryFs};
pub use report::Reporter;
pub use sniff::Format;
