//! ZIP archive reading and writing.
//!
//! ## Architecture
//!
//! - `structures`: ZIP format records (EOCD, file headers) and their
//!   byte-level encoding
//! - `parser`: low-level parsing of the central directory from a seekable
//!   reader
//! - `extractor`: reads entry contents back, used to verify written archives
//! - `writer`: [`ZipPacker`], a streaming writer that never seeks
//!
//! ## Supported Features
//!
//! - Reading standard ZIP archives, STORED and DEFLATE entries
//! - Writing standard ZIP with data descriptors, STORED or DEFLATE per entry
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No ZIP64, in either direction

mod extractor;
mod parser;
mod structures;
mod writer;

pub use extractor::ZipExtractor;
pub use parser::ZipParser;
pub use structures::*;
pub use writer::{ZipPacker, method_for};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZipError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid ZIP archive: {0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, ZipError>;
