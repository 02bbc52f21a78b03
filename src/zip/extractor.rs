use flate2::read::DeflateDecoder;
use std::io::{Read, Seek};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};
use super::{Result, ZipError};

/// ZIP file extractor
pub struct ZipExtractor<R: Read + Seek> {
    parser: ZipParser<R>,
}

impl<R: Read + Seek> ZipExtractor<R> {
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            parser: ZipParser::new(reader)?,
        })
    }

    /// List all files in the archive
    pub fn list_files(&mut self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files()
    }

    /// Extract file data to memory, checking its CRC
    pub fn extract_to_memory(&mut self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let data_offset = self.parser.data_offset(entry)?;
        let raw = self
            .parser
            .reader_at(data_offset)?
            .take(entry.compressed_size);

        let mut data = Vec::with_capacity(entry.uncompressed_size as usize);
        match entry.compression_method {
            CompressionMethod::Stored => {
                let mut raw = raw;
                raw.read_to_end(&mut data)?;
            }
            CompressionMethod::Deflate => {
                DeflateDecoder::new(raw).read_to_end(&mut data)?;
            }
            CompressionMethod::Unknown(method) => {
                return Err(ZipError::Format(format!(
                    "unsupported compression method {} for {}",
                    method, entry.file_name
                )));
            }
        }

        if data.len() as u64 != entry.uncompressed_size {
            return Err(ZipError::Format(format!(
                "{}: expected {} bytes, got {}",
                entry.file_name,
                entry.uncompressed_size,
                data.len()
            )));
        }
        if crc32fast::hash(&data) != entry.crc32 {
            return Err(ZipError::Format(format!(
                "{}: CRC mismatch",
                entry.file_name
            )));
        }

        Ok(data)
    }
}
