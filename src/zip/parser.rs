//! Low-level ZIP archive parser.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. Read the Central Directory to get metadata for all files
//! 3. For extraction, read each file's Local File Header and data
//!
//! Archives whose EOCD defers to ZIP64 records are rejected; the writer in
//! this crate never produces them.
//!
//! Only the tail of the archive is read to list its contents, which keeps
//! verification of a freshly written archive cheap.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

use super::structures::*;
use super::{Result, ZipError};

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser over any seekable reader.
///
/// Typically used through [`ZipExtractor`](super::ZipExtractor) rather than
/// directly.
pub struct ZipParser<R: Read + Seek> {
    /// The underlying data source
    reader: R,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: Read + Seek> ZipParser<R> {
    /// Create a new parser for the given reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader's length cannot be determined.
    pub fn new(mut reader: R) -> Result<Self> {
        let size = reader.seek(SeekFrom::End(0))?;
        Ok(Self { reader, size })
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.reader.read_exact(buf)?;
        Ok(())
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Handles both the simple case (no comment) and archives with comments
    /// by searching backwards for the signature.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in file).
    ///
    /// # Errors
    ///
    /// Returns an error if no valid EOCD can be found, indicating the file
    /// is not a valid ZIP archive.
    pub fn find_eocd(&mut self) -> Result<(EndOfCentralDirectory, u64)> {
        if self.size < EndOfCentralDirectory::SIZE as u64 {
            return Err(ZipError::Format("file too small to be a ZIP archive".into()));
        }

        // Common case: no archive comment.
        let offset = self.size - EndOfCentralDirectory::SIZE as u64;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.read_at(offset, &mut buf)?;

        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            return Ok((eocd, offset));
        }

        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.read_at(search_start, &mut buf)?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // The comment length must account for every trailing byte.
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(ZipError::Format("end of central directory not found".into()))
    }

    /// List all entries from the Central Directory, in directory order.
    pub fn list_files(&mut self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, _) = self.find_eocd()?;

        if eocd.is_zip64() {
            return Err(ZipError::Format("ZIP64 archives are not supported".into()));
        }
        let cd_offset = eocd.cd_offset as u64;
        let cd_size = eocd.cd_size as u64;
        let total_entries = eocd.total_entries as u64;

        if cd_offset.saturating_add(cd_size) > self.size
            || total_entries.saturating_mul(CDFH_MIN_SIZE as u64) > cd_size
        {
            return Err(ZipError::Format(
                "central directory extends past end of file".into(),
            ));
        }

        let mut cd_data = vec![0u8; cd_size as usize];
        self.read_at(cd_offset, &mut cd_data)?;

        let mut entries = Vec::with_capacity(total_entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for _ in 0..total_entries {
            entries.push(Self::parse_cdfh(&mut cursor)?);
        }

        Ok(entries)
    }

    /// Parse a Central Directory File Header from a cursor.
    fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            return Err(ZipError::Format(
                "invalid central directory file header".into(),
            ));
        }

        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut file_name_bytes)?;
        let file_name = String::from_utf8_lossy(&file_name_bytes).to_string();

        let is_directory = file_name.ends_with('/');

        let skip = extra_field_length as u64 + file_comment_length as u64;
        cursor.set_position(cursor.position() + skip);

        Ok(ZipFileEntry {
            file_name,
            flags,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
            last_mod_time,
            last_mod_date,
            is_directory,
        })
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The Local File Header has variable-length fields that may differ from
    /// the Central Directory entry, so it is read to find where data begins.
    pub fn data_offset(&mut self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.read_at(entry.lfh_offset, &mut lfh_buf)?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(ZipError::Format(format!(
                "invalid local file header for {}",
                entry.file_name
            )));
        }

        let mut cursor = Cursor::new(&lfh_buf);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        Ok(entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
    }

    /// Position the reader at `offset` and hand it out for streaming.
    pub fn reader_at(&mut self, offset: u64) -> Result<&mut R> {
        self.reader.seek(SeekFrom::Start(offset))?;
        Ok(&mut self.reader)
    }
}
