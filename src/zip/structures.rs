use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Write};

use super::{Result, ZipError};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Version 2.0: DEFLATE, directories, data descriptors.
pub const VERSION_NEEDED: u16 = 20;

/// General purpose flag: sizes and CRC follow the data in a descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

/// General purpose flag: file name is UTF-8.
pub const FLAG_UTF8: u16 = 1 << 11;

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Single-disk record without comment.
    pub fn new(entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipError::Format("invalid end of central directory".into()));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(Self::SIGNATURE)?;
        w.write_u16::<LittleEndian>(self.disk_number)?;
        w.write_u16::<LittleEndian>(self.disk_with_cd)?;
        w.write_u16::<LittleEndian>(self.disk_entries)?;
        w.write_u16::<LittleEndian>(self.total_entries)?;
        w.write_u32::<LittleEndian>(self.cd_size)?;
        w.write_u32::<LittleEndian>(self.cd_offset)?;
        w.write_u16::<LittleEndian>(self.comment_len)
    }

    /// True if any field holds the marker that defers to a ZIP64 record.
    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Data descriptor - 16 bytes with the optional signature
pub const DD_SIGNATURE: &[u8] = b"PK\x07\x08";

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl ZipFileEntry {
    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Write the local file header that precedes this entry's data.
    ///
    /// With [`FLAG_DATA_DESCRIPTOR`] set, CRC and sizes are written as zero
    /// and carried by the descriptor instead.
    pub fn write_local_header<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let deferred = self.flags & FLAG_DATA_DESCRIPTOR != 0;
        let (crc, csize, usize_) = if deferred {
            (0, 0, 0)
        } else {
            (
                self.crc32,
                narrow(self.compressed_size)?,
                narrow(self.uncompressed_size)?,
            )
        };

        w.write_all(LFH_SIGNATURE)?;
        w.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        w.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        w.write_u16::<LittleEndian>(self.last_mod_time)?;
        w.write_u16::<LittleEndian>(self.last_mod_date)?;
        w.write_u32::<LittleEndian>(crc)?;
        w.write_u32::<LittleEndian>(csize)?;
        w.write_u32::<LittleEndian>(usize_)?;
        w.write_u16::<LittleEndian>(name_len(&self.file_name)?)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_all(self.file_name.as_bytes())
    }

    /// Write the data descriptor that follows this entry's data.
    pub fn write_data_descriptor<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(DD_SIGNATURE)?;
        w.write_u32::<LittleEndian>(self.crc32)?;
        w.write_u32::<LittleEndian>(narrow(self.compressed_size)?)?;
        w.write_u32::<LittleEndian>(narrow(self.uncompressed_size)?)
    }

    /// Write this entry's central directory record.
    pub fn write_central_header<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(CDFH_SIGNATURE)?;
        w.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        w.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        w.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        w.write_u16::<LittleEndian>(self.last_mod_time)?;
        w.write_u16::<LittleEndian>(self.last_mod_date)?;
        w.write_u32::<LittleEndian>(self.crc32)?;
        w.write_u32::<LittleEndian>(narrow(self.compressed_size)?)?;
        w.write_u32::<LittleEndian>(narrow(self.uncompressed_size)?)?;
        w.write_u16::<LittleEndian>(name_len(&self.file_name)?)?;
        w.write_u16::<LittleEndian>(0)?; // extra field length
        w.write_u16::<LittleEndian>(0)?; // comment length
        w.write_u16::<LittleEndian>(0)?; // disk number start
        w.write_u16::<LittleEndian>(0)?; // internal attributes
        w.write_u32::<LittleEndian>(0)?; // external attributes
        w.write_u32::<LittleEndian>(narrow(self.lfh_offset)?)?;
        w.write_all(self.file_name.as_bytes())
    }
}

/// Convert a 64-bit size or offset to its 32-bit field.
///
/// ZIP64 records are never written; values that need them are rejected.
pub(crate) fn narrow(value: u64) -> io::Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v != u32::MAX)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("value {} needs ZIP64, which is not written", value),
            )
        })
}

fn name_len(name: &str) -> io::Result<u16> {
    u16::try_from(name.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("entry name too long ({} bytes)", name.len()),
        )
    })
}

/// Split a DOS `date << 16 | time` value into `(time, date)`.
pub fn split_dos_datetime(value: u32) -> (u16, u16) {
    ((value & 0xFFFF) as u16, (value >> 16) as u16)
}

/// 1980-01-01 00:00:00, the earliest DOS timestamp.
pub const DOS_EPOCH: u32 = (1 << 5 | 1) << 16;
