//! Streaming ZIP writer.
//!
//! Entries are written in a single forward pass: each local header carries
//! [`FLAG_DATA_DESCRIPTOR`] and the CRC and sizes follow the data, so the
//! sink never needs to seek. The central directory is written by
//! [`ZipPacker::finish`].

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::{self, Read, Write};

use super::structures::*;

/// Extensions whose contents are already compressed and are stored as-is.
const STORED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "avif", "jxl", "heic", "zip", "rar", "7z", "gz", "bz2",
    "xz", "zst",
];

/// Most entries a non-ZIP64 archive can hold; a count of 0xFFFF marks ZIP64.
pub const MAX_ENTRIES: usize = 0xFFFE;

/// Pick the compression method for an entry from its name.
pub fn method_for(name: &str) -> CompressionMethod {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if STORED_EXTENSIONS.contains(&ext.as_str()) {
        CompressionMethod::Stored
    } else {
        CompressionMethod::Deflate
    }
}

struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct HashingReader<'a> {
    inner: &'a mut dyn Read,
    hasher: crc32fast::Hasher,
    count: u64,
}

impl Read for HashingReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }
}

/// Writes ZIP archives entry by entry into any [`Write`] sink.
pub struct ZipPacker<W: Write> {
    out: CountingWriter<W>,
    entries: Vec<ZipFileEntry>,
}

impl<W: Write> ZipPacker<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: CountingWriter { inner: out, count: 0 },
            entries: Vec::new(),
        }
    }

    /// Entries written so far, in order.
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// Stream one file entry into the archive.
    ///
    /// `dos_datetime` is `date << 16 | time` in MS-DOS format.
    pub fn add(&mut self, name: &str, dos_datetime: u32, data: &mut dyn Read) -> io::Result<()> {
        if self.entries.len() >= MAX_ENTRIES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("more than {} entries needs ZIP64, which is not written", MAX_ENTRIES),
            ));
        }

        let mut flags = FLAG_DATA_DESCRIPTOR;
        if !name.is_ascii() {
            flags |= FLAG_UTF8;
        }
        let (last_mod_time, last_mod_date) = split_dos_datetime(dos_datetime);

        let mut entry = ZipFileEntry {
            file_name: name.to_string(),
            flags,
            compression_method: method_for(name),
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset: self.out.count,
            last_mod_time,
            last_mod_date,
            is_directory: false,
        };
        narrow(entry.lfh_offset)?;
        entry.write_local_header(&mut self.out)?;

        let start = self.out.count;
        let mut source = HashingReader {
            inner: data,
            hasher: crc32fast::Hasher::new(),
            count: 0,
        };

        match entry.compression_method {
            CompressionMethod::Deflate => {
                let mut encoder = DeflateEncoder::new(&mut self.out, Compression::default());
                io::copy(&mut source, &mut encoder)?;
                encoder.finish()?;
            }
            _ => {
                io::copy(&mut source, &mut self.out)?;
            }
        }

        entry.compressed_size = self.out.count - start;
        entry.uncompressed_size = source.count;
        entry.crc32 = source.hasher.finalize();
        entry.write_data_descriptor(&mut self.out)?;

        self.entries.push(entry);
        Ok(())
    }

    /// Write the central directory and flush the sink.
    pub fn finish(mut self) -> io::Result<W> {
        let cd_offset = self.out.count;
        for entry in &self.entries {
            entry.write_central_header(&mut self.out)?;
        }
        let cd_size = self.out.count - cd_offset;

        EndOfCentralDirectory::new(
            self.entries.len() as u16,
            narrow(cd_size)?,
            narrow(cd_offset)?,
        )
        .write_to(&mut self.out)?;

        self.out.flush()?;
        Ok(self.out.inner)
    }
}
