//! A stand-in RAR codec for tests.
//!
//! Archives are the RAR 4 marker followed by one line per item:
//!
//! - `name=content` is a file
//! - `name/` is a directory
//! - `!` makes streaming fail once reached
//! - `?` makes listing fail
//! - `#` as the first line makes opening fail
//!
//! [`stored_rar4`] builds genuine archives for the `unrar`-backed codec.

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Read};
use std::path::Path;

use super::{ArchiveEntry, RarCodec, SourceArchive, entry_name};
use crate::io::FileSystem;
use crate::zip::DOS_EPOCH;

pub const MARKER: &[u8] = b"Rar!\x1a\x07\x00";

/// Build archive bytes from manifest lines.
pub fn rar(lines: &[&str]) -> Vec<u8> {
    let mut data = MARKER.to_vec();
    data.extend_from_slice(lines.join("\n").as_bytes());
    data
}

/// 2024-03-01 12:00:00 in MS-DOS format, stamped on every [`stored_rar4`] entry.
pub const RAR_TIME: u32 = ((44 << 9 | 3 << 5 | 1) << 16) | 12 << 11;

/// A RAR 1.5-4.x block: CRC16 of the rest, type, flags, size, then `fields`.
fn rar4_block(head_type: u8, flags: u16, fields: &[u8]) -> Vec<u8> {
    let mut head = vec![head_type];
    head.write_u16::<LittleEndian>(flags).unwrap();
    head.write_u16::<LittleEndian>((7 + fields.len()) as u16)
        .unwrap();
    head.extend_from_slice(fields);

    let mut block = Vec::new();
    block
        .write_u16::<LittleEndian>(crc32fast::hash(&head) as u16)
        .unwrap();
    block.extend_from_slice(&head);
    block
}

/// Build an uncompressed RAR 4 archive. Names ending in `/` are directories.
pub fn stored_rar4(items: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = MARKER.to_vec();
    out.extend(rar4_block(0x73, 0, &[0; 6]));

    for (name, data) in items {
        let (name, is_dir) = match name.strip_suffix('/') {
            Some(dir) => (dir, true),
            None => (*name, false),
        };

        let mut fields = Vec::new();
        fields.write_u32::<LittleEndian>(data.len() as u32).unwrap(); // packed
        fields.write_u32::<LittleEndian>(data.len() as u32).unwrap(); // unpacked
        fields.push(3); // unix host
        fields.write_u32::<LittleEndian>(crc32fast::hash(data)).unwrap();
        fields.write_u32::<LittleEndian>(RAR_TIME).unwrap();
        fields.push(20); // version needed to extract
        fields.push(0x30); // store
        fields.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        let mode = if is_dir { 0o40755 } else { 0o100644 };
        fields.write_u32::<LittleEndian>(mode).unwrap();
        fields.extend_from_slice(name.as_bytes());

        // 0x8000: data follows the header; 0x00E0: directory window bits.
        let flags = if is_dir { 0x80E0 } else { 0x8000 };
        out.extend(rar4_block(0x74, flags, &fields));
        out.extend_from_slice(data);
    }

    out.extend(rar4_block(0x7B, 0x4000, &[]));
    out
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestCodec;

enum Line {
    File(ArchiveEntry, Vec<u8>),
    Dir,
    Broken,
    Unlistable,
}

struct ManifestArchive {
    lines: Vec<Line>,
}

impl RarCodec for ManifestCodec {
    fn open<'a>(
        &self,
        fs: &'a dyn FileSystem,
        path: &Path,
    ) -> io::Result<Box<dyn SourceArchive + 'a>> {
        let mut data = Vec::new();
        fs.open(path)?.read_to_end(&mut data)?;
        let body = data
            .strip_prefix(MARKER)
            .ok_or_else(|| io::Error::other("missing rar marker"))?;
        let text = String::from_utf8(body.to_vec()).map_err(io::Error::other)?;
        if text.starts_with('#') {
            return Err(io::Error::other("corrupt archive header"));
        }

        let lines = text
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| match l {
                "!" => Line::Broken,
                "?" => Line::Unlistable,
                dir if dir.ends_with('/') => Line::Dir,
                file => {
                    let (name, content) = file.split_once('=').unwrap_or((file, ""));
                    let entry = ArchiveEntry {
                        name: entry_name(name),
                        size: content.len() as u64,
                        dos_datetime: DOS_EPOCH,
                    };
                    Line::File(entry, content.as_bytes().to_vec())
                }
            })
            .collect();

        Ok(Box::new(ManifestArchive { lines }))
    }
}

impl SourceArchive for ManifestArchive {
    fn entries(&mut self) -> io::Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::new();
        for line in &self.lines {
            match line {
                Line::File(entry, _) => entries.push(entry.clone()),
                Line::Unlistable => return Err(io::Error::other("bad header")),
                Line::Dir | Line::Broken => {}
            }
        }
        Ok(entries)
    }

    fn stream(
        &mut self,
        visit: &mut dyn FnMut(&ArchiveEntry, &mut dyn Read) -> io::Result<()>,
    ) -> io::Result<()> {
        for line in &self.lines {
            match line {
                Line::File(entry, content) => visit(entry, &mut content.as_slice())?,
                Line::Broken => return Err(io::Error::other("checksum error")),
                Line::Dir | Line::Unlistable => {}
            }
        }
        Ok(())
    }
}
