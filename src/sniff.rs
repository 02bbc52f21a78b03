//! Content-based container detection.
//!
//! Comic archives are routinely mislabeled (ZIP files saved as `.cbr`), so the
//! extension is never trusted; only the leading magic bytes are.

use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

use crate::zip::{DD_SIGNATURE, EndOfCentralDirectory, LFH_SIGNATURE};

/// RAR 1.5 to 4.x marker block.
const RAR4_SIGNATURE: &[u8] = b"Rar!\x1a\x07\x00";
/// RAR 5.0 marker block.
const RAR5_SIGNATURE: &[u8] = b"Rar!\x1a\x07\x01\x00";

/// Containers that are recognized only to name them in rejections.
const OTHER_SIGNATURES: &[(&[u8], &str)] = &[
    (b"7z\xbc\xaf\x27\x1c", "7z"),
    (b"\xfd7zXZ\x00", "xz"),
    (b"\x1f\x8b", "gzip"),
    (b"BZh", "bzip2"),
    (b"%PDF", "pdf"),
];

/// Longest signature checked.
pub const HEADER_LEN: usize = 8;

/// Result of sniffing a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// RAR container, the conversion source.
    Rar,
    /// ZIP container, the conversion target.
    Zip,
    /// A known format that is neither source nor target.
    Other(&'static str),
    Unrecognized,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Rar => f.write_str("rar"),
            Format::Zip => f.write_str("zip"),
            Format::Other(name) => f.write_str(name),
            Format::Unrecognized => f.write_str("unrecognized"),
        }
    }
}

/// Classify a header buffer. Short buffers simply fail to match.
pub fn classify(header: &[u8]) -> Format {
    if header.starts_with(RAR5_SIGNATURE) || header.starts_with(RAR4_SIGNATURE) {
        return Format::Rar;
    }

    if header.starts_with(LFH_SIGNATURE)
        || header.starts_with(EndOfCentralDirectory::SIGNATURE)
        || header.starts_with(DD_SIGNATURE)
    {
        return Format::Zip;
    }

    OTHER_SIGNATURES
        .iter()
        .find(|(magic, _)| header.starts_with(magic))
        .map(|(_, name)| Format::Other(*name))
        .unwrap_or(Format::Unrecognized)
}

/// Read the first bytes of `reader` and classify them.
///
/// `hint` is the file the stream came from; it is only used for logging.
///
/// # Errors
///
/// Propagates I/O errors from the reader. Reaching end of stream early is
/// not an error: the content is then [`Format::Unrecognized`].
pub fn identify<R: Read + ?Sized>(hint: &Path, reader: &mut R) -> io::Result<Format> {
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;

    while filled < HEADER_LEN {
        match reader.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    let format = classify(&header[..filled]);
    debug!(path = %hint.display(), %format, header_len = filled, "identified container");
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sniff(data: &[u8]) -> Format {
        identify(Path::new("test.cbr"), &mut &data[..]).unwrap()
    }

    #[test]
    fn detects_both_rar_generations() {
        assert_eq!(sniff(b"Rar!\x1a\x07\x00\xcf\x90\x73"), Format::Rar);
        assert_eq!(sniff(b"Rar!\x1a\x07\x01\x00\x33\x92"), Format::Rar);
    }

    #[test]
    fn detects_zip_variants() {
        assert_eq!(sniff(b"PK\x03\x04\x14\x00\x08\x00"), Format::Zip);
        assert_eq!(sniff(b"PK\x05\x06\x00\x00\x00\x00"), Format::Zip);
        assert_eq!(sniff(b"PK\x07\x08PK\x03\x04"), Format::Zip);
    }

    #[test]
    fn ignores_truncated_signatures() {
        assert_eq!(sniff(b""), Format::Unrecognized);
        assert_eq!(sniff(b"Rar!\x1a"), Format::Unrecognized);
        assert_eq!(sniff(b"PK\x03"), Format::Unrecognized);
    }

    #[test]
    fn names_other_containers() {
        assert_eq!(sniff(b"7z\xbc\xaf\x27\x1c\x00\x04"), Format::Other("7z"));
        assert_eq!(sniff(b"%PDF-1.7\n"), Format::Other("pdf"));
        assert_eq!(sniff(b"just some text"), Format::Unrecognized);
    }

    #[test]
    fn propagates_read_errors() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("disk on fire"))
            }
        }

        let err = identify(Path::new("x.cbr"), &mut Broken).unwrap_err();
        assert_eq!(err.to_string(), "disk on fire");
    }

    #[test]
    fn reads_across_short_reads() {
        struct Trickle<'a>(&'a [u8]);
        impl Read for Trickle<'_> {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0.is_empty() || buf.is_empty() {
                    return Ok(0);
                }
                buf[0] = self.0[0];
                self.0 = &self.0[1..];
                Ok(1)
            }
        }

        let format = identify(Path::new("x.cbr"), &mut Trickle(b"Rar!\x1a\x07\x01\x00")).unwrap();
        assert_eq!(format, Format::Rar);
    }
}
