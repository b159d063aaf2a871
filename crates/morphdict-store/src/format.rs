// Dictionary file header: magic, format version, byte-order marker.
//
// The header is validated in three sequential reads. A failed check stops
// the load immediately; later fields are never interpreted.

use std::io::Write;

use crate::region::{SectionReader, write_pod};
use crate::{Result, StoreError};

/// Magic bytes at offset 0 of every dictionary file.
pub const MAGIC_MARKER: [u8; 8] = *b"MORPHSD\0";

/// Version of the dictionary section layout.
pub const FORMAT_VERSION: i64 = 1;

/// Version of the optional inflection section layout.
pub const INFLECTION_SECTION_VERSION: i64 = 1;

/// Written in native byte order. A reader on a machine with the other byte
/// order sees `0x0100`.
pub const ENDIANNESS_MARKER: i16 = 1;

/// Size of the dictionary header in bytes: magic (8), version (8), marker (2).
pub const HEADER_SIZE: usize = 18;

/// Option bit: the file carries an inflection section.
pub const OPTION_HAS_INFLECTIONS: u16 = 0x0001;

/// Validate the dictionary header and advance past it.
pub fn parse_header(reader: &mut SectionReader<'_>) -> Result<()> {
    if reader.remaining() < HEADER_SIZE {
        return Err(StoreError::TooShort {
            expected: HEADER_SIZE,
            actual: reader.remaining(),
        });
    }

    let magic = reader.read_bytes(MAGIC_MARKER.len())?;
    if magic != MAGIC_MARKER {
        return Err(StoreError::InvalidMagic);
    }

    check_version(reader, "dictionary", FORMAT_VERSION)
}

/// Validate a section's version and byte-order marker.
pub fn check_version(
    reader: &mut SectionReader<'_>,
    section: &'static str,
    expected: i64,
) -> Result<()> {
    let found: i64 = reader.read()?;
    if found != expected {
        return Err(StoreError::IncompatibleVersion {
            section,
            found,
            expected,
        });
    }

    let marker: i16 = reader.read()?;
    if marker != ENDIANNESS_MARKER {
        return Err(StoreError::ForeignByteOrder { marker });
    }
    Ok(())
}

pub fn write_header<W: Write + ?Sized>(w: &mut W) -> std::io::Result<()> {
    w.write_all(&MAGIC_MARKER)?;
    write_version(w, FORMAT_VERSION)
}

pub fn write_version<W: Write + ?Sized>(w: &mut W, version: i64) -> std::io::Result<()> {
    write_pod(w, &version)?;
    write_pod(w, &ENDIANNESS_MARKER)
}
