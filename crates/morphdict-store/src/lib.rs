//! Memory-mapped dictionary and inflection-pattern storage engine.
//!
//! A dictionary file is produced offline by [`builder::DictionaryBuilder`]
//! and mapped read-only at runtime by [`dictionary::DictionaryStore`]. All
//! lookups run directly against the mapped bytes; nothing is decoded up front
//! beyond the fixed-size section headers.
//!
//! # Architecture
//!
//! - [`format`] -- Header parsing and validation
//! - [`region`] -- Mapped byte region and sequential section reader
//! - [`array`] -- Typed, bounds-checked views of Pod arrays
//! - [`packed`] -- Bit-packed integer arrays
//! - [`charset`] -- Byte encodings used for trie keys
//! - [`string_table`] -- String/identifier tables (trie or flat array)
//! - [`dictionary`] -- Word to grammeme mask and property lookups
//! - [`inflection`] -- Inflection patterns, inflect and lemmatize
//! - [`iter`] -- Iteration over all dictionary words
//! - [`builder`] -- Offline dictionary compiler
//! - [`registry`] -- Per-language dictionary cache

use std::io;
use std::path::PathBuf;

pub mod array;
pub mod builder;
pub mod charset;
pub mod dictionary;
mod flat;
pub mod format;
pub mod inflection;
pub mod iter;
pub mod packed;
pub mod region;
pub mod registry;
pub mod string_table;
mod trie;

pub use builder::{BuilderOptions, DictionaryBuilder, DictionarySource};
pub use dictionary::DictionaryStore;
pub use inflection::{Inflection, InflectionPattern, InflectionPatternEngine};
pub use iter::DictionaryKeyIterator;
pub use registry::{DictionaryRegistry, RegistryConfig};
pub use string_table::StringTable;

/// Error type for dictionary loading, building and lookups.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Stream(#[from] io::Error),
    #[error("file too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("invalid magic marker in dictionary header")]
    InvalidMagic,
    #[error("incompatible {section} version {found}, expected {expected}")]
    IncompatibleVersion {
        section: &'static str,
        found: i64,
        expected: i64,
    },
    #[error("dictionary was built for a different architecture (endianness marker {marker:#06x})")]
    ForeignByteOrder { marker: i16 },
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no dictionary for language {language:?} (searched {} paths)", searched.len())]
    MissingResource {
        language: String,
        searched: Vec<PathBuf>,
    },
}

/// Coarse classification of [`StoreError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The file is missing, unreadable, truncated or not a dictionary.
    Io,
    /// The file is a dictionary, but for another format version or byte order.
    IncompatibleVersion,
    /// The data is internally inconsistent: a corrupted build artifact.
    IllegalState,
    /// A string or identifier is absent from a table.
    NotFound,
    /// Builder input was rejected.
    InvalidInput,
}

impl StoreError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. }
            | Self::Stream(_)
            | Self::TooShort { .. }
            | Self::InvalidMagic
            | Self::MissingResource { .. } => ErrorKind::Io,
            Self::IncompatibleVersion { .. } | Self::ForeignByteOrder { .. } => {
                ErrorKind::IncompatibleVersion
            }
            Self::IllegalState(_) => ErrorKind::IllegalState,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    pub(crate) fn illegal_state(msg: impl Into<String>) -> Self {
        Self::IllegalState(msg.into())
    }

    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Result alias with [`StoreError`] as the default error type.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Abort on data that passed load-time validation but is inconsistent.
///
/// The file format is versioned and trusted. A broken reference found during
/// traversal means the build artifact is corrupted, and no degraded answer is
/// better than stopping.
#[cold]
#[track_caller]
pub(crate) fn corrupted(what: &str) -> ! {
    panic!("corrupted dictionary data: {what}")
}
