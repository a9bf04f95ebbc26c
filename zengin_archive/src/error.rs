use thiserror::Error;

use crate::entry::EntryType;

/// Errors raised while parsing an archive preamble or reading typed entries
/// out of an [`crate::reader::ArchiveReader`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    #[error(transparent)]
    ByteIo(#[from] zengin_byteio::ByteIoError),

    #[error("not a ZenGin archive: {0}")]
    NotAnArchive(&'static str),

    #[error("malformed archive header: {0}")]
    MalformedHeader(String),

    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("entry type mismatch: expected {expected:?}, got {got:?}")]
    UnexpectedEntryType { expected: EntryType, got: EntryType },

    #[error("cannot skip a single entry in this encoding: {0}")]
    OperationUnsupported(&'static str),

    #[error("malformed entry: {0}")]
    MalformedEntry(String),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
