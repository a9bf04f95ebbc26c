use thiserror::Error;

/// Errors raised while reading typed values out of a [`crate::ByteReader`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ByteIoError {
    #[error("unexpected end of buffer: wanted {wanted} byte(s) at offset {offset}, {available} available")]
    UnexpectedEof {
        offset: usize,
        wanted: usize,
        available: usize,
    },

    #[error("seek out of range: offset {offset} exceeds limit {limit}")]
    SeekOutOfRange { offset: usize, limit: usize },
}

pub type ByteIoResult<T> = Result<T, ByteIoError>;
