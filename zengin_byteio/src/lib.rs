pub mod error;
pub mod reader;

pub use error::{ByteIoError, ByteIoResult};
pub use reader::ByteReader;
