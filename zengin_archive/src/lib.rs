pub mod ascii;
pub mod binary;
pub mod binsafe;
mod descriptor;
mod entry;
mod error;
mod header;
mod reader;

pub use ascii::AsciiArchiveReader;
pub use binary::BinaryArchiveReader;
pub use binsafe::BinSafeArchiveReader;
pub use descriptor::ObjectDescriptor;
pub use entry::{BoundingBox, EntryType};
pub use error::{ArchiveError, ArchiveResult};
pub use header::{ArchiveFormat, ArchiveHeader};
pub use reader::{archive_open, ArchiveReader};
