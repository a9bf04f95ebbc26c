use zengin_byteio::ByteReader;

use crate::descriptor::ObjectDescriptor;
use crate::entry::BoundingBox;
use crate::error::{ArchiveError, ArchiveResult};
use crate::header::{ArchiveFormat, ArchiveHeader};

/// Common, encoding-agnostic operations over a tagged, self-describing
/// ZenGin archive body. Three physical encodings (ASCII, BINARY, BIN_SAFE)
/// implement this trait behind one logical reader.
pub trait ArchiveReader {
    fn read_object_begin(&mut self) -> ArchiveResult<Option<ObjectDescriptor>>;
    fn read_object_end(&mut self) -> ArchiveResult<bool>;
    fn skip_entry(&mut self) -> ArchiveResult<()>;

    fn read_string(&mut self) -> ArchiveResult<String>;
    fn read_int(&mut self) -> ArchiveResult<i32>;
    fn read_float(&mut self) -> ArchiveResult<f32>;
    fn read_byte(&mut self) -> ArchiveResult<u8>;
    fn read_word(&mut self) -> ArchiveResult<u16>;
    fn read_enum(&mut self) -> ArchiveResult<u32>;
    fn read_bool(&mut self) -> ArchiveResult<bool>;
    fn read_color(&mut self) -> ArchiveResult<[u8; 4]>;
    fn read_vec3(&mut self) -> ArchiveResult<[f32; 3]>;
    fn read_vec2(&mut self) -> ArchiveResult<[f32; 2]>;
    fn read_mat3x3(&mut self) -> ArchiveResult<[[f32; 3]; 3]>;
    fn read_bbox(&mut self) -> ArchiveResult<BoundingBox>;
    fn read_raw(&mut self) -> ArchiveResult<Vec<u8>>;

    /// `skip_object(false)` presumes the caller already consumed the
    /// object's opening via `read_object_begin` (the common case) and walks
    /// forward, counting nested begins/ends, until the matching close is
    /// seen — the nesting counter starts at one since one level is already
    /// open. `skip_object(true)` is for an object whose opening has not
    /// been read yet: the walk consumes it itself, so the counter starts
    /// at zero. Same nesting-counter algorithm for every encoding that
    /// supports [`ArchiveReader::skip_entry`]; the BINARY encoding overrides
    /// this with its own offset-stack shortcut instead.
    fn skip_object(&mut self, skip_current: bool) -> ArchiveResult<()> {
        let mut level: i32 = if skip_current { 0 } else { 1 };
        loop {
            if self.read_object_begin()?.is_some() {
                level += 1;
            } else if self.read_object_end()? {
                level -= 1;
            } else {
                self.skip_entry()?;
            }
            if level <= 0 {
                return Ok(());
            }
        }
    }
}

/// Parses the shared preamble and dispatches to the encoding-specific
/// reader named by its `format` field.
pub fn archive_open(bytes: impl Into<std::rc::Rc<[u8]>>) -> ArchiveResult<Box<dyn ArchiveReader>> {
    let bytes = bytes.into();
    let mut reader = ByteReader::new(bytes);
    let header = ArchiveHeader::parse(&mut reader)?;

    match header.format {
        ArchiveFormat::Ascii => Ok(Box::new(crate::ascii::AsciiArchiveReader::new(
            reader, header,
        )?)),
        ArchiveFormat::Binary => Ok(Box::new(crate::binary::BinaryArchiveReader::new(
            reader, header,
        )?)),
        ArchiveFormat::BinSafe => Ok(Box::new(crate::binsafe::BinSafeArchiveReader::new(
            reader, header,
        )?)),
    }
}

/// Parses the `objects N` line shared by the ASCII and BINARY preambles
/// (immediately after the common header's `END`, followed by a second
/// `END`), used by both of those readers' constructors.
pub(crate) fn read_objects_count_line(reader: &mut ByteReader) -> ArchiveResult<u32> {
    let line = reader.read_line(false)?;
    let count_str = line
        .strip_prefix("objects ")
        .ok_or_else(|| ArchiveError::MalformedHeader("missing 'objects N' field".to_string()))?;
    let count = count_str
        .trim()
        .parse::<u32>()
        .map_err(|_| ArchiveError::MalformedHeader(format!("bad objects count: {count_str}")))?;

    let end = reader.read_line(false)?;
    if end != "END" {
        return Err(ArchiveError::MalformedHeader(
            "missing second 'END' line".to_string(),
        ));
    }
    Ok(count)
}
