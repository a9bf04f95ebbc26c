use zengin_byteio::ByteReader;

use crate::descriptor::ObjectDescriptor;
use crate::entry::BoundingBox;
use crate::error::{ArchiveError, ArchiveResult};
use crate::header::ArchiveHeader;
use crate::reader::{read_objects_count_line, ArchiveReader};

/// Objects are headed by a chunk size that includes itself; the reader keeps
/// a stack of "cursor position at which this object ends" offsets instead of
/// relying on any in-stream terminator, since the body has none.
pub struct BinaryArchiveReader {
    input: ByteReader,
    #[allow(dead_code)]
    header: ArchiveHeader,
    objects_remaining: u32,
    end_offsets: Vec<usize>,
}

impl BinaryArchiveReader {
    pub(crate) fn new(mut input: ByteReader, header: ArchiveHeader) -> ArchiveResult<Self> {
        let objects_remaining = read_objects_count_line(&mut input)?;
        Ok(BinaryArchiveReader {
            input,
            header,
            objects_remaining,
            end_offsets: Vec::new(),
        })
    }

    fn read_cstring(&mut self) -> ArchiveResult<String> {
        let mut bytes = Vec::new();
        loop {
            let b = self.input.read_u8()?;
            if b == 0 {
                break;
            }
            bytes.push(b);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl ArchiveReader for BinaryArchiveReader {
    fn read_object_begin(&mut self) -> ArchiveResult<Option<ObjectDescriptor>> {
        if let Some(&top) = self.end_offsets.last() {
            if self.input.position() >= top {
                return Ok(None);
            }
        }
        if self.input.remaining() < 4 {
            return Ok(None);
        }

        let start = self.input.position();
        let chunk_size = self.input.read_u32()? as usize;
        let version = self.input.read_u16()?;
        let index = self.input.read_u32()?;
        let object_name = self.read_cstring()?;
        let class_name = self.read_cstring()?;

        self.end_offsets.push(start + chunk_size);
        self.objects_remaining = self.objects_remaining.saturating_sub(1);

        Ok(Some(ObjectDescriptor {
            object_name,
            class_name,
            version,
            index,
        }))
    }

    fn read_object_end(&mut self) -> ArchiveResult<bool> {
        match self.end_offsets.last() {
            Some(&top) if self.input.position() >= top => {
                self.end_offsets.pop();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn skip_entry(&mut self) -> ArchiveResult<()> {
        Err(ArchiveError::OperationUnsupported(
            "binary archives are not self-delimiting at the entry level",
        ))
    }

    fn skip_object(&mut self, skip_current: bool) -> ArchiveResult<()> {
        if skip_current {
            if let Some(&top) = self.end_offsets.last() {
                self.input.seek(top)?;
                self.end_offsets.pop();
                return Ok(());
            }
            return Ok(());
        }

        let start = self.input.position();
        let chunk_size = self.input.read_u32()? as usize;
        self.input.seek(start + chunk_size)?;
        Ok(())
    }

    fn read_string(&mut self) -> ArchiveResult<String> {
        let len = self.input.read_u16()? as usize;
        self.input.read_string(len)
    }

    fn read_int(&mut self) -> ArchiveResult<i32> {
        Ok(self.input.read_i32()?)
    }

    fn read_float(&mut self) -> ArchiveResult<f32> {
        Ok(self.input.read_f32()?)
    }

    fn read_byte(&mut self) -> ArchiveResult<u8> {
        Ok(self.input.read_u8()?)
    }

    fn read_word(&mut self) -> ArchiveResult<u16> {
        Ok(self.input.read_u16()?)
    }

    fn read_enum(&mut self) -> ArchiveResult<u32> {
        Ok(self.input.read_u32()?)
    }

    fn read_bool(&mut self) -> ArchiveResult<bool> {
        Ok(self.input.read_u32()? != 0)
    }

    fn read_color(&mut self) -> ArchiveResult<[u8; 4]> {
        let bgra = self.input.read_bytes(4)?;
        Ok([bgra[2], bgra[1], bgra[0], bgra[3]])
    }

    fn read_vec3(&mut self) -> ArchiveResult<[f32; 3]> {
        Ok(self.input.read_vec3()?)
    }

    fn read_vec2(&mut self) -> ArchiveResult<[f32; 2]> {
        Ok(self.input.read_vec2()?)
    }

    fn read_mat3x3(&mut self) -> ArchiveResult<[[f32; 3]; 3]> {
        Ok(self.input.read_mat3x3()?)
    }

    fn read_bbox(&mut self) -> ArchiveResult<BoundingBox> {
        Ok(BoundingBox {
            min: self.input.read_vec3()?,
            max: self.input.read_vec3()?,
        })
    }

    fn read_raw(&mut self) -> ArchiveResult<Vec<u8>> {
        let len = self.input.read_u16()? as usize;
        Ok(self.input.read_bytes(len)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ArchiveFormat;

    fn object_chunk(version: u16, index: u32, name: &str, class: &str, body: &[u8]) -> Vec<u8> {
        let mut inner = Vec::new();
        inner.extend_from_slice(&version.to_le_bytes());
        inner.extend_from_slice(&index.to_le_bytes());
        inner.extend_from_slice(name.as_bytes());
        inner.push(0);
        inner.extend_from_slice(class.as_bytes());
        inner.push(0);
        inner.extend_from_slice(body);

        let chunk_size = (4 + inner.len()) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(&chunk_size.to_le_bytes());
        out.extend_from_slice(&inner);
        out
    }

    fn reader_for(body: &[u8]) -> BinaryArchiveReader {
        let mut full = b"ZenGin Archive\nver 1\nphoenix\nBINARY\nsaveGame 0\nEND\n".to_vec();
        full.extend_from_slice(body);
        let mut input = ByteReader::new(full);
        let header = crate::header::ArchiveHeader::parse(&mut input).unwrap();
        assert_eq!(header.format, ArchiveFormat::Binary);
        BinaryArchiveReader::new(input, header).unwrap()
    }

    #[test]
    fn reads_object_and_int_entry() {
        let mut entry_body = Vec::new();
        entry_body.extend_from_slice(&7i32.to_le_bytes());
        let object = object_chunk(0, 0, "obj", "cClass", &entry_body);

        let mut objects_block = b"objects 1\nEND\n".to_vec();
        objects_block.extend_from_slice(&object);

        let mut reader = reader_for(&objects_block);
        let obj = reader.read_object_begin().unwrap().unwrap();
        assert_eq!(obj.object_name, "obj");
        assert_eq!(reader.read_int().unwrap(), 7);
        assert!(reader.read_object_end().unwrap());
    }

    #[test]
    fn skip_entry_is_unsupported() {
        let mut reader = reader_for(b"objects 0\nEND\n");
        assert!(matches!(
            reader.skip_entry(),
            Err(ArchiveError::OperationUnsupported(_))
        ));
    }

    #[test]
    fn color_bytes_are_swapped_from_bgra_to_rgba() {
        let object = object_chunk(0, 0, "obj", "cClass", &[10, 20, 30, 255]);
        let mut objects_block = b"objects 1\nEND\n".to_vec();
        objects_block.extend_from_slice(&object);

        let mut reader = reader_for(&objects_block);
        reader.read_object_begin().unwrap();
        assert_eq!(reader.read_color().unwrap(), [30, 20, 10, 255]);
    }
}
