use zengin_byteio::ByteReader;

use crate::descriptor::ObjectDescriptor;
use crate::entry::{BoundingBox, EntryType};
use crate::error::{ArchiveError, ArchiveResult};
use crate::header::ArchiveHeader;
use crate::reader::ArchiveReader;

/// Type-tagged entries, with a name dictionary (the "hash table") resolved
/// once at open time. Object boundaries are ordinary `String` entries whose
/// payload happens to look like `[name class version index]` or `[]`, same
/// convention the ASCII encoding uses for its bracket lines.
pub struct BinSafeArchiveReader {
    input: ByteReader,
    #[allow(dead_code)]
    header: ArchiveHeader,
    #[allow(dead_code)]
    binsafe_version: u32,
    #[allow(dead_code)]
    names: Vec<String>,
    objects_remaining: u32,
}

impl BinSafeArchiveReader {
    pub(crate) fn new(mut input: ByteReader, header: ArchiveHeader) -> ArchiveResult<Self> {
        let base = input.position();
        let binsafe_version = input.read_u32()?;
        let object_count = input.read_u32()?;
        let hash_table_offset = input.read_u32()? as usize;
        let entries_start = input.position();

        input.seek(base + hash_table_offset)?;
        let entry_count = input.read_u32()?;
        let mut names = vec![String::new(); entry_count as usize];
        for _ in 0..entry_count {
            let key_len = input.read_u16()? as usize;
            let insertion_index = input.read_u32()? as usize;
            let _hash_value = input.read_u32()?;
            let key = input.read_string(key_len)?;
            if insertion_index < names.len() {
                names[insertion_index] = key;
            }
        }

        input.seek(entries_start)?;

        Ok(BinSafeArchiveReader {
            input,
            header,
            binsafe_version,
            names,
            objects_remaining: object_count,
        })
    }

    fn read_tag(&mut self) -> ArchiveResult<u8> {
        Ok(self.input.read_u8()?)
    }

    /// Steps 1–4 of reading a named typed value: consume an optional leading
    /// `Hash` tag (the field's name), read the real type tag and its
    /// payload, and on a type mismatch still consume the declared size so
    /// the cursor stays in sync before failing.
    fn read_typed_entry(&mut self, expected: EntryType) -> ArchiveResult<Vec<u8>> {
        let mut tag = self.read_tag()?;
        if tag == EntryType::Hash.binsafe_tag() {
            self.input.read_u32()?;
            tag = self.read_tag()?;
        }

        let entry_type = EntryType::from_binsafe_tag(tag).ok_or_else(|| {
            ArchiveError::MalformedEntry(format!("unknown BIN_SAFE type tag: {tag:#04x}"))
        })?;
        let size = match entry_type.fixed_binsafe_size() {
            Some(s) => s as usize,
            None => self.input.read_u16()? as usize,
        };
        let bytes = self.input.read_bytes(size)?;

        self.consume_optional_trailing_hash()?;

        if entry_type != expected {
            return Err(ArchiveError::UnexpectedEntryType {
                expected,
                got: entry_type,
            });
        }
        Ok(bytes)
    }

    /// Step 5: a trailing `Hash` tag is version-dependent and optional, so a
    /// miss just rewinds rather than failing.
    fn consume_optional_trailing_hash(&mut self) -> ArchiveResult<()> {
        if self.input.remaining() < 1 {
            return Ok(());
        }
        let pos = self.input.position();
        let tag = self.input.read_u8()?;
        if tag == EntryType::Hash.binsafe_tag() && self.input.remaining() >= 4 {
            self.input.read_u32()?;
        } else {
            self.input.seek(pos)?;
        }
        Ok(())
    }

    fn parse_boundary_payload(payload: &str) -> ArchiveResult<ObjectDescriptor> {
        let inner = &payload[1..payload.len() - 1];
        let mut parts = inner.split_whitespace();
        let object_name = parts.next().unwrap_or_default().to_string();
        let class_name = parts.next().unwrap_or_default().to_string();
        let version = parts
            .next()
            .unwrap_or("0")
            .parse::<u16>()
            .map_err(|_| ArchiveError::MalformedEntry(format!("bad object header: {payload}")))?;
        let index = parts
            .next()
            .unwrap_or("0")
            .parse::<u32>()
            .map_err(|_| ArchiveError::MalformedEntry(format!("bad object header: {payload}")))?;
        Ok(ObjectDescriptor {
            object_name,
            class_name,
            version,
            index,
        })
    }
}

impl ArchiveReader for BinSafeArchiveReader {
    fn read_object_begin(&mut self) -> ArchiveResult<Option<ObjectDescriptor>> {
        if self.input.remaining() < 3 {
            return Ok(None);
        }
        let pos = self.input.position();
        let tag = self.read_tag()?;
        if tag != EntryType::String.binsafe_tag() {
            self.input.seek(pos)?;
            return Ok(None);
        }
        let len = self.input.read_u16()? as usize;
        let payload = self.input.read_string(len)?;

        if !(payload.starts_with('[') && payload.ends_with(']') && payload.len() > 2) {
            self.input.seek(pos)?;
            return Ok(None);
        }

        let descriptor = Self::parse_boundary_payload(&payload)?;
        self.objects_remaining = self.objects_remaining.saturating_sub(1);
        Ok(Some(descriptor))
    }

    fn read_object_end(&mut self) -> ArchiveResult<bool> {
        if self.input.remaining() < 3 {
            return Ok(false);
        }
        let pos = self.input.position();
        let tag = self.read_tag()?;
        if tag != EntryType::String.binsafe_tag() {
            self.input.seek(pos)?;
            return Ok(false);
        }
        let len = self.input.read_u16()? as usize;
        let payload = self.input.read_string(len)?;
        if payload != "[]" {
            self.input.seek(pos)?;
            return Ok(false);
        }
        Ok(true)
    }

    fn skip_entry(&mut self) -> ArchiveResult<()> {
        let mut tag = self.read_tag()?;
        if tag == EntryType::Hash.binsafe_tag() {
            self.input.read_u32()?;
            tag = self.read_tag()?;
        }
        let entry_type = EntryType::from_binsafe_tag(tag).ok_or_else(|| {
            ArchiveError::MalformedEntry(format!("unknown BIN_SAFE type tag: {tag:#04x}"))
        })?;
        let size = match entry_type.fixed_binsafe_size() {
            Some(s) => s as usize,
            None => self.input.read_u16()? as usize,
        };
        self.input.read_bytes(size)?;
        self.consume_optional_trailing_hash()
    }

    fn read_string(&mut self) -> ArchiveResult<String> {
        let bytes = self.read_typed_entry(EntryType::String)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read_int(&mut self) -> ArchiveResult<i32> {
        let bytes = self.read_typed_entry(EntryType::Int)?;
        Ok(i32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn read_float(&mut self) -> ArchiveResult<f32> {
        let bytes = self.read_typed_entry(EntryType::Float)?;
        Ok(f32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn read_byte(&mut self) -> ArchiveResult<u8> {
        let bytes = self.read_typed_entry(EntryType::Byte)?;
        Ok(bytes[0])
    }

    fn read_word(&mut self) -> ArchiveResult<u16> {
        let bytes = self.read_typed_entry(EntryType::Word)?;
        Ok(u16::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn read_enum(&mut self) -> ArchiveResult<u32> {
        let bytes = self.read_typed_entry(EntryType::Enum)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn read_bool(&mut self) -> ArchiveResult<bool> {
        let bytes = self.read_typed_entry(EntryType::Bool)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()) != 0)
    }

    fn read_color(&mut self) -> ArchiveResult<[u8; 4]> {
        let bytes = self.read_typed_entry(EntryType::Color)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn read_vec3(&mut self) -> ArchiveResult<[f32; 3]> {
        let bytes = self.read_typed_entry(EntryType::Vec3)?;
        let mut out = [0f32; 3];
        for (i, v) in out.iter_mut().enumerate() {
            *v = f32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        }
        Ok(out)
    }

    fn read_vec2(&mut self) -> ArchiveResult<[f32; 2]> {
        let bytes = self.read_typed_entry(EntryType::RawFloat)?;
        if bytes.len() < 8 {
            return Err(ArchiveError::MalformedEntry(
                "rawFloat entry too small for a vec2".to_string(),
            ));
        }
        Ok([
            f32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            f32::from_le_bytes(bytes[4..8].try_into().unwrap()),
        ])
    }

    fn read_mat3x3(&mut self) -> ArchiveResult<[[f32; 3]; 3]> {
        let bytes = self.read_typed_entry(EntryType::Raw)?;
        if bytes.len() < 4 * 9 {
            return Err(ArchiveError::MalformedEntry(
                "raw entry does not contain enough bytes to be a 3x3 matrix".to_string(),
            ));
        }
        let mut columns = [[0f32; 3]; 3];
        let mut cursor = 0;
        for col in &mut columns {
            for v in col.iter_mut() {
                *v = f32::from_le_bytes(bytes[cursor..cursor + 4].try_into().unwrap());
                cursor += 4;
            }
        }
        let mut rows = [[0f32; 3]; 3];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, col) in columns.iter().enumerate() {
                row[c] = col[r];
            }
        }
        Ok(rows)
    }

    fn read_bbox(&mut self) -> ArchiveResult<BoundingBox> {
        let bytes = self.read_typed_entry(EntryType::RawFloat)?;
        if bytes.len() < 4 * 6 {
            return Err(ArchiveError::MalformedEntry(
                "rawFloat entry too small for a bounding box".to_string(),
            ));
        }
        let f = |i: usize| f32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        Ok(BoundingBox {
            min: [f(0), f(1), f(2)],
            max: [f(3), f(4), f(5)],
        })
    }

    fn read_raw(&mut self) -> ArchiveResult<Vec<u8>> {
        self.read_typed_entry(EntryType::Raw)
    }
}
