use zengin_byteio::ByteReader;

use crate::descriptor::ObjectDescriptor;
use crate::entry::{BoundingBox, EntryType};
use crate::error::{ArchiveError, ArchiveResult};
use crate::header::ArchiveHeader;
use crate::reader::{read_objects_count_line, ArchiveReader};

/// Every object and entry is one self-delimiting line:
/// `[object_name class_name version index]` / `[]` for boundaries,
/// `name=type:payload` for entries.
pub struct AsciiArchiveReader {
    input: ByteReader,
    #[allow(dead_code)]
    header: ArchiveHeader,
    objects_remaining: u32,
}

impl AsciiArchiveReader {
    pub(crate) fn new(mut input: ByteReader, header: ArchiveHeader) -> ArchiveResult<Self> {
        let objects_remaining = read_objects_count_line(&mut input)?;
        Ok(AsciiArchiveReader {
            input,
            header,
            objects_remaining,
        })
    }

    fn read_entry(&mut self, expected: EntryType) -> ArchiveResult<String> {
        let pos = self.input.position();
        let line = self.input.read_line(false)?;
        let eq = line.find('=').ok_or_else(|| {
            ArchiveError::MalformedEntry(format!("entry line missing '=': {line}"))
        })?;
        let rest = &line[eq + 1..];
        let colon = rest.find(':').ok_or_else(|| {
            ArchiveError::MalformedEntry(format!("entry line missing ':': {line}"))
        })?;
        let keyword = &rest[..colon];
        let payload = rest[colon + 1..].to_string();

        if keyword != expected.ascii_keyword() {
            let got = ascii_keyword_to_type(keyword).unwrap_or(expected);
            let _ = pos;
            return Err(ArchiveError::UnexpectedEntryType {
                expected,
                got,
            });
        }

        Ok(payload)
    }

    fn parse_f32(payload: &str) -> ArchiveResult<f32> {
        payload
            .trim()
            .parse::<f32>()
            .map_err(|_| ArchiveError::MalformedEntry(format!("bad float: {payload}")))
    }
}

fn ascii_keyword_to_type(keyword: &str) -> Option<EntryType> {
    Some(match keyword {
        "string" => EntryType::String,
        "int" => EntryType::Int,
        "float" => EntryType::Float,
        "byte" => EntryType::Byte,
        "word" => EntryType::Word,
        "bool" => EntryType::Bool,
        "vec3" => EntryType::Vec3,
        "color" => EntryType::Color,
        "raw" => EntryType::Raw,
        "rawFloat" => EntryType::RawFloat,
        "enum" => EntryType::Enum,
        "hash" => EntryType::Hash,
        _ => return None,
    })
}

impl ArchiveReader for AsciiArchiveReader {
    fn read_object_begin(&mut self) -> ArchiveResult<Option<ObjectDescriptor>> {
        if self.input.remaining() < 3 {
            return Ok(None);
        }
        let pos = self.input.position();
        let line = self.input.read_line(false)?;

        if !(line.starts_with('[') && line.ends_with(']') && line.len() > 2) {
            self.input.seek(pos)?;
            return Ok(None);
        }

        let inner = &line[1..line.len() - 1];
        let mut parts = inner.split_whitespace();
        let object_name = parts.next().unwrap_or_default().to_string();
        let class_name = parts.next().unwrap_or_default().to_string();
        let version = parts
            .next()
            .unwrap_or("0")
            .parse::<u16>()
            .map_err(|_| ArchiveError::MalformedEntry(format!("bad object header: {line}")))?;
        let index = parts
            .next()
            .unwrap_or("0")
            .parse::<u32>()
            .map_err(|_| ArchiveError::MalformedEntry(format!("bad object header: {line}")))?;

        self.objects_remaining = self.objects_remaining.saturating_sub(1);
        Ok(Some(ObjectDescriptor {
            object_name,
            class_name,
            version,
            index,
        }))
    }

    fn read_object_end(&mut self) -> ArchiveResult<bool> {
        if self.input.remaining() < 2 {
            return Ok(false);
        }
        let pos = self.input.position();
        let line = self.input.read_line(false)?;
        if line != "[]" {
            self.input.seek(pos)?;
            return Ok(false);
        }
        Ok(true)
    }

    fn skip_entry(&mut self) -> ArchiveResult<()> {
        self.input.read_line(false)?;
        Ok(())
    }

    fn read_string(&mut self) -> ArchiveResult<String> {
        self.read_entry(EntryType::String)
    }

    fn read_int(&mut self) -> ArchiveResult<i32> {
        let payload = self.read_entry(EntryType::Int)?;
        payload
            .trim()
            .parse::<i32>()
            .map_err(|_| ArchiveError::MalformedEntry(format!("bad int: {payload}")))
    }

    fn read_float(&mut self) -> ArchiveResult<f32> {
        let payload = self.read_entry(EntryType::Float)?;
        Self::parse_f32(&payload)
    }

    fn read_byte(&mut self) -> ArchiveResult<u8> {
        let payload = self.read_entry(EntryType::Byte)?;
        payload
            .trim()
            .parse::<u32>()
            .map(|v| (v & 0xFF) as u8)
            .map_err(|_| ArchiveError::MalformedEntry(format!("bad byte: {payload}")))
    }

    fn read_word(&mut self) -> ArchiveResult<u16> {
        let payload = self.read_entry(EntryType::Word)?;
        payload
            .trim()
            .parse::<u32>()
            .map(|v| (v & 0xFFFF) as u16)
            .map_err(|_| ArchiveError::MalformedEntry(format!("bad word: {payload}")))
    }

    fn read_enum(&mut self) -> ArchiveResult<u32> {
        let payload = self.read_entry(EntryType::Enum)?;
        payload
            .trim()
            .parse::<u32>()
            .map_err(|_| ArchiveError::MalformedEntry(format!("bad enum: {payload}")))
    }

    fn read_bool(&mut self) -> ArchiveResult<bool> {
        let payload = self.read_entry(EntryType::Bool)?;
        Ok(payload.trim().parse::<u32>().unwrap_or(0) == 1)
    }

    fn read_color(&mut self) -> ArchiveResult<[u8; 4]> {
        let payload = self.read_entry(EntryType::Color)?;
        let mut parts = payload.split_whitespace();
        let mut next = |label: &str| -> ArchiveResult<u8> {
            parts
                .next()
                .ok_or_else(|| ArchiveError::MalformedEntry(format!("missing color {label}")))?
                .parse::<u32>()
                .map(|v| (v & 0xFF) as u8)
                .map_err(|_| ArchiveError::MalformedEntry(format!("bad color {label}")))
        };
        Ok([next("r")?, next("g")?, next("b")?, next("a")?])
    }

    fn read_vec3(&mut self) -> ArchiveResult<[f32; 3]> {
        let payload = self.read_entry(EntryType::Vec3)?;
        let mut parts = payload.split_whitespace();
        let mut next = || -> ArchiveResult<f32> {
            let tok = parts
                .next()
                .ok_or_else(|| ArchiveError::MalformedEntry("missing vec3 component".to_string()))?;
            Self::parse_f32(tok)
        };
        Ok([next()?, next()?, next()?])
    }

    fn read_vec2(&mut self) -> ArchiveResult<[f32; 2]> {
        let payload = self.read_entry(EntryType::RawFloat)?;
        let mut parts = payload.split_whitespace();
        let mut next = || -> ArchiveResult<f32> {
            let tok = parts
                .next()
                .ok_or_else(|| ArchiveError::MalformedEntry("missing rawFloat component".to_string()))?;
            Self::parse_f32(tok)
        };
        Ok([next()?, next()?])
    }

    fn read_mat3x3(&mut self) -> ArchiveResult<[[f32; 3]; 3]> {
        let bytes = self.read_raw()?;
        if bytes.len() < 4 * 9 {
            return Err(ArchiveError::MalformedEntry(
                "raw entry does not contain enough bytes to be a 3x3 matrix".to_string(),
            ));
        }
        let mut columns = [[0f32; 3]; 3];
        let mut cursor = 0;
        for col in &mut columns {
            for v in col.iter_mut() {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&bytes[cursor..cursor + 4]);
                *v = f32::from_le_bytes(buf);
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
        let payload = self.read_entry(EntryType::RawFloat)?;
        let mut parts = payload.split_whitespace();
        let mut next = || -> ArchiveResult<f32> {
            let tok = parts
                .next()
                .ok_or_else(|| ArchiveError::MalformedEntry("missing bbox component".to_string()))?;
            Self::parse_f32(tok)
        };
        Ok(BoundingBox {
            min: [next()?, next()?, next()?],
            max: [next()?, next()?, next()?],
        })
    }

    fn read_raw(&mut self) -> ArchiveResult<Vec<u8>> {
        let payload = self.read_entry(EntryType::Raw)?;
        let payload = payload.trim();
        if payload.len() % 2 != 0 {
            return Err(ArchiveError::MalformedEntry(
                "raw entry has an odd number of hex characters".to_string(),
            ));
        }
        (0..payload.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&payload[i..i + 2], 16)
                    .map_err(|_| ArchiveError::MalformedEntry(format!("bad hex byte: {}", &payload[i..i + 2])))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ArchiveFormat;

    fn reader_for(body: &[u8]) -> AsciiArchiveReader {
        let mut full = b"ZenGin Archive\nver 1\nphoenix\nASCII\nsaveGame 0\nEND\n".to_vec();
        full.extend_from_slice(body);
        let mut input = ByteReader::new(full);
        let header = crate::header::ArchiveHeader::parse(&mut input).unwrap();
        assert_eq!(header.format, ArchiveFormat::Ascii);
        AsciiArchiveReader::new(input, header).unwrap()
    }

    #[test]
    fn reads_object_and_int_entry() {
        let mut reader = reader_for(b"objects 1\nEND\n[obj cClass 0 0]\nk=int:7\n[]\n");
        let obj = reader.read_object_begin().unwrap().unwrap();
        assert_eq!(obj.object_name, "obj");
        assert_eq!(obj.class_name, "cClass");
        assert_eq!(reader.read_int().unwrap(), 7);
        assert!(reader.read_object_end().unwrap());
    }

    #[test]
    fn type_mismatch_fails_but_advances_cursor() {
        let mut reader = reader_for(b"objects 1\nEND\n[obj cClass 0 0]\nk=float:1.5\nafter=int:9\n[]\n");
        reader.read_object_begin().unwrap();
        let err = reader.read_int().unwrap_err();
        assert!(matches!(err, ArchiveError::UnexpectedEntryType { .. }));
        // Cursor advanced past the mismatched line; next entry reads fine.
        assert_eq!(reader.read_int().unwrap(), 9);
    }

    #[test]
    fn skip_object_lands_past_close() {
        // "obj" holds a plain entry and a nested object; skip_object(false),
        // called right after read_object_begin already opened "obj", must
        // walk past both and stop immediately after "obj"'s own close —
        // not after the nested object's close, and not short after the
        // first entry.
        let mut reader = reader_for(
            b"objects 1\nEND\n[obj cClass 0 0]\nk=int:1\n[nested cClass 0 1]\nm=int:2\n[]\n[]\nafter=int:3\n",
        );
        reader.read_object_begin().unwrap();
        reader.skip_object(false).unwrap();
        assert_eq!(reader.read_int().unwrap(), 3);
    }
}
