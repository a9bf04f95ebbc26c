use std::rc::Rc;

use crate::error::{ByteIoError, ByteIoResult};

macro_rules! define_read_le {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self) -> ByteIoResult<$ty> {
            const SIZE: usize = std::mem::size_of::<$ty>();
            let mut buf = [0u8; SIZE];
            buf.copy_from_slice(self.take(SIZE)?);
            Ok(<$ty>::from_le_bytes(buf))
        }
    };
}

/// A seekable cursor over an immutable byte blob with a fixed upper limit.
///
/// Cloning a `ByteReader` or calling [`ByteReader::sub_reader`] shares the
/// backing buffer via reference counting; no bytes are copied until a typed
/// read pulls them out.
#[derive(Clone)]
pub struct ByteReader {
    data: Rc<[u8]>,
    start: usize,
    end: usize,
    pos: usize,
}

impl ByteReader {
    pub fn new(data: impl Into<Rc<[u8]>>) -> Self {
        let data = data.into();
        let end = data.len();
        Self {
            data,
            start: 0,
            end,
            pos: 0,
        }
    }

    /// Number of bytes this reader can see, from `0` to its limit.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cursor position, relative to the start of this reader's view.
    pub fn position(&self) -> usize {
        self.pos - self.start
    }

    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    pub fn seek(&mut self, position: usize) -> ByteIoResult<()> {
        let absolute = self.start + position;
        if absolute > self.end {
            return Err(ByteIoError::SeekOutOfRange {
                offset: position,
                limit: self.len(),
            });
        }
        self.pos = absolute;
        Ok(())
    }

    fn take(&mut self, n: usize) -> ByteIoResult<&[u8]> {
        if self.pos + n > self.end {
            return Err(ByteIoError::UnexpectedEof {
                offset: self.position(),
                wanted: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Splits the next `len` bytes off into an independent reader over the same
    /// backing buffer, advancing this reader past them. Readers never read
    /// across their own limit, so the sub-reader cannot see beyond `len`.
    pub fn sub_reader(&mut self, len: usize) -> ByteIoResult<ByteReader> {
        let bytes_start = self.pos;
        self.take(len)?;
        Ok(ByteReader {
            data: Rc::clone(&self.data),
            start: bytes_start,
            end: bytes_start + len,
            pos: bytes_start,
        })
    }

    pub fn read_u8(&mut self) -> ByteIoResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> ByteIoResult<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    define_read_le!(read_u16, u16);
    define_read_le!(read_i16, i16);
    define_read_le!(read_u32, u32);
    define_read_le!(read_i32, i32);
    define_read_le!(read_f32, f32);

    pub fn read_vec2(&mut self) -> ByteIoResult<[f32; 2]> {
        Ok([self.read_f32()?, self.read_f32()?])
    }

    pub fn read_vec3(&mut self) -> ByteIoResult<[f32; 3]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    /// Reads a 3x3 matrix stored column-major on disk, transposing it on read
    /// because the disk form is row-major by ZenGin convention.
    pub fn read_mat3x3(&mut self) -> ByteIoResult<[[f32; 3]; 3]> {
        let mut columns = [[0f32; 3]; 3];
        for col in &mut columns {
            for v in col.iter_mut() {
                *v = self.read_f32()?;
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

    pub fn read_bytes(&mut self, n: usize) -> ByteIoResult<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    /// Reads `n` raw bytes as a text string. ZenGin asset text predates UTF-8
    /// and is not guaranteed to decode cleanly; bytes that don't are replaced
    /// rather than rejected.
    pub fn read_string(&mut self, n: usize) -> ByteIoResult<String> {
        let bytes = self.take(n)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Reads up to the next `\0`, `\r`, or `\n`. When `skip_whitespace` is set,
    /// consumes a following run of whitespace characters.
    pub fn read_line(&mut self, skip_whitespace: bool) -> ByteIoResult<String> {
        self.read_line_impl(skip_whitespace, None)
    }

    /// Same shape as [`ByteReader::read_line`], but ignores a run of `chars`
    /// after the terminator instead of whitespace.
    pub fn read_line_then_ignore(&mut self, chars: &[u8]) -> ByteIoResult<String> {
        self.read_line_impl(false, Some(chars))
    }

    fn read_line_impl(
        &mut self,
        skip_whitespace: bool,
        ignore: Option<&[u8]>,
    ) -> ByteIoResult<String> {
        if self.pos >= self.end {
            return Err(ByteIoError::UnexpectedEof {
                offset: self.position(),
                wanted: 1,
                available: 0,
            });
        }

        let line_start = self.pos;
        let mut line_end = self.pos;
        let mut found_terminator = false;
        while self.pos < self.end {
            let b = self.data[self.pos];
            self.pos += 1;
            if b == b'\0' || b == b'\r' || b == b'\n' {
                found_terminator = true;
                break;
            }
            line_end = self.pos;
        }
        // If no terminator was found the loop already stopped at `end` without
        // reading past it, so the cursor needs no correction either way.
        let _ = found_terminator;

        if let Some(ignore) = ignore {
            while self.pos < self.end && ignore.contains(&self.data[self.pos]) {
                self.pos += 1;
            }
        } else if skip_whitespace {
            while self.pos < self.end && self.data[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
        }

        Ok(String::from_utf8_lossy(&self.data[line_start..line_end]).into_owned())
    }
}
