//! Byte cursor primitives: a bounds-checked reader and a growable writer.

/// A read failure at a byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorError {
    pub offset: usize,
    pub reason: String,
}

pub type CursorResult<T> = Result<T, CursorError>;

/// Little-endian reader over a borrowed buffer.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

macro_rules! read_le {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self) -> CursorResult<$ty> {
            const N: usize = std::mem::size_of::<$ty>();
            let bytes = self.read_array::<N>()?;
            Ok(<$ty>::from_le_bytes(bytes))
        }
    };
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Build an error positioned at the current offset.
    pub fn error(&self, reason: impl Into<String>) -> CursorError {
        CursorError {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    pub fn read_slice(&mut self, len: usize) -> CursorResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.error(format!(
                "need {len} bytes, {} remaining",
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> CursorResult<[u8; N]> {
        let slice = self.read_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> CursorResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    read_le!(read_i8, i8);
    read_le!(read_u16, u16);
    read_le!(read_i16, i16);
    read_le!(read_u32, u32);
    read_le!(read_i32, i32);
    read_le!(read_u64, u64);
    read_le!(read_i64, i64);
    read_le!(read_u128, u128);
    read_le!(read_i128, i128);
    read_le!(read_f32, f32);
    read_le!(read_f64, f64);

    /// LEB128, at most 5 bytes.
    pub fn read_varuint32(&mut self) -> CursorResult<u32> {
        let start = self.pos;
        let mut result: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_u8()?;
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift >= 35 {
                return Err(CursorError {
                    offset: start,
                    reason: "varuint32 longer than 5 bytes".into(),
                });
            }
        }
        u32::try_from(result).map_err(|_| CursorError {
            offset: start,
            reason: "varuint32 overflow".into(),
        })
    }

    /// Zig-zag encoded LEB128.
    pub fn read_varint32(&mut self) -> CursorResult<i32> {
        let raw = self.read_varuint32()?;
        Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
    }

    /// `varuint32` length prefix followed by that many bytes.
    pub fn read_sized_bytes(&mut self) -> CursorResult<&'a [u8]> {
        let len = self.read_varuint32()? as usize;
        self.read_slice(len)
    }
}

/// Little-endian writer into an owned buffer.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

macro_rules! write_le {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self, v: $ty) {
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
    };
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    write_le!(write_i8, i8);
    write_le!(write_u16, u16);
    write_le!(write_i16, i16);
    write_le!(write_u32, u32);
    write_le!(write_i32, i32);
    write_le!(write_u64, u64);
    write_le!(write_i64, i64);
    write_le!(write_u128, u128);
    write_le!(write_i128, i128);
    write_le!(write_f32, f32);
    write_le!(write_f64, f64);

    pub fn write_varuint32(&mut self, mut v: u32) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                self.buf.push(byte);
                break;
            }
            self.buf.push(byte | 0x80);
        }
    }

    pub fn write_varint32(&mut self, v: i32) {
        self.write_varuint32(((v << 1) ^ (v >> 31)) as u32);
    }

    pub fn write_sized_bytes(&mut self, bytes: &[u8]) -> Result<(), String> {
        let len = u32::try_from(bytes.len()).map_err(|_| "length exceeds u32".to_string())?;
        self.write_varuint32(len);
        self.write_slice(bytes);
        Ok(())
    }
}
