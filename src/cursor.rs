use crate::error::Error;
use std::mem::size_of;

/// Bounds-checked read position over an immutable byte buffer.
///
/// All reads interpret bytes as little-endian, which is what the FBX binary
/// container stores; there is deliberately no byte-swapping path.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

macro_rules! read_le {
    ($name: ident, $ty: ty) => {
        pub fn $name(&mut self) -> Result<$ty, Error> {
            let b = self.take(size_of::<$ty>())?;
            Ok(<$ty>::from_le_bytes(b.try_into().unwrap()))
        }
    };
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Consumes `n` bytes, failing with `OutOfRange` if fewer remain.
    /// The length check goes through `checked_add` so a hostile length field
    /// near `usize::MAX` cannot wrap past the end-of-buffer test.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let end = self.pos.checked_add(n).ok_or(Error::OutOfRange)?;
        if end > self.data.len() {
            return Err(Error::OutOfRange);
        }
        let span = &self.data[self.pos..end];
        self.pos = end;
        Ok(span)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), Error> {
        self.take(n).map(|_| ())
    }

    read_le!(read_u8, u8);
    read_le!(read_u32, u32);
    read_le!(read_u64, u64);

    /// One-byte length prefix followed by that many raw bytes.
    pub fn read_short_string(&mut self) -> Result<&'a [u8], Error> {
        let len = self.read_u8()?;
        self.take(len as usize)
    }

    /// Four-byte length prefix followed by that many raw bytes.
    pub fn read_long_string(&mut self) -> Result<&'a [u8], Error> {
        let len = self.read_u32()?;
        self.take(len as usize)
    }
}

#[test]
fn test_read_past_end() {
    let mut c = Cursor::new(&[1, 2]);
    assert_eq!(c.read_u8(), Ok(1));
    assert_eq!(c.read_u32(), Err(Error::OutOfRange));
    // a failed read must not consume anything
    assert_eq!(c.pos(), 1);
}

#[test]
fn test_short_string() {
    let mut c = Cursor::new(b"\x03abcdef");
    assert_eq!(c.read_short_string(), Ok(&b"abc"[..]));
    assert_eq!(c.pos(), 4);
}

#[test]
fn test_string_length_overflows() {
    // 4-byte length prefix of u32::MAX: must fail cleanly, not wrap
    let mut c = Cursor::new(b"\xff\xff\xff\xffrest");
    assert_eq!(c.read_long_string(), Err(Error::OutOfRange));
}
