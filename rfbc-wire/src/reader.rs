//! Cursor-style reader over an accumulated byte slice.
//!
//! The transport layer collects exactly the number of bytes a protocol state
//! asked for, then hands the slice to a parser. [`WireReader`] walks that
//! slice with type-safe big-endian accessors, failing with
//! [`std::io::ErrorKind::UnexpectedEof`] if a parser asks for more than was
//! accumulated (which would indicate a state-machine bookkeeping bug or a
//! truncated message).

use bytes::Buf;

/// Reader over a fully-accumulated message slice.
pub struct WireReader<'a> {
    data: &'a [u8],
}

impl<'a> WireReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    fn ensure(&self, n: usize) -> std::io::Result<()> {
        if self.data.len() < n {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, have {}", n, self.data.len()),
            ));
        }
        Ok(())
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> std::io::Result<u8> {
        self.ensure(1)?;
        Ok(self.data.get_u8())
    }

    /// Read a 16-bit unsigned integer in network byte order.
    pub fn read_u16(&mut self) -> std::io::Result<u16> {
        self.ensure(2)?;
        Ok(self.data.get_u16())
    }

    /// Read a 32-bit unsigned integer in network byte order.
    pub fn read_u32(&mut self) -> std::io::Result<u32> {
        self.ensure(4)?;
        Ok(self.data.get_u32())
    }

    /// Read a 32-bit signed integer in network byte order.
    pub fn read_i32(&mut self) -> std::io::Result<i32> {
        self.ensure(4)?;
        Ok(self.data.get_i32())
    }

    /// Borrow the next `n` bytes without copying.
    pub fn read_slice(&mut self, n: usize) -> std::io::Result<&'a [u8]> {
        self.ensure(n)?;
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    /// Skip `n` bytes of padding.
    pub fn skip(&mut self, n: usize) -> std::io::Result<()> {
        self.ensure(n)?;
        self.data.advance(n);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_primitives_big_endian() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut r = WireReader::new(&data);
        assert_eq!(r.read_u8().unwrap(), 0x01);
        assert_eq!(r.read_u16().unwrap(), 0x0203);
        assert_eq!(r.read_u32().unwrap(), 0x0405_0607);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn read_i32_sign_extends() {
        let data = 0xFFFF_FF21_u32.to_be_bytes();
        let mut r = WireReader::new(&data);
        assert_eq!(r.read_i32().unwrap(), -223);
    }

    #[test]
    fn slice_and_skip_advance() {
        let data = [1, 2, 3, 4, 5];
        let mut r = WireReader::new(&data);
        r.skip(2).unwrap();
        assert_eq!(r.read_slice(2).unwrap(), &[3, 4]);
        assert_eq!(r.remaining(), 1);
    }

    #[test]
    fn short_read_is_unexpected_eof() {
        let data = [0x01];
        let mut r = WireReader::new(&data);
        let err = r.read_u32().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
