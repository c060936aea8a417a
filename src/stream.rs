use crate::error::{LogError, Result};

/// A positioned little-endian reader over a byte slice.
///
/// Mirrors the role of a bitstream cursor, but this log format is always
/// byte-aligned, so there is no bit-level state to track.
#[derive(Clone, Copy)]
pub struct StreamReader<'input> {
    buffer: &'input [u8],
    offset: usize,
}

impl<'input> StreamReader<'input> {
    pub fn new(buffer: &'input [u8]) -> Self {
        StreamReader { buffer, offset: 0 }
    }

    pub fn at(buffer: &'input [u8], offset: usize) -> Self {
        StreamReader { buffer, offset }
    }

    pub fn tell(&self) -> usize {
        self.offset
    }

    pub fn seek(&mut self, pos: usize) {
        self.offset = pos;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    fn take(&mut self, n: usize) -> Result<&'input [u8]> {
        let end = self.offset + n;
        if end > self.buffer.len() {
            return Err(LogError::ShortRead { at: self.offset, wanted: n, len: self.buffer.len() });
        }
        let slice = &self.buffer[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'input [u8]> {
        self.take(n)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Reads the 3-byte little-endian length field used by message headers.
    pub fn read_u24(&mut self) -> Result<u32> {
        let b = self.take(3)?;
        Ok(u32::from(b[0]) | (u32::from(b[1]) << 8) | (u32::from(b[2]) << 16))
    }

    /// Length-prefixed (u32) UTF-8 string, as used for every `string` primitive.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Three u32 words making up an uncompressed chunk's queue header.
    pub fn read_queue_header(&mut self) -> Result<(u32, u32, u32)> {
        Ok((self.read_u32()?, self.read_u32()?, self.read_u32()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_primitives_little_endian() {
        let buf = [0x01, 0x02, 0x03, 0x04, 0xff];
        let mut r = StreamReader::new(&buf);
        assert_eq!(r.read_u8().unwrap(), 0x01);
        assert_eq!(r.read_u24().unwrap(), 0x04_03_02);
        assert_eq!(r.tell(), 4);
        assert!(r.read_u32().is_err());
    }

    #[test]
    fn reads_length_prefixed_string() {
        let mut buf = vec![3, 0, 0, 0];
        buf.extend_from_slice(b"abc");
        let mut r = StreamReader::new(&buf);
        assert_eq!(r.read_string().unwrap(), "abc");
        assert_eq!(r.tell(), buf.len());
    }

    #[test]
    fn seek_and_tell_roundtrip() {
        let buf = [0u8; 16];
        let mut r = StreamReader::new(&buf);
        r.seek(10);
        assert_eq!(r.tell(), 10);
        r.read_u8().unwrap();
        assert_eq!(r.tell(), 11);
    }
}
