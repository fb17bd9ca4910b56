use byteorder::{BigEndian, ByteOrder};
use std::io;

/// Growable byte buffer with big-endian appends and in-place patching
///
/// The same buffer type holds an instruction stream while it is being emitted (where jump
/// offsets and switch tables get patched after the fact) and the body of a class file while it is
/// being serialized (where attribute lengths and counts get patched once known).
#[derive(Default, Clone, Debug)]
pub struct ByteBuffer {
    bytes: Vec<u8>,
}

impl ByteBuffer {
    pub fn new() -> ByteBuffer {
        ByteBuffer { bytes: vec![] }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Drop everything at or after `len`
    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
    }

    pub fn append_u1(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn append_u2(&mut self, value: u16) {
        let mut buf = [0; 2];
        BigEndian::write_u16(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn append_u4(&mut self, value: u32) {
        let mut buf = [0; 4];
        BigEndian::write_u32(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn append_i4(&mut self, value: i32) {
        self.append_u4(value as u32);
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn put_u1(&mut self, at: usize, value: u8) {
        self.bytes[at] = value;
    }

    pub fn put_u2(&mut self, at: usize, value: u16) {
        BigEndian::write_u16(&mut self.bytes[at..at + 2], value);
    }

    pub fn put_u4(&mut self, at: usize, value: u32) {
        BigEndian::write_u32(&mut self.bytes[at..at + 4], value);
    }

    pub fn get_u1(&self, at: usize) -> u8 {
        self.bytes[at]
    }

    pub fn get_u2(&self, at: usize) -> u16 {
        BigEndian::read_u16(&self.bytes[at..at + 2])
    }

    pub fn get_i2(&self, at: usize) -> i16 {
        BigEndian::read_i16(&self.bytes[at..at + 2])
    }

    pub fn get_i4(&self, at: usize) -> i32 {
        BigEndian::read_i32(&self.bytes[at..at + 4])
    }
}

impl io::Write for ByteBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
