use azimuth_common::{Address, H256};

/// Reads fixed-width fields from the end of a buffer towards its start.
///
/// The position may run past the start of the buffer. Bytes before index 0
/// read as zero, so a field cut short at the start comes back left-padded to
/// its full width.
#[derive(Debug, Clone)]
pub struct ReverseCursor<'a> {
    buf: &'a [u8],
    position: isize,
}

impl<'a> ReverseCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            position: buf.len() as isize,
        }
    }

    /// Index of the first byte already consumed. Negative once the cursor
    /// has run past the start of the buffer.
    pub fn position(&self) -> isize {
        self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.position > 0
    }

    /// Takes the `N` bytes ending at the cursor.
    pub fn take<const N: usize>(&mut self) -> [u8; N] {
        let end = self.position;
        self.position -= N as isize;
        let mut field = [0u8; N];
        let bytes = self.window(self.position, end);
        field[N - bytes.len()..].copy_from_slice(bytes);
        field
    }

    pub fn take_u8(&mut self) -> u8 {
        let [byte] = self.take::<1>();
        byte
    }

    pub fn take_u32(&mut self) -> u32 {
        u32::from_be_bytes(self.take::<4>())
    }

    pub fn take_address(&mut self) -> Address {
        Address::from(self.take::<20>())
    }

    pub fn take_h256(&mut self) -> H256 {
        H256(self.take::<32>())
    }

    /// Bytes between the cursor and `end`, with a zero for every position
    /// before the start of the buffer.
    pub fn consumed_since(&self, end: isize) -> Vec<u8> {
        let width = (end - self.position).max(0) as usize;
        let bytes = self.window(self.position, end);
        let mut out = vec![0u8; width - bytes.len()];
        out.extend_from_slice(bytes);
        out
    }

    fn window(&self, start: isize, end: isize) -> &'a [u8] {
        let end = end.clamp(0, self.buf.len() as isize) as usize;
        let start = (start.max(0) as usize).min(end);
        &self.buf[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fields_back_to_front() {
        let buf = [0xAA, 0x00, 0x00, 0x01, 0x02, 0x07];
        let mut cursor = ReverseCursor::new(&buf);
        assert_eq!(cursor.take_u8(), 0x07);
        assert_eq!(cursor.take_u32(), 0x0000_0102);
        assert_eq!(cursor.position(), 1);
        assert!(cursor.has_remaining());
        assert_eq!(cursor.take_u8(), 0xAA);
        assert!(!cursor.has_remaining());
    }

    #[test]
    fn short_reads_are_left_padded() {
        let buf = [0x3E, 0xB3];
        let mut cursor = ReverseCursor::new(&buf);
        assert_eq!(cursor.take_u32(), 0x3EB3);
        assert_eq!(cursor.position(), -2);
        assert_eq!(cursor.consumed_since(2), vec![0x00, 0x00, 0x3E, 0xB3]);
        // Entirely past the start
        assert_eq!(cursor.take_u8(), 0);
        assert_eq!(cursor.consumed_since(-2), vec![0x00]);
    }
}
