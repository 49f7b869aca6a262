use std::fmt;

use crate::pdu_parse_error::PduParseErr;

/// MSB-first bit cursor over a byte vector. RLC headers are packed big-endian,
/// field after field, with no alignment between fields.
pub struct BitBuffer {
    buffer: Vec<u8>,
    pos: usize,              // next bit offset for read/write
    end: usize,              // bits at or after this are not readable
    flag_autoexpand: bool,   // if true, writes past `end` grow the buffer
}

impl BitBuffer {
    /// Create a zeroed buffer holding exactly `len_bits` bits.
    pub fn new(len_bits: usize) -> Self {
        BitBuffer {
            buffer: vec![0; len_bits.div_ceil(8)],
            pos: 0,
            end: len_bits,
            flag_autoexpand: false,
        }
    }

    /// Create an empty buffer that grows as bits are written.
    /// `initial_max_len_bits` only sets the initial allocation.
    pub fn new_autoexpand(initial_max_len_bits: usize) -> Self {
        BitBuffer {
            buffer: Vec::with_capacity(initial_max_len_bits.div_ceil(8)),
            pos: 0,
            end: 0,
            flag_autoexpand: true,
        }
    }

    /// Wrap an existing byte vector. All bits are readable.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let end = data.len() * 8;
        BitBuffer { buffer: data, pos: 0, end, flag_autoexpand: false }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Self::from_vec(data.to_vec())
    }

    /// Construct a BitBuffer from a string of '0'/'1' characters.
    /// Panics on any other character. Intended for tests and tooling.
    pub fn from_bitstr(bitstr: &str) -> Self {
        let mut buf = BitBuffer::new(bitstr.len());
        for c in bitstr.chars() {
            match c {
                '0' => buf.write_bit(0),
                '1' => buf.write_bit(1),
                other => panic!("from_bitstr: invalid character `{}`", other),
            }
        }
        buf.pos = 0;
        buf
    }

    /// Render all bits as a '0'/'1' string
    pub fn to_bitstr(&self) -> String {
        (0..self.end).map(|i| if self.bit_at(i) == 1 { '1' } else { '0' }).collect()
    }

    #[inline]
    fn bit_at(&self, abs_pos: usize) -> u8 {
        (self.buffer[abs_pos / 8] >> (7 - (abs_pos % 8))) & 1
    }

    /// Peek `num_bits` at the current pos, without advancing.
    /// Returns None on overflow or if `num_bits > 64`.
    pub fn peek_bits(&self, num_bits: usize) -> Option<u64> {
        if num_bits > 64 || self.pos + num_bits > self.end {
            return None;
        }
        let mut v = 0u64;
        let mut cur = self.pos;
        let mut remaining = num_bits;

        // Bit-wise until byte aligned, then whole bytes, then the tail
        while remaining > 0 && cur % 8 != 0 {
            v = (v << 1) | self.bit_at(cur) as u64;
            cur += 1;
            remaining -= 1;
        }
        while remaining >= 8 {
            v = (v << 8) | self.buffer[cur / 8] as u64;
            cur += 8;
            remaining -= 8;
        }
        while remaining > 0 {
            v = (v << 1) | self.bit_at(cur) as u64;
            cur += 1;
            remaining -= 1;
        }
        Some(v)
    }

    /// Read `num_bits` at the current pos, advancing on success.
    pub fn read_bits(&mut self, num_bits: usize) -> Option<u64> {
        let v = self.peek_bits(num_bits)?;
        self.pos += num_bits;
        Some(v)
    }

    /// Like read_bits, but returns PduParseErr::BufferEnded naming `field` if the buffer is too short.
    pub fn read_field(&mut self, num_bits: usize, field: &'static str) -> Result<u64, PduParseErr> {
        self.read_bits(num_bits).ok_or(PduParseErr::BufferEnded { field: Some(field) })
    }

    pub fn read_bit(&mut self) -> Option<u8> {
        self.read_bits(1).map(|v| v as u8)
    }

    /// Skip to the next byte boundary. Padding bits are not checked.
    pub fn skip_to_byte_boundary(&mut self) {
        self.pos = self.pos.div_ceil(8) * 8;
        if self.pos > self.end {
            self.pos = self.end;
        }
    }

    /// Returns the bytes between pos and end. Pos must be byte aligned.
    pub fn remaining_bytes(&self) -> &[u8] {
        assert!(self.pos % 8 == 0, "remaining_bytes: pos {} not byte aligned", self.pos);
        &self.buffer[self.pos / 8..self.end.div_ceil(8)]
    }

    /// Grows `end` (and the backing vector if needed) so `extra_bits` more bits fit after pos
    fn ensure_writable(&mut self, extra_bits: usize) {
        let needed = self.pos + extra_bits;
        if needed <= self.end {
            return;
        }
        assert!(self.flag_autoexpand, "write of {} bits at {} would exceed buffer end {}", extra_bits, self.pos, self.end);
        let needed_bytes = needed.div_ceil(8);
        if needed_bytes > self.buffer.len() {
            self.buffer.resize(needed_bytes, 0);
        }
        self.end = needed;
    }

    /// Write a single bit to pos
    pub fn write_bit(&mut self, value: u8) {
        assert!(value == 0 || value == 1, "write_bit: value must be 0 or 1");
        self.ensure_writable(1);
        let idx = self.pos / 8;
        let shift = 7 - (self.pos % 8);
        self.buffer[idx] = (self.buffer[idx] & !(1 << shift)) | (value << shift);
        self.pos += 1;
    }

    /// Write up to 64 bits, advancing pos.
    /// Panics if `value` does not fit in `num_bits`, or if the buffer would overflow
    /// and autoexpand is disabled.
    pub fn write_bits(&mut self, value: u64, num_bits: usize) {
        assert!(num_bits <= 64, "can only write up to 64 bits");
        assert!(num_bits == 64 || value >> num_bits == 0, "value {} exceeds {} bits", value, num_bits);
        self.ensure_writable(num_bits);

        let mut remaining = num_bits;
        while remaining > 0 && self.pos % 8 != 0 {
            remaining -= 1;
            self.write_bit(((value >> remaining) & 1) as u8);
        }
        while remaining >= 8 {
            remaining -= 8;
            self.buffer[self.pos / 8] = ((value >> remaining) & 0xFF) as u8;
            self.pos += 8;
        }
        while remaining > 0 {
            remaining -= 1;
            self.write_bit(((value >> remaining) & 1) as u8);
        }
    }

    /// Write an arbitrary amount of zero bits
    pub fn write_zeroes(&mut self, num_bits: usize) {
        let mut remaining = num_bits;
        while remaining > 0 {
            let chunk = remaining.min(64);
            self.write_bits(0, chunk);
            remaining -= chunk;
        }
    }

    /// Write zero bits up to the next byte boundary
    pub fn pad_to_byte_boundary(&mut self) {
        let pad = (8 - self.pos % 8) % 8;
        self.write_zeroes(pad);
    }

    /// Append whole bytes at pos. Pos must be byte aligned.
    pub fn write_bytes(&mut self, data: &[u8]) {
        assert!(self.pos % 8 == 0, "write_bytes: pos {} not byte aligned", self.pos);
        self.ensure_writable(data.len() * 8);
        let start = self.pos / 8;
        self.buffer[start..start + data.len()].copy_from_slice(data);
        self.pos += data.len() * 8;
    }

    /// Length of the buffer in bits
    pub fn get_len(&self) -> usize {
        self.end
    }

    /// Bits left between pos and end
    pub fn get_len_remaining(&self) -> usize {
        self.end - self.pos
    }

    pub fn get_pos(&self) -> usize {
        self.pos
    }

    /// Absolute seek. Panics when outside the buffer.
    pub fn seek(&mut self, pos: usize) {
        assert!(pos <= self.end, "seek to {} beyond end {}", pos, self.end);
        self.pos = pos;
    }

    /// Consumes the buffer and returns the bytes written so far, zero padded to a whole byte.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.buffer.truncate(self.end.div_ceil(8));
        self.buffer
    }

    /// Hex dump of the whole buffer, used in log lines
    pub fn dump_hex(&self) -> String {
        self.buffer[..self.end.div_ceil(8)].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitBuffer {{ pos: {}, end: {}, data: {} }}", self.pos, self.end, self.to_bitstr())
    }
}
