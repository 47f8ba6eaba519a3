//! H.264 bitstream writer
//!
//! Produces RBSP syntax and wraps it into NAL units. Used to synthesize
//! parameter sets and slice headers for stream fixtures and benchmarks.
//!
//! ```text
//! [length (4 bytes, big endian)] [NAL header] [EBSP payload]
//! ```

use super::nal::NalHeader;

/// Bitstream writer with bit-level precision
#[derive(Debug, Default)]
pub struct BitstreamWriter {
    buffer: Vec<u8>,
    current_byte: u8,
    /// Number of bits written in current byte (0-7)
    bit_position: u8,
}

impl BitstreamWriter {
    /// Create new bitstream writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a single bit
    pub fn write_bit(&mut self, bit: bool) {
        if bit {
            self.current_byte |= 1 << (7 - self.bit_position);
        }

        self.bit_position += 1;

        if self.bit_position == 8 {
            self.buffer.push(self.current_byte);
            self.current_byte = 0;
            self.bit_position = 0;
        }
    }

    /// Write the low `num_bits` bits of `value`, MSB first
    pub fn write_bits(&mut self, value: u32, num_bits: u8) {
        for i in (0..num_bits).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    /// Write unsigned Exp-Golomb code
    pub fn write_ue(&mut self, value: u32) {
        let value_plus1 = u64::from(value) + 1;
        let leading_zeros = 63 - value_plus1.leading_zeros();

        for _ in 0..leading_zeros {
            self.write_bit(false);
        }
        for i in (0..=leading_zeros).rev() {
            self.write_bit((value_plus1 >> i) & 1 == 1);
        }
    }

    /// Write signed Exp-Golomb code
    pub fn write_se(&mut self, value: i32) {
        let mapped = if value <= 0 {
            (-(i64::from(value)) * 2) as u32
        } else {
            (i64::from(value) * 2 - 1) as u32
        };
        self.write_ue(mapped);
    }

    /// Write rbsp_stop_one_bit followed by zero alignment bits
    pub fn write_rbsp_trailing_bits(&mut self) {
        self.write_bit(true);
        while self.bit_position != 0 {
            self.write_bit(false);
        }
    }

    /// Number of bits written so far
    pub fn num_bits(&self) -> usize {
        self.buffer.len() * 8 + self.bit_position as usize
    }

    /// Terminate the RBSP and return it
    pub fn finish(mut self) -> Vec<u8> {
        self.write_rbsp_trailing_bits();
        self.buffer
    }
}

/// Insert emulation prevention bytes so the payload contains no start code
pub fn add_emulation_prevention(rbsp: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rbsp.len() + rbsp.len() / 64);
    let mut zeros = 0usize;

    for &byte in rbsp {
        if zeros >= 2 && byte <= 0x03 {
            out.push(0x03);
            zeros = 0;
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
        out.push(byte);
    }

    out
}

/// Build a NAL unit (header byte + escaped payload) from an RBSP
pub fn build_nal(header: NalHeader, rbsp: &[u8]) -> Vec<u8> {
    let mut nal = Vec::with_capacity(rbsp.len() + 1);
    nal.push(header.to_byte());
    nal.extend_from_slice(&add_emulation_prevention(rbsp));
    nal
}

/// Append `nal` to `out` with a 4-byte big-endian length prefix
pub fn write_length_prefixed(out: &mut Vec<u8>, nal: &[u8]) {
    out.extend_from_slice(&(nal.len() as u32).to_be_bytes());
    out.extend_from_slice(nal);
}
