//! H.264 RBSP bit reader
//!
//! Reads fixed-width fields and Exp-Golomb codes from parameter sets and slice
//! headers once emulation prevention bytes have been stripped.
//!
//! ## Exp-Golomb Codes
//!
//! ue(v) is coded as `[M zeros][1][M info bits]` and decodes to
//! `(1 << M) - 1 + info`. se(v) maps the unsigned code k onto
//! `(-1)^(k+1) * ceil(k/2)`, so 1 → 1, 2 → -1, 3 → 2, ...

use crate::error::{Error, Result};

/// Strip emulation prevention bytes (`00 00 03` → `00 00`) from a NAL payload
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut zeros = 0usize;

    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
        rbsp.push(byte);
    }

    rbsp
}

/// Bit reader over RBSP data
pub struct BitstreamReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    /// Bit within the current byte, 0 is the MSB
    bit_pos: u8,
}

impl<'a> BitstreamReader<'a> {
    /// Create a new bitstream reader
    pub fn new(data: &'a [u8]) -> Self {
        BitstreamReader {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// Current bit position in the stream
    pub fn position(&self) -> usize {
        self.byte_pos * 8 + self.bit_pos as usize
    }

    /// Number of unread bits
    pub fn bits_left(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.position())
    }

    /// Check if more data is available
    pub fn has_more_data(&self) -> bool {
        self.byte_pos < self.data.len()
    }

    /// Read a single bit (returns 0 or 1)
    pub fn read_bit(&mut self) -> Result<u8> {
        if self.byte_pos >= self.data.len() {
            return Err(Error::codec("Bitstream read past end"));
        }

        let byte = self.data[self.byte_pos];
        let bit = (byte >> (7 - self.bit_pos)) & 1;

        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }

        Ok(bit)
    }

    /// Read N bits as u32 (N <= 32)
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        if n > 32 {
            return Err(Error::codec("Cannot read more than 32 bits at once"));
        }

        let mut value = 0u64;
        for _ in 0..n {
            value = (value << 1) | u64::from(self.read_bit()?);
        }

        Ok(value as u32)
    }

    /// Read boolean (1 bit)
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_bit()? == 1)
    }

    /// Read unsigned Exp-Golomb coded value ue(v)
    pub fn read_ue(&mut self) -> Result<u32> {
        let mut leading_zeros = 0u32;
        while self.read_bit()? == 0 {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(Error::codec("Exp-Golomb code too long (>31 leading zeros)"));
            }
        }

        if leading_zeros == 0 {
            return Ok(0);
        }

        let info = self.read_bits(leading_zeros)?;
        let value = (1u64 << leading_zeros) - 1 + u64::from(info);
        u32::try_from(value).map_err(|_| Error::codec("Exp-Golomb value overflows u32"))
    }

    /// Read signed Exp-Golomb coded value se(v)
    pub fn read_se(&mut self) -> Result<i32> {
        let k = i64::from(self.read_ue()?);
        let value = if k % 2 == 1 { (k + 1) / 2 } else { -(k / 2) };
        Ok(value as i32)
    }

    /// Read a ue(v) and reject values above `max`
    pub fn read_ue_max(&mut self, max: u32, what: &str) -> Result<u32> {
        let value = self.read_ue()?;
        if value > max {
            return Err(Error::codec(format!(
                "{} out of range: {} (max {})",
                what, value, max
            )));
        }
        Ok(value)
    }

    /// Skip N bits
    pub fn skip_bits(&mut self, n: usize) -> Result<()> {
        if n > self.bits_left() {
            return Err(Error::codec("Bitstream skip past end"));
        }
        let pos = self.position() + n;
        self.byte_pos = pos / 8;
        self.bit_pos = (pos % 8) as u8;
        Ok(())
    }

    /// Align to byte boundary (skip to next byte)
    pub fn byte_align(&mut self) {
        if self.bit_pos != 0 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
    }

    /// True while syntax remains before the rbsp_stop_one_bit
    pub fn more_rbsp_data(&self) -> bool {
        // Locate the last set bit in the buffer: that is the stop bit.
        let Some(last) = self.data.iter().rposition(|&b| b != 0) else {
            return false;
        };
        let stop_bit = last * 8 + (7 - self.data[last].trailing_zeros() as usize);
        self.position() < stop_bit
    }
}
