//! Bit-field extraction over raw section buffers.
//!
//! Every table parser is written as a series of extractions at the offsets
//! mandated by ISO/IEC 13818-1 / EN 300 468. Offsets are counted from the
//! first byte of the section (the table_id).

use std::io;

use bitstream_io::{BigEndian, BitRead, BitReader};

use crate::error::{ParseError, Result};

/// Reads `bit_width` bits (MSB first) starting `bit_offset` bits into `buffer`.
pub fn extract(buffer: &[u8], bit_offset: usize, bit_width: u32) -> Result<u32> {
    if bit_width == 0 || bit_width > 32 {
        return Err(ParseError::InvalidWidth(bit_width));
    }
    let needed = (bit_offset + bit_width as usize).div_ceil(8);
    require(buffer, needed)?;

    let first = bit_offset / 8;
    let mut br = BitReader::endian(&buffer[first..needed], BigEndian);
    let value: io::Result<u32> = br
        .skip((bit_offset % 8) as u32)
        .and_then(|()| br.read_var::<u32>(bit_width));
    value.map_err(|_| ParseError::Truncated {
        needed,
        available: buffer.len(),
    })
}

/// Whole byte at `offset`.
pub fn u8_at(buffer: &[u8], offset: usize) -> Result<u8> {
    Ok(extract(buffer, offset * 8, 8)? as u8)
}

/// Big-endian 16-bit value at `offset`.
pub fn u16_at(buffer: &[u8], offset: usize) -> Result<u16> {
    Ok(extract(buffer, offset * 8, 16)? as u16)
}

/// Low `width` bits of the 16-bit value at `offset` (pids, lengths).
pub fn low_bits_u16(buffer: &[u8], offset: usize, width: u32) -> Result<u16> {
    Ok(extract(buffer, offset * 8 + (16 - width as usize), width)? as u16)
}

/// Fails unless `buffer` holds at least `needed` bytes.
pub fn require(buffer: &[u8], needed: usize) -> Result<()> {
    if buffer.len() < needed {
        return Err(ParseError::Truncated {
            needed,
            available: buffer.len(),
        });
    }
    Ok(())
}
