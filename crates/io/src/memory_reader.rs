// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Bounds-checked little-endian reader over a borrowed byte slice.

use crate::{CodecError, CodecResult};

/// Reads little-endian encoded values from a byte slice.
pub struct MemoryReader<'a> {
    memory: &'a [u8],
    pos: usize,
}

impl<'a> MemoryReader<'a> {
    pub fn new(memory: &'a [u8]) -> Self {
        Self { memory, pos: 0 }
    }

    #[inline(always)]
    fn ensure_position(&self, move_by: usize) -> CodecResult<()> {
        let remaining = self.remaining();
        if move_by > remaining {
            Err(CodecError::Truncated {
                needed: move_by,
                remaining,
            })
        } else {
            Ok(())
        }
    }

    #[inline(always)]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.memory.len() - self.pos
    }

    pub fn peek(&self) -> CodecResult<u8> {
        self.ensure_position(1)?;
        Ok(self.memory[self.pos])
    }

    pub fn read_bool(&mut self) -> CodecResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::invalid_data(format!(
                "invalid boolean byte 0x{other:02x}"
            ))),
        }
    }

    #[inline(always)]
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        self.ensure_position(1)?;
        let value = self.memory[self.pos];
        self.pos += 1;
        Ok(value)
    }

    #[inline(always)]
    pub fn read_u16(&mut self) -> CodecResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    #[inline(always)]
    pub fn read_u32(&mut self) -> CodecResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    #[inline(always)]
    pub fn read_u64(&mut self) -> CodecResult<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Reads exactly `N` bytes into a fixed array.
    pub fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let bytes = self.read_memory(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Reads a variable-length integer no larger than `max`.
    ///
    /// Non-canonical encodings (a wider prefix than the value needs) are
    /// rejected so that every accepted input re-encodes to the same bytes.
    pub fn read_var_int(&mut self, max: u64) -> CodecResult<u64> {
        let b = self.read_u8()?;
        let (value, min) = match b {
            0xFD => (u64::from(self.read_u16()?), 0xFD),
            0xFE => (u64::from(self.read_u32()?), 0x1_0000),
            0xFF => (self.read_u64()?, 0x1_0000_0000),
            _ => (u64::from(b), 0),
        };
        if value < min {
            return Err(CodecError::invalid_data(format!(
                "non-canonical varint 0x{b:02x} for value {value}"
            )));
        }
        if value > max {
            return Err(CodecError::Overflow { value, max });
        }
        Ok(value)
    }

    #[inline(always)]
    pub fn read_memory(&mut self, count: usize) -> CodecResult<&'a [u8]> {
        self.ensure_position(count)?;
        let result = &self.memory[self.pos..self.pos + count];
        self.pos += count;
        Ok(result)
    }

    /// Reads a varint length (at most `max`) followed by that many bytes.
    pub fn read_var_memory(&mut self, max: usize) -> CodecResult<&'a [u8]> {
        let length = self.read_var_int(max as u64)? as usize;
        self.read_memory(length)
    }

    pub fn read_var_bytes(&mut self, max: usize) -> CodecResult<Vec<u8>> {
        Ok(self.read_var_memory(max)?.to_vec())
    }

    /// Fails with [`CodecError::BadLength`] if any bytes are left unread.
    pub fn ensure_end(&self) -> CodecResult<()> {
        match self.remaining() {
            0 => Ok(()),
            extra => Err(CodecError::bad_length(format!("{extra} trailing bytes"))),
        }
    }
}
