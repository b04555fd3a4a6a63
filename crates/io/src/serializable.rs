// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Serialization traits and utilities for wire objects.

use crate::{BinaryWriter, CodecResult, MemoryReader};

/// Represents objects with a deterministic binary encoding.
pub trait Serializable {
    /// The size of the object in bytes after serialization.
    fn size(&self) -> usize;

    /// Serializes the object using the specified BinaryWriter.
    fn serialize(&self, writer: &mut BinaryWriter);

    /// Deserializes the object using the specified MemoryReader.
    fn deserialize(reader: &mut MemoryReader) -> CodecResult<Self>
    where
        Self: Sized;
}

/// Extension methods for serializable objects.
pub trait SerializableExt: Serializable {
    /// Converts the object to a byte array.
    fn to_array(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(self.size());
        self.serialize(&mut writer);
        writer.into_bytes()
    }

    /// Creates an object from a byte array, rejecting trailing bytes.
    fn from_array(data: &[u8]) -> CodecResult<Self>
    where
        Self: Sized,
    {
        let mut reader = MemoryReader::new(data);
        let value = Self::deserialize(&mut reader)?;
        reader.ensure_end()?;
        Ok(value)
    }
}

impl<T: Serializable> SerializableExt for T {}

/// Helper functions for serialization.
pub mod helper {
    use super::Serializable;
    use crate::{BinaryWriter, CodecResult, MemoryReader};

    /// Serializes a collection of serializable objects.
    pub fn serialize_array<T: Serializable>(items: &[T], writer: &mut BinaryWriter) {
        writer.write_var_int(items.len() as u64);
        for item in items {
            item.serialize(writer);
        }
    }

    /// Deserializes a collection of serializable objects.
    pub fn deserialize_array<T: Serializable>(
        reader: &mut MemoryReader,
        max: usize,
    ) -> CodecResult<Vec<T>> {
        let count = reader.read_var_int(max as u64)? as usize;
        // Capacity is bounded by what the remaining input could possibly hold.
        let mut items = Vec::with_capacity(count.min(reader.remaining()));
        for _ in 0..count {
            items.push(T::deserialize(reader)?);
        }
        Ok(items)
    }

    /// Gets the size of a serialized array.
    pub fn get_array_size<T: Serializable>(items: &[T]) -> usize {
        let mut size = get_var_size(items.len() as u64);
        for item in items {
            size += item.size();
        }
        size
    }

    /// Gets the size of a variable-length integer.
    pub fn get_var_size(value: u64) -> usize {
        if value < 0xFD {
            1
        } else if value <= 0xFFFF {
            3
        } else if value <= 0xFFFF_FFFF {
            5
        } else {
            9
        }
    }

    /// Gets the size of a length-prefixed byte string.
    pub fn get_var_bytes_size(bytes: &[u8]) -> usize {
        get_var_size(bytes.len() as u64) + bytes.len()
    }
}
