// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! # Onyx IO
//!
//! Deterministic binary codec shared by the ledger and consensus wire formats.
//!
//! All multi-byte integers are little-endian. Variable-length byte strings and
//! arrays are prefixed with a varint count. Decoding is strict: lengths are
//! bounded, varints must be canonical, and [`SerializableExt::from_array`]
//! rejects trailing bytes.
//!
//! ## Example
//!
//! ```rust
//! use onyx_io::{BinaryWriter, MemoryReader};
//!
//! let mut writer = BinaryWriter::new();
//! writer.write_u32(7);
//! writer.write_var_bytes(b"abc");
//! let bytes = writer.into_bytes();
//!
//! let mut reader = MemoryReader::new(&bytes);
//! assert_eq!(reader.read_u32().unwrap(), 7);
//! assert_eq!(reader.read_var_bytes(16).unwrap(), b"abc");
//! assert!(reader.ensure_end().is_ok());
//! ```

mod binary_writer;
mod error;
mod memory_reader;
mod serializable;

pub use binary_writer::BinaryWriter;
pub use error::{CodecError, CodecResult};
pub use memory_reader::MemoryReader;
pub use serializable::{helper, Serializable, SerializableExt};
