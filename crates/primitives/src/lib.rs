// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! # Onyx Primitives
//!
//! Fixed-width values used throughout the ledger:
//! - `UInt160`: 160-bit value (addresses, script hashes)
//! - `UInt256`: 256-bit value (transaction and block hashes)
//!
//! Both are stored in wire (little-endian) byte order and rendered as
//! `0x`-prefixed hex in reversed order, the conventional display form.
//!
//! ## Example
//!
//! ```rust
//! use onyx_primitives::{UInt160, UInt256};
//!
//! let hash = UInt256::zero();
//! assert!(hash.is_zero());
//!
//! let address = UInt160::parse("0x0000000000000000000000000000000000000001").unwrap();
//! assert_eq!(address.as_bytes()[0], 1);
//! ```

mod error;
mod uint160;
mod uint256;

pub use error::{PrimitiveError, PrimitiveResult};
pub use uint160::{UInt160, UINT160_SIZE};
pub use uint256::{UInt256, UINT256_SIZE};
