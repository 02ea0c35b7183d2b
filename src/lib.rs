//! regen-ec - Reed-Solomon and MSR Erasure Coding over GF(256)
//!
//! A raw erasure-coding engine. `k` data units are extended with `r` parity
//! units; any sufficient subset of the `n = k + r` units reconstructs the rest.
//!
//! Two code families are provided:
//!
//! - **Reed-Solomon**: systematic Cauchy code. Any `k` units recover the data.
//! - **MSR** (minimum-storage regenerating): each unit is split into
//!   `l = r^(n/r)` sub-units. Any `k` units still recover the data, and a single
//!   lost unit is rebuilt from only `(n-1)*l/r` sub-units of the survivors.
//!
//! The field is GF(2^8) with polynomial 0x11d and generator 2.
//!
//! # Example
//!
//! ```rust
//! use regen_ec::{CoderOptions, RsDecoder, RsEncoder, Schema, Slot};
//!
//! // 4 data units, 2 parity units
//! let schema = Schema::new(&CoderOptions::new(4, 2)).unwrap();
//! let encoder = RsEncoder::new(schema.clone()).unwrap();
//! let mut decoder = RsDecoder::new(schema).unwrap();
//!
//! let data: Vec<Vec<u8>> = (0..4u8).map(|i| vec![i; 1024]).collect();
//! let refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
//! let mut p0 = vec![0u8; 1024];
//! let mut p1 = vec![0u8; 1024];
//! encoder.encode(&refs, &mut [&mut p0, &mut p1]).unwrap();
//!
//! // Lose unit 0 and parity unit 5
//! let slots = [
//!     Slot::Absent,
//!     Slot::present(&data[1]),
//!     Slot::present(&data[2]),
//!     Slot::present(&data[3]),
//!     Slot::present(&p0),
//!     Slot::Absent,
//! ];
//! let mut d0 = vec![0u8; 1024];
//! let mut q1 = vec![0u8; 1024];
//! decoder.decode(&slots, &[0, 5], &mut [&mut d0, &mut q1]).unwrap();
//! assert_eq!(d0, data[0]);
//! assert_eq!(q1, p1);
//! ```

pub mod buffer;
pub mod cache;
pub mod coder;
pub mod construct;
pub mod dump;
pub mod error;
pub mod gf;
pub mod kernel;
pub mod matrix;
pub mod msr;
pub mod plan;
pub mod radix;
pub mod rs;
pub mod schema;

#[cfg(test)]
mod tests;

pub use buffer::{Slot, Span, Window};
pub use coder::{ErasureCoder, RawDecoder, RawEncoder, SharedDecoder};
pub use error::Error;
pub use matrix::Matrix;
pub use msr::{MsrDecoder, MsrEncoder, RepairPlan};
pub use rs::{RsDecoder, RsEncoder};
pub use schema::{BufferMode, CodeFamily, CoderOptions, Schema};
