//! Family-independent coder traits, the dispatching facade and a
//! thread-shareable decoder.

use parking_lot::Mutex;

use crate::buffer::Slot;
use crate::error::Error;
use crate::msr::{MsrDecoder, MsrEncoder};
use crate::rs::{RsDecoder, RsEncoder};
use crate::schema::{CodeFamily, CoderOptions, Schema};

/// Computes parity units from data units.
pub trait RawEncoder {
    fn schema(&self) -> &Schema;

    /// `k` data units in, `r` parity units out, all of one length.
    fn encode(&self, data: &[&[u8]], parity: &mut [&mut [u8]]) -> Result<(), Error>;
}

/// Reconstructs erased units from survivors.
pub trait RawDecoder {
    fn schema(&self) -> &Schema;

    /// `n` slots in, one output per erased index.
    fn decode(&mut self, inputs: &[Slot], erased: &[usize], outputs: &mut [&mut [u8]]) -> Result<(), Error>;
}

impl RawEncoder for RsEncoder {
    fn schema(&self) -> &Schema {
        RsEncoder::schema(self)
    }

    fn encode(&self, data: &[&[u8]], parity: &mut [&mut [u8]]) -> Result<(), Error> {
        RsEncoder::encode(self, data, parity)
    }
}

impl RawEncoder for MsrEncoder {
    fn schema(&self) -> &Schema {
        MsrEncoder::schema(self)
    }

    fn encode(&self, data: &[&[u8]], parity: &mut [&mut [u8]]) -> Result<(), Error> {
        MsrEncoder::encode(self, data, parity)
    }
}

impl RawDecoder for RsDecoder {
    fn schema(&self) -> &Schema {
        RsDecoder::schema(self)
    }

    fn decode(&mut self, inputs: &[Slot], erased: &[usize], outputs: &mut [&mut [u8]]) -> Result<(), Error> {
        RsDecoder::decode(self, inputs, erased, outputs)
    }
}

impl RawDecoder for MsrDecoder {
    fn schema(&self) -> &Schema {
        MsrDecoder::schema(self)
    }

    fn decode(&mut self, inputs: &[Slot], erased: &[usize], outputs: &mut [&mut [u8]]) -> Result<(), Error> {
        MsrDecoder::decode(self, inputs, erased, outputs)
    }
}

/// Encoder and decoder pair for whichever family the options select.
///
/// ```
/// use regen_ec::{CoderOptions, ErasureCoder, Slot};
///
/// let mut coder = ErasureCoder::new(&CoderOptions::new(2, 1)).unwrap();
/// let (a, b) = (vec![1u8; 8], vec![2u8; 8]);
/// let mut parity = vec![0u8; 8];
/// coder.encode(&[&a, &b], &mut [&mut parity]).unwrap();
///
/// let mut recovered = vec![0u8; 8];
/// let slots = [Slot::Absent, Slot::present(&b), Slot::present(&parity)];
/// coder.decode(&slots, &[0], &mut [&mut recovered]).unwrap();
/// assert_eq!(recovered, a);
/// ```
#[derive(Debug)]
pub enum ErasureCoder {
    ReedSolomon { encoder: RsEncoder, decoder: RsDecoder },
    Msr { encoder: MsrEncoder, decoder: MsrDecoder },
}

impl ErasureCoder {
    /// # Errors
    /// Returns the schema or construction error for invalid options.
    pub fn new(options: &CoderOptions) -> Result<Self, Error> {
        let schema = Schema::new(options)?;
        Ok(match schema.family() {
            CodeFamily::ReedSolomon => ErasureCoder::ReedSolomon {
                encoder: RsEncoder::new(schema.clone())?,
                decoder: RsDecoder::new(schema)?,
            },
            CodeFamily::Msr => ErasureCoder::Msr {
                encoder: MsrEncoder::new(schema.clone())?,
                decoder: MsrDecoder::new(schema)?,
            },
        })
    }

    pub fn encoder(&self) -> &dyn RawEncoder {
        match self {
            ErasureCoder::ReedSolomon { encoder, .. } => encoder,
            ErasureCoder::Msr { encoder, .. } => encoder,
        }
    }

    pub fn decoder_mut(&mut self) -> &mut dyn RawDecoder {
        match self {
            ErasureCoder::ReedSolomon { decoder, .. } => decoder,
            ErasureCoder::Msr { decoder, .. } => decoder,
        }
    }

    pub fn schema(&self) -> &Schema {
        self.encoder().schema()
    }

    pub fn encode(&self, data: &[&[u8]], parity: &mut [&mut [u8]]) -> Result<(), Error> {
        self.encoder().encode(data, parity)
    }

    pub fn decode(&mut self, inputs: &[Slot], erased: &[usize], outputs: &mut [&mut [u8]]) -> Result<(), Error> {
        self.decoder_mut().decode(inputs, erased, outputs)
    }
}

/// A decoder callable through `&self` from many threads.
///
/// Calls are serialized by a mutex, which also guards the decode cache, so
/// a plan is rebuilt and used inside one critical section.
#[derive(Debug)]
pub struct SharedDecoder<D> {
    inner: Mutex<D>,
}

impl<D: RawDecoder> SharedDecoder<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            inner: Mutex::new(decoder),
        }
    }

    pub fn decode(&self, inputs: &[Slot], erased: &[usize], outputs: &mut [&mut [u8]]) -> Result<(), Error> {
        self.inner.lock().decode(inputs, erased, outputs)
    }

    /// Run `f` with exclusive access to the decoder.
    pub fn with<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn into_inner(self) -> D {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_facade_dispatch() {
        let rs = ErasureCoder::new(&CoderOptions::new(4, 2)).unwrap();
        assert!(matches!(rs, ErasureCoder::ReedSolomon { .. }));
        assert_eq!(rs.schema().sub_packets(), 1);

        let msr = ErasureCoder::new(&CoderOptions::new(3, 3).family(CodeFamily::Msr)).unwrap();
        assert!(matches!(msr, ErasureCoder::Msr { .. }));
        assert_eq!(msr.schema().sub_packets(), 9);

        assert!(ErasureCoder::new(&CoderOptions::new(4, 3).family(CodeFamily::Msr)).is_err());
    }

    #[test]
    fn test_shared_decoder_across_threads() {
        let schema = Schema::new(&CoderOptions::new(3, 2)).unwrap();
        let encoder = RsEncoder::new(schema.clone()).unwrap();
        let shared = Arc::new(SharedDecoder::new(RsDecoder::new(schema).unwrap()));

        let data: Vec<Vec<u8>> = (0..3u8).map(|i| vec![i + 1; 64]).collect();
        let refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
        let mut p0 = vec![0u8; 64];
        let mut p1 = vec![0u8; 64];
        encoder.encode(&refs, &mut [&mut p0, &mut p1]).unwrap();
        let units = Arc::new(vec![data[0].clone(), data[1].clone(), data[2].clone(), p0, p1]);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = Arc::clone(&shared);
                let units = Arc::clone(&units);
                std::thread::spawn(move || {
                    let erased = [t % 5];
                    let slots: Vec<Slot> = units
                        .iter()
                        .enumerate()
                        .map(|(i, u)| if i == erased[0] { Slot::Absent } else { Slot::present(u) })
                        .collect();
                    let mut out = vec![0u8; 64];
                    shared.decode(&slots, &erased, &mut [&mut out]).unwrap();
                    assert_eq!(out, units[erased[0]]);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(shared.with(|d| d.plan_builds() + d.plan_hits()), 4);
    }
}
