//! Reed-Solomon coder over the systematic Cauchy matrix.

use tracing::debug;

use crate::buffer::Slot;
use crate::cache::{CacheKey, DecodeCache};
use crate::construct;
use crate::dump;
use crate::error::Error;
use crate::kernel::{self, CodingTables};
use crate::matrix::Matrix;
use crate::plan::{self, DecodePlan};
use crate::schema::{CodeFamily, Schema};

fn require_rs(schema: &Schema) -> Result<(), Error> {
    if schema.family() != CodeFamily::ReedSolomon {
        return Err(Error::InvalidSchema(format!(
            "Reed-Solomon coder built from a {:?} schema",
            schema.family()
        )));
    }
    Ok(())
}

/// Computes `r` parity units from `k` data units.
#[derive(Debug, Clone)]
pub struct RsEncoder {
    schema: Schema,
    encode_matrix: Matrix,
    tables: CodingTables,
}

impl RsEncoder {
    /// # Errors
    /// Returns `InvalidSchema` for a non Reed-Solomon schema.
    pub fn new(schema: Schema) -> Result<Self, Error> {
        require_rs(&schema)?;
        let n = schema.total_units();
        let k = schema.data_units();
        let generator = construct::cauchy_matrix(n, k)?;
        let parity_rows: Vec<usize> = (k..n).collect();
        let encode_matrix = generator.select_rows(&parity_rows);
        let tables = CodingTables::new(&encode_matrix);
        if schema.allow_verbose_dump() {
            dump::dump_matrix("rs encode matrix", &encode_matrix);
            dump::dump_tables("rs encode tables", &tables);
        }
        debug!(k, r = n - k, "built Reed-Solomon encoder");
        Ok(Self {
            schema,
            encode_matrix,
            tables,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Parity rows of the generator, `r x k`.
    pub fn encode_matrix(&self) -> &Matrix {
        &self.encode_matrix
    }

    /// Fill `parity` from `data`.
    ///
    /// # Arguments
    /// * `data` - `k` data units of one common length
    /// * `parity` - `r` output buffers of that same length, overwritten
    ///
    /// # Errors
    /// Returns `UnitCount` or `LengthMismatch` for malformed buffers.
    pub fn encode(&self, data: &[&[u8]], parity: &mut [&mut [u8]]) -> Result<(), Error> {
        check_count(self.schema.data_units(), data.len())?;
        check_count(self.schema.parity_units(), parity.len())?;
        kernel::encode_data(&self.tables, data, parity)
    }
}

/// Reconstructs erased units from any `k` survivors.
#[derive(Debug)]
pub struct RsDecoder {
    schema: Schema,
    generator: Matrix,
    pcm: Matrix,
    cache: DecodeCache,
}

impl RsDecoder {
    /// # Errors
    /// Returns `InvalidSchema` for a non Reed-Solomon schema.
    pub fn new(schema: Schema) -> Result<Self, Error> {
        require_rs(&schema)?;
        let n = schema.total_units();
        let k = schema.data_units();
        let generator = construct::cauchy_matrix(n, k)?;
        let pcm = construct::cauchy_pcm(n, k)?;
        if schema.allow_verbose_dump() {
            dump::dump_matrix("rs generator", &generator);
            if schema.use_pcm() {
                dump::dump_matrix("rs parity check", &pcm);
            }
        }
        Ok(Self {
            schema,
            generator,
            pcm,
            cache: DecodeCache::new(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of decode plans derived so far.
    pub fn plan_builds(&self) -> u64 {
        self.cache.builds()
    }

    /// Number of decode calls served from the cached plan.
    pub fn plan_hits(&self) -> u64 {
        self.cache.hits()
    }

    /// Plan used by the most recent successful decode.
    pub fn cached_plan(&self) -> Option<&DecodePlan> {
        self.cache.cached()
    }

    /// Recover the units listed in `erased` into `outputs`, in that order.
    ///
    /// # Arguments
    /// * `inputs` - `n` slots; erased indexes are ignored even when present
    /// * `erased` - strictly increasing unit indexes, at most `r`
    /// * `outputs` - one buffer per erased index, decode length each
    ///
    /// With no present input the call does nothing.
    ///
    /// # Errors
    /// * `UnitCount` - wrong number of slots or outputs
    /// * `InvalidErasure` - malformed erasure pattern
    /// * `LengthMismatch` - buffers of differing lengths
    /// * `InsufficientInputs` - fewer than `k` valid units
    pub fn decode(&mut self, inputs: &[Slot], erased: &[usize], outputs: &mut [&mut [u8]]) -> Result<(), Error> {
        let n = self.schema.total_units();
        let k = self.schema.data_units();
        check_count(n, inputs.len())?;
        plan::validate_erasures(erased, n, self.schema.parity_units())?;
        check_count(erased.len(), outputs.len())?;

        let Some(len) = decode_length(inputs, erased) else {
            return Ok(());
        };
        let valid = valid_indexes(inputs, erased, len)?;
        check_output_lengths(outputs, len)?;
        if valid.len() < k {
            return Err(Error::InsufficientInputs {
                needed: k,
                got: valid.len(),
            });
        }
        if erased.is_empty() {
            return Ok(());
        }

        let generator = &self.generator;
        let pcm = &self.pcm;
        let use_pcm = self.schema.use_pcm();
        let verbose = self.schema.allow_verbose_dump();
        let key = CacheKey {
            erased: erased.to_vec(),
            valid,
        };
        let plan = self.cache.plan(key, |key| {
            let plan = if use_pcm {
                DecodePlan::from_parity_check(pcm, k, &key.erased, &key.valid)?
            } else {
                DecodePlan::from_generator(generator, &key.erased, &key.valid)?
            };
            if verbose {
                dump::dump_matrix("rs decode matrix", &plan.matrix);
            }
            Ok(plan)
        })?;

        let sources: Vec<&[u8]> = plan
            .inputs
            .iter()
            .map(|&i| inputs[i].bytes().unwrap_or(&[]))
            .collect();
        kernel::encode_data(&plan.tables, &sources, outputs)
    }
}

pub(crate) fn check_count(expected: usize, got: usize) -> Result<(), Error> {
    if expected != got {
        return Err(Error::UnitCount { expected, got });
    }
    Ok(())
}

/// Length of the first present, non-erased input.
pub(crate) fn decode_length(inputs: &[Slot], erased: &[usize]) -> Option<usize> {
    inputs
        .iter()
        .enumerate()
        .filter(|(i, _)| erased.binary_search(i).is_err())
        .find_map(|(_, slot)| slot.bytes().map(<[u8]>::len))
}

/// Present, non-erased indexes; each must be `len` bytes.
pub(crate) fn valid_indexes(inputs: &[Slot], erased: &[usize], len: usize) -> Result<Vec<usize>, Error> {
    let mut valid = Vec::with_capacity(inputs.len());
    for (i, slot) in inputs.iter().enumerate() {
        if erased.binary_search(&i).is_ok() {
            continue;
        }
        if let Some(bytes) = slot.bytes() {
            if bytes.len() != len {
                return Err(Error::LengthMismatch {
                    expected: len,
                    got: bytes.len(),
                });
            }
            valid.push(i);
        }
    }
    Ok(valid)
}

pub(crate) fn check_output_lengths(outputs: &[&mut [u8]], len: usize) -> Result<(), Error> {
    match outputs.iter().find(|o| o.len() != len) {
        Some(o) => Err(Error::LengthMismatch {
            expected: len,
            got: o.len(),
        }),
        None => Ok(()),
    }
}
