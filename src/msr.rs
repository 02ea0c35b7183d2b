//! Minimum-storage regenerating (MSR) coder.
//!
//! Each unit is split into `l = r^(n/r)` sub-units (see [`crate::buffer`] for
//! the byte layout). Parity comes from the systematic form of the MSR
//! parity-check matrix. A single lost node is rebuilt from `l/r` sub-units of
//! each survivor instead of `k` whole units.

use tracing::debug;

use crate::buffer::{self, Interleave, Slot, SubRef};
use crate::cache::{CacheKey, DecodeCache};
use crate::construct;
use crate::dump;
use crate::error::Error;
use crate::kernel::{self, CodingTables};
use crate::matrix::Matrix;
use crate::plan::{self, DecodePlan};
use crate::rs::{check_count, check_output_lengths, decode_length, valid_indexes};
use crate::schema::{CodeFamily, Schema};

fn require_msr(schema: &Schema) -> Result<(), Error> {
    if schema.family() != CodeFamily::Msr {
        return Err(Error::InvalidSchema(format!(
            "MSR coder built from a {:?} schema",
            schema.family()
        )));
    }
    Ok(())
}

fn layout_of(schema: &Schema) -> Interleave {
    Interleave::new(schema.sub_packets(), schema.slice_unit())
}

/// Flat sub-unit indexes of every listed node.
fn node_subunits(nodes: &[usize], l: usize) -> Vec<usize> {
    nodes.iter().flat_map(|&node| node * l..(node + 1) * l).collect()
}

// =============================================================================
// Encoder
// =============================================================================

#[derive(Debug, Clone)]
pub struct MsrEncoder {
    schema: Schema,
    layout: Interleave,
    parity_check: Matrix,
    encode_matrix: Matrix,
    tables: CodingTables,
}

impl MsrEncoder {
    /// # Errors
    /// Returns `InvalidSchema` for a non-MSR schema and `SingularMatrix` if
    /// the parity block of the MSR matrix cannot be inverted.
    pub fn new(schema: Schema) -> Result<Self, Error> {
        require_msr(&schema)?;
        let n = schema.total_units();
        let k = schema.data_units();
        let parity_check = construct::msr_matrix(n, k)?;
        let encode_matrix = construct::msr_encode_matrix(&parity_check, n, k)?;
        let tables = CodingTables::new(&encode_matrix);
        if schema.allow_verbose_dump() {
            dump::dump_matrix("msr parity check", &parity_check);
            dump::dump_matrix("msr encode matrix", &encode_matrix);
            dump::dump_tables("msr encode tables", &tables);
        }
        debug!(k, r = n - k, l = schema.sub_packets(), "built MSR encoder");
        Ok(Self {
            layout: layout_of(&schema),
            schema,
            parity_check,
            encode_matrix,
            tables,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// `r*l x n*l` parity-check matrix.
    pub fn parity_check_matrix(&self) -> &Matrix {
        &self.parity_check
    }

    /// `r*l x k*l` parity encode matrix.
    pub fn encode_matrix(&self) -> &Matrix {
        &self.encode_matrix
    }

    /// Fill `parity` from `data`.
    ///
    /// # Arguments
    /// * `data` - `k` data units, one common length that is a multiple of the
    ///   slice unit
    /// * `parity` - `r` output buffers of that length, overwritten
    ///
    /// # Errors
    /// Returns `UnitCount`, `LengthMismatch` or `UnalignedLength` for
    /// malformed buffers.
    pub fn encode(&self, data: &[&[u8]], parity: &mut [&mut [u8]]) -> Result<(), Error> {
        let k = self.schema.data_units();
        let l = self.schema.sub_packets();
        check_count(k, data.len())?;
        check_count(self.schema.parity_units(), parity.len())?;
        let len = data.first().map_or(0, |d| d.len());
        let inputs: Vec<SubRef> = (0..k * l).map(|i| SubRef::from_flat(i, l)).collect();
        buffer::run_interleaved(
            self.schema.buffer_mode(),
            self.layout,
            &self.tables,
            data,
            &inputs,
            parity,
            len,
        )
    }

    /// Encode pre-split sub-units: `k*l` inputs (`node * l + slot`) into
    /// `r*l` outputs, all of one length.
    ///
    /// # Errors
    /// Returns `UnitCount` or `LengthMismatch` for malformed buffers.
    pub fn encode_subunits(&self, data: &[&[u8]], parity: &mut [&mut [u8]]) -> Result<(), Error> {
        kernel::encode_data(&self.tables, data, parity)
    }
}

// =============================================================================
// Repair plan
// =============================================================================

/// Sub-units a decode of a given erasure pattern reads from each node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairPlan {
    nodes: usize,
    sub_packets: usize,
    required: Vec<bool>,
}

impl RepairPlan {
    fn new(nodes: usize, sub_packets: usize) -> Self {
        Self {
            nodes,
            sub_packets,
            required: vec![false; nodes * sub_packets],
        }
    }

    fn mark(&mut self, node: usize, slot: usize) {
        self.required[node * self.sub_packets + slot] = true;
    }

    pub fn is_required(&self, node: usize, slot: usize) -> bool {
        self.required[node * self.sub_packets + slot]
    }

    /// Slots of `node` the decode reads.
    pub fn node_slots(&self, node: usize) -> Vec<usize> {
        (0..self.sub_packets).filter(|&s| self.is_required(node, s)).collect()
    }

    /// Total sub-units read.
    pub fn count(&self) -> usize {
        self.required.iter().filter(|&&r| r).count()
    }

    /// Flat `node * l + slot` indexes of every required sub-unit.
    pub fn required_subunits(&self) -> Vec<usize> {
        (0..self.nodes * self.sub_packets)
            .filter(|&i| self.required[i])
            .collect()
    }
}

// =============================================================================
// Decoder
// =============================================================================

#[derive(Debug)]
pub struct MsrDecoder {
    schema: Schema,
    layout: Interleave,
    parity_check: Matrix,
    generator: Matrix,
    cache: DecodeCache,
}

impl MsrDecoder {
    /// # Errors
    /// Same as [`MsrEncoder::new`].
    pub fn new(schema: Schema) -> Result<Self, Error> {
        require_msr(&schema)?;
        let n = schema.total_units();
        let k = schema.data_units();
        let parity_check = construct::msr_matrix(n, k)?;
        let encode_matrix = construct::msr_encode_matrix(&parity_check, n, k)?;
        let generator = construct::systematic_generator(&encode_matrix)?;
        if schema.allow_verbose_dump() {
            dump::dump_matrix("msr parity check", &parity_check);
        }
        Ok(Self {
            layout: layout_of(&schema),
            schema,
            parity_check,
            generator,
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

    /// Sub-units needed to decode `erased` when every other node is present.
    ///
    /// One erasure reads `l/r` slots of each survivor. Otherwise the first
    /// `k` surviving nodes are read in full.
    ///
    /// # Errors
    /// Returns `InvalidErasure` for a malformed erasure pattern.
    pub fn repair_plan(&self, erased: &[usize]) -> Result<RepairPlan, Error> {
        let n = self.schema.total_units();
        let r = self.schema.parity_units();
        let l = self.schema.sub_packets();
        plan::validate_erasures(erased, n, r)?;

        let mut out = RepairPlan::new(n, l);
        match erased {
            [] => {}
            [node] => {
                let slots = plan::repair_slots(*node, n, r);
                for p in (0..n).filter(|p| p != node) {
                    for &slot in &slots {
                        out.mark(p, slot);
                    }
                }
            }
            _ => {
                let survivors = (0..n).filter(|p| erased.binary_search(p).is_err());
                for p in survivors.take(self.schema.data_units()) {
                    for slot in 0..l {
                        out.mark(p, slot);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Recover the units listed in `erased` into `outputs`, in that order.
    ///
    /// A single erasure with every other node present reads only the repair
    /// slots; any other pattern decodes from `k` whole survivors.
    ///
    /// # Errors
    /// * `UnitCount` - wrong number of slots or outputs
    /// * `InvalidErasure` - malformed erasure pattern
    /// * `LengthMismatch` / `UnalignedLength` - bad buffer lengths
    /// * `InsufficientInputs` - fewer than `k` valid units
    pub fn decode(&mut self, inputs: &[Slot], erased: &[usize], outputs: &mut [&mut [u8]]) -> Result<(), Error> {
        let n = self.schema.total_units();
        let k = self.schema.data_units();
        let l = self.schema.sub_packets();
        check_count(n, inputs.len())?;
        plan::validate_erasures(erased, n, self.schema.parity_units())?;
        check_count(erased.len(), outputs.len())?;

        let Some(len) = decode_length(inputs, erased) else {
            return Ok(());
        };
        let valid = valid_indexes(inputs, erased, len)?;
        check_output_lengths(outputs, len)?;
        self.layout.check_aligned(len)?;
        if valid.len() < k {
            return Err(Error::InsufficientInputs {
                needed: k,
                got: valid.len(),
            });
        }
        if erased.is_empty() {
            return Ok(());
        }

        let mode = self.schema.buffer_mode();
        let layout = self.layout;
        let plan = self.plan_for(erased, node_subunits(&valid, l))?;

        let units: Vec<&[u8]> = inputs.iter().map(|s| s.bytes().unwrap_or(&[])).collect();
        let sources: Vec<SubRef> = plan.inputs.iter().map(|&i| SubRef::from_flat(i, l)).collect();
        buffer::run_interleaved(mode, layout, &plan.tables, &units, &sources, outputs, len)
    }

    /// Decode pre-split sub-units.
    ///
    /// # Arguments
    /// * `inputs` - `n*l` slots indexed `node * l + slot`
    /// * `erased` - erased node indexes
    /// * `outputs` - `l` buffers per erased node, node-major
    ///
    /// Only the sub-units the chosen path reads need to be present, so a
    /// single-node repair can be fed exactly the [`RepairPlan`] sub-units.
    ///
    /// # Errors
    /// As [`MsrDecoder::decode`], with `InsufficientInputs` counted in
    /// sub-units.
    pub fn decode_subunits(
        &mut self,
        inputs: &[Slot],
        erased: &[usize],
        outputs: &mut [&mut [u8]],
    ) -> Result<(), Error> {
        let n = self.schema.total_units();
        let l = self.schema.sub_packets();
        check_count(n * l, inputs.len())?;
        plan::validate_erasures(erased, n, self.schema.parity_units())?;
        check_count(erased.len() * l, outputs.len())?;

        let erased_subs = node_subunits(erased, l);
        let Some(len) = decode_length(inputs, &erased_subs) else {
            return Ok(());
        };
        let valid = valid_indexes(inputs, &erased_subs, len)?;
        check_output_lengths(outputs, len)?;
        if erased.is_empty() {
            return Ok(());
        }

        let plan = self.plan_for(erased, valid)?;
        let sources: Vec<&[u8]> = plan
            .inputs
            .iter()
            .map(|&i| inputs[i].bytes().unwrap_or(&[]))
            .collect();
        kernel::encode_data(&plan.tables, &sources, outputs)
    }

    /// Cached plan for erased nodes given the valid sub-unit set.
    fn plan_for(&mut self, erased: &[usize], valid: Vec<usize>) -> Result<&DecodePlan, Error> {
        let n = self.schema.total_units();
        let r = self.schema.parity_units();
        let l = self.schema.sub_packets();
        let dimension = self.schema.data_units() * l;
        let use_pcm = self.schema.use_pcm();
        let verbose = self.schema.allow_verbose_dump();
        let parity_check = &self.parity_check;
        let generator = &self.generator;

        let key = CacheKey {
            erased: node_subunits(erased, l),
            valid,
        };
        self.cache.plan(key, |key| {
            let plan = match erased {
                [node] if repair_inputs_available(*node, n, r, l, &key.valid) => {
                    DecodePlan::msr_repair(parity_check, n, r, *node)?
                }
                _ if use_pcm => DecodePlan::from_parity_check(parity_check, dimension, &key.erased, &key.valid)?,
                _ => DecodePlan::from_generator(generator, &key.erased, &key.valid)?,
            };
            if verbose {
                dump::dump_matrix("msr decode matrix", &plan.matrix);
            }
            Ok(plan)
        })
    }
}

fn repair_inputs_available(node: usize, n: usize, r: usize, l: usize, valid: &[usize]) -> bool {
    let slots = plan::repair_slots(node, n, r);
    (0..n)
        .filter(|&p| p != node)
        .all(|p| slots.iter().all(|&b| valid.binary_search(&(p * l + b)).is_ok()))
}
