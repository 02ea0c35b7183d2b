//! Decode-matrix derivation for one erasure pattern.
//!
//! Indexes here are flat: a unit index for Reed-Solomon, `node * l + slot`
//! for MSR sub-units.

use tracing::debug;

use crate::error::Error;
use crate::kernel::CodingTables;
use crate::matrix::Matrix;
use crate::radix;

/// Which inputs to read, which outputs to write and how.
///
/// Output `i` is `sum_j matrix[i][j] * input j`, where input `j` is the
/// buffer at flat index `inputs[j]` and output `i` lands at `outputs[i]`.
#[derive(Debug, Clone)]
pub struct DecodePlan {
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
    pub matrix: Matrix,
    pub tables: CodingTables,
}

impl DecodePlan {
    fn new(inputs: Vec<usize>, outputs: Vec<usize>, matrix: Matrix) -> Self {
        let tables = CodingTables::new(&matrix);
        Self {
            inputs,
            outputs,
            matrix,
            tables,
        }
    }

    /// Invert the generator rows of the earliest independent valid indexes.
    ///
    /// An erased data index gets its row of the inverse; an erased parity
    /// index gets its generator row times the inverse. When whole units are
    /// valid these are simply the first `dimension` of them.
    ///
    /// # Errors
    /// Returns `InsufficientInputs` with fewer than `dimension` valid indexes,
    /// and `SingularMatrix` if the valid rows do not span the code.
    pub fn from_generator(generator: &Matrix, erased: &[usize], valid: &[usize]) -> Result<Self, Error> {
        let dimension = generator.cols();
        check_available(valid, dimension)?;
        let selected = generator.independent_rows(valid, dimension);
        if selected.len() < dimension {
            return Err(Error::SingularMatrix);
        }
        let inverse = generator.select_rows(&selected).invert()?;
        let matrix = generator.select_rows(erased).multiply(&inverse)?;
        debug!(erased = ?erased, inputs = selected.len(), "derived decode matrix from generator");
        Ok(Self::new(selected, erased.to_vec(), matrix))
    }

    /// Row-reduce the parity-check matrix `h` on every column outside the
    /// selected valid indexes.
    ///
    /// The unknown columns are every non-valid column plus the latest valid
    /// columns that keep them independent, `h.rows()` in all. The remaining
    /// valid columns are the inputs. After reduction row `t` expresses unknown
    /// column `t` through the inputs, which gives the decode row directly.
    ///
    /// # Errors
    /// Same as [`DecodePlan::from_generator`].
    pub fn from_parity_check(h: &Matrix, dimension: usize, erased: &[usize], valid: &[usize]) -> Result<Self, Error> {
        check_available(valid, dimension)?;
        let forced: Vec<usize> = (0..h.cols()).filter(|c| valid.binary_search(c).is_err()).collect();
        let order: Vec<usize> = forced.iter().copied().chain(valid.iter().rev().copied()).collect();
        let mut unknown = h.transpose().independent_rows(&order, h.rows());
        if unknown.len() < h.rows() || !unknown.starts_with(&forced) {
            return Err(Error::SingularMatrix);
        }
        unknown.sort_unstable();
        let selected: Vec<usize> = valid.iter().copied().filter(|c| unknown.binary_search(c).is_err()).collect();

        let mut reduced = h.clone();
        reduced.reduce_columns(&unknown)?;

        let mut rows = Vec::with_capacity(erased.len());
        for e in erased {
            let t = unknown
                .binary_search(e)
                .map_err(|_| Error::InvalidErasure(format!("index {e} is both erased and selected")))?;
            rows.push(t);
        }
        let matrix = reduced.select_rows(&rows).select_cols(&selected);
        debug!(erased = ?erased, inputs = selected.len(), "derived decode matrix from parity check");
        Ok(Self::new(selected, erased.to_vec(), matrix))
    }

    /// Bandwidth-optimal repair of MSR node `node` from the MSR parity-check
    /// matrix `h`.
    ///
    /// Reads only the [`repair_slots`] of every other node, `(n-1)*l/r`
    /// sub-units in total, and writes the `l` sub-units of `node`.
    ///
    /// # Errors
    /// Returns `SingularMatrix` if the repair block cannot be inverted.
    pub fn msr_repair(h: &Matrix, n: usize, r: usize, node: usize) -> Result<Self, Error> {
        let l = h.cols() / n;
        let slots = repair_slots(node, n, r);

        let rows: Vec<usize> = (0..r).flat_map(|i| slots.iter().map(move |&a| i * l + a)).collect();
        let block = h.select_rows(&rows);
        let node_cols: Vec<usize> = (node * l..(node + 1) * l).collect();
        let inputs: Vec<usize> = (0..n)
            .filter(|&p| p != node)
            .flat_map(|p| slots.iter().map(move |&b| p * l + b))
            .collect();

        let left = block.select_cols(&node_cols).invert()?;
        let matrix = left.multiply(&block.select_cols(&inputs))?;
        debug!(node, inputs = inputs.len(), "derived MSR single-node repair matrix");
        Ok(Self::new(inputs, node_cols, matrix))
    }
}

/// Slots `a` whose coupling digit for `node` equals the node's position,
/// `l / r` of them. Repairing `node` needs exactly these slots from every
/// surviving node.
pub fn repair_slots(node: usize, n: usize, r: usize) -> Vec<usize> {
    let m = n / r;
    let l = r.pow(m as u32);
    let u = node % r;
    let v = node / r;
    (0..l).filter(|&a| radix::digits(a, r, m)[v] == u).collect()
}

fn check_available(valid: &[usize], dimension: usize) -> Result<(), Error> {
    if valid.len() < dimension {
        return Err(Error::InsufficientInputs {
            needed: dimension,
            got: valid.len(),
        });
    }
    Ok(())
}

/// Check an erasure pattern against `n` units and `r` parities.
///
/// # Errors
/// Returns `InvalidErasure` if the indexes are out of range, not strictly
/// increasing, or more than `r`.
pub(crate) fn validate_erasures(erased: &[usize], n: usize, r: usize) -> Result<(), Error> {
    if erased.len() > r {
        return Err(Error::InvalidErasure(format!(
            "{} erasures exceed the {r} parity units",
            erased.len()
        )));
    }
    if let Some(&e) = erased.iter().find(|&&e| e >= n) {
        return Err(Error::InvalidErasure(format!("index {e} out of range for {n} units")));
    }
    if erased.windows(2).any(|w| w[0] >= w[1]) {
        return Err(Error::InvalidErasure(format!(
            "indexes must be strictly increasing, got {erased:?}"
        )));
    }
    Ok(())
}
