//! Table-driven coding kernel shared by every encode and decode path.

use crate::error::Error;
use crate::gf;
use crate::matrix::Matrix;

/// Multiply tables for every coefficient of a coding matrix.
///
/// Row `i` of the matrix produces output `i`; column `j` reads input `j`.
#[derive(Clone)]
pub struct CodingTables {
    rows: usize,
    cols: usize,
    coefficients: Vec<u8>,
    tables: Vec<&'static [u8; 256]>,
}

impl CodingTables {
    pub fn new(matrix: &Matrix) -> Self {
        let coefficients = matrix.as_bytes().to_vec();
        let tables = coefficients.iter().map(|&c| gf::mul_table(c)).collect();
        Self {
            rows: matrix.rows(),
            cols: matrix.cols(),
            coefficients,
            tables,
        }
    }

    /// Number of outputs produced.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of inputs read.
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn coefficient(&self, row: usize, col: usize) -> u8 {
        self.coefficients[row * self.cols + col]
    }

    #[inline]
    pub fn table(&self, row: usize, col: usize) -> &'static [u8; 256] {
        self.tables[row * self.cols + col]
    }
}

impl std::fmt::Debug for CodingTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodingTables")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish_non_exhaustive()
    }
}

/// outputs[i] = sum_j coefficient(i, j) * inputs[j]
///
/// Every output is overwritten. All buffers must share one length.
///
/// # Errors
/// Returns `UnitCount` if the buffer counts disagree with the tables, and
/// `LengthMismatch` if any buffer differs in length from the first.
pub fn encode_data(tables: &CodingTables, inputs: &[&[u8]], outputs: &mut [&mut [u8]]) -> Result<(), Error> {
    if inputs.len() != tables.cols {
        return Err(Error::UnitCount {
            expected: tables.cols,
            got: inputs.len(),
        });
    }
    if outputs.len() != tables.rows {
        return Err(Error::UnitCount {
            expected: tables.rows,
            got: outputs.len(),
        });
    }
    let len = match (inputs.first(), outputs.first()) {
        (Some(input), _) => input.len(),
        (None, Some(output)) => output.len(),
        (None, None) => return Ok(()),
    };
    for buf in inputs.iter().map(|b| b.len()).chain(outputs.iter().map(|b| b.len())) {
        if buf != len {
            return Err(Error::LengthMismatch { expected: len, got: buf });
        }
    }

    for (i, output) in outputs.iter_mut().enumerate() {
        match inputs.split_first() {
            Some((first, rest)) => {
                gf::mul_mem(output, first, tables.coefficient(i, 0));
                for (j, input) in rest.iter().enumerate() {
                    let c = tables.coefficient(i, j + 1);
                    match c {
                        0 => {}
                        1 => gf::xor_mem(output, input),
                        _ => {
                            #[cfg(feature = "simd")]
                            gf::muladd_mem(output, input, c);
                            #[cfg(not(feature = "simd"))]
                            gf::muladd_table(output, input, tables.table(i, j + 1));
                        }
                    }
                }
            }
            None => output.fill(0),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct;

    #[test]
    fn test_encode_known_parity() {
        let g = construct::cauchy_matrix(6, 4).unwrap();
        let tables = CodingTables::new(&g.select_rows(&[4, 5]));
        let data: Vec<Vec<u8>> = (1..=4u8).map(|v| vec![v; 16]).collect();
        let inputs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
        let mut p0 = vec![0xee; 16];
        let mut p1 = vec![0xee; 16];
        encode_data(&tables, &inputs, &mut [&mut p0, &mut p1]).unwrap();
        assert!(p0.iter().all(|&b| b == 0x48));
        assert!(p1.iter().all(|&b| b == 0x0f));
    }

    #[test]
    fn test_identity_copies() {
        let tables = CodingTables::new(&Matrix::identity(2));
        let a = [1u8, 2, 3];
        let b = [4u8, 5, 6];
        let mut x = [0u8; 3];
        let mut y = [0u8; 3];
        encode_data(&tables, &[&a, &b], &mut [&mut x, &mut y]).unwrap();
        assert_eq!(x, a);
        assert_eq!(y, b);
    }

    #[test]
    fn test_count_and_length_checks() {
        let tables = CodingTables::new(&Matrix::identity(2));
        let a = [0u8; 4];
        let short = [0u8; 3];
        let mut x = [0u8; 4];
        let mut y = [0u8; 4];
        assert_eq!(
            encode_data(&tables, &[&a], &mut [&mut x, &mut y]),
            Err(Error::UnitCount { expected: 2, got: 1 })
        );
        assert_eq!(
            encode_data(&tables, &[&a, &short], &mut [&mut x, &mut y]),
            Err(Error::LengthMismatch { expected: 4, got: 3 })
        );
    }

    #[test]
    fn test_tables_follow_coefficients() {
        let m = Matrix::from_rows(&[vec![0, 1, 0x53]]).unwrap();
        let tables = CodingTables::new(&m);
        assert_eq!(tables.coefficient(0, 2), 0x53);
        assert_eq!(tables.table(0, 2)[1], 0x53);
        assert_eq!(tables.table(0, 0)[0xff], 0);
    }
}
