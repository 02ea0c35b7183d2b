//! Dense row-major matrices over GF(256).

use crate::error::Error;
use crate::gf;

/// A row-major `rows x cols` matrix of field elements.
#[derive(Clone, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl Matrix {
    /// All-zero matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    /// `size x size` identity.
    pub fn identity(size: usize) -> Self {
        let mut m = Self::zeros(size, size);
        for i in 0..size {
            m.set(i, i, 1);
        }
        m
    }

    /// Builds a matrix from equal-length rows.
    ///
    /// # Errors
    /// Returns `LengthMismatch` if the rows differ in length.
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self, Error> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(Error::LengthMismatch {
                    expected: cols,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: u8) {
        self.data[row * self.cols + col] = value;
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[u8] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Row-major backing bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// `self * rhs`.
    ///
    /// # Errors
    /// Returns `LengthMismatch` if `self.cols() != rhs.rows()`.
    pub fn multiply(&self, rhs: &Matrix) -> Result<Matrix, Error> {
        if self.cols != rhs.rows {
            return Err(Error::LengthMismatch {
                expected: self.cols,
                got: rhs.rows,
            });
        }
        let mut out = Matrix::zeros(self.rows, rhs.cols);
        for i in 0..self.rows {
            let dst = &mut out.data[i * rhs.cols..(i + 1) * rhs.cols];
            for t in 0..self.cols {
                gf::muladd_mem(dst, rhs.row(t), self.get(i, t));
            }
        }
        Ok(out)
    }

    /// New matrix made of the given rows, in order.
    pub fn select_rows(&self, rows: &[usize]) -> Matrix {
        let mut data = Vec::with_capacity(rows.len() * self.cols);
        for &r in rows {
            data.extend_from_slice(self.row(r));
        }
        Matrix {
            rows: rows.len(),
            cols: self.cols,
            data,
        }
    }

    /// New matrix made of the given columns, in order.
    pub fn select_cols(&self, cols: &[usize]) -> Matrix {
        let mut data = Vec::with_capacity(self.rows * cols.len());
        for r in 0..self.rows {
            let row = self.row(r);
            data.extend(cols.iter().map(|&c| row[c]));
        }
        Matrix {
            rows: self.rows,
            cols: cols.len(),
            data,
        }
    }

    /// `self` on top of `below`.
    ///
    /// # Errors
    /// Returns `LengthMismatch` if the column counts differ.
    pub fn stack(&self, below: &Matrix) -> Result<Matrix, Error> {
        if self.cols != below.cols {
            return Err(Error::LengthMismatch {
                expected: self.cols,
                got: below.cols,
            });
        }
        let mut data = Vec::with_capacity(self.data.len() + below.data.len());
        data.extend_from_slice(&self.data);
        data.extend_from_slice(&below.data);
        Ok(Matrix {
            rows: self.rows + below.rows,
            cols: self.cols,
            data,
        })
    }

    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.set(c, r, self.get(r, c));
            }
        }
        out
    }

    /// Greedily pick up to `limit` linearly independent rows from
    /// `candidates`, in candidate order. A row dependent on those already
    /// picked is skipped.
    pub fn independent_rows(&self, candidates: &[usize], limit: usize) -> Vec<usize> {
        // Basis rows are normalized to 1 at their pivot and zero at every
        // earlier pivot.
        let mut basis: Vec<(usize, Vec<u8>)> = Vec::with_capacity(limit.min(self.cols));
        let mut picked = Vec::with_capacity(limit);
        for &candidate in candidates {
            if picked.len() == limit {
                break;
            }
            let mut row = self.row(candidate).to_vec();
            for (pivot, b) in &basis {
                let factor = row[*pivot];
                if factor != 0 {
                    gf::muladd_mem(&mut row, b, factor);
                }
            }
            let Some(pivot) = row.iter().position(|&v| v != 0) else {
                continue;
            };
            if let Some(scale) = gf::inv(row[pivot]) {
                let src = row.clone();
                gf::mul_mem(&mut row, &src, scale);
                basis.push((pivot, row));
                picked.push(candidate);
            }
        }
        picked
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let (lo, hi) = (a.min(b), a.max(b));
        let (head, tail) = self.data.split_at_mut(hi * self.cols);
        head[lo * self.cols..(lo + 1) * self.cols].swap_with_slice(&mut tail[..self.cols]);
    }

    fn scale_row(&mut self, row: usize, coeff: u8) {
        let cols = self.cols;
        let src = self.row(row).to_vec();
        gf::mul_mem(&mut self.data[row * cols..(row + 1) * cols], &src, coeff);
    }

    /// row[dst] ^= coeff * row[src]
    fn eliminate(&mut self, dst: usize, src: usize, coeff: u8) {
        let cols = self.cols;
        let pivot = self.row(src).to_vec();
        gf::muladd_mem(&mut self.data[dst * cols..(dst + 1) * cols], &pivot, coeff);
    }

    /// Gauss-Jordan elimination on the listed columns.
    ///
    /// Pivot `t` lands in row `t` at column `pivot_cols[t]`, normalized to 1,
    /// and every other row is cleared in that column. Rows are swapped when the
    /// diagonal position is zero.
    ///
    /// # Errors
    /// Returns `SingularMatrix` when a listed column has no usable pivot, and
    /// `InvalidSchema` when more pivots are requested than there are rows.
    pub fn reduce_columns(&mut self, pivot_cols: &[usize]) -> Result<(), Error> {
        if pivot_cols.len() > self.rows {
            return Err(Error::InvalidSchema(format!(
                "{} pivot columns requested from a {}-row matrix",
                pivot_cols.len(),
                self.rows
            )));
        }
        for (t, &col) in pivot_cols.iter().enumerate() {
            let pivot_row = (t..self.rows)
                .find(|&r| self.get(r, col) != 0)
                .ok_or(Error::SingularMatrix)?;
            self.swap_rows(t, pivot_row);

            let lead = self.get(t, col);
            let scale = gf::inv(lead).ok_or(Error::SingularMatrix)?;
            self.scale_row(t, scale);

            for r in 0..self.rows {
                if r != t {
                    let factor = self.get(r, col);
                    if factor != 0 {
                        self.eliminate(r, t, factor);
                    }
                }
            }
        }
        Ok(())
    }

    /// Inverse of a square matrix.
    ///
    /// # Errors
    /// Returns `SingularMatrix` if the matrix has no inverse, and
    /// `LengthMismatch` if it is not square.
    pub fn invert(&self) -> Result<Matrix, Error> {
        if self.rows != self.cols {
            return Err(Error::LengthMismatch {
                expected: self.rows,
                got: self.cols,
            });
        }
        let size = self.rows;
        let mut work = Matrix::zeros(size, 2 * size);
        for r in 0..size {
            work.data[r * 2 * size..r * 2 * size + size].copy_from_slice(self.row(r));
            work.set(r, size + r, 1);
        }
        let pivots: Vec<usize> = (0..size).collect();
        work.reduce_columns(&pivots)?;
        let right: Vec<usize> = (size..2 * size).collect();
        Ok(work.select_cols(&right))
    }

    pub fn is_identity(&self) -> bool {
        self.rows == self.cols
            && (0..self.rows).all(|r| (0..self.cols).all(|c| self.get(r, c) == u8::from(r == c)))
    }
}

impl std::fmt::Debug for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Matrix {}x{}", self.rows, self.cols)?;
        f.write_str(&crate::dump::matrix_to_string(self))
    }
}
