//! Coding-matrix construction for both code families.
//!
//! All builders are pure: the same `(n, k)` always gives the same matrix.

use tracing::debug;

use crate::error::Error;
use crate::gf;
use crate::matrix::Matrix;
use crate::radix;

/// Multiplier applied to the diagonal entries above the coupling digit.
pub const MSR_GAMMA: u8 = 2;

// =============================================================================
// Reed-Solomon / Cauchy
// =============================================================================

/// Systematic `n x k` Cauchy generator: the identity on top, then parity rows
/// `i in [k, n)` with entries `inv(i ^ j)`.
///
/// # Errors
/// Returns `InvalidSchema` if `k == 0`, `k >= n` or `n > 255`.
pub fn cauchy_matrix(n: usize, k: usize) -> Result<Matrix, Error> {
    check_dimensions(n, k)?;
    let mut m = Matrix::identity(k).stack(&Matrix::zeros(n - k, k))?;
    for i in k..n {
        for j in 0..k {
            // i and j are distinct bytes, so i ^ j is nonzero.
            let entry = gf::inv((i ^ j) as u8).ok_or(Error::SingularMatrix)?;
            m.set(i, j, entry);
        }
    }
    Ok(m)
}

/// Parity-check form `[P | I_r]` of the Cauchy code, `r x n`.
///
/// # Errors
/// Same conditions as [`cauchy_matrix`].
pub fn cauchy_pcm(n: usize, k: usize) -> Result<Matrix, Error> {
    let generator = cauchy_matrix(n, k)?;
    let r = n - k;
    let mut h = Matrix::zeros(r, n);
    for i in 0..r {
        for j in 0..k {
            h.set(i, j, generator.get(k + i, j));
        }
        h.set(i, k + i, 1);
    }
    Ok(h)
}

// =============================================================================
// MSR
// =============================================================================

/// Largest sub-packetization accepted for an MSR code.
pub const MAX_SUBPACKETIZATION: usize = 256;

/// Sub-packetization `r^(n/r)` of an MSR code.
///
/// `None` when `r` does not divide `n` or the result exceeds
/// [`MAX_SUBPACKETIZATION`].
pub fn msr_subpacketization(n: usize, k: usize) -> Option<usize> {
    let r = n.checked_sub(k)?;
    if r == 0 || n % r != 0 {
        return None;
    }
    let m = u32::try_from(n / r).ok()?;
    r.checked_pow(m).filter(|&l| l <= MAX_SUBPACKETIZATION)
}

/// MSR parity-check matrix, `r*l x n*l`.
///
/// Row `i*l + a` is parity group `i` at sub-packet `a`; column `j*l + b` is
/// node `j` at slot `b`. Node `j` sits at position `u = j % r` of group
/// `v = j / r`, and its base value is `lambda = v*r + u + 1`. Let `d` be digit
/// `v` of `a`:
///
/// * `d < u`: `H[(i,a),(j,a)] = lambda^i`
/// * `d > u`: `H[(i,a),(j,a)] = gamma * lambda^i`
/// * `d == u`: for every `q < r`, with `b = a` whose digit `v` is `q`,
///   `H[(i,a),(j,b)] = (v*r + 1 + q)^i`
///
/// # Errors
/// Returns `InvalidSchema` when `r` does not divide `n` or `l` is too large.
pub fn msr_matrix(n: usize, k: usize) -> Result<Matrix, Error> {
    check_dimensions(n, k)?;
    let r = n - k;
    let l = msr_subpacketization(n, k).ok_or_else(|| {
        Error::InvalidSchema(format!(
            "MSR needs r | n and r^(n/r) <= {MAX_SUBPACKETIZATION}, got n={n} r={r}"
        ))
    })?;
    let m = n / r;

    let mut h = Matrix::zeros(r * l, n * l);
    for i in 0..r {
        for a in 0..l {
            let ary = radix::digits(a, r, m);
            let row = i * l + a;
            for j in 0..n {
                let u = j % r;
                let v = j / r;
                let lambda = (v * r + u + 1) as u8;
                if ary[v] < u {
                    h.set(row, j * l + a, gf::pow(lambda, i));
                } else if ary[v] > u {
                    h.set(row, j * l + a, gf::mul(MSR_GAMMA, gf::pow(lambda, i)));
                } else {
                    for q in 0..r {
                        let b = radix::replace_digit(a, r, m, v, q);
                        let coupled = (v * r + 1 + q) as u8;
                        h.set(row, j * l + b, gf::pow(coupled, i));
                    }
                }
            }
        }
    }
    debug!(n, k, l, "built MSR parity-check matrix");
    Ok(h)
}

/// Parity encode matrix `inv(H_parity) * H_data`, `r*l x k*l`.
///
/// # Errors
/// Returns `SingularMatrix` if the parity block of `h` cannot be inverted.
pub fn msr_encode_matrix(h: &Matrix, n: usize, k: usize) -> Result<Matrix, Error> {
    let l = h.cols() / n;
    let data_cols: Vec<usize> = (0..k * l).collect();
    let parity_cols: Vec<usize> = (k * l..n * l).collect();
    let parity_inv = h.select_cols(&parity_cols).invert()?;
    parity_inv.multiply(&h.select_cols(&data_cols))
}

/// Systematic generator: the identity over the data columns on top of the
/// parity encode rows.
///
/// # Errors
/// Propagates `LengthMismatch` from stacking, which cannot happen for a
/// well-formed encode matrix.
pub fn systematic_generator(encode: &Matrix) -> Result<Matrix, Error> {
    Matrix::identity(encode.cols()).stack(encode)
}

fn check_dimensions(n: usize, k: usize) -> Result<(), Error> {
    if k == 0 || k >= n || n > 255 {
        return Err(Error::InvalidSchema(format!(
            "need 0 < k < n <= 255, got n={n} k={k}"
        )));
    }
    Ok(())
}
