//! Hex dumps of matrices and coding tables for debugging.

use std::fmt::Write;

use tracing::debug;

use crate::kernel::CodingTables;
use crate::matrix::Matrix;

/// Space-separated lowercase hex of at most `limit` bytes, with `..` when
/// truncated.
pub fn bytes_to_hex(bytes: &[u8], limit: usize) -> String {
    let mut out = String::with_capacity(bytes.len().min(limit) * 3 + 2);
    for (i, b) in bytes.iter().take(limit).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02x}");
    }
    if bytes.len() > limit {
        out.push_str(" ..");
    }
    out
}

/// One hex row per matrix row, newline terminated.
pub fn matrix_to_string(matrix: &Matrix) -> String {
    let mut out = String::new();
    for r in 0..matrix.rows() {
        out.push_str(&bytes_to_hex(matrix.row(r), usize::MAX));
        out.push('\n');
    }
    out
}

pub(crate) fn dump_matrix(label: &str, matrix: &Matrix) {
    debug!(label, rows = matrix.rows(), cols = matrix.cols(), "matrix dump");
    for r in 0..matrix.rows() {
        debug!(label, row = r, "{}", bytes_to_hex(matrix.row(r), usize::MAX));
    }
}

/// First 16 entries of every coefficient's multiply table.
pub(crate) fn dump_tables(label: &str, tables: &CodingTables) {
    debug!(label, rows = tables.rows(), cols = tables.cols(), "coding tables dump");
    for i in 0..tables.rows() {
        for j in 0..tables.cols() {
            debug!(
                label,
                row = i,
                col = j,
                coefficient = tables.coefficient(i, j),
                "{}",
                bytes_to_hex(tables.table(i, j), 16)
            );
        }
    }
}
