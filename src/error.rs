//! Error types for coder construction, encoding and decoding.

/// Errors reported by coder construction and by encode/decode calls.
///
/// Construction-time errors ([`Error::InvalidSchema`], and
/// [`Error::SingularMatrix`] when a derived encode matrix cannot be built)
/// mean no coder is produced. Per-call errors leave the coder usable; a later
/// call with valid inputs succeeds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Unit counts, sub-packetization or slice granularity are unusable.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Fewer valid inputs than the code needs to recover the erasures.
    #[error("insufficient inputs: need {needed}, got {got}")]
    InsufficientInputs {
        /// Minimum number of valid units (or sub-units) required.
        needed: usize,
        /// Valid units (or sub-units) actually available.
        got: usize,
    },

    /// Gauss-Jordan elimination found a column without a pivot.
    #[error("singular matrix")]
    SingularMatrix,

    /// A buffer's length disagrees with the length of the call.
    #[error("length mismatch: expected {expected} bytes, got {got}")]
    LengthMismatch {
        /// Length required for this buffer.
        expected: usize,
        /// Length actually supplied.
        got: usize,
    },

    /// A unit length is not a multiple of the sub-packet slice granularity.
    #[error("length {len} is not a multiple of the slice unit {granularity}")]
    UnalignedLength {
        /// Length supplied.
        len: usize,
        /// Slice granularity of the schema.
        granularity: usize,
    },

    /// Wrong number of input or output buffers.
    #[error("expected {expected} buffers, got {got}")]
    UnitCount {
        /// Buffer count required by the schema.
        expected: usize,
        /// Buffer count supplied.
        got: usize,
    },

    /// Erased indexes are out of range, unsorted, duplicated or too many.
    #[error("invalid erasure pattern: {0}")]
    InvalidErasure(String),
}
