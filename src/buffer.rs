//! Unit buffers and the sub-packet interleaving layer.
//!
//! An MSR unit of length `L` is split into `L / g` blocks of `g` bytes (the
//! slice unit). Each block holds one `g / l` byte slice of every sub-unit, so
//! sub-unit `j` is the concatenation of bytes `[b*g + j*w, b*g + (j+1)*w)` over
//! all blocks `b`, with `w = g / l`.
//!
//! [`BufferMode::Copy`] gathers those slices into owned sub-unit buffers before
//! coding and scatters the results back. [`BufferMode::View`] codes each block
//! in place over borrowed windows. Both drive the same kernel and produce the
//! same bytes.

use crate::error::Error;
use crate::kernel::{self, CodingTables};
use crate::schema::BufferMode;

/// Bytes of one unit: owned, or a window into shared storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span<'a> {
    Owned(Vec<u8>),
    View(Window<'a>),
}

/// In-bounds window over borrowed storage, built by [`Span::view`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    store: &'a [u8],
    offset: usize,
    len: usize,
}

impl<'a> Window<'a> {
    pub fn store(&self) -> &'a [u8] {
        self.store
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn bytes(&self) -> &'a [u8] {
        &self.store[self.offset..self.offset + self.len]
    }
}

impl<'a> Span<'a> {
    /// Window over `store[offset..offset + len]`.
    ///
    /// # Errors
    /// Returns `LengthMismatch` if the window runs past the end of `store`.
    pub fn view(store: &'a [u8], offset: usize, len: usize) -> Result<Self, Error> {
        match offset.checked_add(len) {
            Some(end) if end <= store.len() => Ok(Span::View(Window { store, offset, len })),
            _ => Err(Error::LengthMismatch {
                expected: offset.saturating_add(len),
                got: store.len(),
            }),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Span::Owned(bytes) => bytes,
            Span::View(window) => window.bytes(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Span::Owned(bytes) => bytes.len(),
            Span::View(window) => window.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for Span<'_> {
    fn from(bytes: Vec<u8>) -> Self {
        Span::Owned(bytes)
    }
}

impl<'a> From<&'a [u8]> for Span<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Span::View(Window {
            store: bytes,
            offset: 0,
            len: bytes.len(),
        })
    }
}

/// One decoder input position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<'a> {
    Present(Span<'a>),
    Absent,
}

impl<'a> Slot<'a> {
    /// Present slot borrowing `bytes`.
    pub fn present(bytes: &'a [u8]) -> Self {
        Slot::Present(Span::from(bytes))
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Slot::Present(_))
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Slot::Present(span) => Some(span.as_bytes()),
            Slot::Absent => None,
        }
    }
}

impl<'a> From<Option<&'a [u8]>> for Slot<'a> {
    fn from(bytes: Option<&'a [u8]>) -> Self {
        bytes.map_or(Slot::Absent, Slot::present)
    }
}

// =============================================================================
// Interleaving
// =============================================================================

/// Sub-unit `sub` of unit `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SubRef {
    pub unit: usize,
    pub sub: usize,
}

impl SubRef {
    /// Split a flat sub-unit index `unit * l + sub`.
    pub fn from_flat(index: usize, sub_packets: usize) -> Self {
        Self {
            unit: index / sub_packets,
            sub: index % sub_packets,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Interleave {
    sub_packets: usize,
    slice_unit: usize,
}

impl Interleave {
    pub fn new(sub_packets: usize, slice_unit: usize) -> Self {
        Self { sub_packets, slice_unit }
    }

    /// Bytes each sub-unit contributes to one block.
    pub fn slice_width(&self) -> usize {
        self.slice_unit / self.sub_packets
    }

    pub fn blocks(&self, unit_len: usize) -> usize {
        unit_len / self.slice_unit
    }

    /// Length of one sub-unit of a `unit_len` byte unit.
    pub fn sub_len(&self, unit_len: usize) -> usize {
        self.blocks(unit_len) * self.slice_width()
    }

    /// # Errors
    /// Returns `UnalignedLength` unless `unit_len` is a multiple of the slice unit.
    pub fn check_aligned(&self, unit_len: usize) -> Result<(), Error> {
        if unit_len % self.slice_unit != 0 {
            return Err(Error::UnalignedLength {
                len: unit_len,
                granularity: self.slice_unit,
            });
        }
        Ok(())
    }

    fn block_range(&self, block: usize, sub: usize) -> std::ops::Range<usize> {
        let w = self.slice_width();
        let start = block * self.slice_unit + sub * w;
        start..start + w
    }

    /// Slice of sub-unit `sub` inside block `block`.
    pub fn window<'u>(&self, unit: &'u [u8], block: usize, sub: usize) -> &'u [u8] {
        &unit[self.block_range(block, sub)]
    }

    /// Owned copy of sub-unit `sub`.
    pub fn gather(&self, unit: &[u8], sub: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.sub_len(unit.len()));
        for block in 0..self.blocks(unit.len()) {
            out.extend_from_slice(self.window(unit, block, sub));
        }
        out
    }

    /// Write an owned sub-unit back into its slices of `unit`.
    pub fn scatter(&self, sub_unit: &[u8], unit: &mut [u8], sub: usize) {
        let w = self.slice_width();
        for (block, slice) in sub_unit.chunks_exact(w).enumerate() {
            unit[self.block_range(block, sub)].copy_from_slice(slice);
        }
    }
}

/// Windows of every sub-unit inside one block of `unit`, in sub-unit order.
fn block_windows(unit: &mut [u8], start: usize, slice_unit: usize, width: usize) -> std::slice::ChunksExactMut<'_, u8> {
    unit[start..start + slice_unit].chunks_exact_mut(width)
}

/// Run the kernel over interleaved sub-units.
///
/// `units` holds every unit the inputs may refer to, all `len` bytes long
/// (others may be empty). Output row `o * l + s` of `tables` lands in
/// sub-unit `s` of `outputs[o]`.
///
/// # Errors
/// Returns `UnalignedLength` for lengths that are not a whole number of
/// blocks, and propagates kernel errors.
pub(crate) fn run_interleaved(
    mode: BufferMode,
    layout: Interleave,
    tables: &CodingTables,
    units: &[&[u8]],
    inputs: &[SubRef],
    outputs: &mut [&mut [u8]],
    len: usize,
) -> Result<(), Error> {
    layout.check_aligned(len)?;
    for r in inputs {
        let got = units.get(r.unit).map_or(0, |u| u.len());
        if got != len {
            return Err(Error::LengthMismatch { expected: len, got });
        }
    }
    for out in outputs.iter() {
        if out.len() != len {
            return Err(Error::LengthMismatch {
                expected: len,
                got: out.len(),
            });
        }
    }

    match mode {
        BufferMode::Copy => {
            let gathered: Vec<Vec<u8>> = inputs.iter().map(|r| layout.gather(units[r.unit], r.sub)).collect();
            let refs: Vec<&[u8]> = gathered.iter().map(Vec::as_slice).collect();
            let sub_len = layout.sub_len(len);
            let mut produced = vec![vec![0u8; sub_len]; outputs.len() * layout.sub_packets];
            let mut muts: Vec<&mut [u8]> = produced.iter_mut().map(Vec::as_mut_slice).collect();
            kernel::encode_data(tables, &refs, &mut muts)?;
            for (idx, sub_unit) in produced.iter().enumerate() {
                let r = SubRef::from_flat(idx, layout.sub_packets);
                layout.scatter(sub_unit, outputs[r.unit], r.sub);
            }
        }
        BufferMode::View => {
            let w = layout.slice_width();
            for block in 0..layout.blocks(len) {
                let ins: Vec<&[u8]> = inputs.iter().map(|r| layout.window(units[r.unit], block, r.sub)).collect();
                let start = block * layout.slice_unit;
                let mut outs: Vec<&mut [u8]> = outputs
                    .iter_mut()
                    .flat_map(|unit| block_windows(unit, start, layout.slice_unit, w))
                    .collect();
                kernel::encode_data(tables, &ins, &mut outs)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;

    #[test]
    fn test_span_view_bounds() {
        let store = [1u8, 2, 3, 4, 5];
        let span = Span::view(&store, 1, 3).unwrap();
        assert_eq!(span.as_bytes(), &[2, 3, 4]);
        assert_eq!(span.len(), 3);
        assert!(Span::view(&store, 3, 3).is_err());
        assert!(Span::view(&store, 4, 9).is_err());
        assert!(Span::view(&store, usize::MAX, 2).is_err());
        let Span::View(window) = Span::view(&store, 5, 0).unwrap() else {
            panic!("expected a view");
        };
        assert_eq!(window.offset(), 5);
        assert_eq!(window.store().len(), 5);
        assert!(window.bytes().is_empty());
    }

    #[test]
    fn test_slot_conversions() {
        let bytes = vec![7u8; 4];
        let slot = Slot::from(Some(bytes.as_slice()));
        assert!(slot.is_present());
        assert_eq!(slot.bytes(), Some(&bytes[..]));
        assert_eq!(Slot::from(None), Slot::Absent);
        let owned = Slot::Present(Span::from(vec![1, 2]));
        assert_eq!(owned.bytes(), Some(&[1u8, 2][..]));
    }

    #[test]
    fn test_gather_scatter_layout() {
        // l = 2, g = 4: blocks [a0 a0 a1 a1] [b0 b0 b1 b1]
        let layout = Interleave::new(2, 4);
        let unit = [0u8, 1, 2, 3, 4, 5, 6, 7];
        assert_eq!(layout.gather(&unit, 0), vec![0, 1, 4, 5]);
        assert_eq!(layout.gather(&unit, 1), vec![2, 3, 6, 7]);

        let mut rebuilt = [0u8; 8];
        layout.scatter(&[0, 1, 4, 5], &mut rebuilt, 0);
        layout.scatter(&[2, 3, 6, 7], &mut rebuilt, 1);
        assert_eq!(rebuilt, unit);
    }

    #[test]
    fn test_alignment() {
        let layout = Interleave::new(9, 18);
        assert!(layout.check_aligned(36).is_ok());
        assert_eq!(
            layout.check_aligned(20),
            Err(Error::UnalignedLength { len: 20, granularity: 18 })
        );
        assert_eq!(layout.sub_len(36), 4);
    }

    #[test]
    fn test_copy_and_view_agree() {
        // Swap the two sub-units of unit 0 and xor them into unit 1's slot 0.
        let layout = Interleave::new(2, 4);
        let m = Matrix::from_rows(&[vec![0, 1], vec![1, 0], vec![1, 1], vec![0, 0]]).unwrap();
        let tables = CodingTables::new(&m);
        let unit = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let inputs = [SubRef { unit: 0, sub: 0 }, SubRef { unit: 0, sub: 1 }];

        let mut results = Vec::new();
        for mode in [BufferMode::Copy, BufferMode::View] {
            let mut a = [0u8; 8];
            let mut b = [0xffu8; 8];
            run_interleaved(mode, layout, &tables, &[&unit], &inputs, &mut [&mut a, &mut b], 8).unwrap();
            results.push((a, b));
        }
        assert_eq!(results[0], results[1]);
        let (a, b) = results[0];
        assert_eq!(a, [3, 4, 1, 2, 7, 8, 5, 6]);
        assert_eq!(b, [1 ^ 3, 2 ^ 4, 0, 0, 5 ^ 7, 6 ^ 8, 0, 0]);
    }
}
