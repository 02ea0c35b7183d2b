//! GF(2^8) arithmetic.
//!
//! Elements are bytes. The field is built on the primitive polynomial
//! `x^8 + x^4 + x^3 + x^2 + 1` (0x11d) with generator 2, which matches the
//! classic log/antilog tables used by Reed-Solomon storage codes.
//!
//! Scalar operations go through the [`Gf256`] type from the `gf256` crate.
//! Bulk operations over byte buffers use a const-built 256x256 multiply table
//! and, with the `simd` feature on SSSE3 targets, nibble-table shuffles.

use gf256::gf::gf;

/// Field element type: GF(2^8) over 0x11d, generator 2.
#[gf(polynomial = 0x11d, generator = 0x2)]
pub type Gf256;

/// Reduction polynomial, including the x^8 term.
pub const POLYNOMIAL: u16 = 0x11d;

/// Primitive element used for the field's log/antilog tables.
pub const GENERATOR: u8 = 0x02;

/// `a * b` in GF(256).
#[inline]
pub fn mul(a: u8, b: u8) -> u8 {
    (Gf256(a) * Gf256(b)).0
}

/// Multiplicative inverse, or `None` for zero.
#[inline]
pub fn inv(a: u8) -> Option<u8> {
    if a == 0 {
        return None;
    }
    Some((Gf256(1) / Gf256(a)).0)
}

/// `a^e` by repeated multiplication. `pow(a, 0) == 1` for every `a`.
pub fn pow(a: u8, e: usize) -> u8 {
    let mut acc = Gf256(1);
    for _ in 0..e {
        acc = acc * Gf256(a);
    }
    acc.0
}

/// The 256-entry multiply row for coefficient `c`: `table[x] == mul(c, x)`.
#[inline]
pub fn mul_table(c: u8) -> &'static [u8; 256] {
    MUL_TABLES.get(c)
}

/// Owned copy of the multiply row for coefficient `c`.
pub fn build_multiply_table(c: u8) -> [u8; 256] {
    *MUL_TABLES.get(c)
}

// =============================================================================
// Multiply Tables
// =============================================================================

/// MUL_TABLES[y][x] = x * y in GF(256)
struct MulTables {
    tables: [[u8; 256]; 256],
}

impl MulTables {
    const fn new() -> Self {
        let mut tables = [[0u8; 256]; 256];
        let mut y = 0usize;
        while y < 256 {
            let mut x = 0usize;
            while x < 256 {
                tables[y][x] = Self::gf_mul(x as u8, y as u8);
                x += 1;
            }
            y += 1;
        }
        Self { tables }
    }

    /// Shift-and-add multiply, reduced by 0x11d. Usable in const context.
    const fn gf_mul(a: u8, b: u8) -> u8 {
        let mut result = 0u16;
        let mut aa = a as u16;
        let mut bb = b;

        let mut i = 0;
        while i < 8 {
            if bb & 1 != 0 {
                result ^= aa;
            }
            aa <<= 1;
            bb >>= 1;
            i += 1;
        }

        let mut i = 15;
        while i >= 8 {
            if result & (1 << i) != 0 {
                result ^= POLYNOMIAL << (i - 8);
            }
            i -= 1;
        }

        result as u8
    }

    #[inline(always)]
    fn get(&self, y: u8) -> &[u8; 256] {
        &self.tables[y as usize]
    }
}

static MUL_TABLES: MulTables = MulTables::new();

// =============================================================================
// Nibble Tables (pshufb multiply)
// =============================================================================

/// x * y = lo[y][x & 0x0f] ^ hi[y][x >> 4]
#[cfg(all(feature = "simd", target_arch = "x86_64", target_feature = "ssse3"))]
struct NibbleTables {
    lo: [[u8; 16]; 256],
    hi: [[u8; 16]; 256],
}

#[cfg(all(feature = "simd", target_arch = "x86_64", target_feature = "ssse3"))]
impl NibbleTables {
    const fn new() -> Self {
        let mut lo = [[0u8; 16]; 256];
        let mut hi = [[0u8; 16]; 256];

        let mut y = 0usize;
        while y < 256 {
            let mut x = 0usize;
            while x < 16 {
                lo[y][x] = MulTables::gf_mul(x as u8, y as u8);
                hi[y][x] = MulTables::gf_mul((x << 4) as u8, y as u8);
                x += 1;
            }
            y += 1;
        }

        Self { lo, hi }
    }
}

#[cfg(all(feature = "simd", target_arch = "x86_64", target_feature = "ssse3"))]
static NIBBLE_TABLES: NibbleTables = NibbleTables::new();

#[cfg(all(feature = "simd", target_arch = "x86_64", target_feature = "ssse3"))]
mod simd {
    use super::*;
    use std::arch::x86_64::*;

    #[inline(always)]
    unsafe fn mul_16(src: *const u8, table_lo: __m128i, table_hi: __m128i, mask_0f: __m128i) -> __m128i {
        let data = _mm_loadu_si128(src as *const __m128i);
        let lo_nibbles = _mm_and_si128(data, mask_0f);
        let lo_result = _mm_shuffle_epi8(table_lo, lo_nibbles);
        let hi_nibbles = _mm_and_si128(_mm_srli_epi64(data, 4), mask_0f);
        let hi_result = _mm_shuffle_epi8(table_hi, hi_nibbles);
        _mm_xor_si128(lo_result, hi_result)
    }

    /// dst[i] ^= src[i] * coeff, 16 bytes per step.
    ///
    /// # Safety
    /// `dst` and `src` must have equal lengths and the CPU must support SSSE3.
    #[target_feature(enable = "ssse3")]
    pub unsafe fn muladd_mem_ssse3(dst: &mut [u8], src: &[u8], coeff: u8) {
        let len = dst.len();
        let table_lo = _mm_loadu_si128(NIBBLE_TABLES.lo[coeff as usize].as_ptr() as *const __m128i);
        let table_hi = _mm_loadu_si128(NIBBLE_TABLES.hi[coeff as usize].as_ptr() as *const __m128i);
        let mask_0f = _mm_set1_epi8(0x0f);

        let chunks_16 = len / 16;
        for i in 0..chunks_16 {
            let offset = i * 16;
            let product = mul_16(src.as_ptr().add(offset), table_lo, table_hi, mask_0f);
            let current = _mm_loadu_si128(dst.as_ptr().add(offset) as *const __m128i);
            _mm_storeu_si128(dst.as_mut_ptr().add(offset) as *mut __m128i, _mm_xor_si128(current, product));
        }

        let table = MUL_TABLES.get(coeff);
        let tail = chunks_16 * 16;
        for (d, s) in dst[tail..].iter_mut().zip(&src[tail..]) {
            *d ^= table[*s as usize];
        }
    }
}

// =============================================================================
// Bulk Operations
// =============================================================================

/// dst[i] ^= src[i] * coeff
#[inline]
pub(crate) fn muladd_mem(dst: &mut [u8], src: &[u8], coeff: u8) {
    debug_assert_eq!(dst.len(), src.len());

    if coeff == 0 {
        return;
    }
    if coeff == 1 {
        xor_mem(dst, src);
        return;
    }

    #[cfg(all(feature = "simd", target_arch = "x86_64", target_feature = "ssse3"))]
    {
        // SAFETY: lengths are equal and the target feature is enabled at compile time.
        unsafe { simd::muladd_mem_ssse3(dst, src, coeff) };
    }

    #[cfg(not(all(feature = "simd", target_arch = "x86_64", target_feature = "ssse3")))]
    {
        muladd_table(dst, src, MUL_TABLES.get(coeff));
    }
}

/// dst[i] ^= table[src[i]], eight bytes per step then the remainder.
#[inline]
#[cfg_attr(all(feature = "simd", target_arch = "x86_64", target_feature = "ssse3"), allow(dead_code))]
pub(crate) fn muladd_table(dst: &mut [u8], src: &[u8], table: &[u8; 256]) {
    debug_assert_eq!(dst.len(), src.len());

    let mut dst_chunks = dst.chunks_exact_mut(8);
    let mut src_chunks = src.chunks_exact(8);
    for (d, s) in (&mut dst_chunks).zip(&mut src_chunks) {
        d[0] ^= table[s[0] as usize];
        d[1] ^= table[s[1] as usize];
        d[2] ^= table[s[2] as usize];
        d[3] ^= table[s[3] as usize];
        d[4] ^= table[s[4] as usize];
        d[5] ^= table[s[5] as usize];
        d[6] ^= table[s[6] as usize];
        d[7] ^= table[s[7] as usize];
    }
    for (d, s) in dst_chunks.into_remainder().iter_mut().zip(src_chunks.remainder()) {
        *d ^= table[*s as usize];
    }
}

/// dst[i] ^= src[i], a u64 at a time.
#[inline]
pub(crate) fn xor_mem(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dst.len(), src.len());

    let mut dst_chunks = dst.chunks_exact_mut(8);
    let mut src_chunks = src.chunks_exact(8);
    for (d, s) in (&mut dst_chunks).zip(&mut src_chunks) {
        let mut a = [0u8; 8];
        let mut b = [0u8; 8];
        a.copy_from_slice(d);
        b.copy_from_slice(s);
        let v = u64::from_ne_bytes(a) ^ u64::from_ne_bytes(b);
        d.copy_from_slice(&v.to_ne_bytes());
    }
    for (d, s) in dst_chunks.into_remainder().iter_mut().zip(src_chunks.remainder()) {
        *d ^= *s;
    }
}

/// dst[i] = src[i] * coeff
#[inline]
pub(crate) fn mul_mem(dst: &mut [u8], src: &[u8], coeff: u8) {
    debug_assert_eq!(dst.len(), src.len());

    match coeff {
        0 => dst.fill(0),
        1 => dst.copy_from_slice(src),
        _ => {
            let table = MUL_TABLES.get(coeff);
            for (d, s) in dst.iter_mut().zip(src) {
                *d = table[*s as usize];
            }
        }
    }
}
