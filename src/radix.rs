//! Mixed-radix index helpers for MSR sub-packet addressing.
//!
//! A sub-packet index `a` in `[0, r^m)` is read as `m` base-`r` digits,
//! least significant first. Digit `v` of `a` tells which of the `r` nodes in
//! group `v` the sub-packet is coupled with.

/// Little-endian base-`base` digits of `value`, exactly `len` of them.
///
/// Digits beyond `len` are dropped.
pub fn digits(value: usize, base: usize, len: usize) -> Vec<usize> {
    let mut rest = value;
    (0..len)
        .map(|_| {
            let d = rest % base;
            rest /= base;
            d
        })
        .collect()
}

/// Inverse of [`digits`].
pub fn undigits(digits: &[usize], base: usize) -> usize {
    digits.iter().rev().fold(0, |acc, &d| acc * base + d)
}

/// `value` with its digit at `position` replaced by `digit`.
pub fn replace_digit(value: usize, base: usize, len: usize, position: usize, digit: usize) -> usize {
    let mut ds = digits(value, base, len);
    ds[position] = digit;
    undigits(&ds, base)
}
