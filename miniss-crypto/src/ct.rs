#![forbid(unsafe_code)]

//! Constant-time three-way comparison.
//!
//! Bytes are compared as unsigned values, left to right. The first differing
//! byte decides the result; every byte is visited regardless, and the running
//! result is updated with `subtle` selections instead of branches.

use std::cmp::Ordering;

use subtle::{Choice, ConditionallySelectable, ConstantTimeGreater, ConstantTimeLess};

/// Compare `a` and `b` lexicographically without data-dependent branches.
///
/// Lengths are treated as public: slices of different length are ordered by
/// length before their contents are looked at.
pub fn ct_compare(a: &[u8], b: &[u8]) -> Ordering {
    if a.len() != b.len() {
        return a.len().cmp(&b.len());
    }

    let mut result = 0i8;
    let mut decided = Choice::from(0);
    for (x, y) in a.iter().zip(b.iter()) {
        let gt = x.ct_gt(y);
        let lt = x.ct_lt(y);
        let mut here = i8::conditional_select(&0, &1, gt);
        here = i8::conditional_select(&here, &-1, lt);
        result = i8::conditional_select(&here, &result, decided);
        decided |= gt | lt;
    }

    result.cmp(&0)
}
