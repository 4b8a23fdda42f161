//! Export boundary
//!
//! The two entry points foreign callers link against. Both use the C calling
//! convention and are emitted under their plain names, so a caller in any
//! language resolves them as `add` and `add_struct`.
//!
//! The scalar width is pinned to 32 bits (`i32` here, `int32_t` in the
//! generated header) rather than left to the platform's `int`.
//!
//! # Safety contract
//!
//! Nothing at runtime can detect a caller that disagrees with the layout of
//! [`NumberPair`] or with the calling convention: the result is undefined
//! behaviour, not an error. The only defence is keeping every caller on the
//! header generated from this file (`numbers-abi header`) and running
//! `numbers-abi check` in CI.

use static_assertions::{assert_eq_align, assert_eq_size, const_assert_eq};
use std::mem;

/// Composite argument of [`add_struct`].
///
/// Layout is C layout: `a` at offset 0, `b` at offset 4, size 8, align 4.
/// Always passed by value.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NumberPair {
    pub a: i32,
    pub b: i32,
}

impl NumberPair {
    pub const fn new(a: i32, b: i32) -> Self {
        NumberPair { a, b }
    }
}

assert_eq_size!(NumberPair, [i32; 2]);
assert_eq_align!(NumberPair, i32);
const_assert_eq!(mem::offset_of!(NumberPair, a), 0);
const_assert_eq!(mem::offset_of!(NumberPair, b), 4);

/// Sum of two 32-bit integers. Overflow wraps.
#[unsafe(no_mangle)]
pub extern "C" fn add(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

/// Sum of the two fields of `pair`. Overflow wraps.
#[unsafe(no_mangle)]
pub extern "C" fn add_struct(pair: NumberPair) -> i32 {
    add(pair.a, pair.b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_scenarios() {
        assert_eq!(add(2, 3), 5);
        assert_eq!(add(2147483647, 1), -2147483648);
        assert_eq!(add(-10, 4), -6);
    }

    #[test]
    fn test_add_struct_scenarios() {
        assert_eq!(add_struct(NumberPair::new(2, 3)), 5);
        assert_eq!(add_struct(NumberPair { a: -10, b: 4 }), -6);
    }

    #[test]
    fn test_wraparound_both_directions() {
        assert_eq!(add(i32::MAX, 1), i32::MIN);
        assert_eq!(add(i32::MIN, -1), i32::MAX);
        assert_eq!(add(i32::MIN, i32::MIN), 0);
        assert_eq!(add(i32::MAX, i32::MAX), -2);
    }

    #[test]
    fn test_add_struct_does_not_touch_caller_copy() {
        let pair = NumberPair::new(7, 8);
        let _ = add_struct(pair);
        assert_eq!(pair, NumberPair::new(7, 8));
    }

    #[test]
    fn test_layout() {
        assert_eq!(mem::size_of::<NumberPair>(), 8);
        assert_eq!(mem::align_of::<NumberPair>(), 4);
        assert_eq!(mem::offset_of!(NumberPair, b), 4);
    }
}
