//! Lane vectors.
//!
//! Shader routines execute [`WIDTH`] invocations at once. Every value is a vector with one
//! element per lane, and control flow is expressed with lane masks, where an active lane holds
//! all ones and an inactive lane holds zero.

use bytemuck::{Pod, Zeroable};
use std::ops::{Add, BitAnd, BitOr, Div, Mul, Not, Shl, Shr, Sub};

/// The number of lanes processed at once.
pub const WIDTH: usize = 4;

/// A vector of `f32`, one per lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(transparent)]
pub struct SimdFloat(pub [f32; WIDTH]);

/// A vector of `i32`, one per lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct SimdInt(pub [i32; WIDTH]);

/// A vector of `u32`, one per lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct SimdUInt(pub [u32; WIDTH]);

macro_rules! lanewise {
    ($ty:ident, $elem:ty, $($trait:ident :: $method:ident => $op:expr),+ $(,)?) => {
        $(
            impl $trait for $ty {
                type Output = Self;

                #[inline]
                fn $method(self, rhs: Self) -> Self {
                    let op: fn($elem, $elem) -> $elem = $op;
                    Self(std::array::from_fn(|lane| op(self.0[lane], rhs.0[lane])))
                }
            }
        )+
    };
}

lanewise!(SimdFloat, f32,
    Add::add => |a, b| a + b,
    Sub::sub => |a, b| a - b,
    Mul::mul => |a, b| a * b,
    Div::div => |a, b| a / b,
);

lanewise!(SimdInt, i32,
    Add::add => i32::wrapping_add,
    Sub::sub => i32::wrapping_sub,
    Mul::mul => i32::wrapping_mul,
    BitAnd::bitand => |a, b| a & b,
    BitOr::bitor => |a, b| a | b,
);

lanewise!(SimdUInt, u32,
    Add::add => u32::wrapping_add,
    Sub::sub => u32::wrapping_sub,
    Mul::mul => u32::wrapping_mul,
    BitAnd::bitand => |a, b| a & b,
    BitOr::bitor => |a, b| a | b,
);

impl Not for SimdInt {
    type Output = Self;

    #[inline]
    fn not(self) -> Self {
        Self(self.0.map(|x| !x))
    }
}

impl Shl<u32> for SimdInt {
    type Output = Self;

    #[inline]
    fn shl(self, rhs: u32) -> Self {
        Self(self.0.map(|x| x.wrapping_shl(rhs)))
    }
}

impl Shr<u32> for SimdInt {
    type Output = Self;

    /// Arithmetic shift.
    #[inline]
    fn shr(self, rhs: u32) -> Self {
        Self(self.0.map(|x| x.wrapping_shr(rhs)))
    }
}

impl Shl<u32> for SimdUInt {
    type Output = Self;

    #[inline]
    fn shl(self, rhs: u32) -> Self {
        Self(self.0.map(|x| x.wrapping_shl(rhs)))
    }
}

impl Shr<u32> for SimdUInt {
    type Output = Self;

    /// Logical shift.
    #[inline]
    fn shr(self, rhs: u32) -> Self {
        Self(self.0.map(|x| x.wrapping_shr(rhs)))
    }
}

impl SimdFloat {
    #[inline]
    pub const fn splat(value: f32) -> Self {
        Self([value; WIDTH])
    }

    /// Reinterprets the bits of every lane as a signed integer.
    #[inline]
    pub fn as_int(self) -> SimdInt {
        bytemuck::cast(self)
    }

    /// Reinterprets the bits of every lane as an unsigned integer.
    #[inline]
    pub fn as_uint(self) -> SimdUInt {
        bytemuck::cast(self)
    }

    #[inline]
    pub fn map(self, f: impl FnMut(f32) -> f32) -> Self {
        Self(self.0.map(f))
    }

    #[inline]
    pub fn min(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|lane| self.0[lane].min(rhs.0[lane])))
    }

    #[inline]
    pub fn max(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|lane| self.0[lane].max(rhs.0[lane])))
    }

    /// Clamps every lane to `[low, high]`. NaN lanes become `low`.
    #[inline]
    pub fn clamp(self, low: f32, high: f32) -> Self {
        self.map(|x| if x >= low { x.min(high) } else { low })
    }

    /// Rounds every lane to the nearest integer, ties to even.
    #[inline]
    pub fn round(self) -> Self {
        self.map(f32::round_ties_even)
    }

    /// Converts every lane to a signed integer, rounding to the nearest value.
    #[inline]
    pub fn round_int(self) -> SimdInt {
        SimdInt(self.0.map(|x| x.round_ties_even() as i32))
    }

    /// Converts every lane to a signed integer, truncating toward zero.
    #[inline]
    pub fn to_int(self) -> SimdInt {
        SimdInt(self.0.map(|x| x as i32))
    }

    /// Converts every lane to an unsigned integer, truncating toward zero.
    #[inline]
    pub fn to_uint(self) -> SimdUInt {
        SimdUInt(self.0.map(|x| x as u32))
    }

    /// Returns a mask of the lanes where `self < rhs`.
    #[inline]
    pub fn cmp_lt(self, rhs: Self) -> SimdInt {
        SimdInt(std::array::from_fn(|lane| mask(self.0[lane] < rhs.0[lane])))
    }
}

impl SimdInt {
    #[inline]
    pub const fn splat(value: i32) -> Self {
        Self([value; WIDTH])
    }

    /// Reinterprets the bits of every lane as a float.
    #[inline]
    pub fn as_float(self) -> SimdFloat {
        bytemuck::cast(self)
    }

    /// Reinterprets the bits of every lane as an unsigned integer.
    #[inline]
    pub fn as_uint(self) -> SimdUInt {
        bytemuck::cast(self)
    }

    #[inline]
    pub fn map(self, f: impl FnMut(i32) -> i32) -> Self {
        Self(self.0.map(f))
    }

    #[inline]
    pub fn max(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|lane| self.0[lane].max(rhs.0[lane])))
    }

    /// Converts every lane to a float.
    #[inline]
    pub fn to_float(self) -> SimdFloat {
        SimdFloat(self.0.map(|x| x as f32))
    }

    /// Returns whether any lane is non-zero.
    #[inline]
    pub fn any_true(self) -> bool {
        self.0.iter().any(|&x| x != 0)
    }

    /// Returns the lane mask as a bitfield, with bit `i` set if lane `i` is non-zero.
    #[inline]
    pub fn bits(self) -> u32 {
        (0..WIDTH).fold(0, |bits, lane| bits | (u32::from(self.0[lane] != 0) << lane))
    }

    /// Selects `if_true` in the lanes where `self` is non-zero, `if_false` elsewhere.
    #[inline]
    pub fn select<T: Copy>(self, if_true: [T; WIDTH], if_false: [T; WIDTH]) -> [T; WIDTH] {
        std::array::from_fn(|lane| {
            if self.0[lane] != 0 {
                if_true[lane]
            } else {
                if_false[lane]
            }
        })
    }
}

impl SimdUInt {
    #[inline]
    pub const fn splat(value: u32) -> Self {
        Self([value; WIDTH])
    }

    /// Reinterprets the bits of every lane as a float.
    #[inline]
    pub fn as_float(self) -> SimdFloat {
        bytemuck::cast(self)
    }

    /// Reinterprets the bits of every lane as a signed integer.
    #[inline]
    pub fn as_int(self) -> SimdInt {
        bytemuck::cast(self)
    }

    #[inline]
    pub fn map(self, f: impl FnMut(u32) -> u32) -> Self {
        Self(self.0.map(f))
    }

    /// Converts every lane to a float.
    #[inline]
    pub fn to_float(self) -> SimdFloat {
        SimdFloat(self.0.map(|x| x as f32))
    }

    /// Returns a mask of the lanes where `self >= rhs`, comparing unsigned.
    #[inline]
    pub fn cmp_ge(self, rhs: Self) -> SimdInt {
        SimdInt(std::array::from_fn(|lane| mask(self.0[lane] >= rhs.0[lane])))
    }
}

#[inline]
fn mask(condition: bool) -> i32 {
    if condition {
        -1
    } else {
        0
    }
}

/// What happens to lanes whose access falls outside of a pointer's limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutOfBoundsBehavior {
    /// Reads return zero and writes are dropped.
    Nullify,

    /// Reads and writes are only performed when the whole access is within the limit. Otherwise
    /// reads return zero and writes are dropped. Used when the offset has already been nullified
    /// per axis.
    RobustBufferAccess,

    /// Accesses are not checked.
    UndefinedBehavior,
}

/// A base pointer and one byte offset per lane.
#[derive(Clone, Copy, Debug)]
pub struct SimdPointer {
    base: *mut u8,
    limit: usize,
    pub offsets: SimdInt,
}

impl SimdPointer {
    /// Creates a pointer to `limit` addressable bytes, with all offsets at zero.
    #[inline]
    pub fn new(base: *mut u8, limit: usize) -> Self {
        SimdPointer {
            base,
            limit,
            offsets: SimdInt::splat(0),
        }
    }

    /// Returns the base pointer.
    #[inline]
    pub fn base(&self) -> *mut u8 {
        self.base
    }

    /// Returns the number of addressable bytes after the base pointer.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the same pointer with `offset` bytes added to every lane.
    #[inline]
    pub fn offset_by(self, offset: SimdInt) -> Self {
        SimdPointer {
            offsets: self.offsets + offset,
            ..self
        }
    }

    /// Returns the address of a lane.
    #[inline]
    pub fn lane_address(&self, lane: usize) -> *mut u8 {
        self.base.wrapping_offset(self.offsets.0[lane] as isize)
    }

    /// Returns a mask of the lanes for which an access of `access_size` bytes is entirely within
    /// the limit.
    pub fn is_in_bounds(&self, access_size: usize) -> SimdInt {
        SimdInt(std::array::from_fn(|lane| {
            let offset = self.offsets.0[lane];
            mask(offset >= 0 && offset as u64 + access_size as u64 <= self.limit as u64)
        }))
    }

    fn access_mask(
        &self,
        access_size: usize,
        lane_mask: SimdInt,
        behavior: OutOfBoundsBehavior,
    ) -> SimdInt {
        match behavior {
            OutOfBoundsBehavior::UndefinedBehavior => lane_mask,
            OutOfBoundsBehavior::Nullify | OutOfBoundsBehavior::RobustBufferAccess => {
                lane_mask & self.is_in_bounds(access_size)
            }
        }
    }

    /// Loads a 4-byte value in every lane enabled by `lane_mask`. Disabled lanes and lanes whose
    /// access is out of bounds read zero.
    ///
    /// # Safety
    ///
    /// - The `limit` bytes after the base pointer must be valid for reads.
    pub unsafe fn load(&self, lane_mask: SimdInt, behavior: OutOfBoundsBehavior) -> SimdUInt {
        let enabled = self.access_mask(4, lane_mask, behavior);

        SimdUInt(std::array::from_fn(|lane| {
            if enabled.0[lane] != 0 {
                unsafe { self.lane_address(lane).cast::<u32>().read_unaligned() }
            } else {
                0
            }
        }))
    }

    /// Loads a value of `N` bytes in every lane enabled by `lane_mask`, zero-extended to 32
    /// bits. Disabled lanes and lanes whose access is out of bounds read zero.
    ///
    /// # Safety
    ///
    /// - The `limit` bytes after the base pointer must be valid for reads.
    pub unsafe fn load_narrow<const N: usize>(
        &self,
        lane_mask: SimdInt,
        behavior: OutOfBoundsBehavior,
    ) -> SimdUInt {
        debug_assert!(N <= 4);
        let enabled = self.access_mask(N, lane_mask, behavior);

        SimdUInt(std::array::from_fn(|lane| {
            if enabled.0[lane] != 0 {
                let bytes = unsafe { self.lane_address(lane).cast::<[u8; N]>().read_unaligned() };
                bytes
                    .iter()
                    .enumerate()
                    .fold(0, |value, (i, &byte)| value | (u32::from(byte) << (8 * i)))
            } else {
                0
            }
        }))
    }

    /// Stores a 4-byte value in every lane enabled by `lane_mask`. Writes of disabled lanes and
    /// of lanes whose access is out of bounds are dropped.
    ///
    /// # Safety
    ///
    /// - The `limit` bytes after the base pointer must be valid for writes.
    pub unsafe fn store(&self, value: SimdUInt, lane_mask: SimdInt, behavior: OutOfBoundsBehavior) {
        let enabled = self.access_mask(4, lane_mask, behavior);

        for lane in 0..WIDTH {
            if enabled.0[lane] != 0 {
                unsafe {
                    self.lane_address(lane)
                        .cast::<u32>()
                        .write_unaligned(value.0[lane])
                };
            }
        }
    }

    /// Stores the low `N` bytes of a value in every lane enabled by `lane_mask`. Writes of
    /// disabled lanes and of lanes whose access is out of bounds are dropped.
    ///
    /// # Safety
    ///
    /// - The `limit` bytes after the base pointer must be valid for writes.
    pub unsafe fn store_narrow<const N: usize>(
        &self,
        value: SimdUInt,
        lane_mask: SimdInt,
        behavior: OutOfBoundsBehavior,
    ) {
        debug_assert!(N <= 4);
        let enabled = self.access_mask(N, lane_mask, behavior);

        for lane in 0..WIDTH {
            if enabled.0[lane] != 0 {
                let bytes: [u8; N] = std::array::from_fn(|i| (value.0[lane] >> (8 * i)) as u8);
                unsafe {
                    self.lane_address(lane)
                        .cast::<[u8; N]>()
                        .write_unaligned(bytes)
                };
            }
        }
    }
}
