//! Lane-width generic SIMD vectors
//!
//! Every stage is written once over `const W: usize` and instantiated for 8
//! and 16 lanes. Lane masks are plain `u32` bitmasks, bit `i` = lane `i`.

use core::ops::{Add, BitAnd, BitOr, Div, Index, IndexMut, Mul, Neg, Sub};
use glam::Vec4;

/// Lane count of the 8-wide pipeline
pub const SIMD_WIDTH: usize = 8;

/// Lane count of the 16-wide pipeline
pub const SIMD16_WIDTH: usize = 16;

pub type SimdFloat = Float<SIMD_WIDTH>;
pub type SimdInt = Int<SIMD_WIDTH>;
pub type SimdVector = SimdVec4<SIMD_WIDTH>;
pub type Simd16Float = Float<SIMD16_WIDTH>;
pub type Simd16Int = Int<SIMD16_WIDTH>;
pub type Simd16Vector = SimdVec4<SIMD16_WIDTH>;

/// Marker carrying a lane count
pub struct Lanes<const W: usize>;

/// Implemented for the lane counts the pipeline is built for
pub trait SupportedLanes {}

impl SupportedLanes for Lanes<SIMD_WIDTH> {}
impl SupportedLanes for Lanes<SIMD16_WIDTH> {}

/// Mask with the low `count` lanes set
#[inline]
pub fn lane_mask(count: usize) -> u32 {
    if count >= 32 {
        u32::MAX
    } else {
        (1u32 << count) - 1
    }
}

/// Iterate the set lanes of a mask, lowest first
#[inline]
pub fn active_lanes(mask: u32) -> ActiveLanes {
    ActiveLanes(mask)
}

/// Iterator returned by [`active_lanes`]
#[derive(Debug, Clone, Copy)]
pub struct ActiveLanes(u32);

impl Iterator for ActiveLanes {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let lane = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(lane)
    }
}

/// One `f32` per lane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Float<const W: usize>(pub [f32; W]);

impl<const W: usize> Default for Float<W> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<const W: usize> Float<W> {
    #[inline]
    pub fn splat(v: f32) -> Self {
        Self([v; W])
    }

    #[inline]
    pub fn zero() -> Self {
        Self::splat(0.0)
    }

    #[inline]
    pub fn from_fn(f: impl FnMut(usize) -> f32) -> Self {
        Self(core::array::from_fn(f))
    }

    #[inline]
    pub fn map(self, f: impl FnMut(f32) -> f32) -> Self {
        Self(self.0.map(f))
    }

    #[inline]
    pub fn zip(self, other: Self, mut f: impl FnMut(f32, f32) -> f32) -> Self {
        Self::from_fn(|i| f(self.0[i], other.0[i]))
    }

    /// Bitmask of lanes where `pred` holds
    #[inline]
    pub fn mask(&self, mut pred: impl FnMut(f32) -> bool) -> u32 {
        self.0
            .iter()
            .enumerate()
            .fold(0, |m, (i, &v)| if pred(v) { m | (1 << i) } else { m })
    }

    /// Bitmask of lanes where `pred(self, other)` holds
    #[inline]
    pub fn cmp_mask(&self, other: &Self, mut pred: impl FnMut(f32, f32) -> bool) -> u32 {
        (0..W).fold(0, |m, i| {
            if pred(self.0[i], other.0[i]) {
                m | (1 << i)
            } else {
                m
            }
        })
    }

    #[inline]
    pub fn lt_mask(&self, other: &Self) -> u32 {
        self.cmp_mask(other, |a, b| a < b)
    }

    #[inline]
    pub fn gt_mask(&self, other: &Self) -> u32 {
        self.cmp_mask(other, |a, b| a > b)
    }

    #[inline]
    pub fn nan_mask(&self) -> u32 {
        self.mask(f32::is_nan)
    }

    /// Take lanes from `other` where `mask` is set
    #[inline]
    pub fn select(self, other: Self, mask: u32) -> Self {
        Self::from_fn(|i| if mask & (1 << i) != 0 { other.0[i] } else { self.0[i] })
    }

    #[inline]
    pub fn recip(self) -> Self {
        self.map(|v| 1.0 / v)
    }

    #[inline]
    pub fn lane(&self, lane: usize) -> f32 {
        self.0[lane]
    }
}

impl<const W: usize> Add for Float<W> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a + b)
    }
}

impl<const W: usize> Sub for Float<W> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a - b)
    }
}

impl<const W: usize> Mul for Float<W> {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a * b)
    }
}

impl<const W: usize> Div for Float<W> {
    type Output = Self;

    #[inline]
    fn div(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a / b)
    }
}

impl<const W: usize> Neg for Float<W> {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        self.map(|v| -v)
    }
}

impl<const W: usize> Index<usize> for Float<W> {
    type Output = f32;

    #[inline]
    fn index(&self, lane: usize) -> &f32 {
        &self.0[lane]
    }
}

impl<const W: usize> IndexMut<usize> for Float<W> {
    #[inline]
    fn index_mut(&mut self, lane: usize) -> &mut f32 {
        &mut self.0[lane]
    }
}

/// One `i32` per lane. Arithmetic wraps like the hardware integer ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Int<const W: usize>(pub [i32; W]);

impl<const W: usize> Default for Int<W> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<const W: usize> Int<W> {
    #[inline]
    pub fn splat(v: i32) -> Self {
        Self([v; W])
    }

    #[inline]
    pub fn zero() -> Self {
        Self::splat(0)
    }

    #[inline]
    pub fn from_fn(f: impl FnMut(usize) -> i32) -> Self {
        Self(core::array::from_fn(f))
    }

    #[inline]
    pub fn map(self, f: impl FnMut(i32) -> i32) -> Self {
        Self(self.0.map(f))
    }

    #[inline]
    pub fn zip(self, other: Self, mut f: impl FnMut(i32, i32) -> i32) -> Self {
        Self::from_fn(|i| f(self.0[i], other.0[i]))
    }

    #[inline]
    pub fn cmp_mask(&self, other: &Self, mut pred: impl FnMut(i32, i32) -> bool) -> u32 {
        (0..W).fold(0, |m, i| {
            if pred(self.0[i], other.0[i]) {
                m | (1 << i)
            } else {
                m
            }
        })
    }

    #[inline]
    pub fn eq_mask(&self, other: &Self) -> u32 {
        self.cmp_mask(other, |a, b| a == b)
    }

    #[inline]
    pub fn gt_mask(&self, other: &Self) -> u32 {
        self.cmp_mask(other, |a, b| a > b)
    }

    /// Lanes with the sign bit set
    #[inline]
    pub fn sign_mask(&self) -> u32 {
        self.cmp_mask(&Self::zero(), |a, _| a < 0)
    }

    /// Lanes that are non-zero
    #[inline]
    pub fn nonzero_mask(&self) -> u32 {
        self.cmp_mask(&Self::zero(), |a, _| a != 0)
    }

    #[inline]
    pub fn min(self, other: Self) -> Self {
        self.zip(other, i32::min)
    }

    #[inline]
    pub fn max(self, other: Self) -> Self {
        self.zip(other, i32::max)
    }

    /// Arithmetic shift right
    #[inline]
    pub fn shr(self, bits: u32) -> Self {
        self.map(|v| v >> bits)
    }

    #[inline]
    pub fn shl(self, bits: u32) -> Self {
        self.map(|v| v.wrapping_shl(bits))
    }

    #[inline]
    pub fn select(self, other: Self, mask: u32) -> Self {
        Self::from_fn(|i| if mask & (1 << i) != 0 { other.0[i] } else { self.0[i] })
    }

    #[inline]
    pub fn lane(&self, lane: usize) -> i32 {
        self.0[lane]
    }
}

impl<const W: usize> Add for Int<W> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        self.zip(rhs, i32::wrapping_add)
    }
}

impl<const W: usize> Sub for Int<W> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self.zip(rhs, i32::wrapping_sub)
    }
}

impl<const W: usize> Mul for Int<W> {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self.zip(rhs, i32::wrapping_mul)
    }
}

impl<const W: usize> BitAnd for Int<W> {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a & b)
    }
}

impl<const W: usize> BitOr for Int<W> {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a | b)
    }
}

impl<const W: usize> Index<usize> for Int<W> {
    type Output = i32;

    #[inline]
    fn index(&self, lane: usize) -> &i32 {
        &self.0[lane]
    }
}

/// A 4-component vector per lane (x, y, z, w rows)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimdVec4<const W: usize>(pub [Float<W>; 4]);

impl<const W: usize> Default for SimdVec4<W> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<const W: usize> SimdVec4<W> {
    #[inline]
    pub fn zero() -> Self {
        Self([Float::zero(); 4])
    }

    /// Broadcast one vector to every lane
    #[inline]
    pub fn splat(v: Vec4) -> Self {
        Self([
            Float::splat(v.x),
            Float::splat(v.y),
            Float::splat(v.z),
            Float::splat(v.w),
        ])
    }

    /// Build from one vector per lane
    pub fn from_lanes(mut f: impl FnMut(usize) -> Vec4) -> Self {
        let mut out = Self::zero();
        for lane in 0..W {
            out.set_lane(lane, f(lane));
        }
        out
    }

    #[inline]
    pub fn x(&self) -> Float<W> {
        self.0[0]
    }

    #[inline]
    pub fn y(&self) -> Float<W> {
        self.0[1]
    }

    #[inline]
    pub fn z(&self) -> Float<W> {
        self.0[2]
    }

    #[inline]
    pub fn w(&self) -> Float<W> {
        self.0[3]
    }

    /// Horizontal extraction of one lane
    #[inline]
    pub fn lane(&self, lane: usize) -> Vec4 {
        Vec4::new(
            self.0[0].0[lane],
            self.0[1].0[lane],
            self.0[2].0[lane],
            self.0[3].0[lane],
        )
    }

    #[inline]
    pub fn set_lane(&mut self, lane: usize, v: Vec4) {
        self.0[0].0[lane] = v.x;
        self.0[1].0[lane] = v.y;
        self.0[2].0[lane] = v.z;
        self.0[3].0[lane] = v.w;
    }
}

impl<const W: usize> Index<usize> for SimdVec4<W> {
    type Output = Float<W>;

    #[inline]
    fn index(&self, comp: usize) -> &Float<W> {
        &self.0[comp]
    }
}

impl<const W: usize> IndexMut<usize> for SimdVec4<W> {
    #[inline]
    fn index_mut(&mut self, comp: usize) -> &mut Float<W> {
        &mut self.0[comp]
    }
}
