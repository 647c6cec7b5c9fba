//! Fixed-point primitive setup shared by the binners

use crate::state::{CullMode, FrontWinding};
use crate::tiles::{FIXED_POINT_SCALE, MACRO_TILE_X_DIM_FIXED_SHIFT, MACRO_TILE_Y_DIM_FIXED_SHIFT};
use crate::work::ALL_EDGES_VALID;

/// Largest fixed-point magnitude a coordinate is clamped to. Edge
/// coefficients, bloats and line deltas stay inside `i32` and the
/// determinant inside `i64`.
pub const FIXED_COORD_LIMIT: i32 = 1 << 29;

/// Screen coordinate to x.8 fixed point, rounding to nearest even.
/// Unclipped coordinates past the limit saturate; NaN maps to 0.
#[inline]
pub fn to_fixed(v: f32) -> i32 {
    let limit = FIXED_COORD_LIMIT as f32;
    libm::rintf(v * FIXED_POINT_SCALE as f32).clamp(-limit, limit) as i32
}

/// Fixed-point bounding box. Exclusive max until `clamp_inclusive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl BBox {
    pub fn from_points(xs: &[i32], ys: &[i32]) -> Self {
        let mut b = BBox {
            xmin: i32::MAX,
            ymin: i32::MAX,
            xmax: i32::MIN,
            ymax: i32::MIN,
        };
        for (&x, &y) in xs.iter().zip(ys) {
            b.xmin = b.xmin.min(x);
            b.xmax = b.xmax.max(x);
            b.ymin = b.ymin.min(y);
            b.ymax = b.ymax.max(y);
        }
        b
    }

    /// Grow by `dx` on the left and right and by `dy` on the top and bottom
    #[inline]
    pub fn bloat(self, dx: i32, dy: i32) -> Self {
        BBox {
            xmin: self.xmin - dx,
            ymin: self.ymin - dy,
            xmax: self.xmax + dx,
            ymax: self.ymax + dy,
        }
    }

    /// Make max inclusive and clip to the inclusive `scissor`
    #[inline]
    pub fn clamp_inclusive(self, scissor: &BBox) -> Self {
        BBox {
            xmin: self.xmin.max(scissor.xmin),
            ymin: self.ymin.max(scissor.ymin),
            xmax: (self.xmax - 1).min(scissor.xmax),
            ymax: (self.ymax - 1).min(scissor.ymax),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xmin > self.xmax || self.ymin > self.ymax
    }

    /// Macrotiles touched by an inclusive, non-empty box
    #[inline]
    pub fn macro_tiles(&self) -> TileRange {
        debug_assert!(!self.is_empty() && self.xmin >= 0 && self.ymin >= 0);
        TileRange {
            left: (self.xmin >> MACRO_TILE_X_DIM_FIXED_SHIFT) as u32,
            top: (self.ymin >> MACRO_TILE_Y_DIM_FIXED_SHIFT) as u32,
            right: (self.xmax >> MACRO_TILE_X_DIM_FIXED_SHIFT) as u32,
            bottom: (self.ymax >> MACRO_TILE_Y_DIM_FIXED_SHIFT) as u32,
        }
    }
}

/// Inclusive macrotile rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl TileRange {
    /// Single macrotile
    pub fn single(x: u32, y: u32) -> Self {
        Self {
            left: x,
            top: y,
            right: x,
            bottom: y,
        }
    }

    pub fn count(&self) -> u32 {
        (self.right - self.left + 1) * (self.bottom - self.top + 1)
    }

    /// Row-major tile coordinates
    pub fn iter(self) -> impl Iterator<Item = (u32, u32)> {
        let TileRange {
            left,
            top,
            right,
            bottom,
        } = self;
        (top..=bottom).flat_map(move |y| (left..=right).map(move |x| (x, y)))
    }
}

/// Edge coefficients and determinant of a fixed-point triangle.
///
/// Edge `i` runs from vertex `i` to vertex `i + 1`:
/// `A_i = y_i - y_{i+1}`, `B_i = x_{i+1} - x_i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeSetup {
    pub a: [i32; 3],
    pub b: [i32; 3],
    pub det: i64,
}

impl EdgeSetup {
    pub fn new(x: &[i32; 3], y: &[i32; 3]) -> Self {
        let a = [y[0] - y[1], y[1] - y[2], y[2] - y[0]];
        let b = [x[1] - x[0], x[2] - x[1], x[0] - x[2]];
        let det = a[1] as i64 * b[2] as i64 - b[1] as i64 * a[2] as i64;
        Self { a, b, det }
    }

    /// Zero area is never front facing
    #[inline]
    pub fn front_facing(&self, winding: FrontWinding) -> bool {
        match winding {
            FrontWinding::Cw => self.det > 0,
            FrontWinding::Ccw => self.det < 0,
        }
    }
}

#[inline]
pub fn cull_by_mode(mode: CullMode, front_facing: bool) -> bool {
    match mode {
        CullMode::Both => true,
        CullMode::None => false,
        CullMode::Front => front_facing,
        CullMode::Back => !front_facing,
    }
}

/// Edges of a degenerate triangle that still rasterize.
/// Bit 0 = v0v1, bit 1 = v1v2, bit 2 = v0v2.
pub fn conservative_edge_mask(x: &[i32; 3], y: &[i32; 3]) -> u32 {
    let e0 = x[0] == x[1] && y[0] == y[1];
    let e1 = x[1] == x[2] && y[1] == y[2];
    let e2 = e0 && e1;
    let mut invalid = 0;
    if e0 {
        invalid |= 0b001;
    }
    if e1 {
        invalid |= 0b010;
    }
    if e2 {
        invalid |= 0b100;
    }
    ALL_EDGES_VALID & !invalid
}

/// Exclusive box range contains no pixel center
#[inline]
pub fn between_pixel_centers(min: i32, max: i32) -> bool {
    (min + 127) & !255 == (max + 128) & !255
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_point_rounds_half_even() {
        assert_eq!(to_fixed(10.0), 2560);
        assert_eq!(to_fixed(0.5 / 256.0), 0);
        assert_eq!(to_fixed(1.5 / 256.0), 2);
        assert_eq!(to_fixed(-1.5 / 256.0), -2);
    }

    #[test]
    fn test_huge_coordinates_saturate() {
        assert_eq!(to_fixed(1e12), FIXED_COORD_LIMIT);
        assert_eq!(to_fixed(-1e12), -FIXED_COORD_LIMIT);
        assert_eq!(to_fixed(f32::INFINITY), FIXED_COORD_LIMIT);

        let x = [-FIXED_COORD_LIMIT, FIXED_COORD_LIMIT, 0];
        let y = [FIXED_COORD_LIMIT, FIXED_COORD_LIMIT, -FIXED_COORD_LIMIT];
        let e = EdgeSetup::new(&x, &y);
        assert_eq!(e.b[0], 2 * FIXED_COORD_LIMIT);
        assert!(e.det != 0);
        let b = BBox::from_points(&x, &y).bloat(FIXED_COORD_LIMIT, FIXED_COORD_LIMIT);
        assert_eq!(b.xmin, -2 * FIXED_COORD_LIMIT);
    }

    #[test]
    fn test_determinant_sign_follows_winding() {
        let x = [2560, 5120, 2560];
        let y = [2560, 2560, 5120];
        let e = EdgeSetup::new(&x, &y);
        assert!(e.det > 0);
        assert!(e.front_facing(FrontWinding::Cw));
        assert!(!e.front_facing(FrontWinding::Ccw));

        let flipped = EdgeSetup::new(&[x[0], x[2], x[1]], &[y[0], y[2], y[1]]);
        assert_eq!(flipped.det, -e.det);
    }

    #[test]
    fn test_shared_edge_is_watertight() {
        // (v0, v1, v2) and (v2, v1, v3) share v1v2
        let v = [(1000, 1200), (5321, 900), (2222, 7777), (6000, 6000)];
        let t0 = EdgeSetup::new(&[v[0].0, v[1].0, v[2].0], &[v[0].1, v[1].1, v[2].1]);
        let t1 = EdgeSetup::new(&[v[2].0, v[1].0, v[3].0], &[v[2].1, v[1].1, v[3].1]);
        assert_eq!(t0.a[1], -t1.a[0]);
        assert_eq!(t0.b[1], -t1.b[0]);
    }

    #[test]
    fn test_degenerate_edge_masks() {
        // v0 == v1
        assert_eq!(conservative_edge_mask(&[5, 5, 9], &[1, 1, 4]), 0b110);
        // v1 == v2
        assert_eq!(conservative_edge_mask(&[5, 9, 9], &[1, 4, 4]), 0b101);
        // collinear, distinct
        assert_eq!(conservative_edge_mask(&[0, 4, 8], &[0, 4, 8]), ALL_EDGES_VALID);
        // all coincident
        assert_eq!(conservative_edge_mask(&[3, 3, 3], &[3, 3, 3]), 0);
    }

    #[test]
    fn test_between_pixel_centers() {
        // 10.6 .. 10.9 straddles no center at 10.5 / 11.5
        assert!(between_pixel_centers(2714, 2790));
        // 10.2 .. 10.8 covers 10.5
        assert!(!between_pixel_centers(2611, 2765));
    }

    #[test]
    fn test_bbox_clamp_and_tiles() {
        let scissor = BBox {
            xmin: 0,
            ymin: 0,
            xmax: 100 * 256 - 1,
            ymax: 100 * 256 - 1,
        };
        let b = BBox::from_points(&[2560, 5120, 2560], &[2560, 2560, 5120]).clamp_inclusive(&scissor);
        assert_eq!(b.xmax, 5119);
        assert_eq!(b.macro_tiles(), TileRange::single(0, 0));

        let wide = BBox {
            xmin: 60 * 256,
            ymin: 10,
            xmax: 200 * 256,
            ymax: 70 * 256,
        };
        let tiles = wide.macro_tiles();
        assert_eq!((tiles.left, tiles.right, tiles.top, tiles.bottom), (0, 3, 0, 1));
        assert_eq!(tiles.count(), 8);
        assert_eq!(tiles.iter().count(), 8);
        assert_eq!(tiles.iter().nth(4), Some((0, 1)));

        let outside = BBox::from_points(&[-900, -300], &[10, 20]).clamp_inclusive(&scissor);
        assert!(outside.is_empty());
    }
}
