//! Early rasterization of triangles that fit one 4x4 pixel tile
//!
//! Small triangles often cover no pixel center at all. When the inclusive
//! bounding box lies inside a single ER tile, the 16 pixel centers of that
//! tile are tested against the three edges and uncovered triangles are culled
//! before any work item is built.

use super::setup::{BBox, EdgeSetup};
use crate::tiles::{ER_TILE_X_DIM, ER_TILE_X_SHIFT, ER_TILE_Y_DIM, ER_TILE_Y_SHIFT, FIXED_POINT_SCALE, FIXED_POINT_SHIFT};

/// Inclusive bbox lies in one ER tile
#[inline]
pub fn fits_er_tile(bbox: &BBox) -> bool {
    let sx = ER_TILE_X_SHIFT + FIXED_POINT_SHIFT;
    let sy = ER_TILE_Y_SHIFT + FIXED_POINT_SHIFT;
    bbox.xmin >> sx == bbox.xmax >> sx && bbox.ymin >> sy == bbox.ymax >> sy
}

/// True if any pixel center of the bbox's ER tile is inside the triangle
pub fn covers_any_pixel(bbox: &BBox, x: &[i32; 3], y: &[i32; 3], edges: &EdgeSetup) -> bool {
    let sx = ER_TILE_X_SHIFT + FIXED_POINT_SHIFT;
    let sy = ER_TILE_Y_SHIFT + FIXED_POINT_SHIFT;
    let top_left_x = ((bbox.xmin >> sx) << sx) as i64 + (FIXED_POINT_SCALE / 2) as i64;
    let top_left_y = ((bbox.ymin >> sy) << sy) as i64 + (FIXED_POINT_SCALE / 2) as i64;

    // covered = all edges negative, so CW triangles flip sign
    let sign = if edges.det > 0 { -1 } else { 1 };
    let mut start = [0i64; 3];
    let mut a = [0i64; 3];
    let mut b = [0i64; 3];
    for k in 0..3 {
        a[k] = edges.a[k] as i64 * sign;
        b[k] = edges.b[k] as i64 * sign;
        let e = (a[k] * (top_left_x - x[k] as i64) + b[k] * (top_left_y - y[k] as i64)) >> FIXED_POINT_SHIFT;
        // top-left rule
        start[k] = if a[k] < 0 || (a[k] == 0 && b[k] < 0) { e - 1 } else { e };
    }

    (0..ER_TILE_Y_DIM as i64).any(|py| {
        (0..ER_TILE_X_DIM as i64).any(|px| (0..3).all(|k| start[k] + a[k] * px + b[k] * py < 0))
    })
}
