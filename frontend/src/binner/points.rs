//! Point binning
//!
//! Single-pixel points skip the bounding box entirely: the tile-relative
//! pixel is packed into the coverage mask and the item goes to one
//! macrotile. Every other point is bloated to a box and rasterized as a quad.

use alloc::vec::Vec;
use glam::{Vec3, Vec4};

use super::setup::{BBox, TileRange, to_fixed};
use super::{array_indices, enqueue, to_screen};
use crate::attributes::{process_attributes, process_user_clip};
use crate::context::{DrawContext, PrimIds, WorkerContext};
use crate::pa::PrimitiveAssembler;
use crate::simd::{SimdVec4, active_lanes};
use crate::state::SampleCount;
use crate::tiles::{
    FIXED_POINT_SHIFT, MACRO_TILE_X_DIM_FIXED_SHIFT, MACRO_TILE_Y_DIM_FIXED_SHIFT, TILE_X_DIM_SHIFT, TILE_Y_DIM_SHIFT,
};
use crate::topology::MAX_VERTS_PER_PRIM;
use crate::vertex::{VERTEX_SGV_POINT_SIZE_COMP, VERTEX_SGV_SLOT};
use crate::work::{RasterizerFunc, TriFlags, VertexData, WorkItem};

/// Single-sample, one pixel, no sprite and no clip distances
fn simple_points(ctx: &DrawContext) -> bool {
    let raster = &ctx.state.raster;
    raster.sample_count == SampleCount::X1
        && raster.point_size == 1.0
        && !raster.point_param
        && !raster.point_sprite
        && ctx.state.backend.clip_distance_mask == 0
}

/// Bin one screen-space point of `lane`, taken from assembled vertex
/// `vertex`. Returns false if it was culled.
pub(crate) fn bin_point_lane<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    worker: &mut WorkerContext<W>,
    lane: usize,
    point: Vec4,
    vertex: usize,
    prim_id: u32,
    (viewport, rt): (u32, u32),
) -> bool {
    let x = to_fixed(point.x);
    let y = to_fixed(point.y);

    if simple_points(ctx) {
        // pixel (x, y) covers the center at x + 0.5
        let (x, y) = (x - 1, y - 1);
        if x < 0 || y < 0 {
            return false;
        }
        let raster_x = x >> (TILE_X_DIM_SHIFT + FIXED_POINT_SHIFT);
        let raster_y = y >> (TILE_Y_DIM_SHIFT + FIXED_POINT_SHIFT);
        let aligned_x = raster_x << TILE_X_DIM_SHIFT;
        let aligned_y = raster_y << TILE_Y_DIM_SHIFT;
        let rel_x = (x >> FIXED_POINT_SHIFT) - aligned_x;
        let rel_y = (y >> FIXED_POINT_SHIFT) - aligned_y;

        let item = WorkItem {
            rasterizer: RasterizerFunc::SimplePoint,
            vertices: VertexData::SimplePoint {
                tile_x: aligned_x as u32,
                tile_y: aligned_y as u32,
                z: point.z,
            },
            attribs: process_attributes(ctx, pa, lane, prim_id, &[vertex], false),
            num_attribs: ctx.state.backend.num_attributes,
            user_clip: Vec::new(),
            flags: TriFlags {
                front_facing: true,
                viewport_index: viewport,
                render_target_array_index: rt,
                coverage_mask: (rel_x | rel_y << 4) as u32,
                ..TriFlags::default()
            },
            prim_id,
        };
        let tile = TileRange::single(
            (x >> MACRO_TILE_X_DIM_FIXED_SHIFT) as u32,
            (y >> MACRO_TILE_Y_DIM_FIXED_SHIFT) as u32,
        );
        enqueue(ctx, worker, item, tile);
        return true;
    }

    let size = if ctx.state.raster.point_param {
        let mut sgv = [Vec4::ZERO; MAX_VERTS_PER_PRIM];
        let nverts = pa.verts_per_prim().min(MAX_VERTS_PER_PRIM);
        pa.assemble_single(VERTEX_SGV_SLOT, lane, &mut sgv[..nverts]);
        sgv[vertex][VERTEX_SGV_POINT_SIZE_COMP]
    } else {
        ctx.state.raster.point_size
    };
    let half = to_fixed(size * 0.5);
    let bbox = BBox::from_points(&[x], &[y])
        .bloat(half, half)
        .clamp_inclusive(&ctx.scissor(viewport));
    if bbox.is_empty() {
        return false;
    }

    let user_clip = process_user_clip(ctx, pa, lane, &[vertex], &[1.0])
        .into_iter()
        .flat_map(|d| [0.0, 0.0, d])
        .collect();
    let item = WorkItem {
        rasterizer: RasterizerFunc::TriPoint,
        vertices: VertexData::Point(Vec3::new(point.x, point.y, point.z)),
        attribs: process_attributes(ctx, pa, lane, prim_id, &[vertex], false),
        num_attribs: ctx.state.backend.num_attributes,
        user_clip,
        flags: TriFlags {
            front_facing: true,
            viewport_index: viewport,
            render_target_array_index: rt,
            point_size: size,
            ..TriFlags::default()
        },
        prim_id,
    };
    enqueue(ctx, worker, item, bbox.macro_tiles());
    true
}

/// Bin the active lanes of a group of clip-space points
pub fn bin_points<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    worker: &mut WorkerContext<W>,
    prims: &[SimdVec4<W>],
    mask: u32,
    ids: &PrimIds<W>,
) {
    debug_assert!(!prims.is_empty());
    let mut culled = 0;
    for lane in active_lanes(mask) {
        let indices = array_indices(ctx, pa, ids, lane);
        let point = to_screen(ctx, prims[0].lane(lane), indices.0);
        if !bin_point_lane(ctx, pa, worker, lane, point, 0, ids.prim_id(lane), indices) {
            culled += 1;
        }
    }
    log::trace!("bin_points: {} active, {} culled", mask.count_ones(), culled);
}
