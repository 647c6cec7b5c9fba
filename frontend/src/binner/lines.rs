//! Line binning

use glam::Vec4;

use super::setup::{BBox, to_fixed};
use super::{array_indices, enqueue, to_screen};
use crate::attributes::{process_attributes, process_user_clip};
use crate::context::{DrawContext, PrimIds, WorkerContext};
use crate::pa::PrimitiveAssembler;
use crate::simd::{SimdVec4, active_lanes};
use crate::work::{RasterizerFunc, TriFlags, VertexData, WorkItem};

/// A line in screen space, `w` = 1/w
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScreenLine {
    pub verts: [Vec4; 2],
    /// Assembled vertices the endpoints came from
    pub vertex_map: [usize; 2],
}

/// Bin one screen-space line of `lane`. Returns false if it was culled.
pub(crate) fn bin_line_lane<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    worker: &mut WorkerContext<W>,
    lane: usize,
    line: &ScreenLine,
    prim_id: u32,
    (viewport, rt): (u32, u32),
) -> bool {
    let [v0, v1] = line.verts;
    let x = [to_fixed(v0.x), to_fixed(v1.x)];
    let y = [to_fixed(v0.y), to_fixed(v1.y)];

    let dx = (x[0] - x[1]).abs();
    let dy = (y[0] - y[1]).abs();
    if dx == 0 && dy == 0 {
        return false;
    }
    let y_major = dy > dx;

    // bloat along the minor axis only
    let half_width = to_fixed(ctx.state.raster.line_width / 2.0);
    let bbox = BBox::from_points(&x, &y);
    let bbox = if y_major {
        bbox.bloat(half_width, 0)
    } else {
        bbox.bloat(0, half_width)
    };
    let bbox = bbox.clamp_inclusive(&ctx.scissor(viewport));
    if bbox.is_empty() {
        return false;
    }

    let recip_w = [v0.w, v1.w];
    let user_clip = if ctx.state.backend.clip_distance_mask != 0 {
        process_user_clip(ctx, pa, lane, &line.vertex_map, &recip_w)
    } else {
        alloc::vec::Vec::new()
    };
    let item = WorkItem {
        rasterizer: RasterizerFunc::Line,
        vertices: VertexData::Line([
            Vec4::new(v0.x, v1.x, 0.0, 0.0),
            Vec4::new(v0.y, v1.y, 0.0, 0.0),
            Vec4::new(v0.z, v1.z, 0.0, 0.0),
            Vec4::new(v0.w, v1.w, 0.0, 0.0),
        ]),
        attribs: process_attributes(ctx, pa, lane, prim_id, &line.vertex_map, false),
        num_attribs: ctx.state.backend.num_attributes,
        user_clip,
        flags: TriFlags {
            front_facing: true,
            y_major,
            viewport_index: viewport,
            render_target_array_index: rt,
            ..TriFlags::default()
        },
        prim_id,
    };
    enqueue(ctx, worker, item, bbox.macro_tiles());
    true
}

/// Bin the active lanes of a group of clip-space lines
pub fn bin_lines<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    worker: &mut WorkerContext<W>,
    prims: &[SimdVec4<W>],
    mask: u32,
    ids: &PrimIds<W>,
) {
    debug_assert!(prims.len() >= 2);
    let mut culled = 0;
    for lane in active_lanes(mask) {
        let indices = array_indices(ctx, pa, ids, lane);
        let line = ScreenLine {
            verts: [
                to_screen(ctx, prims[0].lane(lane), indices.0),
                to_screen(ctx, prims[1].lane(lane), indices.0),
            ],
            vertex_map: [0, 1],
        };
        if !bin_line_lane(ctx, pa, worker, lane, &line, ids.prim_id(lane), indices) {
            culled += 1;
        }
    }
    log::trace!("bin_lines: {} active, {} culled", mask.count_ones(), culled);
}
