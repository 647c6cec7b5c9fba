//! Binner: screen-space setup, culling and macrotile enqueue
//!
//! Flow per primitive lane:
//! 1. Perspective divide and viewport transform
//! 2. Fixed-point setup and culling
//! 3. Bounding box clamped to the scissor
//! 4. Work item built and enqueued into every covered macrotile

mod early_rast;
mod lines;
mod points;
mod setup;
mod triangles;

pub use early_rast::{covers_any_pixel, fits_er_tile};
pub use lines::bin_lines;
pub use points::bin_points;
pub use setup::{BBox, EdgeSetup, TileRange, between_pixel_centers, conservative_edge_mask, cull_by_mode, to_fixed};
pub use triangles::bin_triangles;

use glam::{Vec3, Vec4};

use crate::context::{DrawContext, PrimIds, WorkerContext};
use crate::pa::PrimitiveAssembler;
use crate::work::WorkItem;

/// Screen position of a clip-space vertex; `w` of the result is 1/w.
///
/// With the viewport transform disabled the position is already in screen
/// space and `w` already holds 1/w.
#[inline]
pub(crate) fn to_screen(ctx: &DrawContext, pos: Vec4, viewport: u32) -> Vec4 {
    let screen = if ctx.state.frontend.viewport_transform_disable {
        pos
    } else {
        let rw = 1.0 / pos.w;
        let ndc = Vec3::new(pos.x * rw, pos.y * rw, pos.z * rw);
        ctx.viewport_matrix(viewport).transform(ndc).extend(rw)
    };
    let offset = ctx.state.raster.pixel_location.offset();
    Vec4::new(screen.x + offset, screen.y + offset, screen.z, screen.w)
}

/// Viewport and render-target array index of `lane`, zero when the arrays
/// are inactive
#[inline]
pub(crate) fn array_indices<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    ids: &PrimIds<W>,
    lane: usize,
) -> (u32, u32) {
    let viewport = if pa.viewport_array_active() {
        let vp = ids.viewport(lane);
        if (vp as usize) < ctx.state.viewports.len() { vp } else { 0 }
    } else {
        0
    };
    let rt = if pa.rt_array_active() { ids.rt_index(lane) } else { 0 };
    (viewport, rt)
}

/// Store `item` in the arena and enqueue it once per tile of `tiles`
pub(crate) fn enqueue<const W: usize>(ctx: &DrawContext, worker: &mut WorkerContext<W>, item: WorkItem, tiles: TileRange) {
    let id = ctx.arena.alloc(item);
    for (x, y) in tiles.iter() {
        ctx.tiles.enqueue(x, y, id);
    }
    worker.stats.binned_primitives += 1;
}
