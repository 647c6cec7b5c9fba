//! Clip stage
//!
//! Flow per group:
//! 1. Clip codes of every vertex against the frustum and the guard band
//! 2. NaN, user distance and trivial rejects
//! 3. Lanes inside the guard band go to the binner in runs, keeping lane order
//! 4. Lanes crossing near, far, the guard band or w = 0 are clipped one at a
//!    time and re-assembled as a fan (or a line) into the binner
//!
//! Clip codes are computed for the whole group at once. The polygon clip
//! itself runs per lane over scalar `Vec4`s, each lane with its own output
//! count.

mod clipper;

pub use clipper::{ClipPlane, ClipScratch, MAX_CLIPPED_VERTS};

use glam::Vec4;

use crate::attributes::provoking_source;
use crate::binner::{array_indices, bin_lines, bin_points, bin_triangles};
use crate::context::{DrawContext, GuardBand, PrimIds, WorkerContext};
use crate::pa::{OptimizedPa, PrimitiveAssembler};
use crate::simd::{Int, SimdVec4, active_lanes, lane_mask};
use crate::state::{DepthClip, DrawState, RasterState};
use crate::topology::{MAX_VERTS_PER_PRIM, PrimitiveKind, Topology};
use crate::vertex::{
    VERTEX_CLIPCULL_DIST_LO_SLOT, VERTEX_CLIPCULL_DIST_HI_SLOT, VERTEX_POSITION_SLOT, distance_location,
};

pub const CLIP_LEFT: u32 = 1 << 0;
pub const CLIP_RIGHT: u32 = 1 << 1;
/// y < -w
pub const CLIP_TOP: u32 = 1 << 2;
/// y > w
pub const CLIP_BOTTOM: u32 = 1 << 3;
pub const CLIP_NEAR: u32 = 1 << 4;
pub const CLIP_FAR: u32 = 1 << 5;
/// w <= 0
pub const CLIP_NEGW: u32 = 1 << 6;
pub const CLIP_GB_LEFT: u32 = 1 << 7;
pub const CLIP_GB_RIGHT: u32 = 1 << 8;
pub const CLIP_GB_TOP: u32 = 1 << 9;
pub const CLIP_GB_BOTTOM: u32 = 1 << 10;

pub const FRUSTUM_CLIP_MASK: u32 = CLIP_LEFT | CLIP_RIGHT | CLIP_TOP | CLIP_BOTTOM | CLIP_NEAR | CLIP_FAR;
pub const GUARDBAND_CLIP_MASK: u32 = CLIP_GB_LEFT | CLIP_GB_RIGHT | CLIP_GB_TOP | CLIP_GB_BOTTOM;
/// Codes that send a primitive through the clipper
pub const CLIP_NEEDED_MASK: u32 = CLIP_NEAR | CLIP_FAR | CLIP_NEGW | GUARDBAND_CLIP_MASK;

/// Clip code of one clip-space position. Near and far are only tested with
/// depth clipping enabled.
pub fn clip_code(p: Vec4, gb: GuardBand, raster: &RasterState) -> u32 {
    let mut code = 0;
    if p.x < -p.w {
        code |= CLIP_LEFT;
    }
    if p.x > p.w {
        code |= CLIP_RIGHT;
    }
    if p.y < -p.w {
        code |= CLIP_TOP;
    }
    if p.y > p.w {
        code |= CLIP_BOTTOM;
    }
    if raster.depth_clip_enable {
        let near = match raster.depth_clip {
            DepthClip::ZeroToOne => p.z < 0.0,
            DepthClip::MinusOneToOne => p.z < -p.w,
        };
        if near {
            code |= CLIP_NEAR;
        }
        if p.z > p.w {
            code |= CLIP_FAR;
        }
    }
    if p.w <= 0.0 {
        code |= CLIP_NEGW;
    }
    if p.x < -gb.x * p.w {
        code |= CLIP_GB_LEFT;
    }
    if p.x > gb.x * p.w {
        code |= CLIP_GB_RIGHT;
    }
    if p.y < -gb.y * p.w {
        code |= CLIP_GB_TOP;
    }
    if p.y > gb.y * p.w {
        code |= CLIP_GB_BOTTOM;
    }
    code
}

/// Clip codes of one assembled vertex, per lane, against each lane's viewport
pub fn compute_clip_codes<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    ids: &PrimIds<W>,
    vertex: &SimdVec4<W>,
) -> Int<W> {
    Int::from_fn(|lane| {
        let (viewport, _) = array_indices(ctx, pa, ids, lane);
        clip_code(vertex.lane(lane), ctx.guard_band(viewport), &ctx.state.raster) as i32
    })
}

/// Signature shared by the clip and bin entry points
type PrimFn<const W: usize> =
    fn(&DrawContext, &dyn PrimitiveAssembler<W>, &mut WorkerContext<W>, &[SimdVec4<W>], u32, &PrimIds<W>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Reject,
    Bin,
    Clip,
}

const fn verts_for(kind: PrimitiveKind) -> usize {
    match kind {
        PrimitiveKind::Point => 1,
        PrimitiveKind::Line => 2,
        _ => 3,
    }
}

/// True if an enabled cull distance is negative on every vertex, or an
/// enabled clip distance is NaN on any vertex or negative on every vertex
fn distances_reject<const W: usize>(ctx: &DrawContext, pa: &dyn PrimitiveAssembler<W>, lane: usize, nverts: usize) -> bool {
    let backend = &ctx.state.backend;
    if backend.clip_distance_mask | backend.cull_distance_mask == 0 {
        return false;
    }
    let assembled = pa.verts_per_prim().min(MAX_VERTS_PER_PRIM);
    let mut lo = [Vec4::ZERO; MAX_VERTS_PER_PRIM];
    let mut hi = [Vec4::ZERO; MAX_VERTS_PER_PRIM];
    pa.assemble_single(VERTEX_CLIPCULL_DIST_LO_SLOT, lane, &mut lo[..assembled]);
    pa.assemble_single(VERTEX_CLIPCULL_DIST_HI_SLOT, lane, &mut hi[..assembled]);
    let distance = |index: u32, v: usize| {
        let (slot, comp) = distance_location(index);
        if slot == VERTEX_CLIPCULL_DIST_LO_SLOT { lo[v][comp] } else { hi[v][comp] }
    };

    for index in 0..8 {
        let bit = 1u8 << index;
        if backend.cull_distance_mask & bit != 0 && (0..nverts).all(|v| !(distance(index, v) >= 0.0)) {
            return true;
        }
        if backend.clip_distance_mask & bit != 0 {
            let nan = (0..nverts).any(|v| distance(index, v).is_nan());
            if nan || (0..nverts).all(|v| distance(index, v) < 0.0) {
                return true;
            }
        }
    }
    false
}

fn classify<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    prims: &[SimdVec4<W>],
    codes: &[Int<W>],
    lane: usize,
    kind: PrimitiveKind,
) -> Disposition {
    let nverts = verts_for(kind);
    if prims[..nverts].iter().any(|p| p.lane(lane).is_nan()) {
        return Disposition::Reject;
    }
    if distances_reject(ctx, pa, lane, nverts) {
        return Disposition::Reject;
    }

    let (and, or) = codes[..nverts].iter().fold((u32::MAX, 0), |(and, or), c| {
        let code = c.lane(lane) as u32;
        (and & code, or | code)
    });
    if and & FRUSTUM_CLIP_MASK != 0 {
        return Disposition::Reject;
    }
    match kind {
        PrimitiveKind::Point if or & CLIP_NEGW != 0 => Disposition::Reject,
        PrimitiveKind::Point => Disposition::Bin,
        _ if or & CLIP_NEEDED_MASK != 0 => Disposition::Clip,
        _ => Disposition::Bin,
    }
}

/// Send the pending run of unclipped lanes to the binner
fn flush_run<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    worker: &mut WorkerContext<W>,
    prims: &[SimdVec4<W>],
    run: &mut u32,
    ids: &PrimIds<W>,
    bin: PrimFn<W>,
) {
    if *run != 0 {
        worker.stats.clipper_primitives += run.count_ones() as u64;
        bin(ctx, pa, worker, prims, *run, ids);
        *run = 0;
    }
}

/// Bitmask of vertex slots holding flat-shaded attributes
fn flat_slots(ctx: &DrawContext) -> u64 {
    let backend = &ctx.state.backend;
    (0..backend.num_attributes as usize)
        .filter(|i| backend.constant_interpolation_mask & (1 << i) != 0)
        .fold(0, |mask, i| mask | 1 << backend.input_slot(i))
}

/// Clip the primitive in `lane` and bin what is left. Returns the number of
/// primitives passed on.
fn clip_lane<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    worker: &mut WorkerContext<W>,
    lane: usize,
    ids: &PrimIds<W>,
    kind: PrimitiveKind,
    bin: PrimFn<W>,
) -> usize {
    let slots = &ctx.derived.clip_slots;
    let pos = ctx.derived.clip_position;
    let raster = &ctx.state.raster;
    let (viewport, _) = array_indices(ctx, pa, ids, lane);
    let nverts = verts_for(kind);
    let assembled = pa.verts_per_prim().min(MAX_VERTS_PER_PRIM);
    let flat = flat_slots(ctx);
    let (pv_lane, pv_vertex) = provoking_source(pa, lane, ctx.state.frontend.provoking_vertex);

    let scratch = &mut worker.clip;
    scratch.begin(slots.len());
    for _ in 0..nverts {
        scratch.push_vertex();
    }
    let mut verts = [Vec4::ZERO; MAX_VERTS_PER_PRIM];
    for (i, &slot) in slots.iter().enumerate() {
        if flat & (1 << slot) != 0 {
            // flat attributes keep the provoking value on every clipped vertex
            pa.assemble_single(slot, pv_lane, &mut verts[..assembled]);
            for k in 0..nverts {
                scratch.vertex_mut(k)[i] = verts[pv_vertex];
            }
        } else {
            pa.assemble_single(slot, lane, &mut verts[..assembled]);
            for k in 0..nverts {
                scratch.vertex_mut(k)[i] = verts[k];
            }
        }
    }

    let planes: &[ClipPlane] = if raster.depth_clip_enable {
        &ClipPlane::ALL
    } else {
        &ClipPlane::XY
    };
    let gb = ctx.guard_band(viewport);
    let n = match kind {
        PrimitiveKind::Line => scratch.clip_segment(planes, pos, gb, raster.depth_clip),
        _ => scratch.clip_polygon(planes, pos, gb, raster.depth_clip),
    };
    if n < nverts || scratch.vertices().any(|v| !(v[pos].w > 0.0)) {
        return 0;
    }

    let mut batches = worker.take_batches(n.div_ceil(W));
    for (v, vertex) in worker.clip.vertices().enumerate() {
        for (i, &slot) in slots.iter().enumerate() {
            batches[v / W][slot].set_lane(v % W, vertex[i]);
        }
    }

    let topology = match kind {
        PrimitiveKind::Line => Topology::LineList,
        _ => Topology::TriangleFan,
    };
    let mut clipped = OptimizedPa::from_stream(topology, batches, n as u32)
        .with_array_indices(pa.viewport_array_active(), pa.rt_array_active());
    let ids = ids.broadcast(lane);
    let mut prims = [SimdVec4::<W>::zero(); 3];
    let prims = &mut prims[..nverts];
    let mut emitted = 0;
    while clipped.has_work() && clipped.assemble(VERTEX_POSITION_SLOT, prims) {
        let count = clipped.num_prims();
        emitted += count;
        bin(ctx, &clipped, worker, prims, lane_mask(count), &ids);
        if !clipped.next_prim() {
            break;
        }
    }
    worker.return_batches(clipped.into_batches());
    emitted
}

fn clip_group<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    worker: &mut WorkerContext<W>,
    prims: &[SimdVec4<W>],
    mask: u32,
    ids: &PrimIds<W>,
    kind: PrimitiveKind,
    bin: PrimFn<W>,
) {
    let nverts = verts_for(kind);
    debug_assert!(prims.len() >= nverts);
    worker.stats.clipper_invocations += mask.count_ones() as u64;

    let mut codes = [Int::<W>::zero(); 3];
    for (code, vertex) in codes[..nverts].iter_mut().zip(prims) {
        *code = compute_clip_codes(ctx, pa, ids, vertex);
    }

    let mut run = 0u32;
    let (mut rejected, mut clipped) = (0, 0);
    for lane in active_lanes(mask) {
        match classify(ctx, pa, prims, &codes[..nverts], lane, kind) {
            Disposition::Reject => rejected += 1,
            Disposition::Bin => run |= 1 << lane,
            Disposition::Clip => {
                flush_run(ctx, pa, worker, prims, &mut run, ids, bin);
                let emitted = clip_lane(ctx, pa, worker, lane, ids, kind, bin);
                worker.stats.clipper_primitives += emitted as u64;
                clipped += 1;
            }
        }
    }
    flush_run(ctx, pa, worker, prims, &mut run, ids, bin);
    log::trace!(
        "clip {:?}: {} active, {} rejected, {} clipped",
        kind,
        mask.count_ones(),
        rejected,
        clipped
    );
}

/// Clip a group of points: NEGW and trivially rejected points are dropped
pub fn clip_points<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    worker: &mut WorkerContext<W>,
    prims: &[SimdVec4<W>],
    mask: u32,
    ids: &PrimIds<W>,
) {
    clip_group(ctx, pa, worker, prims, mask, ids, PrimitiveKind::Point, bin_points::<W>);
}

pub fn clip_lines<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    worker: &mut WorkerContext<W>,
    prims: &[SimdVec4<W>],
    mask: u32,
    ids: &PrimIds<W>,
) {
    clip_group(ctx, pa, worker, prims, mask, ids, PrimitiveKind::Line, bin_lines::<W>);
}

pub fn clip_triangles<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    worker: &mut WorkerContext<W>,
    prims: &[SimdVec4<W>],
    mask: u32,
    ids: &PrimIds<W>,
) {
    clip_group(ctx, pa, worker, prims, mask, ids, PrimitiveKind::Triangle, bin_triangles::<W>);
}

/// Clip or bin entry point chosen once per draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimProcessor {
    ClipPoints,
    ClipLines,
    ClipTriangles,
    BinPoints,
    BinLines,
    BinTriangles,
}

impl PrimProcessor {
    /// Processor for primitives of `kind`. Clipping is skipped when disabled
    /// or when positions are already in screen space. Patches have none.
    pub fn select(state: &DrawState, kind: PrimitiveKind) -> Option<Self> {
        let clip = state.raster.clip_enable && !state.frontend.viewport_transform_disable;
        let processor = match (kind, clip) {
            (PrimitiveKind::Point, true) => PrimProcessor::ClipPoints,
            (PrimitiveKind::Line, true) => PrimProcessor::ClipLines,
            (PrimitiveKind::Triangle, true) => PrimProcessor::ClipTriangles,
            (PrimitiveKind::Point, false) => PrimProcessor::BinPoints,
            (PrimitiveKind::Line, false) => PrimProcessor::BinLines,
            (PrimitiveKind::Triangle, false) => PrimProcessor::BinTriangles,
            (PrimitiveKind::Patch, _) => return None,
        };
        Some(processor)
    }

    #[inline]
    pub fn run<const W: usize>(
        self,
        ctx: &DrawContext,
        pa: &dyn PrimitiveAssembler<W>,
        worker: &mut WorkerContext<W>,
        prims: &[SimdVec4<W>],
        mask: u32,
        ids: &PrimIds<W>,
    ) {
        let f: PrimFn<W> = match self {
            PrimProcessor::ClipPoints => clip_points::<W>,
            PrimProcessor::ClipLines => clip_lines::<W>,
            PrimProcessor::ClipTriangles => clip_triangles::<W>,
            PrimProcessor::BinPoints => bin_points::<W>,
            PrimProcessor::BinLines => bin_lines::<W>,
            PrimProcessor::BinTriangles => bin_triangles::<W>,
        };
        f(ctx, pa, worker, prims, mask, ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pa::OptimizedPa;
    use crate::state::{BackendState, Viewport};
    use crate::testing::{TestTarget, run_processor, stream_batches, stream_pa};
    use crate::work::{RasterizerFunc, VertexData};

    // clip space for a 256x256 viewport: pixel p maps to p / 128 - 1
    fn clip(px: f32, py: f32) -> Vec4 {
        Vec4::new(px / 128.0 - 1.0, py / 128.0 - 1.0, 0.5, 1.0)
    }

    const GB: GuardBand = GuardBand { x: 128.0, y: 128.0 };

    #[test]
    fn test_clip_codes() {
        let raster = RasterState::default();
        assert_eq!(clip_code(Vec4::new(0.0, 0.0, 0.5, 1.0), GB, &raster), 0);
        assert_eq!(clip_code(Vec4::new(-2.0, 2.0, 0.5, 1.0), GB, &raster), CLIP_LEFT | CLIP_BOTTOM);
        assert_eq!(
            clip_code(Vec4::new(0.0, 0.0, -0.5, 1.0), GB, &raster),
            CLIP_NEAR
        );
        assert_eq!(
            clip_code(Vec4::new(200.0, 0.0, 0.5, 1.0), GB, &raster),
            CLIP_RIGHT | CLIP_GB_RIGHT
        );
        assert_ne!(clip_code(Vec4::new(0.0, 0.0, 0.0, 0.0), GB, &raster) & CLIP_NEGW, 0);

        let no_depth = RasterState {
            depth_clip_enable: false,
            ..RasterState::default()
        };
        assert_eq!(clip_code(Vec4::new(0.0, 0.0, 2.0, 1.0), GB, &no_depth), 0);
        let gl = RasterState {
            depth_clip: DepthClip::MinusOneToOne,
            ..RasterState::default()
        };
        assert_eq!(clip_code(Vec4::new(0.0, 0.0, -0.5, 1.0), GB, &gl), 0);
    }

    #[test]
    fn test_group_codes_follow_each_lane_viewport() {
        let target = TestTarget::new();
        // guard band of 128 w for the first viewport, 2 w for the second
        let state = target.state(Topology::TriangleList).with_viewports(vec![
            Viewport::new(0.0, 0.0, 256.0, 256.0),
            Viewport::new(0.0, 0.0, 16384.0, 16384.0),
        ]);
        let ctx = target.context(&state);
        let tri = [
            Vec4::new(3.0, 0.0, 0.5, 1.0),
            Vec4::new(0.0, 0.0, 0.5, 1.0),
            Vec4::new(0.0, 1.0, 0.5, 1.0),
        ];
        let verts: Vec<Vec4> = tri.iter().chain(&tri).copied().collect();
        let pa = stream_pa(Topology::TriangleList, &verts).with_array_indices(true, false);
        let mut prims = vec![SimdVec4::<8>::zero(); 3];
        assert!(pa.assemble(VERTEX_POSITION_SLOT, &mut prims));
        let mut ids = PrimIds::new(Int::from_fn(|lane| lane as i32));
        ids.viewport = Int::from_fn(|lane| lane as i32);

        let codes = compute_clip_codes(&ctx, &pa, &ids, &prims[0]);
        assert_eq!(codes.lane(0) as u32, CLIP_RIGHT);
        assert_eq!(codes.lane(1) as u32, CLIP_RIGHT | CLIP_GB_RIGHT);

        // lane 0 bins as is, lane 1 is cut to a quad at x = 2w
        let mut worker = WorkerContext::<8>::new();
        PrimProcessor::ClipTriangles.run(&ctx, &pa, &mut worker, &prims, 0b11, &ids);
        assert_eq!(worker.stats.clipper_invocations, 2);
        assert_eq!(worker.stats.clipper_primitives, 3);
    }

    #[test]
    fn test_inside_triangle_reaches_binner_unmodified() {
        let tri = [clip(10.0, 10.0), clip(100.0, 10.0), clip(10.0, 100.0)];

        let clipped = TestTarget::new();
        let state = clipped.state(Topology::TriangleList);
        let ctx = clipped.context(&state);
        let mut worker = WorkerContext::<8>::new();
        run_processor(&ctx, &mut worker, PrimProcessor::ClipTriangles, &mut stream_pa(Topology::TriangleList, &tri));
        assert_eq!(worker.stats.clipper_invocations, 1);
        assert_eq!(worker.stats.clipper_primitives, 1);

        let binned = TestTarget::new();
        let ctx = binned.context(&state);
        let mut worker = WorkerContext::<8>::new();
        run_processor(&ctx, &mut worker, PrimProcessor::BinTriangles, &mut stream_pa(Topology::TriangleList, &tri));

        assert_eq!(clipped.items(), binned.items());
        assert_eq!(clipped.enqueues(), binned.enqueues());
    }

    #[test]
    fn test_outside_one_plane_is_discarded() {
        let target = TestTarget::new();
        let state = target.state(Topology::TriangleList);
        let ctx = target.context(&state);
        let mut worker = WorkerContext::<8>::new();
        let tri = [
            Vec4::new(2.0, 0.0, 0.5, 1.0),
            Vec4::new(3.0, 0.0, 0.5, 1.0),
            Vec4::new(2.0, 1.0, 0.5, 1.0),
        ];
        run_processor(&ctx, &mut worker, PrimProcessor::ClipTriangles, &mut stream_pa(Topology::TriangleList, &tri));
        assert!(target.items().is_empty());
        assert_eq!(worker.stats.clipper_invocations, 1);
        assert_eq!(worker.stats.clipper_primitives, 0);
    }

    #[test]
    fn test_zero_w_vertex_is_clipped_to_positive_w() {
        let target = TestTarget::new();
        let state = target.state(Topology::TriangleList);
        let ctx = target.context(&state);
        let mut worker = WorkerContext::<8>::new();
        let tri = [
            Vec4::new(0.0, 0.5, 0.5, 0.0),
            Vec4::new(-0.5, -0.5, 0.5, 1.0),
            Vec4::new(0.5, -0.5, 0.5, 1.0),
        ];
        run_processor(&ctx, &mut worker, PrimProcessor::ClipTriangles, &mut stream_pa(Topology::TriangleList, &tri));

        // the far plane cuts the w = 0 corner off, leaving a quad
        let items = target.items();
        assert_eq!(items.len(), 2);
        assert_eq!(worker.stats.clipper_primitives, 2);
        for item in &items {
            assert_eq!(item.prim_id, 0);
            let VertexData::Triangle(rows) = item.vertices else {
                panic!("expected triangle data");
            };
            assert!(rows[3].x > 0.0 && rows[3].y > 0.0 && rows[3].z > 0.0);
        }
    }

    #[test]
    fn test_nan_position_is_rejected() {
        let target = TestTarget::new();
        let state = target.state(Topology::TriangleList);
        let ctx = target.context(&state);
        let mut worker = WorkerContext::<8>::new();
        let verts = [
            Vec4::new(f32::NAN, 0.0, 0.5, 1.0),
            clip(100.0, 10.0),
            clip(10.0, 100.0),
            clip(10.0, 10.0),
            clip(100.0, 10.0),
            clip(10.0, 100.0),
        ];
        run_processor(&ctx, &mut worker, PrimProcessor::ClipTriangles, &mut stream_pa(Topology::TriangleList, &verts));
        let items = target.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].prim_id, 1);
    }

    #[test]
    fn test_user_distances() {
        let target = TestTarget::new();
        let state = target
            .state(Topology::TriangleList)
            .with_backend(BackendState::default().with_distances(0b01, 0b10));
        let ctx = target.context(&state);
        let mut worker = WorkerContext::<8>::new();

        let tri = [clip(10.0, 10.0), clip(100.0, 10.0), clip(10.0, 100.0)];
        let positions: Vec<Vec4> = tri.iter().cycle().take(9).copied().collect();
        let mut batches = stream_batches(&positions);
        // (clip distance 0, cull distance 1) per vertex
        let distances = [
            // culled: cull distance negative everywhere
            (1.0, -1.0),
            (1.0, -1.0),
            (1.0, -2.0),
            // kept: clip distance only partly negative
            (-1.0, 1.0),
            (1.0, 1.0),
            (1.0, 1.0),
            // rejected: NaN clip distance
            (f32::NAN, 1.0),
            (1.0, 1.0),
            (1.0, 1.0),
        ];
        for (v, (clip_d, cull_d)) in distances.iter().enumerate() {
            batches[v / 8][VERTEX_CLIPCULL_DIST_LO_SLOT].set_lane(v % 8, Vec4::new(*clip_d, *cull_d, 0.0, 0.0));
        }
        let mut pa = OptimizedPa::from_stream(Topology::TriangleList, batches, 9);
        run_processor(&ctx, &mut worker, PrimProcessor::ClipTriangles, &mut pa);

        let items = target.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].prim_id, 1);
        assert_eq!(items[0].user_clip.len(), 3);
    }

    #[test]
    fn test_clipped_lane_keeps_assembly_order() {
        let target = TestTarget::new();
        let state = target.state(Topology::TriangleList);
        let ctx = target.context(&state);
        let mut worker = WorkerContext::<8>::new();
        let inside = [clip(10.0, 10.0), clip(100.0, 10.0), clip(10.0, 100.0)];
        // v0 is behind the near plane
        let crossing = [
            Vec4::new(0.0, 0.5, -0.5, 1.0),
            Vec4::new(-0.5, -0.5, 0.5, 1.0),
            Vec4::new(0.5, -0.5, 0.5, 1.0),
        ];
        let verts: Vec<Vec4> = inside.iter().chain(&crossing).chain(&inside).copied().collect();
        run_processor(&ctx, &mut worker, PrimProcessor::ClipTriangles, &mut stream_pa(Topology::TriangleList, &verts));

        let ids: Vec<u32> = target.items().iter().map(|i| i.prim_id).collect();
        assert_eq!(ids, vec![0, 1, 1, 2]);
        assert_eq!(worker.stats.clipper_invocations, 3);
        assert_eq!(worker.stats.clipper_primitives, 4);
        let VertexData::Triangle(rows) = target.items()[1].vertices else {
            panic!("expected triangle data");
        };
        assert!(rows[2].x >= 0.0 && rows[2].y >= 0.0 && rows[2].z >= 0.0);
    }

    #[test]
    fn test_flat_attribute_survives_clipping() {
        let target = TestTarget::new();
        let state = target
            .state(Topology::TriangleList)
            .with_backend(BackendState::default().with_attributes(1, 0b1));
        let ctx = target.context(&state);
        let mut worker = WorkerContext::<8>::new();
        let crossing = [
            Vec4::new(0.0, 0.5, -0.5, 1.0),
            Vec4::new(-0.5, -0.5, 0.5, 1.0),
            Vec4::new(0.5, -0.5, 0.5, 1.0),
        ];
        run_processor(&ctx, &mut worker, PrimProcessor::ClipTriangles, &mut stream_pa(Topology::TriangleList, &crossing));

        // vertex 0 provokes: (0, 0, 0, 1) on every output vertex
        for item in target.items() {
            for v in 0..3 {
                assert_eq!(item.attrib(0, v), Vec4::new(0.0, 0.0, 0.0, 1.0));
            }
        }
    }

    #[test]
    fn test_depth_clip_disabled_passes_far_vertex() {
        let target = TestTarget::new();
        let state = target.state(Topology::TriangleList).with_raster(RasterState {
            depth_clip_enable: false,
            ..RasterState::default()
        });
        let ctx = target.context(&state);
        let mut worker = WorkerContext::<8>::new();
        let mut far = clip(100.0, 10.0);
        far.z = 3.0;
        let tri = [clip(10.0, 10.0), far, clip(10.0, 100.0)];
        run_processor(&ctx, &mut worker, PrimProcessor::ClipTriangles, &mut stream_pa(Topology::TriangleList, &tri));

        let items = target.items();
        assert_eq!(items.len(), 1);
        let VertexData::Triangle(rows) = items[0].vertices else {
            panic!("expected triangle data");
        };
        assert_eq!(rows[2].y, 3.0);
    }

    #[test]
    fn test_line_clipped_to_guard_band() {
        let target = TestTarget::new();
        let state = target.state(Topology::LineList);
        let ctx = target.context(&state);
        let mut worker = WorkerContext::<8>::new();
        let line = [Vec4::new(-0.5, 0.0, 0.5, 1.0), Vec4::new(200.0, 0.0, 0.5, 1.0)];
        run_processor(&ctx, &mut worker, PrimProcessor::ClipLines, &mut stream_pa(Topology::LineList, &line));

        let items = target.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].rasterizer, RasterizerFunc::Line);
        let VertexData::Line(rows) = items[0].vertices else {
            panic!("expected line data");
        };
        assert_eq!(rows[0].x, 64.0);
        // the right guard-band plane x = 128w lands at 128 * 128 + 128
        assert!((rows[0].y - 16512.0).abs() < 0.5);
    }

    #[test]
    fn test_points_reject_negative_w() {
        let target = TestTarget::new();
        let state = target.state(Topology::PointList);
        let ctx = target.context(&state);
        let mut worker = WorkerContext::<8>::new();
        let points = [
            Vec4::new(0.0, 0.0, 0.5, 0.0),
            Vec4::new(2.0, 0.0, 0.5, 1.0),
            clip(20.5, 20.5),
            Vec4::new(0.0, 0.0, 0.5, -1.0),
        ];
        run_processor(&ctx, &mut worker, PrimProcessor::ClipPoints, &mut stream_pa(Topology::PointList, &points));
        let items = target.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].prim_id, 2);
        assert_eq!(worker.stats.clipper_invocations, 4);
    }

    #[test]
    fn test_processor_selection() {
        let state = DrawState::new(Topology::TriangleList, 64, 64);
        assert_eq!(
            PrimProcessor::select(&state, PrimitiveKind::Triangle),
            Some(PrimProcessor::ClipTriangles)
        );
        assert_eq!(PrimProcessor::select(&state, PrimitiveKind::Patch), None);

        let unclipped = state.clone().with_raster(RasterState {
            clip_enable: false,
            ..RasterState::default()
        });
        assert_eq!(
            PrimProcessor::select(&unclipped, PrimitiveKind::Line),
            Some(PrimProcessor::BinLines)
        );

        let mut screen = state;
        screen.frontend.viewport_transform_disable = true;
        assert_eq!(
            PrimProcessor::select(&screen, PrimitiveKind::Point),
            Some(PrimProcessor::BinPoints)
        );
    }
}
