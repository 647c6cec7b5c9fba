//! Shared fixtures for the unit tests

use alloc::vec;
use alloc::vec::Vec;
use glam::Vec4;

use crate::arena::DrawArena;
use crate::clip::PrimProcessor;
use crate::context::{DrawContext, PrimIds, WorkerContext};
use crate::pa::{DrawPa, OptimizedPa, PrimitiveAssembler};
use crate::simd::{SimdVec4, lane_mask};
use crate::state::DrawState;
use crate::tiles::MacroTileBins;
use crate::topology::Topology;
use crate::vertex::{SimdVertex, VERTEX_ATTRIB_START_SLOT, VERTEX_POSITION_SLOT};
use crate::work::{WorkItem, WorkItemId};

/// Vertex `first + lane` at `(first + lane, 0, 0, 1)`
pub fn shade_indexed(batch: &mut SimdVertex<8>, first: u32) {
    for lane in 0..8 {
        let v = (first + lane as u32) as f32;
        batch.position_mut().set_lane(lane, Vec4::new(v, 0.0, 0.0, 1.0));
    }
}

/// `shade_indexed` plus two attributes: `(v, 10v, 100v, 1)` and its negation
/// with w = 0
pub fn shade_attributes(batch: &mut SimdVertex<8>, first: u32) {
    shade_indexed(batch, first);
    for lane in 0..8 {
        let v = (first + lane as u32) as f32;
        batch[VERTEX_ATTRIB_START_SLOT].set_lane(lane, Vec4::new(v, 10.0 * v, 100.0 * v, 1.0));
        batch[VERTEX_ATTRIB_START_SLOT + 1].set_lane(lane, Vec4::new(-v, -10.0 * v, -100.0 * v, 0.0));
    }
}

/// Run the draw loop over sequentially shaded vertices and collect the
/// stream index of every assembled vertex. `cuts` lists restart vertices.
pub fn collect_prims(pa: &mut DrawPa<8>, cuts: &[u32]) -> Vec<Vec<u32>> {
    let vpp = pa.verts_per_prim();
    let mut verts = vec![SimdVec4::<8>::zero(); vpp];
    let mut prims = Vec::new();
    let mut first = 0;
    while pa.has_work() {
        shade_indexed(pa.next_vs_output(), first);
        let mask = cuts
            .iter()
            .filter(|&&c| c >= first && c < first + 8)
            .fold(0, |m, &c| m | 1 << (c - first));
        pa.set_cut_mask(mask);
        first += 8;

        while pa.assemble(VERTEX_POSITION_SLOT, &mut verts) {
            for lane in 0..pa.num_prims() {
                prims.push((0..vpp).map(|k| verts[k].lane(lane).x as u32).collect());
            }
            if !pa.next_prim() {
                break;
            }
        }
    }
    prims
}

/// Shaded batches: clip-space positions plus attribute slot 2 set to
/// `(i, 10i, 100i, 1)` for vertex `i`
pub fn stream_batches(positions: &[Vec4]) -> Vec<SimdVertex<8>> {
    let mut batches = Vec::new();
    for (i, chunk) in positions.chunks(8).enumerate() {
        let mut batch = SimdVertex::<8>::new();
        for (lane, p) in chunk.iter().enumerate() {
            let v = (i * 8 + lane) as f32;
            batch.position_mut().set_lane(lane, *p);
            batch[VERTEX_ATTRIB_START_SLOT].set_lane(lane, Vec4::new(v, 10.0 * v, 100.0 * v, 1.0));
        }
        batches.push(batch);
    }
    batches
}

/// Optimized assembler over `stream_batches(positions)`
pub fn stream_pa(topology: Topology, positions: &[Vec4]) -> OptimizedPa<8> {
    OptimizedPa::from_stream(topology, stream_batches(positions), positions.len() as u32)
}

/// Feed every group of `pa` to `processor` with sequential primitive IDs
pub fn run_processor(
    ctx: &DrawContext,
    worker: &mut WorkerContext<8>,
    processor: PrimProcessor,
    pa: &mut dyn PrimitiveAssembler<8>,
) {
    let mut prims = vec![SimdVec4::<8>::zero(); pa.verts_per_prim()];
    while pa.has_work() && pa.assemble(VERTEX_POSITION_SLOT, &mut prims) {
        let ids = PrimIds::new(pa.prim_ids(0));
        processor.run(ctx, &*pa, worker, &prims, lane_mask(pa.num_prims()), &ids);
        if !pa.next_prim() {
            break;
        }
    }
}

/// Arena and tile bins of one render target
pub struct TestTarget {
    pub arena: DrawArena,
    pub bins: MacroTileBins,
    pub width: u32,
    pub height: u32,
}

impl TestTarget {
    /// 256x256 target, 4x4 macrotiles
    pub fn new() -> Self {
        Self::with_size(256, 256)
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            arena: DrawArena::new(),
            bins: MacroTileBins::new(width, height),
            width,
            height,
        }
    }

    /// Valid default state covering the target
    pub fn state(&self, topology: Topology) -> DrawState {
        DrawState::new(topology, self.width, self.height)
    }

    pub fn context<'a>(&'a self, state: &'a DrawState) -> DrawContext<'a> {
        DrawContext::new(state, &self.arena, &self.bins).expect("test state is valid")
    }

    /// Every work item in allocation order
    pub fn items(&self) -> Vec<WorkItem> {
        (0..self.arena.len() as u32)
            .filter_map(|i| self.arena.get(WorkItemId(i)))
            .collect()
    }

    /// Every `(tile_x, tile_y, id)` enqueue, tiles in row-major order
    pub fn enqueues(&self) -> Vec<(u32, u32, WorkItemId)> {
        let (w, h) = self.bins.dimensions();
        let mut out = Vec::new();
        for y in 0..h {
            for x in 0..w {
                out.extend(self.bins.bin(x, y).into_iter().map(|id| (x, y, id)));
            }
        }
        out
    }
}
