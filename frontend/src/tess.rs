//! Tessellation stage
//!
//! Flow per patch lane:
//! 1. The hull shader turns the control points into tessellation factors
//! 2. The tessellator produces domain points and an index list
//! 3. The domain shader shades the points in SIMD batches
//! 4. A list assembler feeds the geometry stage or the clip/bin processor

use alloc::vec;
use alloc::vec::Vec;
use glam::{Vec2, Vec4};

use crate::clip::PrimProcessor;
use crate::context::{DrawContext, PrimIds, WorkerContext};
use crate::draw::{Shaders, read_prim_ids};
use crate::error::StateError;
use crate::gs::GsStage;
use crate::pa::{ListPa, PrimitiveAssembler};
use crate::simd::{Float, Int, SimdVec4, active_lanes, lane_mask};
use crate::state::DrawState;
use crate::topology::Topology;
use crate::vertex::{MAX_VERTEX_SLOTS, SimdVertex, VERTEX_POSITION_SLOT, VertexSlots};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TessDomain {
    #[default]
    Triangle,
    Quad,
    Isoline,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TessFactors {
    pub outer: [f32; 4],
    pub inner: [f32; 2],
}

/// Tessellator result for one patch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TessOutput {
    /// Domain coordinates; the third triangle coordinate is `1 - u - v`
    pub points: Vec<Vec2>,
    /// Point indices, one primitive per `verts_per_prim` entries
    pub indices: Vec<u32>,
}

impl TessOutput {
    pub fn clear(&mut self) {
        self.points.clear();
        self.indices.clear();
    }
}

pub trait HullShader {
    fn execute(&self, control_points: &[VertexSlots], prim_id: u32) -> TessFactors;
}

pub trait Tessellator {
    /// Fill `out`, which arrives cleared
    fn tessellate(&self, domain: TessDomain, factors: &TessFactors, out: &mut TessOutput);
}

/// Inputs of one domain shader invocation
pub struct DsContext<'a, const W: usize> {
    pub domain: TessDomain,
    pub u: Float<W>,
    pub v: Float<W>,
    pub mask: u32,
    pub control_points: &'a [VertexSlots],
    pub prim_id: u32,
}

pub trait DomainShader<const W: usize> {
    fn execute(&self, ctx: &DsContext<W>, out: &mut SimdVertex<W>);
}

/// Bound tessellation shaders and the processor for the output topology
pub(crate) struct TessStage<'s, const W: usize> {
    hs: &'s dyn HullShader,
    tessellator: &'s dyn Tessellator,
    ds: &'s dyn DomainShader<W>,
    domain: TessDomain,
    output_topology: Topology,
    processor: PrimProcessor,
}

impl<'s, const W: usize> TessStage<'s, W> {
    pub(crate) fn new(state: &DrawState, shaders: &Shaders<'s, W>) -> Result<Self, StateError> {
        let hs = shaders.hs.ok_or(StateError::MissingShader("hull"))?;
        let tessellator = shaders.tessellator.ok_or(StateError::MissingShader("tessellator"))?;
        let ds = shaders.ds.ok_or(StateError::MissingShader("domain"))?;
        let topology = state.tess.output_topology;
        if !matches!(
            topology,
            Topology::PointList | Topology::LineList | Topology::TriangleList
        ) {
            return Err(StateError::InvalidOutputTopology(topology));
        }
        let processor =
            PrimProcessor::select(state, topology.kind()).ok_or(StateError::InvalidOutputTopology(topology))?;
        Ok(Self {
            hs,
            tessellator,
            ds,
            domain: state.tess.domain,
            output_topology: topology,
            processor,
        })
    }

    /// Tessellate every patch of the current group of `pa`
    pub(crate) fn process(
        &self,
        ctx: &DrawContext,
        worker: &mut WorkerContext<W>,
        pa: &dyn PrimitiveAssembler<W>,
        mask: u32,
        ids: &PrimIds<W>,
        gs: Option<&GsStage<'_, W>>,
    ) {
        let num_cp = pa.verts_per_prim();
        let mut control_points = vec![[Vec4::ZERO; MAX_VERTEX_SLOTS]; num_cp];
        let mut gathered = vec![Vec4::ZERO; num_cp];
        let mut out = core::mem::take(&mut worker.tess_output);
        let backend = &ctx.state.backend;

        for lane in active_lanes(mask) {
            for slot in 0..MAX_VERTEX_SLOTS {
                pa.assemble_single(slot, lane, &mut gathered);
                for (cp, v) in control_points.iter_mut().zip(&gathered) {
                    cp[slot] = *v;
                }
            }
            let prim_id = ids.prim_id(lane);
            let factors = self.hs.execute(&control_points, prim_id);
            worker.stats.hs_invocations += 1;

            out.clear();
            self.tessellator.tessellate(self.domain, &factors, &mut out);
            let n = out.points.len();
            if n == 0 || out.indices.is_empty() {
                continue;
            }
            if out.indices.iter().any(|&i| i as usize >= n) {
                log::trace!("tess: patch {} has indices past {} domain points", prim_id, n);
                continue;
            }

            let mut batches = worker.take_batches(n.div_ceil(W));
            for (batch, points) in batches.iter_mut().zip(out.points.chunks(W)) {
                let ds_ctx = DsContext {
                    domain: self.domain,
                    u: Float::from_fn(|l| points.get(l).map_or(0.0, |p| p.x)),
                    v: Float::from_fn(|l| points.get(l).map_or(0.0, |p| p.y)),
                    mask: lane_mask(points.len()),
                    control_points: &control_points,
                    prim_id,
                };
                self.ds.execute(&ds_ctx, batch);
            }
            worker.stats.ds_invocations += n as u64;

            let mut list = ListPa::new(self.output_topology, batches, &out.indices, prim_id)
                .with_array_indices(backend.read_viewport_index, backend.read_rt_index);
            let mut prims = vec![SimdVec4::<W>::zero(); list.verts_per_prim()];
            let prim_ids = Int::splat(prim_id as i32);
            while list.has_work() && list.assemble(VERTEX_POSITION_SLOT, &mut prims) {
                let count = list.num_prims();
                let list_ids = read_prim_ids(ctx, &list, prim_ids);
                match gs {
                    Some(gs) => gs.process(ctx, worker, &list, lane_mask(count), &list_ids),
                    None => self
                        .processor
                        .run(ctx, &list, worker, &prims, lane_mask(count), &list_ids),
                }
                if !list.next_prim() {
                    break;
                }
            }
            worker.return_batches(list.into_batches());
        }
        worker.tess_output = out;
    }
}
