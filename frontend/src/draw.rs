//! Draw driver
//!
//! Flow per instance:
//! 1. Pick the assembler and clamp the vertex count to whole primitives
//! 2. Shade one batch of vertex IDs, passing restart lanes to the assembler
//! 3. Assemble every ready group and route it to tessellation, the geometry
//!    stage or the clip/bin processor

use crate::clip::PrimProcessor;
use crate::context::{DrawContext, PrimIds, WorkerContext};
use crate::error::StateError;
use crate::gs::{GeometryShader, GsStage};
use crate::pa::{CutAwarePa, DrawPa, OptimizedPa, PrimitiveAssembler};
use crate::simd::{Int, SimdVec4, lane_mask};
use crate::tess::{DomainShader, HullShader, TessStage, Tessellator};
use crate::topology::MAX_VERTS_PER_PRIM;
use crate::vertex::{SimdVertex, VERTEX_POSITION_SLOT, VERTEX_SGV_RTAI_COMP, VERTEX_SGV_SLOT, VERTEX_SGV_VAI_COMP};

/// One draw call's vertex range and instancing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawWork<'a> {
    pub num_verts: u32,
    /// First vertex, or first index when indexed
    pub start_vertex: u32,
    pub indices: Option<&'a [u32]>,
    /// Added to every fetched index
    pub base_vertex: i32,
    pub num_instances: u32,
    pub start_instance: u32,
    pub start_prim_id: u32,
}

impl<'a> DrawWork<'a> {
    /// One instance of `num_verts` sequential vertices
    pub fn new(num_verts: u32) -> Self {
        Self {
            num_verts,
            start_vertex: 0,
            indices: None,
            base_vertex: 0,
            num_instances: 1,
            start_instance: 0,
            start_prim_id: 0,
        }
    }

    /// One instance reading every index of `indices`
    pub fn indexed(indices: &'a [u32]) -> Self {
        Self {
            indices: Some(indices),
            ..Self::new(indices.len() as u32)
        }
    }

    pub fn with_instances(mut self, num_instances: u32, start_instance: u32) -> Self {
        self.num_instances = num_instances;
        self.start_instance = start_instance;
        self
    }

    pub fn with_start_vertex(mut self, start_vertex: u32) -> Self {
        self.start_vertex = start_vertex;
        self
    }

    pub fn with_base_vertex(mut self, base_vertex: i32) -> Self {
        self.base_vertex = base_vertex;
        self
    }

    pub fn with_start_prim_id(mut self, start_prim_id: u32) -> Self {
        self.start_prim_id = start_prim_id;
        self
    }

    /// Vertices the draw can fetch; an index list may be shorter than
    /// `num_verts`
    fn available_verts(&self) -> u32 {
        match self.indices {
            Some(indices) => self
                .num_verts
                .min((indices.len() as u32).saturating_sub(self.start_vertex)),
            None => self.num_verts,
        }
    }

    /// Raw index of stream vertex `v`
    #[inline]
    fn index(&self, v: u32) -> Option<u32> {
        let indices = self.indices?;
        indices.get(self.start_vertex.checked_add(v)? as usize).copied()
    }

    #[inline]
    fn vertex_id(&self, v: u32) -> i32 {
        match self.indices {
            Some(_) => (self.index(v).unwrap_or(0) as i32).wrapping_add(self.base_vertex),
            None => self.start_vertex.wrapping_add(v) as i32,
        }
    }
}

/// Inputs of one vertex shader invocation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VsContext<const W: usize> {
    pub vertex_ids: Int<W>,
    pub instance_id: u32,
    /// Lanes holding real vertices
    pub mask: u32,
}

pub trait VertexShader<const W: usize> {
    /// Fill `out` for the lanes of `ctx.mask`
    fn execute(&self, ctx: &VsContext<W>, out: &mut SimdVertex<W>);
}

impl<F, const W: usize> VertexShader<W> for F
where
    F: Fn(&VsContext<W>, &mut SimdVertex<W>),
{
    fn execute(&self, ctx: &VsContext<W>, out: &mut SimdVertex<W>) {
        self(ctx, out)
    }
}

/// Shader callbacks bound to a draw
#[derive(Clone, Copy)]
pub struct Shaders<'s, const W: usize> {
    pub vs: &'s dyn VertexShader<W>,
    pub gs: Option<&'s dyn GeometryShader<W>>,
    pub hs: Option<&'s dyn HullShader>,
    pub tessellator: Option<&'s dyn Tessellator>,
    pub ds: Option<&'s dyn DomainShader<W>>,
}

impl<'s, const W: usize> Shaders<'s, W> {
    pub fn new(vs: &'s dyn VertexShader<W>) -> Self {
        Self {
            vs,
            gs: None,
            hs: None,
            tessellator: None,
            ds: None,
        }
    }

    pub fn with_geometry(mut self, gs: &'s dyn GeometryShader<W>) -> Self {
        self.gs = Some(gs);
        self
    }

    pub fn with_tessellation(
        mut self,
        hs: &'s dyn HullShader,
        tessellator: &'s dyn Tessellator,
        ds: &'s dyn DomainShader<W>,
    ) -> Self {
        self.hs = Some(hs);
        self.tessellator = Some(tessellator);
        self.ds = Some(ds);
        self
    }
}

/// Primitive IDs plus the viewport and render-target indices written to the
/// system-value slot of each primitive's first vertex. Out-of-range
/// viewports fall back to viewport 0.
pub(crate) fn read_prim_ids<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    prim_id: Int<W>,
) -> PrimIds<W> {
    let mut ids = PrimIds::new(prim_id);
    let backend = &ctx.state.backend;
    if !(backend.read_viewport_index || backend.read_rt_index) {
        return ids;
    }
    let mut sgv = [SimdVec4::<W>::zero(); MAX_VERTS_PER_PRIM];
    let vpp = pa.verts_per_prim().min(MAX_VERTS_PER_PRIM);
    if !pa.assemble(VERTEX_SGV_SLOT, &mut sgv[..vpp]) {
        return ids;
    }
    // indices are stored as raw integer bits
    let component = |comp: usize| Int::<W>::from_fn(|lane| sgv[0].lane(lane)[comp].to_bits() as i32);

    if backend.read_viewport_index {
        let viewport = component(VERTEX_SGV_VAI_COMP);
        let num_viewports = Int::splat(ctx.state.viewports.len() as i32);
        let out_of_range = viewport.cmp_mask(&num_viewports, |vp, n| vp < 0 || vp >= n) & lane_mask(pa.num_prims());
        if out_of_range != 0 {
            log::warn!("viewport index out of range in lanes {:#x}, using viewport 0", out_of_range);
        }
        ids.viewport = viewport.select(Int::zero(), out_of_range);
    }
    if backend.read_rt_index {
        ids.rt_index = component(VERTEX_SGV_RTAI_COMP);
    }
    ids
}

/// Stages that assembled primitives flow into
pub(crate) struct Downstream<'s, const W: usize> {
    tess: Option<TessStage<'s, W>>,
    gs: Option<GsStage<'s, W>>,
    /// Set when neither shader stage is enabled
    processor: Option<PrimProcessor>,
}

impl<'s, const W: usize> Downstream<'s, W> {
    pub(crate) fn new(ctx: &DrawContext, shaders: &Shaders<'s, W>) -> Result<Self, StateError> {
        let state = ctx.state;
        let gs = if state.frontend.gs_enable {
            let shader = shaders.gs.ok_or(StateError::MissingShader("geometry"))?;
            Some(GsStage::new(state, shader)?)
        } else {
            None
        };
        let tess = if state.frontend.ts_enable {
            Some(TessStage::new(state, shaders)?)
        } else {
            None
        };
        let processor = if gs.is_none() && tess.is_none() {
            let kind = state.topology.kind();
            Some(PrimProcessor::select(state, kind).ok_or(StateError::PatchWithoutTessellation)?)
        } else {
            None
        };
        Ok(Self { tess, gs, processor })
    }

    fn dispatch(
        &self,
        ctx: &DrawContext,
        worker: &mut WorkerContext<W>,
        pa: &dyn PrimitiveAssembler<W>,
        prims: &[SimdVec4<W>],
        mask: u32,
        ids: &PrimIds<W>,
    ) {
        if let Some(tess) = &self.tess {
            tess.process(ctx, worker, pa, mask, ids, self.gs.as_ref());
        } else if let Some(gs) = &self.gs {
            gs.process(ctx, worker, pa, mask, ids);
        } else if let Some(processor) = self.processor {
            processor.run(ctx, pa, worker, prims, mask, ids);
        }
    }
}

/// Run one draw through assembly and every enabled stage down to the binner
pub fn process_draw<const W: usize>(
    ctx: &DrawContext,
    worker: &mut WorkerContext<W>,
    work: &DrawWork,
    shaders: &Shaders<W>,
) -> Result<(), StateError> {
    let state = ctx.state;
    let frontend = &state.frontend;
    let topology = state.topology;
    let downstream = Downstream::new(ctx, shaders)?;

    let include_adjacency = frontend.gs_enable && topology.is_adjacency();
    let restart = frontend.restart_enable && work.indices.is_some();
    let available = work.available_verts();
    let pa = if restart || include_adjacency {
        DrawPa::CutAware(CutAwarePa::new(topology, available, include_adjacency))
    } else {
        DrawPa::Optimized(OptimizedPa::new(topology, topology.num_prims(available), include_adjacency))
    };
    let mut pa = pa.with_array_indices(state.backend.read_viewport_index, state.backend.read_rt_index);
    let total_verts = match pa {
        // trailing vertices of a partial primitive are never shaded
        DrawPa::Optimized(_) => topology.num_verts(topology.num_prims(available)).min(available),
        DrawPa::CutAware(_) => available,
    };

    log::debug!(
        "draw: {:?}, {} vertices, {} instance(s)",
        topology,
        total_verts,
        work.num_instances
    );

    let mut prims = core::mem::take(&mut worker.prim_verts);
    prims.resize(pa.verts_per_prim().max(prims.len()), SimdVec4::zero());
    let vpp = pa.verts_per_prim();

    for instance in 0..work.num_instances {
        let instance_id = work.start_instance + instance;
        let mut shaded = 0u32;

        'instance: while pa.has_work() {
            if shaded < total_verts {
                let count = (total_verts - shaded).min(W as u32);
                let vs_ctx = VsContext {
                    vertex_ids: Int::from_fn(|lane| work.vertex_id(shaded + (lane as u32).min(count - 1))),
                    instance_id,
                    mask: lane_mask(count as usize),
                };
                shaders.vs.execute(&vs_ctx, pa.next_vs_output());
                if restart {
                    let cut_mask = (0..count)
                        .filter(|&lane| work.index(shaded + lane) == Some(frontend.restart_index))
                        .fold(0, |mask, lane| mask | 1 << lane);
                    pa.set_cut_mask(cut_mask);
                }
                shaded += count;
                worker.stats.ia_vertices += count as u64;
            }

            while pa.assemble(VERTEX_POSITION_SLOT, &mut prims[..vpp]) {
                let num_prims = pa.num_prims();
                let ids = read_prim_ids(ctx, &pa, pa.prim_ids(work.start_prim_id));
                worker.stats.ia_primitives += num_prims as u64;
                downstream.dispatch(ctx, worker, &pa, &prims[..vpp], lane_mask(num_prims), &ids);
                if !pa.next_prim() {
                    continue 'instance;
                }
            }
            if shaded >= total_verts {
                break;
            }
        }
        pa.reset();
    }

    worker.prim_verts = prims;
    log::debug!("draw done: {:?}", worker.stats);
    Ok(())
}
