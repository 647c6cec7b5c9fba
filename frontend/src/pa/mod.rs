//! Primitive assembly
//!
//! Turns shaded vertex batches into SIMD groups of primitives.
//!
//! Flow:
//! 1. The draw loop asks for the next batch with `next_vs_output`
//! 2. The vertex shader fills it (the cut-aware assembler then takes the
//!    restart mask)
//! 3. `assemble` gathers one group per slot until `next_prim` reports that
//!    the following group still needs vertices

mod cut;
mod list;
mod opt;
mod store;

pub use cut::CutAwarePa;
pub use list::ListPa;
pub use opt::OptimizedPa;
pub use store::VertexStore;

use glam::Vec4;

use crate::simd::{Int, SimdVec4};
use crate::topology::Topology;
use crate::vertex::SimdVertex;

/// Common interface of the assemblers, consumed by the clip and bin stages
pub trait PrimitiveAssembler<const W: usize> {
    /// Topology the primitives were assembled from
    fn bin_topology(&self) -> Topology;

    /// Vertices per assembled primitive
    fn verts_per_prim(&self) -> usize;

    /// False once every primitive has been emitted
    fn has_work(&self) -> bool;

    /// Gather the current group's vertices of `slot`, one `SimdVec4` per
    /// primitive vertex. Returns false if the group is not shaded yet.
    fn assemble(&self, slot: usize, out: &mut [SimdVec4<W>]) -> bool;

    /// Vertices of the primitive in lane `prim` of the current group
    fn assemble_single(&self, slot: usize, prim: usize, out: &mut [Vec4]);

    /// Advance to the next group. Returns true if it can be assembled now.
    fn next_prim(&mut self) -> bool;

    /// Rewind for the next instance
    fn reset(&mut self);

    /// Primitives in the current group
    fn num_prims(&self) -> usize;

    /// Primitive IDs of the current group, offset by `start`
    fn prim_ids(&self, start: u32) -> Int<W>;

    /// Parity of the primitive in lane `prim` within its strip
    fn prim_parity(&self, prim: usize) -> u32;

    fn viewport_array_active(&self) -> bool;

    fn rt_array_active(&self) -> bool;
}

/// Assembler chosen per draw
pub enum DrawPa<const W: usize> {
    Optimized(OptimizedPa<W>),
    CutAware(CutAwarePa<W>),
}

impl<const W: usize> DrawPa<W> {
    /// Batch the vertex shader fills next
    pub fn next_vs_output(&mut self) -> &mut SimdVertex<W> {
        match self {
            DrawPa::Optimized(pa) => pa.next_vs_output(),
            DrawPa::CutAware(pa) => pa.next_vs_output(),
        }
    }

    /// Restart lanes of the batch just shaded; ignored without restart support
    pub fn set_cut_mask(&mut self, mask: u32) {
        if let DrawPa::CutAware(pa) = self {
            pa.set_cut_mask(mask);
        }
    }

    pub fn with_array_indices(self, viewport: bool, rt: bool) -> Self {
        match self {
            DrawPa::Optimized(pa) => DrawPa::Optimized(pa.with_array_indices(viewport, rt)),
            DrawPa::CutAware(pa) => DrawPa::CutAware(pa.with_array_indices(viewport, rt)),
        }
    }

    fn inner(&self) -> &dyn PrimitiveAssembler<W> {
        match self {
            DrawPa::Optimized(pa) => pa,
            DrawPa::CutAware(pa) => pa,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn PrimitiveAssembler<W> {
        match self {
            DrawPa::Optimized(pa) => pa,
            DrawPa::CutAware(pa) => pa,
        }
    }
}

impl<const W: usize> PrimitiveAssembler<W> for DrawPa<W> {
    fn bin_topology(&self) -> Topology {
        self.inner().bin_topology()
    }

    fn verts_per_prim(&self) -> usize {
        self.inner().verts_per_prim()
    }

    fn has_work(&self) -> bool {
        self.inner().has_work()
    }

    fn assemble(&self, slot: usize, out: &mut [SimdVec4<W>]) -> bool {
        self.inner().assemble(slot, out)
    }

    fn assemble_single(&self, slot: usize, prim: usize, out: &mut [Vec4]) {
        self.inner().assemble_single(slot, prim, out)
    }

    fn next_prim(&mut self) -> bool {
        self.inner_mut().next_prim()
    }

    fn reset(&mut self) {
        self.inner_mut().reset()
    }

    fn num_prims(&self) -> usize {
        self.inner().num_prims()
    }

    fn prim_ids(&self, start: u32) -> Int<W> {
        self.inner().prim_ids(start)
    }

    fn prim_parity(&self, prim: usize) -> u32 {
        self.inner().prim_parity(prim)
    }

    fn viewport_array_active(&self) -> bool {
        self.inner().viewport_array_active()
    }

    fn rt_array_active(&self) -> bool {
        self.inner().rt_array_active()
    }
}
