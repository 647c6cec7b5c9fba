//! Index-list assembler for tessellator output

use alloc::vec::Vec;
use glam::Vec4;

use super::{PrimitiveAssembler, VertexStore};
use crate::simd::{Int, SimdVec4};
use crate::topology::{Topology, VertexRef};
use crate::vertex::SimdVertex;

/// Primitives read from an explicit index list over shaded domain points.
/// All primitives share the patch's primitive ID.
pub struct ListPa<'a, const W: usize> {
    topology: Topology,
    store: VertexStore<W>,
    indices: &'a [u32],
    num_prims: u32,
    group: u32,
    prim_id: u32,
    viewport_array: bool,
    rt_array: bool,
}

impl<'a, const W: usize> ListPa<'a, W> {
    /// `topology` is a point, line or triangle list
    pub fn new(topology: Topology, batches: Vec<SimdVertex<W>>, indices: &'a [u32], prim_id: u32) -> Self {
        let vpp = topology.verts_per_prim(false) as u32;
        Self {
            topology,
            store: VertexStore::from_batches(batches),
            indices,
            num_prims: indices.len() as u32 / vpp,
            group: 0,
            prim_id,
            viewport_array: false,
            rt_array: false,
        }
    }

    pub fn with_array_indices(mut self, viewport: bool, rt: bool) -> Self {
        self.viewport_array = viewport;
        self.rt_array = rt;
        self
    }

    pub fn into_batches(self) -> Vec<SimdVertex<W>> {
        self.store.into_batches()
    }

    fn prim_indices(&self, lane: usize) -> &[u32] {
        let vpp = self.verts_per_prim();
        let start = (self.group as usize * W + lane) * vpp;
        self.indices.get(start..start + vpp).unwrap_or(&[])
    }
}

impl<const W: usize> PrimitiveAssembler<W> for ListPa<'_, W> {
    fn bin_topology(&self) -> Topology {
        self.topology
    }

    fn verts_per_prim(&self) -> usize {
        self.topology.verts_per_prim(false)
    }

    fn has_work(&self) -> bool {
        self.group * (W as u32) < self.num_prims
    }

    fn assemble(&self, slot: usize, out: &mut [SimdVec4<W>]) -> bool {
        if !self.has_work() {
            return false;
        }
        let nverts = self.verts_per_prim().min(out.len());
        out[..nverts].fill(SimdVec4::zero());
        for lane in 0..self.num_prims() {
            for (k, &i) in self.prim_indices(lane).iter().take(nverts).enumerate() {
                out[k].set_lane(lane, self.store.fetch(VertexRef::Stream(i), slot));
            }
        }
        true
    }

    fn assemble_single(&self, slot: usize, prim: usize, out: &mut [Vec4]) {
        for (o, &i) in out.iter_mut().zip(self.prim_indices(prim)) {
            *o = self.store.fetch(VertexRef::Stream(i), slot);
        }
    }

    fn next_prim(&mut self) -> bool {
        if !self.has_work() {
            return false;
        }
        self.group += 1;
        self.has_work()
    }

    fn reset(&mut self) {
        self.group = 0;
    }

    fn num_prims(&self) -> usize {
        self.num_prims.saturating_sub(self.group * W as u32).min(W as u32) as usize
    }

    fn prim_ids(&self, start: u32) -> Int<W> {
        Int::splat(start.wrapping_add(self.prim_id) as i32)
    }

    fn prim_parity(&self, _prim: usize) -> u32 {
        0
    }

    fn viewport_array_active(&self) -> bool {
        self.viewport_array
    }

    fn rt_array_active(&self) -> bool {
        self.rt_array
    }
}
