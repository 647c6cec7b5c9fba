//! Assembler for non-indexed or restart-free streams
//!
//! Group `g` covers assembled primitives `[g*W, (g+1)*W)`. A group is ready
//! once every stream vertex it references has been shaded.

use alloc::vec::Vec;
use glam::Vec4;

use super::{PrimitiveAssembler, VertexStore};
use crate::simd::{Int, SimdVec4};
use crate::topology::{PrimVerts, Topology, VertexRef};
use crate::vertex::SimdVertex;

pub struct OptimizedPa<const W: usize> {
    topology: Topology,
    include_adjacency: bool,
    /// Topology primitives in the stream
    num_prims: u32,
    /// Assembled primitives in the stream
    emitted: u32,
    /// Current group
    group: u32,
    store: VertexStore<W>,
    viewport_array: bool,
    rt_array: bool,
}

impl<const W: usize> OptimizedPa<W> {
    /// Assembler fed batch by batch through `next_vs_output`
    pub fn new(topology: Topology, num_prims: u32, include_adjacency: bool) -> Self {
        Self {
            topology,
            include_adjacency,
            num_prims,
            emitted: num_prims * topology.emitted_per_prim(),
            group: 0,
            store: VertexStore::new(topology.uses_pivot()),
            viewport_array: false,
            rt_array: false,
        }
    }

    /// Assembler over `num_verts` vertices that are already shaded
    pub fn from_stream(topology: Topology, batches: Vec<SimdVertex<W>>, num_verts: u32) -> Self {
        let num_prims = topology.num_prims(num_verts);
        Self {
            topology,
            include_adjacency: false,
            num_prims,
            emitted: num_prims * topology.emitted_per_prim(),
            group: 0,
            store: VertexStore::from_batches(batches),
            viewport_array: false,
            rt_array: false,
        }
    }

    pub fn with_array_indices(mut self, viewport: bool, rt: bool) -> Self {
        self.viewport_array = viewport;
        self.rt_array = rt;
        self
    }

    /// Hand the batches back for reuse
    pub fn into_batches(self) -> Vec<SimdVertex<W>> {
        self.store.into_batches()
    }

    pub fn next_vs_output(&mut self) -> &mut SimdVertex<W> {
        if self.has_work() {
            let pivot = self.topology.uses_pivot();
            let min = (0..self.num_prims())
                .flat_map(|lane| {
                    let prim = self.prim(lane);
                    (0..prim.len()).map(move |k| prim.refs()[k])
                })
                .filter(|r| !(pivot && *r == VertexRef::Stream(0)))
                .map(VertexRef::min_index)
                .min();
            if let Some(min) = min {
                self.store.evict_before(min);
            }
        }
        self.store.push_batch()
    }

    #[inline]
    fn prim(&self, lane: usize) -> PrimVerts {
        PrimVerts::new(
            self.topology,
            self.group * W as u32 + lane as u32,
            self.num_prims,
            self.include_adjacency,
        )
    }

    fn ready(&self) -> bool {
        let count = self.num_prims();
        if count == 0 {
            return false;
        }
        let max = (0..count).map(|lane| self.prim(lane).max_index()).max();
        max.is_some_and(|m| m < self.store.loaded_verts())
    }
}

impl<const W: usize> PrimitiveAssembler<W> for OptimizedPa<W> {
    fn bin_topology(&self) -> Topology {
        self.topology
    }

    fn verts_per_prim(&self) -> usize {
        self.topology.verts_per_prim(self.include_adjacency)
    }

    fn has_work(&self) -> bool {
        self.group * (W as u32) < self.emitted
    }

    fn assemble(&self, slot: usize, out: &mut [SimdVec4<W>]) -> bool {
        if !self.ready() {
            return false;
        }
        let nverts = self.verts_per_prim().min(out.len());
        out[..nverts].fill(SimdVec4::zero());
        for lane in 0..self.num_prims() {
            let prim = self.prim(lane);
            for (k, r) in prim.refs().iter().take(nverts).enumerate() {
                out[k].set_lane(lane, self.store.fetch(*r, slot));
            }
        }
        true
    }

    fn assemble_single(&self, slot: usize, prim: usize, out: &mut [Vec4]) {
        let verts = self.prim(prim);
        for (o, r) in out.iter_mut().zip(verts.refs()) {
            *o = self.store.fetch(*r, slot);
        }
    }

    fn next_prim(&mut self) -> bool {
        if !self.ready() {
            return false;
        }
        self.group += 1;
        self.has_work() && self.ready()
    }

    fn reset(&mut self) {
        self.store.reset();
        self.group = 0;
    }

    fn num_prims(&self) -> usize {
        self.emitted.saturating_sub(self.group * W as u32).min(W as u32) as usize
    }

    fn prim_ids(&self, start: u32) -> Int<W> {
        let per_prim = self.topology.emitted_per_prim();
        let first = self.group * W as u32;
        Int::from_fn(|lane| start.wrapping_add((first + lane as u32) / per_prim) as i32)
    }

    fn prim_parity(&self, prim: usize) -> u32 {
        (self.group * W as u32 + prim as u32) & 1
    }

    fn viewport_array_active(&self) -> bool {
        self.viewport_array
    }

    fn rt_array_active(&self) -> bool {
        self.rt_array
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pa::DrawPa;
    use crate::testing::{collect_prims, shade_indexed};
    use crate::vertex::VERTEX_POSITION_SLOT;

    fn run(topology: Topology, num_verts: u32) -> Vec<Vec<u32>> {
        let num_prims = topology.num_prims(num_verts);
        let mut pa = DrawPa::Optimized(OptimizedPa::<8>::new(topology, num_prims, false));
        collect_prims(&mut pa, &[])
    }

    #[test]
    fn test_triangle_list_groups() {
        let prims = run(Topology::TriangleList, 30);
        assert_eq!(prims.len(), 10);
        assert_eq!(prims[0], [0, 1, 2]);
        assert_eq!(prims[9], [27, 28, 29]);
    }

    #[test]
    fn test_triangle_strip_alternates() {
        let prims = run(Topology::TriangleStrip, 12);
        assert_eq!(prims.len(), 10);
        assert_eq!(prims[0], [0, 1, 2]);
        assert_eq!(prims[1], [1, 3, 2]);
        assert_eq!(prims[8], [8, 9, 10]);
        assert_eq!(prims[9], [9, 11, 10]);
    }

    #[test]
    fn test_fan_pivot_survives_eviction() {
        let prims = run(Topology::TriangleFan, 40);
        assert_eq!(prims.len(), 38);
        assert!(prims.iter().all(|p| p[0] == 0));
        assert_eq!(prims[37], [0, 38, 39]);
    }

    #[test]
    fn test_line_loop_closes_on_first_vertex() {
        let prims = run(Topology::LineLoop, 10);
        assert_eq!(prims.len(), 10);
        assert_eq!(prims[8], [8, 9]);
        assert_eq!(prims[9], [9, 0]);
    }

    #[test]
    fn test_quads_split_and_share_ids() {
        let topology = Topology::QuadList;
        let mut pa = OptimizedPa::<8>::new(topology, 3, false);
        shade_indexed(pa.next_vs_output(), 0);
        shade_indexed(pa.next_vs_output(), 8);
        let mut verts = [SimdVec4::<8>::zero(); 3];
        assert!(pa.assemble(VERTEX_POSITION_SLOT, &mut verts));
        assert_eq!(pa.num_prims(), 6);
        let ids = pa.prim_ids(10);
        assert_eq!(&ids.0[..6], &[10, 10, 11, 11, 12, 12]);
        assert_eq!(verts[2].lane(3).x, 7.0);
        assert_eq!(pa.prim_parity(3), 1);
    }

    #[test]
    fn test_rect_list_implied_vertex() {
        let mut pa = OptimizedPa::<8>::new(Topology::RectList, 1, false);
        let batch = pa.next_vs_output();
        batch.position_mut().set_lane(0, Vec4::new(0.0, 0.0, 0.5, 1.0));
        batch.position_mut().set_lane(1, Vec4::new(4.0, 0.0, 0.5, 1.0));
        batch.position_mut().set_lane(2, Vec4::new(0.0, 3.0, 0.5, 1.0));

        let mut tri = [Vec4::ZERO; 3];
        pa.assemble_single(VERTEX_POSITION_SLOT, 1, &mut tri);
        assert_eq!(tri[0], Vec4::new(4.0, 0.0, 0.5, 1.0));
        assert_eq!(tri[1], Vec4::new(4.0, 3.0, 0.5, 1.0));
        assert_eq!(tri[2], Vec4::new(0.0, 3.0, 0.5, 1.0));
    }

    #[test]
    fn test_not_ready_until_shaded() {
        let mut pa = OptimizedPa::<8>::new(Topology::TriangleList, 4, false);
        shade_indexed(pa.next_vs_output(), 0);
        let mut verts = [SimdVec4::<8>::zero(); 3];
        assert!(!pa.assemble(VERTEX_POSITION_SLOT, &mut verts));
        assert!(!pa.next_prim());
        shade_indexed(pa.next_vs_output(), 8);
        assert!(pa.assemble(VERTEX_POSITION_SLOT, &mut verts));
        assert!(!pa.next_prim());
        assert!(!pa.has_work());
    }

    #[test]
    fn test_reset_replays() {
        let mut pa = DrawPa::Optimized(OptimizedPa::<8>::new(Topology::LineStrip, 5, false));
        let first = collect_prims(&mut pa, &[]);
        pa.reset();
        let second = collect_prims(&mut pa, &[]);
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }
}
