//! Assembler for streams with primitive restart
//!
//! Vertices are consumed lane by lane as their restart mask arrives. Each
//! run between restarts is a segment with its own topology state. Complete
//! primitives are queued and handed out in groups of `W`.
//!
//! A restart:
//! - drops the in-flight primitive
//! - emits the pending strip-with-adjacency primitive in its last/only form
//! - closes a line loop
//! - starts the next segment at the following vertex

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use glam::Vec4;

use super::{PrimitiveAssembler, VertexStore};
use crate::simd::{Int, SimdVec4};
use crate::topology::{PrimVerts, Topology, ready_index};
use crate::vertex::SimdVertex;

#[derive(Debug, Clone, Copy)]
struct QueuedPrim {
    verts: PrimVerts,
    prim_id: u32,
    parity: u32,
}

pub struct CutAwarePa<const W: usize> {
    topology: Topology,
    include_adjacency: bool,
    /// Vertices in the stream
    num_verts: u32,
    /// Vertices consumed so far
    processed: u32,
    store: VertexStore<W>,
    queue: VecDeque<QueuedPrim>,
    /// First stream vertex of the open segment
    seg_start: u32,
    seg_len: u32,
    /// Next assembled primitive of the segment to queue
    seg_next_prim: u32,
    /// Topology primitives completed before this segment
    seg_prim_base: u32,
    /// Every vertex consumed and the last segment flushed
    finished: bool,
    viewport_array: bool,
    rt_array: bool,
}

impl<const W: usize> CutAwarePa<W> {
    pub fn new(topology: Topology, num_verts: u32, include_adjacency: bool) -> Self {
        Self {
            topology,
            include_adjacency,
            num_verts,
            processed: 0,
            store: VertexStore::new(false),
            queue: VecDeque::new(),
            seg_start: 0,
            seg_len: 0,
            seg_next_prim: 0,
            seg_prim_base: 0,
            finished: num_verts == 0,
            viewport_array: false,
            rt_array: false,
        }
    }

    /// Assembler over shaded batches with one restart mask per batch
    pub fn from_stream(
        topology: Topology,
        batches: Vec<SimdVertex<W>>,
        num_verts: u32,
        cut_masks: &[u32],
    ) -> Self {
        let mut pa = Self::new(topology, num_verts, false);
        pa.store = VertexStore::from_batches(batches);
        for batch in 0..pa.store.loaded_batches() as usize {
            pa.consume_batch(batch as u32, cut_masks.get(batch).copied().unwrap_or(0));
        }
        pa
    }

    pub fn with_array_indices(mut self, viewport: bool, rt: bool) -> Self {
        self.viewport_array = viewport;
        self.rt_array = rt;
        self
    }

    pub fn into_batches(self) -> Vec<SimdVertex<W>> {
        self.store.into_batches()
    }

    pub fn next_vs_output(&mut self) -> &mut SimdVertex<W> {
        let min = self.retained_min();
        self.store.evict_before(min);
        self.store.push_batch()
    }

    /// Restart lanes of the batch just returned by `next_vs_output`
    pub fn set_cut_mask(&mut self, mask: u32) {
        let batch = self.store.loaded_batches().saturating_sub(1);
        self.consume_batch(batch, mask);
    }

    fn consume_batch(&mut self, batch: u32, mask: u32) {
        for lane in 0..W as u32 {
            let v = batch * W as u32 + lane;
            if v < self.processed || v >= self.num_verts {
                continue;
            }
            self.processed = v + 1;
            if mask & (1 << lane) != 0 {
                self.flush_segment();
                self.seg_start = v + 1;
            } else {
                self.seg_len += 1;
                self.queue_ready();
            }
        }
        if self.processed >= self.num_verts && !self.finished {
            self.flush_segment();
            self.finished = true;
        }
    }

    fn queue_prim(&mut self, e: u32, n: u32) {
        let per_prim = self.topology.emitted_per_prim();
        let verts = PrimVerts::new(self.topology, e, n, self.include_adjacency).offset(self.seg_start);
        self.queue.push_back(QueuedPrim {
            verts,
            prim_id: self.seg_prim_base + e / per_prim,
            parity: e & 1,
        });
    }

    /// Queue segment primitives whose vertices have all arrived
    fn queue_ready(&mut self) {
        let open_bound = match self.topology {
            // closing edge waits for the end of the segment
            Topology::LineLoop => self.seg_len.saturating_sub(1),
            t => t.emitted_prims(self.seg_len),
        };
        while self.seg_next_prim < open_bound
            && ready_index(self.topology, self.seg_next_prim, self.include_adjacency) < self.seg_len
        {
            self.queue_prim(self.seg_next_prim, u32::MAX);
            self.seg_next_prim += 1;
        }
    }

    fn flush_segment(&mut self) {
        let n = self.topology.num_prims(self.seg_len);
        let total = n * self.topology.emitted_per_prim();
        for e in self.seg_next_prim..total {
            self.queue_prim(e, n);
        }
        self.seg_prim_base += n;
        self.seg_len = 0;
        self.seg_next_prim = 0;
    }

    /// Lowest stream vertex any queued or future primitive reads
    fn retained_min(&self) -> u32 {
        let queued = self.queue.iter().map(|p| p.verts.min_index()).min();
        let future = if self.topology.uses_pivot() {
            self.seg_start
        } else {
            PrimVerts::new(self.topology, self.seg_next_prim, u32::MAX, self.include_adjacency)
                .offset(self.seg_start)
                .min_index()
        };
        queued.map_or(future, |q| q.min(future))
    }

    fn group_ready(&self) -> bool {
        self.queue.len() >= W || (self.finished && !self.queue.is_empty())
    }
}

impl<const W: usize> PrimitiveAssembler<W> for CutAwarePa<W> {
    fn bin_topology(&self) -> Topology {
        self.topology
    }

    fn verts_per_prim(&self) -> usize {
        self.topology.verts_per_prim(self.include_adjacency)
    }

    fn has_work(&self) -> bool {
        !self.finished || !self.queue.is_empty()
    }

    fn assemble(&self, slot: usize, out: &mut [SimdVec4<W>]) -> bool {
        if !self.group_ready() {
            return false;
        }
        let nverts = self.verts_per_prim().min(out.len());
        out[..nverts].fill(SimdVec4::zero());
        for (lane, prim) in self.queue.iter().take(W).enumerate() {
            for (k, r) in prim.verts.refs().iter().take(nverts).enumerate() {
                out[k].set_lane(lane, self.store.fetch(*r, slot));
            }
        }
        true
    }

    fn assemble_single(&self, slot: usize, prim: usize, out: &mut [Vec4]) {
        if let Some(p) = self.queue.get(prim) {
            for (o, r) in out.iter_mut().zip(p.verts.refs()) {
                *o = self.store.fetch(*r, slot);
            }
        }
    }

    fn next_prim(&mut self) -> bool {
        if !self.group_ready() {
            return false;
        }
        let count = self.queue.len().min(W);
        self.queue.drain(..count);
        self.group_ready()
    }

    fn reset(&mut self) {
        self.store.reset();
        self.queue.clear();
        self.processed = 0;
        self.seg_start = 0;
        self.seg_len = 0;
        self.seg_next_prim = 0;
        self.seg_prim_base = 0;
        self.finished = self.num_verts == 0;
    }

    fn num_prims(&self) -> usize {
        self.queue.len().min(W)
    }

    fn prim_ids(&self, start: u32) -> Int<W> {
        let mut ids = Int::zero();
        for (lane, prim) in self.queue.iter().take(W).enumerate() {
            ids.0[lane] = start.wrapping_add(prim.prim_id) as i32;
        }
        ids
    }

    fn prim_parity(&self, prim: usize) -> u32 {
        self.queue.get(prim).map_or(0, |p| p.parity)
    }

    fn viewport_array_active(&self) -> bool {
        self.viewport_array
    }

    fn rt_array_active(&self) -> bool {
        self.rt_array
    }
}
