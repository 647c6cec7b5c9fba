//! Resident vertex batches shared by the assemblers
//!
//! Stream vertex `v` lives in batch `v / W`, lane `v % W`. Batches are
//! appended as the vertex shader fills them and evicted once no pending
//! primitive can reference them. Fan and loop topologies keep a copy of
//! batch 0 for their pivot vertex.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use glam::Vec4;

use crate::simd::SimdVec4;
use crate::topology::VertexRef;
use crate::vertex::SimdVertex;

pub struct VertexStore<const W: usize> {
    batches: VecDeque<SimdVertex<W>>,
    /// Stream batch index of `batches[0]`
    first_batch: u32,
    /// Copy of batch 0 once it has been evicted
    pinned: Option<SimdVertex<W>>,
    pin_first: bool,
    spare: Vec<SimdVertex<W>>,
}

impl<const W: usize> VertexStore<W> {
    pub fn new(pin_first: bool) -> Self {
        Self {
            batches: VecDeque::new(),
            first_batch: 0,
            pinned: None,
            pin_first,
            spare: Vec::new(),
        }
    }

    /// Store over batches that are already shaded; never evicts
    pub fn from_batches(batches: Vec<SimdVertex<W>>) -> Self {
        Self {
            batches: batches.into(),
            first_batch: 0,
            pinned: None,
            pin_first: false,
            spare: Vec::new(),
        }
    }

    /// Append a batch for the vertex shader to fill
    pub fn push_batch(&mut self) -> &mut SimdVertex<W> {
        let batch = match self.spare.pop() {
            Some(mut b) => {
                b.clear();
                b
            }
            None => SimdVertex::new(),
        };
        self.batches.push_back(batch);
        let last = self.batches.len() - 1;
        &mut self.batches[last]
    }

    /// Most recently appended batch
    pub fn last_batch(&self) -> Option<&SimdVertex<W>> {
        self.batches.back()
    }

    /// Batches appended so far, evicted ones included
    #[inline]
    pub fn loaded_batches(&self) -> u32 {
        self.first_batch + self.batches.len() as u32
    }

    /// Stream vertices appended so far
    #[inline]
    pub fn loaded_verts(&self) -> u32 {
        self.loaded_batches() * W as u32
    }

    /// Drop batches that hold only vertices below `min_vertex`
    pub fn evict_before(&mut self, min_vertex: u32) {
        let keep_from = min_vertex / W as u32;
        while self.first_batch < keep_from {
            let Some(batch) = self.batches.pop_front() else {
                break;
            };
            if self.first_batch == 0 && self.pin_first {
                self.pinned = Some(batch);
            } else {
                self.spare.push(batch);
            }
            self.first_batch += 1;
        }
    }

    fn batch(&self, index: u32) -> Option<&SimdVertex<W>> {
        if index < self.first_batch {
            return if index == 0 { self.pinned.as_ref() } else { None };
        }
        self.batches.get((index - self.first_batch) as usize)
    }

    fn stream_vertex(&self, v: u32, slot: usize) -> Vec4 {
        let lane = v as usize % W;
        self.batch(v / W as u32)
            .and_then(|b| b.slot(slot))
            .map(|s| s.lane(lane))
            .unwrap_or(Vec4::ZERO)
    }

    /// One vertex of one slot
    pub fn fetch(&self, r: VertexRef, slot: usize) -> Vec4 {
        match r {
            VertexRef::Stream(v) => self.stream_vertex(v, slot),
            VertexRef::Implied(base) => {
                self.stream_vertex(base + 1, slot) + self.stream_vertex(base + 2, slot)
                    - self.stream_vertex(base, slot)
            }
        }
    }

    /// Gather one vertex per lane into `out`
    pub fn gather(&self, refs: impl Iterator<Item = VertexRef>, slot: usize, out: &mut SimdVec4<W>) {
        *out = SimdVec4::zero();
        for (lane, r) in refs.take(W).enumerate() {
            out.set_lane(lane, self.fetch(r, slot));
        }
    }

    /// Move every batch to the spare list
    pub fn reset(&mut self) {
        self.spare.extend(self.batches.drain(..));
        self.spare.extend(self.pinned.take());
        self.first_batch = 0;
    }

    /// All batches, resident and spare, for reuse elsewhere
    pub fn into_batches(mut self) -> Vec<SimdVertex<W>> {
        self.reset();
        self.spare
    }
}
