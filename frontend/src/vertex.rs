//! Shaded vertex batches
//!
//! A `SimdVertex<W>` is a structure-of-arrays batch: every slot holds one
//! 4-component vector per lane.
//!
//! Slot layout:
//! - 0: system values (render-target array index, viewport index, point size)
//! - 1: clip-space position
//! - 2..34: generic attributes
//! - 34, 35: clip/cull distances 0-3 and 4-7

use alloc::vec;
use alloc::vec::Vec;
use core::ops::{Index, IndexMut};

use glam::Vec4;

use crate::simd::SimdVec4;

/// System-value slot
pub const VERTEX_SGV_SLOT: usize = 0;
pub const VERTEX_SGV_RTAI_COMP: usize = 0;
pub const VERTEX_SGV_VAI_COMP: usize = 1;
pub const VERTEX_SGV_POINT_SIZE_COMP: usize = 2;

pub const VERTEX_POSITION_SLOT: usize = 1;
pub const VERTEX_ATTRIB_START_SLOT: usize = 2;

/// Generic attributes per vertex
pub const MAX_ATTRIBUTES: usize = 32;

pub const VERTEX_CLIPCULL_DIST_LO_SLOT: usize = VERTEX_ATTRIB_START_SLOT + MAX_ATTRIBUTES;
pub const VERTEX_CLIPCULL_DIST_HI_SLOT: usize = VERTEX_CLIPCULL_DIST_LO_SLOT + 1;

pub const MAX_VERTEX_SLOTS: usize = VERTEX_CLIPCULL_DIST_HI_SLOT + 1;

/// Slot and component holding clip/cull distance `index` (0..8)
#[inline]
pub const fn distance_location(index: u32) -> (usize, usize) {
    let slot = if index < 4 {
        VERTEX_CLIPCULL_DIST_LO_SLOT
    } else {
        VERTEX_CLIPCULL_DIST_HI_SLOT
    };
    (slot, (index & 3) as usize)
}

/// Every slot of a single vertex, outside a batch
pub type VertexSlots = [Vec4; MAX_VERTEX_SLOTS];

/// One batch of `W` shaded vertices
#[derive(Debug, Clone, PartialEq)]
pub struct SimdVertex<const W: usize> {
    slots: Vec<SimdVec4<W>>,
}

impl<const W: usize> Default for SimdVertex<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const W: usize> SimdVertex<W> {
    /// Zeroed batch with every slot allocated
    pub fn new() -> Self {
        Self {
            slots: vec![SimdVec4::zero(); MAX_VERTEX_SLOTS],
        }
    }

    /// Checked slot access
    #[inline]
    pub fn slot(&self, slot: usize) -> Option<&SimdVec4<W>> {
        self.slots.get(slot)
    }

    #[inline]
    pub fn slot_mut(&mut self, slot: usize) -> Option<&mut SimdVec4<W>> {
        self.slots.get_mut(slot)
    }

    #[inline]
    pub fn position(&self) -> &SimdVec4<W> {
        &self.slots[VERTEX_POSITION_SLOT]
    }

    #[inline]
    pub fn position_mut(&mut self) -> &mut SimdVec4<W> {
        &mut self.slots[VERTEX_POSITION_SLOT]
    }

    /// Every slot of `lane`
    pub fn lane(&self, lane: usize) -> VertexSlots {
        core::array::from_fn(|slot| self.slots[slot].lane(lane))
    }

    pub fn set_lane(&mut self, lane: usize, vertex: &VertexSlots) {
        for (slot, v) in self.slots.iter_mut().zip(vertex) {
            slot.set_lane(lane, *v);
        }
    }

    /// Zero every slot, keeping the allocation
    pub fn clear(&mut self) {
        self.slots.fill(SimdVec4::zero());
    }
}

impl<const W: usize> Index<usize> for SimdVertex<W> {
    type Output = SimdVec4<W>;

    #[inline]
    fn index(&self, slot: usize) -> &SimdVec4<W> {
        &self.slots[slot]
    }
}

impl<const W: usize> IndexMut<usize> for SimdVertex<W> {
    #[inline]
    fn index_mut(&mut self, slot: usize) -> &mut SimdVec4<W> {
        &mut self.slots[slot]
    }
}
