//! Per-draw and per-worker state

use alloc::vec::Vec;
use glam::Vec3;

use crate::arena::WorkArena;
use crate::binner::BBox;
use crate::clip::ClipScratch;
use crate::error::StateError;
use crate::simd::{Int, Lanes, SimdVec4, SupportedLanes};
use crate::state::{DepthClip, DrawState, GUARDBAND_EXTENT, Viewport};
use crate::tess::TessOutput;
use crate::tiles::{FIXED_POINT_SCALE, TILE_X_DIM, TILE_Y_DIM, TileManager};
use crate::topology::MAX_VERTS_PER_PRIM;
use crate::vertex::SimdVertex;

/// Clip-space to screen-space transform of one viewport (no y flip)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMatrix {
    pub m00: f32,
    pub m30: f32,
    pub m11: f32,
    pub m31: f32,
    pub m22: f32,
    pub m32: f32,
}

impl ViewportMatrix {
    pub fn new(vp: &Viewport, depth_clip: DepthClip) -> Self {
        let half_w = vp.width * 0.5;
        let half_h = vp.height * 0.5;
        let (m22, m32) = match depth_clip {
            DepthClip::ZeroToOne => (vp.max_z - vp.min_z, vp.min_z),
            DepthClip::MinusOneToOne => ((vp.max_z - vp.min_z) * 0.5, (vp.max_z + vp.min_z) * 0.5),
        };
        Self {
            m00: half_w,
            m30: vp.x + half_w,
            m11: half_h,
            m31: vp.y + half_h,
            m22,
            m32,
        }
    }

    /// NDC to screen space
    #[inline]
    pub fn transform(&self, ndc: Vec3) -> Vec3 {
        Vec3::new(
            ndc.x * self.m00 + self.m30,
            ndc.y * self.m11 + self.m31,
            ndc.z * self.m22 + self.m32,
        )
    }
}

/// Guard-band planes of one viewport as multiples of clip-space `w`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardBand {
    pub x: f32,
    pub y: f32,
}

impl GuardBand {
    pub fn new(vp: &Viewport) -> Self {
        Self {
            x: GUARDBAND_EXTENT / vp.width,
            y: GUARDBAND_EXTENT / vp.height,
        }
    }
}

/// State computed once per draw from `DrawState`
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedState {
    pub viewport_matrices: Vec<ViewportMatrix>,
    pub guard_bands: Vec<GuardBand>,
    /// Inclusive x.8 rect per viewport
    pub scissors_fixed: Vec<BBox>,
    /// Every effective scissor edge falls on a raster tile boundary
    pub scissors_tile_aligned: bool,
    /// Vertex slots carried through the clipper, ascending
    pub clip_slots: Vec<usize>,
    /// Index of the position within `clip_slots`
    pub clip_position: usize,
}

impl DerivedState {
    pub fn new(state: &DrawState) -> Self {
        let viewport_matrices = state
            .viewports
            .iter()
            .map(|vp| ViewportMatrix::new(vp, state.raster.depth_clip))
            .collect();
        let guard_bands = state.viewports.iter().map(GuardBand::new).collect();

        let rects: Vec<[i32; 4]> = (0..state.viewports.len())
            .map(|i| effective_scissor(state, i))
            .collect();
        let scissors_tile_aligned = rects.iter().all(|r| {
            r[0] % TILE_X_DIM as i32 == 0
                && r[2] % TILE_X_DIM as i32 == 0
                && r[1] % TILE_Y_DIM as i32 == 0
                && r[3] % TILE_Y_DIM as i32 == 0
        });
        let scissors_fixed = rects
            .iter()
            .map(|r| BBox {
                xmin: r[0] * FIXED_POINT_SCALE,
                ymin: r[1] * FIXED_POINT_SCALE,
                xmax: r[2] * FIXED_POINT_SCALE - 1,
                ymax: r[3] * FIXED_POINT_SCALE - 1,
            })
            .collect();

        let mut clip_slots = Vec::new();
        clip_slots.push(crate::vertex::VERTEX_POSITION_SLOT);
        clip_slots.push(crate::vertex::VERTEX_SGV_SLOT);
        for i in 0..state.backend.num_attributes as usize {
            clip_slots.push(state.backend.input_slot(i));
        }
        if state.backend.clip_distance_mask | state.backend.cull_distance_mask != 0 {
            clip_slots.push(crate::vertex::VERTEX_CLIPCULL_DIST_LO_SLOT);
            clip_slots.push(crate::vertex::VERTEX_CLIPCULL_DIST_HI_SLOT);
        }
        clip_slots.sort_unstable();
        clip_slots.dedup();
        let clip_position = clip_slots
            .binary_search(&crate::vertex::VERTEX_POSITION_SLOT)
            .unwrap_or_default();

        Self {
            viewport_matrices,
            guard_bands,
            scissors_fixed,
            scissors_tile_aligned,
            clip_slots,
            clip_position,
        }
    }
}

/// Pixel rect `[xmin, ymin, xmax, ymax)` a viewport may touch: its extent
/// clamped to the render target, then intersected with the scissor if enabled
fn effective_scissor(state: &DrawState, index: usize) -> [i32; 4] {
    let vp = &state.viewports[index];
    let (w, h) = (state.rt_width as i32, state.rt_height as i32);
    let mut rect = [
        (libm::floorf(vp.x) as i32).clamp(0, w),
        (libm::floorf(vp.y) as i32).clamp(0, h),
        (libm::ceilf(vp.x + vp.width) as i32).clamp(0, w),
        (libm::ceilf(vp.y + vp.height) as i32).clamp(0, h),
    ];
    if state.raster.scissor_enable {
        if let Some(s) = state.scissors.get(index) {
            rect[0] = rect[0].max(s.xmin);
            rect[1] = rect[1].max(s.ymin);
            rect[2] = rect[2].min(s.xmax);
            rect[3] = rect[3].min(s.ymax);
        }
    }
    rect
}

/// Everything the clip and bin stages read during one draw
pub struct DrawContext<'a> {
    pub state: &'a DrawState,
    pub derived: DerivedState,
    pub arena: &'a (dyn WorkArena + Sync),
    pub tiles: &'a (dyn TileManager + Sync),
}

impl<'a> DrawContext<'a> {
    /// Validate `state` and derive the per-draw tables
    pub fn new(
        state: &'a DrawState,
        arena: &'a (dyn WorkArena + Sync),
        tiles: &'a (dyn TileManager + Sync),
    ) -> Result<Self, StateError> {
        state.validate()?;
        log::debug!(
            "draw context: {:?}, {} viewport(s), {}x{}",
            state.topology,
            state.viewports.len(),
            state.rt_width,
            state.rt_height
        );
        Ok(Self {
            state,
            derived: DerivedState::new(state),
            arena,
            tiles,
        })
    }

    #[inline]
    pub fn viewport_matrix(&self, index: u32) -> &ViewportMatrix {
        &self.derived.viewport_matrices[index as usize]
    }

    #[inline]
    pub fn guard_band(&self, index: u32) -> GuardBand {
        self.derived.guard_bands[index as usize]
    }

    #[inline]
    pub fn scissor(&self, index: u32) -> BBox {
        self.derived.scissors_fixed[index as usize]
    }
}

/// Front-end pipeline statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontendStats {
    pub ia_vertices: u64,
    pub ia_primitives: u64,
    pub gs_invocations: u64,
    pub gs_primitives: u64,
    pub hs_invocations: u64,
    pub ds_invocations: u64,
    /// Primitives entering the clip stage
    pub clipper_invocations: u64,
    /// Primitives the clip stage passed to the binner
    pub clipper_primitives: u64,
    /// Work items enqueued
    pub binned_primitives: u64,
}

/// Scratch owned by one worker and reused across draws
pub struct WorkerContext<const W: usize> {
    pub(crate) clip: ClipScratch,
    /// Vertex batches for clipper, geometry and domain output
    pub(crate) spare_batches: Vec<SimdVertex<W>>,
    /// Per-vertex buffers of an assembled group
    pub(crate) prim_verts: Vec<SimdVec4<W>>,
    pub(crate) tess_output: TessOutput,
    pub stats: FrontendStats,
}

impl<const W: usize> WorkerContext<W>
where
    Lanes<W>: SupportedLanes,
{
    pub fn new() -> Self {
        Self {
            clip: ClipScratch::new(),
            spare_batches: Vec::new(),
            prim_verts: alloc::vec![SimdVec4::zero(); MAX_VERTS_PER_PRIM],
            tess_output: TessOutput::default(),
            stats: FrontendStats::default(),
        }
    }
}

impl<const W: usize> WorkerContext<W> {
    /// Take `count` cleared batches, reusing spares first
    pub(crate) fn take_batches(&mut self, count: usize) -> Vec<SimdVertex<W>> {
        let mut batches = Vec::with_capacity(count);
        while batches.len() < count {
            let mut b = self.spare_batches.pop().unwrap_or_default();
            b.clear();
            batches.push(b);
        }
        batches
    }

    pub(crate) fn return_batches(&mut self, batches: Vec<SimdVertex<W>>) {
        self.spare_batches.extend(batches);
    }
}

impl<const W: usize> Default for WorkerContext<W>
where
    Lanes<W>: SupportedLanes,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Per-lane primitive ID, viewport index and render-target array index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimIds<const W: usize> {
    pub prim_id: Int<W>,
    pub viewport: Int<W>,
    pub rt_index: Int<W>,
}

impl<const W: usize> PrimIds<W> {
    pub fn new(prim_id: Int<W>) -> Self {
        Self {
            prim_id,
            viewport: Int::zero(),
            rt_index: Int::zero(),
        }
    }

    /// Every lane carries lane `lane` of `self`
    pub fn broadcast(&self, lane: usize) -> Self {
        Self {
            prim_id: Int::splat(self.prim_id.lane(lane)),
            viewport: Int::splat(self.viewport.lane(lane)),
            rt_index: Int::splat(self.rt_index.lane(lane)),
        }
    }

    #[inline]
    pub fn prim_id(&self, lane: usize) -> u32 {
        self.prim_id.lane(lane) as u32
    }

    #[inline]
    pub fn viewport(&self, lane: usize) -> u32 {
        self.viewport.lane(lane) as u32
    }

    #[inline]
    pub fn rt_index(&self, lane: usize) -> u32 {
        self.rt_index.lane(lane) as u32
    }
}
