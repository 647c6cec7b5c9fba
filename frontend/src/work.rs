//! Work items handed to the rasterization backends

use alloc::vec::Vec;
use glam::{Vec3, Vec4};

use crate::state::{InputCoverage, RasterState, SampleCount};

/// All three triangle edges rasterize
pub const ALL_EDGES_VALID: u32 = 0b111;

/// Index of a work item in the draw arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkItemId(pub u32);

/// Triangle rasterizer specialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriangleRaster {
    pub sample_count: SampleCount,
    pub center_pattern: bool,
    pub conservative: bool,
    pub input_coverage: InputCoverage,
    /// Edges to evaluate, bit 0 = v0v1, bit 1 = v1v2, bit 2 = v0v2
    pub edge_mask: u32,
    /// Scissor edges cut through raster tiles
    pub rasterize_partial_tiles: bool,
}

/// Backend entry point for a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterizerFunc {
    Triangle(TriangleRaster),
    Line,
    /// Bloated point rasterized as a quad
    TriPoint,
    /// Single-pixel point, coverage precomputed
    SimplePoint,
}

/// Pick the triangle rasterizer for the raster state and edge mask
pub fn select_rasterizer(
    raster: &RasterState,
    input_coverage: InputCoverage,
    edge_mask: u32,
    scissor_tile_aligned: bool,
) -> RasterizerFunc {
    RasterizerFunc::Triangle(TriangleRaster {
        sample_count: raster.sample_count,
        center_pattern: raster.center_pattern,
        conservative: raster.conservative_raster,
        input_coverage,
        edge_mask: edge_mask & ALL_EDGES_VALID,
        rasterize_partial_tiles: !scissor_tile_aligned,
    })
}

/// Screen-space vertex data of a work item
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VertexData {
    /// Rows x, y, z, 1/w; lane `i` = vertex `i`, lane 3 zero
    Triangle([Vec4; 4]),
    /// Rows x, y, z, 1/w; lanes 2 and 3 zero
    Line([Vec4; 4]),
    Point(Vec3),
    /// Raster-tile aligned pixel position and z
    SimplePoint { tile_x: u32, tile_y: u32, z: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TriFlags {
    pub front_facing: bool,
    pub y_major: bool,
    pub viewport_index: u32,
    pub render_target_array_index: u32,
    pub point_size: f32,
    /// Simple points: raster-tile relative `x | y << 4`
    pub coverage_mask: u32,
    pub edge_mask: u32,
}

/// One binned primitive. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub rasterizer: RasterizerFunc,
    pub vertices: VertexData,
    /// `num_attribs` x 3 vertices
    pub attribs: Vec<Vec4>,
    pub num_attribs: u32,
    /// Barycentric plane coefficients per enabled clip distance
    pub user_clip: Vec<f32>,
    pub flags: TriFlags,
    pub prim_id: u32,
}

impl WorkItem {
    /// Attribute `attrib` of vertex `vertex`
    pub fn attrib(&self, attrib: usize, vertex: usize) -> Vec4 {
        self.attribs[attrib * 3 + vertex]
    }
}
