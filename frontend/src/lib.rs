//! Geometry front end of a tile-based software rasterizer
//!
//! Takes shaded vertex batches and turns them into screen-space work items
//! binned into macrotiles for a rasterization backend.
//!
//! Flow:
//! 1. `draw` shades vertex batches and drives the primitive assembler (`pa`)
//! 2. Optional geometry (`gs`) and tessellation (`tess`) stages re-enter the
//!    pipeline with generated primitives
//! 3. `clip` rejects and clips primitives in clip space
//! 4. `binner` sets up, culls and enqueues them per macrotile, packing
//!    attributes through `attributes`

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod arena;
pub mod attributes;
pub mod binner;
pub mod clip;
pub mod context;
pub mod draw;
pub mod error;
pub mod gs;
pub mod pa;
pub mod simd;
pub mod state;
pub mod tess;
pub mod tiles;
pub mod topology;
pub mod vertex;
pub mod work;

#[cfg(test)]
mod testing;

pub use binner::{bin_lines, bin_points, bin_triangles};
pub use clip::{PrimProcessor, clip_lines, clip_points, clip_triangles};
pub use context::{DrawContext, FrontendStats, PrimIds, WorkerContext};
pub use draw::{DrawWork, Shaders, VertexShader, VsContext, process_draw};
pub use error::StateError;
pub use state::DrawState;
