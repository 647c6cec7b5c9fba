//! Draw state validation errors

use thiserror::Error;

use crate::state::MAX_VIEWPORTS;
use crate::topology::{MAX_PATCH_CONTROL_POINTS, Topology};
use crate::vertex::MAX_ATTRIBUTES;

/// Configuration errors rejected when a draw context is built.
///
/// Everything past validation is data-driven: NaN, degenerate and off-screen
/// primitives are discarded silently.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("patch list needs 1..={max} control points, got {0}", max = MAX_PATCH_CONTROL_POINTS)]
    InvalidPatchControlPoints(u32),
    #[error("draw has no viewports")]
    NoViewports,
    #[error("{0} viewports exceed the limit of {max}", max = MAX_VIEWPORTS)]
    TooManyViewports(usize),
    /// Scissor test is enabled but the rect count does not match.
    #[error("{scissors} scissor rects for {viewports} viewports")]
    ScissorCountMismatch { scissors: usize, viewports: usize },
    #[error("viewport {0} has a non-positive extent")]
    InvalidViewportExtent(usize),
    #[error("{0} attributes exceed the limit of {max}", max = MAX_ATTRIBUTES)]
    TooManyAttributes(u32),
    #[error("attribute {attrib} reads slot {slot} outside the vertex")]
    SlotOutOfRange { attrib: u32, slot: u32 },
    #[error("line width must be positive, got {0}")]
    InvalidLineWidth(f32),
    #[error("point size must be positive, got {0}")]
    InvalidPointSize(f32),
    #[error("provoking vertex {0} is out of range for the topology")]
    ProvokingVertexOutOfRange(u32),
    #[error("patch topology without a tessellation stage")]
    PatchWithoutTessellation,
    /// A stage is enabled in the draw state but no shader was supplied.
    #[error("{0} stage is enabled but no shader was bound")]
    MissingShader(&'static str),
    /// Geometry or tessellation output that is not a point, line or
    /// triangle list/strip the stage can assemble.
    #[error("{0:?} cannot be produced by a shader stage")]
    InvalidOutputTopology(Topology),
}
