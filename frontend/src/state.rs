//! Draw state consumed by the front end
//!
//! Plain structs with `Default` impls and `with_*` builders. A `DrawState` is
//! validated once by `DrawContext::new` and read-only afterwards.

use alloc::vec::Vec;

use crate::error::StateError;
use crate::tess::TessDomain;
use crate::topology::{MAX_PATCH_CONTROL_POINTS, Topology};
use crate::vertex::{MAX_ATTRIBUTES, MAX_VERTEX_SLOTS, VERTEX_ATTRIB_START_SLOT};

/// Maximum viewports (and scissor rects) per draw
pub const MAX_VIEWPORTS: usize = 16;

/// Guard band extent in pixels, centered on each viewport
pub const GUARDBAND_EXTENT: f32 = 32768.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    Both,
    #[default]
    None,
    Front,
    Back,
}

/// Winding treated as front facing, in screen space with y down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrontWinding {
    Cw,
    #[default]
    Ccw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    #[default]
    Solid,
    Wireframe,
    Point,
}

/// Where pixel centers sit relative to integer coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelLocation {
    #[default]
    Center,
    UpperLeft,
}

impl PixelLocation {
    /// Offset added to screen x/y after the viewport transform
    pub fn offset(self) -> f32 {
        match self {
            PixelLocation::Center => 0.0,
            PixelLocation::UpperLeft => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleCount {
    #[default]
    X1,
    X2,
    X4,
    X8,
    X16,
}

impl SampleCount {
    pub fn count(self) -> u32 {
        match self {
            SampleCount::X1 => 1,
            SampleCount::X2 => 2,
            SampleCount::X4 => 4,
            SampleCount::X8 => 8,
            SampleCount::X16 => 16,
        }
    }
}

/// Coverage the pixel shader consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputCoverage {
    #[default]
    None,
    Normal,
    InnerConservative,
}

/// Clip-space depth range convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthClip {
    /// 0 <= z <= w
    #[default]
    ZeroToOne,
    /// -w <= z <= w
    MinusOneToOne,
}

/// Value written by a component override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstantSource {
    #[default]
    Const0000,
    Const0001,
    Const1111,
    PrimId,
}

/// Attribute routing for one backend attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttribSwizzle {
    /// Source attribute relative to the attribute offset
    pub source: u32,
    /// Components replaced by `constant_source`
    pub component_override_mask: u8,
    pub constant_source: ConstantSource,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl Viewport {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            min_z: 0.0,
            max_z: 1.0,
        }
    }

    pub fn with_depth_range(mut self, min_z: f32, max_z: f32) -> Self {
        self.min_z = min_z;
        self.max_z = max_z;
        self
    }
}

/// Scissor rect in pixels, max edges exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScissorRect {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl ScissorRect {
    pub const fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterState {
    pub cull_mode: CullMode,
    pub front_winding: FrontWinding,
    pub fill_mode: FillMode,
    pub scissor_enable: bool,
    /// Run the clip stage before binning
    pub clip_enable: bool,
    /// Clip against near/far
    pub depth_clip_enable: bool,
    pub depth_clip: DepthClip,
    pub pixel_location: PixelLocation,
    pub sample_count: SampleCount,
    /// All samples at the pixel center
    pub center_pattern: bool,
    pub conservative_raster: bool,
    pub force_front_facing: bool,
    pub line_width: f32,
    pub point_size: f32,
    /// Point size comes from the vertex
    pub point_param: bool,
    pub point_sprite: bool,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::None,
            front_winding: FrontWinding::Ccw,
            fill_mode: FillMode::Solid,
            scissor_enable: false,
            clip_enable: true,
            depth_clip_enable: true,
            depth_clip: DepthClip::ZeroToOne,
            pixel_location: PixelLocation::Center,
            sample_count: SampleCount::X1,
            center_pattern: false,
            conservative_raster: false,
            force_front_facing: false,
            line_width: 1.0,
            point_size: 1.0,
            point_param: false,
            point_sprite: false,
        }
    }
}

impl RasterState {
    pub fn with_cull_mode(mut self, cull_mode: CullMode, front_winding: FrontWinding) -> Self {
        self.cull_mode = cull_mode;
        self.front_winding = front_winding;
        self
    }

    pub fn with_fill_mode(mut self, fill_mode: FillMode) -> Self {
        self.fill_mode = fill_mode;
        self
    }

    pub fn with_conservative_raster(mut self, enable: bool) -> Self {
        self.conservative_raster = enable;
        self
    }

    pub fn with_samples(mut self, sample_count: SampleCount, center_pattern: bool) -> Self {
        self.sample_count = sample_count;
        self.center_pattern = center_pattern;
        self
    }

    pub fn with_scissor(mut self, enable: bool) -> Self {
        self.scissor_enable = enable;
        self
    }

    pub fn with_line_width(mut self, width: f32) -> Self {
        self.line_width = width;
        self
    }

    pub fn with_point_size(mut self, size: f32, from_vertex: bool) -> Self {
        self.point_size = size;
        self.point_param = from_vertex;
        self
    }

    /// Between-centers and early-raster culls only hold for single-sample
    /// patterns without conservative raster
    pub fn single_sample_coverage(&self) -> bool {
        (self.sample_count == SampleCount::X1 || self.center_pattern) && !self.conservative_raster
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendState {
    pub num_attributes: u32,
    /// Bit `i` set = attribute `i` uses the provoking vertex
    pub constant_interpolation_mask: u32,
    pub swizzle_enable: bool,
    pub swizzle_map: [AttribSwizzle; MAX_ATTRIBUTES],
    /// First vertex slot read for attribute 0
    pub vertex_attrib_offset: u32,
    pub clip_distance_mask: u8,
    pub cull_distance_mask: u8,
    /// Viewport index is read from the system-value slot
    pub read_viewport_index: bool,
    /// Render-target array index is read from the system-value slot
    pub read_rt_index: bool,
    pub input_coverage: InputCoverage,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            num_attributes: 0,
            constant_interpolation_mask: 0,
            swizzle_enable: false,
            swizzle_map: [AttribSwizzle::default(); MAX_ATTRIBUTES],
            vertex_attrib_offset: VERTEX_ATTRIB_START_SLOT as u32,
            clip_distance_mask: 0,
            cull_distance_mask: 0,
            read_viewport_index: false,
            read_rt_index: false,
            input_coverage: InputCoverage::None,
        }
    }
}

impl BackendState {
    pub fn with_attributes(mut self, num_attributes: u32, constant_mask: u32) -> Self {
        self.num_attributes = num_attributes;
        self.constant_interpolation_mask = constant_mask;
        self
    }

    pub fn with_swizzle(mut self, index: usize, swizzle: AttribSwizzle) -> Self {
        self.swizzle_enable = true;
        self.swizzle_map[index] = swizzle;
        self
    }

    pub fn with_distances(mut self, clip_mask: u8, cull_mask: u8) -> Self {
        self.clip_distance_mask = clip_mask;
        self.cull_distance_mask = cull_mask;
        self
    }

    /// Vertex slot feeding backend attribute `i`
    pub fn input_slot(&self, i: usize) -> usize {
        let source = if self.swizzle_enable {
            self.swizzle_map[i].source
        } else {
            i as u32
        };
        (self.vertex_attrib_offset + source) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrontendState {
    /// Positions already carry screen x/y/z and 1/w
    pub viewport_transform_disable: bool,
    pub restart_enable: bool,
    pub restart_index: u32,
    pub provoking_vertex: u32,
    pub gs_enable: bool,
    pub ts_enable: bool,
}

/// Fixed-function tessellation configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TessState {
    pub domain: TessDomain,
    /// Primitives built from the tessellator's index list
    pub output_topology: Topology,
}

impl Default for TessState {
    fn default() -> Self {
        Self {
            domain: TessDomain::Triangle,
            output_topology: Topology::TriangleList,
        }
    }
}

/// Everything a draw reads
#[derive(Debug, Clone, PartialEq)]
pub struct DrawState {
    pub topology: Topology,
    pub raster: RasterState,
    pub backend: BackendState,
    pub frontend: FrontendState,
    pub tess: TessState,
    pub viewports: Vec<Viewport>,
    pub scissors: Vec<ScissorRect>,
    pub rt_width: u32,
    pub rt_height: u32,
}

impl DrawState {
    /// One full-target viewport and default raster state
    pub fn new(topology: Topology, rt_width: u32, rt_height: u32) -> Self {
        let mut viewports = Vec::new();
        viewports.push(Viewport::new(0.0, 0.0, rt_width as f32, rt_height as f32));
        Self {
            topology,
            raster: RasterState::default(),
            backend: BackendState::default(),
            frontend: FrontendState::default(),
            tess: TessState::default(),
            viewports,
            scissors: Vec::new(),
            rt_width,
            rt_height,
        }
    }

    pub fn with_raster(mut self, raster: RasterState) -> Self {
        self.raster = raster;
        self
    }

    pub fn with_backend(mut self, backend: BackendState) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_frontend(mut self, frontend: FrontendState) -> Self {
        self.frontend = frontend;
        self
    }

    pub fn with_viewports(mut self, viewports: Vec<Viewport>) -> Self {
        self.viewports = viewports;
        self
    }

    /// Sets the rects and enables the scissor test
    pub fn with_scissors(mut self, scissors: Vec<ScissorRect>) -> Self {
        self.scissors = scissors;
        self.raster.scissor_enable = true;
        self
    }

    pub fn with_tessellation(mut self, tess: TessState) -> Self {
        self.tess = tess;
        self.frontend.ts_enable = true;
        self
    }

    /// Reject configurations the pipeline cannot run
    pub fn validate(&self) -> Result<(), StateError> {
        if let Topology::PatchList(k) = self.topology {
            if k == 0 || k > MAX_PATCH_CONTROL_POINTS {
                return Err(StateError::InvalidPatchControlPoints(k));
            }
            if !self.frontend.ts_enable {
                return Err(StateError::PatchWithoutTessellation);
            }
        }

        if self.viewports.is_empty() {
            return Err(StateError::NoViewports);
        }
        if self.viewports.len() > MAX_VIEWPORTS {
            return Err(StateError::TooManyViewports(self.viewports.len()));
        }
        if self.raster.scissor_enable && self.scissors.len() != self.viewports.len() {
            return Err(StateError::ScissorCountMismatch {
                scissors: self.scissors.len(),
                viewports: self.viewports.len(),
            });
        }
        for (i, vp) in self.viewports.iter().enumerate() {
            // written to also reject NaN
            if !(vp.width > 0.0 && vp.height > 0.0) {
                return Err(StateError::InvalidViewportExtent(i));
            }
        }

        let backend = &self.backend;
        if backend.num_attributes as usize > MAX_ATTRIBUTES {
            return Err(StateError::TooManyAttributes(backend.num_attributes));
        }
        for i in 0..backend.num_attributes as usize {
            let slot = backend.input_slot(i);
            if slot >= MAX_VERTEX_SLOTS {
                return Err(StateError::SlotOutOfRange {
                    attrib: i as u32,
                    slot: slot as u32,
                });
            }
        }

        if !(self.raster.line_width > 0.0) {
            return Err(StateError::InvalidLineWidth(self.raster.line_width));
        }
        if !(self.raster.point_size > 0.0) {
            return Err(StateError::InvalidPointSize(self.raster.point_size));
        }

        let pv = self.frontend.provoking_vertex;
        if pv >= self.topology.provoking_vertex_limit() {
            return Err(StateError::ProvokingVertexOutOfRange(pv));
        }

        Ok(())
    }
}
