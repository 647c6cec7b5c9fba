//! Geometry stage
//!
//! The shader sees one SIMD group of assembled primitives and writes a
//! vertex stream per lane. Each stream is assembled again with restart
//! support and sent to the clip/bin processor of the output topology.

use alloc::vec;
use alloc::vec::Vec;

use crate::clip::PrimProcessor;
use crate::context::{DrawContext, PrimIds, WorkerContext};
use crate::draw::read_prim_ids;
use crate::error::StateError;
use crate::pa::{CutAwarePa, PrimitiveAssembler};
use crate::simd::{Int, SimdVec4, active_lanes, lane_mask};
use crate::state::DrawState;
use crate::topology::Topology;
use crate::vertex::{MAX_VERTEX_SLOTS, SimdVertex, VERTEX_POSITION_SLOT, VertexSlots};

/// One group of input primitives
pub struct PrimInput<'a, const W: usize> {
    /// One batch per primitive vertex (adjacency included), lane = primitive
    pub vertices: &'a [SimdVertex<W>],
    pub prim_ids: Int<W>,
    pub mask: u32,
}

impl<const W: usize> PrimInput<'_, W> {
    /// Every slot of input vertex `vertex` of the primitive in `lane`
    pub fn vertex(&self, vertex: usize, lane: usize) -> VertexSlots {
        self.vertices[vertex].lane(lane)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum StreamEntry {
    Vertex(VertexSlots),
    Cut,
}

/// Per-lane output streams of one invocation
#[derive(Debug)]
pub struct GsEmitter<const W: usize> {
    max_vertices: u32,
    streams: Vec<Vec<StreamEntry>>,
    emitted: [u32; W],
    dropped: u32,
}

impl<const W: usize> GsEmitter<W> {
    pub fn new(max_vertices: u32) -> Self {
        Self {
            max_vertices,
            streams: (0..W).map(|_| Vec::new()).collect(),
            emitted: [0; W],
            dropped: 0,
        }
    }

    /// Append a vertex to the strip of `lane`. Vertices past the shader's
    /// declared maximum are dropped.
    pub fn emit(&mut self, lane: usize, vertex: &VertexSlots) {
        if self.emitted[lane] >= self.max_vertices {
            self.dropped += 1;
            return;
        }
        self.emitted[lane] += 1;
        self.streams[lane].push(StreamEntry::Vertex(*vertex));
    }

    /// End the current strip of `lane`
    pub fn cut(&mut self, lane: usize) {
        let stream = &mut self.streams[lane];
        if matches!(stream.last(), Some(StreamEntry::Vertex(_))) {
            stream.push(StreamEntry::Cut);
        }
    }

    /// Vertices emitted for `lane`
    pub fn emitted(&self, lane: usize) -> u32 {
        self.emitted[lane]
    }

    fn stream(&self, lane: usize) -> &[StreamEntry] {
        &self.streams[lane]
    }
}

pub trait GeometryShader<const W: usize> {
    /// Point list, line strip or triangle strip
    fn output_topology(&self) -> Topology;

    /// Vertices one input primitive may emit
    fn max_vertices(&self) -> u32;

    fn execute(&self, input: &PrimInput<W>, out: &mut GsEmitter<W>);
}

/// A bound geometry shader and the processor for what it emits
pub(crate) struct GsStage<'s, const W: usize> {
    shader: &'s dyn GeometryShader<W>,
    processor: PrimProcessor,
}

impl<'s, const W: usize> GsStage<'s, W> {
    pub(crate) fn new(state: &DrawState, shader: &'s dyn GeometryShader<W>) -> Result<Self, StateError> {
        let topology = shader.output_topology();
        if !matches!(
            topology,
            Topology::PointList | Topology::LineStrip | Topology::TriangleStrip
        ) {
            return Err(StateError::InvalidOutputTopology(topology));
        }
        let processor =
            PrimProcessor::select(state, topology.kind()).ok_or(StateError::InvalidOutputTopology(topology))?;
        Ok(Self { shader, processor })
    }

    /// Run the shader over the current group of `pa` and pass each lane's
    /// output on with that lane's primitive ID
    pub(crate) fn process(
        &self,
        ctx: &DrawContext,
        worker: &mut WorkerContext<W>,
        pa: &dyn PrimitiveAssembler<W>,
        mask: u32,
        ids: &PrimIds<W>,
    ) {
        let vpp = pa.verts_per_prim();
        let mut inputs = worker.take_batches(vpp);
        let mut gathered = vec![SimdVec4::<W>::zero(); vpp];
        for slot in 0..MAX_VERTEX_SLOTS {
            if !pa.assemble(slot, &mut gathered) {
                break;
            }
            for (input, v) in inputs.iter_mut().zip(&gathered) {
                input[slot] = *v;
            }
        }

        let mut emitter = GsEmitter::new(self.shader.max_vertices());
        let input = PrimInput {
            vertices: &inputs,
            prim_ids: ids.prim_id,
            mask,
        };
        self.shader.execute(&input, &mut emitter);
        worker.return_batches(inputs);
        worker.stats.gs_invocations += mask.count_ones() as u64;
        if emitter.dropped != 0 {
            log::trace!("gs: {} vertices past the declared maximum", emitter.dropped);
        }

        let topology = self.shader.output_topology();
        let backend = &ctx.state.backend;
        let mut prims = vec![SimdVec4::<W>::zero(); topology.verts_per_prim(false)];
        for lane in active_lanes(mask) {
            let stream = emitter.stream(lane);
            if stream.is_empty() {
                continue;
            }
            let n = stream.len();
            let mut batches = worker.take_batches(n.div_ceil(W));
            let mut cuts = vec![0u32; batches.len()];
            for (i, entry) in stream.iter().enumerate() {
                match entry {
                    StreamEntry::Vertex(v) => batches[i / W].set_lane(i % W, v),
                    StreamEntry::Cut => cuts[i / W] |= 1 << (i % W),
                }
            }

            let mut out = CutAwarePa::from_stream(topology, batches, n as u32, &cuts)
                .with_array_indices(backend.read_viewport_index, backend.read_rt_index);
            let prim_id = Int::splat(ids.prim_id.lane(lane));
            while out.has_work() && out.assemble(VERTEX_POSITION_SLOT, &mut prims) {
                let count = out.num_prims();
                let out_ids = read_prim_ids(ctx, &out, prim_id);
                worker.stats.gs_primitives += count as u64;
                self.processor.run(ctx, &out, worker, &prims, lane_mask(count), &out_ids);
                if !out.next_prim() {
                    break;
                }
            }
            worker.return_batches(out.into_batches());
        }
    }
}
