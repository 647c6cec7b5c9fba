//! Primitive topologies and their vertex index patterns

/// Control points per patch, upper bound
pub const MAX_PATCH_CONTROL_POINTS: u32 = 32;

/// Vertices one assembled primitive may reference
pub const MAX_VERTS_PER_PRIM: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    PointList,
    LineList,
    LineStrip,
    LineLoop,
    TriangleList,
    TriangleStrip,
    TriangleFan,
    QuadList,
    QuadStrip,
    RectList,
    LineListAdj,
    LineStripAdj,
    TriangleListAdj,
    TriangleStripAdj,
    /// Patch list with the given control point count
    PatchList(u32),
}

/// What the binner receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Point,
    Line,
    Triangle,
    Patch,
}

impl Topology {
    pub fn kind(self) -> PrimitiveKind {
        match self {
            Topology::PointList => PrimitiveKind::Point,
            Topology::LineList
            | Topology::LineStrip
            | Topology::LineLoop
            | Topology::LineListAdj
            | Topology::LineStripAdj => PrimitiveKind::Line,
            Topology::TriangleList
            | Topology::TriangleStrip
            | Topology::TriangleFan
            | Topology::QuadList
            | Topology::QuadStrip
            | Topology::RectList
            | Topology::TriangleListAdj
            | Topology::TriangleStripAdj => PrimitiveKind::Triangle,
            Topology::PatchList(_) => PrimitiveKind::Patch,
        }
    }

    pub fn is_adjacency(self) -> bool {
        matches!(
            self,
            Topology::LineListAdj
                | Topology::LineStripAdj
                | Topology::TriangleListAdj
                | Topology::TriangleStripAdj
        )
    }

    /// Fan and loop reference vertex 0 for the whole draw
    pub fn uses_pivot(self) -> bool {
        matches!(self, Topology::TriangleFan | Topology::LineLoop)
    }

    /// Vertices per assembled primitive
    pub fn verts_per_prim(self, include_adjacency: bool) -> usize {
        match self {
            Topology::LineListAdj | Topology::LineStripAdj if include_adjacency => 4,
            Topology::TriangleListAdj | Topology::TriangleStripAdj if include_adjacency => 6,
            Topology::PatchList(k) => k as usize,
            _ => match self.kind() {
                PrimitiveKind::Point => 1,
                PrimitiveKind::Line => 2,
                PrimitiveKind::Triangle => 3,
                PrimitiveKind::Patch => 1,
            },
        }
    }

    /// Assembled primitives per topology primitive (quads and rects split in two)
    pub fn emitted_per_prim(self) -> u32 {
        match self {
            Topology::QuadList | Topology::QuadStrip | Topology::RectList => 2,
            _ => 1,
        }
    }

    /// Primitives formed by `n` vertices
    pub fn num_prims(self, n: u32) -> u32 {
        match self {
            Topology::PointList => n,
            Topology::TriangleList | Topology::RectList => n / 3,
            Topology::TriangleStrip | Topology::TriangleFan => n.saturating_sub(2),
            Topology::QuadList => n / 4,
            Topology::QuadStrip if n < 4 => 0,
            Topology::QuadStrip => (n - 2) / 2,
            Topology::LineList => n / 2,
            Topology::LineStrip => n.saturating_sub(1),
            Topology::LineLoop => n,
            Topology::LineListAdj => n / 4,
            Topology::LineStripAdj => n.saturating_sub(3),
            Topology::TriangleListAdj => n / 6,
            Topology::TriangleStripAdj if n < 6 => 0,
            Topology::TriangleStripAdj => n / 2 - 2,
            Topology::PatchList(k) => n.checked_div(k).unwrap_or(0),
        }
    }

    /// Vertices consumed by `p` whole primitives
    pub fn num_verts(self, p: u32) -> u32 {
        if p == 0 {
            return 0;
        }
        match self {
            Topology::PointList | Topology::LineLoop => p,
            Topology::TriangleList | Topology::RectList => p * 3,
            Topology::TriangleStrip | Topology::TriangleFan => p + 2,
            Topology::QuadList | Topology::LineListAdj => p * 4,
            Topology::QuadStrip => p * 2 + 2,
            Topology::LineList => p * 2,
            Topology::LineStrip => p + 1,
            Topology::LineStripAdj => p + 3,
            Topology::TriangleListAdj => p * 6,
            Topology::TriangleStripAdj => (p + 2) * 2,
            Topology::PatchList(k) => p * k,
        }
    }

    /// Assembled primitives for `n` vertices
    pub fn emitted_prims(self, n: u32) -> u32 {
        self.num_prims(n) * self.emitted_per_prim()
    }

    /// Exclusive bound on the provoking vertex index
    pub fn provoking_vertex_limit(self) -> u32 {
        match self {
            Topology::QuadList | Topology::QuadStrip => 4,
            _ => 3,
        }
    }
}

/// A vertex of an assembled primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexRef {
    /// Vertex `i` of the stream
    Stream(u32),
    /// Rect-list fourth vertex `v1 + v2 - v0` where `v0` is stream vertex `i`
    Implied(u32),
}

impl VertexRef {
    /// Highest stream vertex this reference reads
    #[inline]
    pub fn max_index(self) -> u32 {
        match self {
            VertexRef::Stream(v) => v,
            VertexRef::Implied(base) => base + 2,
        }
    }

    /// Lowest stream vertex this reference reads
    #[inline]
    pub fn min_index(self) -> u32 {
        match self {
            VertexRef::Stream(v) | VertexRef::Implied(v) => v,
        }
    }

    #[inline]
    pub fn offset(self, base: u32) -> Self {
        match self {
            VertexRef::Stream(v) => VertexRef::Stream(v + base),
            VertexRef::Implied(v) => VertexRef::Implied(v + base),
        }
    }
}

/// Vertex references of one assembled primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimVerts {
    refs: [VertexRef; MAX_VERTS_PER_PRIM],
    len: usize,
}

/// Strip-with-adjacency forms, 0-based, in GS order
/// `[v1, adj12, v2, adj23, v3, adj31]`
const STRIP_ADJ_ONLY: [u32; 6] = [0, 1, 2, 5, 4, 3];
const STRIP_ADJ_FIRST: [u32; 6] = [0, 1, 2, 6, 4, 3];

impl PrimVerts {
    fn from_slice(refs: &[VertexRef]) -> Self {
        let mut out = Self {
            refs: [VertexRef::Stream(0); MAX_VERTS_PER_PRIM],
            len: refs.len(),
        };
        out.refs[..refs.len()].copy_from_slice(refs);
        out
    }

    fn stream(indices: &[u32]) -> Self {
        let mut out = Self {
            refs: [VertexRef::Stream(0); MAX_VERTS_PER_PRIM],
            len: indices.len(),
        };
        for (r, &i) in out.refs.iter_mut().zip(indices) {
            *r = VertexRef::Stream(i);
        }
        out
    }

    /// Vertices of assembled primitive `e` in a run of `n` topology
    /// primitives. `n` only matters for line-loop closure and the
    /// strip-with-adjacency end forms; pass `u32::MAX` while the run length
    /// is still unknown.
    pub fn new(topology: Topology, e: u32, n: u32, include_adjacency: bool) -> Self {
        match topology {
            Topology::PointList => Self::stream(&[e]),
            Topology::LineList => Self::stream(&[2 * e, 2 * e + 1]),
            Topology::LineStrip => Self::stream(&[e, e + 1]),
            Topology::LineLoop if n != u32::MAX && e + 1 == n => Self::stream(&[e, 0]),
            Topology::LineLoop => Self::stream(&[e, e + 1]),
            Topology::TriangleList => Self::stream(&[3 * e, 3 * e + 1, 3 * e + 2]),
            Topology::TriangleStrip | Topology::QuadStrip => strip_tri(e),
            Topology::TriangleFan => Self::stream(&[0, e + 1, e + 2]),
            Topology::QuadList => {
                let q = 4 * (e / 2);
                if e & 1 == 0 {
                    Self::stream(&[q, q + 1, q + 2])
                } else {
                    Self::stream(&[q, q + 2, q + 3])
                }
            }
            Topology::RectList => {
                let r = 3 * (e / 2);
                if e & 1 == 0 {
                    Self::stream(&[r, r + 1, r + 2])
                } else {
                    Self::from_slice(&[
                        VertexRef::Stream(r + 1),
                        VertexRef::Implied(r),
                        VertexRef::Stream(r + 2),
                    ])
                }
            }
            Topology::LineListAdj if include_adjacency => {
                Self::stream(&[4 * e, 4 * e + 1, 4 * e + 2, 4 * e + 3])
            }
            Topology::LineListAdj => Self::stream(&[4 * e + 1, 4 * e + 2]),
            Topology::LineStripAdj if include_adjacency => Self::stream(&[e, e + 1, e + 2, e + 3]),
            Topology::LineStripAdj => Self::stream(&[e + 1, e + 2]),
            Topology::TriangleListAdj if include_adjacency => {
                let b = 6 * e;
                Self::stream(&[b, b + 1, b + 2, b + 3, b + 4, b + 5])
            }
            Topology::TriangleListAdj => Self::stream(&[6 * e, 6 * e + 2, 6 * e + 4]),
            Topology::TriangleStripAdj => {
                let full = strip_adj(e, n);
                if include_adjacency {
                    Self::stream(&full)
                } else {
                    Self::stream(&[full[0], full[2], full[4]])
                }
            }
            Topology::PatchList(k) => {
                let mut out = Self::stream(&[]);
                out.len = k as usize;
                for (c, r) in out.refs[..k as usize].iter_mut().enumerate() {
                    *r = VertexRef::Stream(k * e + c as u32);
                }
                out
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn refs(&self) -> &[VertexRef] {
        &self.refs[..self.len]
    }

    /// Shift stream references by `base`
    pub fn offset(mut self, base: u32) -> Self {
        for r in &mut self.refs[..self.len] {
            *r = r.offset(base);
        }
        self
    }

    pub fn max_index(&self) -> u32 {
        self.refs().iter().map(|r| r.max_index()).max().unwrap_or(0)
    }

    pub fn min_index(&self) -> u32 {
        self.refs().iter().map(|r| r.min_index()).min().unwrap_or(0)
    }
}

fn strip_tri(e: u32) -> PrimVerts {
    if e & 1 == 0 {
        PrimVerts::stream(&[e, e + 1, e + 2])
    } else {
        PrimVerts::stream(&[e, e + 2, e + 1])
    }
}

fn strip_adj(i: u32, n: u32) -> [u32; 6] {
    if i == 0 {
        return if n == 1 { STRIP_ADJ_ONLY } else { STRIP_ADJ_FIRST };
    }
    let b = 2 * i;
    let last = n != u32::MAX && i + 1 == n;
    match (i & 1 == 1, last) {
        (true, false) => [b + 2, b - 2, b, b + 3, b + 4, b + 6],
        (false, false) => [b, b - 2, b + 2, b + 6, b + 4, b + 3],
        (true, true) => [b + 2, b - 2, b, b + 3, b + 4, b + 5],
        (false, true) => [b, b - 2, b + 2, b + 5, b + 4, b + 3],
    }
}

/// Highest stream vertex that must exist before assembled primitive `e` can
/// be emitted while the run length is still open.
///
/// Quad and rect halves become ready together. A strip-with-adjacency
/// primitive waits for the next primitive's last vertex so its form is known.
pub fn ready_index(topology: Topology, e: u32, include_adjacency: bool) -> u32 {
    match topology {
        Topology::QuadList | Topology::QuadStrip | Topology::RectList => {
            PrimVerts::new(topology, e | 1, u32::MAX, include_adjacency).max_index()
        }
        Topology::TriangleStripAdj => 2 * e + 7,
        _ => PrimVerts::new(topology, e, u32::MAX, include_adjacency).max_index(),
    }
}
