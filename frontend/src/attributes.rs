//! Per-primitive attribute packing
//!
//! Each enabled attribute is stored as 3 vertices of 4 components. Lines and
//! points repeat their last vertex so the backend always interpolates
//! triangles.

use alloc::vec::Vec;
use glam::Vec4;

use crate::context::DrawContext;
use crate::pa::PrimitiveAssembler;
use crate::state::ConstantSource;
use crate::topology::{MAX_VERTS_PER_PRIM, Topology};
use crate::vertex::distance_location;

const TRISTRIP_PROVOKING_VERTEX: [usize; 3] = [0, 2, 1];
const QUAD_PROVOKING_TRI: [[isize; 4]; 2] = [[0, 0, 0, 1], [0, -1, 0, 0]];
const QUAD_PROVOKING_VERTEX: [[usize; 4]; 2] = [[0, 1, 2, 2], [0, 1, 1, 2]];
const QSTRIP_PROVOKING_TRI: [[isize; 4]; 2] = [[0, 0, 0, 1], [-1, 0, 0, 0]];
const QSTRIP_PROVOKING_VERTEX: [[usize; 4]; 2] = [[0, 1, 2, 1], [0, 0, 2, 1]];

const CONST_TABLE: [[f32; 4]; 3] = [[0.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0], [1.0, 1.0, 1.0, 1.0]];

/// Lane and vertex holding the provoking vertex of the primitive in `lane`.
/// Quads are split in two triangles, so the provoking vertex may live in
/// the sibling lane.
pub fn provoking_source<const W: usize>(pa: &dyn PrimitiveAssembler<W>, lane: usize, provoking_vertex: u32) -> (usize, usize) {
    let topology = pa.bin_topology();
    let parity = (pa.prim_parity(lane) & 1) as usize;
    let pv = provoking_vertex.min(topology.provoking_vertex_limit() - 1) as usize;
    let offset_lane = |offset: isize| lane.saturating_add_signed(offset);
    match topology {
        Topology::QuadList => (offset_lane(QUAD_PROVOKING_TRI[parity][pv]), QUAD_PROVOKING_VERTEX[parity][pv]),
        Topology::QuadStrip => (offset_lane(QSTRIP_PROVOKING_TRI[parity][pv]), QSTRIP_PROVOKING_VERTEX[parity][pv]),
        Topology::TriangleStrip if parity == 1 => (lane, TRISTRIP_PROVOKING_VERTEX[pv]),
        _ => (lane, pv.min(pa.verts_per_prim().saturating_sub(1))),
    }
}

/// Pack the attributes of the primitive in `lane`.
///
/// `vertex_map` picks the assembled vertices feeding the 1 to 3 output
/// vertices. `force_constant` flat-shades every attribute.
pub fn process_attributes<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    lane: usize,
    prim_id: u32,
    vertex_map: &[usize],
    force_constant: bool,
) -> Vec<Vec4> {
    debug_assert!((1..=3).contains(&vertex_map.len()));
    let backend = &ctx.state.backend;
    let constant_mask = if force_constant {
        u32::MAX
    } else {
        backend.constant_interpolation_mask
    };
    let provoking = provoking_source(pa, lane, ctx.state.frontend.provoking_vertex);

    let mut out = Vec::with_capacity(backend.num_attributes as usize * 3);
    let mut verts = [Vec4::ZERO; MAX_VERTS_PER_PRIM];
    let nverts = pa.verts_per_prim().min(MAX_VERTS_PER_PRIM);
    for i in 0..backend.num_attributes as usize {
        let slot = backend.input_slot(i);
        let start = out.len();

        if constant_mask & (1 << i) != 0 {
            let (src_lane, vid) = provoking;
            pa.assemble_single(slot, src_lane, &mut verts[..nverts]);
            out.extend_from_slice(&[verts[vid]; 3]);
        } else {
            pa.assemble_single(slot, lane, &mut verts[..nverts]);
            let last = vertex_map[vertex_map.len() - 1];
            for v in 0..3 {
                out.push(verts[*vertex_map.get(v).unwrap_or(&last)]);
            }
        }

        if backend.swizzle_enable {
            let swizzle = &backend.swizzle_map[i];
            let mut mask = swizzle.component_override_mask as u32 & 0xf;
            while mask != 0 {
                let comp = mask.trailing_zeros() as usize;
                mask &= mask - 1;
                let value = match swizzle.constant_source {
                    ConstantSource::Const0000 => CONST_TABLE[0][comp],
                    ConstantSource::Const0001 => CONST_TABLE[1][comp],
                    ConstantSource::Const1111 => CONST_TABLE[2][comp],
                    ConstantSource::PrimId => f32::from_bits(prim_id),
                };
                for v in &mut out[start..start + 3] {
                    v[comp] = value;
                }
            }
        }
    }
    out
}

/// Barycentric plane coefficients of the enabled clip distances.
///
/// Per distance: `d_e * rw_e - last` for every vertex but the last, then
/// `last = d_last * rw_last`.
pub fn process_user_clip<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    lane: usize,
    vertex_map: &[usize],
    recip_w: &[f32],
) -> Vec<f32> {
    let mut mask = ctx.state.backend.clip_distance_mask as u32;
    let n = vertex_map.len();
    let mut out = Vec::with_capacity(mask.count_ones() as usize * n);
    let mut verts = [Vec4::ZERO; MAX_VERTS_PER_PRIM];
    let nverts = pa.verts_per_prim().min(MAX_VERTS_PER_PRIM);
    while mask != 0 {
        let index = mask.trailing_zeros();
        mask &= mask - 1;
        let (slot, comp) = distance_location(index);
        pa.assemble_single(slot, lane, &mut verts[..nverts]);

        let last = verts[vertex_map[n - 1]][comp] * recip_w[n - 1];
        for e in 0..n - 1 {
            out.push(verts[vertex_map[e]][comp] * recip_w[e] - last);
        }
        out.push(last);
    }
    out
}
