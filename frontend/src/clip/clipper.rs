//! Sutherland-Hodgman clipping of one primitive
//!
//! A vertex is `stride` consecutive `Vec4`s, one per carried slot. Two
//! buffers ping-pong between plane passes; the current one holds the result.

use alloc::vec::Vec;
use glam::Vec4;

use crate::context::GuardBand;
use crate::state::DepthClip;

/// A triangle gains at most one vertex per plane
pub const MAX_CLIPPED_VERTS: usize = 3 + 6;

/// Clip planes in the order they are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipPlane {
    Near,
    Far,
    Left,
    Right,
    Bottom,
    Top,
}

impl ClipPlane {
    pub const ALL: [ClipPlane; 6] = [
        ClipPlane::Near,
        ClipPlane::Far,
        ClipPlane::Left,
        ClipPlane::Right,
        ClipPlane::Bottom,
        ClipPlane::Top,
    ];

    /// Guard-band planes only, used without depth clipping
    pub const XY: [ClipPlane; 4] = [ClipPlane::Left, ClipPlane::Right, ClipPlane::Bottom, ClipPlane::Top];

    /// Signed distance, inside when `>= 0`. The x/y planes are the
    /// guard-band planes.
    #[inline]
    pub fn distance(self, p: Vec4, gb: GuardBand, depth: DepthClip) -> f32 {
        match self {
            ClipPlane::Near => match depth {
                DepthClip::ZeroToOne => p.z,
                DepthClip::MinusOneToOne => p.z + p.w,
            },
            ClipPlane::Far => p.w - p.z,
            ClipPlane::Left => p.x + gb.x * p.w,
            ClipPlane::Right => gb.x * p.w - p.x,
            ClipPlane::Bottom => gb.y * p.w - p.y,
            ClipPlane::Top => p.y + gb.y * p.w,
        }
    }
}

/// Ping-pong vertex buffers, owned by a worker
#[derive(Debug, Default)]
pub struct ClipScratch {
    bufs: [Vec<Vec4>; 2],
    current: usize,
    stride: usize,
}

impl ClipScratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a primitive of `stride` slots per vertex
    pub(crate) fn begin(&mut self, stride: usize) {
        self.stride = stride;
        self.current = 0;
        for buf in &mut self.bufs {
            buf.clear();
            buf.reserve(MAX_CLIPPED_VERTS * stride);
        }
    }

    /// Append a zeroed input vertex and return its slots
    pub(crate) fn push_vertex(&mut self) -> &mut [Vec4] {
        let buf = &mut self.bufs[self.current];
        let start = buf.len();
        buf.resize(start + self.stride, Vec4::ZERO);
        &mut buf[start..]
    }

    pub(crate) fn len(&self) -> usize {
        self.bufs[self.current].len().checked_div(self.stride).unwrap_or(0)
    }

    pub(crate) fn vertex(&self, i: usize) -> &[Vec4] {
        &self.bufs[self.current][i * self.stride..(i + 1) * self.stride]
    }

    pub(crate) fn vertex_mut(&mut self, i: usize) -> &mut [Vec4] {
        &mut self.bufs[self.current][i * self.stride..(i + 1) * self.stride]
    }

    pub(crate) fn vertices(&self) -> impl Iterator<Item = &[Vec4]> {
        self.bufs[self.current].chunks_exact(self.stride.max(1))
    }

    /// Clip the current polygon against `planes`. `pos` is the slot index
    /// of the position. Returns the output vertex count.
    pub(crate) fn clip_polygon(&mut self, planes: &[ClipPlane], pos: usize, gb: GuardBand, depth: DepthClip) -> usize {
        for &plane in planes {
            let n = self.len();
            if n == 0 {
                break;
            }
            let stride = self.stride;
            let (src, dst) = split_pair(&mut self.bufs, self.current);
            dst.clear();
            for i in 0..n {
                let s = (i + n - 1) % n;
                let sv = &src[s * stride..(s + 1) * stride];
                let pv = &src[i * stride..(i + 1) * stride];
                let ds = plane.distance(sv[pos], gb, depth);
                let dp = plane.distance(pv[pos], gb, depth);
                let s_in = ds >= 0.0;
                let p_in = dp >= 0.0;
                if s_in != p_in {
                    // interpolate from the inside vertex for watertight shared edges
                    if s_in {
                        lerp_into(dst, sv, pv, ds / (ds - dp));
                    } else {
                        lerp_into(dst, pv, sv, dp / (dp - ds));
                    }
                }
                if p_in {
                    dst.extend_from_slice(pv);
                }
            }
            debug_assert!(dst.len() <= MAX_CLIPPED_VERTS * stride);
            self.current ^= 1;
        }
        self.len()
    }

    /// Clip the current two-vertex segment. Returns 2, or 0 if it lies
    /// outside any plane.
    pub(crate) fn clip_segment(&mut self, planes: &[ClipPlane], pos: usize, gb: GuardBand, depth: DepthClip) -> usize {
        debug_assert_eq!(self.len(), 2);
        let stride = self.stride;
        for &plane in planes {
            let (src, dst) = split_pair(&mut self.bufs, self.current);
            let (v0, v1) = src.split_at(stride);
            let d0 = plane.distance(v0[pos], gb, depth);
            let d1 = plane.distance(v1[pos], gb, depth);
            match (d0 >= 0.0, d1 >= 0.0) {
                (true, true) => continue,
                (false, false) => {
                    src.clear();
                    return 0;
                }
                (true, false) => {
                    dst.clear();
                    dst.extend_from_slice(v0);
                    lerp_into(dst, v0, v1, d0 / (d0 - d1));
                }
                (false, true) => {
                    dst.clear();
                    lerp_into(dst, v1, v0, d1 / (d1 - d0));
                    dst.extend_from_slice(v1);
                }
            }
            self.current ^= 1;
        }
        self.len()
    }
}

/// (current, other) buffer pair
fn split_pair(bufs: &mut [Vec<Vec4>; 2], current: usize) -> (&mut Vec<Vec4>, &mut Vec<Vec4>) {
    let [a, b] = bufs;
    if current == 0 { (a, b) } else { (b, a) }
}

fn lerp_into(dst: &mut Vec<Vec4>, from: &[Vec4], to: &[Vec4], t: f32) {
    dst.extend(from.iter().zip(to).map(|(a, b)| a.lerp(*b, t)));
}

#[cfg(test)]
mod tests {
    use super::*;

    const GB: GuardBand = GuardBand { x: 4.0, y: 4.0 };

    fn load(scratch: &mut ClipScratch, verts: &[Vec4]) {
        scratch.begin(2);
        for (i, v) in verts.iter().enumerate() {
            let slots = scratch.push_vertex();
            slots[0] = Vec4::splat(i as f32);
            slots[1] = *v;
        }
    }

    #[test]
    fn test_inside_triangle_round_trips() {
        let mut scratch = ClipScratch::new();
        let tri = [
            Vec4::new(-0.5, -0.5, 0.5, 1.0),
            Vec4::new(0.5, -0.5, 0.5, 1.0),
            Vec4::new(0.0, 0.5, 0.5, 1.0),
        ];
        load(&mut scratch, &tri);
        assert_eq!(scratch.clip_polygon(&ClipPlane::ALL, 1, GB, DepthClip::ZeroToOne), 3);
        for (i, v) in scratch.vertices().enumerate() {
            assert_eq!(v[1], tri[i]);
            assert_eq!(v[0], Vec4::splat(i as f32));
        }
    }

    #[test]
    fn test_near_clip_adds_vertex() {
        let mut scratch = ClipScratch::new();
        // v0 behind the near plane
        load(
            &mut scratch,
            &[Vec4::new(0.0, 0.0, -1.0, 1.0), Vec4::new(1.0, 0.0, 1.0, 1.0), Vec4::new(0.0, 1.0, 1.0, 1.0)],
        );
        let n = scratch.clip_polygon(&[ClipPlane::Near], 1, GB, DepthClip::ZeroToOne);
        assert_eq!(n, 4);
        assert!(scratch.vertices().all(|v| v[1].z >= 0.0));
        // edge v2->v0 first, then v0->v1, each interpolated from its inside end
        assert_eq!(scratch.vertex(0)[0], Vec4::splat(1.0));
        assert_eq!(scratch.vertex(0)[1], Vec4::new(0.0, 0.5, 0.0, 1.0));
        assert_eq!(scratch.vertex(1)[0], Vec4::splat(0.5));
        assert_eq!(scratch.vertex(1)[1], Vec4::new(0.5, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_fully_outside_is_empty() {
        let mut scratch = ClipScratch::new();
        load(
            &mut scratch,
            &[Vec4::new(0.0, 0.0, 2.0, 1.0), Vec4::new(1.0, 0.0, 3.0, 1.0), Vec4::new(0.0, 1.0, 2.0, 1.0)],
        );
        assert_eq!(scratch.clip_polygon(&ClipPlane::ALL, 1, GB, DepthClip::ZeroToOne), 0);
    }

    #[test]
    fn test_segment_clip() {
        let mut scratch = ClipScratch::new();
        load(&mut scratch, &[Vec4::new(0.0, 0.0, 0.5, 1.0), Vec4::new(0.0, 0.0, 1.5, 1.0)]);
        assert_eq!(scratch.clip_segment(&ClipPlane::ALL, 1, GB, DepthClip::ZeroToOne), 2);
        assert_eq!(scratch.vertex(0)[1].z, 0.5);
        assert_eq!(scratch.vertex(1)[1].z, 1.0);

        load(&mut scratch, &[Vec4::new(-9.0, 0.0, 0.5, 1.0), Vec4::new(-5.0, 0.0, 0.5, 1.0)]);
        assert_eq!(scratch.clip_segment(&ClipPlane::ALL, 1, GB, DepthClip::ZeroToOne), 0);
    }

    #[test]
    fn test_minus_one_to_one_near_plane() {
        let p = Vec4::new(0.0, 0.0, -0.5, 1.0);
        assert!(ClipPlane::Near.distance(p, GB, DepthClip::ZeroToOne) < 0.0);
        assert!(ClipPlane::Near.distance(p, GB, DepthClip::MinusOneToOne) > 0.0);
    }
}
