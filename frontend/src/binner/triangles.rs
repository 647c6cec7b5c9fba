//! Triangle binning
//!
//! Flow per lane:
//! 1. Screen transform and x.8 fixed-point edge setup
//! 2. Zero-area and facing culls
//! 3. Bounding box: between-centers cull, scissor clamp, early raster
//! 4. Fill mode dispatch: edges to the line binner, vertices to the point
//!    binner, or one work item per covered macrotile

use alloc::vec::Vec;
use glam::Vec4;

use super::early_rast::{covers_any_pixel, fits_er_tile};
use super::lines::{ScreenLine, bin_line_lane};
use super::points::bin_point_lane;
use super::setup::{BBox, EdgeSetup, between_pixel_centers, conservative_edge_mask, cull_by_mode, to_fixed};
use super::{array_indices, enqueue, to_screen};
use crate::attributes::{process_attributes, process_user_clip};
use crate::context::{DrawContext, PrimIds, WorkerContext};
use crate::pa::PrimitiveAssembler;
use crate::simd::{SimdVec4, active_lanes};
use crate::state::{FillMode, SampleCount};
use crate::tiles::FIXED_POINT_SCALE;
use crate::work::{ALL_EDGES_VALID, TriFlags, VertexData, WorkItem, select_rasterizer};

const WIREFRAME_EDGES: [[usize; 2]; 3] = [[0, 1], [1, 2], [2, 0]];

/// Bin the active lanes of a group of clip-space triangles
pub fn bin_triangles<const W: usize>(
    ctx: &DrawContext,
    pa: &dyn PrimitiveAssembler<W>,
    worker: &mut WorkerContext<W>,
    prims: &[SimdVec4<W>],
    mask: u32,
    ids: &PrimIds<W>,
) {
    debug_assert!(prims.len() >= 3);
    let raster = &ctx.state.raster;
    let conservative = raster.conservative_raster;
    let mut culled = 0;

    for lane in active_lanes(mask) {
        let indices @ (viewport, rt) = array_indices(ctx, pa, ids, lane);
        let prim_id = ids.prim_id(lane);
        let screen: [Vec4; 3] = core::array::from_fn(|k| to_screen(ctx, prims[k].lane(lane), viewport));
        let x = screen.map(|v| to_fixed(v.x));
        let y = screen.map(|v| to_fixed(v.y));
        let edges = EdgeSetup::new(&x, &y);

        let zero_area = edges.det == 0;
        if zero_area && raster.fill_mode == FillMode::Solid && !conservative {
            culled += 1;
            continue;
        }
        let front_facing = edges.front_facing(raster.front_winding);
        // degenerate triangles have no facing under conservative raster
        if !(zero_area && conservative) && cull_by_mode(raster.cull_mode, front_facing) {
            culled += 1;
            continue;
        }
        let edge_mask = if conservative {
            conservative_edge_mask(&x, &y)
        } else {
            ALL_EDGES_VALID
        };

        let mut bbox = BBox::from_points(&x, &y);
        if conservative {
            bbox = bbox.bloat(FIXED_POINT_SCALE / 2, FIXED_POINT_SCALE / 2);
        }
        if raster.single_sample_coverage()
            && (between_pixel_centers(bbox.xmin, bbox.xmax) || between_pixel_centers(bbox.ymin, bbox.ymax))
        {
            culled += 1;
            continue;
        }
        let mut bbox = bbox.clamp_inclusive(&ctx.scissor(viewport));
        if conservative {
            // keep some area for degenerates on a scissor edge
            if bbox.xmin == bbox.xmax {
                bbox.xmax += 1;
            }
            if bbox.ymin == bbox.ymax {
                bbox.ymax += 1;
            }
        }
        if bbox.is_empty() {
            culled += 1;
            continue;
        }
        if raster.sample_count == SampleCount::X1
            && !conservative
            && fits_er_tile(&bbox)
            && !covers_any_pixel(&bbox, &x, &y, &edges)
        {
            culled += 1;
            continue;
        }

        match raster.fill_mode {
            FillMode::Wireframe => {
                for [a, b] in WIREFRAME_EDGES {
                    let line = ScreenLine {
                        verts: [screen[a], screen[b]],
                        vertex_map: [a, b],
                    };
                    bin_line_lane(ctx, pa, worker, lane, &line, prim_id, indices);
                }
            }
            FillMode::Point => {
                for (k, v) in screen.iter().enumerate() {
                    bin_point_lane(ctx, pa, worker, lane, *v, k, prim_id, indices);
                }
            }
            FillMode::Solid => {
                let backend = &ctx.state.backend;
                let degenerate = edge_mask != ALL_EDGES_VALID;
                let recip_w = screen.map(|v| v.w);
                let user_clip = if backend.clip_distance_mask != 0 {
                    process_user_clip(ctx, pa, lane, &[0, 1, 2], &recip_w)
                } else {
                    Vec::new()
                };
                let item = WorkItem {
                    rasterizer: select_rasterizer(
                        raster,
                        backend.input_coverage,
                        edge_mask,
                        ctx.derived.scissors_tile_aligned,
                    ),
                    vertices: VertexData::Triangle([
                        Vec4::new(screen[0].x, screen[1].x, screen[2].x, 0.0),
                        Vec4::new(screen[0].y, screen[1].y, screen[2].y, 0.0),
                        Vec4::new(screen[0].z, screen[1].z, screen[2].z, 0.0),
                        Vec4::new(recip_w[0], recip_w[1], recip_w[2], 0.0),
                    ]),
                    attribs: process_attributes(ctx, pa, lane, prim_id, &[0, 1, 2], degenerate),
                    num_attribs: backend.num_attributes,
                    user_clip,
                    flags: TriFlags {
                        front_facing: raster.force_front_facing || front_facing,
                        viewport_index: viewport,
                        render_target_array_index: rt,
                        edge_mask,
                        ..TriFlags::default()
                    },
                    prim_id,
                };
                enqueue(ctx, worker, item, bbox.macro_tiles());
            }
        }
    }
    log::trace!("bin_triangles: {} active, {} culled", mask.count_ones(), culled);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::PrimProcessor;
    use crate::simd::Int;
    use crate::state::{BackendState, CullMode, FrontWinding, PixelLocation, RasterState, Viewport};
    use crate::testing::{TestTarget, run_processor, stream_pa};
    use crate::topology::Topology;
    use crate::work::{RasterizerFunc, WorkItemId};

    // clip space for a 256x256 viewport
    fn clip(px: f32, py: f32) -> Vec4 {
        Vec4::new(px / 128.0 - 1.0, py / 128.0 - 1.0, 0.5, 1.0)
    }

    fn bin(target: &TestTarget, raster: RasterState, positions: &[Vec4]) -> WorkerContext<8> {
        let state = target.state(Topology::TriangleList).with_raster(raster);
        let ctx = target.context(&state);
        let mut worker = WorkerContext::<8>::new();
        let mut pa = stream_pa(Topology::TriangleList, positions);
        run_processor(&ctx, &mut worker, PrimProcessor::BinTriangles, &mut pa);
        worker
    }

    #[test]
    fn test_small_triangle_single_macrotile() {
        let target = TestTarget::with_size(100, 100);
        let state = target.state(Topology::TriangleList);
        let ctx = target.context(&state);
        let mut worker = WorkerContext::<8>::new();
        // 100x100 viewport: pixel p maps to p / 50 - 1
        let v = |px: f32, py: f32| Vec4::new(px / 50.0 - 1.0, py / 50.0 - 1.0, 0.0, 1.0);
        let mut pa = stream_pa(Topology::TriangleList, &[v(10.0, 10.0), v(20.0, 10.0), v(10.0, 20.0)]);
        run_processor(&ctx, &mut worker, PrimProcessor::BinTriangles, &mut pa);

        assert_eq!(target.enqueues(), vec![(0, 0, WorkItemId(0))]);
        let item = &target.items()[0];
        let VertexData::Triangle(rows) = item.vertices else {
            panic!("expected triangle data");
        };
        assert_eq!(rows[3], Vec4::new(1.0, 1.0, 1.0, 0.0));
        assert!((rows[0].x - 10.0).abs() < 1e-4 && (rows[1].z - 20.0).abs() < 1e-4);
        assert_eq!(item.flags.edge_mask, ALL_EDGES_VALID);
        assert_eq!(worker.stats.binned_primitives, 1);
    }

    #[test]
    fn test_tile_coverage_is_complete() {
        let target = TestTarget::new();
        bin(
            &target,
            RasterState::default(),
            &[clip(10.0, 10.0), clip(200.0, 20.0), clip(30.0, 150.0)],
        );
        // x 10..200 -> tiles 0..3, y 10..150 -> tiles 0..2
        let enqueues = target.enqueues();
        assert_eq!(enqueues.len(), 4 * 3);
        let mut tiles: Vec<_> = enqueues.iter().map(|&(x, y, _)| (x, y)).collect();
        tiles.dedup();
        assert_eq!(tiles.len(), 12);
        assert!(enqueues.iter().all(|&(_, _, id)| id == WorkItemId(0)));
    }

    #[test]
    fn test_zero_area_back_cull() {
        let tri = [clip(10.0, 10.0), clip(20.0, 20.0), clip(30.0, 30.0)];
        let raster = RasterState::default().with_cull_mode(CullMode::Back, FrontWinding::Ccw);

        let target = TestTarget::new();
        let worker = bin(&target, raster, &tri);
        assert_eq!(worker.stats.binned_primitives, 0);

        let target = TestTarget::new();
        bin(&target, raster.with_conservative_raster(true), &tri);
        let items = target.items();
        assert_eq!(items.len(), 1);
        let RasterizerFunc::Triangle(func) = items[0].rasterizer else {
            panic!("expected triangle rasterizer");
        };
        assert!(func.conservative);
        // collinear but distinct vertices keep every edge
        assert_eq!(items[0].flags.edge_mask, ALL_EDGES_VALID);

        let target = TestTarget::new();
        bin(
            &target,
            raster.with_conservative_raster(true),
            &[clip(10.0, 10.0), clip(10.0, 10.0), clip(30.0, 30.0)],
        );
        let items = target.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].flags.edge_mask, 0b110);
        assert!(!items[0].flags.front_facing);
    }

    #[test]
    fn test_facing_cull_by_winding() {
        // y down: (10,10) (50,10) (10,50) has det > 0, clockwise on screen
        let cw = [clip(10.0, 10.0), clip(50.0, 10.0), clip(10.0, 50.0)];
        let ccw = [cw[0], cw[2], cw[1]];

        let target = TestTarget::new();
        let raster = RasterState::default().with_cull_mode(CullMode::Back, FrontWinding::Cw);
        bin(&target, raster, &[cw, ccw].concat());
        let items = target.items();
        assert_eq!(items.len(), 1);
        assert!(items[0].flags.front_facing);

        let target = TestTarget::new();
        let raster = RasterState::default().with_cull_mode(CullMode::Both, FrontWinding::Cw);
        assert_eq!(bin(&target, raster, &[cw, ccw].concat()).stats.binned_primitives, 0);

        let target = TestTarget::new();
        let mut raster = RasterState::default().with_cull_mode(CullMode::None, FrontWinding::Ccw);
        raster.force_front_facing = true;
        bin(&target, raster, &cw);
        assert!(target.items()[0].flags.front_facing);
    }

    #[test]
    fn test_sub_pixel_triangles_are_culled() {
        let target = TestTarget::new();
        // the first sits between pixel rows; the second spans the center
        // (8.5, 8.5) in its box but passes above it
        let worker = bin(
            &target,
            RasterState::default(),
            &[
                clip(10.1, 10.6),
                clip(20.0, 10.6),
                clip(15.0, 10.9),
                clip(8.0, 8.0),
                clip(9.0, 8.0),
                clip(8.0, 8.9),
            ],
        );
        assert_eq!(worker.stats.binned_primitives, 0);

        // conservative raster keeps both
        let target = TestTarget::new();
        let worker = bin(
            &target,
            RasterState::default().with_conservative_raster(true),
            &[clip(10.1, 10.6), clip(20.0, 10.6), clip(15.0, 10.9)],
        );
        assert_eq!(worker.stats.binned_primitives, 1);
    }

    #[test]
    fn test_scissor_culls_outside() {
        let target = TestTarget::new();
        let worker = bin(
            &target,
            RasterState::default(),
            &[clip(-40.0, 10.0), clip(-10.0, 10.0), clip(-20.0, 40.0)],
        );
        assert_eq!(worker.stats.binned_primitives, 0);
        assert!(target.enqueues().is_empty());
    }

    #[test]
    fn test_wireframe_bins_three_lines() {
        let target = TestTarget::new();
        let state = target
            .state(Topology::TriangleList)
            .with_raster(RasterState::default().with_fill_mode(FillMode::Wireframe))
            .with_backend(BackendState::default().with_attributes(1, 0));
        let ctx = target.context(&state);
        let mut worker = WorkerContext::<8>::new();
        let mut pa = stream_pa(Topology::TriangleList, &[clip(10.0, 10.0), clip(50.0, 10.0), clip(10.0, 50.0)]);
        run_processor(&ctx, &mut worker, PrimProcessor::BinTriangles, &mut pa);

        let items = target.items();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.rasterizer == RasterizerFunc::Line));
        // edge v2 -> v0 carries v2 and v0 attributes
        assert_eq!(items[2].attrib(0, 0).x, 2.0);
        assert_eq!(items[2].attrib(0, 1).x, 0.0);
    }

    #[test]
    fn test_point_fill_bins_three_points() {
        let target = TestTarget::new();
        let worker = bin(
            &target,
            RasterState::default().with_fill_mode(FillMode::Point),
            &[clip(10.0, 10.0), clip(50.0, 10.0), clip(10.0, 50.0)],
        );
        assert_eq!(worker.stats.binned_primitives, 3);
        assert!(target.items().iter().all(|i| i.rasterizer == RasterizerFunc::SimplePoint));
    }

    #[test]
    fn test_viewport_array_selects_transform_and_scissor() {
        let target = TestTarget::new();
        let state = target.state(Topology::TriangleList).with_viewports(vec![
            Viewport::new(0.0, 0.0, 256.0, 256.0),
            Viewport::new(128.0, 128.0, 128.0, 128.0),
        ]);
        let ctx = target.context(&state);
        let mut worker = WorkerContext::<8>::new();
        let pa = stream_pa(Topology::TriangleList, &[clip(0.0, 0.0), clip(64.0, 0.0), clip(0.0, 64.0)])
            .with_array_indices(true, true);
        let mut prims = vec![SimdVec4::<8>::zero(); 3];
        assert!(pa.assemble(crate::vertex::VERTEX_POSITION_SLOT, &mut prims));
        let mut ids = PrimIds::new(Int::zero());
        ids.viewport = Int::splat(1);
        ids.rt_index = Int::splat(5);
        bin_triangles(&ctx, &pa, &mut worker, &prims, 1, &ids);

        let item = &target.items()[0];
        assert_eq!(item.flags.viewport_index, 1);
        assert_eq!(item.flags.render_target_array_index, 5);
        let VertexData::Triangle(rows) = item.vertices else {
            panic!("expected triangle data");
        };
        // ndc -1 lands on the second viewport's origin
        assert_eq!(rows[0].x, 128.0);
        assert_eq!(target.enqueues()[0].0, 2);
    }

    #[test]
    fn test_upper_left_pixel_location_offsets() {
        let target = TestTarget::new();
        let mut raster = RasterState::default();
        raster.pixel_location = PixelLocation::UpperLeft;
        bin(&target, raster, &[clip(10.0, 10.0), clip(50.0, 10.0), clip(10.0, 50.0)]);
        let VertexData::Triangle(rows) = target.items()[0].vertices else {
            panic!("expected triangle data");
        };
        assert_eq!(rows[0].x, 10.5);
    }

    #[test]
    fn test_huge_unclipped_triangle_saturates() {
        let target = TestTarget::new();
        let raster = RasterState {
            clip_enable: false,
            ..RasterState::default()
        };
        let tri = [
            Vec4::new(-1e9, 0.0, 0.5, 1.0),
            Vec4::new(1e9, 0.0, 0.5, 1.0),
            Vec4::new(0.0, 0.5, 0.5, 1.0),
        ];
        let worker = bin(&target, raster, &tri);
        assert_eq!(worker.stats.binned_primitives, 1);
        // y 128..192 is macrotile row 2, x spans the whole target
        let tiles: Vec<_> = target.enqueues().iter().map(|&(x, y, _)| (x, y)).collect();
        assert_eq!(tiles, vec![(0, 2), (1, 2), (2, 2), (3, 2)]);
    }
}
