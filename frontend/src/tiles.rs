//! Macrotile grid and per-tile work queues

use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Mutex;

use crate::work::WorkItemId;

/// Sub-pixel bits of screen coordinates (x.8)
pub const FIXED_POINT_SHIFT: u32 = 8;
/// Sub-pixel steps per pixel
pub const FIXED_POINT_SCALE: i32 = 1 << FIXED_POINT_SHIFT;

/// Macrotile size in pixels (64x64 per backend work unit)
pub const MACRO_TILE_X_DIM: u32 = 64;
pub const MACRO_TILE_Y_DIM: u32 = 64;
pub const MACRO_TILE_X_DIM_FIXED_SHIFT: u32 = 6 + FIXED_POINT_SHIFT;
pub const MACRO_TILE_Y_DIM_FIXED_SHIFT: u32 = 6 + FIXED_POINT_SHIFT;

/// Raster tile size in pixels
pub const TILE_X_DIM: u32 = 8;
pub const TILE_Y_DIM: u32 = 8;
pub const TILE_X_DIM_SHIFT: u32 = 3;
pub const TILE_Y_DIM_SHIFT: u32 = 3;

/// Early-rasterizer tile size in pixels
pub const ER_TILE_X_DIM: u32 = 4;
pub const ER_TILE_Y_DIM: u32 = 4;
pub const ER_TILE_X_SHIFT: u32 = 2;
pub const ER_TILE_Y_SHIFT: u32 = 2;

/// Receives binned work, one call per covered macrotile
pub trait TileManager {
    fn enqueue(&self, tile_x: u32, tile_y: u32, id: WorkItemId);
}

/// Grid of macrotile bins for one render target
pub struct MacroTileBins {
    tiles_x: u32,
    tiles_y: u32,
    bins: Vec<Mutex<Vec<WorkItemId>>>,
    /// Enqueues outside the grid
    dropped: AtomicUsize,
    next_tile: AtomicUsize,
}

impl MacroTileBins {
    /// Grid covering a `width` x `height` pixel target
    pub fn new(width: u32, height: u32) -> Self {
        let tiles_x = width.div_ceil(MACRO_TILE_X_DIM);
        let tiles_y = height.div_ceil(MACRO_TILE_Y_DIM);
        let bins = (0..tiles_x * tiles_y).map(|_| Mutex::new(Vec::new())).collect();
        Self {
            tiles_x,
            tiles_y,
            bins,
            dropped: AtomicUsize::new(0),
            next_tile: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.tiles_x, self.tiles_y)
    }

    #[inline]
    fn index(&self, tile_x: u32, tile_y: u32) -> Option<usize> {
        (tile_x < self.tiles_x && tile_y < self.tiles_y).then(|| (tile_y * self.tiles_x + tile_x) as usize)
    }

    /// Snapshot of a tile's queue in enqueue order
    pub fn bin(&self, tile_x: u32, tile_y: u32) -> Vec<WorkItemId> {
        self.index(tile_x, tile_y)
            .map(|i| self.bins[i].lock().clone())
            .unwrap_or_default()
    }

    /// Work items across all bins
    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.lock().len()).sum()
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Acquire)
    }

    /// Next non-empty tile for a backend worker (returns None when all tiles are handed out)
    pub fn next_tile(&self) -> Option<(u32, u32)> {
        loop {
            let idx = self.next_tile.fetch_add(1, Ordering::Relaxed);
            if idx >= self.bins.len() {
                return None;
            }
            if !self.bins[idx].lock().is_empty() {
                let idx = idx as u32;
                return Some((idx % self.tiles_x, idx / self.tiles_x));
            }
        }
    }

    /// Empty every bin for the next draw
    pub fn reset(&self) {
        for bin in &self.bins {
            bin.lock().clear();
        }
        self.dropped.store(0, Ordering::Release);
        self.next_tile.store(0, Ordering::Release);
    }
}

impl TileManager for MacroTileBins {
    fn enqueue(&self, tile_x: u32, tile_y: u32, id: WorkItemId) {
        match self.index(tile_x, tile_y) {
            Some(i) => self.bins[i].lock().push(id),
            None => {
                self.dropped.fetch_add(1, Ordering::AcqRel);
            }
        }
    }
}
