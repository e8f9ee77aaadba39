/// Tile grid and binner for parallel rasterization.
///
/// The framebuffer is partitioned into fixed 32x32 pixel tiles; each frame a
/// single-threaded binning pass assigns every prepared triangle to exactly one
/// tile by its screen-space centroid. One triangle, one owning bin: that
/// exclusivity is the entire basis for lock-free parallel pixel writes, so
/// bins are rebuilt from scratch every frame and indices are moved into a bin
/// rather than copied across several.
use crate::clip::MIN_W_EPS;
use crate::prepared::PreparedTriangle;

/// Tile edge in pixels.
pub const TILE_SIZE: usize = 32;

/// Growable list of triangle indices owned by one tile. Rebuilt every frame,
/// never persisted.
#[derive(Default)]
pub struct TileBin {
    indices: Vec<u32>,
}

impl TileBin {
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Append a triangle index. On allocation failure the triangle is dropped
    /// for this frame instead of aborting; returns false when that happens.
    fn push(&mut self, index: u32) -> bool {
        if self.indices.try_reserve(1).is_err() {
            return false;
        }
        self.indices.push(index);
        true
    }
}

/// tiles_x x tiles_y grid of bins covering the framebuffer.
pub struct TileGrid {
    pub tiles_x: usize,
    pub tiles_y: usize,
    bins: Vec<TileBin>,
}

impl TileGrid {
    /// Bin every triangle into the tile under its screen-space centroid.
    ///
    /// Triangles with any |w| below the clip epsilon are left unbinned; they
    /// could not survive rasterization anyway. Centroids off-screen clamp to
    /// the nearest edge tile, so nothing inside the frustum is ever lost.
    pub fn bin(triangles: &[PreparedTriangle], width: usize, height: usize) -> Self {
        let tiles_x = width.div_ceil(TILE_SIZE).max(1);
        let tiles_y = height.div_ceil(TILE_SIZE).max(1);

        let mut bins = Vec::new();
        bins.resize_with(tiles_x * tiles_y, TileBin::default);

        let mut grid = Self {
            tiles_x,
            tiles_y,
            bins,
        };

        'triangles: for (index, triangle) in triangles.iter().enumerate() {
            let mut cx = 0.0f32;
            let mut cy = 0.0f32;
            for vertex in &triangle.vertices {
                let pos = vertex.position;
                if pos.w.abs() < MIN_W_EPS {
                    continue 'triangles;
                }
                let ndc_x = pos.x / pos.w;
                let ndc_y = pos.y / pos.w;
                cx += (ndc_x + 1.0) * 0.5 * width as f32;
                cy += (1.0 - ndc_y) * 0.5 * height as f32;
            }
            cx /= 3.0;
            cy /= 3.0;

            let tx = ((cx.max(0.0) as usize) / TILE_SIZE).min(tiles_x - 1);
            let ty = ((cy.max(0.0) as usize) / TILE_SIZE).min(tiles_y - 1);

            let bin = &mut grid.bins[ty * tiles_x + tx];
            if !bin.push(index as u32) {
                log::debug!("tile bin allocation failed, dropping triangle {index}");
            }
        }

        grid
    }

    #[inline]
    pub fn tile_count(&self) -> usize {
        self.bins.len()
    }

    /// Bin for a linear tile index (row-major).
    #[inline]
    pub fn bin_at(&self, tile_index: usize) -> &TileBin {
        &self.bins[tile_index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ClipVertex;
    use crate::prepared::TriangleAttributes;
    use glam::{Vec2, Vec3, Vec4};

    fn triangle_at(ndc_x: f32, ndc_y: f32) -> PreparedTriangle {
        // Small triangle centered on the given NDC point.
        let vertex = |dx: f32, dy: f32| ClipVertex {
            position: Vec4::new(ndc_x + dx, ndc_y + dy, 0.0, 1.0),
            world_position: Vec3::ZERO,
            normal: Vec3::Z,
            color: Vec4::ONE,
            uv: Vec2::ZERO,
        };
        PreparedTriangle::new(
            [vertex(0.0, 0.01), vertex(-0.01, -0.01), vertex(0.01, -0.01)],
            TriangleAttributes::default(),
        )
    }

    #[test]
    fn grid_dimensions_round_up() {
        let grid = TileGrid::bin(&[], 100, 64);
        assert_eq!(grid.tiles_x, 4); // ceil(100 / 32)
        assert_eq!(grid.tiles_y, 2);
        assert_eq!(grid.tile_count(), 8);
    }

    #[test]
    fn each_triangle_lands_in_exactly_one_bin() {
        let triangles = [
            triangle_at(-0.9, 0.9), // top-left of screen
            triangle_at(0.9, 0.9),  // top-right
            triangle_at(0.0, 0.0),  // center
            triangle_at(0.9, -0.9), // bottom-right
        ];
        let grid = TileGrid::bin(&triangles, 128, 128);

        let total: usize = (0..grid.tile_count())
            .map(|i| grid.bin_at(i).indices().len())
            .sum();
        assert_eq!(total, triangles.len());

        let mut seen = vec![false; triangles.len()];
        for i in 0..grid.tile_count() {
            for &idx in grid.bin_at(i).indices() {
                assert!(!seen[idx as usize], "triangle {idx} binned twice");
                seen[idx as usize] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn centroid_maps_to_the_expected_tile() {
        // NDC (0, 0) on a 128x128 buffer is pixel (64, 64): tile (2, 2).
        let grid = TileGrid::bin(&[triangle_at(0.0, 0.0)], 128, 128);
        assert_eq!(grid.bin_at(2 * grid.tiles_x + 2).indices(), &[0]);
    }

    #[test]
    fn off_screen_centroid_clamps_to_edge_tile() {
        let grid = TileGrid::bin(&[triangle_at(-3.0, 3.0)], 128, 128);
        // Clamped to tile (0, 0): negative screen x, negative screen y.
        assert_eq!(grid.bin_at(0).indices(), &[0]);
    }

    #[test]
    fn near_zero_w_triangle_is_left_unbinned() {
        let mut tri = triangle_at(0.0, 0.0);
        tri.vertices[1].position.w = 0.0;
        let grid = TileGrid::bin(&[tri], 128, 128);
        let total: usize = (0..grid.tile_count())
            .map(|i| grid.bin_at(i).indices().len())
            .sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn empty_grid_reports_empty_bins() {
        let grid = TileGrid::bin(&[], 100, 64);
        assert!((0..grid.tile_count()).all(|i| grid.bin_at(i).is_empty()));

        let grid = TileGrid::bin(&[triangle_at(0.0, 0.0)], 128, 128);
        assert!(!grid.bin_at(2 * grid.tiles_x + 2).is_empty());
    }
}
