/// Half-space triangle rasterization with depth and object-id writeback.
/// Clips in homogeneous space, fan-triangulates, and fills with incremental
/// edge functions evaluated at pixel centers.
use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4};

use crate::clip::{clip_polygon, ClipVertex, MAX_CLIP_VERTS, MIN_W_EPS};
use crate::framebuffer::{pack_rgba, FrameView, Framebuffer};
use crate::prepared::{PreparedTriangle, TriangleAttributes};
use crate::shading::{blend_color, evaluate_lights, flat_intensity, Shading};
use crate::texture::TextureSet;
use crate::tiles::TileGrid;

/// Triangles whose doubled screen-space area falls below this are skipped;
/// an expected, frequent outcome of clipping, never an error.
const MIN_TRIANGLE_AREA: f32 = 1e-6;

/// Per-rasterizer counters for frame diagnostics. Owned by the rasterizer,
/// reset by the caller between frames as needed.
#[derive(Copy, Clone, Debug, Default)]
pub struct RenderStats {
    pub triangles_submitted: usize,
    pub triangles_clipped_out: usize,
    pub triangles_culled: usize,
    pub triangles_degenerate: usize,
    pub pixels_tested: usize,
    pub pixels_shaded: usize,
}

/// A vertex after perspective divide and screen mapping, with the clip-space
/// 1/w retained for perspective-correct attribute interpolation.
#[derive(Copy, Clone)]
struct ScreenVertex {
    xy: Vec2,
    /// Depth in [0, 1] after the (ndc_z + 1) * 0.5 mapping.
    z: f32,
    inv_w: f32,
}

pub struct Rasterizer {
    /// Shared texture table for this dispatch; empty when nothing is textured.
    pub textures: Arc<TextureSet>,
    pub stats: RenderStats,
}

impl Rasterizer {
    pub fn new() -> Self {
        Self::with_textures(Arc::new(TextureSet::default()))
    }

    /// Create a rasterizer with a specific texture table. Used when sharing
    /// one table across per-tile worker rasterizers.
    pub fn with_textures(textures: Arc<TextureSet>) -> Self {
        Self {
            textures,
            stats: RenderStats::default(),
        }
    }

    /// Rasterize one prepared triangle into the framebuffer view.
    ///
    /// Clips against the frustum, fan-triangulates the surviving polygon and
    /// fills (or wire-draws) each sub-triangle. Fewer than 3 surviving
    /// vertices is a no-op.
    pub fn rasterize_triangle(&mut self, triangle: &PreparedTriangle, view: &mut FrameView) {
        self.stats.triangles_submitted += 1;

        let mut clipped = [ClipVertex::ZERO; MAX_CLIP_VERTS];
        let count = clip_polygon(&triangle.vertices, &mut clipped);
        if count < 3 {
            self.stats.triangles_clipped_out += 1;
            return;
        }

        let attributes = &triangle.attributes;

        if attributes.wireframe {
            self.draw_polygon_outline(&clipped[..count], attributes, view);
            return;
        }

        // Fan triangulation: (0, i, i+1).
        for i in 1..count - 1 {
            self.fill_sub_triangle(
                &clipped[0],
                &clipped[i],
                &clipped[i + 1],
                attributes,
                view,
            );
        }
    }

    /// Map a clip vertex to screen space. None when |w| is too small to
    /// divide meaningfully.
    fn to_screen(vertex: &ClipVertex, width: f32, height: f32) -> Option<ScreenVertex> {
        let w = vertex.position.w;
        if w.abs() < MIN_W_EPS {
            return None;
        }
        let ndc = vertex.position / w;
        Some(ScreenVertex {
            xy: ndc_to_screen(Vec2::new(ndc.x, ndc.y), width, height),
            z: (ndc.z + 1.0) * 0.5,
            inv_w: 1.0 / w,
        })
    }

    fn fill_sub_triangle(
        &mut self,
        v0: &ClipVertex,
        v1: &ClipVertex,
        v2: &ClipVertex,
        attributes: &TriangleAttributes,
        view: &mut FrameView,
    ) {
        let fb_width = view.width as f32;
        let fb_height = view.height as f32;

        let (s0, s1, s2) = match (
            Self::to_screen(v0, fb_width, fb_height),
            Self::to_screen(v1, fb_width, fb_height),
            Self::to_screen(v2, fb_width, fb_height),
        ) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => {
                self.stats.triangles_degenerate += 1;
                return;
            }
        };

        // Doubled signed area in screen space. A front-facing triangle
        // (counter-clockwise in NDC) winds clockwise after the Y-flip, which
        // this edge function reports as positive area; non-positive means
        // back-facing or edge-on.
        let area = edge_function(s0.xy, s1.xy, s2.xy);
        if attributes.cull_backfaces && area <= 0.0 {
            self.stats.triangles_culled += 1;
            return;
        }
        if area.abs() < MIN_TRIANGLE_AREA {
            self.stats.triangles_degenerate += 1;
            return;
        }

        // Dividing each edge function by the signed area normalizes both
        // windings at once: inside is "all barycentrics >= 0" either way.
        let inv_area = 1.0 / area;

        // Bounding box clamped to the framebuffer. Deliberately not clamped
        // to the owning tile; see the FrameView safety notes.
        let min_x = (s0.xy.x.min(s1.xy.x).min(s2.xy.x).floor() as i32).max(0);
        let max_x = (s0.xy.x.max(s1.xy.x).max(s2.xy.x).ceil() as i32).min(view.width as i32 - 1);
        let min_y = (s0.xy.y.min(s1.xy.y).min(s2.xy.y).floor() as i32).max(0);
        let max_y = (s0.xy.y.max(s1.xy.y).max(s2.xy.y).ceil() as i32).min(view.height as i32 - 1);
        if min_x > max_x || min_y > max_y {
            return;
        }

        // Shading setup. Flat modes resolve to a single RGB for the whole
        // sub-triangle; smooth mode interpolates per pixel below.
        let face_normal = ((v0.normal + v1.normal + v2.normal) / 3.0).normalize_or_zero();
        let average_color = (v0.color + v1.color + v2.color) / 3.0;
        let centroid_world = (v0.world_position + v1.world_position + v2.world_position) / 3.0;

        let (flat_rgb, smooth) = match attributes.shading {
            Shading::Flat { light_dir, ambient } => (
                average_color.truncate() * flat_intensity(face_normal, light_dir, ambient),
                false,
            ),
            Shading::Lit {
                ref lights,
                light_count,
                smooth,
            } => {
                if smooth {
                    (Vec3::ZERO, true)
                } else {
                    let lit = evaluate_lights(&lights[..light_count], face_normal, centroid_world);
                    (average_color.truncate() * lit, false)
                }
            }
        };

        let texture = attributes
            .texture
            .and_then(|id| self.textures.get(id));
        let needs_attributes = smooth || texture.is_some();

        // Perspective-correct attribute setup: everything interpolated across
        // the surface is pre-divided by w.
        let uv0 = v0.uv * s0.inv_w;
        let uv1 = v1.uv * s1.inv_w;
        let uv2 = v2.uv * s2.inv_w;
        let n0 = v0.normal * s0.inv_w;
        let n1 = v1.normal * s1.inv_w;
        let n2 = v2.normal * s2.inv_w;
        let c0 = v0.color * s0.inv_w;
        let c1 = v1.color * s1.inv_w;
        let c2 = v2.color * s2.inv_w;
        let p0 = v0.world_position * s0.inv_w;
        let p1 = v1.world_position * s1.inv_w;
        let p2 = v2.world_position * s2.inv_w;

        // Incremental edge functions, evaluated at pixel centers.
        let edge0_dx = s2.xy.y - s1.xy.y;
        let edge0_dy = s1.xy.x - s2.xy.x;
        let edge1_dx = s0.xy.y - s2.xy.y;
        let edge1_dy = s2.xy.x - s0.xy.x;
        let edge2_dx = s1.xy.y - s0.xy.y;
        let edge2_dy = s0.xy.x - s1.xy.x;

        let start = Vec2::new(min_x as f32 + 0.5, min_y as f32 + 0.5);
        let mut w0_row = edge_function(s1.xy, s2.xy, start);
        let mut w1_row = edge_function(s2.xy, s0.xy, start);
        let mut w2_row = edge_function(s0.xy, s1.xy, start);

        let lights = match attributes.shading {
            Shading::Lit {
                ref lights,
                light_count,
                ..
            } => &lights[..light_count],
            Shading::Flat { .. } => &[][..],
        };

        for y in min_y..=max_y {
            let mut w0 = w0_row;
            let mut w1 = w1_row;
            let mut w2 = w2_row;

            for x in min_x..=max_x {
                let bw0 = w0 * inv_area;
                let bw1 = w1 * inv_area;
                let bw2 = w2 * inv_area;

                if bw0 >= 0.0 && bw1 >= 0.0 && bw2 >= 0.0 {
                    self.stats.pixels_tested += 1;

                    let depth = bw0 * s0.z + bw1 * s1.z + bw2 * s2.z;
                    let index = view.index(x as usize, y as usize);

                    // Safety: x/y are clamped to the framebuffer above;
                    // exclusivity comes from the one-owner-tile invariant.
                    unsafe {
                        if view.depth_passes(index, depth, attributes.depth_test) {
                            let mut rgb = flat_rgb;

                            if needs_attributes {
                                let inv_w =
                                    bw0 * s0.inv_w + bw1 * s1.inv_w + bw2 * s2.inv_w;
                                let correct = 1.0 / inv_w;

                                if smooth {
                                    let normal = ((n0 * bw0 + n1 * bw1 + n2 * bw2)
                                        * correct)
                                        .normalize_or_zero();
                                    let world =
                                        (p0 * bw0 + p1 * bw1 + p2 * bw2) * correct;
                                    // Two-sided shading: flip normals that
                                    // face away from the eye.
                                    let normal = if normal.dot(attributes.eye - world) < 0.0 {
                                        -normal
                                    } else {
                                        normal
                                    };
                                    let color =
                                        (c0 * bw0 + c1 * bw1 + c2 * bw2) * correct;
                                    rgb = color.truncate()
                                        * evaluate_lights(lights, normal, world);
                                }

                                if let Some(texture) = texture {
                                    let uv = (uv0 * bw0 + uv1 * bw1 + uv2 * bw2) * correct;
                                    rgb *= texture.sample_nearest(uv.x, uv.y).truncate();
                                }
                            }

                            let blended = blend_color(
                                attributes.blend,
                                rgb,
                                attributes.opacity,
                                view.color_at(index),
                            );
                            view.store(index, depth, pack_rgba(blended), attributes.object_id);
                            self.stats.pixels_shaded += 1;
                        }
                    }
                }

                w0 += edge0_dx;
                w1 += edge1_dx;
                w2 += edge2_dx;
            }

            w0_row += edge0_dy;
            w1_row += edge1_dy;
            w2_row += edge2_dy;
        }
    }

    /// Wireframe mode: draw the clipped polygon's outline with depth-tested
    /// Bresenham lines. Interior pixels are never touched. Wireframe always
    /// shades flat; per-pixel lighting on 1px edges is not worth the cost.
    fn draw_polygon_outline(
        &mut self,
        polygon: &[ClipVertex],
        attributes: &TriangleAttributes,
        view: &mut FrameView,
    ) {
        let fb_width = view.width as f32;
        let fb_height = view.height as f32;

        let mut screen = [ScreenVertex {
            xy: Vec2::ZERO,
            z: 0.0,
            inv_w: 0.0,
        }; MAX_CLIP_VERTS];

        for (i, vertex) in polygon.iter().enumerate() {
            match Self::to_screen(vertex, fb_width, fb_height) {
                Some(s) => screen[i] = s,
                None => {
                    self.stats.triangles_degenerate += 1;
                    return;
                }
            }
        }

        // Shoelace over the mapped polygon for backface culling; same sign
        // convention as the solid path.
        if attributes.cull_backfaces {
            let mut area = 0.0f32;
            for i in 0..polygon.len() {
                let a = screen[i].xy;
                let b = screen[(i + 1) % polygon.len()].xy;
                area += (b.x - a.x) * (b.y + a.y);
            }
            // Same sign convention as edge_function: non-positive means
            // back-facing after the Y-flip.
            if area <= 0.0 {
                self.stats.triangles_culled += 1;
                return;
            }
        }

        let face_normal = polygon
            .iter()
            .fold(Vec3::ZERO, |acc, v| acc + v.normal)
            .normalize_or_zero();
        let average_color = polygon
            .iter()
            .fold(Vec4::ZERO, |acc, v| acc + v.color)
            / polygon.len() as f32;
        let centroid_world = polygon
            .iter()
            .fold(Vec3::ZERO, |acc, v| acc + v.world_position)
            / polygon.len() as f32;

        let rgb = match attributes.shading {
            Shading::Flat { light_dir, ambient } => {
                average_color.truncate() * flat_intensity(face_normal, light_dir, ambient)
            }
            Shading::Lit {
                ref lights,
                light_count,
                ..
            } => {
                average_color.truncate()
                    * evaluate_lights(&lights[..light_count], face_normal, centroid_world)
            }
        };
        let color = pack_rgba(rgb.extend(1.0));

        for i in 0..polygon.len() {
            let a = screen[i];
            let b = screen[(i + 1) % polygon.len()];
            draw_line(
                view,
                a.xy.x as i32,
                a.xy.y as i32,
                a.z,
                b.xy.x as i32,
                b.xy.y as i32,
                b.z,
                color,
                attributes.object_id,
                attributes.depth_test,
            );
        }
    }
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Integer Bresenham line with z interpolated linearly by step fraction.
/// Writes color, depth and object id together under the same strict-less
/// depth test as the solid fill; out-of-bounds pixels are skipped.
#[allow(clippy::too_many_arguments)]
pub fn draw_line(
    view: &mut FrameView,
    x0: i32,
    y0: i32,
    z0: f32,
    x1: i32,
    y1: i32,
    z1: f32,
    color: u32,
    object_id: u32,
    depth_test: bool,
) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let steps = dx.max(-dy).max(1) as f32;
    let mut x = x0;
    let mut y = y0;
    let mut step = 0u32;

    loop {
        let t = step as f32 / steps;
        let z = z0 + (z1 - z0) * t;
        view.write_pixel_checked(x, y, z, color, object_id, depth_test);

        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
        step += 1;
    }
}

/// Render a frame on the calling thread only: same binning and same tile
/// iteration as the pool path, so output bytes match the parallel renderer.
/// This is the fallback when thread-pool creation fails.
pub fn render_frame_serial(
    rasterizer: &mut Rasterizer,
    triangles: &[PreparedTriangle],
    framebuffer: &mut Framebuffer,
) {
    let grid = TileGrid::bin(triangles, framebuffer.width, framebuffer.height);
    let mut view = framebuffer.view();
    for tile in 0..grid.tile_count() {
        let bin = grid.bin_at(tile);
        if bin.is_empty() {
            continue;
        }
        for &index in bin.indices() {
            rasterizer.rasterize_triangle(&triangles[index as usize], &mut view);
        }
    }
}

/// Map NDC to screen space with a Y-flip for the top-left pixel origin.
#[inline]
pub fn ndc_to_screen(ndc: Vec2, width: f32, height: f32) -> Vec2 {
    Vec2::new((ndc.x + 1.0) * 0.5 * width, (1.0 - ndc.y) * 0.5 * height)
}

/// Edge function: doubled signed area of (a, b, c); the sign tells which side
/// of the directed edge a->b the point c lies on.
#[inline]
pub fn edge_function(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (c.x - a.x) * (b.y - a.y) - (c.y - a.y) * (b.x - a.x)
}
