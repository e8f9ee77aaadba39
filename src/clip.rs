/// Sutherland-Hodgman polygon clipping against the six canonical frustum
/// planes, performed in homogeneous clip space before the perspective divide
/// so that geometry crossing w = 0 is handled correctly.
use glam::{Vec2, Vec3, Vec4};

/// Clipping a triangle against 6 planes can add at most one vertex per plane,
/// so 9 would suffice; 24 leaves headroom for arbitrary convex input polygons.
pub const MAX_CLIP_VERTS: usize = 24;

/// Triangles whose |w| falls below this after clipping are dropped rather
/// than divided; the division would be numerically meaningless.
pub const MIN_W_EPS: f32 = 0.001;

/// A vertex in homogeneous clip space with the attributes that survive
/// through clipping and into rasterization.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClipVertex {
    /// Position in clip space (x, y, z, w before the divide).
    pub position: Vec4,
    /// World-space position, needed by point and spot lights.
    pub world_position: Vec3,
    /// World-space normal.
    pub normal: Vec3,
    /// Vertex color, RGBA in 0..1.
    pub color: Vec4,
    /// Texture coordinate; Vec2::ZERO when the triangle is untextured.
    pub uv: Vec2,
}

impl ClipVertex {
    pub const ZERO: ClipVertex = ClipVertex {
        position: Vec4::ZERO,
        world_position: Vec3::ZERO,
        normal: Vec3::ZERO,
        color: Vec4::ZERO,
        uv: Vec2::ZERO,
    };

    /// Linear interpolation of position and every attribute.
    #[inline]
    fn lerp(a: &ClipVertex, b: &ClipVertex, t: f32) -> ClipVertex {
        ClipVertex {
            position: a.position + (b.position - a.position) * t,
            world_position: a.world_position + (b.world_position - a.world_position) * t,
            normal: a.normal + (b.normal - a.normal) * t,
            color: a.color + (b.color - a.color) * t,
            uv: a.uv + (b.uv - a.uv) * t,
        }
    }
}

/// The six frustum planes in clip space. A point is inside a plane when
/// dot(plane, position) >= 0:
///   x + w >= 0 (left), -x + w >= 0 (right)
///   y + w >= 0 (bottom), -y + w >= 0 (top)
///   z + w >= 0 (near), -z + w >= 0 (far)
const FRUSTUM_PLANES: [Vec4; 6] = [
    Vec4::new(1.0, 0.0, 0.0, 1.0),
    Vec4::new(-1.0, 0.0, 0.0, 1.0),
    Vec4::new(0.0, 1.0, 0.0, 1.0),
    Vec4::new(0.0, -1.0, 0.0, 1.0),
    Vec4::new(0.0, 0.0, 1.0, 1.0),
    Vec4::new(0.0, 0.0, -1.0, 1.0),
];

/// Clip a convex polygon against the view frustum.
///
/// Writes the surviving polygon into `output` and returns its vertex count
/// (0 when fully outside, capped at MAX_CLIP_VERTS). A polygon fully inside
/// the frustum passes through unchanged, in its original order.
pub fn clip_polygon(input: &[ClipVertex], output: &mut [ClipVertex; MAX_CLIP_VERTS]) -> usize {
    if input.is_empty() {
        return 0;
    }

    // Ping-pong between two scratch buffers across the six planes.
    let mut buf_a = [ClipVertex::ZERO; MAX_CLIP_VERTS];
    let mut buf_b = [ClipVertex::ZERO; MAX_CLIP_VERTS];

    let mut len = input.len().min(MAX_CLIP_VERTS);
    buf_a[..len].copy_from_slice(&input[..len]);

    let (mut src, mut dst) = (&mut buf_a, &mut buf_b);
    for plane in &FRUSTUM_PLANES {
        len = clip_against_plane(&src[..len], dst, *plane);
        if len == 0 {
            return 0;
        }
        std::mem::swap(&mut src, &mut dst);
    }

    output[..len].copy_from_slice(&src[..len]);
    len
}

/// Clip a polygon against a single plane. Walks the edges with `prev` starting
/// at the last vertex; inside vertices are kept and crossing edges insert an
/// interpolated vertex at t = d_prev / (d_prev - d_curr).
fn clip_against_plane(
    input: &[ClipVertex],
    output: &mut [ClipVertex; MAX_CLIP_VERTS],
    plane: Vec4,
) -> usize {
    let mut out_len = 0usize;

    let mut prev = input[input.len() - 1];
    let mut prev_dist = plane.dot(prev.position);

    for &curr in input {
        let curr_dist = plane.dot(curr.position);

        match (prev_dist >= 0.0, curr_dist >= 0.0) {
            (true, true) => {
                push(output, &mut out_len, curr);
            }
            (true, false) => {
                let t = prev_dist / (prev_dist - curr_dist);
                push(output, &mut out_len, ClipVertex::lerp(&prev, &curr, t));
            }
            (false, true) => {
                let t = prev_dist / (prev_dist - curr_dist);
                push(output, &mut out_len, ClipVertex::lerp(&prev, &curr, t));
                push(output, &mut out_len, curr);
            }
            (false, false) => {}
        }

        prev = curr;
        prev_dist = curr_dist;
    }

    out_len
}

#[inline]
fn push(output: &mut [ClipVertex; MAX_CLIP_VERTS], len: &mut usize, vertex: ClipVertex) {
    if *len < MAX_CLIP_VERTS {
        output[*len] = vertex;
        *len += 1;
    }
}
