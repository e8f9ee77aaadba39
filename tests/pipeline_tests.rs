use glam::{Mat4, Vec2, Vec3, Vec4};
use softpipe::*;

/// Helper: build a prepared triangle from world-space vertices and a
/// view-projection matrix, the way a scene preparer would.
fn prepare_triangle(
    world: [Vec3; 3],
    view_proj: &Mat4,
    attributes: TriangleAttributes,
) -> PreparedTriangle {
    let vertices = world.map(|p| ClipVertex {
        position: *view_proj * p.extend(1.0),
        world_position: p,
        normal: Vec3::Z,
        color: Vec4::ONE,
        uv: Vec2::ZERO,
    });
    PreparedTriangle::new(vertices, attributes)
}

/// Helper: camera at (0, 0, 3) looking at the origin, GL-style clip volume
/// so NDC z lands in [-1, 1] and depth in [0, 1].
fn default_view_proj(aspect: f32) -> Mat4 {
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y);
    let proj = Mat4::perspective_rh_gl(60.0_f32.to_radians(), aspect, 0.1, 100.0);
    proj * view
}

fn unit_triangle() -> [Vec3; 3] {
    [
        Vec3::new(0.0, 0.5, 0.0),
        Vec3::new(-0.5, -0.5, 0.0),
        Vec3::new(0.5, -0.5, 0.0),
    ]
}

#[test]
fn rendered_triangle_is_pickable_at_center_but_not_corner() {
    let view_proj = default_view_proj(1.0);
    let triangle = prepare_triangle(
        unit_triangle(),
        &view_proj,
        TriangleAttributes {
            object_id: 1,
            ..Default::default()
        },
    );

    let mut fb = Framebuffer::alloc(128, 128).unwrap();
    let mut rasterizer = Rasterizer::new();
    render_frame_serial(&mut rasterizer, &[triangle], &mut fb);

    let (depth, id) = fb.pick(64, 64).unwrap();
    assert_eq!(id, 1);
    assert!(depth < 1.0);
    assert_eq!(fb.pick(0, 0).unwrap(), (1.0, 0));
}

#[test]
fn depth_ordering_holds_regardless_of_submission_order() {
    let view_proj = default_view_proj(1.0);
    let near = prepare_triangle(
        [
            Vec3::new(0.0, 0.5, 1.0),
            Vec3::new(-0.5, -0.5, 1.0),
            Vec3::new(0.5, -0.5, 1.0),
        ],
        &view_proj,
        TriangleAttributes {
            object_id: 1,
            ..Default::default()
        },
    );
    let far = prepare_triangle(
        unit_triangle(),
        &view_proj,
        TriangleAttributes {
            object_id: 2,
            ..Default::default()
        },
    );

    for order in [[near, far], [far, near]] {
        let mut fb = Framebuffer::alloc(128, 128).unwrap();
        let mut rasterizer = Rasterizer::new();
        render_frame_serial(&mut rasterizer, &order, &mut fb);
        assert_eq!(fb.pick(64, 64).unwrap().1, 1, "nearer surface must win");
    }
}

#[test]
fn wireframe_leaves_the_interior_untouched() {
    let view_proj = default_view_proj(1.0);
    let mut attributes = TriangleAttributes {
        object_id: 5,
        ..Default::default()
    };
    attributes.wireframe = true;
    let triangle = prepare_triangle(unit_triangle(), &view_proj, attributes);

    let mut fb = Framebuffer::alloc(128, 128).unwrap();
    let mut rasterizer = Rasterizer::new();
    render_frame_serial(&mut rasterizer, &[triangle], &mut fb);

    // The centroid sits well inside the triangle; in wireframe mode it
    // must stay background.
    assert_eq!(fb.pick(64, 64).unwrap(), (1.0, 0));

    // But some edge pixels were written with the triangle's id.
    let edge_pixels = fb
        .object_id
        .iter()
        .filter(|&&id| id == 5)
        .count();
    assert!(edge_pixels > 0);
}

#[test]
fn solid_and_wireframe_footprints_agree_on_the_silhouette() {
    let view_proj = default_view_proj(1.0);
    let solid = prepare_triangle(
        unit_triangle(),
        &view_proj,
        TriangleAttributes {
            object_id: 1,
            ..Default::default()
        },
    );
    let mut wire_attributes = TriangleAttributes {
        object_id: 1,
        ..Default::default()
    };
    wire_attributes.wireframe = true;
    let wire = prepare_triangle(unit_triangle(), &view_proj, wire_attributes);

    let mut solid_fb = Framebuffer::alloc(128, 128).unwrap();
    let mut wire_fb = Framebuffer::alloc(128, 128).unwrap();
    let mut rasterizer = Rasterizer::new();
    render_frame_serial(&mut rasterizer, &[solid], &mut solid_fb);
    render_frame_serial(&mut rasterizer, &[wire], &mut wire_fb);

    // Every wireframe pixel lies within one pixel of the solid footprint;
    // rounding at the vertices keeps this from being exact containment.
    let width = wire_fb.width as i32;
    let height = wire_fb.height as i32;
    for y in 0..height {
        for x in 0..width {
            if wire_fb.object_id[(y * width + x) as usize] == 0 {
                continue;
            }
            let mut near_solid = false;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let nx = (x + dx).clamp(0, width - 1);
                    let ny = (y + dy).clamp(0, height - 1);
                    if solid_fb.object_id[(ny * width + nx) as usize] == 1 {
                        near_solid = true;
                    }
                }
            }
            assert!(near_solid, "wire pixel ({x}, {y}) far from solid footprint");
        }
    }
}

#[test]
fn triangle_crossing_the_near_plane_still_renders_its_visible_part() {
    let view_proj = default_view_proj(1.0);
    // One vertex behind the camera; clipping must salvage the rest.
    let triangle = prepare_triangle(
        [
            Vec3::new(0.0, 0.5, 4.0),
            Vec3::new(-2.0, -0.5, 0.0),
            Vec3::new(2.0, -0.5, 0.0),
        ],
        &view_proj,
        TriangleAttributes {
            object_id: 3,
            cull_backfaces: false,
            ..Default::default()
        },
    );

    let mut fb = Framebuffer::alloc(128, 128).unwrap();
    let mut rasterizer = Rasterizer::new();
    render_frame_serial(&mut rasterizer, &[triangle], &mut fb);

    assert!(rasterizer.stats.pixels_shaded > 0);
    assert_eq!(rasterizer.stats.triangles_clipped_out, 0);
}

#[test]
fn fully_offscreen_triangle_writes_nothing() {
    let view_proj = default_view_proj(1.0);
    let triangle = prepare_triangle(
        [
            Vec3::new(50.0, 0.5, 0.0),
            Vec3::new(49.5, -0.5, 0.0),
            Vec3::new(50.5, -0.5, 0.0),
        ],
        &view_proj,
        TriangleAttributes::default(),
    );

    let mut fb = Framebuffer::alloc(128, 128).unwrap();
    let mut rasterizer = Rasterizer::new();
    render_frame_serial(&mut rasterizer, &[triangle], &mut fb);

    assert_eq!(rasterizer.stats.triangles_clipped_out, 1);
    assert!(fb.object_id.iter().all(|&id| id == 0));
}

#[test]
fn pool_and_serial_render_identical_frames() {
    let view_proj = default_view_proj(1.0);
    let mut allocator = ObjectIdAllocator::new();

    // A grid of triangles spanning many tiles.
    let mut triangles = Vec::new();
    for y in -3..=3 {
        for x in -3..=3 {
            let center = Vec3::new(x as f32 * 0.28, y as f32 * 0.28, 0.0);
            triangles.push(prepare_triangle(
                [
                    center + Vec3::new(0.0, 0.12, 0.0),
                    center + Vec3::new(-0.12, -0.12, 0.0),
                    center + Vec3::new(0.12, -0.12, 0.0),
                ],
                &view_proj,
                TriangleAttributes {
                    object_id: allocator.allocate(),
                    ..Default::default()
                },
            ));
        }
    }

    let mut serial_fb = Framebuffer::alloc(320, 240).unwrap();
    let mut rasterizer = Rasterizer::new();
    render_frame_serial(&mut rasterizer, &triangles, &mut serial_fb);

    let mut pool = ThreadPool::create(4).expect("pool creation");
    let mut pool_fb = Framebuffer::alloc(320, 240).unwrap();
    pool.dispatch(&triangles, &mut pool_fb);

    assert_eq!(serial_fb.color, pool_fb.color);
    assert_eq!(serial_fb.depth, pool_fb.depth);
    assert_eq!(serial_fb.object_id, pool_fb.object_id);
}

#[test]
fn lit_shading_darkens_a_surface_facing_away_from_the_light() {
    let view_proj = default_view_proj(1.0);
    let lights = [Light::Directional {
        direction: Vec3::new(0.0, 0.0, -1.0).normalize(),
        color: Vec3::ONE,
    }];

    let mut toward = prepare_triangle(
        unit_triangle(),
        &view_proj,
        TriangleAttributes {
            shading: Shading::lit(&lights, false),
            cull_backfaces: false,
            ..Default::default()
        },
    );
    let mut away = toward;
    for v in &mut away.vertices {
        v.normal = -Vec3::Z;
    }
    // Keep the lit case's normals explicit too.
    for v in &mut toward.vertices {
        v.normal = Vec3::Z;
    }

    let brightness = |tri: PreparedTriangle| {
        let mut fb = Framebuffer::alloc(64, 64).unwrap();
        let mut rasterizer = Rasterizer::new();
        render_frame_serial(&mut rasterizer, &[tri], &mut fb);
        let color = unpack_rgba(fb.color[32 * 64 + 32]);
        color.x + color.y + color.z
    };

    assert!(brightness(toward) > brightness(away));
}

#[test]
fn object_id_allocator_never_hands_out_the_background_id() {
    let mut allocator = ObjectIdAllocator::new();
    assert_eq!(allocator.allocate(), 1);
    assert_eq!(allocator.allocate(), 2);
    allocator.reset();
    assert_eq!(allocator.allocate(), 1);
    assert_ne!(ObjectIdAllocator::BACKGROUND, 1);
}
