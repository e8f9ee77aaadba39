/// Lighting and blending for the rasterizer fill loops.
/// Kept separate from the rasterizer so lighting models can evolve
/// independently of the rasterization pipeline.
use glam::{Vec3, Vec4};

use crate::framebuffer::unpack_rgba;

/// Maximum simultaneous lights carried on a prepared triangle.
pub const MAX_LIGHTS: usize = 8;

/// Constant ambient term for the multi-light path.
pub const AMBIENT: f32 = 0.2;

/// Distance attenuation model for point and spot lights.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Falloff {
    /// Linear fade from 1 at the light to 0 at `range`.
    RangeLinear,
    /// 1 / (1 + d^2), cut to 0 beyond `range`.
    InverseSquare,
}

#[derive(Copy, Clone, Debug)]
pub enum Light {
    Directional {
        /// Direction the light travels, normalized.
        direction: Vec3,
        color: Vec3,
    },
    Point {
        position: Vec3,
        color: Vec3,
        range: f32,
        falloff: Falloff,
    },
    Spot {
        position: Vec3,
        /// Direction the cone points, normalized.
        direction: Vec3,
        color: Vec3,
        range: f32,
        /// Cosine of the inner cone angle; full intensity inside.
        inner_cos: f32,
        /// Cosine of the outer cone angle; zero intensity outside.
        outer_cos: f32,
    },
}

/// Shading model selected per triangle by the preparer.
#[derive(Copy, Clone, Debug)]
pub enum Shading {
    /// Single directional light, one color for the whole triangle.
    /// Diffuse strength is 1 - ambient.
    Flat { light_dir: Vec3, ambient: f32 },
    /// Multiple lights; `smooth` interpolates the normal per pixel instead of
    /// averaging it once per triangle.
    Lit {
        lights: [Light; MAX_LIGHTS],
        light_count: usize,
        smooth: bool,
    },
}

impl Default for Shading {
    fn default() -> Self {
        // Slightly from +X/+Z and above, matching a viewport headlight.
        Shading::Flat {
            light_dir: Vec3::new(0.4, 1.0, 0.3).normalize(),
            ambient: AMBIENT,
        }
    }
}

impl Shading {
    /// Build a multi-light shading mode from a slice (truncated at MAX_LIGHTS).
    pub fn lit(lights: &[Light], smooth: bool) -> Self {
        let mut array = [Light::Directional {
            direction: Vec3::NEG_Y,
            color: Vec3::ZERO,
        }; MAX_LIGHTS];
        let light_count = lights.len().min(MAX_LIGHTS);
        array[..light_count].copy_from_slice(&lights[..light_count]);
        Shading::Lit {
            lights: array,
            light_count,
            smooth,
        }
    }
}

/// How a shaded fragment combines with the color already in the framebuffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Opaque,
    Alpha,
    Additive,
    Multiply,
}

/// Scalar intensity for the flat single-light model:
/// ambient + (1 - ambient) * max(N.L, 0), clamped to [0, 1].
#[inline]
pub fn flat_intensity(normal: Vec3, light_dir: Vec3, ambient: f32) -> f32 {
    let lambert = normal.dot(light_dir).max(0.0);
    (ambient + (1.0 - ambient) * lambert).clamp(0.0, 1.0)
}

/// Accumulated light color at a surface point for the multi-light model.
/// Adds the fixed ambient term, then each light's diffuse contribution.
pub fn evaluate_lights(lights: &[Light], normal: Vec3, world_position: Vec3) -> Vec3 {
    let mut total = Vec3::splat(AMBIENT);

    for light in lights {
        match *light {
            Light::Directional { direction, color } => {
                let lambert = normal.dot(-direction).max(0.0);
                total += color * lambert;
            }
            Light::Point {
                position,
                color,
                range,
                falloff,
            } => {
                let to_light = position - world_position;
                let distance = to_light.length();
                if distance >= range || distance <= f32::EPSILON {
                    continue;
                }
                let lambert = normal.dot(to_light / distance).max(0.0);
                total += color * lambert * attenuation(distance, range, falloff);
            }
            Light::Spot {
                position,
                direction,
                color,
                range,
                inner_cos,
                outer_cos,
            } => {
                let to_light = position - world_position;
                let distance = to_light.length();
                if distance >= range || distance <= f32::EPSILON {
                    continue;
                }
                let light_dir = to_light / distance;
                // Angle between the cone axis and the fragment direction.
                let cos_angle = (-light_dir).dot(direction);
                if cos_angle <= outer_cos {
                    continue;
                }
                let cone = if cos_angle >= inner_cos {
                    1.0
                } else {
                    (cos_angle - outer_cos) / (inner_cos - outer_cos)
                };
                let lambert = normal.dot(light_dir).max(0.0);
                total += color
                    * lambert
                    * cone
                    * attenuation(distance, range, Falloff::RangeLinear);
            }
        }
    }

    total.min(Vec3::ONE)
}

#[inline]
fn attenuation(distance: f32, range: f32, falloff: Falloff) -> f32 {
    match falloff {
        Falloff::RangeLinear => (1.0 - distance / range).clamp(0.0, 1.0),
        Falloff::InverseSquare => 1.0 / (1.0 + distance * distance),
    }
}

/// Combine a shaded source color with the destination pixel.
/// `src` is the lit RGB, `opacity` the triangle's opacity, `dst` the packed
/// color already in the framebuffer. Returns unpacked RGBA.
#[inline]
pub fn blend_color(mode: BlendMode, src: Vec3, opacity: f32, dst: u32) -> Vec4 {
    match mode {
        BlendMode::Opaque => src.extend(1.0),
        BlendMode::Alpha => {
            let dst = unpack_rgba(dst);
            let a = opacity.clamp(0.0, 1.0);
            (src * a + dst.truncate() * (1.0 - a)).extend(1.0)
        }
        BlendMode::Additive => {
            let dst = unpack_rgba(dst);
            (dst.truncate() + src * opacity).min(Vec3::ONE).extend(1.0)
        }
        BlendMode::Multiply => {
            let dst = unpack_rgba(dst);
            let factor = Vec3::ONE.lerp(src, opacity.clamp(0.0, 1.0));
            (dst.truncate() * factor).extend(1.0)
        }
    }
}
