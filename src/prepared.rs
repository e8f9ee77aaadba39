/// The prepared-triangle boundary between the host preparer and this core.
///
/// A host renderer combines its vertex/index buffers with a model-view-
/// projection matrix and per-draw state to produce one PreparedTriangle per
/// triangle per draw call. Each prepared triangle is consumed exactly once,
/// by exactly one tile worker, and is immutable for the whole parallel phase;
/// that immutability is what licenses lock-free concurrent reads.
use glam::Vec3;

use crate::clip::ClipVertex;
use crate::shading::{BlendMode, Shading};

/// Per-triangle render state resolved by the preparer.
#[derive(Copy, Clone, Debug)]
pub struct TriangleAttributes {
    /// Written to the object-id plane for picking; 0 = non-pickable.
    pub object_id: u32,
    /// Draw the three edges with lines instead of filling.
    pub wireframe: bool,
    /// Strict-less depth test against the depth plane.
    pub depth_test: bool,
    /// Skip triangles whose screen-space winding faces away.
    pub cull_backfaces: bool,
    pub shading: Shading,
    /// Used by the Alpha/Additive/Multiply blend modes.
    pub opacity: f32,
    pub blend: BlendMode,
    /// Index into the dispatch's TextureSet; None renders untextured.
    pub texture: Option<u32>,
    /// Camera position in world space, for view-dependent shading.
    pub eye: Vec3,
}

impl Default for TriangleAttributes {
    fn default() -> Self {
        Self {
            object_id: 0,
            wireframe: false,
            depth_test: true,
            cull_backfaces: true,
            shading: Shading::default(),
            opacity: 1.0,
            blend: BlendMode::Opaque,
            texture: None,
            eye: Vec3::ZERO,
        }
    }
}

/// A fully transformed, attribute-resolved triangle ready for rasterization,
/// decoupled from its originating mesh buffers.
#[derive(Copy, Clone, Debug)]
pub struct PreparedTriangle {
    pub vertices: [ClipVertex; 3],
    pub attributes: TriangleAttributes,
}

impl PreparedTriangle {
    pub fn new(vertices: [ClipVertex; 3], attributes: TriangleAttributes) -> Self {
        Self {
            vertices,
            attributes,
        }
    }
}
