/// Framebuffer for software rendering.
/// Stores color, depth and object-id information.
///
/// Memory layout:
/// - Hot metadata (width, height) stored first for bounds checking
/// - The three planes are separate Vecs with identical indexing so they can
///   be scanned independently (blit reads color only, picking reads depth/id)
use glam::Vec4;

/// Pack an RGBA color (floats in 0..1, truncated to bytes) into a u32.
/// Byte order is R, G, B, A in memory on little-endian targets.
#[inline]
pub fn pack_rgba(color: Vec4) -> u32 {
    let r = (color.x.clamp(0.0, 1.0) * 255.0) as u32;
    let g = (color.y.clamp(0.0, 1.0) * 255.0) as u32;
    let b = (color.z.clamp(0.0, 1.0) * 255.0) as u32;
    let a = (color.w.clamp(0.0, 1.0) * 255.0) as u32;
    r | (g << 8) | (b << 16) | (a << 24)
}

/// Unpack a u32 color back to RGBA floats in 0..1.
#[inline]
pub fn unpack_rgba(packed: u32) -> Vec4 {
    Vec4::new(
        (packed & 0xFF) as f32 / 255.0,
        ((packed >> 8) & 0xFF) as f32 / 255.0,
        ((packed >> 16) & 0xFF) as f32 / 255.0,
        ((packed >> 24) & 0xFF) as f32 / 255.0,
    )
}

/// Unsynchronized pointer view of the framebuffer planes, handed to tile
/// workers during the parallel phase.
///
/// Safety argument: the binner assigns every triangle to exactly one tile, so
/// no two workers rasterize the same triangle. Pixel writes from different
/// tiles therefore target the footprints of different triangles. A triangle
/// much larger than its 32x32 owning tile can still write pixels outside that
/// tile; two such triangles owned by two different tiles racing on the same
/// pixel is an accepted risk of centroid binning (see DESIGN.md).
#[derive(Copy, Clone)]
pub struct FrameView {
    pub width: usize,
    pub height: usize,
    color: *mut u32,
    depth: *mut f32,
    object_id: *mut u32,
}

unsafe impl Send for FrameView {}
unsafe impl Sync for FrameView {}

impl FrameView {
    /// Linear index of pixel (x, y). Caller checks bounds.
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Strict-less depth test. Always passes when `depth_test` is false.
    ///
    /// # Safety
    /// `index` must be within the framebuffer.
    #[inline]
    pub unsafe fn depth_passes(&self, index: usize, depth: f32, depth_test: bool) -> bool {
        !depth_test || depth < *self.depth.add(index)
    }

    /// Current color at a pixel, for blending.
    ///
    /// # Safety
    /// `index` must be within the framebuffer.
    #[inline]
    pub unsafe fn color_at(&self, index: usize) -> u32 {
        *self.color.add(index)
    }

    /// Write color, depth and object id together. The three planes are never
    /// left desynchronized for a pixel: this is the only write path.
    ///
    /// # Safety
    /// `index` must be within the framebuffer, and the caller must hold the
    /// one-owner-tile invariant described on [`FrameView`].
    #[inline]
    pub unsafe fn store(&mut self, index: usize, depth: f32, color: u32, object_id: u32) {
        *self.depth.add(index) = depth;
        *self.color.add(index) = color;
        *self.object_id.add(index) = object_id;
    }

    /// Bounds-checked depth-tested write for line drawing, where endpoints may
    /// land outside the framebuffer. Returns true if the pixel was written.
    #[inline]
    pub fn write_pixel_checked(
        &mut self,
        x: i32,
        y: i32,
        depth: f32,
        color: u32,
        object_id: u32,
        depth_test: bool,
    ) -> bool {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return false;
        }
        let index = self.index(x as usize, y as usize);
        unsafe {
            if self.depth_passes(index, depth, depth_test) {
                self.store(index, depth, color, object_id);
                true
            } else {
                false
            }
        }
    }
}

pub struct Framebuffer {
    // Hot data: used for every bounds check and index calculation
    pub width: usize,
    pub height: usize,
    /// Packed RGBA8 color plane (4 bytes per pixel).
    pub color: Vec<u32>,
    /// Depth plane in [0, 1]; 1.0 after clear.
    pub depth: Vec<f32>,
    /// Object-id plane for picking; 0 = background / non-pickable.
    pub object_id: Vec<u32>,
}

impl Framebuffer {
    /// Allocate all three planes. All-or-nothing: if any plane fails to
    /// allocate, everything reserved so far is dropped and None is returned.
    pub fn alloc(width: usize, height: usize) -> Option<Self> {
        let pixel_count = width.checked_mul(height)?;

        let mut color = Vec::new();
        let mut depth = Vec::new();
        let mut object_id = Vec::new();
        color.try_reserve_exact(pixel_count).ok()?;
        depth.try_reserve_exact(pixel_count).ok()?;
        object_id.try_reserve_exact(pixel_count).ok()?;

        color.resize(pixel_count, 0);
        depth.resize(pixel_count, 1.0);
        object_id.resize(pixel_count, 0);

        Some(Self {
            width,
            height,
            color,
            depth,
            object_id,
        })
    }

    /// Clear color to the given RGBA, depth to 1.0 and object ids to 0.
    pub fn clear(&mut self, color: Vec4) {
        let packed = pack_rgba(color);
        self.color.fill(packed);
        self.depth.fill(1.0);
        self.object_id.fill(0);
    }

    /// Resize all planes, re-clearing them to background state.
    pub fn resize(&mut self, width: usize, height: usize) {
        let pixel_count = width * height;
        self.width = width;
        self.height = height;
        self.color.clear();
        self.color.resize(pixel_count, 0);
        self.depth.clear();
        self.depth.resize(pixel_count, 1.0);
        self.object_id.clear();
        self.object_id.resize(pixel_count, 0);
    }

    /// Point query for mouse picking: (depth, object_id) at a pixel.
    /// Returns None outside the framebuffer.
    #[inline]
    pub fn pick(&self, x: usize, y: usize) -> Option<(f32, u32)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = y * self.width + x;
        Some((self.depth[index], self.object_id[index]))
    }

    /// Color plane as raw RGBA8 bytes for the host blit path.
    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.color)
    }

    /// Pointer view over the planes for the rasterization phase. The view
    /// carries no lifetime; callers must not resize or drop the framebuffer
    /// while a view is in use.
    pub fn view(&mut self) -> FrameView {
        FrameView {
            width: self.width,
            height: self.height,
            color: self.color.as_mut_ptr(),
            depth: self.depth.as_mut_ptr(),
            object_id: self.object_id.as_mut_ptr(),
        }
    }
}
