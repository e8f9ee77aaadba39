/// Nearest-neighbor texture sampling for the solid fill path.
/// No filtering or mipmapping; one sample per fragment.
use glam::Vec4;

use crate::framebuffer::unpack_rgba;

/// An RGBA8 texture sampled with wrapping nearest-neighbor lookup.
pub struct Texture {
    pub width: usize,
    pub height: usize,
    /// Packed RGBA8 texels, row-major, width * height entries.
    pub pixels: Vec<u32>,
}

impl Texture {
    /// Build a texture from packed texels. None when the texel count does not
    /// match the dimensions or either dimension is zero.
    pub fn new(width: usize, height: usize, pixels: Vec<u32>) -> Option<Self> {
        if width == 0 || height == 0 || pixels.len() != width.checked_mul(height)? {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Sample at (u, v) with repeat wrapping. UVs outside 0..1 tile.
    #[inline]
    pub fn sample_nearest(&self, u: f32, v: f32) -> Vec4 {
        let x = (u * self.width as f32).floor() as i64;
        let y = (v * self.height as f32).floor() as i64;
        let x = x.rem_euclid(self.width as i64) as usize;
        let y = y.rem_euclid(self.height as i64) as usize;
        unpack_rgba(self.pixels[y * self.width + x])
    }
}

/// Host-owned table of textures referenced by id from triangle attributes.
/// Shared immutably across tile workers during a dispatch.
#[derive(Default)]
pub struct TextureSet {
    pub textures: Vec<Texture>,
}

impl TextureSet {
    #[inline]
    pub fn get(&self, id: u32) -> Option<&Texture> {
        self.textures.get(id as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::pack_rgba;

    #[test]
    fn sample_picks_the_nearest_texel_and_wraps() {
        let red = pack_rgba(Vec4::new(1.0, 0.0, 0.0, 1.0));
        let blue = pack_rgba(Vec4::new(0.0, 0.0, 1.0, 1.0));
        let tex = Texture::new(2, 1, vec![red, blue]).unwrap();

        assert!(tex.sample_nearest(0.1, 0.5).x > 0.9);
        assert!(tex.sample_nearest(0.9, 0.5).z > 0.9);
        // Wrap: u = 1.1 lands back in the first texel.
        assert!(tex.sample_nearest(1.1, 0.5).x > 0.9);
        // Negative u wraps from the other end.
        assert!(tex.sample_nearest(-0.1, 0.5).z > 0.9);
    }

    #[test]
    fn mismatched_texel_count_is_rejected() {
        assert!(Texture::new(2, 2, vec![0; 3]).is_none());
        assert!(Texture::new(0, 4, Vec::new()).is_none());
        assert!(Texture::new(2, 2, vec![0; 4]).is_some());
    }
}
