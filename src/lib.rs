//! Software rendering pipeline - clip, bin, rasterize, shade
//! Tile-parallel with per-pixel depth and object-id writeback

pub mod clip;
pub mod framebuffer;
pub mod picking;
pub mod pool;
pub mod prepared;
pub mod rasterizer;
pub mod shading;
pub mod texture;
pub mod tiles;

pub use clip::{clip_polygon, ClipVertex, MAX_CLIP_VERTS};
pub use framebuffer::{pack_rgba, unpack_rgba, FrameView, Framebuffer};
pub use picking::ObjectIdAllocator;
pub use pool::ThreadPool;
pub use prepared::{PreparedTriangle, TriangleAttributes};
pub use rasterizer::{draw_line, render_frame_serial, Rasterizer, RenderStats};
pub use shading::{BlendMode, Falloff, Light, Shading, MAX_LIGHTS};
pub use texture::{Texture, TextureSet};
pub use tiles::{TileBin, TileGrid, TILE_SIZE};
