/// Object-id allocation for picking.
///
/// Ids tag pixels in the framebuffer's object-id plane so mouse picking can
/// resolve what was hit without color matching. The allocator is an owned
/// value the host passes by reference wherever draws are prepared; there is
/// deliberately no process-wide counter.
#[derive(Debug, Clone)]
pub struct ObjectIdAllocator {
    next_id: u32,
}

impl ObjectIdAllocator {
    /// Id 0 is reserved for background / non-pickable pixels.
    pub const BACKGROUND: u32 = 0;

    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Hand out the next id. Saturates rather than wrapping back into the
    /// reserved background id.
    pub fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    /// Reset for a fresh scene; previously handed-out ids become stale.
    pub fn reset(&mut self) {
        self.next_id = 1;
    }
}

impl Default for ObjectIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
