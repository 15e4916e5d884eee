//! Monochrome frame buffer with XOR sprite compositing.
use crate::constants::*;

/// 64x32 one-bit-per-pixel screen buffer.
///
/// Mutated only by [`clear`](FrameBuffer::clear) and
/// [`draw`](FrameBuffer::draw). Any mutation raises the dirty flag,
/// which the renderer clears once it has redrawn.
pub struct FrameBuffer {
    pixels: Box<[bool; DISPLAY_BUFFER_SIZE]>,
    dirty: bool,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self {
            pixels: Box::new([false; DISPLAY_BUFFER_SIZE]),
            dirty: false,
        }
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Default::default()
    }

    /// Set all pixels to off.
    pub fn clear(&mut self) {
        self.pixels.fill(false);
        self.dirty = true;
    }

    /// XOR a sprite into the buffer at the given coordinates, one byte per
    /// 8-pixel row. Sprites drawn past an edge wrap to the other side.
    ///
    /// Returns the collision flag: true when any lit pixel was erased,
    /// sticky across the whole sprite.
    pub fn draw(&mut self, x0: u8, y0: u8, sprite: &[u8]) -> bool {
        let mut erased = false;

        for (r, row) in sprite.iter().enumerate() {
            let y = (y0 as usize + r) & DISPLAY_HEIGHT_MASK;
            for c in 0..8 {
                let x = (x0 as usize + c) & DISPLAY_WIDTH_MASK;
                let index = x + y * DISPLAY_WIDTH;

                let old_px = self.pixels[index];
                let new_px = (row >> (7 - c)) & 1 != 0;

                // XOR erases a pixel when the old and new values are both 1.
                erased |= old_px && new_px;
                self.pixels[index] = old_px ^ new_px;
            }
        }

        self.dirty = true;
        erased
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[(x & DISPLAY_WIDTH_MASK) + (y & DISPLAY_HEIGHT_MASK) * DISPLAY_WIDTH]
    }

    /// Iterate the buffer one row of 64 pixels at a time, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.pixels.chunks(DISPLAY_WIDTH)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Called by the renderer once the buffer has been redrawn.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
