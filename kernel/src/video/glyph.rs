//! Pre-rendered glyph cache.
//!
//! Each byte value owns a fixed 9x16 slice of one pool that is reserved when
//! the cache is built, so a fill never allocates. An entry remembers the
//! colours it was rendered with and is rendered again when asked for other
//! ones.

use alloc::boxed::Box;
use alloc::vec;

use super::font::{FontRom, GLYPH_ROWS};

pub const GLYPH_WIDTH: usize = 9;
pub const GLYPH_HEIGHT: usize = GLYPH_ROWS;
pub const GLYPH_PIXELS: usize = GLYPH_WIDTH * GLYPH_HEIGHT;
pub const GLYPH_COUNT: usize = 256;

#[derive(Debug, Clone, Copy, Default)]
pub struct GlyphEntry {
    pub valid: bool,
    pub fg: u32,
    pub bg: u32,
    pub timestamp: u32,
}

pub struct GlyphCache {
    entries: [GlyphEntry; GLYPH_COUNT],
    pool: Box<[u32]>,
    timestamp: u32,
}

impl GlyphCache {
    pub fn new() -> Self {
        Self {
            entries: [GlyphEntry::default(); GLYPH_COUNT],
            pool: vec![0u32; GLYPH_COUNT * GLYPH_PIXELS].into_boxed_slice(),
            timestamp: 0,
        }
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn entry(&self, ch: u8) -> &GlyphEntry {
        &self.entries[ch as usize]
    }

    /// Bitmap for `ch` in `fg` on `bg`, rendering it first on a miss.
    pub fn lookup(&mut self, font: &FontRom, ch: u8, fg: u32, bg: u32) -> &[u32] {
        let index = ch as usize;
        self.timestamp = self.timestamp.wrapping_add(1);
        let bitmap = &mut self.pool[index * GLYPH_PIXELS..(index + 1) * GLYPH_PIXELS];
        let entry = &mut self.entries[index];
        if !(entry.valid && entry.fg == fg && entry.bg == bg) {
            render_glyph(bitmap, font.glyph(ch), fg, bg);
            *entry = GlyphEntry {
                valid: true,
                fg,
                bg,
                timestamp: 0,
            };
        }
        entry.timestamp = self.timestamp;
        bitmap
    }
}

impl Default for GlyphCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Expands 16 font rows into 9x16 words. Column 8 is padding and always
/// takes the background.
pub fn render_glyph(bitmap: &mut [u32], rows: &[u8], fg: u32, bg: u32) {
    for (row, bits) in rows.iter().take(GLYPH_HEIGHT).enumerate() {
        let line = &mut bitmap[row * GLYPH_WIDTH..(row + 1) * GLYPH_WIDTH];
        for (col, px) in line.iter_mut().enumerate() {
            let on = col < 8 && bits & (0x80 >> col) != 0;
            *px = if on { fg } else { bg };
        }
    }
}
