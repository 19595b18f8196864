//! Text console on a 32-bpp linear framebuffer.
//!
//! Text lives in a grid of 9x16 cells. Drawing goes to the back buffer when
//! one is owned and double buffering is on, otherwise straight to the
//! visible buffer. Everything written to the back buffer is tracked in one
//! dirty rectangle that `partial_refresh` copies out.

use core::fmt;

use log::{debug, info};

use super::blit::BlitKernel;
use super::dirty::{DirtyRect, DirtyRegion};
use super::font::FontRom;
use super::framebuffer::{Color, ColorMasks, FramebufferDesc};
use super::glyph::{GlyphCache, GlyphEntry, GLYPH_HEIGHT, GLYPH_WIDTH};
use super::VideoError;

pub const TAB_WIDTH: usize = 8;
/// Pixel column the cursor rests on after a clear.
pub const LEFT_MARGIN: usize = 2;
pub const DEFAULT_FOREGROUND: Color = Color::LIGHT_GRAY;
pub const DEFAULT_BACKGROUND: Color = Color::BLACK;

const BACKSPACE: u8 = 0x08;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Snapshot of the framebuffer and console state.
#[derive(Debug, Clone, Copy)]
pub struct VideoInfo {
    pub framebuffer: usize,
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub c_width: usize,
    pub c_height: usize,
    pub cx: usize,
    pub cy: usize,
    pub fore_color: u32,
    pub back_color: u32,
    pub bpp: u16,
    pub memory_model: u8,
    pub masks: ColorMasks,
    pub edid: Option<&'static [u8]>,
}

/// Calls `f` for every point of the inclusive rectangle, row by row.
pub fn invoke_area<F>(p0: Position, p1: Position, mut f: F)
where
    F: FnMut(Position),
{
    for y in p0.y..=p1.y {
        for x in p0.x..=p1.x {
            f(Position::new(x, y));
        }
    }
}

struct Surfaces<'fb> {
    front: &'fb mut [u32],
    back: Option<&'fb mut [u32]>,
    double_buffered: bool,
}

impl<'fb> Surfaces<'fb> {
    fn target(&self) -> &[u32] {
        match self.back.as_deref() {
            Some(back) if self.double_buffered => back,
            _ => &*self.front,
        }
    }

    fn target_mut(&mut self) -> &mut [u32] {
        match self.back.as_deref_mut() {
            Some(back) if self.double_buffered => back,
            _ => &mut *self.front,
        }
    }

    fn present_rect(&mut self, rect: DirtyRect, stride: usize, blit: BlitKernel) {
        if !self.double_buffered {
            return;
        }
        let Some(back) = self.back.as_deref() else {
            return;
        };
        for y in rect.y0..rect.y1 {
            let start = y * stride + rect.x0;
            let end = y * stride + rect.x1;
            blit.copy(&mut self.front[start..end], &back[start..end]);
        }
    }

    fn present_all(&mut self, blit: BlitKernel) {
        if !self.double_buffered {
            return;
        }
        if let Some(back) = self.back.as_deref() {
            blit.copy(&mut *self.front, back);
        }
    }
}

pub struct Console<'fb> {
    desc: FramebufferDesc,
    surfaces: Surfaces<'fb>,
    width: usize,
    height: usize,
    stride: usize,
    c_width: usize,
    c_height: usize,
    cx: usize,
    cy: usize,
    x: usize,
    y: usize,
    fg: u32,
    bg: u32,
    dirty: DirtyRegion,
    glyphs: GlyphCache,
    font: FontRom,
    blit: BlitKernel,
}

impl<'fb> Console<'fb> {
    /// Brings up a console over `front`. `back` enables double buffering when
    /// it can hold `stride * height` pixels; a smaller one is dropped.
    pub fn new(
        desc: FramebufferDesc,
        front: &'fb mut [u32],
        back: Option<&'fb mut [u32]>,
        font: FontRom,
    ) -> Result<Self, VideoError> {
        if desc.bpp != 32 {
            return Err(VideoError::UnsupportedDepth(desc.bpp));
        }
        let stride = desc.stride();
        let pixels = desc.pixel_count();
        if stride < desc.width || front.len() < pixels {
            return Err(VideoError::BufferTooSmall);
        }
        let c_width = desc.width / GLYPH_WIDTH;
        let c_height = desc.height / GLYPH_HEIGHT;
        if c_width == 0 || c_height == 0 {
            return Err(VideoError::ScreenTooSmall);
        }

        let front = &mut front[..pixels];
        let back = back
            .filter(|back| back.len() >= pixels)
            .map(|back| &mut back[..pixels]);
        let double_buffered = back.is_some();
        let fg = desc.pack(DEFAULT_FOREGROUND);
        let bg = desc.pack(DEFAULT_BACKGROUND);

        let mut console = Self {
            desc,
            surfaces: Surfaces {
                front,
                back,
                double_buffered,
            },
            width: desc.width,
            height: desc.height,
            stride,
            c_width,
            c_height,
            cx: 0,
            cy: 0,
            x: 0,
            y: 0,
            fg,
            bg,
            dirty: DirtyRegion::new(),
            glyphs: GlyphCache::new(),
            font,
            blit: BlitKernel::detect(),
        };
        console.clear();
        console.partial_refresh();

        info!(
            "video: {}x{} stride {} grid {}x{} double buffering {} blit {:?}",
            console.width, console.height, stride, c_width, c_height, double_buffered, console.blit
        );
        Ok(console)
    }

    pub fn desc(&self) -> &FramebufferDesc {
        &self.desc
    }

    pub fn pack(&self, color: Color) -> u32 {
        self.desc.pack(color)
    }

    pub fn grid(&self) -> (usize, usize) {
        (self.c_width, self.c_height)
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.cx, self.cy)
    }

    pub fn pixel_cursor(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn fore_color(&self) -> u32 {
        self.fg
    }

    pub fn back_color(&self) -> u32 {
        self.bg
    }

    pub fn is_double_buffered(&self) -> bool {
        self.surfaces.double_buffered
    }

    pub fn dirty_rect(&self) -> Option<DirtyRect> {
        self.dirty.rect()
    }

    pub fn cache_timestamp(&self) -> u32 {
        self.glyphs.timestamp()
    }

    pub fn glyph_entry(&self, ch: u8) -> &GlyphEntry {
        self.glyphs.entry(ch)
    }

    /// The buffer the display controller scans out.
    pub fn visible(&self) -> &[u32] {
        &*self.surfaces.front
    }

    pub fn back_buffer(&self) -> Option<&[u32]> {
        self.surfaces.back.as_deref()
    }

    pub fn info(&self) -> VideoInfo {
        VideoInfo {
            framebuffer: self.desc.address,
            width: self.width,
            height: self.height,
            stride: self.stride,
            c_width: self.c_width,
            c_height: self.c_height,
            cx: self.cx,
            cy: self.cy,
            fore_color: self.fg,
            back_color: self.bg,
            bpp: self.desc.bpp,
            memory_model: self.desc.memory_model,
            masks: self.desc.masks,
            edid: self.desc.edid,
        }
    }

    pub fn clear(&mut self) {
        let black = self.desc.pack(Color::BLACK);
        self.clear_color(black);
    }

    pub fn clear_color(&mut self, color: u32) {
        self.bg = color;
        self.surfaces.target_mut().fill(color);
        self.cx = 0;
        self.cy = 0;
        self.x = LEFT_MARGIN;
        self.y = 0;
        self.mark_dirty(0, 0, self.width, self.height);
    }

    /// Moves the text cursor without clamping.
    pub fn move_to(&mut self, cx: usize, cy: usize) {
        self.cx = cx;
        self.cy = cy;
        self.sync_pixel_cursor();
    }

    pub fn put_char(&mut self, byte: u8, color: u32) {
        match byte {
            b'\n' => {
                // Scrolling waits for the next printable byte.
                self.cy += 1;
                self.cx = 0;
            }
            b'\r' => self.cx = 0,
            b'\t' => {
                for _ in 0..TAB_WIDTH {
                    self.put_char(b' ', color);
                }
            }
            BACKSPACE => {
                // Moves back without erasing the glyph.
                if self.cx > 0 {
                    self.cx -= 1;
                }
                return;
            }
            _ => {
                self.scroll();
                self.draw_char(byte, self.cx * GLYPH_WIDTH, self.cy * GLYPH_HEIGHT, color);
            }
        }
        self.sync_pixel_cursor();
    }

    pub fn put_bytes(&mut self, bytes: &[u8], color: u32) {
        for &byte in bytes {
            self.put_char(byte, color);
        }
        self.partial_refresh();
    }

    pub fn put_string(&mut self, s: &str) {
        self.put_bytes(s.as_bytes(), self.fg);
    }

    pub fn put_string_color(&mut self, s: &str, color: u32) {
        self.put_bytes(s.as_bytes(), color);
    }

    pub fn draw_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let stride = self.stride;
        self.surfaces.target_mut()[y * stride + x] = color;
        self.mark_dirty(x, y, 1, 1);
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> u32 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.surfaces.target()[y * self.stride + x]
    }

    /// Fills the inclusive rectangle `p0..=p1`.
    pub fn draw_rect(&mut self, p0: Position, p1: Position, color: u32) {
        if p1.x < p0.x || p1.y < p0.y || p0.x >= self.width || p0.y >= self.height {
            return;
        }
        let x1 = p1.x.min(self.width - 1);
        let y1 = p1.y.min(self.height - 1);
        let stride = self.stride;
        let target = self.surfaces.target_mut();
        for y in p0.y..=y1 {
            let row = y * stride;
            target[row + p0.x..=row + x1].fill(color);
        }
        self.mark_dirty(p0.x, p0.y, x1 - p0.x + 1, y1 - p0.y + 1);
    }

    /// Draws one glyph with its top-left corner at pixel `(x, y)`.
    pub fn draw_char(&mut self, ch: u8, x: usize, y: usize, color: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let cols = GLYPH_WIDTH.min(self.width - x);
        let rows = GLYPH_HEIGHT.min(self.height - y);
        let stride = self.stride;
        let blit = self.blit;
        let bitmap = self.glyphs.lookup(&self.font, ch, color, self.bg);
        let target = self.surfaces.target_mut();
        for row in 0..rows {
            let dst = (y + row) * stride + x;
            let src = row * GLYPH_WIDTH;
            blit.copy(&mut target[dst..dst + cols], &bitmap[src..src + cols]);
        }
        self.mark_dirty(x, y, GLYPH_WIDTH, GLYPH_HEIGHT);
    }

    pub fn mark_dirty(&mut self, x: usize, y: usize, w: usize, h: usize) {
        self.dirty.mark(x, y, w, h, self.width, self.height);
    }

    /// Copies the whole back buffer out. Does nothing when drawing is direct.
    pub fn refresh(&mut self) {
        if !self.surfaces.double_buffered {
            return;
        }
        self.surfaces.present_all(self.blit);
        self.dirty.clear();
    }

    /// Copies only the dirty rectangle out and marks the region clean.
    pub fn partial_refresh(&mut self) {
        let Some(rect) = self.dirty.take() else {
            return;
        };
        if rect.is_empty() {
            return;
        }
        self.surfaces.present_rect(rect, self.stride, self.blit);
    }

    /// Switches between back-buffer and direct drawing. Returns the new state.
    pub fn set_double_buffering(&mut self, enabled: bool) -> Result<bool, VideoError> {
        if enabled == self.surfaces.double_buffered {
            return Ok(enabled);
        }
        if enabled {
            let Some(back) = self.surfaces.back.as_deref_mut() else {
                return Err(VideoError::NoBackBuffer);
            };
            self.blit.copy(back, &*self.surfaces.front);
            self.surfaces.double_buffered = true;
            self.dirty.clear();
        } else {
            self.partial_refresh();
            self.surfaces.double_buffered = false;
        }
        debug!("video: double buffering {}", enabled);
        Ok(enabled)
    }

    /// Advances the cell and scrolls the screen up one text row when the
    /// cursor has run past the last one.
    fn scroll(&mut self) {
        if self.cx + 1 >= self.c_width {
            self.cx = 1;
            self.cy += 1;
        } else {
            self.cx += 1;
        }
        if self.cy < self.c_height {
            return;
        }

        let (width, height, stride, bg) = (self.width, self.height, self.stride, self.bg);
        let target = self.surfaces.target_mut();
        target.copy_within(GLYPH_HEIGHT * stride.., 0);
        for y in height - GLYPH_HEIGHT..height {
            target[y * stride..y * stride + width].fill(bg);
        }
        self.cy = self.c_height - 1;
        self.mark_dirty(0, 0, width, height);
        self.refresh();
    }

    fn sync_pixel_cursor(&mut self) {
        self.x = self.cx * GLYPH_WIDTH;
        self.y = self.cy * GLYPH_HEIGHT;
    }
}

impl fmt::Write for Console<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.put_string(s);
        Ok(())
    }
}
