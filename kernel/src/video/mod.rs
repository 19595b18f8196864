//! Framebuffer text console and the process-wide instance of it.

pub mod blit;
pub mod console;
pub mod dirty;
pub mod font;
pub mod framebuffer;
pub mod glyph;

#[cfg(test)]
mod tests;

pub use console::{invoke_area, Console, Position, VideoInfo};
pub use dirty::DirtyRect;
pub use font::FontRom;
pub use framebuffer::{Color, ColorMasks, FramebufferDesc};

use core::fmt;
use core::mem::MaybeUninit;
use core::ptr::addr_of_mut;
use core::sync::atomic::{AtomicBool, Ordering};

use bootloader_api::info::FrameBuffer;
use log::{error, warn};
use spin::Mutex;

use crate::arch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoError {
    NoFramebuffer,
    UnsupportedDepth(u16),
    Misaligned,
    BufferTooSmall,
    ScreenTooSmall,
    FontTooShort,
    NoBackBuffer,
}

impl VideoError {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoError::NoFramebuffer => "no framebuffer reported by the bootloader",
            VideoError::UnsupportedDepth(_) => "only 32 bits per pixel is supported",
            VideoError::Misaligned => "framebuffer is not word aligned",
            VideoError::BufferTooSmall => "framebuffer smaller than stride * height",
            VideoError::ScreenTooSmall => "screen cannot hold a single 9x16 cell",
            VideoError::FontTooShort => "font ROM shorter than 256 glyphs",
            VideoError::NoBackBuffer => "no back buffer available",
        }
    }
}

impl fmt::Display for VideoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoError::UnsupportedDepth(bpp) => write!(f, "{} (got {})", self.as_str(), bpp),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// Sized for 3840x2160, doubled.
pub const BACK_BUFFER_BYTES: usize = 3840 * 2160 * 2;
const BACK_BUFFER_WORDS: usize = BACK_BUFFER_BYTES / 4;

static mut BACK_BUFFER_STORAGE: MaybeUninit<[u32; BACK_BUFFER_WORDS]> = MaybeUninit::uninit();
static BACK_BUFFER_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Hands out the static back-buffer pool once, when it can hold `words`.
fn claim_back_buffer(words: usize) -> Option<&'static mut [u32]> {
    if words > BACK_BUFFER_WORDS {
        return None;
    }
    if BACK_BUFFER_CLAIMED.swap(true, Ordering::AcqRel) {
        return None;
    }
    // SAFETY: the flag above lets exactly one caller through, so the slice is
    // the only reference into the pool. It is zeroed before use.
    unsafe {
        let ptr = addr_of_mut!(BACK_BUFFER_STORAGE) as *mut u32;
        core::ptr::write_bytes(ptr, 0, words);
        Some(core::slice::from_raw_parts_mut(ptr, words))
    }
}

pub static CONSOLE: Mutex<Option<Console<'static>>> = Mutex::new(None);

/// Brings up the console on the bootloader framebuffer, halting when that
/// fails.
pub fn init(framebuffer: Option<&'static mut FrameBuffer>) {
    if let Err(err) = try_init(framebuffer) {
        error!("video: {}", err);
        arch::halt();
    }
}

pub fn try_init(framebuffer: Option<&'static mut FrameBuffer>) -> Result<(), VideoError> {
    let fb = framebuffer.ok_or(VideoError::NoFramebuffer)?;
    let (desc, front) = framebuffer::from_boot(fb)?;
    let back = if cfg!(feature = "double_buffering") {
        let back = claim_back_buffer(desc.pixel_count());
        if back.is_none() {
            warn!(
                "video: back buffer pool too small for {}x{}, drawing directly",
                desc.width, desc.height
            );
        }
        back
    } else {
        None
    };
    install(Console::new(desc, front, back, FontRom::vga())?);
    Ok(())
}

/// Makes `console` the process-wide instance.
pub fn install(console: Console<'static>) {
    arch::without_interrupts(|| {
        *CONSOLE.lock() = Some(console);
    });
}

pub fn is_ready() -> bool {
    arch::without_interrupts(|| CONSOLE.lock().is_some())
}

pub fn with_console<F, R>(f: F) -> R
where
    F: FnOnce(&mut Console<'static>) -> R,
{
    arch::without_interrupts(|| {
        let mut lock = CONSOLE.lock();
        let con = lock.as_mut().expect("video: console used before init");
        f(con)
    })
}

pub fn clear() {
    with_console(|c| c.clear());
}

pub fn clear_color(color: u32) {
    with_console(|c| c.clear_color(color));
}

pub fn put_string(s: &str) {
    with_console(|c| c.put_string(s));
}

pub fn put_string_color(s: &str, color: u32) {
    with_console(|c| c.put_string_color(s, color));
}

pub fn put_char(byte: u8, color: u32) {
    with_console(|c| c.put_char(byte, color));
}

pub fn draw_pixel(x: usize, y: usize, color: u32) {
    with_console(|c| c.draw_pixel(x, y, color));
}

pub fn get_pixel(x: usize, y: usize) -> u32 {
    with_console(|c| c.get_pixel(x, y))
}

pub fn draw_rect(p0: Position, p1: Position, color: u32) {
    with_console(|c| c.draw_rect(p0, p1, color));
}

pub fn draw_char(ch: u8, x: usize, y: usize, color: u32) {
    with_console(|c| c.draw_char(ch, x, y, color));
}

pub fn mark_dirty(x: usize, y: usize, w: usize, h: usize) {
    with_console(|c| c.mark_dirty(x, y, w, h));
}

pub fn refresh() {
    with_console(|c| c.refresh());
}

pub fn partial_refresh() {
    with_console(|c| c.partial_refresh());
}

pub fn move_to(cx: usize, cy: usize) {
    with_console(|c| c.move_to(cx, cy));
}

pub fn get_info() -> VideoInfo {
    with_console(|c| c.info())
}

pub fn set_double_buffering(enabled: bool) -> Result<bool, VideoError> {
    with_console(|c| c.set_double_buffering(enabled))
}

/// Character-device write hook: one byte in the foreground colour.
pub fn tty_write(byte: u8) {
    with_console(|c| {
        let fg = c.fore_color();
        c.put_char(byte, fg);
        c.partial_refresh();
    });
}
