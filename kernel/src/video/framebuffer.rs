//! Framebuffer descriptor and colour packing.

use bootloader_api::info::{FrameBuffer, FrameBufferInfo, PixelFormat};

use super::VideoError;

/// Memory-model tag for direct RGB framebuffers.
pub const MEMORY_MODEL_RGB: u8 = 1;

/// 8-bit-per-channel colour before packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn from_rgb(rgb: u32) -> Self {
        Self {
            r: (rgb >> 16) as u8,
            g: (rgb >> 8) as u8,
            b: rgb as u8,
        }
    }

    pub const BLACK: Color = Color::new(0x00, 0x00, 0x00);
    pub const LIGHT_GRAY: Color = Color::new(0xAA, 0xAA, 0xAA);
}

/// Channel mask sizes and shifts as reported by the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorMasks {
    pub red_size: u8,
    pub red_shift: u8,
    pub green_size: u8,
    pub green_shift: u8,
    pub blue_size: u8,
    pub blue_shift: u8,
}

impl ColorMasks {
    /// `0x00RRGGBB` words, the layout most firmware hands out.
    pub const XRGB: ColorMasks = ColorMasks {
        red_size: 8,
        red_shift: 16,
        green_size: 8,
        green_shift: 8,
        blue_size: 8,
        blue_shift: 0,
    };

    /// `0x00BBGGRR` words.
    pub const XBGR: ColorMasks = ColorMasks {
        red_size: 8,
        red_shift: 0,
        green_size: 8,
        green_shift: 8,
        blue_size: 8,
        blue_shift: 16,
    };

    /// Channel placement inside a little-endian 32-bit word. `Rgb` means the
    /// bytes in memory are R, G, B, so red lands in the low byte.
    pub fn from_pixel_format(format: PixelFormat) -> Option<Self> {
        match format {
            PixelFormat::Rgb => Some(Self::XBGR),
            PixelFormat::Bgr => Some(Self::XRGB),
            PixelFormat::Unknown {
                red_position,
                green_position,
                blue_position,
            } => Some(Self {
                red_size: 8,
                red_shift: red_position,
                green_size: 8,
                green_shift: green_position,
                blue_size: 8,
                blue_shift: blue_position,
            }),
            _ => None,
        }
    }

    /// Channels are assumed to already fit their mask sizes.
    pub const fn pack(&self, color: Color) -> u32 {
        ((color.r as u32) << self.red_shift)
            | ((color.g as u32) << self.green_shift)
            | ((color.b as u32) << self.blue_shift)
    }
}

/// What the console needs to know about the visible framebuffer.
#[derive(Debug, Clone, Copy)]
pub struct FramebufferDesc {
    pub address: usize,
    pub width: usize,
    pub height: usize,
    /// Bytes per row.
    pub pitch: usize,
    pub bpp: u16,
    pub memory_model: u8,
    pub masks: ColorMasks,
    pub edid: Option<&'static [u8]>,
}

impl FramebufferDesc {
    /// Descriptor for a 32-bpp framebuffer whose rows are `stride` pixels apart.
    pub const fn new_32bpp(address: usize, width: usize, height: usize, stride: usize, masks: ColorMasks) -> Self {
        Self {
            address,
            width,
            height,
            pitch: stride * 4,
            bpp: 32,
            memory_model: MEMORY_MODEL_RGB,
            masks,
            edid: None,
        }
    }

    pub fn from_info(info: &FrameBufferInfo, address: usize) -> Self {
        // U8 and future formats fall through to zero masks; init then fails on bpp.
        let masks = ColorMasks::from_pixel_format(info.pixel_format).unwrap_or(ColorMasks {
            red_size: 0,
            red_shift: 0,
            green_size: 0,
            green_shift: 0,
            blue_size: 0,
            blue_shift: 0,
        });
        Self {
            address,
            width: info.width,
            height: info.height,
            pitch: info.stride * info.bytes_per_pixel,
            bpp: (info.bytes_per_pixel * 8) as u16,
            memory_model: MEMORY_MODEL_RGB,
            masks,
            edid: None,
        }
    }

    /// Pixels from the start of one row to the next.
    pub fn stride(&self) -> usize {
        let bytes_per_pixel = (self.bpp / 8) as usize;
        if bytes_per_pixel == 0 {
            return 0;
        }
        self.pitch / bytes_per_pixel
    }

    pub fn pixel_count(&self) -> usize {
        self.stride() * self.height
    }

    pub const fn pack(&self, color: Color) -> u32 {
        self.masks.pack(color)
    }
}

/// Splits the bootloader framebuffer into a descriptor and a word view of
/// its pixels.
pub fn from_boot(fb: &'static mut FrameBuffer) -> Result<(FramebufferDesc, &'static mut [u32]), VideoError> {
    let info = fb.info();
    let bytes = fb.buffer_mut();
    let desc = FramebufferDesc::from_info(&info, bytes.as_ptr() as usize);
    if desc.bpp != 32 {
        return Err(VideoError::UnsupportedDepth(desc.bpp));
    }
    // SAFETY: every bit pattern is a valid u32; the head check rejects a
    // buffer that does not start on a word boundary.
    let (head, words, _) = unsafe { bytes.align_to_mut::<u32>() };
    if !head.is_empty() {
        return Err(VideoError::Misaligned);
    }
    Ok((desc, words))
}
