//! Block copy of framebuffer words.

#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
use core::arch::x86_64::*;

use crate::arch;

/// Copy routine picked once per console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlitKernel {
    Scalar,
    Sse2,
}

impl BlitKernel {
    pub fn detect() -> Self {
        if cfg!(all(target_arch = "x86_64", target_feature = "sse2")) && arch::sse_supported() {
            BlitKernel::Sse2
        } else {
            BlitKernel::Scalar
        }
    }

    /// Copies `min(dst.len(), src.len())` words.
    pub fn copy(self, dst: &mut [u32], src: &[u32]) {
        let len = dst.len().min(src.len());
        let (dst, src) = (&mut dst[..len], &src[..len]);
        match self {
            #[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
            BlitKernel::Sse2 => unsafe { copy_words_sse2(dst, src) },
            _ => copy_words_scalar(dst, src),
        }
    }
}

fn copy_words_scalar(dst: &mut [u32], src: &[u32]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = *s;
    }
}

#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
#[target_feature(enable = "sse2")]
unsafe fn copy_words_sse2(dst: &mut [u32], src: &[u32]) {
    debug_assert_eq!(dst.len(), src.len());
    let len = dst.len();
    let mut i = 0;
    while i + 4 <= len {
        let v = _mm_loadu_si128(src.as_ptr().add(i) as *const __m128i);
        _mm_storeu_si128(dst.as_mut_ptr().add(i) as *mut __m128i, v);
        i += 4;
    }
    if i < len {
        copy_words_scalar(&mut dst[i..], &src[i..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u32> {
        (0..len as u32).map(|i| i.wrapping_mul(0x9E37_79B9)).collect()
    }

    #[test]
    fn every_kernel_copies_every_length() {
        for kernel in [BlitKernel::Scalar, BlitKernel::detect()] {
            for len in 0..19 {
                let src = pattern(len);
                let mut dst = vec![0xDEAD_BEEF; len + 3];
                kernel.copy(&mut dst[..len], &src);
                assert_eq!(&dst[..len], &src[..]);
                assert!(dst[len..].iter().all(|&w| w == 0xDEAD_BEEF));
            }
        }
    }

    #[test]
    fn copies_shorter_side() {
        let src = pattern(9);
        let mut dst = vec![0u32; 4];
        BlitKernel::detect().copy(&mut dst, &src);
        assert_eq!(&dst[..], &src[..4]);
    }

    #[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
    #[test]
    fn detects_sse2_on_x86_64() {
        assert_eq!(BlitKernel::detect(), BlitKernel::Sse2);
    }
}
