//! Framebuffer text console and character-device registry for a small
//! x86_64 kernel.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod arch;
pub mod device;
pub mod serial;
pub mod video;
