#![no_std]
#![no_main]

use core::arch::asm;
use core::fmt::Write;
use core::panic::PanicInfo;
use core::ptr::addr_of_mut;

use bootloader_api::{config::BootloaderConfig, entry_point, BootInfo};
use fbcon::device::{self, DeviceOps};
use fbcon::{arch, serial, video};
use linked_list_allocator::LockedHeap;
use log::{error, info, warn, LevelFilter};

pub const OS_NAME: &str = "fbcon";
pub const OS_VERSION: &str = env!("CARGO_PKG_VERSION");

const LOG_LEVEL: LevelFilter = LevelFilter::Debug;
const HEAP_SIZE: usize = 1024 * 1024;

static mut HEAP: [u8; HEAP_SIZE] = [0; HEAP_SIZE];

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

static BOOTLOADER_CONFIG: BootloaderConfig = {
    let mut cfg = BootloaderConfig::new_default();
    cfg.kernel_stack_size = 256 * 1024;
    cfg
};

entry_point!(kernel_main, config = &BOOTLOADER_CONFIG);

fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
    enable_sse();
    serial::write("Hello from kernel!");
    if serial::init_logger(LOG_LEVEL).is_err() {
        serial::write_try("log: logger already set");
    }
    init_heap();

    video::init(boot_info.framebuffer.as_mut());
    device::init_device(0);
    let ttys: [(&str, device::WriteFn); 2] = [("tty0", video::tty_write), ("ttyS0", serial::write_byte)];
    for (name, write) in ttys {
        if device::device_register(DeviceOps::char_device(name, Some(write), None)).is_none() {
            warn!("device: table full, {} not registered", name);
        }
    }

    let tty = device::device_find_name("tty0");
    let mut banner: heapless::String<64> = heapless::String::new();
    let _ = writeln!(banner, "{} {}", OS_NAME, OS_VERSION);
    for byte in banner.bytes() {
        device::device_write(&tty, byte);
    }

    let vi = video::get_info();
    info!(
        "boot: {}x{} grid {}x{} at {:#x}",
        vi.width, vi.height, vi.c_width, vi.c_height, vi.framebuffer
    );
    video::put_string("ready\n");

    loop {
        x86_64::instructions::hlt();
    }
}

fn init_heap() {
    // SAFETY: HEAP is only ever handed to the allocator, once, here.
    unsafe {
        ALLOCATOR.lock().init(addr_of_mut!(HEAP) as *mut u8, HEAP_SIZE);
    }
}

fn enable_sse() {
    use x86_64::registers::control::{Cr0, Cr0Flags, Cr4, Cr4Flags};
    unsafe {
        Cr0::update(|flags| {
            flags.remove(Cr0Flags::EMULATE_COPROCESSOR);
            flags.remove(Cr0Flags::TASK_SWITCHED);
            flags.insert(Cr0Flags::MONITOR_COPROCESSOR);
        });
        Cr4::update(|flags| {
            flags.insert(Cr4Flags::OSFXSR);
            flags.insert(Cr4Flags::OSXMMEXCPT_ENABLE);
        });
        let mxcsr: u32 = 0x1F80;
        asm!("ldmxcsr [{}]", in(reg) &mxcsr, options(nostack, preserves_flags));
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    error!("=== KERNEL PANIC === {}", info);
    if let Some(mut lock) = video::CONSOLE.try_lock() {
        if let Some(con) = lock.as_mut() {
            let red = con.pack(video::Color::new(0xFF, 0x00, 0x00));
            con.put_string_color("\n=== KERNEL PANIC ===\n", red);
            let _ = writeln!(con, "{}", info);
        }
    }
    arch::halt();
}
