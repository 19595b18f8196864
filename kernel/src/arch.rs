//! CPU glue: feature probe, interrupt masking and halting.

#[cfg(target_arch = "x86_64")]
use raw_cpuid::CpuId;
use spin::Once;

static SSE_SUPPORTED: Once<bool> = Once::new();

/// Whether the CPU advertises SSE2, probed once.
pub fn sse_supported() -> bool {
    *SSE_SUPPORTED.call_once(probe_sse)
}

#[cfg(target_arch = "x86_64")]
fn probe_sse() -> bool {
    let cpuid = CpuId::new();
    cpuid.get_feature_info().map_or(false, |info| info.has_sse2())
}

#[cfg(not(target_arch = "x86_64"))]
fn probe_sse() -> bool {
    false
}

/// Runs `f` with interrupts masked on bare metal.
#[cfg(target_os = "none")]
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    x86_64::instructions::interrupts::without_interrupts(f)
}

#[cfg(not(target_os = "none"))]
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}

#[cfg(target_os = "none")]
pub fn halt() -> ! {
    loop {
        x86_64::instructions::interrupts::disable();
        x86_64::instructions::hlt();
    }
}

#[cfg(not(target_os = "none"))]
pub fn halt() -> ! {
    loop {
        core::hint::spin_loop();
    }
}
