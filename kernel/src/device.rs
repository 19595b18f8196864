//! Fixed-slot device table.
//!
//! Slots are handed out once and never reused; an empty slot holds the
//! `NULL` record, which is also what every failed lookup returns.

use alloc::vec;
use alloc::vec::Vec;

use heapless::String;
use log::{debug, warn};
use spin::Mutex;

use crate::arch;

pub const DEVICE_COUNT_DEFAULT: usize = 256;
pub const DEVICE_NAME_LEN: usize = 8;

pub type WriteFn = fn(u8);
pub type ReadFn = fn() -> u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Null,
    Char,
    Block,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Null => "null",
            DeviceKind::Char => "char",
            DeviceKind::Block => "block",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceOps {
    pub write: Option<WriteFn>,
    pub read: Option<ReadFn>,
    pub kind: DeviceKind,
    name: String<DEVICE_NAME_LEN>,
}

impl DeviceOps {
    /// Names longer than eight bytes are cut at the last whole character
    /// that fits.
    pub fn new(name: &str, kind: DeviceKind, write: Option<WriteFn>, read: Option<ReadFn>) -> Self {
        let mut short = String::new();
        for ch in name.chars() {
            if short.push(ch).is_err() {
                break;
            }
        }
        Self {
            write,
            read,
            kind,
            name: short,
        }
    }

    pub fn null() -> Self {
        Self::new("null", DeviceKind::Null, None, None)
    }

    pub fn char_device(name: &str, write: Option<WriteFn>, read: Option<ReadFn>) -> Self {
        Self::new(name, DeviceKind::Char, write, read)
    }

    pub fn block_device(name: &str, write: Option<WriteFn>, read: Option<ReadFn>) -> Self {
        Self::new(name, DeviceKind::Block, write, read)
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn is_null(&self) -> bool {
        self.kind == DeviceKind::Null
    }

    /// Does nothing for a device that cannot be written.
    pub fn write(&self, byte: u8) {
        if let Some(write) = self.write {
            write(byte);
        }
    }

    /// Reads `0` from a device that cannot be read.
    pub fn read(&self) -> u8 {
        match self.read {
            Some(read) => read(),
            None => 0,
        }
    }
}

impl Default for DeviceOps {
    fn default() -> Self {
        Self::null()
    }
}

pub struct DeviceTable {
    slots: Vec<DeviceOps>,
}

impl DeviceTable {
    /// A capacity of zero means `DEVICE_COUNT_DEFAULT`.
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 { DEVICE_COUNT_DEFAULT } else { capacity };
        Self {
            slots: vec![DeviceOps::null(); capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Puts `op` in the first empty slot and returns its index.
    pub fn register(&mut self, op: DeviceOps) -> Option<usize> {
        let slot = self.slots.iter().position(DeviceOps::is_null)?;
        debug!("device: {} ({}) -> slot {}", op.name(), op.kind.as_str(), slot);
        self.slots[slot] = op;
        Some(slot)
    }

    pub fn find_number(&self, n: usize) -> DeviceOps {
        self.slots.get(n).cloned().unwrap_or_default()
    }

    /// First slot whose name equals the first eight bytes of `name`.
    pub fn find_name(&self, name: &str) -> DeviceOps {
        let query = &name.as_bytes()[..name.len().min(DEVICE_NAME_LEN)];
        self.slots
            .iter()
            .find(|op| !op.is_null() && op.name.as_bytes() == query)
            .cloned()
            .unwrap_or_default()
    }

    pub fn find_type(&self, kind: DeviceKind) -> DeviceOps {
        if kind == DeviceKind::Null {
            return DeviceOps::null();
        }
        self.slots
            .iter()
            .find(|op| op.kind == kind)
            .cloned()
            .unwrap_or_default()
    }
}

static DEVICES: Mutex<Option<DeviceTable>> = Mutex::new(None);

fn with_devices<F, R>(f: F) -> R
where
    F: FnOnce(&mut DeviceTable) -> R,
{
    arch::without_interrupts(|| {
        let mut lock = DEVICES.lock();
        let table = lock.as_mut().expect("device: table used before init_device");
        f(table)
    })
}

/// Allocates the process-wide table. A second call keeps the first table.
pub fn init_device(capacity: usize) {
    arch::without_interrupts(|| {
        let mut lock = DEVICES.lock();
        if lock.is_some() {
            warn!("device: table already initialized");
            return;
        }
        let table = DeviceTable::new(capacity);
        debug!("device: {} slots", table.capacity());
        *lock = Some(table);
    });
}

pub fn device_register(op: DeviceOps) -> Option<usize> {
    with_devices(|t| t.register(op))
}

pub fn device_find_number(n: usize) -> DeviceOps {
    with_devices(|t| t.find_number(n))
}

pub fn device_find_name(name: &str) -> DeviceOps {
    with_devices(|t| t.find_name(name))
}

pub fn device_find_type(kind: DeviceKind) -> DeviceOps {
    with_devices(|t| t.find_type(kind))
}

pub fn device_write(op: &DeviceOps, byte: u8) {
    op.write(byte);
}

pub fn device_read(op: &DeviceOps) -> u8 {
    op.read()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU8, Ordering};

    static LAST_WRITE: AtomicU8 = AtomicU8::new(0);

    fn record(byte: u8) {
        LAST_WRITE.store(byte, Ordering::SeqCst);
    }

    fn answer() -> u8 {
        42
    }

    #[test]
    fn zero_capacity_means_default() {
        assert_eq!(DeviceTable::new(0).capacity(), DEVICE_COUNT_DEFAULT);
        assert_eq!(DeviceTable::new(4).capacity(), 4);
    }

    #[test]
    fn slots_are_distinct_until_full() {
        let mut table = DeviceTable::new(2);
        assert_eq!(table.register(DeviceOps::char_device("a", None, None)), Some(0));
        assert_eq!(table.register(DeviceOps::char_device("b", None, None)), Some(1));
        assert_eq!(table.register(DeviceOps::char_device("c", None, None)), None);
        assert_eq!(table.find_number(0).name(), "a");
        assert_eq!(table.find_number(1).name(), "b");
    }

    #[test]
    fn lookups_by_kind_and_name() {
        let mut table = DeviceTable::new(8);
        table.register(DeviceOps::char_device("tty0", Some(record), None));
        table.register(DeviceOps::char_device("ttyS0", None, None));
        let disk = table.register(DeviceOps::block_device("hda", None, None));
        assert_eq!(disk, Some(2));

        let block = table.find_type(DeviceKind::Block);
        assert_eq!(block.name(), "hda");
        assert_eq!(table.find_type(DeviceKind::Char).name(), "tty0");

        let tty = table.find_name("tty0");
        assert_eq!(tty.kind, DeviceKind::Char);
        assert!(tty.write.is_some());
    }

    #[test]
    fn misses_return_sentinel() {
        let table = DeviceTable::new(4);
        for op in [
            table.find_number(17),
            table.find_name("nope"),
            table.find_type(DeviceKind::Block),
            table.find_type(DeviceKind::Null),
        ] {
            assert!(op.is_null());
            assert_eq!(op.name(), "null");
            assert!(op.write.is_none() && op.read.is_none());
        }
    }

    #[test]
    fn names_compare_on_eight_bytes() {
        let mut table = DeviceTable::new(4);
        table.register(DeviceOps::char_device("console-long", None, None));
        assert_eq!(table.find_number(0).name(), "console-");
        assert_eq!(table.find_name("console-whatever").name(), "console-");
        assert!(table.find_name("console").is_null());
    }

    #[test]
    fn first_match_wins() {
        let mut table = DeviceTable::new(4);
        table.register(DeviceOps::char_device("dup", None, Some(answer)));
        table.register(DeviceOps::block_device("dup", None, None));
        assert_eq!(table.find_name("dup").kind, DeviceKind::Char);
    }

    #[test]
    fn dispatch_honours_capabilities() {
        let tty = DeviceOps::char_device("tty0", Some(record), Some(answer));
        device_write(&tty, b'x');
        assert_eq!(LAST_WRITE.load(Ordering::SeqCst), b'x');
        assert_eq!(device_read(&tty), 42);

        let mute = DeviceOps::null();
        device_write(&mute, b'y');
        assert_eq!(LAST_WRITE.load(Ordering::SeqCst), b'x');
        assert_eq!(device_read(&mute), 0);
    }

    #[test]
    fn global_table() {
        init_device(0);
        let slot = device_register(DeviceOps::char_device("gtty", None, Some(answer)))
            .expect("free slot");
        let found = device_find_name("gtty");
        assert_eq!(found.kind, DeviceKind::Char);
        assert_eq!(device_read(&found), 42);
        assert_eq!(device_find_number(slot).name(), "gtty");
        assert_eq!(device_find_type(DeviceKind::Char).kind, DeviceKind::Char);
    }
}
