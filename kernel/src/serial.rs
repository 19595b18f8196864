use core::fmt::Write;

use lazy_static::lazy_static;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;
use uart_16550::SerialPort;

use crate::arch;

lazy_static! {
    static ref SERIAL1: Mutex<SerialPort> = {
        let mut serial_port = unsafe { SerialPort::new(0x3F8) };
        serial_port.init();
        Mutex::new(serial_port)
    };
}

pub fn write(msg: &str) {
    let mut serial = SERIAL1.lock();
    for byte in msg.bytes() {
        serial.send(byte);
    }
    serial.send(b'\r');
    serial.send(b'\n');
}

/// Like `write`, but drops the line when the port is busy.
pub fn write_try(msg: &str) {
    let Some(mut serial) = SERIAL1.try_lock() else {
        return;
    };
    for byte in msg.bytes() {
        serial.send(byte);
    }
    serial.send(b'\r');
    serial.send(b'\n');
}

/// Character-device write hook for COM1.
pub fn write_byte(byte: u8) {
    arch::without_interrupts(|| SERIAL1.lock().send(byte));
}

pub struct SerialLogger;

static LOGGER: SerialLogger = SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        arch::without_interrupts(|| {
            // A panic while the port is held must not deadlock the logger.
            let Some(mut serial) = SERIAL1.try_lock() else {
                return;
            };
            let _ = write!(serial, "[{}] {}: {}\r\n", record.level(), record.target(), record.args());
        });
    }

    fn flush(&self) {}
}

pub fn init_logger(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
