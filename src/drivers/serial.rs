//! Serial port (COM1) driver for debug output.
//!
//! Boot progress, failures, and panics go here so they survive on hardware
//! where the screen is unusable.

use core::fmt;
use spin::Mutex;
use uart_16550::SerialPort;

const COM1_BASE: u16 = 0x3F8;

static COM1: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(COM1_BASE) });

pub fn init() {
    COM1.lock().init();
}

pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    let _ = COM1.lock().write_fmt(args);
}

/// Breaks a held lock from a fault or panic path, where the interrupted
/// owner can never resume to release it.
pub unsafe fn force_unlock() {
    COM1.force_unlock();
}

#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => ($crate::drivers::serial::_print(core::format_args!($($arg)*)));
}

#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($fmt:expr) => ($crate::serial_print!(concat!($fmt, "\n")));
    ($fmt:expr, $($arg:tt)*) => ($crate::serial_print!(concat!($fmt, "\n"), $($arg)*));
}
