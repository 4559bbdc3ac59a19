//! Programmable Interval Timer (PIT) driver and the kernel tick counter.

use core::sync::atomic::{AtomicU32, Ordering};
use x86_64::instructions::port::Port;

const PIT_FREQUENCY: u32 = 1193182;

/// Tick rate programmed into PIT channel 0.
pub const TICK_HZ: u32 = 100;

const MS_PER_TICK: u32 = 1000 / TICK_HZ;

static TICKS: AtomicU32 = AtomicU32::new(0);

/// Programs PIT channel 0 as a rate generator at [`TICK_HZ`] and resets the
/// tick counter.
pub fn init() {
    let divisor = (PIT_FREQUENCY / TICK_HZ) as u16;
    unsafe {
        // Channel 0, lobyte/hibyte access, rate generator mode
        let mut command: Port<u8> = Port::new(0x43);
        command.write(0x36u8);
        let mut data: Port<u8> = Port::new(0x40);
        data.write((divisor & 0xFF) as u8);
        data.write((divisor >> 8) as u8);
    }
    TICKS.store(0, Ordering::Relaxed);
}

/// Called from the IRQ0 handler; must stay this small.
pub fn tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Ticks elapsed since boot.
pub fn ticks() -> u32 {
    TICKS.load(Ordering::Relaxed)
}

/// Uptime in milliseconds.
pub fn uptime_ms() -> u64 {
    ticks() as u64 * MS_PER_TICK as u64
}

/// Busy-waits for `count` ticks, halting between interrupts.
pub fn wait_ticks(count: u32) {
    let start = ticks();
    while ticks().wrapping_sub(start) < count {
        x86_64::instructions::hlt();
    }
}

/// Sleeps for roughly `ms` milliseconds (tick granularity).
pub fn sleep_ms(ms: u32) {
    wait_ticks(ms / MS_PER_TICK);
}
