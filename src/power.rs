//! Power control.

use x86_64::instructions::port::Port;

/// Reboots by pulsing the CPU reset line through the keyboard controller.
pub fn reboot() -> ! {
    unsafe {
        let mut port = Port::<u8>::new(0x64);
        port.write(0xFEu8);
    }
    halt_loop()
}

/// Disables interrupts and halts forever.
pub fn halt_loop() -> ! {
    x86_64::instructions::interrupts::disable();
    loop {
        x86_64::instructions::hlt();
    }
}
