//! rivenOS kernel entry point and boot sequence.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
use core::panic::PanicInfo;

#[cfg(target_os = "none")]
use riven_os::drivers::{keyboard, serial, timer, vga_buffer};
#[cfg(target_os = "none")]
use riven_os::drivers::vga_buffer::Color;
#[cfg(target_os = "none")]
use riven_os::{fs, gdt, interrupts, mm, power, shell};
#[cfg(target_os = "none")]
use riven_os::{print, println, serial_println};

#[cfg(target_os = "none")]
#[no_mangle]
pub extern "C" fn _start() -> ! {
    // Nothing may fire until the GDT and IDT are in place.
    x86_64::instructions::interrupts::disable();

    serial::init();
    serial_println!();
    serial_println!("rivenOS v0.1.0 booting");

    gdt::init();
    serial_println!("[boot] GDT loaded");

    interrupts::init();
    serial_println!("[boot] IDT and PICs ready");

    vga_buffer::init();
    banner();

    ok_line("VGA Display Driver");
    ok_line("Serial Port (COM1)");
    ok_line("Interrupt Descriptor Table");

    timer::init();
    ok_line("Timer Driver (100Hz)");

    mm::init();
    ok_line("Memory Management (4MB Heap)");

    match fs::init() {
        Ok(()) => ok_line("File System (In-Memory)"),
        Err(err) => {
            serial_println!("[boot] file system init failed: {}", err);
            fail_line("File System (In-Memory)");
        }
    }

    keyboard::init();
    ok_line("Keyboard Driver (PS/2)");

    x86_64::instructions::interrupts::enable();
    ok_line("Interrupts Enabled");

    shell::init();
    serial_println!("[boot] entering main loop");

    // Single-threaded event loop: decode queued keys, hand them to the
    // shell, halt until the next interrupt.
    loop {
        while let Some(c) = keyboard::poll_char() {
            shell::handle_char(c);
        }
        x86_64::instructions::hlt();
    }
}

#[cfg(target_os = "none")]
fn banner() {
    // Full-width lines wrap on their own; a println here would double-space.
    vga_buffer::set_color(Color::White, Color::Blue);
    print!("                                                                                ");
    print!("                        r i v e n O S   v 0 . 1 . 0                             ");
    print!("                                                                                ");
    vga_buffer::set_color(Color::White, Color::Black);
    println!();
}

#[cfg(target_os = "none")]
fn ok_line(component: &str) {
    vga_buffer::set_color(Color::LightGreen, Color::Black);
    print!("[ OK ] ");
    vga_buffer::set_color(Color::White, Color::Black);
    println!("{}", component);
}

#[cfg(target_os = "none")]
fn fail_line(component: &str) {
    vga_buffer::set_color(Color::LightRed, Color::Black);
    print!("[FAIL] ");
    vga_buffer::set_color(Color::White, Color::Black);
    println!("{}", component);
}

#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    x86_64::instructions::interrupts::disable();
    unsafe {
        serial::force_unlock();
        vga_buffer::force_unlock();
    }
    serial_println!();
    serial_println!("KERNEL PANIC: {}", info);
    vga_buffer::set_color(Color::White, Color::Red);
    println!();
    println!("KERNEL PANIC!");
    println!("System halted.");
    power::halt_loop()
}

#[cfg(not(target_os = "none"))]
fn main() {}
