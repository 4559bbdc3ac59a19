//! Interrupt descriptor table and legacy 8259 PIC setup.
//!
//! CPU exceptions dump their state to serial and halt; there is nothing to
//! unwind to. The two hardware handlers do the minimum possible and leave
//! the real work to the main loop: IRQ0 bumps the tick counter, IRQ1 queues
//! the raw scancode.

use spin::Lazy;
use x86_64::instructions::port::Port;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame, PageFaultErrorCode};

use crate::drivers::{keyboard, timer};
use crate::power;
use crate::{println, serial_println};

pub const PIC1_OFFSET: u8 = 0x20;
pub const PIC2_OFFSET: u8 = 0x28;

#[derive(Debug, Clone, Copy)]
#[repr(u8)]
pub enum InterruptIndex {
    Timer = PIC1_OFFSET,
    Keyboard,
}

impl InterruptIndex {
    fn as_usize(self) -> usize {
        self as usize
    }
}

static IDT: Lazy<InterruptDescriptorTable> = Lazy::new(|| {
    let mut idt = InterruptDescriptorTable::new();

    idt.divide_error.set_handler_fn(divide_error_handler);
    idt.breakpoint.set_handler_fn(breakpoint_handler);
    idt.invalid_opcode.set_handler_fn(invalid_opcode_handler);
    idt.general_protection_fault.set_handler_fn(gpf_handler);
    idt.page_fault.set_handler_fn(page_fault_handler);
    unsafe {
        idt.double_fault
            .set_handler_fn(double_fault_handler)
            .set_stack_index(crate::gdt::DOUBLE_FAULT_IST_INDEX);
    }

    idt[InterruptIndex::Timer.as_usize()].set_handler_fn(timer_interrupt_handler);
    idt[InterruptIndex::Keyboard.as_usize()].set_handler_fn(keyboard_interrupt_handler);

    idt
});

/// Remaps the PICs and loads the IDT. Interrupts stay disabled until the
/// boot sequence turns them on.
pub fn init() {
    init_pics();
    IDT.load();
}

fn init_pics() {
    unsafe {
        let mut wait_port: Port<u8> = Port::new(0x80);
        let mut pic1_cmd: Port<u8> = Port::new(0x20);
        let mut pic1_data: Port<u8> = Port::new(0x21);
        let mut pic2_cmd: Port<u8> = Port::new(0xA0);
        let mut pic2_data: Port<u8> = Port::new(0xA1);

        // ICW1: start initialization
        pic1_cmd.write(0x11u8);
        wait_port.write(0u8);
        pic2_cmd.write(0x11u8);
        wait_port.write(0u8);

        // ICW2: vector offsets
        pic1_data.write(PIC1_OFFSET);
        wait_port.write(0u8);
        pic2_data.write(PIC2_OFFSET);
        wait_port.write(0u8);

        // ICW3: cascading
        pic1_data.write(4u8);
        wait_port.write(0u8);
        pic2_data.write(2u8);
        wait_port.write(0u8);

        // ICW4: 8086 mode
        pic1_data.write(0x01u8);
        wait_port.write(0u8);
        pic2_data.write(0x01u8);
        wait_port.write(0u8);

        // Unmask only IRQ0 (timer) and IRQ1 (keyboard)
        pic1_data.write(0b1111_1100u8);
        pic2_data.write(0b1111_1111u8);
    }
}

pub fn notify_end_of_interrupt(irq: u8) {
    unsafe {
        if irq >= 8 {
            let mut pic2: Port<u8> = Port::new(0xA0);
            pic2.write(0x20u8);
        }
        let mut pic1: Port<u8> = Port::new(0x20);
        pic1.write(0x20u8);
    }
}

/// Reports a fatal CPU exception on serial and the console, then halts.
fn fault_halt(name: &str, frame: &InterruptStackFrame, error_code: Option<u64>) -> ! {
    x86_64::instructions::interrupts::disable();
    unsafe {
        crate::drivers::serial::force_unlock();
        crate::drivers::vga_buffer::force_unlock();
    }
    serial_println!();
    serial_println!("EXCEPTION: {}", name);
    serial_println!("RIP: {:#018x}", frame.instruction_pointer.as_u64());
    serial_println!("RSP: {:#018x}", frame.stack_pointer.as_u64());
    if let Some(code) = error_code {
        serial_println!("error code: {:#x}", code);
    }
    println!();
    println!("EXCEPTION: {} - system halted", name);
    power::halt_loop()
}

extern "x86-interrupt" fn divide_error_handler(stack_frame: InterruptStackFrame) {
    fault_halt("DIVIDE BY ZERO (#DE)", &stack_frame, None);
}

extern "x86-interrupt" fn breakpoint_handler(stack_frame: InterruptStackFrame) {
    serial_println!(
        "BREAKPOINT (#BP) at {:#018x}",
        stack_frame.instruction_pointer.as_u64()
    );
}

extern "x86-interrupt" fn invalid_opcode_handler(stack_frame: InterruptStackFrame) {
    fault_halt("INVALID OPCODE (#UD)", &stack_frame, None);
}

extern "x86-interrupt" fn gpf_handler(stack_frame: InterruptStackFrame, error_code: u64) {
    fault_halt("GENERAL PROTECTION FAULT (#GP)", &stack_frame, Some(error_code));
}

extern "x86-interrupt" fn double_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) -> ! {
    fault_halt("DOUBLE FAULT (#DF)", &stack_frame, Some(error_code));
}

extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: PageFaultErrorCode,
) {
    serial_println!();
    serial_println!(
        "PAGE FAULT at {:#018x}",
        x86_64::registers::control::Cr2::read_raw()
    );
    fault_halt("PAGE FAULT (#PF)", &stack_frame, Some(error_code.bits()));
}

extern "x86-interrupt" fn timer_interrupt_handler(_stack_frame: InterruptStackFrame) {
    timer::tick();
    notify_end_of_interrupt(0);
}

extern "x86-interrupt" fn keyboard_interrupt_handler(_stack_frame: InterruptStackFrame) {
    let scancode: u8 = unsafe {
        let mut port = Port::<u8>::new(0x60);
        port.read()
    };
    keyboard::queue_scancode(scancode);
    notify_end_of_interrupt(1);
}
