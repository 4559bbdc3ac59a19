//! PS/2 keyboard driver.
//!
//! The IRQ1 handler only pushes the raw scancode into a fixed ring; all
//! decoding and every downstream effect happen in the main loop through
//! [`poll_char`]. The ring is single-producer single-consumer: the ISR
//! advances `write`, the main loop advances `read`, and one slot stays
//! empty to tell a full ring from an empty one.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use pc_keyboard::{layouts, DecodedKey, HandleControl, KeyCode, Keyboard, ScancodeSet1};
use spin::Mutex;

const QUEUE_SIZE: usize = 128;

struct ScancodeQueue {
    buffer: UnsafeCell<[u8; QUEUE_SIZE]>,
    read: AtomicUsize,
    write: AtomicUsize,
}

// One producer (the ISR) and one consumer (the main loop) never touch the
// same index, and the indices are atomics.
unsafe impl Sync for ScancodeQueue {}

impl ScancodeQueue {
    const fn new() -> ScancodeQueue {
        ScancodeQueue {
            buffer: UnsafeCell::new([0; QUEUE_SIZE]),
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
        }
    }

    fn push(&self, scancode: u8) {
        let write = self.write.load(Ordering::Relaxed);
        let next = (write + 1) % QUEUE_SIZE;
        if next == self.read.load(Ordering::Acquire) {
            return; // full: dropping a scancode beats blocking the ISR
        }
        unsafe {
            (*self.buffer.get())[write] = scancode;
        }
        self.write.store(next, Ordering::Release);
    }

    fn pop(&self) -> Option<u8> {
        let read = self.read.load(Ordering::Relaxed);
        if read == self.write.load(Ordering::Acquire) {
            return None;
        }
        let scancode = unsafe { (*self.buffer.get())[read] };
        self.read.store((read + 1) % QUEUE_SIZE, Ordering::Release);
        Some(scancode)
    }
}

static QUEUE: ScancodeQueue = ScancodeQueue::new();

static DECODER: Mutex<Option<Keyboard<layouts::Us104Key, ScancodeSet1>>> = Mutex::new(None);

pub fn init() {
    *DECODER.lock() = Some(Keyboard::new(
        layouts::Us104Key,
        ScancodeSet1,
        HandleControl::Ignore,
    ));
}

/// Called from the IRQ1 handler: queue the scancode and return.
pub fn queue_scancode(scancode: u8) {
    QUEUE.push(scancode);
}

/// Drains queued scancodes and returns the next decoded character, if any.
/// Main-loop context only.
pub fn poll_char() -> Option<char> {
    let mut guard = DECODER.lock();
    let keyboard = guard.as_mut()?;
    while let Some(scancode) = QUEUE.pop() {
        let event = match keyboard.add_byte(scancode) {
            Ok(Some(event)) => event,
            _ => continue,
        };
        match keyboard.process_keyevent(event) {
            Some(DecodedKey::Unicode(c)) => return Some(c),
            Some(DecodedKey::RawKey(KeyCode::Escape)) => return Some('\x1b'),
            _ => continue,
        }
    }
    None
}
