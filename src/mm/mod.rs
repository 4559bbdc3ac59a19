//! Memory management: the kernel heap region and its allocator.

pub mod heap;

use core::ptr;
use spin::Mutex;

use heap::Heap;

/// Kernel heap size. The region lives in `.bss` and is placed by the linker.
pub const HEAP_SIZE: usize = 4 * 1024 * 1024;

#[repr(align(4096))]
struct HeapRegion {
    data: [u8; HEAP_SIZE],
}

static mut HEAP_REGION: HeapRegion = HeapRegion { data: [0; HEAP_SIZE] };

static KERNEL_HEAP: Mutex<Option<Heap>> = Mutex::new(None);

/// Hands the static heap region to the allocator. Must run once during boot
/// before anything allocates.
pub fn init() {
    let heap = unsafe {
        let base = ptr::addr_of_mut!(HEAP_REGION.data) as *mut u8;
        Heap::new(base, HEAP_SIZE)
    };
    *KERNEL_HEAP.lock() = Some(heap);
}

/// Runs `f` with exclusive access to the kernel heap. Returns `None` when
/// the heap has not been initialized yet.
pub fn with_heap<R>(f: impl FnOnce(&mut Heap) -> R) -> Option<R> {
    KERNEL_HEAP.lock().as_mut().map(f)
}

/// Allocates from the kernel heap; null before init or on exhaustion.
pub fn alloc(size: u32) -> *mut u8 {
    with_heap(|heap| heap.alloc(size)).unwrap_or(ptr::null_mut())
}

/// Returns an allocation to the kernel heap.
pub fn free(ptr: *mut u8) {
    let _ = with_heap(|heap| heap.free(ptr));
}
