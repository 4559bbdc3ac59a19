//! Block heap allocator.
//!
//! The managed region is carved into variable-sized blocks, each prefixed by
//! a [`BlockHeader`]. All blocks, free and in use, sit on one doubly linked
//! list in ascending address order, so both coalescing neighbors are a
//! single pointer follow away. Allocation is a first-fit walk from the head
//! of the list.

use core::mem;
use core::ptr;

/// Size of the per-block header prefixed before every payload.
pub const HEADER_SIZE: usize = mem::size_of::<BlockHeader>();

/// Payload granule. Headers carry pointers, so every block boundary must be
/// at least pointer-aligned; sizes stay multiples of 4 as a consequence.
const ALIGN: u32 = mem::align_of::<BlockHeader>() as u32;

/// Surplus below `HEADER_SIZE + SPLIT_SLACK` is handed out with the block
/// instead of being split off as a sliver too small to ever be reused.
const SPLIT_SLACK: u32 = 32;

#[repr(C)]
struct BlockHeader {
    size: u32,
    free: bool,
    prev: *mut BlockHeader,
    next: *mut BlockHeader,
}

/// A fixed-region allocator. The region is supplied once at construction and
/// is never grown; exhaustion is reported through the null sentinel.
pub struct Heap {
    head: *mut BlockHeader,
    base: usize,
    region_size: usize,
    used: u32,
}

// The raw block pointers all target the single region the heap owns
// exclusively, so moving the struct between contexts is sound.
unsafe impl Send for Heap {}

impl Heap {
    /// Formats `size` bytes starting at `base` as one free block.
    ///
    /// # Safety
    ///
    /// `base` must be valid for reads and writes of `size` bytes, aligned
    /// for `BlockHeader`, and exclusively owned by the returned heap for as
    /// long as it lives. `size` must exceed [`HEADER_SIZE`].
    pub unsafe fn new(base: *mut u8, size: usize) -> Heap {
        let head = base as *mut BlockHeader;
        head.write(BlockHeader {
            size: (size - HEADER_SIZE) as u32,
            free: true,
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        });
        Heap {
            head,
            base: base as usize,
            region_size: size,
            used: 0,
        }
    }

    /// Allocates `size` bytes and returns the payload address, or null when
    /// the request is zero-sized (a no-op) or no free block is large enough.
    pub fn alloc(&mut self, size: u32) -> *mut u8 {
        if size == 0 {
            return ptr::null_mut();
        }
        let size = match size.checked_add(ALIGN - 1) {
            Some(s) => s & !(ALIGN - 1),
            None => return ptr::null_mut(),
        };

        let mut current = self.head;
        while !current.is_null() {
            unsafe {
                if (*current).free && (*current).size >= size {
                    self.carve(current, size);
                    (*current).free = false;
                    self.used += (*current).size;
                    return (current as *mut u8).add(HEADER_SIZE);
                }
                current = (*current).next;
            }
        }
        ptr::null_mut()
    }

    /// Splits `block` into a `size`-byte head and a free tail, unless the
    /// surplus is too small to be worth a header of its own.
    unsafe fn carve(&mut self, block: *mut BlockHeader, size: u32) {
        if (*block).size <= size + HEADER_SIZE as u32 + SPLIT_SLACK {
            return;
        }
        let tail = (block as *mut u8).add(HEADER_SIZE + size as usize) as *mut BlockHeader;
        tail.write(BlockHeader {
            size: (*block).size - size - HEADER_SIZE as u32,
            free: true,
            prev: block,
            next: (*block).next,
        });
        if !(*tail).next.is_null() {
            (*(*tail).next).prev = tail;
        }
        (*block).next = tail;
        (*block).size = size;
    }

    /// Returns `ptr` to the free list and merges it with free neighbors.
    ///
    /// Null pointers, pointers outside the region, and already-free blocks
    /// are ignored; double free is deliberately silent.
    pub fn free(&mut self, ptr: *mut u8) {
        if !self.owns(ptr) {
            return;
        }
        unsafe {
            let current = ptr.sub(HEADER_SIZE) as *mut BlockHeader;
            if (*current).free {
                return;
            }
            (*current).free = true;
            self.used -= (*current).size;

            // Absorb the following block first, then fold what remains into
            // the preceding one, so one free can close a gap on both sides.
            let next = (*current).next;
            if !next.is_null() && (*next).free {
                (*current).size += (*next).size + HEADER_SIZE as u32;
                (*current).next = (*next).next;
                if !(*current).next.is_null() {
                    (*(*current).next).prev = current;
                }
            }
            let prev = (*current).prev;
            if !prev.is_null() && (*prev).free {
                (*prev).size += (*current).size + HEADER_SIZE as u32;
                (*prev).next = (*current).next;
                if !(*current).next.is_null() {
                    (*(*current).next).prev = prev;
                }
            }
        }
    }

    /// Resizes an allocation. Null degrades to [`Heap::alloc`], a zero size
    /// to [`Heap::free`]. A block whose capacity already covers `new_size`
    /// is returned unchanged; otherwise the contents move to a fresh block
    /// and the old one is freed. On allocation failure the original block
    /// is left intact and null is returned.
    pub fn realloc(&mut self, ptr: *mut u8, new_size: u32) -> *mut u8 {
        if ptr.is_null() {
            return self.alloc(new_size);
        }
        if new_size == 0 {
            self.free(ptr);
            return ptr::null_mut();
        }
        if !self.owns(ptr) {
            return ptr::null_mut();
        }
        let old_size = unsafe { (*(ptr.sub(HEADER_SIZE) as *mut BlockHeader)).size };
        if old_size >= new_size {
            return ptr;
        }
        let fresh = self.alloc(new_size);
        if !fresh.is_null() {
            unsafe {
                ptr::copy_nonoverlapping(ptr, fresh, old_size.min(new_size) as usize);
            }
            self.free(ptr);
        }
        fresh
    }

    fn owns(&self, ptr: *mut u8) -> bool {
        let addr = ptr as usize;
        addr >= self.base + HEADER_SIZE && addr < self.base + self.region_size
    }

    /// Size of the managed region in bytes.
    pub fn total(&self) -> usize {
        self.region_size
    }

    /// Bytes currently handed out (payloads only, headers excluded).
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Bytes not currently handed out.
    pub fn free_bytes(&self) -> usize {
        self.region_size - self.used as usize
    }

    #[cfg(test)]
    fn payload_size(&self, ptr: *mut u8) -> u32 {
        unsafe { (*(ptr.sub(HEADER_SIZE) as *mut BlockHeader)).size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGION_SIZE: usize = 64 * 1024;

    // u64 backing keeps the region pointer-aligned for block headers.
    fn region() -> Box<[u64]> {
        vec![0u64; REGION_SIZE / 8].into_boxed_slice()
    }

    fn heap_on(buf: &mut [u64]) -> Heap {
        unsafe { Heap::new(buf.as_mut_ptr() as *mut u8, buf.len() * 8) }
    }

    fn whole_payload() -> u32 {
        (REGION_SIZE - HEADER_SIZE) as u32
    }

    #[test]
    fn payloads_are_aligned_and_large_enough() {
        let mut buf = region();
        let mut heap = heap_on(&mut buf);
        for n in [1u32, 3, 4, 5, 8, 13, 100, 1000] {
            let p = heap.alloc(n);
            assert!(!p.is_null());
            assert_eq!(p as usize % 4, 0);
            let size = heap.payload_size(p);
            assert_eq!(size % 4, 0);
            assert!(size >= n);
        }
    }

    #[test]
    fn zero_sized_request_is_a_noop() {
        let mut buf = region();
        let mut heap = heap_on(&mut buf);
        assert!(heap.alloc(0).is_null());
        assert_eq!(heap.used(), 0);
    }

    #[test]
    fn live_payloads_never_overlap() {
        let mut buf = region();
        let mut heap = heap_on(&mut buf);
        let sizes = [16u32, 100, 4, 512, 60];
        let mut ranges: Vec<(usize, usize)> = Vec::new();
        for (i, &n) in sizes.iter().enumerate() {
            let p = heap.alloc(n);
            assert!(!p.is_null());
            unsafe { ptr::write_bytes(p, i as u8 + 1, n as usize) };
            ranges.push((p as usize, p as usize + heap.payload_size(p) as usize));
        }
        for (i, a) in ranges.iter().enumerate() {
            for b in ranges.iter().skip(i + 1) {
                assert!(a.1 <= b.0 || b.1 <= a.0, "blocks {:?} and {:?} overlap", a, b);
            }
        }
        // Patterns written through one pointer must survive the others.
        for (i, &(start, _)) in ranges.iter().enumerate() {
            let p = start as *const u8;
            for off in 0..sizes[i] as usize {
                assert_eq!(unsafe { *p.add(off) }, i as u8 + 1);
            }
        }
    }

    #[test]
    fn alloc_free_alloc_returns_the_same_address() {
        let mut buf = region();
        let mut heap = heap_on(&mut buf);
        let first = heap.alloc(100);
        assert!(!first.is_null());
        heap.free(first);
        assert_eq!(heap.used(), 0);
        let second = heap.alloc(100);
        assert_eq!(first, second);
    }

    #[test]
    fn exhaustion_reports_null_and_leaves_the_list_intact() {
        let mut buf = region();
        let mut heap = heap_on(&mut buf);
        let all = heap.alloc(whole_payload());
        assert!(!all.is_null());
        assert!(heap.alloc(whole_payload()).is_null());
        assert!(heap.alloc(8).is_null());
        heap.free(all);
        assert!(!heap.alloc(whole_payload()).is_null());
    }

    #[test]
    fn realloc_growth_preserves_the_prefix() {
        let mut buf = region();
        let mut heap = heap_on(&mut buf);
        let p = heap.alloc(10);
        assert!(!p.is_null());
        for i in 0..10u8 {
            unsafe { *p.add(i as usize) = 0xA0 | i };
        }
        let q = heap.realloc(p, 100);
        assert!(!q.is_null());
        for i in 0..10u8 {
            assert_eq!(unsafe { *q.add(i as usize) }, 0xA0 | i);
        }
    }

    #[test]
    fn realloc_within_capacity_keeps_the_address() {
        let mut buf = region();
        let mut heap = heap_on(&mut buf);
        let p = heap.alloc(100);
        assert_eq!(heap.realloc(p, 40), p);
        assert_eq!(heap.realloc(p, 100), p);
    }

    #[test]
    fn realloc_degrades_to_alloc_and_free_at_the_edges() {
        let mut buf = region();
        let mut heap = heap_on(&mut buf);
        let p = heap.realloc(ptr::null_mut(), 32);
        assert!(!p.is_null());
        assert!(heap.used() > 0);
        assert!(heap.realloc(p, 0).is_null());
        assert_eq!(heap.used(), 0);
    }

    #[test]
    fn failed_realloc_leaves_the_original_allocation_alive() {
        let mut buf = region();
        let mut heap = heap_on(&mut buf);
        let p = heap.alloc(64);
        assert!(!p.is_null());
        unsafe { ptr::write_bytes(p, 0x5A, 64) };
        let used = heap.used();
        assert!(heap.realloc(p, whole_payload()).is_null());
        assert_eq!(heap.used(), used);
        for off in 0..64 {
            assert_eq!(unsafe { *p.add(off) }, 0x5A);
        }
    }

    #[test]
    fn double_free_is_silent_and_harmless() {
        let mut buf = region();
        let mut heap = heap_on(&mut buf);
        let p = heap.alloc(64);
        heap.free(p);
        let used = heap.used();
        heap.free(p);
        assert_eq!(heap.used(), used);
        assert!(!heap.alloc(64).is_null());
    }

    #[test]
    fn small_surplus_is_handed_out_unsplit() {
        let mut buf = region();
        let mut heap = heap_on(&mut buf);
        // Leave exactly HEADER_SIZE + 32 spare: at the threshold the block
        // must not be split, so the whole payload is accounted as used.
        let request = whole_payload() - (HEADER_SIZE as u32 + 32);
        let p = heap.alloc(request);
        assert!(!p.is_null());
        assert_eq!(heap.used(), whole_payload());
        assert!(heap.alloc(8).is_null());
        heap.free(p);
    }

    #[test]
    fn large_surplus_is_split_into_a_reusable_block() {
        let mut buf = region();
        let mut heap = heap_on(&mut buf);
        let p = heap.alloc(128);
        assert_eq!(heap.used(), 128);
        let q = heap.alloc(128);
        assert!(!q.is_null());
        assert_eq!(heap.used(), 256);
    }

    #[test]
    fn freeing_between_free_neighbors_merges_all_three() {
        let mut buf = region();
        let mut heap = heap_on(&mut buf);
        let a = heap.alloc(100);
        let b = heap.alloc(100);
        let c = heap.alloc(100);
        heap.free(a);
        heap.free(c);
        heap.free(b);
        assert_eq!(heap.used(), 0);
        // Only a single free run can satisfy the whole region again.
        assert!(!heap.alloc(whole_payload()).is_null());
    }
}
