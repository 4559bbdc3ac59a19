//! Flat, fixed-capacity in-memory file store.
//!
//! Files live in a fixed table of slots; each slot permanently owns the
//! byte range `slot * MAX_FILE_SIZE ..` inside one data area allocated from
//! the kernel heap at initialization. There are no directories beyond a
//! `Directory` entry kind and nothing is ever persisted.

use core::fmt;
use core::ptr;
use core::str;

use crate::mm::heap::Heap;

pub const MAX_FILES: usize = 32;
pub const MAX_FILE_SIZE: usize = 1024;
pub const MAX_OPEN_FILES: usize = 8;
/// Longest accepted filename; entries reserve one extra byte of padding.
pub const MAX_NAME_LEN: usize = 15;

const NAME_BYTES: usize = MAX_NAME_LEN + 1;

pub const PERM_READ: u8 = 0x01;
pub const PERM_WRITE: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
}

impl FileKind {
    pub fn label(self) -> &'static str {
        match self {
            FileKind::Regular => "FILE",
            FileKind::Directory => "DIR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    Uninitialized,
    AlreadyExists,
    NotFound,
    NameTooLong,
    NoFreeSlot,
    NoFreeHandle,
    OutOfRange,
    BadHandle,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            FsError::Uninitialized => "file store not initialized",
            FsError::AlreadyExists => "file already exists",
            FsError::NotFound => "file not found",
            FsError::NameTooLong => "filename too long",
            FsError::NoFreeSlot => "no free file slots",
            FsError::NoFreeHandle => "no free file handles",
            FsError::OutOfRange => "position out of range",
            FsError::BadHandle => "invalid file handle",
        };
        f.write_str(message)
    }
}

#[derive(Clone, Copy)]
struct FileEntry {
    name: [u8; NAME_BYTES],
    kind: FileKind,
    permissions: u8,
    size: u32,
    data_offset: u32,
    created_at: u32,
    in_use: bool,
}

impl FileEntry {
    const EMPTY: FileEntry = FileEntry {
        name: [0; NAME_BYTES],
        kind: FileKind::Regular,
        permissions: 0,
        size: 0,
        data_offset: 0,
        created_at: 0,
        in_use: false,
    };

    fn name_str(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_BYTES);
        str::from_utf8(&self.name[..len]).unwrap_or("")
    }
}

#[derive(Clone, Copy)]
struct HandleSlot {
    file_index: usize,
    position: u32,
    is_open: bool,
}

impl HandleSlot {
    const CLOSED: HandleSlot = HandleSlot {
        file_index: 0,
        position: 0,
        is_open: false,
    };
}

/// One in-use table entry, as reported by [`FileStore::iter`].
#[derive(Debug, Clone, Copy)]
pub struct FileInfo<'a> {
    pub kind: FileKind,
    pub name: &'a str,
    pub size: u32,
    pub permissions: u8,
    pub created_at: u32,
}

pub struct FileStore {
    files: [FileEntry; MAX_FILES],
    handles: [HandleSlot; MAX_OPEN_FILES],
    used_files: u32,
    used_size: u32,
    data: *mut u8,
}

// The data pointer targets the store's private heap allocation.
unsafe impl Send for FileStore {}

impl FileStore {
    /// An uninitialized store: every operation fails with
    /// [`FsError::Uninitialized`] until [`FileStore::init`] succeeds.
    pub const fn new() -> FileStore {
        FileStore {
            files: [FileEntry::EMPTY; MAX_FILES],
            handles: [HandleSlot::CLOSED; MAX_OPEN_FILES],
            used_files: 0,
            used_size: 0,
            data: ptr::null_mut(),
        }
    }

    /// Obtains the backing data area from the heap and zeroes all state.
    /// When the allocation fails the store stays uninitialized.
    pub fn init(&mut self, heap: &mut Heap) -> Result<(), FsError> {
        let data = heap.alloc((MAX_FILES * MAX_FILE_SIZE) as u32);
        if data.is_null() {
            return Err(FsError::Uninitialized);
        }
        unsafe {
            ptr::write_bytes(data, 0, MAX_FILES * MAX_FILE_SIZE);
        }
        self.files = [FileEntry::EMPTY; MAX_FILES];
        self.handles = [HandleSlot::CLOSED; MAX_OPEN_FILES];
        self.used_files = 0;
        self.used_size = 0;
        self.data = data;
        Ok(())
    }

    fn ensure_init(&self) -> Result<(), FsError> {
        if self.data.is_null() {
            Err(FsError::Uninitialized)
        } else {
            Ok(())
        }
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.files
            .iter()
            .position(|e| e.in_use && e.name_str() == name)
    }

    /// Resolves a handle to its file slot, rejecting closed, out-of-range,
    /// and dangling handles (file deleted while still open).
    fn resolve(&self, handle: usize) -> Result<usize, FsError> {
        self.ensure_init()?;
        let slot = self.handles.get(handle).ok_or(FsError::BadHandle)?;
        if !slot.is_open || !self.files[slot.file_index].in_use {
            return Err(FsError::BadHandle);
        }
        Ok(slot.file_index)
    }

    /// Creates a file in the first free slot and returns the slot index.
    /// `now` is recorded as the creation tick.
    pub fn create(&mut self, name: &str, kind: FileKind, now: u32) -> Result<usize, FsError> {
        self.ensure_init()?;
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(FsError::NameTooLong);
        }
        if self.find(name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let index = self
            .files
            .iter()
            .position(|e| !e.in_use)
            .ok_or(FsError::NoFreeSlot)?;

        let entry = &mut self.files[index];
        entry.name = [0; NAME_BYTES];
        entry.name[..name.len()].copy_from_slice(name.as_bytes());
        entry.kind = kind;
        entry.permissions = PERM_READ | PERM_WRITE;
        entry.size = 0;
        entry.data_offset = (index * MAX_FILE_SIZE) as u32;
        entry.created_at = now;
        entry.in_use = true;

        self.used_files += 1;
        Ok(index)
    }

    /// Removes a file by name. Handles still open on it keep their pool
    /// slots but degrade to `BadHandle` on use.
    pub fn delete(&mut self, name: &str) -> Result<(), FsError> {
        self.ensure_init()?;
        let index = self.find(name).ok_or(FsError::NotFound)?;
        // Capture the size before clearing the record; afterwards it reads
        // as zero and the aggregate counter would never shrink.
        let size = self.files[index].size;
        self.files[index] = FileEntry::EMPTY;
        self.used_files -= 1;
        self.used_size -= size;
        Ok(())
    }

    /// Binds a free pool slot to the named file with the cursor at zero.
    /// Any number of handles may target the same file at once.
    pub fn open(&mut self, name: &str) -> Result<usize, FsError> {
        self.ensure_init()?;
        let file_index = self.find(name).ok_or(FsError::NotFound)?;
        let handle = self
            .handles
            .iter()
            .position(|h| !h.is_open)
            .ok_or(FsError::NoFreeHandle)?;
        self.handles[handle] = HandleSlot {
            file_index,
            position: 0,
            is_open: true,
        };
        Ok(handle)
    }

    /// Returns a handle to the free pool. Closing an already-closed or
    /// out-of-range handle is a no-op.
    pub fn close(&mut self, handle: usize) {
        if let Some(slot) = self.handles.get_mut(handle) {
            *slot = HandleSlot::CLOSED;
        }
    }

    /// Copies up to `buf.len()` bytes from the cursor onward and advances
    /// the cursor. A cursor at or past end of file reads zero bytes.
    pub fn read(&mut self, handle: usize, buf: &mut [u8]) -> Result<usize, FsError> {
        let index = self.resolve(handle)?;
        let size = self.files[index].size;
        let offset = self.files[index].data_offset;
        let position = self.handles[handle].position;
        if position >= size {
            return Ok(0);
        }
        let count = buf.len().min((size - position) as usize);
        unsafe {
            let src = self.data.add(offset as usize + position as usize);
            ptr::copy_nonoverlapping(src, buf.as_mut_ptr(), count);
        }
        self.handles[handle].position = position + count as u32;
        Ok(count)
    }

    /// Copies bytes at the cursor, clamped to the per-file quota, and
    /// advances the cursor. The recorded size and the aggregate used-byte
    /// counter grow only when the cursor moves past the old end.
    pub fn write(&mut self, handle: usize, buf: &[u8]) -> Result<usize, FsError> {
        let index = self.resolve(handle)?;
        let position = self.handles[handle].position;
        let room = MAX_FILE_SIZE as u32 - position;
        let count = buf.len().min(room as usize);
        if count == 0 {
            return Ok(0);
        }
        let offset = self.files[index].data_offset;
        unsafe {
            let dst = self.data.add(offset as usize + position as usize);
            ptr::copy_nonoverlapping(buf.as_ptr(), dst, count);
        }
        let new_position = position + count as u32;
        self.handles[handle].position = new_position;
        if new_position > self.files[index].size {
            self.used_size += new_position - self.files[index].size;
            self.files[index].size = new_position;
        }
        Ok(count)
    }

    /// Moves the cursor; positions past the recorded size are rejected.
    pub fn seek(&mut self, handle: usize, position: u32) -> Result<(), FsError> {
        let index = self.resolve(handle)?;
        if position > self.files[index].size {
            return Err(FsError::OutOfRange);
        }
        self.handles[handle].position = position;
        Ok(())
    }

    /// In-use entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = FileInfo<'_>> {
        self.files.iter().filter(|e| e.in_use).map(|e| FileInfo {
            kind: e.kind,
            name: e.name_str(),
            size: e.size,
            permissions: e.permissions,
            created_at: e.created_at,
        })
    }

    pub fn exists(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Size of the named file; absent files report 0, indistinguishable
    /// from an empty file by design. Use [`FileStore::exists`] first when
    /// the difference matters.
    pub fn size_of(&self, name: &str) -> u32 {
        self.find(name)
            .map(|index| self.files[index].size)
            .unwrap_or(0)
    }

    pub fn total_files(&self) -> u32 {
        MAX_FILES as u32
    }

    pub fn used_files(&self) -> u32 {
        self.used_files
    }

    pub fn total_size(&self) -> u32 {
        (MAX_FILES * MAX_FILE_SIZE) as u32
    }

    pub fn used_size(&self) -> u32 {
        self.used_size
    }

    pub fn free_space(&self) -> u32 {
        self.total_size() - self.used_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGION_SIZE: usize = 64 * 1024;

    fn region() -> Box<[u64]> {
        vec![0u64; REGION_SIZE / 8].into_boxed_slice()
    }

    fn store_on(buf: &mut [u64]) -> FileStore {
        let mut heap = unsafe { Heap::new(buf.as_mut_ptr() as *mut u8, buf.len() * 8) };
        let mut store = FileStore::new();
        store.init(&mut heap).unwrap();
        store
    }

    #[test]
    fn write_read_round_trip() {
        let mut buf = region();
        let mut store = store_on(&mut buf);
        store.create("a.txt", FileKind::Regular, 7).unwrap();
        let h = store.open("a.txt").unwrap();
        assert_eq!(store.write(h, b"hello"), Ok(5));
        store.seek(h, 0).unwrap();
        let mut out = [0u8; 5];
        assert_eq!(store.read(h, &mut out), Ok(5));
        assert_eq!(&out, b"hello");
        assert_eq!(store.size_of("a.txt"), 5);
        store.close(h);
    }

    #[test]
    fn create_records_defaults() {
        let mut buf = region();
        let mut store = store_on(&mut buf);
        let slot = store.create("a.txt", FileKind::Regular, 42).unwrap();
        assert_eq!(slot, 0);
        let info = store.iter().next().unwrap();
        assert_eq!(info.name, "a.txt");
        assert_eq!(info.size, 0);
        assert_eq!(info.permissions, PERM_READ | PERM_WRITE);
        assert_eq!(info.created_at, 42);
    }

    #[test]
    fn overwrite_within_bounds_keeps_the_size() {
        let mut buf = region();
        let mut store = store_on(&mut buf);
        store.create("a.txt", FileKind::Regular, 0).unwrap();
        let h = store.open("a.txt").unwrap();
        store.write(h, b"hello").unwrap();
        store.seek(h, 0).unwrap();
        assert_eq!(store.write(h, b"abc"), Ok(3));
        assert_eq!(store.size_of("a.txt"), 5);
        assert_eq!(store.used_size(), 5);
        store.seek(h, 0).unwrap();
        let mut out = [0u8; 5];
        store.read(h, &mut out).unwrap();
        assert_eq!(&out, b"abclo");
    }

    #[test]
    fn writes_are_clamped_to_the_per_file_quota() {
        let mut buf = region();
        let mut store = store_on(&mut buf);
        store.create("big", FileKind::Regular, 0).unwrap();
        let h = store.open("big").unwrap();
        let payload = [0x61u8; MAX_FILE_SIZE + 10];
        assert_eq!(store.write(h, &payload), Ok(MAX_FILE_SIZE));
        assert_eq!(store.size_of("big"), MAX_FILE_SIZE as u32);
        // The quota is hard: further writes land nowhere.
        assert_eq!(store.write(h, b"x"), Ok(0));
    }

    #[test]
    fn names_are_unique_among_live_entries() {
        let mut buf = region();
        let mut store = store_on(&mut buf);
        assert!(store.create("x", FileKind::Regular, 0).is_ok());
        assert_eq!(
            store.create("x", FileKind::Regular, 0),
            Err(FsError::AlreadyExists)
        );
    }

    #[test]
    fn delete_releases_the_slot_and_the_counters() {
        let mut buf = region();
        let mut store = store_on(&mut buf);
        store.create("x", FileKind::Regular, 0).unwrap();
        let h = store.open("x").unwrap();
        store.write(h, b"123456").unwrap();
        store.close(h);
        let files_before = store.used_files();
        assert_eq!(store.used_size(), 6);
        store.delete("x").unwrap();
        assert!(!store.exists("x"));
        assert_eq!(store.used_files(), files_before - 1);
        assert_eq!(store.used_size(), 0);
        assert_eq!(store.delete("x"), Err(FsError::NotFound));
    }

    #[test]
    fn table_fills_up_at_max_files() {
        let mut buf = region();
        let mut store = store_on(&mut buf);
        let mut name = [0u8; 2];
        for i in 0..MAX_FILES {
            name[0] = b'a' + (i / 26) as u8;
            name[1] = b'a' + (i % 26) as u8;
            store
                .create(str::from_utf8(&name).unwrap(), FileKind::Regular, 0)
                .unwrap();
        }
        assert_eq!(
            store.create("zz", FileKind::Regular, 0),
            Err(FsError::NoFreeSlot)
        );
        store.delete("aa").unwrap();
        // The freed slot is the first free one again.
        assert_eq!(store.create("zz", FileKind::Regular, 0), Ok(0));
    }

    #[test]
    fn handle_pool_exhausts_and_recovers() {
        let mut buf = region();
        let mut store = store_on(&mut buf);
        store.create("f", FileKind::Regular, 0).unwrap();
        let mut handles = [0usize; MAX_OPEN_FILES];
        for slot in handles.iter_mut() {
            *slot = store.open("f").unwrap();
        }
        assert_eq!(store.open("f"), Err(FsError::NoFreeHandle));
        store.close(handles[3]);
        assert_eq!(store.open("f"), Ok(3));
    }

    #[test]
    fn handles_keep_independent_cursors() {
        let mut buf = region();
        let mut store = store_on(&mut buf);
        store.create("f", FileKind::Regular, 0).unwrap();
        let writer = store.open("f").unwrap();
        store.write(writer, b"abcdef").unwrap();
        let a = store.open("f").unwrap();
        let b = store.open("f").unwrap();
        let mut one = [0u8; 2];
        store.read(a, &mut one).unwrap();
        assert_eq!(&one, b"ab");
        let mut other = [0u8; 6];
        assert_eq!(store.read(b, &mut other), Ok(6));
        assert_eq!(&other, b"abcdef");
        store.read(a, &mut one).unwrap();
        assert_eq!(&one, b"cd");
    }

    #[test]
    fn seek_is_bounded_by_the_file_size() {
        let mut buf = region();
        let mut store = store_on(&mut buf);
        store.create("f", FileKind::Regular, 0).unwrap();
        let h = store.open("f").unwrap();
        store.write(h, b"abc").unwrap();
        assert_eq!(store.seek(h, 3), Ok(()));
        assert_eq!(store.seek(h, 4), Err(FsError::OutOfRange));
    }

    #[test]
    fn reading_at_end_of_file_returns_zero() {
        let mut buf = region();
        let mut store = store_on(&mut buf);
        store.create("f", FileKind::Regular, 0).unwrap();
        let h = store.open("f").unwrap();
        let mut out = [0u8; 4];
        assert_eq!(store.read(h, &mut out), Ok(0));
        store.write(h, b"ab").unwrap();
        assert_eq!(store.read(h, &mut out), Ok(0));
    }

    #[test]
    fn names_longer_than_the_limit_are_rejected() {
        let mut buf = region();
        let mut store = store_on(&mut buf);
        assert!(store.create("123456789012345", FileKind::Regular, 0).is_ok());
        assert_eq!(
            store.create("1234567890123456", FileKind::Regular, 0),
            Err(FsError::NameTooLong)
        );
        assert_eq!(store.create("", FileKind::Regular, 0), Err(FsError::NameTooLong));
    }

    #[test]
    fn listing_follows_slot_order() {
        let mut buf = region();
        let mut store = store_on(&mut buf);
        store.create("one", FileKind::Regular, 0).unwrap();
        store.create("two", FileKind::Directory, 0).unwrap();
        store.create("three", FileKind::Regular, 0).unwrap();
        store.delete("two").unwrap();
        // "four" reuses slot 1, so it lists between "one" and "three".
        store.create("four", FileKind::Regular, 0).unwrap();
        let names: Vec<&str> = store.iter().map(|info| info.name).collect();
        assert_eq!(names, ["one", "four", "three"]);
    }

    #[test]
    fn directory_entries_carry_their_kind() {
        let mut buf = region();
        let mut store = store_on(&mut buf);
        store.create("docs", FileKind::Directory, 0).unwrap();
        let info = store.iter().next().unwrap();
        assert_eq!(info.kind, FileKind::Directory);
        assert_eq!(info.kind.label(), "DIR");
    }

    #[test]
    fn stale_and_bogus_handles_degrade_cleanly() {
        let mut buf = region();
        let mut store = store_on(&mut buf);
        store.create("f", FileKind::Regular, 0).unwrap();
        let h = store.open("f").unwrap();
        store.close(h);
        let mut out = [0u8; 4];
        assert_eq!(store.read(h, &mut out), Err(FsError::BadHandle));
        assert_eq!(store.write(h, b"x"), Err(FsError::BadHandle));
        assert_eq!(store.seek(h, 0), Err(FsError::BadHandle));
        assert_eq!(store.read(MAX_OPEN_FILES + 1, &mut out), Err(FsError::BadHandle));
        // Closing twice stays a no-op.
        store.close(h);

        // A handle whose file was deleted underneath it is equally dead.
        let h = store.open("f").unwrap();
        store.delete("f").unwrap();
        assert_eq!(store.read(h, &mut out), Err(FsError::BadHandle));
    }

    #[test]
    fn uninitialized_store_fails_every_operation() {
        let mut store = FileStore::new();
        assert_eq!(
            store.create("f", FileKind::Regular, 0),
            Err(FsError::Uninitialized)
        );
        assert_eq!(store.open("f"), Err(FsError::Uninitialized));
        assert_eq!(store.delete("f"), Err(FsError::Uninitialized));
        let mut out = [0u8; 1];
        assert_eq!(store.read(0, &mut out), Err(FsError::Uninitialized));
        assert_eq!(store.write(0, b"x"), Err(FsError::Uninitialized));
        assert_eq!(store.seek(0, 0), Err(FsError::Uninitialized));
        assert!(!store.exists("f"));
        assert_eq!(store.size_of("f"), 0);
        assert_eq!(store.iter().count(), 0);
    }

    #[test]
    fn init_failure_leaves_the_store_unusable() {
        // A heap too small for the data area cannot back a store.
        let mut buf = vec![0u64; 512 / 8].into_boxed_slice();
        let mut heap = unsafe { Heap::new(buf.as_mut_ptr() as *mut u8, buf.len() * 8) };
        let mut store = FileStore::new();
        assert_eq!(store.init(&mut heap), Err(FsError::Uninitialized));
        assert_eq!(
            store.create("f", FileKind::Regular, 0),
            Err(FsError::Uninitialized)
        );
    }
}
