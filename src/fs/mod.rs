//! File subsystem: the global store instance and boot-time seeding.

pub mod store;

use spin::Mutex;

use crate::drivers::timer;
use crate::mm;
use store::{FileKind, FileStore, FsError};

static STORE: Mutex<Option<FileStore>> = Mutex::new(None);

/// Creates the global file store, backed by one kernel-heap allocation, and
/// seeds the demo files. On failure the store stays unusable and every
/// later operation reports [`FsError::Uninitialized`].
pub fn init() -> Result<(), FsError> {
    let mut store = FileStore::new();
    mm::with_heap(|heap| store.init(heap)).unwrap_or(Err(FsError::Uninitialized))?;
    *STORE.lock() = Some(store);
    seed();
    Ok(())
}

/// Runs `f` with exclusive access to the global store.
pub fn with_store<R>(f: impl FnOnce(&mut FileStore) -> Result<R, FsError>) -> Result<R, FsError> {
    let mut guard = STORE.lock();
    match guard.as_mut() {
        Some(store) => f(store),
        None => Err(FsError::Uninitialized),
    }
}

fn seed() {
    let _ = with_store(|fs| {
        let now = timer::ticks();
        fs.create("readme.txt", FileKind::Regular, now)?;
        fs.create("welcome.txt", FileKind::Regular, now)?;
        fs.create("docs", FileKind::Directory, now)?;

        let readme = fs.open("readme.txt")?;
        fs.write(
            readme,
            b"Welcome to the rivenOS file store!\n\
              This is a simple in-memory file system.\n\
              Use 'ls' to list files.",
        )?;
        fs.close(readme);

        let welcome = fs.open("welcome.txt")?;
        fs.write(
            welcome,
            b"Hello from rivenOS!\n\
              This file system supports:\n\
              - Create/delete files\n\
              - Read/write operations\n\
              - File listing",
        )?;
        fs.close(welcome);
        Ok(())
    });
}
