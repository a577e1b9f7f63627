//! Backend capability interface.
//!
//! The population core never touches block or inode allocation itself; it
//! drives a `Backend` through the primitives below, one record at a time.
//! Implementations own all on-disk consistency (bitmaps, directory blocks,
//! metadata) and may assume single-writer access for the whole run.

use std::io;

/// Inode handle as seen by the population core. Opaque beyond equality.
pub type InodeRef = u64;

/// Inode number of the target filesystem's root directory.
pub const ROOT_INO: InodeRef = 1;

/// Metadata written for a freshly created regular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeMetadata {
    /// Full mode word: file-type bits OR permission bits.
    pub mode: u32,
    pub links_count: u16,
}

/// Filesystem primitives consumed by the dispatcher.
///
/// Calls arrive strictly sequentially. At most one write session is open at
/// any time: `open_for_write` .. `write`* .. `close_write_session`, always
/// for the inode most recently opened. `write` may accept fewer bytes than
/// offered; the caller loops.
pub trait Backend {
    /// Pick a fresh inode for a child of `parent` with the given mode.
    fn alloc_inode(&mut self, parent: InodeRef, mode: u32) -> io::Result<InodeRef>;

    /// Insert a regular-file directory entry `name` -> `ino` under `parent`.
    fn link_regular_file(&mut self, parent: InodeRef, name: &str, ino: InodeRef)
        -> io::Result<()>;

    /// Record `ino` as in-use in the allocation bookkeeping.
    fn mark_allocated(&mut self, ino: InodeRef);

    fn write_inode_metadata(&mut self, ino: InodeRef, meta: &InodeMetadata) -> io::Result<()>;

    fn open_for_write(&mut self, ino: InodeRef) -> io::Result<()>;

    /// Append bytes to the open write session; returns how many were taken.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn close_write_session(&mut self) -> io::Result<()>;

    /// Create a directory `name` under `parent`, metadata and linking in one
    /// call.
    fn create_directory(&mut self, parent: InodeRef, ino: InodeRef, name: &str) -> io::Result<()>;

    /// Create a symbolic link `name` under `parent` resolving to `target`.
    fn create_symlink(
        &mut self,
        parent: InodeRef,
        ino: InodeRef,
        name: &str,
        target: &str,
    ) -> io::Result<()>;

    /// Flush and release the target filesystem. Called once, on success only.
    fn close(&mut self) -> io::Result<()>;
}
