//! Host-directory backend.
//!
//! Materializes manifest entries as real files, directories, and symlinks
//! under an existing host directory. The inode protocol is implemented by
//! bookkeeping only: an inode is an index into a table of pending paths,
//! and the host kernel does all actual allocation.

use std::collections::HashMap;
use std::fs::{self, File, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};

use crate::backend::{Backend, InodeMetadata, InodeRef, ROOT_INO};

struct Node {
    /// Where the object lives once linked under a parent.
    path: Option<PathBuf>,
    mode: u32,
    allocated: bool,
}

/// A `Backend` rooted at a directory on the host filesystem.
pub struct HostDirFs {
    next_ino: InodeRef,
    nodes: HashMap<InodeRef, Node>,
    session: Option<(InodeRef, File)>,
}

impl HostDirFs {
    /// Open an existing directory as the population target.
    pub fn open<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: not a directory", root.display()),
            ));
        }
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_INO,
            Node {
                path: Some(root.to_path_buf()),
                mode: 0o040755,
                allocated: true,
            },
        );
        Ok(Self {
            next_ino: ROOT_INO + 1,
            nodes,
            session: None,
        })
    }

    fn child_path(&self, parent: InodeRef, name: &str) -> io::Result<PathBuf> {
        match self.nodes.get(&parent).and_then(|n| n.path.as_ref()) {
            Some(dir) => Ok(dir.join(name)),
            None => Err(bad_inode(parent)),
        }
    }

    fn node_mut(&mut self, ino: InodeRef) -> io::Result<&mut Node> {
        self.nodes.get_mut(&ino).ok_or_else(|| bad_inode(ino))
    }

    fn node_path(&self, ino: InodeRef) -> io::Result<PathBuf> {
        self.nodes
            .get(&ino)
            .and_then(|n| n.path.clone())
            .ok_or_else(|| bad_inode(ino))
    }
}

fn bad_inode(ino: InodeRef) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("unknown or unlinked inode {}", ino),
    )
}

fn no_session() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "no open write session")
}

impl Backend for HostDirFs {
    fn alloc_inode(&mut self, _parent: InodeRef, mode: u32) -> io::Result<InodeRef> {
        let ino = self.next_ino;
        self.next_ino += 1;
        self.nodes.insert(
            ino,
            Node {
                path: None,
                mode,
                allocated: false,
            },
        );
        Ok(ino)
    }

    fn link_regular_file(
        &mut self,
        parent: InodeRef,
        name: &str,
        ino: InodeRef,
    ) -> io::Result<()> {
        let path = self.child_path(parent, name)?;
        self.node_mut(ino)?.path = Some(path);
        Ok(())
    }

    fn mark_allocated(&mut self, ino: InodeRef) {
        if let Some(node) = self.nodes.get_mut(&ino) {
            node.allocated = true;
        }
    }

    fn write_inode_metadata(&mut self, ino: InodeRef, meta: &InodeMetadata) -> io::Result<()> {
        self.node_mut(ino)?.mode = meta.mode;
        Ok(())
    }

    fn open_for_write(&mut self, ino: InodeRef) -> io::Result<()> {
        let path = self.node_path(ino)?;
        let file = File::create(&path)?;
        self.session = Some((ino, file));
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.session {
            Some((_, file)) => file.write(buf),
            None => Err(no_session()),
        }
    }

    fn close_write_session(&mut self) -> io::Result<()> {
        let (ino, mut file) = self.session.take().ok_or_else(no_session)?;
        file.flush()?;
        drop(file);
        let path = self.node_path(ino)?;
        let mode = self.nodes.get(&ino).map(|n| n.mode).unwrap_or(0);
        fs::set_permissions(&path, Permissions::from_mode(mode & 0o7777))
    }

    fn create_directory(&mut self, parent: InodeRef, ino: InodeRef, name: &str) -> io::Result<()> {
        let path = self.child_path(parent, name)?;
        fs::create_dir(&path)?;
        let node = self.node_mut(ino)?;
        node.path = Some(path.clone());
        node.allocated = true;
        let perm = node.mode & 0o7777;
        fs::set_permissions(&path, Permissions::from_mode(perm))
    }

    fn create_symlink(
        &mut self,
        parent: InodeRef,
        ino: InodeRef,
        name: &str,
        target: &str,
    ) -> io::Result<()> {
        let path = self.child_path(parent, name)?;
        // permission bits do not apply to symlinks on the host
        symlink(target, &path)?;
        let node = self.node_mut(ino)?;
        node.path = Some(path);
        node.allocated = true;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if self.session.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "write session still open",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_rejects_a_missing_root() {
        assert!(HostDirFs::open("/no/such/root/dir").is_err());
    }

    #[test]
    fn write_session_produces_the_file_with_its_mode() {
        let root = tempfile::tempdir().unwrap();
        let mut fs_backend = HostDirFs::open(root.path()).unwrap();

        let mode = libc::S_IFREG as u32 | 0o600;
        let ino = fs_backend.alloc_inode(ROOT_INO, mode).unwrap();
        fs_backend.link_regular_file(ROOT_INO, "data", ino).unwrap();
        fs_backend.mark_allocated(ino);
        fs_backend
            .write_inode_metadata(ino, &InodeMetadata { mode, links_count: 1 })
            .unwrap();
        fs_backend.open_for_write(ino).unwrap();
        let mut written = 0;
        while written < 5 {
            written += fs_backend.write(&b"hello"[written..]).unwrap();
        }
        fs_backend.close_write_session().unwrap();
        fs_backend.close().unwrap();

        let path = root.path().join("data");
        assert_eq!(fs::read(&path).unwrap(), b"hello");
        assert_eq!(
            fs::metadata(&path).unwrap().permissions().mode() & 0o7777,
            0o600
        );
    }

    #[test]
    fn writing_without_a_session_fails() {
        let root = tempfile::tempdir().unwrap();
        let mut fs_backend = HostDirFs::open(root.path()).unwrap();
        assert!(fs_backend.write(b"x").is_err());
        assert!(fs_backend.close_write_session().is_err());
    }

    #[test]
    fn symlink_target_is_stored_verbatim() {
        let root = tempfile::tempdir().unwrap();
        let mut fs_backend = HostDirFs::open(root.path()).unwrap();
        let ino = fs_backend
            .alloc_inode(ROOT_INO, libc::S_IFLNK as u32 | 0o777)
            .unwrap();
        fs_backend
            .create_symlink(ROOT_INO, ino, "ln", "../over/there")
            .unwrap();
        assert_eq!(
            fs::read_link(root.path().join("ln")).unwrap(),
            Path::new("../over/there")
        );
    }
}
