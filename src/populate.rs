//! Population loop: dispatch records to backend primitives.
//!
//! `run` folds the record stream into backend calls, one record at a time.
//! No record's processing starts before the previous one's backend calls
//! complete; the only state carried between iterations is the backend
//! handle and the running counts.

use std::fs::File;
use std::io::{self, BufRead, Read};
use std::path::Path;

use log::{debug, warn};

use crate::backend::{Backend, InodeMetadata, InodeRef};
use crate::error::{Error, Result};
use crate::manifest::{FileKind, ManifestRecord, RecordReader};

/// Chunk size for copying source content into the backend.
const COPY_CHUNK: usize = 8192;

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    /// The record's mode resolved to no single recognized file kind. The
    /// inode was allocated but no entry was created.
    SkippedUnhandledKind,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub created: u64,
    pub skipped: u64,
}

/// Process a whole manifest against `fs`.
///
/// Stops at the first error, leaving the backend un-closed and the target
/// in whatever partial state it had reached. On success the backend is
/// closed and the counts are returned.
pub fn run<B: Backend, R: BufRead>(fs: &mut B, input: R) -> Result<Summary> {
    let mut summary = Summary::default();
    for raw in RecordReader::new(input) {
        let record = ManifestRecord::build(&raw?)?;
        match apply(fs, &record)? {
            Outcome::Created => summary.created += 1,
            Outcome::SkippedUnhandledKind => summary.skipped += 1,
        }
    }
    fs.close().map_err(Error::backend("close"))?;
    Ok(summary)
}

/// Create one filesystem object from a decoded record.
///
/// The inode is allocated before the kind branch, even for records that end
/// up skipped.
pub fn apply<B: Backend>(fs: &mut B, record: &ManifestRecord) -> Result<Outcome> {
    let ino = fs
        .alloc_inode(record.parent, record.mode())
        .map_err(Error::backend("alloc_inode"))?;

    match record.kind() {
        Some(FileKind::Regular) => {
            let Some(source) = record.source.as_deref() else {
                return Err(Error::MissingSource(record.name.clone()));
            };
            fs.link_regular_file(record.parent, &record.name, ino)
                .map_err(Error::backend("link_regular_file"))?;
            fs.mark_allocated(ino);
            let mut src = File::open(source).map_err(|e| Error::SourceOpen {
                path: source.to_path_buf(),
                source: e,
            })?;
            src.metadata().map_err(|e| Error::SourceStat {
                path: source.to_path_buf(),
                source: e,
            })?;
            let meta = InodeMetadata {
                mode: record.mode(),
                links_count: 1,
            };
            fs.write_inode_metadata(ino, &meta)
                .map_err(Error::backend("write_inode_metadata"))?;
            write_file(fs, ino, &mut src, source)?;
            debug!("created file '{}' from {}", record.name, source.display());
        }
        Some(FileKind::Directory) => {
            fs.create_directory(record.parent, ino, &record.name)
                .map_err(Error::backend("create_directory"))?;
            debug!("created directory '{}'", record.name);
        }
        Some(FileKind::Symlink) => {
            let Some(target) = record.target.as_deref() else {
                return Err(Error::MissingTarget(record.name.clone()));
            };
            fs.create_symlink(record.parent, ino, &record.name, target)
                .map_err(Error::backend("create_symlink"))?;
            debug!("created symlink '{}' -> '{}'", record.name, target);
        }
        None => {
            warn!(
                "skipping '{}': mode {:o} names no recognized file type",
                record.name,
                record.mode()
            );
            return Ok(Outcome::SkippedUnhandledKind);
        }
    }

    Ok(Outcome::Created)
}

/// Copy all of `source` into the backend's write session for `ino`.
///
/// Reads fixed-size chunks until the source reports end of stream; each
/// chunk is fed to the backend until fully consumed, since backend writes
/// may be partial.
pub fn write_file<B: Backend, S: Read>(
    fs: &mut B,
    ino: InodeRef,
    source: &mut S,
    path: &Path,
) -> Result<()> {
    fs.open_for_write(ino).map_err(Error::backend("open_for_write"))?;

    let mut buf = [0u8; COPY_CHUNK];
    loop {
        let n = source.read(&mut buf).map_err(|e| Error::SourceRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        let mut chunk = &buf[..n];
        while !chunk.is_empty() {
            let taken = fs.write(chunk).map_err(Error::backend("write"))?;
            if taken == 0 {
                return Err(Error::Backend {
                    op: "write",
                    source: io::Error::new(io::ErrorKind::WriteZero, "backend accepted no bytes"),
                });
            }
            chunk = &chunk[taken..];
        }
    }

    fs.close_write_session()
        .map_err(Error::backend("close_write_session"))
}
