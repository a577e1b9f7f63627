//! Manifest parsing.
//!
//! A manifest is a line-oriented stream of records separated by blank lines:
//!
//! ```text
//! <name>
//! [attr=value]*
//! ```
//!
//! Recognized attributes: `uid`, `gid`, `perm` (octal), `mode` (one of
//! `reg`|`dir`|`sym`), `target`, `source`. `RecordReader` groups raw lines
//! into records; `ManifestRecord::build` decodes the attributes of one
//! record into a typed descriptor ready for dispatch.

use std::io::BufRead;
use std::path::PathBuf;

use crate::backend::{InodeRef, ROOT_INO};
use crate::error::{Error, Result};

/// Longest accepted leaf name, in bytes.
pub const NAME_MAX: usize = 255;
/// Longest accepted `target=` / `source=` value, in bytes.
pub const PATH_MAX: usize = 4096;

const S_IFMT: u32 = libc::S_IFMT as u32;
const S_IFREG: u32 = libc::S_IFREG as u32;
const S_IFDIR: u32 = libc::S_IFDIR as u32;
const S_IFLNK: u32 = libc::S_IFLNK as u32;

/// One record as grouped off the stream, before any decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub name_line: String,
    pub attrs: Vec<String>,
}

/// Groups manifest lines into records.
///
/// Blank-line runs between records are skipped. A record ends at the first
/// blank line or at end of input; end of input before any name line ends
/// iteration normally.
pub struct RecordReader<R> {
    input: R,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    pub fn next_record(&mut self) -> Result<Option<RawRecord>> {
        let mut line = String::new();

        // skip blank lines
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            strip_newline(&mut line);
            if !line.is_empty() {
                break;
            }
        }

        let name_line = line.clone();
        let mut attrs = Vec::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                break;
            }
            strip_newline(&mut line);
            if line.is_empty() {
                break;
            }
            attrs.push(line.clone());
        }

        Ok(Some(RawRecord { name_line, attrs }))
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

fn strip_newline(line: &mut String) {
    if line.ends_with('\n') {
        line.pop();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
}

/// One decoded filesystem object to create.
///
/// `type_bits` and `perm` are tracked separately; `mode()` combines them the
/// way the backend expects. A manifest that supplies conflicting `mode=`
/// lines still builds, but `kind()` then resolves to `None` and the
/// dispatcher skips the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    pub name: String,
    pub parent: InodeRef,
    pub type_bits: u32,
    pub perm: u32,
    pub target: Option<String>,
    pub source: Option<PathBuf>,
}

impl ManifestRecord {
    /// Decode one raw record into a creation descriptor.
    ///
    /// A name line containing a path separator denotes a non-root parent,
    /// which is not supported. `mode=sym` requires a non-empty `target=`;
    /// `mode=reg` requires a `source=`.
    pub fn build(raw: &RawRecord) -> Result<ManifestRecord> {
        if raw.name_line.contains('/') {
            return Err(Error::NestedPath(raw.name_line.clone()));
        }
        if raw.name_line.len() > NAME_MAX {
            return Err(Error::FieldTooLong("filename"));
        }

        let mut record = ManifestRecord {
            name: raw.name_line.clone(),
            parent: ROOT_INO,
            type_bits: 0,
            perm: 0,
            target: None,
            source: None,
        };
        for attr in &raw.attrs {
            record.apply_attr(attr)?;
        }

        match record.kind() {
            Some(FileKind::Symlink) => {
                if record.target.as_deref().map_or(true, str::is_empty) {
                    return Err(Error::MissingTarget(record.name));
                }
            }
            Some(FileKind::Regular) => {
                if record.source.is_none() {
                    return Err(Error::MissingSource(record.name));
                }
            }
            _ => {}
        }

        Ok(record)
    }

    fn apply_attr(&mut self, line: &str) -> Result<()> {
        if line.strip_prefix("uid=").is_some() || line.strip_prefix("gid=").is_some() {
            // recognized but not applied to the created entry
        } else if let Some(value) = line.strip_prefix("perm=") {
            let bits = u32::from_str_radix(value, 8)
                .map_err(|_| Error::InvalidPermission(line.to_string()))?;
            self.perm |= bits;
        } else if let Some(value) = line.strip_prefix("mode=") {
            self.type_bits |= file_type_bits(value)?;
        } else if let Some(value) = line.strip_prefix("target=") {
            if value.len() > PATH_MAX {
                return Err(Error::FieldTooLong("target"));
            }
            self.target = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("source=") {
            if value.len() > PATH_MAX {
                return Err(Error::FieldTooLong("source"));
            }
            self.source = Some(PathBuf::from(value));
        } else {
            return Err(Error::UnknownAttribute(line.to_string()));
        }
        Ok(())
    }

    /// Full mode word handed to the backend: type bits OR permission bits.
    pub fn mode(&self) -> u32 {
        self.type_bits | self.perm
    }

    /// The file kind, if exactly one recognized type tag has been set.
    pub fn kind(&self) -> Option<FileKind> {
        match self.type_bits & S_IFMT {
            S_IFREG => Some(FileKind::Regular),
            S_IFDIR => Some(FileKind::Directory),
            S_IFLNK => Some(FileKind::Symlink),
            _ => None,
        }
    }
}

fn file_type_bits(kind: &str) -> Result<u32> {
    match kind {
        "reg" => Ok(S_IFREG),
        "dir" => Ok(S_IFDIR),
        "sym" => Ok(S_IFLNK),
        other => Err(Error::UnknownFileType(other.to_string())),
    }
}
