//! Filesystem entry kinds
//!
//! [`PathKind::of`] runs a fixed, ordered list of checks and returns the first that holds.
//! Entries can satisfy several checks at once, so the order decides the answer:
//!
//! 1. char device
//! 2. directory (follows symlinks)
//! 3. symbolic link
//! 4. socket
//! 5. mount point
//! 6. block device
//! 7. fifo
//! 8. regular file
//!
//! A symlink to a directory therefore reports [`PathKind::Directory`].

use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, Metadata};
use std::path::Path;

use crate::error::{Error, Result};
use crate::text::Sniffer;
use crate::types::SNIFF_SEPARATOR;

/// One of the eight mutually exclusive entry kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathKind {
    /// Block device
    BlockDevice,
    /// Character device
    CharDevice,
    /// Directory
    Directory,
    /// Regular file
    RegularFile,
    /// Symbolic link
    SymbolicLink,
    /// Mount point
    MountPoint,
    /// Named pipe
    Fifo,
    /// Unix domain socket
    Socket,
}

impl PathKind {
    /// All kinds in code order
    pub const ALL: [Self; 8] = [
        Self::BlockDevice,
        Self::CharDevice,
        Self::Directory,
        Self::RegularFile,
        Self::SymbolicLink,
        Self::MountPoint,
        Self::Fifo,
        Self::Socket,
    ];

    /// Single-character code
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::BlockDevice => 'b',
            Self::CharDevice => 'c',
            Self::Directory => 'd',
            Self::RegularFile => 'f',
            Self::SymbolicLink => 'l',
            Self::MountPoint => 'm',
            Self::Fifo => 'o',
            Self::Socket => 's',
        }
    }

    /// Display name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BlockDevice => "block_device",
            Self::CharDevice => "char_unbuffered_special",
            Self::Directory => "directory",
            Self::RegularFile => "regular_file",
            Self::SymbolicLink => "symbolic_link",
            Self::MountPoint => "mount",
            Self::Fifo => "fifo",
            Self::Socket => "socket",
        }
    }

    /// Kind for a single-character code
    #[must_use]
    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// `code: name` pairs for every kind, used in validation messages
    #[must_use]
    pub fn hint() -> String {
        let pairs: Vec<String> =
            Self::ALL.iter().map(|kind| format!("'{}': '{}'", kind.code(), kind.name())).collect();
        format!("{{{}}}", pairs.join(", "))
    }

    /// Parse a string of kind codes into a set
    ///
    /// # Errors
    /// Returns [`Error::InvalidKind`] on the first unknown code.
    pub fn parse_codes(codes: &str) -> Result<BTreeSet<Self>> {
        codes
            .chars()
            .map(|code| {
                Self::from_code(code).ok_or_else(|| Error::InvalidKind { code, valid: Self::hint() })
            })
            .collect()
    }

    /// Classify the entry at `path`
    ///
    /// # Errors
    /// Returns [`Error::Unclassifiable`] if no check holds, e.g. the path does not exist.
    pub fn of(path: &Path) -> Result<Self> {
        let probe = Probe::new(path);
        CHECKS
            .iter()
            .find(|(_, check)| check(&probe))
            .map(|&(kind, _)| kind)
            .ok_or_else(|| Error::Unclassifiable(path.to_path_buf()))
    }
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metadata gathered once per classification
struct Probe<'a> {
    path:     &'a Path,
    /// Metadata following symlinks
    followed: Option<Metadata>,
    /// Metadata of the entry itself
    own:      Option<Metadata>,
}

impl<'a> Probe<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, followed: fs::metadata(path).ok(), own: fs::symlink_metadata(path).ok() }
    }
}

type Check = fn(&Probe<'_>) -> bool;

/// Ordered checks; the first that holds wins
const CHECKS: [(PathKind, Check); 8] = [
    (PathKind::CharDevice, is_char_device),
    (PathKind::Directory, is_dir),
    (PathKind::SymbolicLink, is_symlink),
    (PathKind::Socket, is_socket),
    (PathKind::MountPoint, is_mount),
    (PathKind::BlockDevice, is_block_device),
    (PathKind::Fifo, is_fifo),
    (PathKind::RegularFile, is_file),
];

fn is_dir(probe: &Probe<'_>) -> bool {
    probe.followed.as_ref().is_some_and(Metadata::is_dir)
}

fn is_symlink(probe: &Probe<'_>) -> bool {
    probe.own.as_ref().is_some_and(Metadata::is_symlink)
}

fn is_file(probe: &Probe<'_>) -> bool {
    probe.followed.as_ref().is_some_and(Metadata::is_file)
}

#[cfg(unix)]
fn is_char_device(probe: &Probe<'_>) -> bool {
    use std::os::unix::fs::FileTypeExt;
    probe.followed.as_ref().is_some_and(|m| m.file_type().is_char_device())
}

#[cfg(unix)]
fn is_block_device(probe: &Probe<'_>) -> bool {
    use std::os::unix::fs::FileTypeExt;
    probe.followed.as_ref().is_some_and(|m| m.file_type().is_block_device())
}

#[cfg(unix)]
fn is_fifo(probe: &Probe<'_>) -> bool {
    use std::os::unix::fs::FileTypeExt;
    probe.followed.as_ref().is_some_and(|m| m.file_type().is_fifo())
}

#[cfg(unix)]
fn is_socket(probe: &Probe<'_>) -> bool {
    use std::os::unix::fs::FileTypeExt;
    probe.followed.as_ref().is_some_and(|m| m.file_type().is_socket())
}

/// A directory that sits on a different device than its parent, or is its own parent
#[cfg(unix)]
fn is_mount(probe: &Probe<'_>) -> bool {
    use std::os::unix::fs::MetadataExt;
    let Some(own) = probe.own.as_ref() else { return false };
    if !own.is_dir() {
        return false;
    }
    let Ok(parent) = fs::symlink_metadata(probe.path.join("..")) else { return false };
    own.dev() != parent.dev() || own.ino() == parent.ino()
}

#[cfg(not(unix))]
fn is_char_device(_probe: &Probe<'_>) -> bool {
    false
}

#[cfg(not(unix))]
fn is_block_device(_probe: &Probe<'_>) -> bool {
    false
}

#[cfg(not(unix))]
fn is_fifo(_probe: &Probe<'_>) -> bool {
    false
}

#[cfg(not(unix))]
fn is_socket(_probe: &Probe<'_>) -> bool {
    false
}

#[cfg(not(unix))]
fn is_mount(_probe: &Probe<'_>) -> bool {
    false
}

/// MIME type of `path`, asking the sniffer every time
///
/// # Errors
/// Returns error if the sniffer fails.
pub fn mime_type(sniffer: &dyn Sniffer, path: &Path) -> Result<String> {
    let raw = sniffer.sniff(path)?;
    Ok(raw.split(SNIFF_SEPARATOR).next().unwrap_or_default().trim().to_owned())
}

/// Whether the sniffed MIME type of `path` is `text/*`, asking the sniffer every time
///
/// # Errors
/// Returns error if the sniffer fails.
pub fn is_text_file(sniffer: &dyn Sniffer, path: &Path) -> Result<bool> {
    Ok(mime_type(sniffer, path)?.starts_with("text"))
}
