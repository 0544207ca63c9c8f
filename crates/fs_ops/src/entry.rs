//! Directory-entry enumeration
//!
//! A lazy, forward-only sweep over the descendants of a root. The walker
//! recurses internally; consumers stay flat loops over the yielded entries.

use crate::device::io_to_error;
use crate::{long_path, FsError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub(crate) const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x0010;
pub(crate) const FILE_ATTRIBUTE_NORMAL: u32 = 0x0080;
pub(crate) const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x0400;

/// What kind of object an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    File,
    Directory,
    ReparsePoint,
    MountPoint,
}

/// One filesystem object found during traversal.
///
/// Transient: produced per iteration step, retained by copy only.
#[derive(Debug, Clone, Serialize)]
pub struct EntryDescriptor {
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Raw attribute bits as reported by the device.
    pub attributes: u32,
}

impl EntryDescriptor {
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory | EntryKind::MountPoint)
    }

    pub fn is_reparse_point(&self) -> bool {
        self.attributes & FILE_ATTRIBUTE_REPARSE_POINT != 0
    }

    pub fn is_mount_point(&self) -> bool {
        self.kind == EntryKind::MountPoint
    }
}

/// Options for enumerating a subtree
#[derive(Debug, Clone)]
pub struct EnumerateOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    pub include_files: bool,
    pub include_directories: bool,
    /// Traverse through reparse points instead of yielding them as leaves.
    pub follow_reparse_points: bool,
    /// Yield paths in extended-length form. Forced on by the tree mutator.
    pub long_paths: bool,
}

impl Default for EnumerateOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            include_files: true,
            include_directories: true,
            follow_reparse_points: false,
            long_paths: false,
        }
    }
}

/// Opaque per-entry predicate supplied by the caller.
pub type EntryFilter = dyn Fn(&EntryDescriptor) -> bool;

/// Lazy iterator over the descendants of a root. The root itself is never
/// yielded.
pub struct Entries<'f> {
    inner: walkdir::IntoIter,
    options: EnumerateOptions,
    filter: Option<&'f EntryFilter>,
}

/// Enumerate the descendants of `root` as a lazy sequence.
pub fn enumerate<P: AsRef<Path>>(
    root: P,
    options: EnumerateOptions,
    filter: Option<&EntryFilter>,
) -> Entries<'_> {
    let mut walk = walkdir::WalkDir::new(root.as_ref())
        .min_depth(1)
        .follow_links(options.follow_reparse_points);
    if !options.recursive {
        walk = walk.max_depth(1);
    }
    Entries {
        inner: walk.into_iter(),
        options,
        filter,
    }
}

impl Iterator for Entries<'_> {
    type Item = Result<EntryDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(walk_error(&err))),
            };

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => return Some(Err(walk_error(&err))),
            };

            let mut path = entry.into_path();
            if self.options.long_paths {
                path = long_path::extended(path);
            }
            let descriptor = descriptor_from_metadata(path, &metadata);

            if descriptor.is_directory() && !self.options.include_directories {
                continue;
            }
            if !descriptor.is_directory() && !self.options.include_files {
                continue;
            }
            if let Some(filter) = self.filter {
                if !filter(&descriptor) {
                    continue;
                }
            }

            return Some(Ok(descriptor));
        }
    }
}

fn walk_error(err: &walkdir::Error) -> FsError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("<unknown>"));
    match err.io_error() {
        Some(io) => io_to_error(io, &path),
        None => FsError::InvalidPath(path.display().to_string()),
    }
}

/// Build a descriptor from a path and its (symlink-level) metadata.
#[cfg(windows)]
pub(crate) fn descriptor_from_metadata(path: PathBuf, metadata: &std::fs::Metadata) -> EntryDescriptor {
    use std::os::windows::fs::MetadataExt;

    let attributes = metadata.file_attributes();
    let kind = if attributes & FILE_ATTRIBUTE_REPARSE_POINT != 0 {
        // The authoritative tag check lives in the device's `describe`;
        // here a reparse directory that is not a symlink is a mount point.
        if metadata.file_type().is_symlink() {
            EntryKind::ReparsePoint
        } else {
            EntryKind::MountPoint
        }
    } else if metadata.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    };

    EntryDescriptor {
        path,
        kind,
        attributes,
    }
}

#[cfg(not(windows))]
pub(crate) fn descriptor_from_metadata(path: PathBuf, metadata: &std::fs::Metadata) -> EntryDescriptor {
    let file_type = metadata.file_type();
    let (kind, attributes) = if file_type.is_symlink() {
        (EntryKind::ReparsePoint, FILE_ATTRIBUTE_REPARSE_POINT)
    } else if file_type.is_dir() {
        (EntryKind::Directory, FILE_ATTRIBUTE_DIRECTORY)
    } else {
        (EntryKind::File, FILE_ATTRIBUTE_NORMAL)
    };

    EntryDescriptor {
        path,
        kind,
        attributes,
    }
}
