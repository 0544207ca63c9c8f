//! fskit Filesystem Operations Layer
//!
//! Tree-level operations over an NTFS-capable storage device:
//! - Tree-wide compression toggling with children-before-root ordering
//! - Recursive copy/move with progress reporting and cooperative cancellation
//! - Alternate-data-stream discovery through a lazy native cursor
//! - Junction / mount-point classification
//!
//! All native work goes through the [`Device`] trait; [`Session`] binds a
//! device and an optional kernel transaction, and the module-level free
//! functions are shorthands over the platform default device.

mod device;
mod entry;
mod junction;
mod local;
mod long_path;
mod session;
mod streams;
mod transfer;
mod tree;

#[cfg(windows)]
mod win;

#[cfg(test)]
pub(crate) mod mock;

pub use device::{
    platform_device, status, Device, StreamAdvance, StreamFind, StreamRecord, TransactionContext,
};
pub use entry::{enumerate, Entries, EntryDescriptor, EntryFilter, EntryKind, EnumerateOptions};
pub use junction::{describe, is_junction};
pub use local::LocalDevice;
pub use long_path::resolve_full;
pub use session::Session;
pub use streams::{
    alternate_streams, remove_alternate_stream, StreamCursor, StreamDescriptor, StreamKind,
};
pub use transfer::{
    copy_directory, move_directory, CopyOptions, MoveOptions, Progress, ProgressAction,
    TransferMode, TransferOutcome, TransferResult,
};
pub use tree::{compress_tree, decompress_tree};

#[cfg(windows)]
pub use win::NtfsDevice;

use thiserror::Error;

/// Filesystem operation errors
#[derive(Error, Debug)]
pub enum FsError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("OS error {code}: {path}")]
    Os { code: u32, path: String },
}

pub type Result<T> = std::result::Result<T, FsError>;
