//! Native operation facade
//!
//! Everything that touches the storage device goes through [`Device`].
//! Operations report raw Win32-style status codes; translation into
//! [`FsError`] happens in one place, [`status_to_error`].

use crate::entry::EntryDescriptor;
use crate::transfer::{Progress, TransferMode};
use crate::FsError;
use std::path::Path;

/// Status codes shared by every device implementation.
pub mod status {
    pub const OK: u32 = 0;
    pub const FILE_NOT_FOUND: u32 = 2;
    pub const PATH_NOT_FOUND: u32 = 3;
    pub const ACCESS_DENIED: u32 = 5;
    pub const NOT_SAME_DEVICE: u32 = 17;
    pub const GEN_FAILURE: u32 = 31;
    pub const HANDLE_EOF: u32 = 38;
    pub const NOT_SUPPORTED: u32 = 50;
    pub const FILE_EXISTS: u32 = 80;
    pub const INVALID_NAME: u32 = 123;
    pub const ALREADY_EXISTS: u32 = 183;
    pub const REQUEST_ABORTED: u32 = 1235;
}

/// Opaque kernel-transaction capability.
///
/// Threaded unchanged through every native call within one top-level
/// operation; never created, inspected, or torn down by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionContext(isize);

impl TransactionContext {
    /// Wrap a raw transaction handle obtained elsewhere.
    pub fn from_raw(handle: isize) -> Self {
        Self(handle)
    }

    pub fn as_raw(&self) -> isize {
        self.0
    }
}

/// One raw record out of a stream-find handle, still in the native
/// `:name:$TYPE` form.
#[derive(Debug, Clone)]
pub struct StreamRecord {
    pub raw_name: String,
    pub size: u64,
}

/// Result of advancing a stream-find handle.
///
/// End-of-data and genuine failure arrive on the same native channel;
/// keeping them as separate variants is what lets the cursor map
/// end-of-data to clean termination instead of an error.
#[derive(Debug)]
pub enum StreamAdvance {
    Next(StreamRecord),
    End,
    Error(u32),
}

/// Live stream-find handle. Dropping it releases the native handle.
pub trait StreamFind: Send {
    fn advance(&mut self) -> StreamAdvance;
}

/// Per-entry native operations.
pub trait Device: Send + Sync {
    /// Toggle the compression attribute on one entry.
    fn toggle_compression(
        &self,
        tx: Option<&TransactionContext>,
        path: &Path,
        enable: bool,
    ) -> u32;

    /// Copy or move `src` to `dst`, recursing through the subtree itself.
    /// `status::REQUEST_ABORTED` reports a cancellation requested through
    /// the progress sink.
    fn transfer(
        &self,
        tx: Option<&TransactionContext>,
        src: &Path,
        dst: &Path,
        mode: &TransferMode,
        progress: &mut Progress<'_>,
    ) -> u32;

    /// Open a stream-find handle with find-first semantics: on success the
    /// first record is already current. `Ok(None)` means the end-of-data
    /// condition was hit on open (an object with zero streams).
    fn open_stream_find(
        &self,
        tx: Option<&TransactionContext>,
        path: &Path,
    ) -> std::result::Result<Option<(Box<dyn StreamFind>, StreamRecord)>, u32>;

    /// Delete one named alternate stream from `path`.
    fn remove_stream(
        &self,
        tx: Option<&TransactionContext>,
        path: &Path,
        stream_name: &str,
    ) -> u32;

    /// Fetch a single entry descriptor. `Ok(None)` means the object is
    /// absent; `Err` carries a lookup failure.
    fn describe(
        &self,
        tx: Option<&TransactionContext>,
        path: &Path,
    ) -> std::result::Result<Option<EntryDescriptor>, u32>;

    /// Force every timestamp under `dst` to match its counterpart under
    /// `src` after a completed copy.
    fn mirror_timestamps(&self, src: &Path, dst: &Path) -> u32;
}

/// Devices are stateless or internally synchronized, so a shared device can
/// back several sessions at once.
impl<D: Device + ?Sized> Device for std::sync::Arc<D> {
    fn toggle_compression(
        &self,
        tx: Option<&TransactionContext>,
        path: &Path,
        enable: bool,
    ) -> u32 {
        (**self).toggle_compression(tx, path, enable)
    }

    fn transfer(
        &self,
        tx: Option<&TransactionContext>,
        src: &Path,
        dst: &Path,
        mode: &TransferMode,
        progress: &mut Progress<'_>,
    ) -> u32 {
        (**self).transfer(tx, src, dst, mode, progress)
    }

    fn open_stream_find(
        &self,
        tx: Option<&TransactionContext>,
        path: &Path,
    ) -> std::result::Result<Option<(Box<dyn StreamFind>, StreamRecord)>, u32> {
        (**self).open_stream_find(tx, path)
    }

    fn remove_stream(
        &self,
        tx: Option<&TransactionContext>,
        path: &Path,
        stream_name: &str,
    ) -> u32 {
        (**self).remove_stream(tx, path, stream_name)
    }

    fn describe(
        &self,
        tx: Option<&TransactionContext>,
        path: &Path,
    ) -> std::result::Result<Option<EntryDescriptor>, u32> {
        (**self).describe(tx, path)
    }

    fn mirror_timestamps(&self, src: &Path, dst: &Path) -> u32 {
        (**self).mirror_timestamps(src, dst)
    }
}

/// Default device for this platform.
pub fn platform_device() -> Box<dyn Device> {
    #[cfg(windows)]
    {
        Box::new(crate::win::NtfsDevice::new())
    }
    #[cfg(not(windows))]
    {
        Box::new(crate::local::LocalDevice::new())
    }
}

/// Translate a native status code into a typed error, keeping path context.
pub(crate) fn status_to_error(code: u32, path: &Path) -> FsError {
    let path = path.display().to_string();
    match code {
        status::FILE_NOT_FOUND | status::PATH_NOT_FOUND => FsError::NotFound(path),
        status::ACCESS_DENIED => FsError::AccessDenied(path),
        status::INVALID_NAME => FsError::InvalidPath(path),
        code => FsError::Os { code, path },
    }
}

/// Collapse an `io::Error` surfaced by the enumerator into the same taxonomy.
pub(crate) fn io_to_error(err: &std::io::Error, path: &Path) -> FsError {
    match err.kind() {
        std::io::ErrorKind::NotFound => FsError::NotFound(path.display().to_string()),
        std::io::ErrorKind::PermissionDenied => FsError::AccessDenied(path.display().to_string()),
        _ => FsError::Os {
            code: err
                .raw_os_error()
                .map(|c| c as u32)
                .unwrap_or(status::GEN_FAILURE),
            path: path.display().to_string(),
        },
    }
}

/// Collapse an `io::Error` into a device status code.
pub(crate) fn io_to_status(err: &std::io::Error) -> u32 {
    match err.kind() {
        std::io::ErrorKind::NotFound => status::FILE_NOT_FOUND,
        std::io::ErrorKind::PermissionDenied => status::ACCESS_DENIED,
        std::io::ErrorKind::AlreadyExists => status::ALREADY_EXISTS,
        _ => err
            .raw_os_error()
            .map(|c| c as u32)
            .unwrap_or(status::GEN_FAILURE),
    }
}
