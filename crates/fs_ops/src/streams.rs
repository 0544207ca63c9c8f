//! Alternate-data-stream discovery
//!
//! Wraps one native stream-find handle in a lazy cursor. The native channel
//! reports both "no more records" and genuine failures through the same
//! status path; only the end-of-data condition terminates the sequence
//! cleanly.

use crate::device::{
    platform_device, status, status_to_error, Device, StreamAdvance, StreamFind, StreamRecord,
    TransactionContext,
};
use crate::{long_path, FsError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Discriminator parsed from the native `:name:$TYPE` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StreamKind {
    Data,
    Other(String),
}

/// One alternate-data-stream record.
///
/// Owned copies only: the native record buffer is reused between iteration
/// steps, so descriptors never borrow from the cursor.
#[derive(Debug, Clone, Serialize)]
pub struct StreamDescriptor {
    /// Object the stream is attached to.
    pub object: PathBuf,
    /// Stream name; empty for the unnamed (primary) data stream.
    pub name: String,
    pub kind: StreamKind,
    /// Logical size in bytes.
    pub size: u64,
}

impl StreamDescriptor {
    fn from_record(object: &Path, record: StreamRecord) -> Self {
        let (name, kind) = parse_stream_name(&record.raw_name);
        Self {
            object: object.to_path_buf(),
            name,
            kind,
            size: record.size,
        }
    }
}

/// Split `:name:$TYPE` into name and kind.
fn parse_stream_name(raw: &str) -> (String, StreamKind) {
    let trimmed = raw.strip_prefix(':').unwrap_or(raw);
    let (name, ty) = match trimmed.rsplit_once(':') {
        Some((name, ty)) => (name, ty),
        None => (trimmed, ""),
    };
    let kind = match ty {
        "$DATA" => StreamKind::Data,
        other => StreamKind::Other(other.trim_start_matches('$').to_string()),
    };
    (name.to_string(), kind)
}

/// Forward-only cursor over the alternate streams of one object.
///
/// Owns at most one native find handle, released as soon as the sequence
/// ends, fails, or the cursor is dropped. Not restartable: resuming takes a
/// fresh open.
pub struct StreamCursor {
    object: PathBuf,
    find: Option<Box<dyn StreamFind>>,
    current: Option<StreamRecord>,
    failed: Option<u32>,
}

impl std::fmt::Debug for StreamCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCursor")
            .field("object", &self.object)
            .field("find", &self.find.as_ref().map(|_| "<handle>"))
            .field("current", &self.current)
            .field("failed", &self.failed)
            .finish()
    }
}

impl StreamCursor {
    pub(crate) fn open(
        device: &dyn Device,
        tx: Option<&TransactionContext>,
        path: &Path,
    ) -> Result<Self> {
        let object = long_path::resolve_full(path)?;
        match device.open_stream_find(tx, &object) {
            Ok(Some((find, first))) => Ok(Self {
                object,
                find: Some(find),
                current: Some(first),
                failed: None,
            }),
            Ok(None) => Ok(Self {
                object,
                find: None,
                current: None,
                failed: None,
            }),
            Err(code) => Err(status_to_error(code, &object)),
        }
    }

    /// Object the cursor was opened on, in resolved form.
    pub fn object(&self) -> &Path {
        &self.object
    }
}

impl Iterator for StreamCursor {
    type Item = Result<StreamDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(code) = self.failed.take() {
            return Some(Err(status_to_error(code, &self.object)));
        }

        let record = self.current.take()?;
        let descriptor = StreamDescriptor::from_record(&self.object, record);

        // Advance for the following call; a failure there surfaces on that
        // call, after the current record has been delivered.
        match self.find.as_mut().map(|find| find.advance()) {
            Some(StreamAdvance::Next(next)) => self.current = Some(next),
            Some(StreamAdvance::End) | None => {
                self.find = None;
            }
            Some(StreamAdvance::Error(code)) => {
                self.find = None;
                self.failed = Some(code);
            }
        }

        Some(Ok(descriptor))
    }
}

/// Enumerate the streams attached to a file or directory.
pub fn alternate_streams<P: AsRef<Path>>(path: P) -> Result<StreamCursor> {
    StreamCursor::open(platform_device().as_ref(), None, path.as_ref())
}

/// Delete one named alternate stream from a file or directory.
pub fn remove_alternate_stream<P: AsRef<Path>>(path: P, stream_name: &str) -> Result<()> {
    remove_stream_core(platform_device().as_ref(), None, path.as_ref(), stream_name)
}

pub(crate) fn remove_stream_core(
    device: &dyn Device,
    tx: Option<&TransactionContext>,
    path: &Path,
    stream_name: &str,
) -> Result<()> {
    if stream_name.is_empty() || stream_name.contains([':', '\\', '/']) {
        return Err(FsError::InvalidPath(format!(
            "{}:{}",
            path.display(),
            stream_name
        )));
    }

    let object = long_path::resolve_full(path)?;
    let code = device.remove_stream(tx, &object, stream_name);
    if code != status::OK {
        return Err(status_to_error(code, &object));
    }

    tracing::info!(object = %object.display(), stream = stream_name, "removed alternate stream");
    Ok(())
}
