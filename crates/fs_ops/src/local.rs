//! Portable device implementation over `std::fs`
//!
//! Stands in for the NTFS device on non-Windows hosts and backs the
//! integration tests with real files. Compression toggling and stream
//! removal have no portable equivalent and report `NOT_SUPPORTED`; stream
//! enumeration exposes the primary data stream of regular files.

use crate::device::{
    io_to_status, status, Device, StreamAdvance, StreamFind, StreamRecord, TransactionContext,
};
use crate::entry::{descriptor_from_metadata, EntryDescriptor};
use crate::transfer::{CopyOptions, MoveOptions, Progress, ProgressAction, TransferMode};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

const COPY_CHUNK: usize = 64 * 1024;

#[derive(Debug, Default)]
pub struct LocalDevice;

impl LocalDevice {
    pub fn new() -> Self {
        Self
    }
}

impl Device for LocalDevice {
    fn toggle_compression(
        &self,
        _tx: Option<&TransactionContext>,
        _path: &Path,
        _enable: bool,
    ) -> u32 {
        status::NOT_SUPPORTED
    }

    fn transfer(
        &self,
        _tx: Option<&TransactionContext>,
        src: &Path,
        dst: &Path,
        mode: &TransferMode,
        progress: &mut Progress<'_>,
    ) -> u32 {
        match mode {
            TransferMode::Copy(options) => copy_tree(src, dst, options, progress),
            TransferMode::Move(options) => move_tree(src, dst, options, progress),
        }
    }

    fn open_stream_find(
        &self,
        _tx: Option<&TransactionContext>,
        path: &Path,
    ) -> std::result::Result<Option<(Box<dyn StreamFind>, StreamRecord)>, u32> {
        let metadata = fs::symlink_metadata(path).map_err(|e| io_to_status(&e))?;
        if metadata.is_file() {
            // The primary data stream is the only one a portable host knows.
            let first = StreamRecord {
                raw_name: "::$DATA".to_string(),
                size: metadata.len(),
            };
            Ok(Some((Box::new(LocalStreamFind), first)))
        } else {
            Ok(None)
        }
    }

    fn remove_stream(
        &self,
        _tx: Option<&TransactionContext>,
        _path: &Path,
        _stream_name: &str,
    ) -> u32 {
        status::NOT_SUPPORTED
    }

    fn describe(
        &self,
        _tx: Option<&TransactionContext>,
        path: &Path,
    ) -> std::result::Result<Option<EntryDescriptor>, u32> {
        match fs::symlink_metadata(path) {
            Ok(metadata) => Ok(Some(descriptor_from_metadata(
                path.to_path_buf(),
                &metadata,
            ))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_to_status(&err)),
        }
    }

    fn mirror_timestamps(&self, src: &Path, dst: &Path) -> u32 {
        for entry in walkdir::WalkDir::new(src) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    return err
                        .io_error()
                        .map(io_to_status)
                        .unwrap_or(status::GEN_FAILURE)
                }
            };
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    return err
                        .io_error()
                        .map(io_to_status)
                        .unwrap_or(status::GEN_FAILURE)
                }
            };
            let relative = match entry.path().strip_prefix(src) {
                Ok(relative) => relative,
                Err(_) => return status::GEN_FAILURE,
            };
            let target = dst.join(relative);
            let atime = filetime::FileTime::from_last_access_time(&metadata);
            let mtime = filetime::FileTime::from_last_modification_time(&metadata);
            if let Err(err) = filetime::set_file_times(&target, atime, mtime) {
                return io_to_status(&err);
            }
        }
        status::OK
    }
}

/// A portable object has exactly one stream, already delivered at open.
struct LocalStreamFind;

impl StreamFind for LocalStreamFind {
    fn advance(&mut self) -> StreamAdvance {
        StreamAdvance::End
    }
}

fn copy_tree(
    src: &Path,
    dst: &Path,
    options: &CopyOptions,
    progress: &mut Progress<'_>,
) -> u32 {
    let metadata = match fs::symlink_metadata(src) {
        Ok(metadata) => metadata,
        Err(err) => return io_to_status(&err),
    };

    if metadata.is_dir() {
        if dst.exists() {
            if options.fail_if_exists {
                return status::ALREADY_EXISTS;
            }
        } else if let Err(err) = fs::create_dir_all(dst) {
            return io_to_status(&err);
        }

        let entries = match fs::read_dir(src) {
            Ok(entries) => entries,
            Err(err) => return io_to_status(&err),
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => return io_to_status(&err),
            };
            let code = copy_tree(
                &entry.path(),
                &dst.join(entry.file_name()),
                options,
                progress,
            );
            if code != status::OK {
                return code;
            }
        }
        status::OK
    } else if metadata.file_type().is_symlink() && options.copy_symlinks {
        copy_symlink(src, dst)
    } else {
        copy_file(src, dst, options, progress)
    }
}

fn copy_file(
    src: &Path,
    dst: &Path,
    options: &CopyOptions,
    progress: &mut Progress<'_>,
) -> u32 {
    let mut reader = match fs::File::open(src) {
        Ok(file) => file,
        Err(err) => return io_to_status(&err),
    };

    // Overwrite policy is evaluated at open time, not pre-checked.
    let open = if options.fail_if_exists {
        fs::OpenOptions::new().write(true).create_new(true).open(dst)
    } else {
        fs::File::create(dst)
    };
    let mut writer = match open {
        Ok(file) => file,
        Err(err) => return io_to_status(&err),
    };

    let mut buf = vec![0u8; COPY_CHUNK];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => return io_to_status(&err),
        };
        if let Err(err) = writer.write_all(&buf[..n]) {
            return io_to_status(&err);
        }
        if progress.report(n as u64) == ProgressAction::Cancel {
            return status::REQUEST_ABORTED;
        }
    }

    status::OK
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> u32 {
    let target = match fs::read_link(src) {
        Ok(target) => target,
        Err(err) => return io_to_status(&err),
    };
    match std::os::unix::fs::symlink(&target, dst) {
        Ok(()) => status::OK,
        Err(err) => io_to_status(&err),
    }
}

#[cfg(windows)]
fn copy_symlink(src: &Path, dst: &Path) -> u32 {
    let target = match fs::read_link(src) {
        Ok(target) => target,
        Err(err) => return io_to_status(&err),
    };
    let result = if target.is_dir() {
        std::os::windows::fs::symlink_dir(&target, dst)
    } else {
        std::os::windows::fs::symlink_file(&target, dst)
    };
    match result {
        Ok(()) => status::OK,
        Err(err) => io_to_status(&err),
    }
}

fn move_tree(
    src: &Path,
    dst: &Path,
    options: &MoveOptions,
    progress: &mut Progress<'_>,
) -> u32 {
    if dst.exists() {
        if !options.replace_existing {
            return status::ALREADY_EXISTS;
        }
        let removed = if dst.is_dir() {
            fs::remove_dir_all(dst)
        } else {
            fs::remove_file(dst)
        };
        if let Err(err) = removed {
            return io_to_status(&err);
        }
    }

    match fs::rename(src, dst) {
        Ok(()) => status::OK,
        Err(err) => {
            // Unix: EXDEV = 18, Windows: ERROR_NOT_SAME_DEVICE = 17
            let cross_device = match err.raw_os_error() {
                Some(18) => cfg!(unix),
                Some(17) => cfg!(windows),
                _ => false,
            };
            if !(cross_device && options.copy_allowed) {
                return io_to_status(&err);
            }

            tracing::debug!(
                src = %src.display(),
                dst = %dst.display(),
                "cross-device move, falling back to copy and delete"
            );
            let copy_options = CopyOptions {
                fail_if_exists: false,
                no_buffering: false,
                copy_symlinks: true,
            };
            let code = copy_tree(src, dst, &copy_options, progress);
            if code != status::OK {
                return code;
            }
            let removed = if src.is_dir() {
                fs::remove_dir_all(src)
            } else {
                fs::remove_file(src)
            };
            match removed {
                Ok(()) => status::OK,
                Err(err) => io_to_status(&err),
            }
        }
    }
}
