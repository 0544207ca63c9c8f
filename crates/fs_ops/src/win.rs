//! NTFS device implementation
//!
//! Thin bindings over the Win32 storage surface. Paths handed to this
//! module are already in extended-length form; transacted call variants are
//! used whenever a transaction context is present.

use crate::device::{
    io_to_status, status, Device, StreamAdvance, StreamFind, StreamRecord, TransactionContext,
};
use crate::entry::{EntryDescriptor, EntryKind, FILE_ATTRIBUTE_REPARSE_POINT};
use crate::transfer::{CopyOptions, Progress, ProgressAction, TransferMode};
use std::ffi::c_void;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, ERROR_HANDLE_EOF, HANDLE};
use windows::Win32::Storage::FileSystem::{
    CopyFileExW, CopyFileTransactedW, CreateFileTransactedW, CreateFileW, DeleteFileTransactedW,
    DeleteFileW, FindClose, FindFirstFileTransactedW, FindFirstFileW, FindFirstStreamTransactedW,
    FindFirstStreamW, FindNextStreamW, FindStreamInfoStandard, MoveFileTransactedW,
    MoveFileWithProgressW, FindExInfoBasic, FindExSearchNameMatch, FILE_FLAG_BACKUP_SEMANTICS,
    FILE_GENERIC_READ, FILE_GENERIC_WRITE, FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE,
    FIND_FIRST_EX_FLAGS, LPPROGRESS_ROUTINE_CALLBACK_REASON, MOVEFILE_REPLACE_EXISTING,
    MOVE_FILE_FLAGS, OPEN_EXISTING, WIN32_FIND_DATAW, WIN32_FIND_STREAM_DATA,
};
use windows::Win32::System::Ioctl::FSCTL_SET_COMPRESSION;
use windows::Win32::System::IO::DeviceIoControl;

const COMPRESSION_FORMAT_NONE: u16 = 0;
const COMPRESSION_FORMAT_DEFAULT: u16 = 1;

const COPY_FILE_FAIL_IF_EXISTS: u32 = 0x0000_0001;
const COPY_FILE_COPY_SYMLINK: u32 = 0x0000_0800;
const COPY_FILE_NO_BUFFERING: u32 = 0x0000_1000;

const PROGRESS_CONTINUE: u32 = 0;
const PROGRESS_CANCEL: u32 = 1;

const IO_REPARSE_TAG_MOUNT_POINT: u32 = 0xA000_0003;
const IO_REPARSE_TAG_SYMLINK: u32 = 0xA000_000C;

#[derive(Debug, Default)]
pub struct NtfsDevice;

impl NtfsDevice {
    pub fn new() -> Self {
        Self
    }
}

fn to_wide(path: &Path) -> Vec<u16> {
    path.as_os_str().encode_wide().chain(Some(0)).collect()
}

fn stream_path_wide(path: &Path, stream_name: &str) -> Vec<u16> {
    let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
    wide.push(b':' as u16);
    wide.extend(stream_name.encode_utf16());
    wide.push(0);
    wide
}

fn win_code(err: &windows::core::Error) -> u32 {
    (err.code().0 as u32) & 0xFFFF
}

fn record_from(data: &WIN32_FIND_STREAM_DATA) -> StreamRecord {
    let len = data
        .cStreamName
        .iter()
        .position(|&c| c == 0)
        .unwrap_or(data.cStreamName.len());
    StreamRecord {
        raw_name: String::from_utf16_lossy(&data.cStreamName[..len]),
        size: data.StreamSize as u64,
    }
}

impl Device for NtfsDevice {
    fn toggle_compression(
        &self,
        tx: Option<&TransactionContext>,
        path: &Path,
        enable: bool,
    ) -> u32 {
        let wide = to_wide(path);
        let handle = unsafe {
            match tx {
                Some(tx) => CreateFileTransactedW(
                    PCWSTR(wide.as_ptr()),
                    (FILE_GENERIC_READ | FILE_GENERIC_WRITE).0,
                    FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                    None,
                    OPEN_EXISTING,
                    FILE_FLAG_BACKUP_SEMANTICS,
                    None,
                    HANDLE(tx.as_raw() as *mut c_void),
                    None,
                    None,
                ),
                None => CreateFileW(
                    PCWSTR(wide.as_ptr()),
                    (FILE_GENERIC_READ | FILE_GENERIC_WRITE).0,
                    FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                    None,
                    OPEN_EXISTING,
                    FILE_FLAG_BACKUP_SEMANTICS,
                    None,
                ),
            }
        };
        let handle = match handle {
            Ok(handle) => handle,
            Err(err) => return win_code(&err),
        };

        let state = if enable {
            COMPRESSION_FORMAT_DEFAULT
        } else {
            COMPRESSION_FORMAT_NONE
        };
        let mut returned = 0u32;
        let result = unsafe {
            DeviceIoControl(
                handle,
                FSCTL_SET_COMPRESSION,
                Some(&state as *const u16 as *const c_void),
                std::mem::size_of::<u16>() as u32,
                None,
                0,
                Some(&mut returned),
                None,
            )
        };
        let code = match result {
            Ok(()) => status::OK,
            Err(err) => win_code(&err),
        };
        unsafe {
            let _ = CloseHandle(handle);
        }
        code
    }

    fn transfer(
        &self,
        tx: Option<&TransactionContext>,
        src: &Path,
        dst: &Path,
        mode: &TransferMode,
        progress: &mut Progress<'_>,
    ) -> u32 {
        match mode {
            TransferMode::Copy(options) => copy_tree(tx, src, dst, options, progress),
            TransferMode::Move(options) => {
                let mut flags = MOVE_FILE_FLAGS(0);
                if options.replace_existing {
                    flags |= MOVEFILE_REPLACE_EXISTING;
                }
                let code = move_native(tx, src, dst, flags, progress);
                if code == status::NOT_SAME_DEVICE && options.copy_allowed {
                    // Directories never move across volumes natively.
                    let copy_options = CopyOptions {
                        fail_if_exists: !options.replace_existing,
                        no_buffering: false,
                        copy_symlinks: true,
                    };
                    let code = copy_tree(tx, src, dst, &copy_options, progress);
                    if code != status::OK {
                        return code;
                    }
                    match std::fs::remove_dir_all(src) {
                        Ok(()) => status::OK,
                        Err(err) => io_to_status(&err),
                    }
                } else {
                    code
                }
            }
        }
    }

    fn open_stream_find(
        &self,
        tx: Option<&TransactionContext>,
        path: &Path,
    ) -> std::result::Result<Option<(Box<dyn StreamFind>, StreamRecord)>, u32> {
        let wide = to_wide(path);
        let mut data = WIN32_FIND_STREAM_DATA::default();
        let handle = unsafe {
            match tx {
                Some(tx) => FindFirstStreamTransactedW(
                    PCWSTR(wide.as_ptr()),
                    FindStreamInfoStandard,
                    &mut data as *mut _ as *mut c_void,
                    0,
                    HANDLE(tx.as_raw() as *mut c_void),
                ),
                None => FindFirstStreamW(
                    PCWSTR(wide.as_ptr()),
                    FindStreamInfoStandard,
                    &mut data as *mut _ as *mut c_void,
                    0,
                ),
            }
        };
        match handle {
            Ok(handle) => Ok(Some((
                Box::new(NtfsStreamFind { handle }),
                record_from(&data),
            ))),
            Err(err) if win_code(&err) == ERROR_HANDLE_EOF.0 => Ok(None),
            Err(err) => Err(win_code(&err)),
        }
    }

    fn remove_stream(
        &self,
        tx: Option<&TransactionContext>,
        path: &Path,
        stream_name: &str,
    ) -> u32 {
        let wide = stream_path_wide(path, stream_name);
        let result = unsafe {
            match tx {
                Some(tx) => DeleteFileTransactedW(
                    PCWSTR(wide.as_ptr()),
                    HANDLE(tx.as_raw() as *mut c_void),
                ),
                None => DeleteFileW(PCWSTR(wide.as_ptr())),
            }
        };
        match result {
            Ok(()) => status::OK,
            Err(err) => win_code(&err),
        }
    }

    fn describe(
        &self,
        tx: Option<&TransactionContext>,
        path: &Path,
    ) -> std::result::Result<Option<EntryDescriptor>, u32> {
        let wide = to_wide(path);
        let mut data = WIN32_FIND_DATAW::default();
        let handle = unsafe {
            match tx {
                Some(tx) => FindFirstFileTransactedW(
                    PCWSTR(wide.as_ptr()),
                    FindExInfoBasic,
                    &mut data as *mut _ as *mut c_void,
                    FindExSearchNameMatch,
                    None,
                    FIND_FIRST_EX_FLAGS(0),
                    HANDLE(tx.as_raw() as *mut c_void),
                ),
                None => FindFirstFileW(PCWSTR(wide.as_ptr()), &mut data),
            }
        };
        match handle {
            Ok(handle) => {
                unsafe {
                    let _ = FindClose(handle);
                }
                Ok(Some(descriptor_from_find_data(path, &data)))
            }
            Err(err) => match win_code(&err) {
                status::FILE_NOT_FOUND | status::PATH_NOT_FOUND => Ok(None),
                code => Err(code),
            },
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

fn descriptor_from_find_data(path: &Path, data: &WIN32_FIND_DATAW) -> EntryDescriptor {
    let attributes = data.dwFileAttributes;
    let kind = if attributes & FILE_ATTRIBUTE_REPARSE_POINT != 0 {
        match data.dwReserved0 {
            IO_REPARSE_TAG_MOUNT_POINT => EntryKind::MountPoint,
            IO_REPARSE_TAG_SYMLINK => EntryKind::ReparsePoint,
            _ => EntryKind::ReparsePoint,
        }
    } else if attributes & crate::entry::FILE_ATTRIBUTE_DIRECTORY != 0 {
        EntryKind::Directory
    } else {
        EntryKind::File
    };
    EntryDescriptor {
        path: path.to_path_buf(),
        kind,
        attributes,
    }
}

struct NtfsStreamFind {
    handle: HANDLE,
}

// The find handle is only ever advanced from the owning cursor's thread.
unsafe impl Send for NtfsStreamFind {}

impl StreamFind for NtfsStreamFind {
    fn advance(&mut self) -> StreamAdvance {
        let mut data = WIN32_FIND_STREAM_DATA::default();
        let result =
            unsafe { FindNextStreamW(self.handle, &mut data as *mut _ as *mut c_void) };
        match result {
            Ok(()) => StreamAdvance::Next(record_from(&data)),
            Err(err) if win_code(&err) == ERROR_HANDLE_EOF.0 => StreamAdvance::End,
            Err(err) => StreamAdvance::Error(win_code(&err)),
        }
    }
}

impl Drop for NtfsStreamFind {
    fn drop(&mut self) {
        unsafe {
            let _ = FindClose(self.handle);
        }
    }
}

struct CallbackCtx<'a, 'b> {
    progress: &'a mut Progress<'b>,
    file_prev: u64,
}

unsafe extern "system" fn copy_progress_routine(
    _total_file_size: i64,
    total_bytes_transferred: i64,
    _stream_size: i64,
    _stream_bytes_transferred: i64,
    _stream_number: u32,
    _callback_reason: LPPROGRESS_ROUTINE_CALLBACK_REASON,
    _source_file: HANDLE,
    _destination_file: HANDLE,
    lpdata: *const c_void,
) -> u32 {
    let ctx = &mut *(lpdata as *mut CallbackCtx);
    let cumulative = total_bytes_transferred as u64;
    let delta = cumulative.saturating_sub(ctx.file_prev);
    ctx.file_prev = cumulative;
    match ctx.progress.report(delta) {
        ProgressAction::Continue => PROGRESS_CONTINUE,
        ProgressAction::Cancel => PROGRESS_CANCEL,
    }
}

fn copy_tree(
    tx: Option<&TransactionContext>,
    src: &Path,
    dst: &Path,
    options: &CopyOptions,
    progress: &mut Progress<'_>,
) -> u32 {
    let metadata = match std::fs::symlink_metadata(src) {
        Ok(metadata) => metadata,
        Err(err) => return io_to_status(&err),
    };

    if metadata.is_dir() {
        if dst.exists() {
            if options.fail_if_exists {
                return status::ALREADY_EXISTS;
            }
        } else if let Err(err) = std::fs::create_dir_all(dst) {
            return io_to_status(&err);
        }

        let entries = match std::fs::read_dir(src) {
            Ok(entries) => entries,
            Err(err) => return io_to_status(&err),
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => return io_to_status(&err),
            };
            let code = copy_tree(
                tx,
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
    } else {
        copy_file_native(tx, src, dst, options, progress)
    }
}

fn copy_file_native(
    tx: Option<&TransactionContext>,
    src: &Path,
    dst: &Path,
    options: &CopyOptions,
    progress: &mut Progress<'_>,
) -> u32 {
    let src_wide = to_wide(src);
    let dst_wide = to_wide(dst);

    let mut flags = 0u32;
    if options.fail_if_exists {
        flags |= COPY_FILE_FAIL_IF_EXISTS;
    }
    if options.no_buffering {
        flags |= COPY_FILE_NO_BUFFERING;
    }
    if options.copy_symlinks {
        flags |= COPY_FILE_COPY_SYMLINK;
    }

    let mut ctx = CallbackCtx {
        progress,
        file_prev: 0,
    };
    let result = unsafe {
        match tx {
            Some(tx) => CopyFileTransactedW(
                PCWSTR(src_wide.as_ptr()),
                PCWSTR(dst_wide.as_ptr()),
                Some(copy_progress_routine),
                Some(&mut ctx as *mut _ as *const c_void),
                None,
                flags,
                HANDLE(tx.as_raw() as *mut c_void),
            ),
            None => CopyFileExW(
                PCWSTR(src_wide.as_ptr()),
                PCWSTR(dst_wide.as_ptr()),
                Some(copy_progress_routine),
                Some(&mut ctx as *mut _ as *const c_void),
                None,
                flags,
            ),
        }
    };
    match result {
        Ok(()) => status::OK,
        Err(err) => win_code(&err),
    }
}

fn move_native(
    tx: Option<&TransactionContext>,
    src: &Path,
    dst: &Path,
    flags: MOVE_FILE_FLAGS,
    progress: &mut Progress<'_>,
) -> u32 {
    let src_wide = to_wide(src);
    let dst_wide = to_wide(dst);

    let mut ctx = CallbackCtx {
        progress,
        file_prev: 0,
    };
    let result = unsafe {
        match tx {
            Some(tx) => MoveFileTransactedW(
                PCWSTR(src_wide.as_ptr()),
                PCWSTR(dst_wide.as_ptr()),
                Some(copy_progress_routine),
                Some(&mut ctx as *mut _ as *const c_void),
                flags,
                HANDLE(tx.as_raw() as *mut c_void),
            ),
            None => MoveFileWithProgressW(
                PCWSTR(src_wide.as_ptr()),
                PCWSTR(dst_wide.as_ptr()),
                Some(copy_progress_routine),
                Some(&mut ctx as *mut _ as *const c_void),
                flags,
            ),
        }
    };
    match result {
        Ok(()) => status::OK,
        Err(err) => win_code(&err),
    }
}
