//! Recursive copy and move
//!
//! Path resolution, option translation, and result shaping happen here; the
//! byte work and the subtree recursion are the device's.

use crate::device::{platform_device, status, status_to_error, Device, TransactionContext};
use crate::{long_path, Result};
use std::path::{Path, PathBuf};

/// Copy behavior flags.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Fail when the destination already exists instead of overwriting.
    pub fail_if_exists: bool,
    /// Hint the device to bypass write buffering (large transfers).
    pub no_buffering: bool,
    /// Copy reparse points themselves instead of their targets.
    pub copy_symlinks: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            fail_if_exists: true,
            no_buffering: false,
            copy_symlinks: false,
        }
    }
}

/// Move behavior flags.
#[derive(Debug, Clone)]
pub struct MoveOptions {
    /// Replace an existing destination.
    pub replace_existing: bool,
    /// Allow copy-then-delete when the destination is on another volume.
    pub copy_allowed: bool,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            replace_existing: false,
            copy_allowed: true,
        }
    }
}

/// Copy or move, selected by which option set the caller supplies.
#[derive(Debug, Clone)]
pub enum TransferMode {
    Copy(CopyOptions),
    Move(MoveOptions),
}

/// Decision returned by a progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressAction {
    Continue,
    Cancel,
}

/// Cumulative progress tracker threaded through a device transfer.
///
/// The device reports byte deltas; the caller-supplied sink observes the
/// running total and may request cancellation.
pub struct Progress<'a> {
    transferred: u64,
    sink: Option<&'a mut dyn FnMut(u64) -> ProgressAction>,
}

impl<'a> Progress<'a> {
    pub fn new(sink: Option<&'a mut dyn FnMut(u64) -> ProgressAction>) -> Self {
        Self {
            transferred: 0,
            sink,
        }
    }

    /// Record `delta` more bytes and consult the sink.
    pub fn report(&mut self, delta: u64) -> ProgressAction {
        self.transferred += delta;
        match self.sink.as_mut() {
            Some(sink) => sink(self.transferred),
            None => ProgressAction::Continue,
        }
    }

    /// Cumulative bytes reported so far.
    pub fn transferred(&self) -> u64 {
        self.transferred
    }
}

/// How a transfer finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed,
    /// The progress callback requested an abort; the destination holds a
    /// prefix of at most this many bytes.
    Canceled { bytes_transferred: u64 },
}

/// Outcome plus the destination path as actually resolved.
#[derive(Debug, Clone)]
pub struct TransferResult {
    pub destination: PathBuf,
    pub outcome: TransferOutcome,
}

/// Copy a directory tree. See [`CopyOptions`] for the overwrite policy.
pub fn copy_directory<P: AsRef<Path>, Q: AsRef<Path>>(
    src: P,
    dst: Q,
    preserve_dates: bool,
    options: CopyOptions,
    progress: Option<&mut dyn FnMut(u64) -> ProgressAction>,
) -> Result<TransferResult> {
    copy_move(
        platform_device().as_ref(),
        None,
        src.as_ref(),
        dst.as_ref(),
        preserve_dates,
        TransferMode::Copy(options),
        progress,
    )
}

/// Move a directory tree, falling back to copy-then-delete across volumes
/// when the options allow it.
pub fn move_directory<P: AsRef<Path>, Q: AsRef<Path>>(
    src: P,
    dst: Q,
    options: MoveOptions,
    progress: Option<&mut dyn FnMut(u64) -> ProgressAction>,
) -> Result<TransferResult> {
    copy_move(
        platform_device().as_ref(),
        None,
        src.as_ref(),
        dst.as_ref(),
        false,
        TransferMode::Move(options),
        progress,
    )
}

pub(crate) fn copy_move(
    device: &dyn Device,
    tx: Option<&TransactionContext>,
    src: &Path,
    dst: &Path,
    preserve_dates: bool,
    mode: TransferMode,
    sink: Option<&mut dyn FnMut(u64) -> ProgressAction>,
) -> Result<TransferResult> {
    let src_lp = long_path::resolve_full(src)?;
    // The destination is resolved exactly once, before any native call.
    let dst_lp = long_path::resolve_full(dst)?;

    let mut progress = Progress::new(sink);
    let code = device.transfer(tx, &src_lp, &dst_lp, &mode, &mut progress);

    match code {
        status::OK => {
            if preserve_dates && matches!(mode, TransferMode::Copy(_)) {
                let ts = device.mirror_timestamps(&src_lp, &dst_lp);
                if ts != status::OK {
                    // Timestamp mismatch is a degradation, not a failure.
                    tracing::warn!(
                        code = ts,
                        src = %src_lp.display(),
                        dst = %dst_lp.display(),
                        "could not mirror timestamps"
                    );
                }
            }
            tracing::info!(
                src = %src_lp.display(),
                dst = %dst_lp.display(),
                bytes = progress.transferred(),
                "transfer completed"
            );
            Ok(TransferResult {
                destination: dst_lp,
                outcome: TransferOutcome::Completed,
            })
        }
        status::REQUEST_ABORTED => {
            tracing::info!(
                dst = %dst_lp.display(),
                bytes = progress.transferred(),
                "transfer canceled by caller"
            );
            Ok(TransferResult {
                destination: dst_lp,
                outcome: TransferOutcome::Canceled {
                    bytes_transferred: progress.transferred(),
                },
            })
        }
        code => Err(status_to_error(code, &dst_lp)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDevice, TransferPlan};
    use crate::FsError;

    #[test]
    fn test_canceled_outcome_carries_partial_count() {
        let device = MockDevice {
            transfer_plan: TransferPlan::Chunks(vec![10, 10, 10]),
            ..Default::default()
        };

        let mut cancel_after = 2u32;
        let mut sink = |_bytes: u64| {
            cancel_after -= 1;
            if cancel_after == 0 {
                ProgressAction::Cancel
            } else {
                ProgressAction::Continue
            }
        };

        let result = copy_move(
            &device,
            None,
            "/src".as_ref(),
            "/dst".as_ref(),
            false,
            TransferMode::Copy(CopyOptions::default()),
            Some(&mut sink),
        )
        .unwrap();

        assert_eq!(
            result.outcome,
            TransferOutcome::Canceled {
                bytes_transferred: 20
            }
        );
    }

    #[test]
    fn test_timestamp_fix_failure_is_non_fatal() {
        let device = MockDevice {
            transfer_plan: TransferPlan::Chunks(vec![10]),
            mirror_status: crate::status::NOT_SUPPORTED,
            ..Default::default()
        };

        let result = copy_move(
            &device,
            None,
            "/src".as_ref(),
            "/dst".as_ref(),
            true,
            TransferMode::Copy(CopyOptions::default()),
            None,
        )
        .unwrap();

        assert_eq!(result.outcome, TransferOutcome::Completed);
        assert_eq!(device.mirror_calls(), 1);
    }

    #[test]
    fn test_native_failure_maps_to_error() {
        let device = MockDevice {
            transfer_plan: TransferPlan::Fail(crate::status::ACCESS_DENIED),
            ..Default::default()
        };

        let err = copy_move(
            &device,
            None,
            "/src".as_ref(),
            "/dst".as_ref(),
            false,
            TransferMode::Copy(CopyOptions::default()),
            None,
        )
        .unwrap_err();

        assert!(matches!(err, FsError::AccessDenied(_)));
    }

    #[test]
    fn test_move_never_mirrors_timestamps() {
        let device = MockDevice {
            transfer_plan: TransferPlan::Chunks(vec![10]),
            ..Default::default()
        };

        copy_move(
            &device,
            None,
            "/src".as_ref(),
            "/dst".as_ref(),
            false,
            TransferMode::Move(MoveOptions::default()),
            None,
        )
        .unwrap();

        assert_eq!(device.mirror_calls(), 0);
    }
}
