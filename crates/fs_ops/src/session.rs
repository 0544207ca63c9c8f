//! One-stop operation surface
//!
//! A [`Session`] binds a device implementation and an optional kernel
//! transaction; every public operation is available as a method. The
//! module-level free functions are shorthands over `Session::new()`.

use crate::device::{platform_device, Device, TransactionContext};
use crate::entry::{EntryDescriptor, EntryFilter, EnumerateOptions};
use crate::streams::StreamCursor;
use crate::transfer::{CopyOptions, MoveOptions, ProgressAction, TransferMode, TransferResult};
use crate::{junction, streams, transfer, tree, Result};
use std::path::Path;

pub struct Session {
    device: Box<dyn Device>,
    transaction: Option<TransactionContext>,
}

impl Session {
    /// Session over the platform's default device.
    pub fn new() -> Self {
        Self {
            device: platform_device(),
            transaction: None,
        }
    }

    /// Session over a caller-supplied device.
    pub fn with_device(device: Box<dyn Device>) -> Self {
        Self {
            device,
            transaction: None,
        }
    }

    /// Thread a kernel transaction through every native call made by this
    /// session.
    pub fn transacted(mut self, tx: TransactionContext) -> Self {
        self.transaction = Some(tx);
        self
    }

    fn tx(&self) -> Option<&TransactionContext> {
        self.transaction.as_ref()
    }

    pub fn compress_tree<P: AsRef<Path>>(
        &self,
        root: P,
        options: EnumerateOptions,
        filter: Option<&EntryFilter>,
    ) -> Result<()> {
        tree::toggle_tree(
            self.device.as_ref(),
            self.tx(),
            root.as_ref(),
            options,
            filter,
            true,
        )
    }

    pub fn decompress_tree<P: AsRef<Path>>(
        &self,
        root: P,
        options: EnumerateOptions,
        filter: Option<&EntryFilter>,
    ) -> Result<()> {
        tree::toggle_tree(
            self.device.as_ref(),
            self.tx(),
            root.as_ref(),
            options,
            filter,
            false,
        )
    }

    pub fn copy_directory<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        src: P,
        dst: Q,
        preserve_dates: bool,
        options: CopyOptions,
        progress: Option<&mut dyn FnMut(u64) -> ProgressAction>,
    ) -> Result<TransferResult> {
        transfer::copy_move(
            self.device.as_ref(),
            self.tx(),
            src.as_ref(),
            dst.as_ref(),
            preserve_dates,
            TransferMode::Copy(options),
            progress,
        )
    }

    pub fn move_directory<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        src: P,
        dst: Q,
        options: MoveOptions,
        progress: Option<&mut dyn FnMut(u64) -> ProgressAction>,
    ) -> Result<TransferResult> {
        transfer::copy_move(
            self.device.as_ref(),
            self.tx(),
            src.as_ref(),
            dst.as_ref(),
            false,
            TransferMode::Move(options),
            progress,
        )
    }

    pub fn alternate_streams<P: AsRef<Path>>(&self, path: P) -> Result<StreamCursor> {
        StreamCursor::open(self.device.as_ref(), self.tx(), path.as_ref())
    }

    pub fn remove_alternate_stream<P: AsRef<Path>>(
        &self,
        path: P,
        stream_name: &str,
    ) -> Result<()> {
        streams::remove_stream_core(self.device.as_ref(), self.tx(), path.as_ref(), stream_name)
    }

    pub fn is_junction<P: AsRef<Path>>(&self, path: P) -> bool {
        junction::is_junction_core(self.device.as_ref(), self.tx(), path.as_ref())
    }

    pub fn describe<P: AsRef<Path>>(&self, path: P) -> Result<Option<EntryDescriptor>> {
        junction::describe_core(self.device.as_ref(), self.tx(), path.as_ref())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
