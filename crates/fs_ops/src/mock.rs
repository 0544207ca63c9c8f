//! Scripted device for exercising the traversal and cursor protocols.

use crate::device::{status, Device, StreamAdvance, StreamFind, StreamRecord, TransactionContext};
use crate::entry::{EntryDescriptor, EntryKind};
use crate::transfer::{Progress, ProgressAction, TransferMode};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub(crate) enum TransferPlan {
    /// Report these byte deltas through the progress sink, then succeed.
    Chunks(Vec<u64>),
    Fail(u32),
}

impl Default for TransferPlan {
    fn default() -> Self {
        Self::Chunks(Vec::new())
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) enum DescribePlan {
    #[default]
    Absent,
    Found(EntryKind),
    Fail(u32),
}

#[derive(Default)]
pub(crate) struct MockDevice {
    /// Records served by open/advance, in order.
    pub streams: Vec<StreamRecord>,
    /// Status reported by the open call itself.
    pub stream_open_error: Option<u32>,
    /// Advance error injected once the records run out.
    pub stream_fail_code: Option<u32>,
    /// Fail the Nth toggle call (0-based) with the given code.
    pub toggle_fail_at: Option<(usize, u32)>,
    pub transfer_plan: TransferPlan,
    pub mirror_status: u32,
    pub describe_plan: DescribePlan,
    pub remove_stream_status: u32,

    pub toggles: Mutex<Vec<(PathBuf, bool)>>,
    pub mirror_count: AtomicUsize,
    pub live_handles: Arc<AtomicUsize>,
    pub last_tx: Mutex<Option<Option<isize>>>,
}

impl MockDevice {
    pub fn toggles(&self) -> Vec<(PathBuf, bool)> {
        self.toggles.lock().unwrap().clone()
    }

    pub fn mirror_calls(&self) -> usize {
        self.mirror_count.load(Ordering::SeqCst)
    }

    /// Stream-find handles currently open.
    pub fn open_handles(&self) -> usize {
        self.live_handles.load(Ordering::SeqCst)
    }

    /// Raw transaction handle seen by the most recent call, if any call was
    /// made.
    pub fn last_transaction(&self) -> Option<isize> {
        self.last_tx.lock().unwrap().clone().flatten()
    }

    fn note_tx(&self, tx: Option<&TransactionContext>) {
        *self.last_tx.lock().unwrap() = Some(tx.map(TransactionContext::as_raw));
    }
}

impl Device for MockDevice {
    fn toggle_compression(
        &self,
        tx: Option<&TransactionContext>,
        path: &Path,
        enable: bool,
    ) -> u32 {
        self.note_tx(tx);
        let mut toggles = self.toggles.lock().unwrap();
        let index = toggles.len();
        toggles.push((path.to_path_buf(), enable));
        match self.toggle_fail_at {
            Some((at, code)) if at == index => code,
            _ => status::OK,
        }
    }

    fn transfer(
        &self,
        tx: Option<&TransactionContext>,
        _src: &Path,
        _dst: &Path,
        _mode: &TransferMode,
        progress: &mut Progress<'_>,
    ) -> u32 {
        self.note_tx(tx);
        match &self.transfer_plan {
            TransferPlan::Chunks(chunks) => {
                for &chunk in chunks {
                    if progress.report(chunk) == ProgressAction::Cancel {
                        return status::REQUEST_ABORTED;
                    }
                }
                status::OK
            }
            TransferPlan::Fail(code) => *code,
        }
    }

    fn open_stream_find(
        &self,
        tx: Option<&TransactionContext>,
        _path: &Path,
    ) -> std::result::Result<Option<(Box<dyn StreamFind>, StreamRecord)>, u32> {
        self.note_tx(tx);
        if let Some(code) = self.stream_open_error {
            return Err(code);
        }
        let mut queue: VecDeque<StreamRecord> = self.streams.iter().cloned().collect();
        match queue.pop_front() {
            Some(first) => {
                self.live_handles.fetch_add(1, Ordering::SeqCst);
                let find = MockStreamFind {
                    queue,
                    fail_code: self.stream_fail_code,
                    live_handles: Arc::clone(&self.live_handles),
                };
                Ok(Some((Box::new(find), first)))
            }
            None => Ok(None),
        }
    }

    fn remove_stream(
        &self,
        tx: Option<&TransactionContext>,
        _path: &Path,
        _stream_name: &str,
    ) -> u32 {
        self.note_tx(tx);
        self.remove_stream_status
    }

    fn describe(
        &self,
        tx: Option<&TransactionContext>,
        path: &Path,
    ) -> std::result::Result<Option<EntryDescriptor>, u32> {
        self.note_tx(tx);
        match &self.describe_plan {
            DescribePlan::Absent => Ok(None),
            DescribePlan::Found(kind) => Ok(Some(EntryDescriptor {
                path: path.to_path_buf(),
                kind: *kind,
                attributes: 0,
            })),
            DescribePlan::Fail(code) => Err(*code),
        }
    }

    fn mirror_timestamps(&self, _src: &Path, _dst: &Path) -> u32 {
        self.mirror_count.fetch_add(1, Ordering::SeqCst);
        self.mirror_status
    }
}

struct MockStreamFind {
    queue: VecDeque<StreamRecord>,
    fail_code: Option<u32>,
    live_handles: Arc<AtomicUsize>,
}

impl StreamFind for MockStreamFind {
    fn advance(&mut self) -> StreamAdvance {
        if let Some(record) = self.queue.pop_front() {
            return StreamAdvance::Next(record);
        }
        match self.fail_code.take() {
            Some(code) => StreamAdvance::Error(code),
            None => StreamAdvance::End,
        }
    }
}

impl Drop for MockStreamFind {
    fn drop(&mut self) {
        self.live_handles.fetch_sub(1, Ordering::SeqCst);
    }
}
