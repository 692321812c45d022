//! WAL writer: record framing, page flushing, segment rotation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::metrics::WalMetrics;
use crate::options::WalOptions;
use crate::util::filename::create_dir_if_missing;
use crate::{Error, Result};

use super::page::Page;
use super::segment::{last_segment, Segment, SegmentRef};
use super::worker::{RetirementJob, Worker};
use super::{RecordType, HEADER_SIZE, PAGE_SIZE};

/// A durable, paged, append-only log over a directory of segment files.
///
/// One writer owns the log: all appends serialize on an internal lock.
/// Retired segments are fsynced and closed by a background worker so
/// rotation does not stall the append path.
#[derive(Debug)]
pub struct Wal {
    dir: PathBuf,
    segment_size: usize,
    extension: String,
    metrics: Arc<WalMetrics>,
    inner: Mutex<WalInner>,
}

/// Writer state guarded by the exclusive lock.
#[derive(Debug)]
struct WalInner {
    segment: Option<Segment>,
    page: Page,
    done_pages: usize,
    closed: bool,
    worker: Worker,
}

impl Wal {
    /// Open a log over `dir`, creating the directory if needed.
    ///
    /// Always begins a fresh segment: one past the highest existing
    /// index, or 0 for an empty directory. Prior segments are never
    /// appended to again.
    pub fn open(
        dir: impl AsRef<Path>,
        options: WalOptions,
        metrics: Arc<WalMetrics>,
    ) -> Result<Self> {
        options.validate()?;

        let dir = dir.as_ref().to_path_buf();
        create_dir_if_missing(&dir)?;

        let index = match last_segment(&dir)? {
            Some(last) => last.index + 1,
            None => 0,
        };

        let segment = Segment::create(&dir, index, &options.extension)?;
        let done_pages = (segment.stat()? / PAGE_SIZE as u64) as usize;
        debug!(segment = index, "wal opened on fresh segment");

        Ok(Self {
            dir,
            segment_size: options.segment_size,
            extension: options.extension,
            metrics,
            inner: Mutex::new(WalInner {
                segment: Some(segment),
                page: Page::new(),
                done_pages,
                closed: false,
                worker: Worker::spawn(),
            }),
        })
    }

    /// Append one record.
    ///
    /// The payload is framed into one or more fragments; `base_offset`
    /// is opaque caller metadata, except that it names the index of the
    /// next segment if this append forces a rotation. On return the
    /// record is in the active segment's flushed tail; it becomes
    /// durable when the segment is retired or the log is stopped.
    pub fn log(&self, payload: &[u8], base_offset: u64) -> Result<()> {
        let mut inner = self.inner.lock();

        if let Err(e) = self.log_record(&mut inner, payload, base_offset, true) {
            self.metrics.writes_failed.inc();
            return Err(e);
        }

        Ok(())
    }

    fn log_record(
        &self,
        inner: &mut WalInner,
        mut payload: &[u8],
        base_offset: u64,
        last: bool,
    ) -> Result<()> {
        if inner.closed {
            return Err(Error::WalClosed);
        }

        if inner.page.is_full() {
            self.flush_page(inner, true)?;
        }

        // Net capacity of the active segment: the rest of the current
        // page plus every untouched page, less a header per fragment.
        let pages_left =
            self.pages_per_segment() as i64 - inner.done_pages as i64 - 1;
        let mut left = (inner.page.remaining() - HEADER_SIZE) as i64;
        left += (PAGE_SIZE - HEADER_SIZE) as i64 * pages_left;

        if payload.len() as i64 > left {
            self.next_segment(inner, true, base_offset)?;
        }

        let mut i = 0;
        loop {
            let n = payload.len().min(inner.page.remaining() - HEADER_SIZE);
            let (chunk, rest) = payload.split_at(n);

            let rec_type = match (i, rest.is_empty()) {
                (0, true) => RecordType::Full,
                (_, true) => RecordType::Last,
                (0, false) => RecordType::First,
                _ => RecordType::Middle,
            };

            inner.page.append_fragment(rec_type, chunk);

            if inner.page.is_full() {
                self.flush_page(inner, true)?;
            }

            payload = rest;
            i += 1;
            if payload.is_empty() {
                break;
            }
        }

        if last && inner.page.alloc() > 0 {
            self.flush_page(inner, false)?;
        }

        Ok(())
    }

    /// Write the page's unflushed slice to the active segment.
    ///
    /// With `clear` (or once the page is full) the page is padded to its
    /// end with zeros, written, reset, and counted as done. Without it
    /// only the pending tail is emitted and the page stays open for more
    /// fragments. `flushed` advances by exactly what the OS accepted, so
    /// a retry after an error does not duplicate bytes.
    fn flush_page(&self, inner: &mut WalInner, clear: bool) -> Result<()> {
        self.metrics.page_flushes.inc();

        let clear = clear || inner.page.is_full();
        if clear {
            inner.page.mark_full();
        }

        let WalInner { segment, page, .. } = inner;
        let segment = segment.as_mut().ok_or(Error::WalClosed)?;

        while page.flushed() < page.alloc() {
            match segment.write(page.data()) {
                Ok(0) => {
                    return Err(Error::Io("segment write returned zero bytes".into()))
                }
                Ok(n) => page.advance_flushed(n),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        if clear {
            inner.page.reset();
            inner.done_pages += 1;
            self.metrics.page_completions.inc();
        }

        Ok(())
    }

    /// Rotate to a new segment at index `offset` and retire the old one.
    fn next_segment(&self, inner: &mut WalInner, async_retire: bool, offset: u64) -> Result<()> {
        if inner.closed {
            return Err(Error::WalClosed);
        }

        if inner.page.alloc() > 0 {
            self.flush_page(inner, true)?;
        }

        let next = Segment::create(&self.dir, offset, &self.extension)?;
        let done_pages = (next.stat()? / PAGE_SIZE as u64) as usize;

        let prev = inner.segment.replace(next);
        inner.done_pages = done_pages;

        if let Some(prev) = prev {
            debug!(from = prev.index(), to = offset, "rotating segment");
            let metrics = Arc::clone(&self.metrics);
            let job: RetirementJob = Box::new(move || retire(prev, &metrics));

            if async_retire {
                inner.worker.submit(job);
            } else {
                job();
            }
        }

        Ok(())
    }

    /// Stop the log: pad and flush the tail page, drain the worker, and
    /// make the active segment durable.
    ///
    /// fsync/close failures on the final segment are logged and counted
    /// but do not prevent closure.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock();

        if inner.closed {
            return Err(Error::WalAlreadyClosed);
        }

        // Never flush an empty page: a padded empty page would read as
        // a completed page if this directory is written to again.
        if inner.page.alloc() > 0 {
            self.flush_page(&mut inner, true)?;
        }

        inner.worker.stop();

        if let Some(segment) = inner.segment.take() {
            retire(segment, &self.metrics);
        }

        inner.closed = true;
        Ok(())
    }

    /// A reference to the segment currently being written, or `None`
    /// once the log is stopped.
    pub fn active_segment_ref(&self) -> Option<SegmentRef> {
        self.inner.lock().segment.as_ref().map(Segment::segment_ref)
    }

    /// The directory this log writes to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn pages_per_segment(&self) -> usize {
        self.segment_size / PAGE_SIZE
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// fsync then close a segment, observing the sync duration. Failures
/// are logged only: the segment's records are already in the writer's
/// durable pipeline and the handle is released either way.
fn retire(segment: Segment, metrics: &WalMetrics) {
    let index = segment.index();

    let start = Instant::now();
    if let Err(e) = segment.sync() {
        warn!(segment = index, error = %e, "failed to sync retired segment");
    }
    metrics.fsync_duration.observe_duration(start);

    if let Err(e) = segment.close() {
        warn!(segment = index, error = %e, "failed to close retired segment");
    }
}
