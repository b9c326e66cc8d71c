/// Half-duplex virtual medium.
///
/// A `Medium` is a one-way byte pipe: a bounded, FIFO-evicting buffer
/// plus a `written` counter and a `busy` flag. It is not itself a
/// frame protocol. Two instances make up a station-to-AP link: one
/// uplink (STA→AP) and one downlink (AP→STA, effectively broadcast
/// since every waiting station sender reads it). Because the downlink
/// may have several concurrent readers, each reader owns its own
/// cursor into the stream rather than sharing one.
///
/// Bytes are written one at a time with a cooperative yield between
/// each, mirroring the reference implementation's per-byte
/// `sched_yield()` write loop. This is what lets two concurrent
/// senders' frames interleave and get garbled without any dedicated
/// collision-injection logic: the CRC on the resulting byte soup
/// simply fails to validate at the reader.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::errors::{Result, SimError};
use crate::timer::Timer;

pub struct Medium {
    buffer: Mutex<VecDeque<u8>>,
    /// Stream offset of `buffer`'s front byte; bytes before this
    /// offset have been evicted.
    base: AtomicU64,
    /// Total bytes ever written.
    written: AtomicU64,
    busy: AtomicBool,
    capacity: usize,
    notify: Notify,
}

impl Medium {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            base: AtomicU64::new(0),
            written: AtomicU64::new(0),
            busy: AtomicBool::new(false),
            capacity,
            notify: Notify::new(),
        }
    }

    /// Total bytes written to this medium so far.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::SeqCst)
    }

    /// A fresh reader cursor positioned at the current write head,
    /// i.e. it will only observe bytes written from this point on.
    pub fn cursor(&self) -> u64 {
        self.written()
    }

    pub fn set_busy(&self, b: bool) {
        self.busy.store(b, Ordering::SeqCst);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Append `bytes` to the stream, one byte at a time, yielding
    /// cooperatively between each so concurrent writers can interleave.
    pub async fn write(&self, bytes: &[u8]) {
        for &b in bytes {
            {
                let mut buf = self.buffer.lock().unwrap();
                buf.push_back(b);
                if buf.len() > self.capacity {
                    buf.pop_front();
                    self.base.fetch_add(1, Ordering::SeqCst);
                }
            }
            self.written.fetch_add(1, Ordering::SeqCst);
            self.notify.notify_waiters();
            tokio::task::yield_now().await;
        }
    }

    /// Block until `n` bytes are available at `*pos`, or until `timer`
    /// fires, whichever comes first. On success, `*pos` advances by
    /// `n`. The timer is polled on every wakeup rather than only once
    /// at the end, so a timeout armed while we're still waiting on the
    /// RTS's DATA half is noticed promptly instead of only after the
    /// next byte happens to arrive.
    pub async fn read_exact(&self, pos: &mut u64, n: usize, timer: &Timer) -> Result<Vec<u8>> {
        loop {
            if self.written().saturating_sub(*pos) >= n as u64 {
                let base = self.base.load(Ordering::SeqCst);
                let start = (*pos - base) as usize;
                let out = {
                    let buf = self.buffer.lock().unwrap();
                    buf.iter().skip(start).take(n).copied().collect::<Vec<u8>>()
                };
                if out.len() == n {
                    *pos += n as u64;
                    return Ok(out);
                }
                // Bytes we needed were evicted before we could read them;
                // treat as a timeout rather than fabricating data.
                return Err(SimError::TimedOut);
            }
            if timer.has_fired() {
                return Err(SimError::TimedOut);
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(std::time::Duration::from_micros(50)) => {}
            }
            tokio::task::yield_now().await;
        }
    }
}
