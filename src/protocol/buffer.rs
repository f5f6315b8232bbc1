//! Shared response buffer for one file-read round trip.
//!
//! Layout (little-endian 32-bit words):
//!
//! ```text
//! word 0      status / control word (wait + notify target)
//! word 1      payload length in bytes
//! bytes 8..   payload (UTF-8 text or raw bytes)
//! ```
//!
//! The worker allocates a fresh buffer per request, marks it pending, hands a
//! clone to the host and blocks in [`SharedBuffer::wait`]. The host writes the
//! payload and length first, the control word last, and then calls
//! [`SharedBuffer::notify`] exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use super::status::{ReadError, Status, STATUS_PENDING, STATUS_SUCCESS};

/// Size of one buffer word in bytes.
pub const WORD_BYTES: usize = 4;

/// Number of header words (status + length).
pub const HEADER_WORDS: usize = 2;

/// Size of the header in bytes.
pub const HEADER_BYTES: usize = HEADER_WORDS * WORD_BYTES;

/// Upper bound on a buffer allocation (100 MB).
pub const MAX_BYTES: usize = 100_000_000;

/// Number of words needed to hold a payload of `payload_len` bytes plus the header.
pub fn required_words(payload_len: usize) -> usize {
    (payload_len + HEADER_BYTES).div_ceil(WORD_BYTES)
}

/// Cheaply clonable handle to a shared response region.
#[derive(Clone)]
pub struct SharedBuffer {
    inner: Arc<Inner>,
}

struct Inner {
    region: Mutex<Region>,
    wake: Condvar,
    notifications: AtomicUsize,
}

struct Region {
    bytes: Vec<u8>,
    notified: bool,
}

impl Region {
    fn word(&self, index: usize) -> i32 {
        let start = index * WORD_BYTES;
        let mut raw = [0u8; WORD_BYTES];
        raw.copy_from_slice(&self.bytes[start..start + WORD_BYTES]);
        i32::from_le_bytes(raw)
    }

    fn set_word(&mut self, index: usize, value: i32) {
        let start = index * WORD_BYTES;
        self.bytes[start..start + WORD_BYTES].copy_from_slice(&value.to_le_bytes());
    }

    fn capacity_words(&self) -> usize {
        self.bytes.len() / WORD_BYTES
    }
}

impl SharedBuffer {
    /// Allocate a pending buffer holding just the header.
    pub fn new() -> Self {
        Self::with_capacity_words(HEADER_WORDS)
    }

    /// Allocate a pending buffer with room for `words` words (at least the header).
    pub fn with_capacity_words(words: usize) -> Self {
        let words = words.max(HEADER_WORDS);
        let mut region = Region {
            bytes: vec![0; words * WORD_BYTES],
            notified: false,
        };
        region.set_word(0, STATUS_PENDING);

        Self {
            inner: Arc::new(Inner {
                region: Mutex::new(region),
                wake: Condvar::new(),
                notifications: AtomicUsize::new(0),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Region> {
        self.inner
            .region
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current capacity in words.
    pub fn capacity_words(&self) -> usize {
        self.lock().capacity_words()
    }

    /// Raw control word.
    pub fn status_word(&self) -> i32 {
        self.lock().word(0)
    }

    /// Decoded control word.
    pub fn status(&self) -> Status {
        Status::from_word(self.status_word())
    }

    /// Recorded payload length (word 1).
    pub fn payload_len(&self) -> usize {
        self.lock().word(1).max(0) as usize
    }

    /// Number of times [`notify`](Self::notify) has been called.
    pub fn notify_count(&self) -> usize {
        self.inner.notifications.load(Ordering::SeqCst)
    }

    /// Grow the allocation to at least `min_words` words. Never shrinks.
    pub fn grow(&self, min_words: usize) -> Result<(), ReadError> {
        let mut region = self.lock();
        Self::grow_region(&mut region, min_words)
    }

    fn grow_region(region: &mut Region, min_words: usize) -> Result<(), ReadError> {
        if min_words <= region.capacity_words() {
            return Ok(());
        }
        if min_words * WORD_BYTES > MAX_BYTES {
            return Err(ReadError::Generic);
        }
        region.bytes.resize(min_words * WORD_BYTES, 0);
        Ok(())
    }

    /// Write a successful response: payload, then length, then status 0.
    ///
    /// Grows the allocation first if the payload does not fit. On overflow the
    /// buffer is left untouched and [`ReadError::Generic`] is returned.
    pub fn write_success(&self, payload: &[u8]) -> Result<(), ReadError> {
        let len = i32::try_from(payload.len()).map_err(|_| ReadError::Generic)?;
        let mut region = self.lock();

        let needed = required_words(payload.len());
        if region.capacity_words() < needed {
            Self::grow_region(&mut region, needed)?;
        }

        region.bytes[HEADER_BYTES..HEADER_BYTES + payload.len()].copy_from_slice(payload);
        region.set_word(1, len);
        region.set_word(0, STATUS_SUCCESS);
        Ok(())
    }

    /// Write a failure code into the control word.
    pub fn write_failure(&self, error: ReadError) {
        let mut region = self.lock();
        region.set_word(1, 0);
        region.set_word(0, error.code());
    }

    /// Wake the waiting worker.
    pub fn notify(&self) {
        {
            let mut region = self.lock();
            region.notified = true;
            self.inner.notifications.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.wake.notify_all();
    }

    /// Whether [`notify`](Self::notify) has been called.
    pub fn is_notified(&self) -> bool {
        self.lock().notified
    }

    /// Answer Generic and notify, unless the buffer was already notified.
    ///
    /// Checks and notifies under one lock, so a concurrent answer is never
    /// overwritten and the waiter is woken exactly once.
    pub fn release(&self) {
        {
            let mut region = self.lock();
            if region.notified {
                return;
            }
            if Status::from_word(region.word(0)) == Status::Pending {
                region.set_word(1, 0);
                region.set_word(0, ReadError::Generic.code());
            }
            region.notified = true;
            self.inner.notifications.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.wake.notify_all();
    }

    /// Block until the host notifies, then decode the response.
    ///
    /// A buffer that was notified while still pending is reported as
    /// [`ReadError::Generic`].
    pub fn wait(&self) -> Result<Vec<u8>, ReadError> {
        let mut region = self.lock();
        while !region.notified {
            region = self
                .inner
                .wake
                .wait(region)
                .unwrap_or_else(PoisonError::into_inner);
        }

        match Status::from_word(region.word(0)) {
            Status::Success => {
                let len = region.word(1).max(0) as usize;
                let end = HEADER_BYTES + len;
                if end > region.bytes.len() {
                    return Err(ReadError::Generic);
                }
                Ok(region.bytes[HEADER_BYTES..end].to_vec())
            }
            Status::Failed(err) => Err(err),
            Status::Pending => Err(ReadError::Generic),
        }
    }

    /// Guard that answers and notifies this buffer when dropped.
    ///
    /// If nothing was written by the time the guard drops, the control word is
    /// set to [`ReadError::Generic`] before notifying.
    pub fn completion_guard(&self) -> CompletionGuard {
        CompletionGuard {
            buffer: self.clone(),
        }
    }
}

impl Default for SharedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let region = self.lock();
        f.debug_struct("SharedBuffer")
            .field("status", &region.word(0))
            .field("len", &region.word(1))
            .field("capacity_words", &region.capacity_words())
            .field("notified", &region.notified)
            .finish()
    }
}

/// Notifies its buffer exactly once on drop.
pub struct CompletionGuard {
    buffer: SharedBuffer,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.buffer.status() == Status::Pending {
            self.buffer.write_failure(ReadError::Generic);
        }
        self.buffer.notify();
    }
}
