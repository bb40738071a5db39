//! Two-tier line cache over a range I/O back-end.
//!
//! L1 holds small lines produced by parser field reads, L2 holds large
//! lines produced by chunk reads and prefetches. Both tiers and the
//! stats counters live under one mutex; back-end reads are issued with
//! the mutex released so parallel readers overlap their I/O. Lines are
//! immutable once inserted and handed out as `Arc`-backed slices, so
//! eviction never invalidates a slice a caller still holds.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::backend::RangeIo;
use crate::error::IoError;

/// L1 line size in bytes (64 KiB).
pub const L1_LINE: u64 = 0x10000;
/// L1 alignment mask.
pub const L1_MASK: u64 = L1_LINE - 1;
/// Maximum number of L1 lines.
pub const L1_ENTRIES: usize = 157;

/// L2 line size in bytes (8 MiB).
pub const L2_LINE: u64 = 0x0080_0000;
/// L2 alignment mask.
pub const L2_MASK: u64 = L2_LINE - 1;
/// Maximum number of L2 lines.
pub const L2_ENTRIES: usize = 17;

/// One immutable cached line: the bytes read starting at `pos`.
#[derive(Debug)]
pub struct CacheLine {
    /// File offset of the first byte.
    pub pos: u64,
    /// The cached bytes. May be longer than the request that created
    /// the line (read hint), never shorter than what was read.
    pub bytes: Vec<u8>,
}

/// A view into a cache line starting at the requested position.
///
/// Holds its line alive independently of the cache.
#[derive(Debug, Clone)]
pub struct CacheSlice {
    line: Arc<CacheLine>,
    offset: usize,
    len: usize,
}

impl CacheSlice {
    /// The requested bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.line.bytes[self.offset..self.offset + self.len]
    }
}

/// Monotonic I/O counters, guarded by the cache mutex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of back-end reads issued.
    pub read_requests: u64,
    /// Total bytes pulled from the back-end.
    pub bytes_read: u64,
}

struct Tier {
    lines: BTreeMap<u64, Arc<CacheLine>>,
    order: VecDeque<u64>,
    capacity: usize,
}

impl Tier {
    fn new(capacity: usize) -> Tier {
        Tier {
            lines: BTreeMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Find a line covering `[pos, pos + size)`.
    ///
    /// Checks the nearest key not greater than `pos`, and the nearest
    /// key not greater than the last byte of the previous aligned line
    /// to catch requests that land just past a line start.
    fn lookup(&self, size: u64, pos: u64, line_mask: u64) -> Option<Arc<CacheLine>> {
        let covers = |line: &Arc<CacheLine>| {
            pos >= line.pos && pos + size <= line.pos + line.bytes.len() as u64
        };

        if let Some((_, line)) = self.lines.range(..=pos).next_back() {
            if covers(line) {
                return Some(Arc::clone(line));
            }
        }

        let prev_line_pos = (pos & !line_mask).wrapping_sub(1);
        if pos > prev_line_pos {
            if let Some((_, line)) = self.lines.range(..=prev_line_pos).next_back() {
                if covers(line) {
                    return Some(Arc::clone(line));
                }
            }
        }

        None
    }

    fn insert(&mut self, line: Arc<CacheLine>) {
        if self.lines.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.lines.remove(&oldest);
            }
        }
        let pos = line.pos;
        if self.lines.insert(pos, line).is_none() {
            self.order.push_back(pos);
        }
    }
}

struct Inner {
    l1: Tier,
    l2: Tier,
    stats: CacheStats,
}

/// The shared two-tier I/O cache.
///
/// One instance may serve many dataset reads, concurrently, via
/// `Arc<IoCache>`.
pub struct IoCache {
    inner: Mutex<Inner>,
}

impl IoCache {
    /// Create an empty cache with the fixed tier capacities.
    pub fn new() -> IoCache {
        IoCache {
            inner: Mutex::new(Inner {
                l1: Tier::new(L1_ENTRIES),
                l2: Tier::new(L2_ENTRIES),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Satisfy `size` bytes at `*pos`, reading through `backend` on a
    /// miss.
    ///
    /// On a miss, `max(size, hint)` bytes are read at `*pos` outside
    /// the cache lock and inserted as a new line keyed by the unaligned
    /// position; fewer than `size` bytes from the back-end is a
    /// [`IoError::ShortRead`]. Returns the requested bytes and whether
    /// this call inserted a fresh line. `*pos` advances by `size`.
    pub fn request(
        &self,
        backend: &mut dyn RangeIo,
        size: u64,
        pos: &mut u64,
        hint: u64,
    ) -> Result<(CacheSlice, bool), IoError> {
        let file_position = *pos;

        {
            let inner = self.inner.lock().unwrap();
            let hit = inner
                .l1
                .lookup(size, file_position, L1_MASK)
                .or_else(|| inner.l2.lookup(size, file_position, L2_MASK));
            if let Some(line) = hit {
                let offset = (file_position - line.pos) as usize;
                *pos += size;
                return Ok((
                    CacheSlice {
                        line,
                        offset,
                        len: size as usize,
                    },
                    false,
                ));
            }
        }

        let read_size = size.max(hint);
        let mut data = vec![0u8; read_size as usize];
        let got = backend.read_at(&mut data, file_position)? as u64;
        if got < size {
            return Err(IoError::ShortRead {
                requested: size,
                got,
            });
        }
        data.truncate(got as usize);
        let line = Arc::new(CacheLine {
            pos: file_position,
            bytes: data,
        });

        {
            let mut inner = self.inner.lock().unwrap();
            let len = line.bytes.len() as u64;
            let tier = if len <= L1_LINE {
                &mut inner.l1
            } else {
                &mut inner.l2
            };
            tier.insert(Arc::clone(&line));
            inner.stats.read_requests += 1;
            inner.stats.bytes_read += len;
        }

        *pos += size;
        Ok((
            CacheSlice {
                line,
                offset: 0,
                len: size as usize,
            },
            true,
        ))
    }

    /// Snapshot of the I/O counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().unwrap().stats
    }

    /// Number of lines currently held across both tiers.
    pub fn line_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.l1.lines.len() + inner.l2.lines.len()
    }
}

impl Default for IoCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("IoCache")
            .field("l1_lines", &inner.l1.lines.len())
            .field("l2_lines", &inner.l2.lines.len())
            .field("stats", &inner.stats)
            .finish()
    }
}
