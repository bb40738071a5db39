//! Process-wide memo of parsed dataset metadata.
//!
//! One walk of a `(file, dataset)` pair is enough: later reads of the
//! same pair skip the parser phase entirely and go straight to the
//! data fetch. The memo is the only process-wide state in the reader.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, OnceLock};

use crate::meta::{DatasetMeta, MAX_META_NAME};

/// Maximum number of memoised datasets.
pub const MAX_META_STORE: usize = 167;

struct Inner {
    entries: HashMap<u64, DatasetMeta>,
    order: VecDeque<u64>,
}

/// Bounded map from memo-URL hash to [`DatasetMeta`].
///
/// The additive hash can collide; a hit therefore requires a full
/// string match on the stored URL. When full, the oldest-inserted
/// entry is evicted.
pub struct MetaMemo {
    inner: Mutex<Inner>,
}

impl MetaMemo {
    /// The process-wide memo instance.
    pub fn global() -> &'static MetaMemo {
        static MEMO: OnceLock<MetaMemo> = OnceLock::new();
        MEMO.get_or_init(MetaMemo::new)
    }

    /// An empty memo. Tests use private instances; production code
    /// goes through [`MetaMemo::global`].
    pub fn new() -> MetaMemo {
        MetaMemo {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Additive hash over the zero-padded memo URL.
    pub fn key(url: &str) -> u64 {
        let mut padded = [0u8; MAX_META_NAME];
        let n = url.len().min(MAX_META_NAME);
        padded[..n].copy_from_slice(&url.as_bytes()[..n]);

        let mut key = 0u64;
        for word in padded.chunks_exact(8) {
            key = key.wrapping_add(u64::from_le_bytes(word.try_into().unwrap()));
        }
        key
    }

    /// Look up `key`, verifying the stored URL matches `url` in full.
    pub fn find(&self, key: u64, url: &str) -> Option<DatasetMeta> {
        let inner = self.inner.lock().unwrap();
        inner.entries.get(&key).filter(|m| m.url == url).cloned()
    }

    /// Insert `meta` under `key`, evicting the oldest entry when full.
    pub fn insert(&self, key: u64, meta: DatasetMeta) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= MAX_META_STORE {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
        if inner.entries.insert(key, meta).is_none() {
            inner.order.push_back(key);
        }
    }

    /// Number of memoised entries.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Whether the memo is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().entries.is_empty()
    }
}

impl Default for MetaMemo {
    fn default() -> Self {
        Self::new()
    }
}
