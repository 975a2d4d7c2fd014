//! # Reference Cache
//!
//! Deduplicates structurally equal references so equal proxies share one
//! allocation.
//!
//! ## Invariants
//! - Entries hold weak pointers. The cache never keeps a reference alive.
//! - A dead entry is replaced on the next `intern` of an equal value.
//! - Dead entries are purged whenever an insertion grows the table past its
//!   watermark, twice the live size after the previous purge. The table stays
//!   proportional to the number of live references.
//! - Interning never changes behavior, only allocation counts.

use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::reference::Reference;
use crate::reference::ReferenceData;

/// Below this size the table is never purged.
const MIN_WATERMARK: usize = 64;

#[derive(Debug)]
pub struct ReferenceCache {
    entries: DashMap<ReferenceData, Weak<ReferenceData>>,
    watermark: AtomicUsize,
}

impl Default for ReferenceCache {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            watermark: AtomicUsize::new(MIN_WATERMARK),
        }
    }
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live reference equal to `data`, inserting one if none exists.
    pub(crate) fn intern(&self, data: ReferenceData) -> Reference {
        let reference = self.intern_data(data);
        self.purge_above_watermark();
        reference
    }

    fn intern_data(&self, data: ReferenceData) -> Reference {
        match self.entries.entry(data) {
            Entry::Occupied(mut entry) => {
                if let Some(live) = entry.get().upgrade() {
                    return Reference::from_arc(live);
                }
                let fresh = Arc::new(entry.key().clone());
                entry.insert(Arc::downgrade(&fresh));
                Reference::from_arc(fresh)
            }
            Entry::Vacant(entry) => {
                let fresh = Arc::new(entry.key().clone());
                entry.insert(Arc::downgrade(&fresh));
                Reference::from_arc(fresh)
            }
        }
    }

    /// Interns an existing reference, keeping its allocation when it is the
    /// first of its value.
    pub(crate) fn intern_reference(&self, reference: Reference) -> Reference {
        let interned = self.intern_existing(reference);
        self.purge_above_watermark();
        interned
    }

    fn intern_existing(&self, reference: Reference) -> Reference {
        match self.entries.entry(reference.data().clone()) {
            Entry::Occupied(mut entry) => match entry.get().upgrade() {
                Some(live) => Reference::from_arc(live),
                None => {
                    entry.insert(Arc::downgrade(reference.arc()));
                    reference
                }
            },
            Entry::Vacant(entry) => {
                entry.insert(Arc::downgrade(reference.arc()));
                reference
            }
        }
    }

    /// Drops entries whose reference is gone. Returns how many were dropped.
    pub fn purge(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        before.saturating_sub(self.entries.len())
    }

    /// Must not run while an entry guard is held.
    fn purge_above_watermark(&self) {
        if self.entries.len() <= self.watermark.load(Ordering::Acquire) {
            return;
        }
        let dropped = self.purge();
        let live = self.entries.len();
        self.watermark
            .store((live * 2).max(MIN_WATERMARK), Ordering::Release);
        tracing::trace!(dropped, live, "purged reference cache");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.watermark.store(MIN_WATERMARK, Ordering::Release);
    }
}
