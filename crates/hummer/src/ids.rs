//! Melody identifier allocation.

use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::store::MelodyStore;

/// Hands out unique melody identifiers, safe to share across threads.
#[derive(Debug, Default)]
pub struct IdSequence {
    next: AtomicU64,
}

impl IdSequence {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Start one past the highest identifier already stored.
    pub fn seeded_from(store: &MelodyStore) -> Result<Self> {
        let first = store.highest_id()?.map_or(0, |id| id + 1);
        Ok(Self::starting_at(first))
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Make sure later identifiers never collide with `id`.
    pub fn reserve(&self, id: u64) {
        self.next.fetch_max(id.saturating_add(1), Ordering::SeqCst);
    }
}
