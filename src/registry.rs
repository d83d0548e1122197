//! Process-wide retention of descriptors that native code still points at.
//!
//! A descriptor's owner may free the function's code once nothing refers to
//! it, even while a patched entry point still jumps there. Every live
//! [`Redirection`](crate::Redirection) keeps its two descriptors here: they
//! are added when the redirection is constructed and removed when it is
//! disposed. Nothing else mutates the registry.

use crate::descriptor::Descriptor;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::OnceLock;

struct Retained {
    descriptor: Descriptor,
    count: usize,
}

/// A multiset of descriptors keyed by identity.
pub struct RetentionRegistry {
    entries: Mutex<HashMap<usize, Retained>>,
}

static GLOBAL_REGISTRY: OnceLock<RetentionRegistry> = OnceLock::new();

/// Gets the process-wide retention registry.
pub fn global_registry() -> &'static RetentionRegistry {
    GLOBAL_REGISTRY.get_or_init(RetentionRegistry::new)
}

impl RetentionRegistry {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Adds one reference to `descriptor`.
    pub(crate) fn retain(&self, descriptor: &Descriptor) {
        let mut entries = self.entries.lock();
        entries
            .entry(descriptor.id())
            .and_modify(|retained| retained.count += 1)
            .or_insert_with(|| Retained {
                descriptor: descriptor.clone(),
                count: 1,
            });
    }

    /// Removes one reference to `descriptor`; returns whether one was held.
    pub(crate) fn release(&self, descriptor: &Descriptor) -> bool {
        let mut entries = self.entries.lock();
        let Some(retained) = entries.get_mut(&descriptor.id()) else {
            return false;
        };
        retained.count -= 1;
        if retained.count == 0 {
            let removed = entries.remove(&descriptor.id());
            // Drop the last retained clone outside the lock.
            drop(entries);
            drop(removed);
        }
        true
    }

    /// Gets the number of live redirection slots holding `descriptor`.
    pub fn retained_count(&self, descriptor: &Descriptor) -> usize {
        self.entries
            .lock()
            .get(&descriptor.id())
            .map_or(0, |retained| retained.count)
    }

    /// Whether `descriptor` is currently retained.
    #[inline]
    pub fn contains(&self, descriptor: &Descriptor) -> bool {
        self.retained_count(descriptor) != 0
    }

    /// Returns a copy of every retained descriptor.
    pub fn snapshot(&self) -> Vec<Descriptor> {
        self.entries
            .lock()
            .values()
            .map(|retained| retained.descriptor.clone())
            .collect()
    }

    /// Gets the number of distinct retained descriptors.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no descriptor is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
