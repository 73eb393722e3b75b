use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out instance identifiers for reporters and stores.
///
/// The global registry is a `static` created at first use and kept until the
/// process exits; it starts counting at 0. Tests that need predictable ids
/// should build their own registry with [`InstanceRegistry::new`].
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    next: AtomicU64,
}

static GLOBAL: InstanceRegistry = InstanceRegistry::new();

impl InstanceRegistry {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Process-wide registry.
    pub fn global() -> &'static InstanceRegistry {
        &GLOBAL
    }

    /// Allocate the next id. Ids are unique and strictly increasing per registry.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use super::*;

    #[test]
    fn private_registry_starts_at_zero() {
        let registry = InstanceRegistry::new();
        assert_eq!(registry.next_id(), 0);
        assert_eq!(registry.next_id(), 1);
        assert_eq!(registry.issued(), 2);
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let registry = Arc::new(InstanceRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || (0..100).map(|_| registry.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("thread") {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 800);
    }

    #[test]
    fn global_registry_advances() {
        let first = InstanceRegistry::global().next_id();
        let second = InstanceRegistry::global().next_id();
        assert!(second > first);
    }
}
