//! Small-integer allocator used to label worker threads.

use std::sync::Mutex;

/// Vends the smallest free non-negative integer.
///
/// Capacity doubles when exhausted and shrinks back to the initial
/// capacity once no id at or above it remains held, so thread numbers
/// stay small and get recycled instead of growing without bound. This
/// is diagnostics bookkeeping, not a hot path; a single mutex
/// serializes everything.
pub struct IdAllocator {
    initial: usize,
    slots: Mutex<Vec<bool>>,
}

impl IdAllocator {
    /// Creates an allocator with the given initial capacity.
    pub fn new(initial: usize) -> Self {
        assert!(initial > 0, "initial capacity must be non-zero");
        Self {
            initial,
            slots: Mutex::new(vec![false; initial]),
        }
    }

    /// Claims and returns the smallest id not currently held.
    pub fn acquire(&self) -> usize {
        let mut slots = self.slots.lock().unwrap();
        match slots.iter().position(|held| !held) {
            Some(id) => {
                slots[id] = true;
                id
            }
            None => {
                let id = slots.len();
                slots.resize(id * 2, false);
                slots[id] = true;
                id
            }
        }
    }

    /// Releases a previously-acquired id.
    ///
    /// # Panics
    ///
    /// Panics if `id` lies outside the current capacity.
    pub fn release(&self, id: usize) {
        let mut slots = self.slots.lock().unwrap();
        assert!(
            id < slots.len(),
            "id {id} out of bounds for capacity {}",
            slots.len()
        );
        slots[id] = false;
        if slots.len() > self.initial && slots[self.initial..].iter().all(|held| !held) {
            slots.truncate(self.initial);
        }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(64)
    }
}
