use std::sync::atomic::{AtomicU64, Ordering};

/// Counter that returns unique ids.
pub struct IdCounter {
    value: AtomicU64,
}

impl IdCounter {
    /// Ids start at `first`; values below it stay free for reserved ids.
    pub const fn starting_at(first: u64) -> Self {
        Self {
            value: AtomicU64::new(first),
        }
    }

    pub fn next(&self) -> u64 {
        self.value.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdCounter {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let counter = IdCounter::starting_at(10);
        assert_eq!(counter.next(), 10);
        assert_eq!(counter.next(), 11);
        assert_eq!(IdCounter::default().next(), 1);
    }
}
