use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Single exclusive-access region around a shared value.
///
/// Every read and write of the value happens inside [`TableGuard::exclusive`],
/// so no caller observes a half-applied update and no two updates interleave.
/// The region is coarse: a caller holds it for the whole of its
/// read-validate-rewrite sequence, including any full scan.
pub struct TableGuard<T> {
    inner: Mutex<T>,
    acquisitions: AtomicU64,
    contended: AtomicU64,
}

/// Snapshot of guard activity for observability.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardSnapshot {
    /// Number of times the region has been entered.
    pub acquisitions: u64,
    /// Entries that had to wait for another holder.
    pub contended: u64,
    /// Whether the region is held right now.
    pub held: bool,
}

impl<T> TableGuard<T> {
    /// Wraps `value` in a new exclusive region.
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            acquisitions: AtomicU64::new(0),
            contended: AtomicU64::new(0),
        }
    }

    /// Runs `f` with exclusive access to the value, blocking until available.
    pub fn exclusive<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = match self.inner.try_lock() {
            Some(guard) => guard,
            None => {
                self.contended.fetch_add(1, Ordering::Relaxed);
                self.inner.lock()
            }
        };
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        f(&mut guard)
    }

    /// Returns a snapshot of the region's activity counters.
    pub fn snapshot(&self) -> GuardSnapshot {
        GuardSnapshot {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
            held: self.inner.is_locked(),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}
