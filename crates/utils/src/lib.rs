#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod hex;

// Re-export spin types as the workspace lock API
pub use spin::{Mutex, MutexGuard};

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests: exclusive access, release on drop, read and write through the guard
    #[test]
    fn test_spinlock_basic() {
        let lock = Mutex::new(42);
        {
            let mut guard = lock.lock();
            assert_eq!(*guard, 42);
            *guard = 43;
        }
        assert_eq!(*lock.lock(), 43);
    }

    /// Tests: lock blocks until the holder releases it
    #[test]
    fn test_spinlock_blocking() {
        use std::sync::Arc;
        use std::thread;
        use std::time::Duration;

        let lock = Arc::new(Mutex::new(()));
        let lock_clone = lock.clone();

        let start = std::time::Instant::now();

        let h = thread::spawn(move || {
            let _g = lock_clone.lock();
            thread::sleep(Duration::from_millis(50));
        });

        thread::sleep(Duration::from_millis(5));

        let _g = lock.lock();
        assert!(start.elapsed() >= Duration::from_millis(50));

        h.join().unwrap();
    }

    /// Tests: try_lock fails while held and succeeds after release
    #[test]
    fn test_spinlock_try_lock() {
        let lock = Mutex::new(0u32);
        let guard = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }
}
