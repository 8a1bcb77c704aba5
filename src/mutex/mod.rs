//! Our mutex implementation.
//!
//! Both RP2040 cores poll in a tight loop and there is no scheduler to park
//! on, so this is a binary semaphore that spins until it is free. Critical
//! sections are a single FIFO push or pop, so the spin is short.

use atomic_polyfill::{AtomicBool, Ordering};

/// A simple no-std mutex.
///
/// Uses `atomic-polyfill` to hold an atomic bool, for when you don't have
/// atomic-compare-swap (the Cortex-M0+ doesn't).
pub struct NeoMutex<T> {
	locked: AtomicBool,
	value: core::cell::UnsafeCell<T>,
}

impl<T> NeoMutex<T> {
	/// Create a new Mutex.
	///
	/// Defaults to unlocked.
	pub const fn new(value: T) -> NeoMutex<T> {
		NeoMutex {
			locked: AtomicBool::new(false),
			value: core::cell::UnsafeCell::new(value),
		}
	}

	/// Lock the mutex, spinning until the other holder lets go.
	///
	/// Unlock it by dropping the returned object.
	pub fn lock(&self) -> NeoMutexGuard<'_, T> {
		loop {
			if let Some(guard) = self.try_lock() {
				return guard;
			}
			core::hint::spin_loop();
		}
	}

	/// Lock the mutex, if nobody else holds it.
	pub fn try_lock(&self) -> Option<NeoMutexGuard<'_, T>> {
		self.locked
			.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
			.ok()
			.map(|_| NeoMutexGuard { parent: self })
	}
}

unsafe impl<T: Send> Sync for NeoMutex<T> {}

/// Represents a locked mutex.
///
/// Is unlocked on drop.
pub struct NeoMutexGuard<'a, T> {
	parent: &'a NeoMutex<T>,
}

impl<'a, T> Drop for NeoMutexGuard<'a, T> {
	fn drop(&mut self) {
		self.parent.locked.store(false, Ordering::Release);
	}
}

impl<'a, T> core::ops::Deref for NeoMutexGuard<'a, T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		unsafe { &*self.parent.value.get() }
	}
}

impl<'a, T> core::ops::DerefMut for NeoMutexGuard<'a, T> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		unsafe { &mut *self.parent.value.get() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn second_lock_attempt_fails_while_held() {
		let mutex = NeoMutex::new(5u8);
		let guard = mutex.lock();
		assert!(mutex.try_lock().is_none());
		drop(guard);
		assert!(mutex.try_lock().is_some());
	}

	#[test]
	fn guard_gives_mutable_access() {
		let mutex = NeoMutex::new(0u32);
		*mutex.lock() += 7;
		assert_eq!(*mutex.lock(), 7);
	}

	#[test]
	fn lock_serialises_two_threads() {
		static COUNTER: NeoMutex<u32> = NeoMutex::new(0);
		let handles: Vec<_> = (0..2)
			.map(|_| {
				std::thread::spawn(|| {
					for _ in 0..10_000 {
						*COUNTER.lock() += 1;
					}
				})
			})
			.collect();
		for handle in handles {
			handle.join().unwrap();
		}
		assert_eq!(*COUNTER.lock(), 20_000);
	}
}
