use crate::types::TimeMs;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of wall-clock time in epoch milliseconds
pub trait Clock: Send + Sync + 'static {
	fn now_ms(&self) -> TimeMs;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now_ms(&self) -> TimeMs {
		chrono::Utc::now().timestamp_millis()
	}
}

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
	now: Arc<AtomicI64>,
}

impl ManualClock {
	pub fn new(start: TimeMs) -> Self {
		Self { now: Arc::new(AtomicI64::new(start)) }
	}

	pub fn set(&self, now: TimeMs) {
		self.now.store(now, Ordering::SeqCst);
	}

	pub fn advance(&self, by_ms: TimeMs) -> TimeMs {
		self.now.fetch_add(by_ms, Ordering::SeqCst) + by_ms
	}
}

impl Clock for ManualClock {
	fn now_ms(&self) -> TimeMs {
		self.now.load(Ordering::SeqCst)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_manual_clock_is_shared_between_clones() {
		let clock = ManualClock::new(1_000);
		let other = clock.clone();
		assert_eq!(clock.advance(500), 1_500);
		assert_eq!(other.now_ms(), 1_500);
		other.set(0);
		assert_eq!(clock.now_ms(), 0);
	}

	#[test]
	fn test_system_clock_is_epoch_millis() {
		// 2020-01-01T00:00:00Z
		assert!(SystemClock.now_ms() > 1_577_836_800_000);
	}
}
