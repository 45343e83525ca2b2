//! Conversions between absolute deadlines and remaining durations.
//!
//! Everything here is a pure function of its inputs, so any client can
//! evaluate it against the same snapshot and arrive at the same answer.

use crate::runtime::{RuntimePhase, RuntimeState};
use crate::types::TimeMs;

const MS_PER_SEC: i64 = 1000;

/// Whole seconds left until `ends_at`, rounded up and never negative.
pub fn capture_remaining(ends_at: TimeMs, now: TimeMs) -> u64 {
	let left_ms = ends_at.saturating_sub(now);
	if left_ms <= 0 {
		return 0;
	}
	left_ms.unsigned_abs().div_ceil(MS_PER_SEC.unsigned_abs())
}

/// Absolute deadline for a camera that still has `remaining_sec` to run.
pub fn deadline_from_remaining(remaining_sec: u64, now: TimeMs) -> TimeMs {
	let remaining = i64::try_from(remaining_sec).unwrap_or(i64::MAX);
	now.saturating_add(remaining.saturating_mul(MS_PER_SEC))
}

/// Seconds remaining on the current camera as of `now`.
pub fn remaining_now(state: &RuntimeState, now: TimeMs) -> u64 {
	match state.phase {
		RuntimePhase::Running { ends_at } => capture_remaining(ends_at, now),
		RuntimePhase::Paused { remaining_sec } => remaining_sec,
	}
}

/// Same as [`remaining_now`]; an idle project has no remaining time.
pub fn remaining_for(runtime: Option<&RuntimeState>, now: TimeMs) -> Option<u64> {
	runtime.map(|rt| remaining_now(rt, now))
}

/// True once a running camera's deadline has passed
pub fn is_due(state: &RuntimeState, now: TimeMs) -> bool {
	state.ends_at().is_some_and(|ends_at| now >= ends_at)
}

/// Seconds a camera card should show: the live countdown when the camera is
/// on air, its configured duration otherwise.
pub fn display_seconds(duration_sec: u64, live_remaining: Option<u64>) -> u64 {
	live_remaining.unwrap_or(duration_sec)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_capture_rounds_up_partial_seconds() {
		assert_eq!(capture_remaining(30_000, 10_000), 20);
		assert_eq!(capture_remaining(30_000, 10_001), 20);
		assert_eq!(capture_remaining(30_000, 29_999), 1);
		assert_eq!(capture_remaining(30_000, 30_000), 0);
		assert_eq!(capture_remaining(30_000, 45_000), 0);
	}

	#[test]
	fn test_deadline_from_remaining() {
		assert_eq!(deadline_from_remaining(20, 15_000), 35_000);
		assert_eq!(deadline_from_remaining(0, 15_000), 15_000);
	}

	#[test]
	fn test_remaining_now_is_non_increasing() {
		let rt = RuntimeState::running("s", "c", 30_000);
		let mut last = u64::MAX;
		for now in (0..=32_000).step_by(250) {
			let remaining = remaining_now(&rt, now);
			assert!(remaining <= last, "remaining went up at {now}");
			last = remaining;
		}
		assert_eq!(last, 0);
	}

	#[test]
	fn test_paused_remaining_ignores_clock() {
		let rt = RuntimeState::paused("s", "c", 7);
		assert_eq!(remaining_now(&rt, 0), 7);
		assert_eq!(remaining_now(&rt, 1_000_000), 7);
	}

	#[test]
	fn test_is_due() {
		let rt = RuntimeState::running("s", "c", 30_000);
		assert!(!is_due(&rt, 29_999));
		assert!(is_due(&rt, 30_000));
		assert!(!is_due(&RuntimeState::paused("s", "c", 0), 30_000));
	}

	#[test]
	fn test_display_seconds() {
		assert_eq!(display_seconds(30, None), 30);
		assert_eq!(display_seconds(30, Some(4)), 4);
		assert_eq!(remaining_for(None, 0), None);
	}
}
