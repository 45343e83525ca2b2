use crate::types::{CameraId, SceneId, TimeMs};
use serde::{Deserialize, Serialize};

/// Timing half of a runtime record.
///
/// A running rotation only knows its absolute deadline, a paused one only its
/// remaining seconds. Keeping them in separate variants means a record can
/// never carry both.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RuntimePhase {
	#[serde(rename_all = "camelCase")]
	Running { ends_at: TimeMs },
	#[serde(rename_all = "camelCase")]
	Paused { remaining_sec: u64 },
}

/// Per-project runtime record as stored under `projects/{id}/runtime`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeState {
	pub scene_id: SceneId,
	pub camera_id: CameraId,
	#[serde(flatten)]
	pub phase: RuntimePhase,
}

impl RuntimeState {
	pub fn running(scene_id: impl Into<SceneId>, camera_id: impl Into<CameraId>, ends_at: TimeMs) -> Self {
		Self {
			scene_id: scene_id.into(),
			camera_id: camera_id.into(),
			phase: RuntimePhase::Running { ends_at },
		}
	}

	pub fn paused(scene_id: impl Into<SceneId>, camera_id: impl Into<CameraId>, remaining_sec: u64) -> Self {
		Self {
			scene_id: scene_id.into(),
			camera_id: camera_id.into(),
			phase: RuntimePhase::Paused { remaining_sec },
		}
	}

	pub fn status(&self) -> RuntimeStatus {
		match self.phase {
			RuntimePhase::Running { .. } => RuntimeStatus::Running,
			RuntimePhase::Paused { .. } => RuntimeStatus::Paused,
		}
	}

	pub fn ends_at(&self) -> Option<TimeMs> {
		match self.phase {
			RuntimePhase::Running { ends_at } => Some(ends_at),
			RuntimePhase::Paused { .. } => None,
		}
	}

	pub fn remaining_sec(&self) -> Option<u64> {
		match self.phase {
			RuntimePhase::Paused { remaining_sec } => Some(remaining_sec),
			RuntimePhase::Running { .. } => None,
		}
	}

	/// A rotation that ran off the end of its scene
	pub fn is_finished(&self) -> bool {
		self.remaining_sec() == Some(0)
	}
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RuntimeStatus {
	Idle,
	Running,
	Paused,
}

impl RuntimeStatus {
	pub fn of(runtime: Option<&RuntimeState>) -> Self {
		runtime.map_or(Self::Idle, RuntimeState::status)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_running_record_layout() {
		let rt = RuntimeState::running("s1", "c1", 30_000);
		let value = serde_json::to_value(&rt).unwrap();
		assert_eq!(value, json!({ "status": "running", "sceneId": "s1", "cameraId": "c1", "endsAt": 30_000 }));
	}

	#[test]
	fn test_paused_record_layout() {
		let rt: RuntimeState = serde_json::from_value(json!({ "status": "paused", "sceneId": "s1", "cameraId": "c2", "remainingSec": 0 })).unwrap();
		assert_eq!(rt.status(), RuntimeStatus::Paused);
		assert_eq!(rt.ends_at(), None);
		assert!(rt.is_finished());
	}

	#[test]
	fn test_record_with_both_timings_keeps_only_its_status_field() {
		// `endsAt` is ignored on a paused record rather than silently kept
		let rt: RuntimeState = serde_json::from_value(json!({ "status": "paused", "sceneId": "s", "cameraId": "c", "remainingSec": 4, "endsAt": 99 })).unwrap();
		assert_eq!(rt.remaining_sec(), Some(4));
		assert_eq!(rt.ends_at(), None);
	}

	#[test]
	fn test_status_of_absent_runtime_is_idle() {
		assert_eq!(RuntimeStatus::of(None), RuntimeStatus::Idle);
	}
}
