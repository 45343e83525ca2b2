//! Runtime state machine.
//!
//! `Idle -> Running -> {Paused <-> Running} -> Idle`
//!
//! Every function here computes the next runtime purely from a project
//! snapshot and `now`. Nothing is written; the engine turns a [`Transition`]
//! into a single store write. Two clients feeding the same stale snapshot and
//! the same instant get byte-identical results, which is what makes racing
//! writers harmless.

use crate::deadline::{capture_remaining, deadline_from_remaining, is_due};
use crate::error::{Result, RotationError};
use crate::live::derive_live_update;
use crate::resolver::{effective_duration_sec, first_position, next_position, NextPosition};
use crate::runtime::{RuntimePhase, RuntimeState};
use crate::store::{RuntimeWrite, StoreWrite};
use crate::types::{Actor, Project, ProjectId, TimeMs};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TransitionKind {
	/// Idle (or running) -> Running at the first camera
	Started,
	/// Paused -> Running at the same camera
	Resumed,
	/// Running -> Paused by request
	Paused,
	/// Running -> Running at the next camera
	Advanced,
	/// Running -> Paused with nothing left, at the last camera of the scene
	Finished,
	/// Any -> Idle
	Reset,
	/// Runtime pointed at deleted content, dropped to Idle
	Healed,
	/// Nothing to do
	Unchanged,
}

/// Result of applying one state-machine operation to a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
	pub project_id: ProjectId,
	pub kind: TransitionKind,
	pub before: Option<RuntimeState>,
	pub after: Option<RuntimeState>,
}

impl Transition {
	fn unchanged(project: &Project) -> Self {
		Self {
			project_id: project.id.clone(),
			kind: TransitionKind::Unchanged,
			before: project.runtime.clone(),
			after: project.runtime.clone(),
		}
	}

	fn to(project: &Project, kind: TransitionKind, after: Option<RuntimeState>) -> Self {
		Self {
			project_id: project.id.clone(),
			kind,
			before: project.runtime.clone(),
			after,
		}
	}

	pub fn is_noop(&self) -> bool {
		self.kind == TransitionKind::Unchanged
	}

	/// The runtime write plus its matching live update, as one logical update.
	pub fn store_write(&self, actor: &Actor, now: TimeMs) -> StoreWrite {
		let runtime = match (&self.kind, &self.after) {
			(TransitionKind::Unchanged, _) => RuntimeWrite::Keep,
			(_, Some(rt)) => RuntimeWrite::Set(rt.clone()),
			(_, None) => RuntimeWrite::Delete,
		};
		StoreWrite {
			runtime,
			live: derive_live_update(self, actor, now),
		}
	}
}

/// True if the runtime still references an existing scene and camera
pub fn references_content(project: &Project, runtime: &RuntimeState) -> bool {
	project.camera(&runtime.scene_id, &runtime.camera_id).is_some()
}

/// The project's runtime as the engine sees it: a runtime that points at
/// deleted content reads as Idle.
pub fn effective_runtime(project: &Project) -> Option<&RuntimeState> {
	project.runtime.as_ref().filter(|rt| references_content(project, rt))
}

/// Start the rotation, or resume it in place if it is paused.
///
/// A running rotation restarts from the first camera.
pub fn start(project: &Project, now: TimeMs, default_duration_sec: u64) -> Result<Transition> {
	if let Some(rt) = effective_runtime(project) {
		if let RuntimePhase::Paused { remaining_sec } = rt.phase {
			let resumed = RuntimeState::running(rt.scene_id.clone(), rt.camera_id.clone(), deadline_from_remaining(remaining_sec, now));
			return Ok(Transition::to(project, TransitionKind::Resumed, Some(resumed)));
		}
	}

	let first = first_position(project).ok_or_else(|| RotationError::EmptyRotation { project_id: project.id.clone() })?;
	let duration = effective_duration_sec(project, &first.scene_id, &first.camera_id, default_duration_sec);
	let running = RuntimeState::running(first.scene_id, first.camera_id, deadline_from_remaining(duration, now));
	Ok(Transition::to(project, TransitionKind::Started, Some(running)))
}

/// Freeze the current camera's remaining time. Pausing an idle or already
/// paused project is a no-op.
pub fn pause(project: &Project, now: TimeMs) -> Transition {
	match effective_runtime(project) {
		Some(rt) => match rt.phase {
			RuntimePhase::Running { ends_at } => {
				let paused = RuntimeState::paused(rt.scene_id.clone(), rt.camera_id.clone(), capture_remaining(ends_at, now));
				Transition::to(project, TransitionKind::Paused, Some(paused))
			}
			RuntimePhase::Paused { .. } => Transition::unchanged(project),
		},
		None => Transition::unchanged(project),
	}
}

/// Step to the next camera once the current deadline has passed.
///
/// Stays inside the current scene; running off the end parks the project as
/// Paused with zero seconds left.
pub fn advance(project: &Project, now: TimeMs, default_duration_sec: u64) -> Transition {
	let Some(rt) = effective_runtime(project) else {
		return Transition::unchanged(project);
	};
	if !is_due(rt, now) {
		return Transition::unchanged(project);
	}
	let Some(scene) = project.scene(&rt.scene_id) else {
		return Transition::unchanged(project);
	};

	match next_position(scene, &rt.camera_id) {
		NextPosition::Camera(camera_id) => {
			let duration = effective_duration_sec(project, &rt.scene_id, &camera_id, default_duration_sec);
			let next = RuntimeState::running(rt.scene_id.clone(), camera_id, deadline_from_remaining(duration, now));
			Transition::to(project, TransitionKind::Advanced, Some(next))
		}
		NextPosition::EndOfScene => {
			let finished = RuntimeState::paused(rt.scene_id.clone(), rt.camera_id.clone(), 0);
			Transition::to(project, TransitionKind::Finished, Some(finished))
		}
	}
}

/// Drop the runtime whatever its state.
pub fn reset(project: &Project) -> Transition {
	Transition::to(project, TransitionKind::Reset, None)
}

/// Reset a runtime left dangling by deleted content, if there is one.
pub fn heal(project: &Project) -> Option<Transition> {
	match &project.runtime {
		Some(rt) if !references_content(project, rt) => Some(Transition::to(project, TransitionKind::Healed, None)),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::deadline::remaining_now;
	use crate::live::LiveUpdate;
	use crate::types::{Camera, Scene};

	const DEFAULT: u64 = 30;

	fn two_camera_project() -> Project {
		Project::new("p1", "Show", 0).with_scene(
			Scene::new("s1", "Opening", 0)
				.with_camera(Camera::new("c1", "Wide", 0, 30))
				.with_camera(Camera::new("c2", "Close", 1, 10)),
		)
	}

	fn with_runtime(mut project: Project, rt: RuntimeState) -> Project {
		project.runtime = Some(rt);
		project
	}

	#[test]
	fn test_start_from_idle() {
		let t = start(&two_camera_project(), 0, DEFAULT).unwrap();
		assert_eq!(t.kind, TransitionKind::Started);
		assert_eq!(t.after, Some(RuntimeState::running("s1", "c1", 30_000)));
	}

	#[test]
	fn test_start_empty_project_fails() {
		let project = Project::new("p1", "Empty", 0).with_scene(Scene::new("s1", "Nothing", 0));
		assert_eq!(start(&project, 0, DEFAULT), Err(RotationError::EmptyRotation { project_id: "p1".into() }));
	}

	#[test]
	fn test_start_resumes_paused() {
		let project = with_runtime(two_camera_project(), RuntimeState::paused("s1", "c2", 20));
		let t = start(&project, 15_000, DEFAULT).unwrap();
		assert_eq!(t.kind, TransitionKind::Resumed);
		assert_eq!(t.after, Some(RuntimeState::running("s1", "c2", 35_000)));
	}

	#[test]
	fn test_start_while_running_restarts() {
		let project = with_runtime(two_camera_project(), RuntimeState::running("s1", "c2", 99_000));
		let t = start(&project, 50_000, DEFAULT).unwrap();
		assert_eq!(t.kind, TransitionKind::Started);
		assert_eq!(t.after, Some(RuntimeState::running("s1", "c1", 80_000)));
	}

	#[test]
	fn test_pause_captures_remaining() {
		let project = with_runtime(two_camera_project(), RuntimeState::running("s1", "c1", 30_000));
		let t = pause(&project, 10_000);
		assert_eq!(t.kind, TransitionKind::Paused);
		assert_eq!(t.after, Some(RuntimeState::paused("s1", "c1", 20)));
	}

	#[test]
	fn test_pause_is_noop_when_paused_or_idle() {
		let paused = with_runtime(two_camera_project(), RuntimeState::paused("s1", "c1", 20));
		assert!(pause(&paused, 10_000).is_noop());
		assert!(pause(&two_camera_project(), 10_000).is_noop());
	}

	#[test]
	fn test_pause_resume_round_trip_never_gains_time() {
		for now in [0, 1, 999, 1_000, 12_345, 29_999] {
			let running = with_runtime(two_camera_project(), RuntimeState::running("s1", "c1", 30_000));
			let before = remaining_now(running.runtime.as_ref().unwrap(), now);
			let paused = with_runtime(two_camera_project(), pause(&running, now).after.unwrap());
			let resumed = start(&paused, now, DEFAULT).unwrap().after.unwrap();
			assert_eq!(remaining_now(&resumed, now), before);
			// The resumed deadline may round up to the next whole second, never beyond it
			assert!(resumed.ends_at().unwrap() - 30_000 < 1_000);
		}
	}

	#[test]
	fn test_advance_only_when_due() {
		let project = with_runtime(two_camera_project(), RuntimeState::running("s1", "c1", 30_000));
		assert!(advance(&project, 29_999, DEFAULT).is_noop());

		let t = advance(&project, 31_000, DEFAULT);
		assert_eq!(t.kind, TransitionKind::Advanced);
		assert_eq!(t.after, Some(RuntimeState::running("s1", "c2", 41_000)));
	}

	#[test]
	fn test_advance_is_idempotent_on_stale_snapshot() {
		let project = with_runtime(two_camera_project(), RuntimeState::running("s1", "c1", 30_000));
		let first = advance(&project, 31_000, DEFAULT);
		let second = advance(&project, 31_000, DEFAULT);
		assert_eq!(first, second);
		assert_eq!(first.store_write(&Actor::new("a", "A"), 31_000), second.store_write(&Actor::new("a", "A"), 31_000));
	}

	#[test]
	fn test_advance_past_last_camera_finishes() {
		let project = with_runtime(two_camera_project(), RuntimeState::running("s1", "c2", 41_000));
		let t = advance(&project, 41_000, DEFAULT);
		assert_eq!(t.kind, TransitionKind::Finished);
		let finished = t.after.unwrap();
		assert_eq!(finished, RuntimeState::paused("s1", "c2", 0));

		let parked = with_runtime(two_camera_project(), finished);
		assert!(advance(&parked, 1_000_000, DEFAULT).is_noop());
	}

	#[test]
	fn test_dangling_runtime_reads_idle() {
		let project = with_runtime(two_camera_project(), RuntimeState::running("s1", "deleted", 0));
		assert!(effective_runtime(&project).is_none());
		assert!(advance(&project, 10, DEFAULT).is_noop());
		assert_eq!(heal(&project).map(|t| t.kind), Some(TransitionKind::Healed));
		assert!(heal(&two_camera_project()).is_none());

		// Starting over a dangling pause begins again from the top
		let project = with_runtime(two_camera_project(), RuntimeState::paused("gone", "c1", 5));
		assert_eq!(start(&project, 0, DEFAULT).unwrap().kind, TransitionKind::Started);
	}

	#[test]
	fn test_store_write_pairs_runtime_and_live() {
		let actor = Actor::new("u", "U");
		let reset_write = reset(&two_camera_project()).store_write(&actor, 5);
		assert_eq!(reset_write.runtime, RuntimeWrite::Delete);
		assert_eq!(reset_write.live, LiveUpdate::ClearIfOwnedBy("p1".into()));

		let noop = pause(&two_camera_project(), 0).store_write(&actor, 5);
		assert_eq!(noop.runtime, RuntimeWrite::Keep);
		assert_eq!(noop.live, LiveUpdate::Keep);
	}
}
