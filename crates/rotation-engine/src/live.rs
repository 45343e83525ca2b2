use crate::machine::{Transition, TransitionKind};
use crate::store::{RuntimeStore, StoreChange, StoreWrite};
use crate::types::{Actor, CameraId, ProjectId, SceneId, TimeMs};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The single "currently on air" position, mirrored from the project that last
/// went running. A cache of the owning runtime, never the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LivePointer {
	pub project_id: ProjectId,
	pub scene_id: SceneId,
	pub camera_id: CameraId,
	pub at: TimeMs,
	pub by: Actor,
}

impl LivePointer {
	pub fn points_at(&self, project_id: &str, scene_id: Option<&str>, camera_id: Option<&str>) -> bool {
		self.project_id == project_id && scene_id.is_none_or(|s| self.scene_id == s) && camera_id.is_none_or(|c| self.camera_id == c)
	}
}

/// What a write does to the global live record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveUpdate {
	Keep,
	Publish(LivePointer),
	/// Clear only if the pointer currently belongs to this project
	ClearIfOwnedBy(ProjectId),
	/// Clear only if the pointer is still exactly this one
	ClearIfEquals(LivePointer),
}

impl LiveUpdate {
	/// Applies the update in place, returning whether the record changed.
	pub fn apply_to(&self, live: &mut Option<LivePointer>) -> bool {
		match self {
			Self::Keep => false,
			Self::Publish(pointer) => {
				let changed = live.as_ref() != Some(pointer);
				*live = Some(pointer.clone());
				changed
			}
			Self::ClearIfOwnedBy(project_id) => {
				if live.as_ref().is_some_and(|l| l.project_id == *project_id) {
					*live = None;
					true
				} else {
					false
				}
			}
			Self::ClearIfEquals(pointer) => {
				if live.as_ref() == Some(pointer) {
					*live = None;
					true
				} else {
					false
				}
			}
		}
	}
}

/// Derives the live update that must accompany a runtime transition.
///
/// Anything that puts a project into Running (fresh start, resume, advance)
/// republishes with a fresh timestamp; anything that ends the rotation clears
/// the pointer if it belonged to this project. A user pause leaves it alone.
pub fn derive_live_update(transition: &Transition, actor: &Actor, now: TimeMs) -> LiveUpdate {
	match transition.kind {
		TransitionKind::Started | TransitionKind::Resumed | TransitionKind::Advanced => match &transition.after {
			Some(rt) => LiveUpdate::Publish(LivePointer {
				project_id: transition.project_id.clone(),
				scene_id: rt.scene_id.clone(),
				camera_id: rt.camera_id.clone(),
				at: now,
				by: actor.clone(),
			}),
			None => LiveUpdate::ClearIfOwnedBy(transition.project_id.clone()),
		},
		TransitionKind::Finished | TransitionKind::Reset | TransitionKind::Healed => LiveUpdate::ClearIfOwnedBy(transition.project_id.clone()),
		TransitionKind::Paused | TransitionKind::Unchanged => LiveUpdate::Keep,
	}
}

/// Watches the change feed and clears a live pointer whose project no longer
/// has a usable runtime.
///
/// Writes made through the engine already keep the two in step; this covers
/// teardown that happens behind the engine's back (content deletion, another
/// writer removing a runtime without touching `live`).
pub fn spawn_live_reconciler<S>(store: S, cancel: CancellationToken) -> JoinHandle<()>
where
	S: RuntimeStore + Clone,
{
	let mut feed = store.subscribe();
	tokio::spawn(async move {
		info!("Live pointer reconciler started");
		loop {
			tokio::select! {
				() = cancel.cancelled() => {
					debug!("Live pointer reconciler cancelled");
					break;
				}
				change = feed.recv() => {
					let Some(change) = change else {
						debug!("Change feed closed, stopping live pointer reconciler");
						break;
					};
					let project_id = match change {
						StoreChange::Runtime { project_id, runtime: None } | StoreChange::ProjectRemoved { project_id } | StoreChange::Content { project_id } => project_id,
						StoreChange::Runtime { .. } | StoreChange::Live(_) => continue,
					};
					if let Err(e) = reconcile(&store, &project_id).await {
						warn!("Failed to reconcile live pointer for project {}: {}", project_id, e);
					}
				}
			}
		}
		info!("Live pointer reconciler stopped");
	})
}

async fn reconcile<S: RuntimeStore>(store: &S, project_id: &str) -> crate::Result<()> {
	let Some(live) = store.live().await? else {
		return Ok(());
	};
	if live.project_id != project_id {
		return Ok(());
	}

	let still_backed = store
		.project(project_id)
		.await?
		.as_ref()
		.and_then(crate::machine::effective_runtime)
		.is_some_and(|rt| rt.scene_id == live.scene_id && rt.camera_id == live.camera_id);

	if !still_backed {
		// A newer pointer published since the read stays put
		info!("Clearing live pointer orphaned by project {}", project_id);
		store.commit(project_id, StoreWrite::live_only(LiveUpdate::ClearIfEquals(live))).await?;
	}
	Ok(())
}
