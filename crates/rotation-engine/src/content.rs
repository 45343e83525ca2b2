//! Content tree maintenance for the in-memory store.
//!
//! Removing a scene or camera that a runtime points at tears the runtime down
//! in the same write, and clears the live pointer if it was showing it.

use crate::error::{Result, RotationError};
use crate::live::LiveUpdate;
use crate::resolver::sorted_by_order_then_name;
use crate::store::{InMemoryStore, StoreChange, StoreTree};
use crate::types::{Camera, CameraId, Project, ProjectId, Scene, SceneId};
use std::collections::HashMap;
use tracing::info;

fn clean_name(name: &str) -> Result<String> {
	let name = name.trim();
	if name.is_empty() {
		return Err(RotationError::InvalidContent("name must not be empty".into()));
	}
	Ok(name.to_string())
}

fn new_id() -> String {
	uuid::Uuid::new_v4().simple().to_string()
}

fn next_order(count: usize) -> i64 {
	i64::try_from(count).unwrap_or(i64::MAX)
}

fn project_mut<'a>(tree: &'a mut StoreTree, project_id: &str) -> Result<&'a mut Project> {
	tree.projects.get_mut(project_id).ok_or_else(|| RotationError::ProjectNotFound(project_id.to_string()))
}

fn scene_mut<'a>(tree: &'a mut StoreTree, project_id: &str, scene_id: &str) -> Result<&'a mut Scene> {
	project_mut(tree, project_id)?.scenes.get_mut(scene_id).ok_or_else(|| RotationError::SceneNotFound(scene_id.to_string()))
}

fn camera_mut<'a>(tree: &'a mut StoreTree, project_id: &str, scene_id: &str, camera_id: &str) -> Result<&'a mut Camera> {
	scene_mut(tree, project_id, scene_id)?
		.cameras
		.get_mut(camera_id)
		.ok_or_else(|| RotationError::CameraNotFound(camera_id.to_string()))
}

impl InMemoryStore {
	pub async fn add_project(&self, name: &str) -> Result<ProjectId> {
		let name = clean_name(name)?;
		let mut tree = self.tree.write().await;
		let id = new_id();
		let project = Project::new(id.clone(), name, next_order(tree.projects.len()));
		tree.projects.insert(id.clone(), project);
		self.emit(StoreChange::Content { project_id: id.clone() });
		Ok(id)
	}

	pub async fn add_scene(&self, project_id: &str, name: &str) -> Result<SceneId> {
		let name = clean_name(name)?;
		let mut tree = self.tree.write().await;
		let project = project_mut(&mut tree, project_id)?;
		let id = new_id();
		let scene = Scene::new(id.clone(), name, next_order(project.scenes.len()));
		project.scenes.insert(id.clone(), scene);
		self.emit(StoreChange::Content { project_id: project_id.to_string() });
		Ok(id)
	}

	pub async fn add_camera(&self, project_id: &str, scene_id: &str, name: &str, description: &str) -> Result<CameraId> {
		let name = clean_name(name)?;
		let mut tree = self.tree.write().await;
		let scene = scene_mut(&mut tree, project_id, scene_id)?;
		let id = new_id();
		let camera = Camera::new(id.clone(), name, next_order(scene.cameras.len()), self.default_duration_sec).with_description(description.trim());
		scene.cameras.insert(id.clone(), camera);
		self.emit(StoreChange::Content { project_id: project_id.to_string() });
		Ok(id)
	}

	pub async fn rename_project(&self, project_id: &str, name: &str) -> Result<()> {
		let name = clean_name(name)?;
		let mut tree = self.tree.write().await;
		project_mut(&mut tree, project_id)?.name = name;
		self.emit(StoreChange::Content { project_id: project_id.to_string() });
		Ok(())
	}

	pub async fn rename_scene(&self, project_id: &str, scene_id: &str, name: &str) -> Result<()> {
		let name = clean_name(name)?;
		let mut tree = self.tree.write().await;
		scene_mut(&mut tree, project_id, scene_id)?.name = name;
		self.emit(StoreChange::Content { project_id: project_id.to_string() });
		Ok(())
	}

	pub async fn rename_camera(&self, project_id: &str, scene_id: &str, camera_id: &str, name: &str) -> Result<()> {
		let name = clean_name(name)?;
		let mut tree = self.tree.write().await;
		camera_mut(&mut tree, project_id, scene_id, camera_id)?.name = name;
		self.emit(StoreChange::Content { project_id: project_id.to_string() });
		Ok(())
	}

	pub async fn set_camera_description(&self, project_id: &str, scene_id: &str, camera_id: &str, description: &str) -> Result<()> {
		let mut tree = self.tree.write().await;
		camera_mut(&mut tree, project_id, scene_id, camera_id)?.description = description.trim().to_string();
		self.emit(StoreChange::Content { project_id: project_id.to_string() });
		Ok(())
	}

	/// Sets a camera's display duration, clamped to the configured minimum.
	///
	/// A running camera keeps its current deadline; the new duration applies
	/// the next time the rotation lands on it.
	pub async fn set_camera_duration(&self, project_id: &str, scene_id: &str, camera_id: &str, duration_sec: i64) -> Result<i64> {
		let duration_sec = duration_sec.max(self.min_duration_sec);
		let mut tree = self.tree.write().await;
		camera_mut(&mut tree, project_id, scene_id, camera_id)?.duration_sec = duration_sec;
		self.emit(StoreChange::Content { project_id: project_id.to_string() });
		Ok(duration_sec)
	}

	/// Rewrites camera `order` to match `camera_ids`; cameras not listed keep
	/// their relative order after the listed ones.
	pub async fn reorder_cameras(&self, project_id: &str, scene_id: &str, camera_ids: &[CameraId]) -> Result<()> {
		let mut tree = self.tree.write().await;
		let scene = scene_mut(&mut tree, project_id, scene_id)?;
		if let Some(unknown) = camera_ids.iter().find(|id| !scene.cameras.contains_key(id.as_str())) {
			return Err(RotationError::CameraNotFound(unknown.clone()));
		}

		let rest: Vec<CameraId> = sorted_by_order_then_name(scene.cameras.values())
			.into_iter()
			.filter(|c| !camera_ids.contains(&c.id))
			.map(|c| c.id.clone())
			.collect();

		let new_orders: HashMap<&str, i64> = camera_ids.iter().chain(rest.iter()).enumerate().map(|(idx, id)| (id.as_str(), next_order(idx))).collect();
		for (id, camera) in &mut scene.cameras {
			if let Some(order) = new_orders.get(id.as_str()) {
				camera.order = Some(*order);
			}
		}
		self.emit(StoreChange::Content { project_id: project_id.to_string() });
		Ok(())
	}

	pub async fn remove_project(&self, project_id: &str) -> Result<()> {
		let mut tree = self.tree.write().await;
		tree.projects.remove(project_id).ok_or_else(|| RotationError::ProjectNotFound(project_id.to_string()))?;
		self.emit(StoreChange::ProjectRemoved { project_id: project_id.to_string() });
		self.clear_live_if(&mut tree, project_id, None, None);
		info!("Removed project {}", project_id);
		Ok(())
	}

	pub async fn remove_scene(&self, project_id: &str, scene_id: &str) -> Result<()> {
		let mut tree = self.tree.write().await;
		let project = project_mut(&mut tree, project_id)?;
		project.scenes.remove(scene_id).ok_or_else(|| RotationError::SceneNotFound(scene_id.to_string()))?;
		let torn_down = project.runtime.as_ref().is_some_and(|rt| rt.scene_id == scene_id);
		if torn_down {
			project.runtime = None;
		}
		self.emit(StoreChange::Content { project_id: project_id.to_string() });
		if torn_down {
			info!("Scene {} removed from under project {}, runtime torn down", scene_id, project_id);
			self.emit(StoreChange::Runtime {
				project_id: project_id.to_string(),
				runtime: None,
			});
		}
		self.clear_live_if(&mut tree, project_id, Some(scene_id), None);
		Ok(())
	}

	pub async fn remove_camera(&self, project_id: &str, scene_id: &str, camera_id: &str) -> Result<()> {
		let mut tree = self.tree.write().await;
		let project = project_mut(&mut tree, project_id)?;
		project
			.scenes
			.get_mut(scene_id)
			.ok_or_else(|| RotationError::SceneNotFound(scene_id.to_string()))?
			.cameras
			.remove(camera_id)
			.ok_or_else(|| RotationError::CameraNotFound(camera_id.to_string()))?;
		let torn_down = project.runtime.as_ref().is_some_and(|rt| rt.scene_id == scene_id && rt.camera_id == camera_id);
		if torn_down {
			project.runtime = None;
		}
		self.emit(StoreChange::Content { project_id: project_id.to_string() });
		if torn_down {
			info!("Camera {} removed from under project {}, runtime torn down", camera_id, project_id);
			self.emit(StoreChange::Runtime {
				project_id: project_id.to_string(),
				runtime: None,
			});
		}
		self.clear_live_if(&mut tree, project_id, Some(scene_id), Some(camera_id));
		Ok(())
	}

	fn clear_live_if(&self, tree: &mut StoreTree, project_id: &str, scene_id: Option<&str>, camera_id: Option<&str>) {
		if tree.live.as_ref().is_some_and(|l| l.points_at(project_id, scene_id, camera_id)) && LiveUpdate::ClearIfOwnedBy(project_id.to_string()).apply_to(&mut tree.live) {
			self.emit(StoreChange::Live(None));
		}
	}
}
