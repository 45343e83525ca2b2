use crate::runtime::RuntimeState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Epoch time in milliseconds
pub type TimeMs = i64;

pub type ProjectId = String;
pub type SceneId = String;
pub type CameraId = String;

pub(crate) const DEFAULT_DURATION_SEC: i64 = 30;

fn default_duration_sec() -> i64 {
	DEFAULT_DURATION_SEC
}

/// Anything that participates in `(order, name)` traversal.
///
/// Items without an explicit order sort after every ordered sibling. The id is
/// a final tie-break so two identically named siblings still resolve the same
/// way on every client.
pub trait Ordered {
	fn id(&self) -> &str;
	fn name(&self) -> &str;
	fn order(&self) -> Option<i64>;

	fn sort_key(&self) -> (i64, &str, &str) {
		(self.order().unwrap_or(i64::MAX), self.name(), self.id())
	}
}

/// A single camera feed inside a scene's rotation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
	#[serde(default)]
	pub id: CameraId,
	pub name: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub order: Option<i64>,
	#[serde(default = "default_duration_sec")]
	pub duration_sec: i64,
}

impl Camera {
	pub fn new(id: impl Into<CameraId>, name: impl Into<String>, order: i64, duration_sec: i64) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			description: String::new(),
			order: Some(order),
			duration_sec,
		}
	}

	#[must_use]
	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}
}

impl Ordered for Camera {
	fn id(&self) -> &str {
		&self.id
	}
	fn name(&self) -> &str {
		&self.name
	}
	fn order(&self) -> Option<i64> {
		self.order
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
	#[serde(default)]
	pub id: SceneId,
	pub name: String,
	#[serde(default)]
	pub order: Option<i64>,
	#[serde(default)]
	pub cameras: HashMap<CameraId, Camera>,
}

impl Scene {
	pub fn new(id: impl Into<SceneId>, name: impl Into<String>, order: i64) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			order: Some(order),
			cameras: HashMap::new(),
		}
	}

	#[must_use]
	pub fn with_camera(mut self, camera: Camera) -> Self {
		self.cameras.insert(camera.id.clone(), camera);
		self
	}

	pub fn camera(&self, camera_id: &str) -> Option<&Camera> {
		self.cameras.get(camera_id)
	}
}

impl Ordered for Scene {
	fn id(&self) -> &str {
		&self.id
	}
	fn name(&self) -> &str {
		&self.name
	}
	fn order(&self) -> Option<i64> {
		self.order
	}
}

/// A project owns its scenes and, exclusively through the engine, its runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
	#[serde(default)]
	pub id: ProjectId,
	pub name: String,
	#[serde(default)]
	pub order: Option<i64>,
	#[serde(default)]
	pub scenes: HashMap<SceneId, Scene>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub runtime: Option<RuntimeState>,
}

impl Project {
	pub fn new(id: impl Into<ProjectId>, name: impl Into<String>, order: i64) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			order: Some(order),
			scenes: HashMap::new(),
			runtime: None,
		}
	}

	#[must_use]
	pub fn with_scene(mut self, scene: Scene) -> Self {
		self.scenes.insert(scene.id.clone(), scene);
		self
	}

	pub fn scene(&self, scene_id: &str) -> Option<&Scene> {
		self.scenes.get(scene_id)
	}

	pub fn camera(&self, scene_id: &str, camera_id: &str) -> Option<&Camera> {
		self.scene(scene_id).and_then(|s| s.camera(camera_id))
	}

	/// Copies map keys into the embedded `id` fields.
	///
	/// Trees loaded from the store layout only carry ids as keys.
	pub fn normalize_ids(&mut self, project_id: &str) {
		project_id.clone_into(&mut self.id);
		for (scene_id, scene) in &mut self.scenes {
			scene_id.clone_into(&mut scene.id);
			for (camera_id, camera) in &mut scene.cameras {
				camera_id.clone_into(&mut camera.id);
			}
		}
	}
}

impl Ordered for Project {
	fn id(&self) -> &str {
		&self.id
	}
	fn name(&self) -> &str {
		&self.name
	}
	fn order(&self) -> Option<i64> {
		self.order
	}
}

/// Identity of the user or client performing a write
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
	pub uid: String,
	pub name: String,
}

impl Actor {
	pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
		Self { uid: uid.into(), name: name.into() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_camera_defaults_from_store_layout() {
		let camera: Camera = serde_json::from_str(r#"{"name":"Wide"}"#).unwrap();
		assert_eq!(camera.duration_sec, DEFAULT_DURATION_SEC);
		assert_eq!(camera.order, None);
		assert!(camera.description.is_empty());
	}

	#[test]
	fn test_normalize_ids_from_keys() {
		let raw = r#"{
			"name": "Show",
			"order": 0,
			"scenes": {
				"s1": { "name": "Opening", "order": 0, "cameras": { "c1": { "name": "Wide", "order": 0, "durationSec": 12 } } }
			}
		}"#;
		let mut project: Project = serde_json::from_str(raw).unwrap();
		project.normalize_ids("p1");

		assert_eq!(project.id, "p1");
		assert_eq!(project.scenes["s1"].id, "s1");
		assert_eq!(project.camera("s1", "c1").map(|c| c.id.as_str()), Some("c1"));
		assert_eq!(project.camera("s1", "c1").map(|c| c.duration_sec), Some(12));
	}

	#[test]
	fn test_missing_order_sorts_last() {
		let ordered = Camera::new("a", "A", 5, 30);
		let mut unordered = Camera::new("b", "B", 0, 30);
		unordered.order = None;
		assert!(ordered.sort_key() < unordered.sort_key());
	}
}
