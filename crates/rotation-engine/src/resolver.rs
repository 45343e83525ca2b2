use crate::types::{CameraId, Ordered, Project, Scene, SceneId, DEFAULT_DURATION_SEC};

/// Outcome of looking for the camera after the current one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPosition {
	Camera(CameraId),
	EndOfScene,
}

/// A `(scene, camera)` pair the rotation can sit on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
	pub scene_id: SceneId,
	pub camera_id: CameraId,
}

/// Siblings in traversal order: `order` ascending, then name, then id.
pub fn sorted_by_order_then_name<'a, T, I>(items: I) -> Vec<&'a T>
where
	T: Ordered + 'a,
	I: IntoIterator<Item = &'a T>,
{
	let mut sorted: Vec<&T> = items.into_iter().collect();
	sorted.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
	sorted
}

/// First camera of the first scene (by order) that has any cameras.
///
/// Returns `None` when no scene in the project has a camera.
pub fn first_position(project: &Project) -> Option<Position> {
	sorted_by_order_then_name(project.scenes.values()).into_iter().find_map(|scene| {
		sorted_by_order_then_name(scene.cameras.values()).first().map(|camera| Position {
			scene_id: scene.id.clone(),
			camera_id: camera.id.clone(),
		})
	})
}

/// Immediate successor of `current_camera_id` within `scene`.
///
/// Never crosses into another scene. An unknown camera counts as the end.
pub fn next_position(scene: &Scene, current_camera_id: &str) -> NextPosition {
	let cameras = sorted_by_order_then_name(scene.cameras.values());
	let Some(idx) = cameras.iter().position(|c| c.id == current_camera_id) else {
		return NextPosition::EndOfScene;
	};
	cameras.get(idx + 1).map_or(NextPosition::EndOfScene, |next| NextPosition::Camera(next.id.clone()))
}

/// Duration the camera actually runs for; non-positive values fall back to the default.
pub fn effective_duration_sec(project: &Project, scene_id: &str, camera_id: &str, default_sec: u64) -> u64 {
	project
		.camera(scene_id, camera_id)
		.and_then(|c| u64::try_from(c.duration_sec).ok())
		.filter(|d| *d > 0)
		.unwrap_or(if default_sec > 0 { default_sec } else { DEFAULT_DURATION_SEC.unsigned_abs() })
}
