use crate::types::ProjectId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RotationError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RotationError {
	#[error("Project {project_id} has no scene with a camera to rotate through")]
	EmptyRotation { project_id: ProjectId },

	#[error("Project not found: {0}")]
	ProjectNotFound(ProjectId),

	#[error("Scene not found: {0}")]
	SceneNotFound(String),

	#[error("Camera not found: {0}")]
	CameraNotFound(String),

	#[error("Invalid content: {0}")]
	InvalidContent(String),

	#[error("Client is not allowed to edit")]
	EditNotPermitted,

	#[error("Store error: {0}")]
	Store(String),

	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
}

impl RotationError {
	/// Errors a poll loop can log and retry on its next tick
	pub fn is_recoverable(&self) -> bool {
		matches!(self, Self::Store(_) | Self::ProjectNotFound(_) | Self::EmptyRotation { .. })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_recoverable_classification() {
		assert!(RotationError::Store("timeout".into()).is_recoverable());
		assert!(!RotationError::EditNotPermitted.is_recoverable());
		assert!(!RotationError::InvalidConfig("x".into()).is_recoverable());
	}

	#[test]
	fn test_empty_rotation_message_names_project() {
		let err = RotationError::EmptyRotation { project_id: "p1".into() };
		assert!(err.to_string().contains("p1"));
	}
}
