//! Narrow read/write interface to the shared store.
//!
//! The store is last-write-wins per key and fans every change out to all
//! subscribers. Writers only ever propose; whatever the store holds after a
//! race is what the next poll tick works from.

use crate::error::{Result, RotationError};
use crate::live::{LivePointer, LiveUpdate};
use crate::runtime::RuntimeState;
use crate::types::{Project, ProjectId};
use async_broadcast::{broadcast, InactiveReceiver, Receiver, RecvError, Sender, TrySendError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Change to a project's `runtime` key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeWrite {
	Keep,
	Set(RuntimeState),
	Delete,
}

/// One logical update: a runtime write and the live update that goes with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreWrite {
	pub runtime: RuntimeWrite,
	pub live: LiveUpdate,
}

impl StoreWrite {
	pub fn live_only(live: LiveUpdate) -> Self {
		Self { runtime: RuntimeWrite::Keep, live }
	}

	pub fn is_empty(&self) -> bool {
		self.runtime == RuntimeWrite::Keep && self.live == LiveUpdate::Keep
	}
}

/// Notification fanned out to every subscriber after a write lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
	Runtime { project_id: ProjectId, runtime: Option<RuntimeState> },
	Live(Option<LivePointer>),
	/// Scenes or cameras of a project were edited
	Content { project_id: ProjectId },
	ProjectRemoved { project_id: ProjectId },
}

/// Subscriber end of the store's change fan-out
pub struct ChangeFeed {
	rx: Receiver<StoreChange>,
}

impl ChangeFeed {
	pub(crate) fn new(rx: Receiver<StoreChange>) -> Self {
		Self { rx }
	}

	/// Next change, or `None` once the store is gone.
	///
	/// A subscriber that falls behind loses the oldest changes; it only needs
	/// the latest state, which it can always re-read.
	pub async fn recv(&mut self) -> Option<StoreChange> {
		loop {
			match self.rx.recv().await {
				Ok(change) => return Some(change),
				Err(RecvError::Overflowed(n)) => warn!("Change feed lagged, {} changes dropped", n),
				Err(RecvError::Closed) => return None,
			}
		}
	}
}

#[async_trait]
pub trait RuntimeStore: Send + Sync + 'static {
	async fn project(&self, project_id: &str) -> Result<Option<Project>>;

	async fn projects(&self) -> Result<Vec<Project>>;

	async fn live(&self) -> Result<Option<LivePointer>>;

	/// Applies the runtime write and live update as one logical update.
	async fn commit(&self, project_id: &str, write: StoreWrite) -> Result<()>;

	fn subscribe(&self) -> ChangeFeed;
}

pub(crate) struct StoreTree {
	pub projects: HashMap<ProjectId, Project>,
	pub live: Option<LivePointer>,
}

/// Process-local store with last-write-wins semantics.
///
/// Stands in for the replicated store every client shares. Cloning yields
/// another handle onto the same data.
#[derive(Clone)]
pub struct InMemoryStore {
	pub(crate) tree: Arc<RwLock<StoreTree>>,
	changes: Sender<StoreChange>,
	_keep_alive: InactiveReceiver<StoreChange>,
	pub(crate) min_duration_sec: i64,
	pub(crate) default_duration_sec: i64,
}

impl InMemoryStore {
	pub fn new(capacity: usize) -> Self {
		let (mut changes, rx) = broadcast::<StoreChange>(capacity.max(1));
		changes.set_await_active(false);
		changes.set_overflow(true);

		Self {
			tree: Arc::new(RwLock::new(StoreTree {
				projects: HashMap::new(),
				live: None,
			})),
			changes,
			_keep_alive: rx.deactivate(),
			min_duration_sec: 1,
			default_duration_sec: crate::types::DEFAULT_DURATION_SEC,
		}
	}

	pub fn from_config(config: &crate::RotationConfig) -> Self {
		let mut store = Self::new(config.change_feed_capacity);
		store.min_duration_sec = i64::try_from(config.min_duration_sec).unwrap_or(1);
		store.default_duration_sec = i64::try_from(config.default_duration_sec).unwrap_or(crate::types::DEFAULT_DURATION_SEC);
		store
	}

	/// Seeds the store with a content tree, replacing any project with the same id.
	pub async fn load<I>(&self, projects: I)
	where
		I: IntoIterator<Item = Project>,
	{
		let mut tree = self.tree.write().await;
		for project in projects {
			let project_id = project.id.clone();
			tree.projects.insert(project_id.clone(), project);
			self.emit(StoreChange::Content { project_id });
		}
	}

	/// Publishes a change while the caller still holds the write lock, so
	/// subscribers see changes in write order.
	pub(crate) fn emit(&self, change: StoreChange) {
		match self.changes.try_broadcast(change) {
			Ok(_) | Err(TrySendError::Inactive(_)) => {}
			Err(TrySendError::Full(_)) => warn!("Change feed full, store change dropped"),
			Err(TrySendError::Closed(_)) => debug!("Change feed closed, store change dropped"),
		}
	}
}

impl Default for InMemoryStore {
	fn default() -> Self {
		Self::new(256)
	}
}

#[async_trait]
impl RuntimeStore for InMemoryStore {
	async fn project(&self, project_id: &str) -> Result<Option<Project>> {
		Ok(self.tree.read().await.projects.get(project_id).cloned())
	}

	async fn projects(&self) -> Result<Vec<Project>> {
		Ok(self.tree.read().await.projects.values().cloned().collect())
	}

	async fn live(&self) -> Result<Option<LivePointer>> {
		Ok(self.tree.read().await.live.clone())
	}

	async fn commit(&self, project_id: &str, write: StoreWrite) -> Result<()> {
		if write.is_empty() {
			return Ok(());
		}

		let mut guard = self.tree.write().await;
		let tree = &mut *guard;

		if write.runtime != RuntimeWrite::Keep {
			let project = tree.projects.get_mut(project_id).ok_or_else(|| RotationError::ProjectNotFound(project_id.to_string()))?;
			project.runtime = match write.runtime {
				RuntimeWrite::Set(rt) => Some(rt),
				RuntimeWrite::Delete | RuntimeWrite::Keep => None,
			};
			debug!("Runtime for project {} is now {:?}", project_id, project.runtime);
			self.emit(StoreChange::Runtime {
				project_id: project_id.to_string(),
				runtime: project.runtime.clone(),
			});
		}

		if write.live.apply_to(&mut tree.live) {
			self.emit(StoreChange::Live(tree.live.clone()));
		}
		Ok(())
	}

	fn subscribe(&self) -> ChangeFeed {
		ChangeFeed::new(self.changes.new_receiver())
	}
}
