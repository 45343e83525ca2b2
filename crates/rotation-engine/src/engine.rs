//! Per-client façade over the shared store.
//!
//! Every client runs its own engine against the same store. Operations read a
//! snapshot, compute a [`Transition`] and commit it as one write; there is no
//! leader and no lock beyond the store's own last-write-wins.

use crate::clock::Clock;
use crate::config::RotationConfig;
use crate::deadline::remaining_for;
use crate::error::{Result, RotationError};
use crate::live::LivePointer;
use crate::machine::{self, Transition};
use crate::runtime::RuntimeState;
use crate::store::{ChangeFeed, RuntimeStore};
use crate::types::{Actor, Project, TimeMs};
use std::sync::Arc;
use tracing::{debug, info};

/// Who is acting, and whether they may write runtime state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
	pub actor: Actor,
	pub can_edit: bool,
}

impl ClientContext {
	pub fn editor(actor: Actor) -> Self {
		Self { actor, can_edit: true }
	}

	pub fn viewer(actor: Actor) -> Self {
		Self { actor, can_edit: false }
	}

	fn ensure_can_edit(&self) -> Result<()> {
		if self.can_edit {
			Ok(())
		} else {
			Err(RotationError::EditNotPermitted)
		}
	}
}

pub struct RotationEngine<S> {
	store: S,
	clock: Arc<dyn Clock>,
	config: RotationConfig,
}

impl<S: Clone> Clone for RotationEngine<S> {
	fn clone(&self) -> Self {
		Self {
			store: self.store.clone(),
			clock: Arc::clone(&self.clock),
			config: self.config.clone(),
		}
	}
}

impl<S> RotationEngine<S>
where
	S: RuntimeStore + Clone,
{
	pub fn new(store: S, clock: Arc<dyn Clock>, config: RotationConfig) -> Self {
		Self { store, clock, config }
	}

	pub fn store(&self) -> &S {
		&self.store
	}

	pub fn config(&self) -> &RotationConfig {
		&self.config
	}

	pub fn now(&self) -> TimeMs {
		self.clock.now_ms()
	}

	pub fn subscribe(&self) -> ChangeFeed {
		self.store.subscribe()
	}

	async fn load(&self, project_id: &str) -> Result<Project> {
		self.store.project(project_id).await?.ok_or_else(|| RotationError::ProjectNotFound(project_id.to_string()))
	}

	/// Commits a transition as one store write. No-ops never touch the store.
	async fn apply(&self, ctx: &ClientContext, transition: Transition, now: TimeMs) -> Result<Transition> {
		if transition.is_noop() {
			debug!("Project {} unchanged at {}", transition.project_id, now);
			return Ok(transition);
		}
		self.store.commit(&transition.project_id, transition.store_write(&ctx.actor, now)).await?;
		info!("Project {} {:?} by {} -> {:?}", transition.project_id, transition.kind, ctx.actor.name, transition.after);
		Ok(transition)
	}

	/// Start from the first camera, or resume a paused rotation.
	pub async fn start(&self, ctx: &ClientContext, project_id: &str) -> Result<Transition> {
		ctx.ensure_can_edit()?;
		let project = self.load(project_id).await?;
		let now = self.now();
		let transition = machine::start(&project, now, self.config.default_duration_sec)?;
		self.apply(ctx, transition, now).await
	}

	pub async fn pause(&self, ctx: &ClientContext, project_id: &str) -> Result<Transition> {
		ctx.ensure_can_edit()?;
		let project = self.load(project_id).await?;
		let now = self.now();
		self.apply(ctx, machine::pause(&project, now), now).await
	}

	pub async fn reset(&self, ctx: &ClientContext, project_id: &str) -> Result<Transition> {
		ctx.ensure_can_edit()?;
		let project = self.load(project_id).await?;
		self.apply(ctx, machine::reset(&project), self.now()).await
	}

	/// Advance a project if its current camera is due, reading a fresh snapshot.
	pub async fn advance(&self, ctx: &ClientContext, project_id: &str) -> Result<Transition> {
		ctx.ensure_can_edit()?;
		let project = self.load(project_id).await?;
		self.advance_snapshot(ctx, &project, self.now()).await
	}

	/// Advance against a snapshot the caller already holds.
	///
	/// Racing clients working from the same snapshot and instant commit the
	/// same write, so whichever lands last changes nothing.
	pub async fn advance_snapshot(&self, ctx: &ClientContext, project: &Project, now: TimeMs) -> Result<Transition> {
		ctx.ensure_can_edit()?;
		let transition = machine::advance(project, now, self.config.default_duration_sec);
		self.apply(ctx, transition, now).await
	}

	/// Drop a runtime that points at deleted content. `None` when there was nothing to heal.
	pub async fn heal(&self, ctx: &ClientContext, project: &Project) -> Result<Option<Transition>> {
		ctx.ensure_can_edit()?;
		match machine::heal(project) {
			Some(transition) => self.apply(ctx, transition, self.now()).await.map(Some),
			None => Ok(None),
		}
	}

	/// Effective runtime of a project; a dangling runtime reads as `None`.
	pub async fn runtime(&self, project_id: &str) -> Result<Option<RuntimeState>> {
		let project = self.load(project_id).await?;
		Ok(machine::effective_runtime(&project).cloned())
	}

	/// Whole seconds left on the current camera, `None` when idle.
	pub async fn remaining_now(&self, project_id: &str) -> Result<Option<u64>> {
		let project = self.load(project_id).await?;
		Ok(remaining_for(machine::effective_runtime(&project), self.now()))
	}

	pub async fn live(&self) -> Result<Option<LivePointer>> {
		self.store.live().await
	}
}
