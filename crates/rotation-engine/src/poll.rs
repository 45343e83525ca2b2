//! Per-client poll loop.
//!
//! Each connected client runs one of these. A tick re-reads the store, and the
//! first project of interest that needs a write (a dangling runtime to heal or
//! an elapsed deadline to advance) gets it; everything else waits for the next
//! tick. Several clients advancing the same deadline commit identical writes.

use crate::engine::{ClientContext, RotationEngine};
use crate::error::Result;
use crate::machine::{self, Transition};
use crate::store::RuntimeStore;
use crate::types::{Ordered, Project, ProjectId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Which projects a client is watching
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProjectInterest {
	/// Every project, newest first
	#[default]
	All,
	Only(ProjectId),
}

impl ProjectInterest {
	/// Projects of interest in the order a tick visits them.
	pub fn select(&self, mut projects: Vec<Project>) -> Vec<Project> {
		match self {
			Self::All => {
				projects.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
				projects
			}
			Self::Only(project_id) => projects.into_iter().filter(|p| p.id == *project_id).collect(),
		}
	}
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
	/// Previous tick on this client was still running
	Busy,
	/// Nothing was due
	Idle,
	Advanced(Transition),
	Healed(Transition),
}

/// Single-flight flag scoped to one client's ticks
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
	in_flight: Arc<AtomicBool>,
}

impl SingleFlight {
	pub fn try_acquire(&self) -> Option<FlightGuard> {
		self
			.in_flight
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.ok()
			.map(|_| FlightGuard { in_flight: Arc::clone(&self.in_flight) })
	}

	pub fn is_in_flight(&self) -> bool {
		self.in_flight.load(Ordering::Acquire)
	}
}

pub struct FlightGuard {
	in_flight: Arc<AtomicBool>,
}

impl Drop for FlightGuard {
	fn drop(&mut self) {
		self.in_flight.store(false, Ordering::Release);
	}
}

pub struct PollLoop<S> {
	engine: RotationEngine<S>,
	ctx: ClientContext,
	interest_tx: watch::Sender<ProjectInterest>,
	interest_rx: watch::Receiver<ProjectInterest>,
	flight: SingleFlight,
}

impl<S: Clone> Clone for PollLoop<S> {
	fn clone(&self) -> Self {
		Self {
			engine: self.engine.clone(),
			ctx: self.ctx.clone(),
			interest_tx: self.interest_tx.clone(),
			interest_rx: self.interest_rx.clone(),
			flight: self.flight.clone(),
		}
	}
}

impl<S> PollLoop<S>
where
	S: RuntimeStore + Clone,
{
	pub fn new(engine: RotationEngine<S>, ctx: ClientContext, interest: ProjectInterest) -> Self {
		let (interest_tx, interest_rx) = watch::channel(interest);
		Self {
			engine,
			ctx,
			interest_tx,
			interest_rx,
			flight: SingleFlight::default(),
		}
	}

	pub fn flight(&self) -> &SingleFlight {
		&self.flight
	}

	/// Switch the projects this client watches; takes effect on the next tick.
	pub fn set_interest(&self, interest: ProjectInterest) {
		debug!("Client {} now watching {:?}", self.ctx.actor.uid, interest);
		self.interest_tx.send_replace(interest);
	}

	pub fn interest(&self) -> ProjectInterest {
		self.interest_rx.borrow().clone()
	}

	/// Runs one tick: at most one store write, and never two ticks at once on
	/// the same client.
	pub async fn tick_once(&self) -> Result<TickOutcome> {
		let Some(_guard) = self.flight.try_acquire() else {
			debug!("Tick skipped on client {}, previous tick still in flight", self.ctx.actor.uid);
			return Ok(TickOutcome::Busy);
		};

		if !self.ctx.can_edit {
			return Ok(TickOutcome::Idle);
		}

		let projects = self.interest().select(self.engine.store().projects().await?);
		let now = self.engine.now();

		for project in &projects {
			if machine::heal(project).is_some() {
				warn!("Project {} runtime points at deleted content, resetting", project.id);
				if let Some(healed) = self.engine.heal(&self.ctx, project).await? {
					return Ok(TickOutcome::Healed(healed));
				}
			}

			let transition = self.engine.advance_snapshot(&self.ctx, project, now).await?;
			if !transition.is_noop() {
				return Ok(TickOutcome::Advanced(transition));
			}
		}
		Ok(TickOutcome::Idle)
	}

	/// Ticks on the configured interval until cancelled.
	pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
		tokio::spawn(async move {
			let mut ticker = interval(self.engine.config().tick_interval());
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
			info!("Poll loop started for client {} every {:?}", self.ctx.actor.uid, self.engine.config().tick_interval());

			loop {
				tokio::select! {
					() = cancel.cancelled() => {
						debug!("Poll loop for client {} cancelled", self.ctx.actor.uid);
						break;
					}
					_ = ticker.tick() => {
						match self.tick_once().await {
							Ok(TickOutcome::Advanced(t) | TickOutcome::Healed(t)) => debug!("Client {} wrote {:?} for project {}", self.ctx.actor.uid, t.kind, t.project_id),
							Ok(TickOutcome::Busy | TickOutcome::Idle) => {}
							Err(e) if e.is_recoverable() => warn!("Tick failed on client {}, retrying next tick: {}", self.ctx.actor.uid, e),
							Err(e) => {
								error!("Poll loop for client {} stopping: {}", self.ctx.actor.uid, e);
								break;
							}
						}
					}
				}
			}
			info!("Poll loop stopped for client {}", self.ctx.actor.uid);
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;
	use crate::config::RotationConfig;
	use crate::machine::TransitionKind;
	use crate::store::InMemoryStore;
	use crate::types::{Actor, Camera, Scene};

	fn project(id: &str, order: i64) -> Project {
		Project::new(id, id.to_uppercase(), order).with_scene(
			Scene::new("s1", "Scene", 0)
				.with_camera(Camera::new("c1", "One", 0, 5))
				.with_camera(Camera::new("c2", "Two", 1, 5)),
		)
	}

	async fn poll_loop(ctx: ClientContext, interest: ProjectInterest) -> (PollLoop<InMemoryStore>, ManualClock) {
		let store = InMemoryStore::default();
		store.load([project("old", 0), project("new", 1)]).await;
		let clock = ManualClock::new(0);
		let engine = RotationEngine::new(store, Arc::new(clock.clone()), RotationConfig::default());
		(PollLoop::new(engine, ctx, interest), clock)
	}

	fn editor() -> ClientContext {
		ClientContext::editor(Actor::new("u1", "Director"))
	}

	#[test]
	fn test_all_interest_is_newest_first() {
		let picked = ProjectInterest::All.select(vec![project("old", 0), project("new", 1)]);
		let ids: Vec<&str> = picked.iter().map(|p| p.id.as_str()).collect();
		assert_eq!(ids, vec!["new", "old"]);

		let only = ProjectInterest::Only("old".into()).select(vec![project("old", 0), project("new", 1)]);
		assert_eq!(only.len(), 1);
	}

	#[test]
	fn test_single_flight_guard_releases_on_drop() {
		let flight = SingleFlight::default();
		let guard = flight.try_acquire();
		assert!(guard.is_some());
		assert!(flight.try_acquire().is_none());
		drop(guard);
		assert!(!flight.is_in_flight());
		assert!(flight.try_acquire().is_some());
	}

	#[tokio::test]
	async fn test_one_write_per_tick() {
		let (poll, clock) = poll_loop(editor(), ProjectInterest::All).await;
		poll.engine.start(&editor(), "old").await.unwrap();
		poll.engine.start(&editor(), "new").await.unwrap();
		clock.set(5_000);

		let first = poll.tick_once().await.unwrap();
		let TickOutcome::Advanced(t) = first else { panic!("expected an advance") };
		assert_eq!(t.project_id, "new");

		let second = poll.tick_once().await.unwrap();
		let TickOutcome::Advanced(t) = second else { panic!("expected an advance") };
		assert_eq!(t.project_id, "old");
		assert_eq!(t.kind, TransitionKind::Advanced);

		assert_eq!(poll.tick_once().await.unwrap(), TickOutcome::Idle);
	}

	#[tokio::test]
	async fn test_busy_while_in_flight() {
		let (poll, _) = poll_loop(editor(), ProjectInterest::All).await;
		let _held = poll.flight().try_acquire();
		assert_eq!(poll.tick_once().await.unwrap(), TickOutcome::Busy);
	}

	#[tokio::test]
	async fn test_interest_switch() {
		let (poll, clock) = poll_loop(editor(), ProjectInterest::Only("old".into())).await;
		poll.engine.start(&editor(), "new").await.unwrap();
		clock.set(5_000);
		assert_eq!(poll.tick_once().await.unwrap(), TickOutcome::Idle);

		poll.set_interest(ProjectInterest::Only("new".into()));
		assert!(matches!(poll.tick_once().await.unwrap(), TickOutcome::Advanced(_)));
	}

	#[tokio::test]
	async fn test_viewer_never_writes() {
		let (poll, clock) = poll_loop(ClientContext::viewer(Actor::new("v", "Viewer")), ProjectInterest::All).await;
		poll.engine.start(&editor(), "new").await.unwrap();
		clock.set(60_000);
		assert_eq!(poll.tick_once().await.unwrap(), TickOutcome::Idle);
		assert_eq!(poll.engine.runtime("new").await.unwrap().and_then(|rt| rt.ends_at()), Some(5_000));
	}
}
