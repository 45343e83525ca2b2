mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use rotation_engine::{
	spawn_live_reconciler, Actor, Camera, ChangeFeed, ClientContext, InMemoryStore, PollLoop, Project, ProjectId, ProjectInterest, RotationEngine, RuntimeStore, Scene, StoreChange, SystemClock,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::format::JsonFields;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Deserialize)]
struct ContentFile {
	projects: HashMap<ProjectId, Project>,
}

fn init_tracing(config: &Config) -> Result<()> {
	let filter = EnvFilter::from_str(&config.log_filter()).context("invalid log filter")?;

	tracing_subscriber::registry()
		.with(if config.log_json {
			Box::new(
				tracing_subscriber::fmt::layer()
					.fmt_fields(JsonFields::default())
					.event_format(tracing_subscriber::fmt::format().json().flatten_event(true).with_span_list(false))
					.with_filter(filter),
			) as Box<dyn Layer<_> + Send + Sync>
		} else {
			Box::new(tracing_subscriber::fmt::layer().with_filter(filter))
		})
		.init();
	Ok(())
}

fn load_content(path: &Path) -> Result<Vec<Project>> {
	let raw = std::fs::read_to_string(path).with_context(|| format!("reading content file {}", path.display()))?;
	let file: ContentFile = serde_json::from_str(&raw).with_context(|| format!("parsing content file {}", path.display()))?;
	Ok(file
		.projects
		.into_iter()
		.map(|(id, mut project)| {
			project.normalize_ids(&id);
			project
		})
		.collect())
}

fn demo_content() -> Vec<Project> {
	vec![Project::new("demo", "Demo Show", 0).with_scene(
		Scene::new("main", "Main Stage", 0)
			.with_camera(Camera::new("wide", "Wide", 0, 3).with_description("Full stage"))
			.with_camera(Camera::new("close", "Close-up", 1, 2))
			.with_camera(Camera::new("crowd", "Crowd", 2, 2)),
	)]
}

/// Logs every store change until cancelled.
fn spawn_change_watcher(store: &InMemoryStore, cancel: CancellationToken) -> JoinHandle<()> {
	let mut feed = store.subscribe();
	tokio::spawn(async move {
		loop {
			tokio::select! {
				() = cancel.cancelled() => break,
				change = feed.recv() => match change {
					Some(StoreChange::Live(Some(live))) => info!("LIVE {} / {} / {} (by {})", live.project_id, live.scene_id, live.camera_id, live.by.name),
					Some(StoreChange::Live(None)) => info!("LIVE cleared"),
					Some(StoreChange::Runtime { project_id, runtime }) => info!("Runtime of {}: {:?}", project_id, runtime),
					Some(other) => info!("Store change: {:?}", other),
					None => break,
				},
			}
		}
	})
}

/// Resolves once the project's rotation has finished or been cleared.
async fn rotation_done(mut feed: ChangeFeed, project_id: &str) {
	while let Some(change) = feed.recv().await {
		if let StoreChange::Runtime { project_id: changed, runtime } = change {
			if changed == project_id && runtime.as_ref().is_none_or(rotation_engine::RuntimeState::is_finished) {
				return;
			}
		}
	}
}

/// Pauses the rotation once, holds, then resumes it.
fn spawn_scripted_pause(engine: RotationEngine<InMemoryStore>, ctx: ClientContext, project_id: ProjectId, after: Duration, hold: Duration, cancel: CancellationToken) -> JoinHandle<()> {
	tokio::spawn(async move {
		let script = async {
			tokio::time::sleep(after).await;
			let paused = engine.pause(&ctx, &project_id).await?;
			info!("Scripted pause of {}: {:?}", project_id, paused.kind);
			tokio::time::sleep(hold).await;
			let resumed = engine.start(&ctx, &project_id).await?;
			info!("Scripted resume of {}: {:?}", project_id, resumed.kind);
			Ok::<(), rotation_engine::RotationError>(())
		};
		tokio::select! {
			() = cancel.cancelled() => {}
			result = script => {
				if let Err(e) = result {
					warn!("Scripted pause of {} failed: {}", project_id, e);
				}
			}
		}
	})
}

async fn run_for(run_secs: Option<u64>) {
	match run_secs {
		Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
		None => std::future::pending().await,
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	dotenv::dotenv().ok();
	let config = Config::parse();
	init_tracing(&config)?;

	let rotation = config.rotation();
	rotation.validate()?;

	let projects = match &config.content {
		Some(path) => load_content(path)?,
		None => demo_content(),
	};

	let store = InMemoryStore::from_config(&rotation);
	let target = match &config.project {
		Some(id) => id.clone(),
		None => ProjectInterest::All
			.select(projects.clone())
			.first()
			.map(|p| p.id.clone())
			.context("content tree has no projects")?,
	};
	store.load(projects).await;
	info!("Loaded content, rotating project {}", target);

	let engine = RotationEngine::new(store.clone(), Arc::new(SystemClock), rotation);
	let cancel = CancellationToken::new();

	let mut handles = vec![spawn_live_reconciler(store.clone(), cancel.clone()), spawn_change_watcher(&store, cancel.clone())];
	for idx in 0..config.clients {
		let actor = Actor::new(format!("client-{idx}"), format!("Client {idx}"));
		let ctx = if idx < config.editors { ClientContext::editor(actor) } else { ClientContext::viewer(actor) };
		handles.push(PollLoop::new(engine.clone(), ctx, ProjectInterest::All).spawn(cancel.clone()));
	}

	// Subscribe before starting so the first transitions are not missed
	let done = rotation_done(store.subscribe(), &target);
	let operator = ClientContext::editor(Actor::new("runner", "Runner"));
	engine.start(&operator, &target).await?;
	if let Some(after) = config.pause_after_secs {
		handles.push(spawn_scripted_pause(
			engine.clone(),
			operator.clone(),
			target.clone(),
			Duration::from_secs(after),
			Duration::from_secs(config.pause_for_secs),
			cancel.clone(),
		));
	}

	tokio::select! {
		() = done => info!("Rotation of {} finished", target),
		() = run_for(config.run_secs) => info!("Run time elapsed"),
		signal = tokio::signal::ctrl_c() => match signal {
			Ok(()) => info!("Interrupted"),
			Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
		},
	}

	cancel.cancel();
	for handle in handles {
		if let Err(e) = handle.await {
			warn!("Task ended abnormally: {}", e);
		}
	}

	if config.reset_on_exit {
		let reset = engine.reset(&operator, &target).await?;
		info!("Reset {}: {:?}", target, reset.kind);
	}
	info!("Shutdown complete");
	Ok(())
}
