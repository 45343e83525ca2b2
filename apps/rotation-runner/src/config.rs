use clap::Parser;
use rotation_engine::RotationConfig;
use std::path::PathBuf;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "Runs simulated clients against a shared camera rotation", long_about = None)]
pub struct Config {
	/// Use JSON formatting for tracing
	#[arg(long, env = "LOG_JSON", default_value = "false")]
	pub log_json: bool,

	/// Log filter, overrides the built-in default
	#[arg(long, env = "RUST_LOG")]
	pub rust_log: Option<String>,

	/// Content tree as JSON (`{"projects": {id: project}}`); a demo tree is used when absent
	#[arg(long, env = "ROTATION_CONTENT")]
	pub content: Option<PathBuf>,

	/// Number of simulated viewing clients, each with its own poll loop
	#[arg(long, env = "ROTATION_CLIENTS", default_value = "3")]
	pub clients: usize,

	/// How many of the clients may edit; the rest only observe
	#[arg(long, env = "ROTATION_EDITORS", default_value = "2")]
	pub editors: usize,

	/// Poll loop period in milliseconds
	#[arg(long, env = "ROTATION_TICK_MS", default_value = "500")]
	pub tick_ms: u64,

	/// Duration for cameras without a usable one, in seconds
	#[arg(long, env = "ROTATION_DEFAULT_DURATION", default_value = "30")]
	pub default_duration_sec: u64,

	/// Project to start; defaults to the newest project
	#[arg(long, env = "ROTATION_PROJECT")]
	pub project: Option<String>,

	/// Stop after this many seconds even if the rotation is still going
	#[arg(long, env = "ROTATION_RUN_SECS")]
	pub run_secs: Option<u64>,

	/// Pause the rotation this many seconds after starting it
	#[arg(long, env = "ROTATION_PAUSE_AFTER_SECS")]
	pub pause_after_secs: Option<u64>,

	/// How long a scripted pause lasts before resuming
	#[arg(long, env = "ROTATION_PAUSE_FOR_SECS", default_value = "2")]
	pub pause_for_secs: u64,

	/// Reset the rotation before exiting
	#[arg(long, env = "ROTATION_RESET_ON_EXIT")]
	pub reset_on_exit: bool,
}

impl Config {
	pub fn log_filter(&self) -> String {
		self.rust_log.clone().unwrap_or_else(|| "rotation_runner=info,rotation_engine=info".into())
	}

	pub fn rotation(&self) -> RotationConfig {
		RotationConfig::default().with_tick_interval(self.tick_ms).with_default_duration(self.default_duration_sec)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = Config::parse_from(["rotation-runner"]);
		assert_eq!(config.clients, 3);
		assert_eq!(config.rotation().tick_interval_ms, 500);
		assert!(config.rotation().validate().is_ok());
	}

	#[test]
	fn test_overrides() {
		let config = Config::parse_from(["rotation-runner", "--tick-ms", "50", "--project", "p1", "--run-secs", "5"]);
		assert_eq!(config.rotation().tick_interval_ms, 50);
		assert_eq!(config.project.as_deref(), Some("p1"));
		assert_eq!(config.run_secs, Some(5));
		assert_eq!(config.pause_after_secs, None);
		assert!(!config.reset_on_exit);
	}

	#[test]
	fn test_scripted_pause_and_reset() {
		let config = Config::parse_from(["rotation-runner", "--pause-after-secs", "4", "--pause-for-secs", "1", "--reset-on-exit"]);
		assert_eq!(config.pause_after_secs, Some(4));
		assert_eq!(config.pause_for_secs, 1);
		assert!(config.reset_on_exit);
	}
}
