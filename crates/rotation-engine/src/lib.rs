//! Camera rotation scheduling.
//!
//! Projects hold scenes, scenes hold cameras, and a running project steps
//! through the cameras of one scene, showing each for its duration. State lives
//! in a shared store; every client polls it and advances whatever is due, so
//! there is no coordinator to lose.

pub mod clock;
pub mod config;
pub mod content;
pub mod deadline;
pub mod engine;
pub mod error;
pub mod live;
pub mod machine;
pub mod poll;
pub mod resolver;
pub mod runtime;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RotationConfig;
pub use engine::{ClientContext, RotationEngine};
pub use error::{Result, RotationError};
pub use live::{spawn_live_reconciler, LivePointer, LiveUpdate};
pub use machine::{Transition, TransitionKind};
pub use poll::{PollLoop, ProjectInterest, SingleFlight, TickOutcome};
pub use runtime::{RuntimePhase, RuntimeState, RuntimeStatus};
pub use store::{ChangeFeed, InMemoryStore, RuntimeStore, StoreChange, StoreWrite};
pub use types::{Actor, Camera, CameraId, Project, ProjectId, Scene, SceneId, TimeMs};
