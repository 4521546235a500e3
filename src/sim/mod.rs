//! Deterministic session simulation
//!
//! All gameplay logic lives here. This module must stay deterministic:
//! - Frame time comes in from the host; scaled time stops while paused
//! - Seeded RNG only
//! - Stable iteration order (arena ids, ordered maps)
//! - No rendering, audio playback or platform dependencies

pub mod clock;
pub mod collision;
pub mod flow;
pub mod ledger;
pub mod level;
pub mod obstacle;
pub mod player;
pub mod pool;
pub mod projectile;
pub mod scene;
pub mod snapshot;
pub mod state;
pub mod tick;
pub mod timers;

pub use clock::{ClockDomain, ClockSample, SimulationClock};
pub use collision::{Contact, detect_contacts};
pub use ledger::{ProgressionLedger, UpgradeCaps, UpgradeCounters, UpgradeKind};
pub use level::{Level, Stage};
pub use obstacle::{Mover, MoverAxis, MoverSpec, Obstacle, ObstacleSpec};
pub use player::{DamageOutcome, Player, PlayerEconomyState};
pub use pool::{ActorPool, PooledActor, ScanPolicy, SlotId};
pub use projectile::{Effect, Projectile};
pub use scene::{NodeId, Pose, SceneGraph, Transform};
pub use snapshot::{LevelSnapshotEntry, RestoreHook, SnapshotStore};
pub use state::{
    FlowError, FlowResult, FlowState, GameEvent, GameSession, Panel, UpgradeOption,
    UpgradeOutcome,
};
pub use tick::{TickInput, tick};
pub use timers::{TimerKey, TimerKind, TimerOwner, TimerWheel};
