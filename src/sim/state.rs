//! Session state and core flow types
//!
//! `GameSession` is the one context object that owns everything the flow
//! controller touches: clock, timers, stage, player, pools, ledger and the
//! preference store. Hosts drive it with `tick` and the panel-button methods,
//! then drain `GameEvent`s to update presentation.

use glam::Vec3;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use thiserror::Error;

use super::clock::{ClockDomain, SimulationClock};
use super::ledger::{ProgressionLedger, UpgradeKind};
use super::level::Stage;
use super::player::Player;
use super::pool::{ActorPool, ScanPolicy, SlotId};
use super::projectile::{Effect, Projectile};
use super::timers::{TimerKey, TimerKind, TimerOwner, TimerWheel};
use crate::audio::{MusicFader, SoundEffect};
use crate::persistence::{PrefsStore, WriteBatch, commit_or_log};
use crate::settings::AudioSettings;
use crate::tuning::{LevelBlueprint, SessionConfig};

/// Top-level flow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowState {
    /// Waiting for a tap to start (or resume) play
    Idle,
    Playing,
    /// Completion panel showing
    LevelComplete,
    /// Failed panel showing
    Failed,
    /// Upgrade panel showing
    UpgradePause,
}

impl FlowState {
    /// Every state except `Playing` freezes scaled time
    pub fn is_paused(self) -> bool {
        self != FlowState::Playing
    }
}

/// Modal panels the host shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    LevelComplete,
    Failed,
    Upgrade,
}

/// One button on the upgrade panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeOption {
    pub kind: UpgradeKind,
    pub label: &'static str,
    pub count: u32,
    pub maxed: bool,
}

/// Outcome of picking an upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeOutcome {
    Applied(UpgradeKind),
    /// At its cap; the panel stays open
    Maxed(UpgradeKind),
}

/// Notifications for the host (UI, audio, VFX)
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Sound(SoundEffect),
    HealthChanged { health: u32, max: u32 },
    PanelShown(Panel),
    PanelHidden(Panel),
    LevelStarted { level: usize },
    LevelCompleted { level: usize, stars: u32, final_level: bool },
    LevelFailed { level: Option<usize> },
    /// All levels already passed; nothing to start
    NothingToStart,
    UpgradeOffered { options: Vec<UpgradeOption> },
    UpgradeMaxed { kind: UpgradeKind },
    UpgradeApplied { kind: UpgradeKind, xp_threshold: u32 },
    XpChanged { xp: u32, threshold: u32 },
    EffectPlayed { position: Vec3 },
    Confetti { position: Vec3 },
    ConfettiFinished,
    ProgressReset,
}

/// Flow controller failures
///
/// Each one is logged where it is raised; none of them leave partial state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("no levels configured")]
    NoLevels,
    #[error("level start anchor not configured")]
    MissingStartAnchor,
    #[error("level index {index} out of range ({count} levels)")]
    InvalidLevelIndex { index: usize, count: usize },
    #[error("{operation} is not valid while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: FlowState,
    },
    #[error("unknown upgrade option {0}")]
    UnknownUpgrade(usize),
}

pub type FlowResult<T> = Result<T, FlowError>;

pub struct GameSession {
    pub(crate) config: SessionConfig,
    pub(crate) state: FlowState,
    pub(crate) clock: SimulationClock,
    pub(crate) timers: TimerWheel,
    pub(crate) stage: Stage,
    pub(crate) player: Player,
    pub(crate) projectiles: ActorPool<Projectile>,
    pub(crate) effects: ActorPool<Effect>,
    pub(crate) ledger: ProgressionLedger,
    pub(crate) music: MusicFader,
    pub(crate) store: Box<dyn PrefsStore>,
    pub(crate) rng: Pcg32,
    pub(crate) current_level: Option<usize>,
    /// Level to arm when the completion panel is dismissed
    pub(crate) pending_level: Option<usize>,
    /// Completion panel is in restart mode
    pub(crate) final_mode: bool,
    /// Vertical end-marker distance at level start
    pub(crate) initial_distance: Option<f32>,
    pub(crate) progress: f32,
    pub(crate) confetti_active: bool,
    pub(crate) events: Vec<GameEvent>,
}

impl GameSession {
    /// Build the stage, load progression and wait paused for the first tap
    pub fn new(
        config: SessionConfig,
        blueprints: &[LevelBlueprint],
        store: Box<dyn PrefsStore>,
    ) -> Self {
        let mut stage = Stage::build(blueprints);
        stage.deactivate_all_levels();
        if stage.level_count() == 0 {
            log::error!("Session created without levels");
        }

        let ledger = ProgressionLedger::load(
            store.as_ref(),
            stage.level_count(),
            &config.player.caps,
            config.xp_threshold,
        );

        let start = config.player_start.unwrap_or(Vec3::ZERO);
        let mut player = Player::new(config.player.clone(), start);
        player.load_upgrade_state(ledger.upgrades());

        let projectiles = ActorPool::new(
            "Projectile",
            Projectile::default(),
            config.projectile_pool_size,
            ScanPolicy::RoundRobin,
        );
        let effect_capacity = if config.effect.is_some() {
            config.effect_pool_size
        } else {
            log::warn!("No effect configured; effect pool not created");
            0
        };
        let effects = ActorPool::new("Effect", Effect::default(), effect_capacity, ScanPolicy::Linear);

        let mut session = Self {
            rng: Pcg32::seed_from_u64(config.seed),
            config,
            state: FlowState::Idle,
            clock: SimulationClock::new(),
            timers: TimerWheel::new(),
            stage,
            player,
            projectiles,
            effects,
            ledger,
            music: MusicFader::default(),
            store,
            current_level: None,
            pending_level: None,
            final_mode: false,
            initial_distance: None,
            progress: 0.0,
            confetti_active: false,
            events: Vec::new(),
        };

        if let Some(level) = session.config.debug_start_level {
            // Errors are logged inside
            let _ = session.apply_debug_start(level);
        }
        session
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn timers(&self) -> &TimerWheel {
        &self.timers
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn projectiles(&self) -> &ActorPool<Projectile> {
        &self.projectiles
    }

    pub fn effects(&self) -> &ActorPool<Effect> {
        &self.effects
    }

    pub fn ledger(&self) -> &ProgressionLedger {
        &self.ledger
    }

    pub fn music(&self) -> &MusicFader {
        &self.music
    }

    pub fn store(&self) -> &dyn PrefsStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn PrefsStore {
        self.store.as_mut()
    }

    pub fn level_count(&self) -> usize {
        self.stage.level_count()
    }

    pub fn current_level(&self) -> Option<usize> {
        self.current_level
    }

    pub fn pending_level(&self) -> Option<usize> {
        self.pending_level
    }

    pub fn is_final_mode(&self) -> bool {
        self.final_mode
    }

    pub fn is_level_passed(&self, index: usize) -> bool {
        self.ledger.is_passed(index)
    }

    /// Level progress in [0, 1]; 0 when progress tracking is unavailable
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn is_confetti_active(&self) -> bool {
        self.confetti_active
    }

    /// Take every event queued since the last call
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Push user audio levels into the music fader
    pub fn apply_audio_settings(&mut self, settings: &AudioSettings) {
        self.music.set_volume(settings.effective_music_volume());
    }

    pub(crate) fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub(crate) fn persist(&mut self, batch: WriteBatch) {
        commit_or_log(self.store.as_mut(), batch);
    }

    /// Move to `state`, pausing or resuming the clock to match
    pub(crate) fn enter(&mut self, state: FlowState) {
        if self.state != state {
            log::debug!("Flow {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.clock.set_paused(state.is_paused());
    }

    pub(crate) fn emit_health(&mut self) {
        let health = self.player.health();
        let max = self.player.max_health();
        self.emit(GameEvent::HealthChanged { health, max });
    }

    pub(crate) fn emit_xp(&mut self) {
        let xp = self.ledger.xp();
        let threshold = self.ledger.xp_threshold();
        self.emit(GameEvent::XpChanged { xp, threshold });
    }

    pub(crate) fn schedule(&mut self, owner: TimerOwner, kind: TimerKind, delay: f32) {
        self.timers.schedule(
            TimerKey::new(owner, kind),
            delay,
            ClockDomain::Scaled,
            &self.clock,
        );
    }

    pub(crate) fn schedule_unscaled(&mut self, owner: TimerOwner, kind: TimerKind, delay: f32) {
        self.timers.schedule(
            TimerKey::new(owner, kind),
            delay,
            ClockDomain::Unscaled,
            &self.clock,
        );
    }

    /// Next free projectile slot, expanding the pool if needed
    pub fn get_pooled_projectile(&mut self) -> Option<SlotId> {
        self.projectiles.acquire()
    }

    /// Deactivate every in-flight projectile and drop its timers
    pub fn clear_projectiles(&mut self) {
        let now = self.clock.scaled().now;
        self.projectiles.release_all(now);
        self.timers
            .cancel_matching(|owner| matches!(owner, TimerOwner::Projectile(_)));
    }

    /// Play the death effect at a world position
    pub fn play_effect(&mut self, position: Vec3) {
        let Some(effect) = self.config.effect.clone() else {
            log::warn!("play_effect called but no effect is configured");
            return;
        };
        let Some(slot) = self.effects.acquire() else {
            log::warn!("No pooled effect available");
            return;
        };
        let now = self.clock.scaled().now;
        if let Some(fx) = self.effects.get_mut(slot) {
            fx.play(position, now);
        }
        self.schedule(
            TimerOwner::Effect(slot),
            TimerKind::EffectExpire,
            effect.active_time(),
        );
        self.emit(GameEvent::EffectPlayed { position });
    }
}
