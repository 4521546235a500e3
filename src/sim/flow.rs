//! Level flow controller
//!
//! Every transition of the session state machine lives here:
//!
//! ```text
//! Idle --tap--> Playing --end reached--> LevelComplete --continue--> Idle
//!                  |  \                         \--restart (final)--> Idle (wiped)
//!                  |   \--health 0--> Failed --retry--> Playing
//!                  \--xp >= threshold--> UpgradePause --pick--> Playing
//! ```
//!
//! Only this module pauses or resumes the simulation clock.

use super::ledger::{UpgradeCounters, UpgradeKind};
use super::player::DamageOutcome;
use super::scene::NodeId;
use super::state::{
    FlowError, FlowResult, FlowState, GameEvent, GameSession, Panel, UpgradeOption,
    UpgradeOutcome,
};
use super::timers::{TimerKind, TimerOwner};
use crate::audio::SoundEffect;
use crate::consts::{
    CONFETTI_DURATION, MAX_STARS, MIN_PROGRESS_DISTANCE, MUSIC_FADE_DURATION,
    UPGRADE_MUSIC_MULTIPLIER,
};

impl GameSession {
    fn require_state(&self, operation: &'static str, expected: FlowState) -> FlowResult<()> {
        if self.state == expected {
            return Ok(());
        }
        log::debug!("{} ignored while {:?}", operation, self.state);
        Err(FlowError::InvalidState {
            operation,
            state: self.state,
        })
    }

    fn require_levels(&self) -> FlowResult<usize> {
        match self.stage.level_count() {
            0 => {
                log::error!("No levels configured");
                Err(FlowError::NoLevels)
            }
            n => Ok(n),
        }
    }

    /// First tap in `Idle`: start the resume level or the next unpassed one
    ///
    /// Returns the started level, or `None` when every level is passed.
    pub fn begin_from_input(&mut self) -> FlowResult<Option<usize>> {
        self.require_state("begin_from_input", FlowState::Idle)?;
        let count = self.require_levels()?;

        match self.ledger.first_unpassed(self.ledger.last_reached(), count) {
            Some(start) => {
                self.start_level(start)?;
                Ok(Some(start))
            }
            None => {
                log::info!("All levels passed! Nothing to start.");
                self.emit(GameEvent::NothingToStart);
                Ok(None)
            }
        }
    }

    /// Make `index` the single active level and start playing it
    pub fn start_level(&mut self, index: usize) -> FlowResult<()> {
        let count = self.require_levels()?;
        if index >= count {
            log::warn!("start_level: invalid index {}", index);
            return Err(FlowError::InvalidLevelIndex { index, count });
        }
        let Some(anchor) = self.config.level_start_anchor else {
            log::error!("Level start anchor not configured");
            return Err(FlowError::MissingStartAnchor);
        };

        self.stage.deactivate_all_levels();
        self.stage.set_level_active(index, true);
        let root = self.stage.levels[index].root;
        self.stage.graph.set_world_pose(root, anchor);
        self.stage.reset_level(index, &mut self.timers);

        match self.config.player_start {
            Some(start) => self.player.teleport(start),
            None => log::warn!("No player start anchor; player keeps its position"),
        }
        self.player.reset_player();
        self.timers.cancel_owner(TimerOwner::Player);
        self.emit_health();

        self.current_level = Some(index);
        self.pending_level = None;
        self.final_mode = false;
        let batch = self.ledger.set_last_reached(index);
        self.persist(batch);

        self.initial_distance = match (self.stage.end_marker_y(index), self.config.player_start) {
            (Some(end_y), Some(start)) => {
                let distance = (end_y - start.y).abs();
                Some(if distance <= f32::EPSILON {
                    MIN_PROGRESS_DISTANCE
                } else {
                    distance
                })
            }
            _ => None,
        };
        self.progress = 0.0;

        log::info!("Started at Level {}", index + 1);
        self.enter(FlowState::Playing);
        self.emit(GameEvent::LevelStarted { level: index });

        if self.ledger.threshold_reached() {
            self.enter_upgrade_pause();
        }
        Ok(())
    }

    /// The player reached the end of `index`
    pub fn on_level_passed(&mut self, index: usize) -> FlowResult<()> {
        self.require_state("on_level_passed", FlowState::Playing)?;
        let count = self.require_levels()?;
        if index >= count {
            log::warn!("on_level_passed: invalid index {}", index);
            return Err(FlowError::InvalidLevelIndex { index, count });
        }
        let Some(batch) = self.ledger.mark_passed(index) else {
            log::debug!("Level {} already passed", index + 1);
            return Ok(());
        };
        self.persist(batch);

        self.stage.set_level_active(index, false);
        log::info!("Level {} passed.", index + 1);

        let next = self.ledger.first_unpassed(index + 1, count);
        self.pending_level = next;
        self.final_mode = next.is_none();

        if let Some(start) = self.config.player_start {
            self.player.teleport(start);
        }
        self.clear_projectiles();
        self.show_level_complete(index);
        Ok(())
    }

    fn show_level_complete(&mut self, index: usize) {
        self.enter(FlowState::LevelComplete);
        let stars = self.player.health().min(MAX_STARS);
        self.emit(GameEvent::Sound(SoundEffect::LevelComplete));

        if self.final_mode {
            let position = self
                .config
                .confetti_anchor
                .unwrap_or(self.player.position);
            self.confetti_active = true;
            self.schedule_unscaled(TimerOwner::Celebration, TimerKind::Confetti, CONFETTI_DURATION);
            self.emit(GameEvent::Confetti { position });
        }

        self.emit(GameEvent::PanelShown(Panel::LevelComplete));
        self.emit(GameEvent::LevelCompleted {
            level: index,
            stars,
            final_level: self.final_mode,
        });
    }

    /// Completion panel "Continue": arm the pending level and wait for a tap
    pub fn on_level_complete_continue(&mut self) -> FlowResult<()> {
        self.require_state("on_level_complete_continue", FlowState::LevelComplete)?;
        if self.final_mode {
            log::debug!("Continue pressed on the final completion panel");
            return Err(FlowError::InvalidState {
                operation: "on_level_complete_continue",
                state: self.state,
            });
        }
        self.emit(GameEvent::PanelHidden(Panel::LevelComplete));
        if let Some(next) = self.pending_level.take() {
            let batch = self.ledger.set_last_reached(next);
            self.persist(batch);
        }
        self.enter(FlowState::Idle);
        Ok(())
    }

    /// Completion panel "Restart" after the last level: wipe everything
    pub fn on_level_complete_restart(&mut self) -> FlowResult<()> {
        self.require_state("on_level_complete_restart", FlowState::LevelComplete)?;
        if !self.final_mode {
            log::debug!("Restart pressed on a non-final completion panel");
            return Err(FlowError::InvalidState {
                operation: "on_level_complete_restart",
                state: self.state,
            });
        }
        self.emit(GameEvent::PanelHidden(Panel::LevelComplete));
        self.wipe_progress();
        Ok(())
    }

    /// The single completion-panel button: restart when final, else continue
    pub fn press_level_complete_button(&mut self) -> FlowResult<()> {
        if self.final_mode {
            self.on_level_complete_restart()
        } else {
            self.on_level_complete_continue()
        }
    }

    /// Wipe all progression from any state
    pub fn reset_all_progress(&mut self) {
        match self.state {
            FlowState::LevelComplete => self.emit(GameEvent::PanelHidden(Panel::LevelComplete)),
            FlowState::Failed => self.emit(GameEvent::PanelHidden(Panel::Failed)),
            FlowState::UpgradePause => self.emit(GameEvent::PanelHidden(Panel::Upgrade)),
            FlowState::Idle | FlowState::Playing => {}
        }
        self.wipe_progress();
        log::info!("Progress reset.");
    }

    fn wipe_progress(&mut self) {
        self.enter(FlowState::Idle);
        let count = self.stage.level_count();
        let batch = self.ledger.wipe(count);
        self.persist(batch);

        for index in 0..count {
            self.stage.reset_root_position(index);
            self.stage.reset_level(index, &mut self.timers);
        }
        self.stage.deactivate_all_levels();

        self.player.load_upgrade_state(UpgradeCounters::default());
        self.player.reset_player();
        if let Some(start) = self.config.player_start {
            self.player.teleport(start);
        }

        let now = self.clock.scaled().now;
        self.projectiles.release_all(now);
        self.effects.release_all(now);
        self.timers
            .cancel_matching(|owner| owner != TimerOwner::Celebration);
        self.music.restore_volume(MUSIC_FADE_DURATION);

        self.current_level = None;
        self.pending_level = None;
        self.final_mode = false;
        self.initial_distance = None;
        self.progress = 0.0;

        self.emit_health();
        self.emit_xp();
        self.emit(GameEvent::ProgressReset);
    }

    /// Editor-style override: forget progress and jump into `level`
    pub(crate) fn apply_debug_start(&mut self, level: usize) -> FlowResult<()> {
        let count = self.require_levels()?;
        let level = level.min(count - 1);

        let mut batch = self.ledger.clear_level_progress(count);
        batch.append(self.ledger.reset_upgrades_and_xp());
        batch.append(self.ledger.set_last_reached(level));
        self.persist(batch);

        self.player.load_upgrade_state(UpgradeCounters::default());
        self.clear_projectiles();
        log::info!("Debug start: jumping to Level {}", level + 1);
        self.start_level(level)
    }

    /// Player health reached zero
    pub fn on_player_die(&mut self) -> FlowResult<()> {
        self.require_state("on_player_die", FlowState::Playing)?;
        self.emit(GameEvent::Sound(SoundEffect::LevelFailed));

        if let Some(current) = self.current_level {
            let batch = self.ledger.set_last_reached(current);
            self.persist(batch);
            log::info!(
                "Player died in Level {}. They will resume from this level next time.",
                current + 1
            );
        }

        self.timers.cancel_owner(TimerOwner::Player);
        self.enter(FlowState::Failed);
        self.emit(GameEvent::HealthChanged {
            health: 0,
            max: self.player.max_health(),
        });
        self.emit(GameEvent::PanelShown(Panel::Failed));
        self.emit(GameEvent::LevelFailed {
            level: self.current_level,
        });
        Ok(())
    }

    /// Failed panel "Retry": restart the same level
    pub fn on_failed_retry(&mut self) -> FlowResult<()> {
        self.require_state("on_failed_retry", FlowState::Failed)?;
        let count = self.require_levels()?;
        self.emit(GameEvent::PanelHidden(Panel::Failed));
        self.clear_projectiles();

        let target = match self.current_level {
            Some(current) if current < count => current,
            _ => self
                .ledger
                .first_unpassed(self.ledger.last_reached(), count)
                .unwrap_or(0),
        };
        self.start_level(target)
    }

    /// Apply damage to the player and react to the outcome
    pub fn damage_player(&mut self, amount: u32) -> DamageOutcome {
        let outcome = self.player.take_damage(amount);
        match outcome {
            DamageOutcome::Ignored => {}
            DamageOutcome::Hurt { .. } => {
                self.emit(GameEvent::Sound(SoundEffect::PlayerHit));
                self.emit_health();
                let tuning = self.player.tuning();
                let (duration, blink) = (tuning.invincible_duration, tuning.blink_interval);
                self.schedule(TimerOwner::Player, TimerKind::Invincibility, duration);
                self.schedule(TimerOwner::Player, TimerKind::Blink, blink);
                self.player.toggle_blink();
            }
            DamageOutcome::Died => {
                self.emit(GameEvent::Sound(SoundEffect::PlayerHit));
                // Only rejected outside Playing, where there is nothing to fail
                let _ = self.on_player_die();
            }
        }
        outcome
    }

    /// Add xp; enters `UpgradePause` when the threshold is reached in play
    ///
    /// Returns true when this call opened the upgrade panel.
    pub fn add_xp(&mut self, amount: u32) -> bool {
        let (batch, reached) = self.ledger.add_xp(amount);
        self.persist(batch);
        self.emit_xp();
        if reached && self.state == FlowState::Playing {
            self.enter_upgrade_pause();
            return true;
        }
        false
    }

    /// Current state of the four upgrade buttons
    pub fn upgrade_options(&self) -> Vec<UpgradeOption> {
        UpgradeKind::ALL
            .iter()
            .map(|&kind| UpgradeOption {
                kind,
                label: kind.label(),
                count: self.player.upgrade_count(kind),
                maxed: self.player.is_maxed(kind),
            })
            .collect()
    }

    fn enter_upgrade_pause(&mut self) {
        log::info!(
            "XP threshold reached ({}/{}), pausing for upgrade",
            self.ledger.xp(),
            self.ledger.xp_threshold()
        );
        self.music
            .fade_to_multiplier(UPGRADE_MUSIC_MULTIPLIER, MUSIC_FADE_DURATION);
        self.enter(FlowState::UpgradePause);
        self.emit(GameEvent::PanelShown(Panel::Upgrade));
        let options = self.upgrade_options();
        self.emit(GameEvent::UpgradeOffered { options });
    }

    /// Upgrade panel button `index` (0 fire rate, 1 count, 2 damage, 3 penetration)
    pub fn on_upgrade_picked(&mut self, index: usize) -> FlowResult<UpgradeOutcome> {
        self.require_state("on_upgrade_picked", FlowState::UpgradePause)?;
        let Some(kind) = UpgradeKind::from_index(index) else {
            log::warn!("Unknown upgrade index: {}", index);
            return Err(FlowError::UnknownUpgrade(index));
        };

        if !self.player.try_apply_upgrade(kind) {
            log::debug!("{:?} upgrade maxed.", kind);
            self.emit(GameEvent::UpgradeMaxed { kind });
            return Ok(UpgradeOutcome::Maxed(kind));
        }

        self.emit(GameEvent::Sound(SoundEffect::Upgrade));
        let batch = self.ledger.commit_upgrade(self.player.upgrades());
        self.persist(batch);

        self.emit(GameEvent::PanelHidden(Panel::Upgrade));
        self.music.restore_volume(MUSIC_FADE_DURATION);
        self.enter(FlowState::Playing);

        let xp_threshold = self.ledger.xp_threshold();
        log::info!("Upgrade applied. New xpThreshold: {}", xp_threshold);
        self.emit(GameEvent::UpgradeApplied { kind, xp_threshold });
        self.emit_xp();
        Ok(UpgradeOutcome::Applied(kind))
    }

    /// Obstacle death continuation: award xp, play the effect, remove it
    pub(crate) fn finish_obstacle_death(&mut self, node: NodeId) {
        let Some(reward) = self.stage.obstacles.get(&node).map(|o| o.spec.xp_reward) else {
            return;
        };
        if !self.stage.graph.is_active_in_hierarchy(node) {
            return;
        }
        let position = self.stage.graph.world_position(node);
        self.add_xp(reward);
        self.play_effect(position);
        self.stage.graph.set_active(node, false);
    }
}
