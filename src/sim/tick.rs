//! Per-frame session update
//!
//! Advances clocks, fires due continuations, then runs the state-specific
//! work for the frame. Given the same seed, config, store contents and input
//! sequence, the event stream is identical run to run.

use glam::Vec3;

use super::collision::{Contact, detect_contacts};
use super::obstacle::HitOutcome;
use super::player::DamageOutcome;
use super::pool::SlotId;
use super::projectile::ProjectileHit;
use super::scene::NodeId;
use super::state::{FlowState, GameEvent, GameSession};
use super::timers::{TimerKey, TimerKind, TimerOwner};
use crate::audio::SoundEffect;
use crate::clamp01;

/// Input for a single frame
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Tap/click this frame (starts play from `Idle`)
    pub tap: bool,
    /// Pointer x in world units while held; `None` when released
    pub pointer_x: Option<f32>,
    /// Contacts from an external physics layer; replaces built-in detection
    pub external_contacts: Option<Vec<Contact>>,
}

/// Advance the session by one frame of `dt` real seconds
pub fn tick(session: &mut GameSession, input: &TickInput, dt: f32) {
    session.clock.advance(dt);
    let unscaled_dt = session.clock.unscaled().delta;
    session.music.update(unscaled_dt);

    for key in session.timers.take_due(&session.clock) {
        dispatch_timer(session, key);
    }

    match session.state {
        FlowState::Idle => {
            if input.tap {
                // Errors are logged where they are raised
                let _ = session.begin_from_input();
            }
        }
        FlowState::Playing => play_frame(session, input),
        FlowState::LevelComplete | FlowState::Failed | FlowState::UpgradePause => {}
    }
}

fn play_frame(session: &mut GameSession, input: &TickInput) {
    let Some(level) = session.current_level else {
        log::warn!("Playing without a current level");
        return;
    };
    let dt = session.clock.scaled().delta;

    // Level scrolls toward the player
    let root = session.stage.levels[level].root;
    let scroll = Vec3::NEG_Y * session.config.scroll_speed * dt;
    session.stage.graph.translate_world(root, scroll);
    session.stage.update_movers(level, dt);

    session.player.set_pointer(input.pointer_x);
    session.player.update_movement(dt);

    fire_volley(session);

    let speed = session.config.projectile.speed;
    for slot in session.projectiles.active_slots() {
        if let Some(projectile) = session.projectiles.get_mut(slot) {
            projectile.advance(speed, dt);
        }
    }
    for obstacle in session.stage.obstacles.values_mut() {
        obstacle.jitter(&mut session.rng);
    }

    let contacts = match &input.external_contacts {
        Some(contacts) => contacts.clone(),
        None => detect_contacts(
            &session.stage,
            level,
            &session.player,
            &session.projectiles,
            session.config.projectile.radius,
        ),
    };
    for contact in contacts {
        if session.state != FlowState::Playing {
            break;
        }
        handle_contact(session, contact);
    }

    if session.state == FlowState::Playing {
        update_progress(session, level);
    }
}

fn fire_volley(session: &mut GameSession) {
    let now = session.clock.scaled().now;
    let Some(spawns) = session.player.fire(now) else {
        return;
    };
    let economy = session.player.economy();
    let lifetime = session.config.projectile.lifetime;

    for position in spawns {
        let Some(slot) = session.get_pooled_projectile() else {
            log::warn!("No projectile available");
            break;
        };
        if let Some(projectile) = session.projectiles.get_mut(slot) {
            projectile.launch(position, economy.damage, economy.penetration);
        }
        session.timers.cancel(TimerKey::new(
            TimerOwner::Projectile(slot),
            TimerKind::TrailFade,
        ));
        session.schedule(TimerOwner::Projectile(slot), TimerKind::Lifetime, lifetime);
    }
    session.emit(GameEvent::Sound(SoundEffect::Shoot));
}

fn handle_contact(session: &mut GameSession, contact: Contact) {
    match contact {
        Contact::ProjectileObstacle {
            projectile,
            obstacle,
        } => projectile_hit(session, projectile, obstacle),
        Contact::PlayerObstacle { obstacle } => player_hit(session, obstacle),
        Contact::LevelEnd { level } => {
            let _ = session.on_level_passed(level);
        }
    }
}

fn projectile_hit(session: &mut GameSession, slot: SlotId, node: NodeId) {
    let Some(damage) = session
        .projectiles
        .get(slot)
        .filter(|p| p.is_active() && !p.is_deactivating())
        .map(|p| p.damage())
    else {
        return;
    };
    if !session.stage.graph.is_active_in_hierarchy(node) {
        return;
    }

    if let Some(obstacle) = session.stage.obstacles.get_mut(&node) {
        let (flash, shake) = (obstacle.spec.hit_flash_duration, obstacle.spec.shake_duration);
        let outcome = obstacle.take_damage(damage);
        if outcome != HitOutcome::Ignored {
            session.emit(GameEvent::Sound(SoundEffect::ProjectileHit));
            session.schedule(TimerOwner::Node(node), TimerKind::HitFlash, flash);
            // A running shake is not restarted
            let shake_key = TimerKey::new(TimerOwner::Node(node), TimerKind::Shake);
            if !session.timers.is_pending(shake_key) {
                session.schedule(TimerOwner::Node(node), TimerKind::Shake, shake);
            }
        }
        if outcome == HitOutcome::Killed {
            session.schedule(TimerOwner::Node(node), TimerKind::Die, 0.0);
        }
    }

    let hit = session
        .projectiles
        .get_mut(slot)
        .map_or(ProjectileHit::Ignored, |p| p.register_hit());
    if hit == ProjectileHit::Spent {
        let fade = session.config.projectile.trail_fade;
        session.schedule(TimerOwner::Projectile(slot), TimerKind::TrailFade, fade);
    }
}

fn player_hit(session: &mut GameSession, node: NodeId) {
    if !session.stage.graph.is_active_in_hierarchy(node) {
        return;
    }
    // The obstacle is consumed even when the hit is absorbed
    session.stage.graph.set_active(node, false);
    session.timers.cancel_owner(TimerOwner::Node(node));
    if session.damage_player(1) == DamageOutcome::Ignored {
        log::debug!("Player invincible; contact absorbed");
    }
}

fn update_progress(session: &mut GameSession, level: usize) {
    let (Some(initial), Some(marker_y)) =
        (session.initial_distance, session.stage.end_marker_y(level))
    else {
        return;
    };
    let current = (marker_y - session.player.position.y).max(0.0);
    session.progress = clamp01(1.0 - current / initial);
}

fn dispatch_timer(session: &mut GameSession, key: TimerKey) {
    match (key.owner, key.kind) {
        (TimerOwner::Node(node), TimerKind::HitFlash) => {
            if let Some(obstacle) = session.stage.obstacles.get_mut(&node) {
                obstacle.end_flash();
            }
        }
        (TimerOwner::Node(node), TimerKind::Shake) => {
            if let Some(obstacle) = session.stage.obstacles.get_mut(&node) {
                obstacle.end_shake();
            }
        }
        (TimerOwner::Node(node), TimerKind::Die) => session.finish_obstacle_death(node),
        (TimerOwner::Projectile(slot), TimerKind::Lifetime) => {
            let started = session
                .projectiles
                .get_mut(slot)
                .is_some_and(|p| p.begin_deactivate());
            if started {
                let fade = session.config.projectile.trail_fade;
                session.schedule(TimerOwner::Projectile(slot), TimerKind::TrailFade, fade);
            }
        }
        (TimerOwner::Projectile(slot), TimerKind::TrailFade) => {
            let now = session.clock.scaled().now;
            if let Some(projectile) = session.projectiles.get_mut(slot) {
                projectile.finish_deactivate(now);
            }
            session
                .timers
                .cancel(TimerKey::new(TimerOwner::Projectile(slot), TimerKind::Lifetime));
        }
        (TimerOwner::Effect(slot), TimerKind::EffectExpire) => {
            if let Some(effect) = session.effects.get_mut(slot) {
                effect.stop();
            }
        }
        (TimerOwner::Player, TimerKind::Invincibility) => {
            session.player.end_invincibility();
            session
                .timers
                .cancel(TimerKey::new(TimerOwner::Player, TimerKind::Blink));
        }
        (TimerOwner::Player, TimerKind::Blink) => {
            if session.player.is_invincible() {
                session.player.toggle_blink();
                let interval = session.player.tuning().blink_interval;
                session.schedule(TimerOwner::Player, TimerKind::Blink, interval);
            }
        }
        (TimerOwner::Celebration, TimerKind::Confetti) => {
            session.confetti_active = false;
            session.emit(GameEvent::ConfettiFinished);
        }
        (owner, kind) => log::debug!("Unhandled continuation {:?}/{:?}", owner, kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::persistence::{MemoryStore, PrefsStore};
    use crate::sim::ledger::keys;
    use crate::sim::obstacle::ObstacleSpec;
    use crate::sim::scene::Transform;
    use crate::tuning::{LevelBlueprint, NodeBlueprint, SessionConfig, demo_levels};

    fn session(levels: usize) -> GameSession {
        GameSession::new(
            SessionConfig::default(),
            &demo_levels(levels),
            Box::new(MemoryStore::new()),
        )
    }

    fn tap() -> TickInput {
        TickInput {
            tap: true,
            ..Default::default()
        }
    }

    /// One obstacle straight above the player, end marker far away
    fn target_level(health: u32) -> LevelBlueprint {
        LevelBlueprint {
            name: "target".into(),
            root: Transform::IDENTITY,
            nodes: vec![
                NodeBlueprint::new("rock", Transform::from_xyz(0.0, -2.0, 0.0)).with_obstacle(
                    ObstacleSpec {
                        health,
                        ..ObstacleSpec::default()
                    },
                ),
                NodeBlueprint::end_marker("end", 200.0),
            ],
        }
    }

    /// No obstacles, only an end marker `end_y` above the anchor
    fn clear_level(end_y: f32) -> GameSession {
        let blueprint = LevelBlueprint {
            name: "clear".into(),
            root: Transform::IDENTITY,
            nodes: vec![NodeBlueprint::end_marker("end", end_y)],
        };
        GameSession::new(SessionConfig::default(), &[blueprint], Box::new(MemoryStore::new()))
    }

    fn rock(session: &GameSession) -> NodeId {
        *session.stage().obstacles.keys().next().unwrap()
    }

    fn hit(slot: usize, node: NodeId) -> TickInput {
        TickInput {
            external_contacts: Some(vec![Contact::ProjectileObstacle {
                projectile: SlotId(slot),
                obstacle: node,
            }]),
            ..Default::default()
        }
    }

    fn launch(session: &mut GameSession) -> SlotId {
        let slot = session.get_pooled_projectile().unwrap();
        session
            .projectiles
            .get_mut(slot)
            .unwrap()
            .launch(Vec3::ZERO, 1, 1);
        slot
    }

    #[test]
    fn test_tap_starts_play() {
        let mut s = session(2);
        tick(&mut s, &TickInput::default(), SIM_DT);
        assert_eq!(s.state(), FlowState::Idle);

        tick(&mut s, &tap(), SIM_DT);
        assert_eq!(s.state(), FlowState::Playing);
        assert_eq!(s.current_level(), Some(0));
    }

    #[test]
    fn test_scaled_time_frozen_while_idle() {
        let mut s = session(1);
        for _ in 0..10 {
            tick(&mut s, &TickInput::default(), SIM_DT);
        }
        assert_eq!(s.clock().scaled().now, 0.0);
        assert!(s.clock().unscaled().now > 0.0);
    }

    #[test]
    fn test_level_scrolls_while_playing() {
        let mut s = session(1);
        tick(&mut s, &tap(), SIM_DT);
        let root = s.stage().levels[0].root;
        let before = s.stage().graph.world_position(root).y;
        tick(&mut s, &TickInput::default(), SIM_DT);
        let after = s.stage().graph.world_position(root).y;
        assert!(after < before);
    }

    #[test]
    fn test_holding_pointer_fires_volleys() {
        let mut s = session(1);
        tick(&mut s, &tap(), SIM_DT);
        s.drain_events();
        let hold = TickInput {
            pointer_x: Some(0.0),
            ..Default::default()
        };
        tick(&mut s, &hold, SIM_DT);
        assert_eq!(s.projectiles().active_count(), 1);
        assert!(s.drain_events().contains(&GameEvent::Sound(SoundEffect::Shoot)));

        // Next shot waits for the fire interval
        tick(&mut s, &hold, SIM_DT);
        assert_eq!(s.projectiles().active_count(), 1);
    }

    #[test]
    fn test_projectile_lifetime_then_trail_fade() {
        let mut s = clear_level(200.0);
        tick(&mut s, &tap(), SIM_DT);
        let hold = TickInput {
            pointer_x: Some(0.0),
            ..Default::default()
        };
        tick(&mut s, &hold, SIM_DT);
        let slot = s.projectiles().active_slots()[0];

        // Lifetime 3 s, then 0.2 s trail fade
        let frames = (3.1 / SIM_DT) as usize;
        for _ in 0..frames {
            tick(&mut s, &TickInput::default(), SIM_DT);
        }
        let p = s.projectiles().get(slot).unwrap();
        assert!(p.is_active());
        assert!(p.is_deactivating());

        for _ in 0..30 {
            tick(&mut s, &TickInput::default(), SIM_DT);
        }
        let p = s.projectiles().get(slot).unwrap();
        assert!(!p.is_active());
        assert_eq!(p.position, Vec3::ZERO);
        assert!(p.last_deactivate_time() > 3.0);
    }

    #[test]
    fn test_obstacle_dies_one_tick_after_kill() {
        let mut s = GameSession::new(
            SessionConfig::default(),
            &[target_level(1)],
            Box::new(MemoryStore::new()),
        );
        tick(&mut s, &tap(), SIM_DT);
        let node = rock(&s);
        let slot = launch(&mut s);

        tick(&mut s, &hit(slot.0, node), SIM_DT);
        assert_eq!(s.stage().obstacles[&node].health(), 0);
        assert!(s.stage().graph.is_active_self(node));
        assert_eq!(s.ledger().xp(), 0);

        tick(&mut s, &TickInput::default(), SIM_DT);
        assert!(!s.stage().graph.is_active_self(node));
        assert_eq!(s.ledger().xp(), 10);
        assert_eq!(s.effects().active_count(), 1);
        assert_eq!(s.store().get_int(keys::XP), Some(10));
    }

    #[test]
    fn test_penetration_spent_projectile_ignores_further_hits() {
        let mut s = GameSession::new(
            SessionConfig::default(),
            &[target_level(5)],
            Box::new(MemoryStore::new()),
        );
        tick(&mut s, &tap(), SIM_DT);
        let node = rock(&s);
        let slot = launch(&mut s);

        tick(&mut s, &hit(slot.0, node), SIM_DT);
        assert_eq!(s.stage().obstacles[&node].health(), 4);
        assert!(s.projectiles().get(slot).unwrap().is_deactivating());

        tick(&mut s, &hit(slot.0, node), SIM_DT);
        assert_eq!(s.stage().obstacles[&node].health(), 4);
    }

    #[test]
    fn test_hit_flash_and_shake_expire() {
        let mut s = GameSession::new(
            SessionConfig::default(),
            &[target_level(5)],
            Box::new(MemoryStore::new()),
        );
        tick(&mut s, &tap(), SIM_DT);
        let node = rock(&s);
        let slot = launch(&mut s);
        tick(&mut s, &hit(slot.0, node), SIM_DT);
        assert!(s.stage().obstacles[&node].is_flashing());
        assert!(s.stage().obstacles[&node].is_shaking());

        for _ in 0..20 {
            tick(&mut s, &TickInput::default(), SIM_DT);
        }
        let obstacle = &s.stage().obstacles[&node];
        assert!(!obstacle.is_flashing());
        assert!(!obstacle.is_shaking());
        assert_eq!(obstacle.shake_offset(), Vec3::ZERO);
    }

    #[test]
    fn test_player_contact_consumes_obstacle() {
        let mut s = GameSession::new(
            SessionConfig::default(),
            &[target_level(3)],
            Box::new(MemoryStore::new()),
        );
        tick(&mut s, &tap(), SIM_DT);
        let node = rock(&s);
        let touch = TickInput {
            external_contacts: Some(vec![Contact::PlayerObstacle { obstacle: node }]),
            ..Default::default()
        };
        tick(&mut s, &touch, SIM_DT);
        assert_eq!(s.player().health(), 2);
        assert!(s.player().is_invincible());
        assert!(!s.stage().graph.is_active_self(node));
    }

    #[test]
    fn test_invincibility_expires() {
        let mut s = clear_level(200.0);
        tick(&mut s, &tap(), SIM_DT);
        s.damage_player(1);
        assert!(s.player().is_invincible());
        assert_eq!(s.damage_player(1), DamageOutcome::Ignored);

        let frames = (3.1 / SIM_DT) as usize;
        for _ in 0..frames {
            tick(&mut s, &TickInput::default(), SIM_DT);
        }
        assert!(!s.player().is_invincible());
        assert!(s.player().is_visible());
        assert_eq!(s.player().health(), 2);
    }

    #[test]
    fn test_level_end_contact_on_clear_level() {
        let mut s = clear_level(2.0);
        tick(&mut s, &tap(), SIM_DT);
        let mut frames = 0;
        while s.state() == FlowState::Playing && frames < 1000 {
            tick(&mut s, &TickInput::default(), SIM_DT);
            frames += 1;
        }
        assert_eq!(s.state(), FlowState::LevelComplete);
        assert!(s.is_final_mode());
        assert!(s.is_confetti_active());

        // Confetti runs on unscaled time while the panel pauses gameplay
        for _ in 0..(5.1 / SIM_DT) as usize {
            tick(&mut s, &TickInput::default(), SIM_DT);
        }
        assert!(!s.is_confetti_active());
        assert!(s.drain_events().contains(&GameEvent::ConfettiFinished));
    }

    #[test]
    fn test_progress_is_monotonic_and_bounded() {
        let mut s = clear_level(6.0);
        tick(&mut s, &tap(), SIM_DT);
        let mut last = s.progress();
        while s.state() == FlowState::Playing {
            tick(&mut s, &TickInput::default(), SIM_DT);
            assert!(s.progress() >= last);
            assert!((0.0..=1.0).contains(&s.progress()));
            last = s.progress();
        }
    }

    #[test]
    fn test_same_inputs_same_events() {
        let run = || {
            let mut s = session(2);
            let mut events = Vec::new();
            for frame in 0..600 {
                let input = TickInput {
                    tap: frame == 0,
                    pointer_x: Some(((frame as f32) * 0.05).sin() * 2.0),
                    external_contacts: None,
                };
                tick(&mut s, &input, SIM_DT);
                events.extend(s.drain_events());
            }
            let offsets: Vec<Vec3> = s
                .stage()
                .obstacles
                .values()
                .map(|o| o.shake_offset())
                .collect();
            (events, offsets, s.state())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_upgrade_pause_freezes_projectiles() {
        let mut s = session(1);
        tick(&mut s, &tap(), SIM_DT);
        let slot = launch(&mut s);
        s.add_xp(100);
        assert_eq!(s.state(), FlowState::UpgradePause);

        let y = s.projectiles().get(slot).unwrap().position.y;
        for _ in 0..40 {
            tick(&mut s, &TickInput::default(), SIM_DT);
        }
        assert_eq!(s.projectiles().get(slot).unwrap().position.y, y);
        // Music fade keeps running on unscaled time
        assert!(!s.music().is_fading());
    }
}
