//! Keyed delayed continuations
//!
//! Each continuation is identified by (owner, kind). Scheduling a key that is
//! already pending replaces it, so an actor never has two in-flight
//! continuations of the same kind. Due keys are handed back to the session,
//! which decides what they mean.

use std::collections::BTreeMap;

use super::clock::{ClockDomain, SimulationClock};
use super::pool::SlotId;
use super::scene::NodeId;

/// Who a continuation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerOwner {
    Node(NodeId),
    Projectile(SlotId),
    Effect(SlotId),
    Player,
    Celebration,
}

/// What happens when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    /// Obstacle hit color returns to normal
    HitFlash,
    /// Obstacle shake ends
    Shake,
    /// Obstacle death sequence completes
    Die,
    /// Projectile lifetime ran out
    Lifetime,
    /// Projectile trail finished fading; deactivate
    TrailFade,
    /// Pooled effect finished playing
    EffectExpire,
    /// Player invincibility window ends
    Invincibility,
    /// Player sprite visibility toggles
    Blink,
    /// Final-level confetti finished
    Confetti,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerKey {
    pub owner: TimerOwner,
    pub kind: TimerKind,
}

impl TimerKey {
    pub fn new(owner: TimerOwner, kind: TimerKind) -> Self {
        Self { owner, kind }
    }
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    fire_at: f32,
    domain: ClockDomain,
    seq: u64,
}

#[derive(Debug, Clone, Default)]
pub struct TimerWheel {
    pending: BTreeMap<TimerKey, Scheduled>,
    next_seq: u64,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` to fire `delay` seconds from now on `domain`
    ///
    /// Replaces any pending continuation with the same key.
    pub fn schedule(
        &mut self,
        key: TimerKey,
        delay: f32,
        domain: ClockDomain,
        clock: &SimulationClock,
    ) {
        let fire_at = clock.sample(domain).now + delay.max(0.0);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(
            key,
            Scheduled {
                fire_at,
                domain,
                seq,
            },
        );
    }

    pub fn cancel(&mut self, key: TimerKey) -> bool {
        self.pending.remove(&key).is_some()
    }

    /// Drop every continuation belonging to `owner`
    pub fn cancel_owner(&mut self, owner: TimerOwner) {
        self.pending.retain(|key, _| key.owner != owner);
    }

    /// Drop every continuation whose owner matches `predicate`
    pub fn cancel_matching(&mut self, predicate: impl Fn(TimerOwner) -> bool) {
        self.pending.retain(|key, _| !predicate(key.owner));
    }

    pub fn is_pending(&self, key: TimerKey) -> bool {
        self.pending.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return every due continuation, earliest first
    ///
    /// A continuation is due once its own clock domain has reached its fire
    /// time; scaled ones therefore never fire while paused.
    pub fn take_due(&mut self, clock: &SimulationClock) -> Vec<TimerKey> {
        let mut due: Vec<(f32, u64, TimerKey)> = self
            .pending
            .iter()
            .filter(|(_, s)| clock.sample(s.domain).now >= s.fire_at)
            .map(|(key, s)| (s.fire_at, s.seq, *key))
            .collect();
        due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        for (_, _, key) in &due {
            self.pending.remove(key);
        }
        due.into_iter().map(|(_, _, key)| key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_clock() -> SimulationClock {
        let mut clock = SimulationClock::new();
        clock.set_paused(false);
        clock
    }

    #[test]
    fn test_reschedule_replaces_previous() {
        let mut clock = running_clock();
        let mut wheel = TimerWheel::new();
        let key = TimerKey::new(TimerOwner::Player, TimerKind::Blink);

        wheel.schedule(key, 0.1, ClockDomain::Scaled, &clock);
        wheel.schedule(key, 1.0, ClockDomain::Scaled, &clock);
        assert_eq!(wheel.len(), 1);

        clock.advance(0.5);
        assert!(wheel.take_due(&clock).is_empty());
        clock.advance(0.6);
        assert_eq!(wheel.take_due(&clock), vec![key]);
        assert!(wheel.is_empty());
    }

    #[test]
    fn test_scaled_timers_freeze_while_paused() {
        let mut clock = running_clock();
        let mut wheel = TimerWheel::new();
        let scaled = TimerKey::new(TimerOwner::Node(NodeId(1)), TimerKind::HitFlash);
        let unscaled = TimerKey::new(TimerOwner::Celebration, TimerKind::Confetti);

        wheel.schedule(scaled, 0.2, ClockDomain::Scaled, &clock);
        wheel.schedule(unscaled, 0.2, ClockDomain::Unscaled, &clock);

        clock.set_paused(true);
        clock.advance(1.0);
        assert_eq!(wheel.take_due(&clock), vec![unscaled]);
        assert!(wheel.is_pending(scaled));
    }

    #[test]
    fn test_due_order_is_by_fire_time() {
        let mut clock = running_clock();
        let mut wheel = TimerWheel::new();
        let late = TimerKey::new(TimerOwner::Player, TimerKind::Invincibility);
        let early = TimerKey::new(TimerOwner::Node(NodeId(3)), TimerKind::Die);

        wheel.schedule(late, 0.3, ClockDomain::Scaled, &clock);
        wheel.schedule(early, 0.1, ClockDomain::Scaled, &clock);
        clock.advance(1.0);
        assert_eq!(wheel.take_due(&clock), vec![early, late]);
    }

    #[test]
    fn test_cancel_owner() {
        let clock = running_clock();
        let mut wheel = TimerWheel::new();
        let node = TimerOwner::Node(NodeId(7));
        wheel.schedule(TimerKey::new(node, TimerKind::HitFlash), 1.0, ClockDomain::Scaled, &clock);
        wheel.schedule(TimerKey::new(node, TimerKind::Shake), 1.0, ClockDomain::Scaled, &clock);
        wheel.schedule(
            TimerKey::new(TimerOwner::Player, TimerKind::Blink),
            1.0,
            ClockDomain::Scaled,
            &clock,
        );

        wheel.cancel_owner(node);
        assert_eq!(wheel.len(), 1);

        wheel.cancel_matching(|owner| owner == TimerOwner::Player);
        assert!(wheel.is_empty());
    }
}
