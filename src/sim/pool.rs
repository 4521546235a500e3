//! Generic actor pool
//!
//! A fixed set of pre-built actors is cycled instead of allocating per shot.
//! Availability is never stored: a slot is free exactly when its actor says
//! it is not in use. When every slot is busy the pool grows by one clone of
//! its prototype.

/// Handle to a pool slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub usize);

/// An actor that can live in a pool
pub trait PooledActor {
    /// Derived from the actor's own activation state
    fn is_in_use(&self) -> bool;

    /// Force the actor back to its inactive state
    fn release(&mut self, now: f32);
}

/// How `acquire` looks for a free slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPolicy {
    /// Start after the last returned slot
    RoundRobin,
    /// Always start from slot 0
    Linear,
}

#[derive(Debug, Clone)]
pub struct ActorPool<A> {
    name: &'static str,
    prototype: A,
    slots: Vec<A>,
    cursor: usize,
    policy: ScanPolicy,
}

impl<A: PooledActor + Clone> ActorPool<A> {
    /// Pre-build `capacity` copies of `prototype`, all inactive
    pub fn new(name: &'static str, prototype: A, capacity: usize, policy: ScanPolicy) -> Self {
        let slots = vec![prototype.clone(); capacity];
        Self {
            name,
            prototype,
            slots,
            cursor: 0,
            policy,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn policy(&self) -> ScanPolicy {
        self.policy
    }

    pub fn get(&self, slot: SlotId) -> Option<&A> {
        self.slots.get(slot.0)
    }

    pub fn get_mut(&mut self, slot: SlotId) -> Option<&mut A> {
        self.slots.get_mut(slot.0)
    }

    pub fn is_available(&self, slot: SlotId) -> bool {
        self.slots.get(slot.0).is_some_and(|a| !a.is_in_use())
    }

    /// Find an inactive actor, growing the pool if none is free
    ///
    /// Returns `None` only for a pool built with zero capacity. The returned
    /// actor is still inactive; the caller activates it.
    pub fn acquire(&mut self) -> Option<SlotId> {
        let n = self.slots.len();
        if n == 0 {
            return None;
        }

        let start = match self.policy {
            ScanPolicy::RoundRobin => self.cursor % n,
            ScanPolicy::Linear => 0,
        };
        for step in 0..n {
            let index = (start + step) % n;
            if !self.slots[index].is_in_use() {
                if self.policy == ScanPolicy::RoundRobin {
                    self.cursor = (index + 1) % n;
                }
                return Some(SlotId(index));
            }
        }

        log::warn!(
            "{} pool exhausted at {} actors, expanding",
            self.name,
            n
        );
        self.slots.push(self.prototype.clone());
        Some(SlotId(n))
    }

    /// Deactivate every actor that is currently in use
    pub fn release_all(&mut self, now: f32) {
        for actor in self.slots.iter_mut().filter(|a| a.is_in_use()) {
            actor.release(now);
        }
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|a| a.is_in_use()).count()
    }

    /// Slots whose actors are in use, in slot order
    pub fn active_slots(&self) -> Vec<SlotId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_in_use())
            .map(|(i, _)| SlotId(i))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &A)> {
        self.slots.iter().enumerate().map(|(i, a)| (SlotId(i), a))
    }
}
