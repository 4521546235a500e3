//! Scaled and unscaled simulation time
//!
//! Gameplay runs on the scaled clock, which stalls while paused. Fades and
//! celebrations that must keep running during pause read the unscaled clock.

/// One clock domain's current reading
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClockSample {
    /// Seconds since the session started
    pub now: f32,
    /// Seconds advanced by the last frame
    pub delta: f32,
}

/// Which clock a continuation is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClockDomain {
    Scaled,
    Unscaled,
}

#[derive(Debug, Clone, Default)]
pub struct SimulationClock {
    paused: bool,
    scaled: ClockSample,
    unscaled: ClockSample,
    frame: u64,
}

impl SimulationClock {
    /// Clocks start paused: nothing advances until the first input
    pub fn new() -> Self {
        Self {
            paused: true,
            ..Self::default()
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Only the flow controller changes pause state
    pub(in crate::sim) fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Advance both domains by one frame of real time
    pub fn advance(&mut self, real_dt: f32) {
        let dt = real_dt.max(0.0);
        self.frame += 1;
        self.unscaled.delta = dt;
        self.unscaled.now += dt;
        self.scaled.delta = if self.paused { 0.0 } else { dt };
        self.scaled.now += self.scaled.delta;
    }

    pub fn scaled(&self) -> ClockSample {
        self.scaled
    }

    pub fn unscaled(&self) -> ClockSample {
        self.unscaled
    }

    pub fn sample(&self, domain: ClockDomain) -> ClockSample {
        match domain {
            ClockDomain::Scaled => self.scaled,
            ClockDomain::Unscaled => self.unscaled,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paused_clock_only_advances_unscaled() {
        let mut clock = SimulationClock::new();
        clock.advance(0.5);
        assert_eq!(clock.scaled().now, 0.0);
        assert_eq!(clock.scaled().delta, 0.0);
        assert_eq!(clock.unscaled().now, 0.5);

        clock.set_paused(false);
        clock.advance(0.25);
        assert_eq!(clock.scaled().now, 0.25);
        assert_eq!(clock.unscaled().now, 0.75);
        assert_eq!(clock.frame(), 2);
    }

    #[test]
    fn test_negative_frame_time_is_ignored() {
        let mut clock = SimulationClock::new();
        clock.set_paused(false);
        clock.advance(-1.0);
        assert_eq!(clock.scaled().now, 0.0);
    }
}
