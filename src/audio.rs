//! Sound effect ids and the music fader
//!
//! Playback itself belongs to the host; the session only names which sound
//! to play and tracks the music volume envelope. Fades advance on unscaled
//! time so they keep running while gameplay is paused.

use crate::{clamp01, lerp};

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundEffect {
    /// Player fired a volley
    Shoot,
    /// Projectile damaged an obstacle
    ProjectileHit,
    /// Player lost health
    PlayerHit,
    /// Upgrade applied
    Upgrade,
    LevelComplete,
    /// Player died
    LevelFailed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Fade {
    from: f32,
    to: f32,
    duration: f32,
    elapsed: f32,
    /// Clears the temporary-fade state when done
    restoring: bool,
}

/// Music volume with temporary ducking
#[derive(Debug, Clone, PartialEq)]
pub struct MusicFader {
    /// Level the user chose
    user_volume: f32,
    /// Level currently applied to the music source
    volume: f32,
    fade: Option<Fade>,
    /// User level saved when a temporary fade began
    saved_volume: Option<f32>,
}

impl Default for MusicFader {
    fn default() -> Self {
        Self::new(0.7)
    }
}

impl MusicFader {
    pub fn new(volume: f32) -> Self {
        let volume = clamp01(volume);
        Self {
            user_volume: volume,
            volume,
            fade: None,
            saved_volume: None,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn user_volume(&self) -> f32 {
        self.user_volume
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    pub fn is_temp_faded(&self) -> bool {
        self.saved_volume.is_some()
    }

    /// Apply a user volume immediately, cancelling any fade
    pub fn set_volume(&mut self, volume: f32) {
        self.user_volume = clamp01(volume);
        self.volume = self.user_volume;
        self.fade = None;
    }

    /// Duck to `multiplier` of the user level
    ///
    /// The user level is remembered by the first call only, so nested
    /// duckings restore to the right level.
    pub fn fade_to_multiplier(&mut self, multiplier: f32, duration: f32) {
        let saved = *self.saved_volume.get_or_insert(self.user_volume);
        self.start_fade(clamp01(saved * multiplier), duration, false);
    }

    /// Fade back to the level saved by `fade_to_multiplier`
    pub fn restore_volume(&mut self, duration: f32) {
        let Some(saved) = self.saved_volume else {
            return;
        };
        self.start_fade(clamp01(saved), duration, true);
    }

    fn start_fade(&mut self, to: f32, duration: f32, restoring: bool) {
        let duration = duration.max(0.0);
        if duration <= 0.0 {
            self.volume = to;
            self.fade = None;
            if restoring {
                self.saved_volume = None;
            }
            return;
        }
        self.fade = Some(Fade {
            from: self.volume,
            to,
            duration,
            elapsed: 0.0,
            restoring,
        });
    }

    /// Advance the running fade by unscaled time
    pub fn update(&mut self, unscaled_dt: f32) {
        let Some(fade) = self.fade.as_mut() else {
            return;
        };
        fade.elapsed += unscaled_dt.max(0.0);
        let t = fade.elapsed / fade.duration;
        self.volume = lerp(fade.from, fade.to, t);
        if t >= 1.0 {
            self.volume = fade.to;
            if fade.restoring {
                self.saved_volume = None;
            }
            self.fade = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duck_and_restore() {
        let mut music = MusicFader::new(0.8);
        music.fade_to_multiplier(0.5, 0.5);
        music.update(0.25);
        assert!((music.volume() - 0.6).abs() < 1e-5);
        music.update(0.5);
        assert!((music.volume() - 0.4).abs() < 1e-5);
        assert!(music.is_temp_faded());

        music.restore_volume(0.5);
        music.update(1.0);
        assert!((music.volume() - 0.8).abs() < 1e-5);
        assert!(!music.is_temp_faded());
        assert!(!music.is_fading());
    }

    #[test]
    fn test_nested_duck_keeps_first_saved_level() {
        let mut music = MusicFader::new(1.0);
        music.fade_to_multiplier(0.5, 0.0);
        music.fade_to_multiplier(0.5, 0.0);
        assert_eq!(music.volume(), 0.5);
        music.restore_volume(0.0);
        assert_eq!(music.volume(), 1.0);
    }

    #[test]
    fn test_set_volume_cancels_fade() {
        let mut music = MusicFader::new(1.0);
        music.fade_to_multiplier(0.5, 1.0);
        music.set_volume(0.3);
        assert!(!music.is_fading());
        music.update(2.0);
        assert_eq!(music.volume(), 0.3);
    }

    #[test]
    fn test_restore_without_duck_is_noop() {
        let mut music = MusicFader::new(0.6);
        music.restore_volume(0.5);
        assert!(!music.is_fading());
        assert_eq!(music.volume(), 0.6);
    }
}
