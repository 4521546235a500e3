//! Sky Volley entry point
//!
//! Native: runs a scripted autoplay session against a JSON preference file
//! and logs the event stream. Web: exposes a frame function for the page's
//! render loop, persisting to LocalStorage.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

use sky_volley::consts::{MAX_SUBSTEPS, SIM_DT};
use sky_volley::sim::{GameEvent, GameSession, TickInput, tick};

/// Fixed-step driver around a session
struct Game {
    session: GameSession,
    accumulator: f32,
    input: TickInput,
}

impl Game {
    fn new(session: GameSession) -> Self {
        Self {
            session,
            accumulator: 0.0,
            input: TickInput::default(),
        }
    }

    /// Run simulation ticks for `dt` seconds of real time
    fn update(&mut self, dt: f32) -> Vec<GameEvent> {
        let dt = dt.min(0.1);
        self.accumulator += dt;

        let mut events = Vec::new();
        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            tick(&mut self.session, &self.input, SIM_DT);
            self.accumulator -= SIM_DT;
            substeps += 1;

            // One-shot inputs are consumed by the first substep
            self.input.tap = false;
            events.extend(self.session.drain_events());
        }
        events
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;

    use wasm_bindgen::prelude::*;

    use super::Game;
    use sky_volley::persistence::LocalStorageStore;
    use sky_volley::sim::{GameEvent, GameSession};
    use sky_volley::tuning::demo_levels;
    use sky_volley::{AudioSettings, SessionConfig};

    thread_local! {
        static GAME: RefCell<Option<Game>> = const { RefCell::new(None) };
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::error_1(&format!("Failed to init logger: {}", e).into());
        }

        log::info!("Sky Volley starting...");

        let store = LocalStorageStore::load();
        let settings = AudioSettings::load(&store);
        let seed = js_sys::Date::now() as u64;
        let config = SessionConfig {
            seed,
            ..SessionConfig::default()
        };
        let mut session = GameSession::new(config, &demo_levels(5), Box::new(store));
        session.apply_audio_settings(&settings);

        GAME.with(|g| *g.borrow_mut() = Some(Game::new(session)));
    }

    fn with_game<T>(f: impl FnOnce(&mut Game) -> T) -> Option<T> {
        GAME.with(|g| g.borrow_mut().as_mut().map(f))
    }

    /// Advance by `dt` seconds; returns the frame's events, debug-formatted
    #[wasm_bindgen]
    pub fn frame(dt: f32, pointer_x: Option<f32>, tap: bool) -> Vec<String> {
        with_game(|game| {
            game.input.pointer_x = pointer_x;
            game.input.tap |= tap;
            game.update(dt)
                .iter()
                .map(|event: &GameEvent| format!("{:?}", event))
                .collect()
        })
        .unwrap_or_default()
    }

    /// Scene progress in [0, 1]
    #[wasm_bindgen]
    pub fn progress() -> f32 {
        with_game(|game| game.session.progress()).unwrap_or(0.0)
    }

    #[wasm_bindgen]
    pub fn press_level_complete_button() {
        with_game(|game| {
            if let Err(e) = game.session.press_level_complete_button() {
                log::warn!("{}", e);
            }
        });
    }

    #[wasm_bindgen]
    pub fn retry() {
        with_game(|game| {
            if let Err(e) = game.session.on_failed_retry() {
                log::warn!("{}", e);
            }
        });
    }

    #[wasm_bindgen]
    pub fn pick_upgrade(index: usize) {
        with_game(|game| {
            if let Err(e) = game.session.on_upgrade_picked(index) {
                log::warn!("{}", e);
            }
        });
    }

    #[wasm_bindgen]
    pub fn reset_progress() {
        with_game(|game| game.session.reset_all_progress());
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::run();
}

/// Autoplay: tap when idle, sweep the pointer, take the first open upgrade
#[cfg(not(target_arch = "wasm32"))]
fn autoplay(game: &mut Game, seconds: f32) {
    use sky_volley::sim::FlowState;

    let frames = (seconds / SIM_DT) as u32;
    let mut levels_completed = 0;
    let mut deaths = 0;

    for frame in 0..frames {
        let t = frame as f32 * SIM_DT;
        game.input.tap = game.session.state() == FlowState::Idle;
        game.input.pointer_x = Some((t * 1.3).sin() * 2.0);

        for event in game.update(SIM_DT) {
            log::debug!("{:?}", event);
            match event {
                GameEvent::LevelCompleted { level, stars, .. } => {
                    levels_completed += 1;
                    log::info!("Level {} complete with {} stars", level + 1, stars);
                }
                GameEvent::LevelFailed { .. } => deaths += 1,
                GameEvent::NothingToStart => {
                    log::info!("Every level passed");
                    return;
                }
                _ => {}
            }
        }

        let result = match game.session.state() {
            FlowState::LevelComplete => game.session.press_level_complete_button(),
            FlowState::Failed => game.session.on_failed_retry(),
            FlowState::UpgradePause => {
                let pick = game
                    .session
                    .upgrade_options()
                    .iter()
                    .position(|o| !o.maxed)
                    .unwrap_or(0);
                game.session.on_upgrade_picked(pick).map(|_| ())
            }
            FlowState::Idle | FlowState::Playing => Ok(()),
        };
        if let Err(e) = result {
            log::warn!("{}", e);
        }
    }

    log::info!(
        "Autoplay finished: {} levels completed, {} deaths, xp {}/{}",
        levels_completed,
        deaths,
        game.session.ledger().xp(),
        game.session.ledger().xp_threshold()
    );
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use sky_volley::persistence::JsonFileStore;
    use sky_volley::tuning::demo_levels;
    use sky_volley::{AudioSettings, SessionConfig};

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Sky Volley (native) starting...");

    let config = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|json| SessionConfig::from_json(&json).map_err(|e| e.to_string()))
        {
            Ok(config) => config,
            Err(e) => {
                log::error!("Could not load config {}: {}", path, e);
                SessionConfig::default()
            }
        },
        None => SessionConfig::default(),
    };

    let store = JsonFileStore::open("sky_volley_prefs.json");
    let settings = AudioSettings::load(&store);
    let mut session = GameSession::new(config, &demo_levels(5), Box::new(store));
    session.apply_audio_settings(&settings);

    let mut game = Game::new(session);
    autoplay(&mut game, 300.0);
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}
