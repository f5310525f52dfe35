//! Application state: config, question source, progress tracker and launcher.
//!
//! This module owns:
//!   - the trainer config (from TOML or defaults)
//!   - the question source (OpenAI when a key is present, otherwise disabled)
//!   - the progress tracker backed by the JSON state file (or memory)
//!   - the shuffler (seedable through PASSPORT_SHUFFLE_SEED)
//!   - the session launcher and the clock sessions are stamped with (PASSPORT_FIXED_NOW)

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::clock::Clock;
use crate::config::{load_trainer_config_from_env, TrainerConfig};
use crate::launcher::Launcher;
use crate::openai::OpenAI;
use crate::progress::ProgressTracker;
use crate::shuffle::{SeededShuffler, Shuffler, ThreadRngShuffler};
use crate::source::{DisabledSource, QuestionSource};
use crate::store::{JsonFileStore, MemoryStore, Store};

/// `PASSPORT_STATE_PATH` value that keeps progress in memory only.
const MEMORY_STATE_PATH: &str = ":memory:";

pub struct AppState {
    pub config: TrainerConfig,
    pub progress: ProgressTracker,
    pub launcher: Launcher,
    pub clock: Clock,
}

impl AppState {
    /// Build state from env: load config, restore progress, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Self {
        let config = load_trainer_config_from_env();

        let source: Arc<dyn QuestionSource> = match OpenAI::from_env(config.prompts.clone()) {
            Some(oa) => {
                info!(target: "passport_trainer", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
                Arc::new(oa)
            }
            None => {
                warn!(target: "passport_trainer", "OpenAI disabled (no OPENAI_API_KEY). Question generation will fail.");
                Arc::new(DisabledSource)
            }
        };

        let store: Arc<dyn Store> = match std::env::var("PASSPORT_STATE_PATH").as_deref() {
            Ok(MEMORY_STATE_PATH) => {
                warn!(target: "passport_trainer", "In-memory state; progress is discarded on exit");
                Arc::new(MemoryStore::new())
            }
            _ => {
                let store = JsonFileStore::from_env();
                info!(target: "passport_trainer", path = %store.path().display(), "Using state file");
                Arc::new(store)
            }
        };

        // A fixed seed makes question order reproducible across runs.
        let shuffler: Arc<dyn Shuffler> = match std::env::var("PASSPORT_SHUFFLE_SEED").ok().map(|s| s.parse::<u64>()) {
            Some(Ok(seed)) => {
                info!(target: "passport_trainer", seed, "Seeded shuffling");
                Arc::new(SeededShuffler::new(seed))
            }
            Some(Err(e)) => {
                warn!(target: "passport_trainer", error = %e, "Ignoring invalid PASSPORT_SHUFFLE_SEED");
                Arc::new(ThreadRngShuffler)
            }
            None => Arc::new(ThreadRngShuffler),
        };

        Self::from_parts(config, source, store, shuffler, Clock::from_env())
    }

    pub fn from_parts(
        config: TrainerConfig,
        source: Arc<dyn QuestionSource>,
        store: Arc<dyn Store>,
        shuffler: Arc<dyn Shuffler>,
        clock: Clock,
    ) -> Self {
        let progress = ProgressTracker::load(store);
        let launcher = Launcher::new(source, progress.clone(), shuffler, &config);
        Self { config, progress, launcher, clock }
    }
}
