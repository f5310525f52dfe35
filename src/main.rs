//! Generative AI Passport exam trainer
//!
//! - Interactive terminal console (menu, practice, timed mock exam, review)
//! - Questions generated through an OpenAI-compatible API (via environment variables)
//! - Progress persisted to a local JSON file
//!
//! Important env variables:
//!   OPENAI_API_KEY       : enables question generation if present
//!   OPENAI_BASE_URL      : default "https://api.openai.com/v1"
//!   OPENAI_MODEL         : default "gpt-4o-mini"
//!   PASSPORT_CONFIG_PATH : path to TOML config (prompts, exam shape, chapters)
//!   PASSPORT_STATE_PATH  : JSON state file, default "./passport_state.json"
//!   PASSPORT_SHUFFLE_SEED: optional u64 for reproducible question order
//!   PASSPORT_FIXED_NOW   : optional RFC 3339 instant stamped on every result
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod telemetry;
mod util;
mod clock;
mod error;
mod domain;
mod config;
mod syllabus;
mod shuffle;
mod store;
mod source;
mod openai;
mod session;
mod progress;
mod launcher;
mod state;
mod protocol;
mod render;
mod console;

use std::sync::Arc;

use tokio::io::BufReader;
use tracing::{info, instrument};

use crate::console::Console;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (config, progress from disk, OpenAI client).
  let state = Arc::new(AppState::from_env());

  let mut console = Console::new(state, BufReader::new(tokio::io::stdin()), tokio::io::stdout());
  tokio::select! {
    res = console.run() => res?,
    _ = tokio::signal::ctrl_c() => {
      info!(target: "passport_trainer", "Interrupted; exiting");
    }
  }
  Ok(())
}
