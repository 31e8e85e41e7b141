//! Loading engine configuration (session rules + optional problem bank) from TOML.
//!
//! See `AppConfig`, `EngineConfig` and `ProblemCfg` for the expected schema:
//!
//! ```toml
//! [engine]
//! initial_rating = 1200
//! sprint_seconds = 600
//!
//! [[problems]]
//! round = "Geometry"
//! difficulty = 4
//! statement = "..."
//! answer = "..."
//! topics = ["area"]
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Round;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub engine: EngineConfig,
  #[serde(default)]
  pub problems: Vec<ProblemCfg>,
}

/// Session and selector tuning. Every field has a default, so partial tables are fine.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
  pub initial_rating: i32,
  pub rating_floor: i32,
  pub rating_gain: i32,
  pub rating_loss: i32,
  pub exclusion_cap: usize,
  pub shortlist_size: usize,
  pub sprint_seconds: u32,
  pub contest_seconds: u32,
  pub contest_length: u32,
  pub points_per_correct: u32,
  pub advance_delay_ms: u64,
  pub allow_blank_skip: bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      initial_rating: 1200,
      rating_floor: 900,
      rating_gain: 8,
      rating_loss: 12,
      exclusion_cap: 200,
      shortlist_size: 6,
      sprint_seconds: 600,
      contest_seconds: 1500,
      contest_length: 25,
      points_per_correct: 6,
      advance_delay_ms: 700,
      allow_blank_skip: false,
    }
  }
}

impl EngineConfig {
  pub fn advance_delay(&self) -> Duration {
    Duration::from_millis(self.advance_delay_ms)
  }
}

/// Problem entry accepted in TOML configuration. Missing ids get a UUID.
#[derive(Clone, Debug, Deserialize)]
pub struct ProblemCfg {
  #[serde(default)] pub id: Option<String>,
  #[serde(default)] pub year: u16,
  #[serde(default)] pub number: u16,
  pub round: Round,
  pub difficulty: u8,
  pub statement: String,
  pub answer: String,
  #[serde(default)] pub short_solution: String,
  #[serde(default = "default_solve_time")] pub estimated_solve_time_sec: u32,
  pub topics: Vec<String>,
}

fn default_solve_time() -> u32 { 30 }

/// Attempt to load `AppConfig` from ENGINE_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("ENGINE_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_app_config(&s) {
      Ok(cfg) => {
        info!(target: "rapidfamat_backend", %path, bank = cfg.problems.len(), "Loaded engine config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "rapidfamat_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "rapidfamat_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_app_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_engine_table_keeps_defaults() {
    let cfg = parse_app_config("[engine]\nsprint_seconds = 60\n").unwrap();
    assert_eq!(cfg.engine.sprint_seconds, 60);
    assert_eq!(cfg.engine.contest_length, 25);
    assert_eq!(cfg.engine.initial_rating, 1200);
    assert!(cfg.problems.is_empty());
  }

  #[test]
  fn problem_bank_entries_parse() {
    let src = r#"
      [[problems]]
      round = "Pre-Calculus"
      difficulty = 5
      statement = "Find tan(45 degrees)."
      answer = "1"
      topics = ["trigonometry"]
    "#;
    let cfg = parse_app_config(src).unwrap();
    assert_eq!(cfg.engine, EngineConfig::default());
    let p = &cfg.problems[0];
    assert_eq!(p.round, Round::PreCalculus);
    assert!(p.id.is_none());
    assert_eq!(p.estimated_solve_time_sec, 30);
  }

  #[test]
  fn unknown_round_in_bank_is_a_parse_error() {
    let src = "[[problems]]\nround = \"Topology\"\ndifficulty = 1\nstatement = \"s\"\nanswer = \"a\"\ntopics = [\"t\"]\n";
    assert!(parse_app_config(src).is_err());
  }
}
