//! Error types. One enum per concern; none of them is fatal inside a running session.

use thiserror::Error;

use crate::domain::Round;

/// Catalog is unusable. Detected at startup, never at request time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
  #[error("no problems for round '{0}'")]
  EmptyRound(Round),
  #[error("duplicate problem id '{0}'")]
  DuplicateId(String),
  #[error("problem '{id}' has difficulty {difficulty}, expected 1..=10")]
  DifficultyOutOfRange { id: String, difficulty: u8 },
  #[error("problem '{0}' has no topics")]
  NoTopics(String),
  #[error("problem '{0}' has a zero estimated solve time")]
  InvalidSolveTime(String),
}

/// Selector call failed. Surfaced to the client, which may retry.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("selector request failed: {0}")]
  Http(#[from] reqwest::Error),
  #[error("selector answered with status {0}")]
  Status(u16),
  #[error("selector returned an unreadable body: {0}")]
  Decode(String),
  #[error("no problem available for round filter '{0}'")]
  Empty(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("stats file io: {0}")]
  Io(#[from] std::io::Error),
  #[error("stats file format: {0}")]
  Format(#[from] serde_json::Error),
}
