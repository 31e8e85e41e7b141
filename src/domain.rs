//! Domain models used by the backend: rounds, round filters, session modes and the problem record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Contest round a problem belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Round {
  #[serde(rename = "Algebra 1")]
  Algebra1,
  #[serde(rename = "Algebra 2")]
  Algebra2,
  Statistics,
  Geometry,
  Calculus,
  #[serde(rename = "Pre-Calculus")]
  PreCalculus,
}

impl Round {
  /// Every round, in the order the filter UI lists them.
  pub const ALL: [Round; 6] = [
    Round::Algebra1,
    Round::Algebra2,
    Round::Statistics,
    Round::Geometry,
    Round::Calculus,
    Round::PreCalculus,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Round::Algebra1 => "Algebra 1",
      Round::Algebra2 => "Algebra 2",
      Round::Statistics => "Statistics",
      Round::Geometry => "Geometry",
      Round::Calculus => "Calculus",
      Round::PreCalculus => "Pre-Calculus",
    }
  }
}

impl fmt::Display for Round {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown round '{0}'")]
pub struct UnknownRound(pub String);

impl FromStr for Round {
  type Err = UnknownRound;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Round::ALL
      .iter()
      .copied()
      .find(|r| r.as_str() == s)
      .ok_or_else(|| UnknownRound(s.to_string()))
  }
}

/// Round filter as sent by clients: a concrete round or `All`.
///
/// Parsing is permissive: anything that is not a known round name means `All`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoundFilter {
  #[default]
  All,
  Only(Round),
}

impl RoundFilter {
  pub fn parse_lenient(s: &str) -> Self {
    match s.parse::<Round>() {
      Ok(r) => RoundFilter::Only(r),
      Err(_) => RoundFilter::All,
    }
  }

  pub fn matches(&self, round: Round) -> bool {
    match self {
      RoundFilter::All => true,
      RoundFilter::Only(r) => *r == round,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      RoundFilter::All => "All",
      RoundFilter::Only(r) => r.as_str(),
    }
  }
}

impl From<String> for RoundFilter {
  fn from(s: String) -> Self { RoundFilter::parse_lenient(&s) }
}

impl From<RoundFilter> for String {
  fn from(f: RoundFilter) -> Self { f.as_str().to_string() }
}

impl fmt::Display for RoundFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Session mode. Old client names (`infinite`, `timed`) are still accepted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
  /// Untimed, unbounded.
  #[default]
  #[serde(alias = "infinite")]
  Open,
  /// Countdown, unbounded problem count.
  #[serde(alias = "timed")]
  Sprint,
  /// Countdown and a fixed number of problems, whichever runs out first.
  Contest,
}

impl fmt::Display for Mode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Mode::Open => "open",
      Mode::Sprint => "sprint",
      Mode::Contest => "contest",
    };
    f.write_str(s)
  }
}

/// One catalog entry. Built once at startup, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemRecord {
  pub id: String,
  pub year: u16,
  pub round: Round,
  pub number: u16,
  pub statement: String,
  pub answer: String,
  pub short_solution: String,
  pub estimated_solve_time_sec: u32,
  pub difficulty: u8,
  pub topics: Vec<String>,
}
