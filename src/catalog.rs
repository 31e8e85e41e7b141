//! Immutable problem catalog: TOML bank entries first, then built-in seeds.

use std::collections::{BTreeMap, HashSet};

use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::ProblemCfg;
use crate::domain::{ProblemRecord, Round, RoundFilter};
use crate::error::CatalogError;

#[derive(Clone, Debug)]
pub struct Catalog {
  problems: Vec<ProblemRecord>,
}

impl Catalog {
  /// Build from an explicit list, keeping insertion order. Selection ties follow this order.
  pub fn new(problems: Vec<ProblemRecord>) -> Self {
    Self { problems }
  }

  /// Merge the configured bank with the built-in seeds. Seeds never overwrite a bank id.
  #[instrument(level = "info", skip_all, fields(bank = bank.len(), seeds = seeds.len()))]
  pub fn from_sources(bank: &[ProblemCfg], seeds: Vec<ProblemRecord>) -> Self {
    let mut problems = Vec::with_capacity(bank.len() + seeds.len());
    let mut ids = HashSet::new();

    for pc in bank {
      let id = pc.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
      if !ids.insert(id.clone()) {
        error!(target: "rapidfamat_backend", %id, "Skipping bank item: duplicate id.");
        continue;
      }
      problems.push(ProblemRecord {
        id,
        year: pc.year,
        round: pc.round,
        number: pc.number,
        statement: pc.statement.clone(),
        answer: pc.answer.clone(),
        short_solution: pc.short_solution.clone(),
        estimated_solve_time_sec: pc.estimated_solve_time_sec,
        difficulty: pc.difficulty,
        topics: pc.topics.clone(),
      });
    }

    for p in seeds {
      if ids.insert(p.id.clone()) {
        problems.push(p);
      }
    }

    let catalog = Self { problems };
    for (round, count) in catalog.inventory() {
      info!(target: "selector", %round, count, "Startup problem inventory");
    }
    catalog
  }

  /// All records, or only those in `round` when given.
  pub fn find(&self, round: Option<Round>) -> Vec<&ProblemRecord> {
    self.problems
      .iter()
      .filter(|p| round.map_or(true, |r| p.round == r))
      .collect()
  }

  pub fn find_filtered(&self, filter: RoundFilter) -> Vec<&ProblemRecord> {
    match filter {
      RoundFilter::All => self.find(None),
      RoundFilter::Only(round) => self.find(Some(round)),
    }
  }

  pub fn get(&self, id: &str) -> Option<&ProblemRecord> {
    self.problems.iter().find(|p| p.id == id)
  }

  pub fn len(&self) -> usize { self.problems.len() }

  pub fn is_empty(&self) -> bool { self.problems.is_empty() }

  pub fn inventory(&self) -> BTreeMap<Round, usize> {
    let mut counts = BTreeMap::new();
    for p in &self.problems {
      *counts.entry(p.round).or_insert(0) += 1;
    }
    counts
  }

  /// Startup check: every round is served and every record is well formed.
  pub fn validate(&self) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for p in &self.problems {
      if !seen.insert(p.id.as_str()) {
        return Err(CatalogError::DuplicateId(p.id.clone()));
      }
      if !(1..=10).contains(&p.difficulty) {
        return Err(CatalogError::DifficultyOutOfRange { id: p.id.clone(), difficulty: p.difficulty });
      }
      if p.topics.is_empty() {
        return Err(CatalogError::NoTopics(p.id.clone()));
      }
      if p.estimated_solve_time_sec == 0 {
        return Err(CatalogError::InvalidSolveTime(p.id.clone()));
      }
    }
    let inventory = self.inventory();
    for round in Round::ALL {
      if !inventory.contains_key(&round) {
        return Err(CatalogError::EmptyRound(round));
      }
    }
    Ok(())
  }
}
