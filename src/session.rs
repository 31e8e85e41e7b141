//! Session state machine: mode counters, streaks, rating and termination.
//!
//! Everything here is synchronous and total. Timers, locking and problem fetches
//! live in `engine.rs`, which drives this struct. Each transition that invalidates
//! pending work (mode change, round change) bumps `epoch`, so late fetch results
//! and delayed advances issued under an older epoch can be recognised and dropped.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::domain::{Mode, ProblemRecord, RoundFilter};
use crate::error::FetchError;
use crate::evaluator::is_correct;
use crate::exclusion::ExclusionSet;
use crate::protocol::{ContestView, FeedbackView, ProblemCard, SessionView, SprintView, TimerView, TopicRow};
use crate::selector::{desired_difficulty, PickRequest};
use crate::store::PersistedStats;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModeState {
  Open,
  Sprint { remaining_seconds: u32, correct_count: u32 },
  Contest { remaining_seconds: u32, index: u32, correct_count: u32 },
}

impl ModeState {
  fn start(mode: Mode, rules: &EngineConfig) -> Self {
    match mode {
      Mode::Open => ModeState::Open,
      Mode::Sprint => ModeState::Sprint { remaining_seconds: rules.sprint_seconds, correct_count: 0 },
      Mode::Contest => ModeState::Contest { remaining_seconds: rules.contest_seconds, index: 0, correct_count: 0 },
    }
  }

  pub fn mode(&self) -> Mode {
    match self {
      ModeState::Open => Mode::Open,
      ModeState::Sprint { .. } => Mode::Sprint,
      ModeState::Contest { .. } => Mode::Contest,
    }
  }

  pub fn remaining_seconds(&self) -> Option<u32> {
    match self {
      ModeState::Open => None,
      ModeState::Sprint { remaining_seconds, .. } | ModeState::Contest { remaining_seconds, .. } => Some(*remaining_seconds),
    }
  }

  pub fn correct_count(&self) -> u32 {
    match self {
      ModeState::Open => 0,
      ModeState::Sprint { correct_count, .. } | ModeState::Contest { correct_count, .. } => *correct_count,
    }
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TopicStats {
  pub correct: u32,
  pub total: u32,
}

impl TopicStats {
  /// Rounded success rate in percent.
  pub fn percent(&self) -> u32 {
    if self.total == 0 {
      return 0;
    }
    ((self.correct as f64 / self.total as f64) * 100.0).round() as u32
  }
}

/// Per-topic tallies for the lifetime of the engine. Mode changes leave it alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopicPerformance {
  by_topic: BTreeMap<String, TopicStats>,
}

impl TopicPerformance {
  pub fn record(&mut self, topics: &[String], correct: bool) {
    for topic in topics {
      let stats = self.by_topic.entry(topic.clone()).or_default();
      stats.total += 1;
      if correct {
        stats.correct += 1;
      }
    }
  }

  pub fn get(&self, topic: &str) -> Option<TopicStats> {
    self.by_topic.get(topic).copied()
  }

  pub fn rows(&self) -> Vec<TopicRow> {
    self.by_topic
      .iter()
      .map(|(topic, s)| TopicRow { topic: topic.clone(), correct: s.correct, total: s.total, percent: s.percent() })
      .collect()
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
  Correct,
  Incorrect,
  ContestComplete,
  TimeUp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Feedback {
  pub kind: FeedbackKind,
  pub text: String,
}

impl Feedback {
  fn new(kind: FeedbackKind, text: &str) -> Self {
    Self { kind, text: text.to_string() }
  }
}

/// Canonical answer and explanation of the last missed problem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Review {
  pub answer: String,
  pub solution: String,
}

/// Why a submission, round change or next-problem request was ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
  #[error("no problem is loaded")]
  NoProblem,
  #[error("the current problem is still being processed")]
  Busy,
  #[error("empty answer")]
  EmptyGuess,
  #[error("time is up")]
  TimeExpired,
  #[error("the contest is complete")]
  ContestComplete,
}

/// What the engine should do after a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
  /// Correct answer: fetch the next problem after the feedback delay.
  AdvanceAfterDelay,
  /// Incorrect answer: wait for an explicit next-problem request.
  AwaitNextProblem,
  /// Contest finished; nothing more is served.
  Finished,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitOutcome {
  pub correct: bool,
  pub expected: String,
  pub explanation: String,
  pub rating: i32,
  pub next: NextStep,
  /// Set when the best streak grew and must be persisted.
  pub new_best_streak: Option<u32>,
  /// Set when the all-time counter grew and must be persisted.
  pub all_time_solved: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
  Running(u32),
  Expired,
  Idle,
}

#[derive(Clone, Debug)]
pub struct SessionState {
  rules: EngineConfig,
  mode: ModeState,
  rating: i32,
  current_streak: u32,
  session_streak: u32,
  best_streak: u32,
  all_time_solved: u64,
  dark_mode: bool,
  round: RoundFilter,
  exclusion: ExclusionSet,
  problem: Option<ProblemRecord>,
  fetching: Option<u64>,
  answered: bool,
  feedback: Option<Feedback>,
  last_review: Option<Review>,
  fetch_error: Option<String>,
  topics: TopicPerformance,
  epoch: u64,
}

impl SessionState {
  /// Fresh engine state: Open mode, default rating, persisted counters restored.
  pub fn new(rules: EngineConfig, stats: PersistedStats) -> Self {
    Self {
      mode: ModeState::Open,
      rating: rules.initial_rating,
      current_streak: 0,
      session_streak: 0,
      best_streak: stats.best_streak,
      all_time_solved: stats.all_time_solved,
      dark_mode: stats.dark_mode,
      round: RoundFilter::All,
      exclusion: ExclusionSet::new(rules.exclusion_cap),
      problem: None,
      fetching: None,
      answered: false,
      feedback: None,
      last_review: None,
      fetch_error: None,
      topics: TopicPerformance::default(),
      epoch: 0,
      rules,
    }
  }

  pub fn mode(&self) -> Mode { self.mode.mode() }
  pub fn mode_state(&self) -> &ModeState { &self.mode }
  pub fn rating(&self) -> i32 { self.rating }
  pub fn current_streak(&self) -> u32 { self.current_streak }
  pub fn session_streak(&self) -> u32 { self.session_streak }
  pub fn best_streak(&self) -> u32 { self.best_streak }
  pub fn all_time_solved(&self) -> u64 { self.all_time_solved }
  pub fn round(&self) -> RoundFilter { self.round }
  pub fn exclusion(&self) -> &ExclusionSet { &self.exclusion }
  pub fn problem(&self) -> Option<&ProblemRecord> { self.problem.as_ref() }
  pub fn feedback(&self) -> Option<&Feedback> { self.feedback.as_ref() }
  pub fn last_review(&self) -> Option<&Review> { self.last_review.as_ref() }
  pub fn fetch_error(&self) -> Option<&str> { self.fetch_error.as_deref() }
  pub fn topics(&self) -> &TopicPerformance { &self.topics }
  pub fn epoch(&self) -> u64 { self.epoch }
  pub fn is_loading(&self) -> bool { self.fetching.is_some() }
  /// The loaded problem has been answered and the next one is not in yet.
  pub fn is_answered(&self) -> bool { self.problem.is_some() && self.answered }

  pub fn contest_score(&self) -> u32 {
    match self.mode {
      ModeState::Contest { correct_count, .. } => correct_count * self.rules.points_per_correct,
      _ => 0,
    }
  }

  pub fn is_time_expired(&self) -> bool {
    self.mode.remaining_seconds() == Some(0)
  }

  pub fn is_contest_complete(&self) -> bool {
    matches!(self.mode, ModeState::Contest { index, .. } if index >= self.rules.contest_length)
  }

  /// Soft-terminal: counters are kept but nothing more is served or accepted.
  pub fn is_frozen(&self) -> bool {
    self.is_time_expired() || self.is_contest_complete()
  }

  pub fn can_submit(&self) -> bool {
    self.problem.is_some() && self.fetching.is_none() && !self.answered && !self.is_frozen()
  }

  /// Reset per-mode counters and streaks; topic performance and the review survive.
  pub fn enter_mode(&mut self, mode: Mode) {
    self.epoch += 1;
    self.mode = ModeState::start(mode, &self.rules);
    self.current_streak = 0;
    self.session_streak = 0;
    self.exclusion.clear();
    self.problem = None;
    self.fetching = None;
    self.answered = false;
    self.feedback = None;
    self.fetch_error = None;
    info!(target: "session", %mode, epoch = self.epoch, "Entered mode");
  }

  /// Change the round filter. Pending fetches and advances become stale.
  ///
  /// A running contest keeps its unanswered problem: swapping it out would skip the slot.
  pub fn set_round(&mut self, round: RoundFilter) -> Result<(), Rejection> {
    if self.mode.mode() == Mode::Contest && !self.is_frozen() && self.problem.is_some() && !self.answered {
      return Err(Rejection::Busy);
    }
    self.epoch += 1;
    self.round = round;
    self.fetching = None;
    debug!(target: "session", %round, epoch = self.epoch, "Round filter changed");
    Ok(())
  }

  pub fn set_dark_mode(&mut self, enabled: bool) {
    self.dark_mode = enabled;
  }

  /// Adopt the shared store's counters after this session's gains were written to it.
  /// Other sessions may have moved them; the best streak never goes down.
  pub fn sync_persisted(&mut self, best_streak: Option<u32>, all_time_solved: Option<u64>) {
    if let Some(best) = best_streak {
      self.best_streak = self.best_streak.max(best);
    }
    if let Some(solved) = all_time_solved {
      self.all_time_solved = solved;
    }
  }

  /// Start a selector call for the current epoch.
  ///
  /// Returns `None` when the session is frozen or a fetch for this epoch is already running.
  pub fn begin_fetch(&mut self) -> Option<(u64, PickRequest)> {
    if self.is_frozen() || self.fetching == Some(self.epoch) {
      return None;
    }
    self.fetching = Some(self.epoch);
    Some((
      self.epoch,
      PickRequest { rating: self.rating, round: self.round, exclude: self.exclusion.ids().clone() },
    ))
  }

  /// Apply a selector result. Results from an older epoch are dropped; returns whether it was applied.
  pub fn finish_fetch(&mut self, epoch: u64, result: Result<ProblemRecord, FetchError>) -> bool {
    if epoch != self.epoch {
      debug!(target: "session", epoch, current = self.epoch, "Dropping stale fetch result");
      return false;
    }
    self.fetching = None;
    self.answered = false;
    match result {
      Ok(problem) => {
        self.exclusion.insert(&problem.id);
        debug!(target: "session", id = %problem.id, difficulty = problem.difficulty, "Problem loaded");
        self.problem = Some(problem);
        self.feedback = None;
        self.fetch_error = None;
      }
      Err(e) => {
        // Never leave the previous problem up as if it were fresh.
        self.problem = None;
        self.fetch_error = Some(e.to_string());
      }
    }
    true
  }

  /// Explicit "next problem" from the user: after an answer, or to retry a failed fetch.
  pub fn request_next(&mut self) -> Result<(u64, PickRequest), Rejection> {
    if self.is_contest_complete() {
      return Err(Rejection::ContestComplete);
    }
    if self.is_time_expired() {
      return Err(Rejection::TimeExpired);
    }
    if self.problem.is_some() && !self.answered {
      return Err(Rejection::Busy);
    }
    self.begin_fetch().ok_or(Rejection::Busy)
  }

  /// One elapsed second of the countdown.
  pub fn tick(&mut self) -> TickOutcome {
    let contest_complete = self.is_contest_complete();
    let remaining = match &mut self.mode {
      ModeState::Open => return TickOutcome::Idle,
      ModeState::Sprint { remaining_seconds, .. } => remaining_seconds,
      ModeState::Contest { remaining_seconds, .. } => {
        if contest_complete {
          return TickOutcome::Idle;
        }
        remaining_seconds
      }
    };
    if *remaining == 0 {
      return TickOutcome::Idle;
    }
    *remaining -= 1;
    if *remaining == 0 {
      self.feedback = Some(Feedback::new(FeedbackKind::TimeUp, "Time's up!"));
      info!(target: "session", mode = %self.mode.mode(), correct = self.mode.correct_count(), "Countdown expired");
      TickOutcome::Expired
    } else {
      TickOutcome::Running(*remaining)
    }
  }

  /// Evaluate a guess against the loaded problem and advance every counter.
  pub fn submit(&mut self, guess: &str) -> Result<SubmitOutcome, Rejection> {
    if self.is_contest_complete() {
      return Err(Rejection::ContestComplete);
    }
    if self.is_time_expired() {
      return Err(Rejection::TimeExpired);
    }
    if self.fetching.is_some() || (self.problem.is_some() && self.answered) {
      return Err(Rejection::Busy);
    }
    let Some(problem) = self.problem.as_ref() else {
      return Err(Rejection::NoProblem);
    };
    let guess = guess.trim();
    if guess.is_empty() && !self.rules.allow_blank_skip {
      return Err(Rejection::EmptyGuess);
    }

    let correct = is_correct(guess, &problem.answer);
    let expected = problem.answer.clone();
    let explanation = problem.short_solution.clone();
    self.topics.record(&problem.topics, correct);
    self.answered = true;

    let contest_length = self.rules.contest_length;
    let mut contest_done = false;
    if let ModeState::Contest { index, .. } = &mut self.mode {
      *index += 1;
      contest_done = *index >= contest_length;
    }

    let outcome = if correct {
      self.current_streak += 1;
      self.session_streak += 1;
      let new_best_streak = if self.current_streak > self.best_streak {
        self.best_streak = self.current_streak;
        Some(self.best_streak)
      } else {
        None
      };
      self.all_time_solved += 1;
      self.rating += self.rules.rating_gain;
      match &mut self.mode {
        ModeState::Sprint { correct_count, .. } | ModeState::Contest { correct_count, .. } => *correct_count += 1,
        ModeState::Open => {}
      }
      SubmitOutcome {
        correct,
        expected,
        explanation,
        rating: self.rating,
        next: if contest_done { NextStep::Finished } else { NextStep::AdvanceAfterDelay },
        new_best_streak,
        all_time_solved: Some(self.all_time_solved),
      }
    } else {
      self.current_streak = 0;
      self.rating = (self.rating - self.rules.rating_loss).max(self.rules.rating_floor);
      self.last_review = Some(Review { answer: expected.clone(), solution: explanation.clone() });
      SubmitOutcome {
        correct,
        expected,
        explanation,
        rating: self.rating,
        next: if contest_done { NextStep::Finished } else { NextStep::AwaitNextProblem },
        new_best_streak: None,
        all_time_solved: None,
      }
    };

    self.feedback = Some(if contest_done {
      Feedback::new(FeedbackKind::ContestComplete, "Contest complete!")
    } else if correct {
      Feedback::new(FeedbackKind::Correct, "✓ Correct")
    } else {
      Feedback::new(FeedbackKind::Incorrect, "✗ Incorrect")
    });

    info!(
      target: "session",
      mode = %self.mode.mode(),
      correct,
      rating = self.rating,
      streak = self.current_streak,
      next = ?outcome.next,
      "Answer evaluated"
    );
    Ok(outcome)
  }

  /// Serializable snapshot for clients.
  pub fn view(&self) -> SessionView {
    let timer = self.mode.remaining_seconds().map(|s| TimerView { remaining_seconds: s, display: format_clock(s) });
    let sprint = match self.mode {
      ModeState::Sprint { correct_count, .. } => Some(SprintView { correct_count }),
      _ => None,
    };
    let contest = match self.mode {
      ModeState::Contest { index, correct_count, .. } => Some(ContestView {
        index,
        position: (index + 1).min(self.rules.contest_length),
        length: self.rules.contest_length,
        correct_count,
        score: self.contest_score(),
        complete: self.is_contest_complete(),
      }),
      _ => None,
    };
    SessionView {
      mode: self.mode.mode(),
      round: self.round,
      rating: self.rating,
      desired_difficulty: desired_difficulty(self.rating),
      current_streak: self.current_streak,
      session_streak: self.session_streak,
      best_streak: self.best_streak,
      all_time_solved: self.all_time_solved,
      dark_mode: self.dark_mode,
      problem: self.problem.as_ref().map(ProblemCard::from),
      loading: self.is_loading(),
      can_submit: self.can_submit(),
      timer,
      sprint,
      contest,
      feedback: self.feedback.as_ref().map(|f| FeedbackView { kind: f.kind, text: f.text.clone() }),
      review: self.last_review.clone(),
      fetch_error: self.fetch_error.clone(),
      topics: self.topics.rows(),
    }
  }
}

/// `m:ss`, never negative.
pub fn format_clock(seconds: u32) -> String {
  format!("{}:{:02}", seconds / 60, seconds % 60)
}
