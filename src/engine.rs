//! Async driver around `SessionState`.
//!
//! One engine per connected client. All mutations go through a single
//! `tokio::sync::Mutex`; the countdown and the delayed advance are spawned tasks
//! that hold only a `Weak` reference, so dropping the engine stops them. Every
//! change publishes a fresh `SessionView` on a watch channel.

use std::{
  sync::{Arc, Mutex as StdMutex, Weak},
  time::Duration,
};

use tokio::{
  sync::{watch, Mutex},
  task::JoinHandle,
};
use tracing::{debug, error, info, instrument, warn};

use crate::config::EngineConfig;
use crate::domain::{Mode, RoundFilter};
use crate::protocol::SessionView;
use crate::selector::{PickRequest, ProblemSource};
use crate::session::{NextStep, Rejection, SessionState, SubmitOutcome, TickOutcome};
use crate::store::{PersistedStats, ScalarStore, ALL_TIME_SOLVED, BEST_STREAK, DARK_MODE};

#[derive(Default)]
struct Timers {
  countdown: Option<JoinHandle<()>>,
  advance: Option<JoinHandle<()>>,
}

impl Timers {
  fn abort_all(&mut self) {
    if let Some(h) = self.countdown.take() { h.abort(); }
    if let Some(h) = self.advance.take() { h.abort(); }
  }
}

pub struct SessionEngine {
  state: Mutex<SessionState>,
  source: ProblemSource,
  store: Arc<dyn ScalarStore>,
  advance_delay: Duration,
  timers: StdMutex<Timers>,
  updates: watch::Sender<SessionView>,
}

impl SessionEngine {
  /// Restore persisted counters and start in Open mode. Call `start` to load the first problem.
  pub fn new(rules: &EngineConfig, source: ProblemSource, store: Arc<dyn ScalarStore>) -> Arc<Self> {
    let stats = PersistedStats::load(store.as_ref());
    let state = SessionState::new(rules.clone(), stats);
    let (updates, _) = watch::channel(state.view());
    Arc::new(Self {
      state: Mutex::new(state),
      source,
      store,
      advance_delay: rules.advance_delay(),
      timers: StdMutex::new(Timers::default()),
      updates,
    })
  }

  pub fn subscribe(&self) -> watch::Receiver<SessionView> {
    self.updates.subscribe()
  }

  pub async fn view(&self) -> SessionView {
    self.state.lock().await.view()
  }

  fn publish(&self, state: &SessionState) {
    self.updates.send_replace(state.view());
  }

  fn timers(&self) -> std::sync::MutexGuard<'_, Timers> {
    self.timers.lock().unwrap_or_else(|e| e.into_inner())
  }

  pub async fn start(self: &Arc<Self>) {
    self.fetch_next().await;
  }

  /// Reset the session for `mode`, restart the countdown and load a problem.
  #[instrument(level = "info", skip(self))]
  pub async fn enter_mode(self: &Arc<Self>, mode: Mode) {
    // Stop the old countdown before touching state so it cannot tick the new mode.
    self.timers().abort_all();
    {
      let mut st = self.state.lock().await;
      st.enter_mode(mode);
      self.publish(&st);
    }
    if mode != Mode::Open {
      self.spawn_countdown();
    }
    self.fetch_next().await;
  }

  /// Switch the round filter and load a problem from it. Refused mid-contest while a problem is unanswered.
  #[instrument(level = "info", skip(self))]
  pub async fn set_round(self: &Arc<Self>, round: RoundFilter) -> Result<(), Rejection> {
    {
      let mut st = self.state.lock().await;
      st.set_round(round)?;
      // Under the lock: an advance that already began a fetch had it reset by `set_round`.
      self.cancel_advance();
      self.publish(&st);
    }
    self.fetch_next().await;
    Ok(())
  }

  pub async fn set_dark_mode(&self, enabled: bool) {
    {
      let mut st = self.state.lock().await;
      st.set_dark_mode(enabled);
      self.publish(&st);
    }
    if let Err(e) = self.store.set(DARK_MODE, i64::from(enabled)) {
      error!(target: "session", error = %e, "Failed to persist dark mode");
    }
  }

  /// Evaluate a guess. A correct answer schedules the next problem after the feedback delay.
  #[instrument(level = "info", skip(self, guess), fields(guess_len = guess.len()))]
  pub async fn submit(self: &Arc<Self>, guess: &str) -> Result<SubmitOutcome, Rejection> {
    let (outcome, epoch) = {
      let mut st = self.state.lock().await;
      let mut outcome = st.submit(guess)?;
      self.persist(&mut st, &mut outcome);
      self.publish(&st);
      (outcome, st.epoch())
    };
    if outcome.next == NextStep::AdvanceAfterDelay {
      self.schedule_advance(epoch);
    }
    Ok(outcome)
  }

  /// Explicit request for the next problem (after a miss, or to retry a failed fetch).
  #[instrument(level = "info", skip(self))]
  pub async fn next_problem(self: &Arc<Self>) -> Result<(), Rejection> {
    let (epoch, req) = {
      let mut st = self.state.lock().await;
      let pending = st.request_next()?;
      self.publish(&st);
      pending
    };
    // No fetch was running, so a pending advance is at most sleeping.
    self.cancel_advance();
    self.run_fetch(epoch, req).await;
    Ok(())
  }

  async fn fetch_next(&self) {
    let pending = {
      let mut st = self.state.lock().await;
      let pending = st.begin_fetch();
      if pending.is_some() {
        self.publish(&st);
      }
      pending
    };
    if let Some((epoch, req)) = pending {
      self.run_fetch(epoch, req).await;
    }
  }

  /// Selector call runs outside the lock; ticks keep going meanwhile.
  async fn run_fetch(&self, epoch: u64, req: PickRequest) {
    let result = self.source.fetch(&req).await;
    match &result {
      Ok(p) => debug!(target: "selector", id = %p.id, difficulty = p.difficulty, rating = req.rating, round = %req.round, "Problem fetched"),
      Err(e) => warn!(target: "selector", error = %e, rating = req.rating, round = %req.round, "Problem fetch failed"),
    }
    let mut st = self.state.lock().await;
    if st.finish_fetch(epoch, result) {
      self.publish(&st);
    }
  }

  /// Fold this answer's gains into the shared store and adopt the store's totals,
  /// which other sessions may have moved since this one started.
  fn persist(&self, st: &mut SessionState, outcome: &mut SubmitOutcome) {
    let mut best = None;
    if let Some(streak) = outcome.new_best_streak {
      match self.store.set_max(BEST_STREAK, i64::from(streak)) {
        Ok(stored) => best = Some(u32::try_from(stored).unwrap_or(streak)),
        Err(e) => error!(target: "session", error = %e, "Failed to persist best streak"),
      }
    }
    let mut solved = None;
    if let Some(local) = outcome.all_time_solved {
      match self.store.increment(ALL_TIME_SOLVED, 1) {
        Ok(stored) => solved = Some(u64::try_from(stored).unwrap_or(local)),
        Err(e) => error!(target: "session", error = %e, "Failed to persist all-time solved"),
      }
    }
    st.sync_persisted(best, solved);
    if outcome.new_best_streak.is_some() {
      outcome.new_best_streak = Some(st.best_streak());
    }
    if outcome.all_time_solved.is_some() {
      outcome.all_time_solved = Some(st.all_time_solved());
    }
  }

  fn spawn_countdown(self: &Arc<Self>) {
    let weak: Weak<Self> = Arc::downgrade(self);
    let handle = tokio::spawn(async move {
      let mut interval = tokio::time::interval(Duration::from_secs(1));
      // The first tick completes immediately.
      interval.tick().await;
      loop {
        interval.tick().await;
        let Some(engine) = weak.upgrade() else { break };
        let outcome = {
          let mut st = engine.state.lock().await;
          let outcome = st.tick();
          if outcome != TickOutcome::Idle {
            engine.publish(&st);
          }
          outcome
        };
        match outcome {
          TickOutcome::Running(_) => {}
          TickOutcome::Expired | TickOutcome::Idle => break,
        }
      }
    });
    self.timers().countdown = Some(handle);
  }

  fn schedule_advance(self: &Arc<Self>, epoch: u64) {
    let weak: Weak<Self> = Arc::downgrade(self);
    let delay = self.advance_delay;
    let handle = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let Some(engine) = weak.upgrade() else { return };
      {
        let st = engine.state.lock().await;
        if st.epoch() != epoch || !st.is_answered() {
          debug!(target: "session", epoch, current = st.epoch(), "Skipping stale advance");
          return;
        }
      }
      engine.fetch_next().await;
    });
    if let Some(old) = self.timers().advance.replace(handle) {
      old.abort();
    }
  }

  fn cancel_advance(&self) {
    if let Some(h) = self.timers().advance.take() {
      h.abort();
    }
  }
}

impl Drop for SessionEngine {
  fn drop(&mut self) {
    self.timers().abort_all();
    info!(target: "session", source = self.source.describe(), "Session engine dropped");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::Catalog;
  use crate::domain::Round;
  use crate::seeds::seed_problems;
  use crate::selector::{LocalSelector, DEFAULT_SHORTLIST};
  use crate::session::FeedbackKind;
  use crate::store::MemoryStore;

  struct Harness {
    engine: Arc<SessionEngine>,
    catalog: Arc<Catalog>,
    store: Arc<MemoryStore>,
  }

  impl Harness {
    fn new(rules: EngineConfig, catalog: Catalog) -> Self {
      Self::with_store(rules, catalog, Arc::new(MemoryStore::default()))
    }

    fn with_store(rules: EngineConfig, catalog: Catalog, store: Arc<MemoryStore>) -> Self {
      let catalog = Arc::new(catalog);
      let source = ProblemSource::Local(LocalSelector::new(catalog.clone(), DEFAULT_SHORTLIST));
      let engine = SessionEngine::new(&rules, source, store.clone());
      Self { engine, catalog, store }
    }

    fn seeded(rules: EngineConfig) -> Self {
      Self::new(rules, Catalog::new(seed_problems()))
    }

    async fn current_answer(&self) -> String {
      let view = self.engine.view().await;
      let id = view.problem.expect("problem loaded").id;
      self.catalog.get(&id).expect("known id").answer.clone()
    }

    async fn current_id(&self) -> Option<String> {
      self.engine.view().await.problem.map(|p| p.id)
    }

    /// Answer correctly and wait out the feedback delay.
    async fn solve(&self) {
      let answer = self.current_answer().await;
      let out = self.engine.submit(&answer).await.unwrap();
      assert_eq!(out.next, NextStep::AdvanceAfterDelay);
      tokio::time::sleep(Duration::from_millis(750)).await;
    }
  }

  #[tokio::test(start_paused = true)]
  async fn start_loads_a_problem() {
    let h = Harness::seeded(EngineConfig::default());
    h.engine.start().await;
    let view = h.engine.view().await;
    assert!(view.problem.is_some());
    assert!(view.can_submit);
    assert_eq!(view.mode, Mode::Open);
  }

  #[tokio::test(start_paused = true)]
  async fn correct_answer_advances_after_delay_and_persists() {
    let h = Harness::seeded(EngineConfig::default());
    h.engine.start().await;
    let first = h.current_id().await;
    let answer = h.current_answer().await;

    let out = h.engine.submit(&answer).await.unwrap();
    assert!(out.correct);
    assert_eq!(h.current_id().await, first);
    assert!(!h.engine.view().await.can_submit);

    tokio::time::sleep(Duration::from_millis(750)).await;
    let view = h.engine.view().await;
    assert!(view.can_submit);
    assert_ne!(view.problem.map(|p| p.id), first);
    assert_eq!(h.store.get(ALL_TIME_SOLVED), Some(1));
    assert_eq!(h.store.get(BEST_STREAK), Some(1));
  }

  #[tokio::test(start_paused = true)]
  async fn incorrect_answer_waits_for_next_problem() {
    let h = Harness::seeded(EngineConfig::default());
    h.engine.start().await;
    let first = h.current_id().await;

    let out = h.engine.submit("not an answer").await.unwrap();
    assert!(!out.correct);
    tokio::time::sleep(Duration::from_secs(3)).await;
    let view = h.engine.view().await;
    assert_eq!(view.problem.map(|p| p.id), first);
    assert_eq!(view.feedback.map(|f| f.kind), Some(FeedbackKind::Incorrect));
    assert!(view.review.is_some());

    h.engine.next_problem().await.unwrap();
    assert!(h.engine.view().await.can_submit);
    assert_eq!(h.store.get(ALL_TIME_SOLVED), None);
  }

  #[tokio::test(start_paused = true)]
  async fn mode_change_cancels_pending_advance() {
    let h = Harness::seeded(EngineConfig::default());
    h.engine.start().await;
    let answer = h.current_answer().await;
    h.engine.submit(&answer).await.unwrap();

    h.engine.enter_mode(Mode::Contest).await;
    let contest_first = h.current_id().await;
    assert!(contest_first.is_some());

    tokio::time::sleep(Duration::from_secs(2)).await;
    let view = h.engine.view().await;
    assert_eq!(view.problem.map(|p| p.id), contest_first);
    assert_eq!(view.current_streak, 0);
    assert_eq!(view.contest.map(|c| c.index), Some(0));
  }

  #[tokio::test(start_paused = true)]
  async fn sprint_countdown_expires_and_blocks_submissions() {
    let rules = EngineConfig { sprint_seconds: 5, ..EngineConfig::default() };
    let h = Harness::seeded(rules);
    h.engine.enter_mode(Mode::Sprint).await;
    assert_eq!(h.engine.view().await.timer.map(|t| t.remaining_seconds), Some(5));

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(h.engine.view().await.timer.map(|t| t.remaining_seconds), Some(3));

    tokio::time::sleep(Duration::from_secs(5)).await;
    let view = h.engine.view().await;
    assert_eq!(view.timer.map(|t| t.display), Some("0:00".to_string()));
    assert!(!view.can_submit);
    assert_eq!(h.engine.submit("5").await.unwrap_err(), Rejection::TimeExpired);
  }

  #[tokio::test(start_paused = true)]
  async fn re_entering_a_timed_mode_restarts_the_clock() {
    let rules = EngineConfig { sprint_seconds: 10, ..EngineConfig::default() };
    let h = Harness::seeded(rules);
    h.engine.enter_mode(Mode::Sprint).await;
    tokio::time::sleep(Duration::from_millis(4500)).await;
    h.engine.enter_mode(Mode::Sprint).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.engine.view().await.timer.map(|t| t.remaining_seconds), Some(9));
  }

  #[tokio::test(start_paused = true)]
  async fn failed_fetch_is_reported_not_substituted() {
    let catalog = Catalog::new(seed_problems().into_iter().filter(|p| p.round != Round::Geometry).collect());
    let h = Harness::new(EngineConfig::default(), catalog);
    h.engine.start().await;
    assert!(h.current_id().await.is_some());

    h.engine.set_round(RoundFilter::Only(Round::Geometry)).await.unwrap();
    let view = h.engine.view().await;
    assert!(view.problem.is_none());
    assert!(view.fetch_error.is_some());
    assert!(!view.loading);

    h.engine.set_round(RoundFilter::Only(Round::Calculus)).await.unwrap();
    let view = h.engine.view().await;
    assert_eq!(view.problem.map(|p| p.round), Some(Round::Calculus));
    assert!(view.fetch_error.is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn subscribers_see_updates() {
    let h = Harness::seeded(EngineConfig::default());
    let mut rx = h.engine.subscribe();
    h.engine.start().await;
    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().problem.is_some());

    h.engine.set_dark_mode(true).await;
    assert!(rx.borrow_and_update().dark_mode);
    assert_eq!(h.store.get(DARK_MODE), Some(1));
  }

  #[tokio::test(start_paused = true)]
  async fn sessions_sharing_a_store_accumulate_counters() {
    let store = Arc::new(MemoryStore::default());
    let a = Harness::with_store(EngineConfig::default(), Catalog::new(seed_problems()), store.clone());
    let b = Harness::with_store(EngineConfig::default(), Catalog::new(seed_problems()), store.clone());
    a.engine.start().await;
    b.engine.start().await;

    for _ in 0..5 {
      a.solve().await;
    }
    assert_eq!((store.get(BEST_STREAK), store.get(ALL_TIME_SOLVED)), (Some(5), Some(5)));

    b.solve().await;
    assert_eq!(store.get(ALL_TIME_SOLVED), Some(6));
    assert_eq!(store.get(BEST_STREAK), Some(5));
    let view = b.engine.view().await;
    assert_eq!((view.best_streak, view.all_time_solved, view.current_streak), (5, 6, 1));
  }

  #[tokio::test(start_paused = true)]
  async fn contest_can_end_on_a_miss() {
    let h = Harness::seeded(EngineConfig::default());
    h.engine.enter_mode(Mode::Contest).await;
    for _ in 0..24 {
      h.solve().await;
    }
    let last = h.current_id().await;
    let out = h.engine.submit("definitely wrong").await.unwrap();
    assert!(!out.correct);
    assert_eq!(out.next, NextStep::Finished);

    let view = h.engine.view().await;
    let contest = view.contest.unwrap();
    assert!(contest.complete);
    assert_eq!((contest.index, contest.correct_count, contest.score), (25, 24, 144));
    assert_eq!(view.feedback.map(|f| f.kind), Some(FeedbackKind::ContestComplete));
    assert_eq!(h.engine.next_problem().await, Err(Rejection::ContestComplete));
    assert_eq!(h.current_id().await, last);
  }

  #[tokio::test(start_paused = true)]
  async fn finishing_contest_does_not_advance() {
    let h = Harness::seeded(EngineConfig::default());
    h.engine.enter_mode(Mode::Contest).await;
    for _ in 0..24 {
      h.solve().await;
    }
    let last = h.current_id().await;
    let answer = h.current_answer().await;
    let out = h.engine.submit(&answer).await.unwrap();
    assert_eq!(out.next, NextStep::Finished);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let view = h.engine.view().await;
    assert_eq!(view.problem.map(|p| p.id), last);
    assert!(!view.loading);
    assert!(!view.can_submit);
    assert_eq!(view.contest.map(|c| c.score), Some(150));
  }

  #[tokio::test(start_paused = true)]
  async fn advance_pending_at_sprint_expiry_is_dropped() {
    let rules = EngineConfig { sprint_seconds: 2, ..EngineConfig::default() };
    let h = Harness::seeded(rules);
    h.engine.enter_mode(Mode::Sprint).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.engine.view().await.timer.map(|t| t.remaining_seconds), Some(1));

    let first = h.current_id().await;
    let answer = h.current_answer().await;
    let out = h.engine.submit(&answer).await.unwrap();
    assert_eq!(out.next, NextStep::AdvanceAfterDelay);

    // Clock hits zero at 2s, the advance wakes at 2.2s.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let view = h.engine.view().await;
    assert_eq!(view.timer.map(|t| t.remaining_seconds), Some(0));
    assert_eq!(view.problem.map(|p| p.id), first);
    assert!(!view.loading);
    assert_eq!(view.sprint.map(|s| s.correct_count), Some(1));
    assert_eq!(view.feedback.map(|f| f.kind), Some(FeedbackKind::TimeUp));
  }

  #[tokio::test(start_paused = true)]
  async fn contest_round_change_needs_an_answer_first() {
    let h = Harness::seeded(EngineConfig::default());
    h.engine.enter_mode(Mode::Contest).await;
    let first = h.current_id().await;
    assert_eq!(h.engine.set_round(RoundFilter::Only(Round::Geometry)).await, Err(Rejection::Busy));
    assert_eq!(h.current_id().await, first);

    h.engine.submit("definitely wrong").await.unwrap();
    h.engine.set_round(RoundFilter::Only(Round::Geometry)).await.unwrap();
    let view = h.engine.view().await;
    assert_eq!(view.problem.map(|p| p.round), Some(Round::Geometry));
    assert_eq!(view.contest.map(|c| c.index), Some(1));
  }

  #[tokio::test(start_paused = true)]
  async fn persisted_best_streak_is_restored() {
    let store = Arc::new(MemoryStore::default());
    store.set(BEST_STREAK, 9).unwrap();
    store.set(ALL_TIME_SOLVED, 120).unwrap();
    let catalog = Arc::new(Catalog::new(seed_problems()));
    let source = ProblemSource::Local(LocalSelector::new(catalog, DEFAULT_SHORTLIST));
    let engine = SessionEngine::new(&EngineConfig::default(), source, store);
    let view = engine.view().await;
    assert_eq!((view.best_streak, view.all_time_solved), (9, 120));
  }
}
