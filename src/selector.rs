//! Problem selection: nearest-difficulty shortlist with a random pick.
//!
//! `ProblemSource` is the seam the session engine talks to. It is either the
//! in-process catalog or a remote instance of this service reached over
//! `GET /api/problems`.

use std::{collections::HashSet, sync::Arc, time::Duration};

use rand::{seq::SliceRandom, Rng};
use tracing::{debug, instrument, warn};

use crate::catalog::Catalog;
use crate::domain::{ProblemRecord, RoundFilter};
use crate::error::FetchError;
use crate::exclusion::join_exclude;
use crate::protocol::ProblemOut;

pub const DEFAULT_SHORTLIST: usize = 6;

/// Map a rating to the difficulty we aim for: 1000 -> 2, one step per 120 points, clamped to 1..=10.
pub fn desired_difficulty(rating: i32) -> u8 {
  let steps = ((rating as f64 - 1000.0) / 120.0 + 0.5).floor() as i64;
  (steps + 2).clamp(1, 10) as u8
}

/// Choose one record for `rating` among those matching `round`.
///
/// Records in `exclude` are skipped unless that leaves nothing,
/// in which case exclusion is ignored. Returns `None` only when the round itself is empty.
pub fn pick<R: Rng + ?Sized>(
  catalog: &Catalog,
  rating: i32,
  round: RoundFilter,
  exclude: &HashSet<String>,
  shortlist_size: usize,
  rng: &mut R,
) -> Option<ProblemRecord> {
  let desired = desired_difficulty(rating) as i32;

  let in_round = catalog.find_filtered(round);
  let mut pool: Vec<&ProblemRecord> = in_round
    .iter()
    .copied()
    .filter(|p| !exclude.contains(&p.id))
    .collect();

  if pool.is_empty() {
    debug!(target: "selector", %round, excluded = exclude.len(), "Exclusion covers the round; ignoring it");
    pool = in_round;
  }

  // Stable: equal distances keep catalog order.
  pool.sort_by_key(|p| (p.difficulty as i32 - desired).abs());
  pool.truncate(shortlist_size.max(1));
  pool.choose(rng).map(|p| (*p).clone())
}

/// Parameters of one selector call.
#[derive(Clone, Debug, PartialEq)]
pub struct PickRequest {
  pub rating: i32,
  pub round: RoundFilter,
  pub exclude: HashSet<String>,
}

#[derive(Clone, Debug)]
pub struct LocalSelector {
  pub catalog: Arc<Catalog>,
  pub shortlist_size: usize,
}

impl LocalSelector {
  pub fn new(catalog: Arc<Catalog>, shortlist_size: usize) -> Self {
    Self { catalog, shortlist_size }
  }

  pub fn pick(&self, req: &PickRequest) -> Result<ProblemRecord, FetchError> {
    pick(
      &self.catalog,
      req.rating,
      req.round,
      &req.exclude,
      self.shortlist_size,
      &mut rand::thread_rng(),
    )
    .ok_or_else(|| FetchError::Empty(req.round.to_string()))
  }
}

/// Selector reached over HTTP (another instance of this backend).
#[derive(Clone, Debug)]
pub struct RemoteSelector {
  pub client: reqwest::Client,
  pub base_url: String,
}

impl RemoteSelector {
  /// Construct the client if SELECTOR_URL is set; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let base_url = std::env::var("SELECTOR_URL").ok()?;
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(5))
      .build()
      .ok()?;
    Some(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
  }

  #[instrument(level = "debug", skip(self, req), fields(rating = req.rating, round = %req.round))]
  pub async fn pick(&self, req: &PickRequest) -> Result<ProblemRecord, FetchError> {
    let resp = self
      .client
      .get(format!("{}/api/problems", self.base_url))
      .query(&[
        ("exclude", join_exclude(&req.exclude)),
        ("round", req.round.to_string()),
        ("rating", req.rating.to_string()),
      ])
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      warn!(target: "selector", status = status.as_u16(), "Remote selector returned an error status");
      return Err(FetchError::Status(status.as_u16()));
    }
    let body = resp
      .json::<ProblemOut>()
      .await
      .map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(body.problem)
  }
}

/// Where the session engine gets its problems from.
#[derive(Clone, Debug)]
pub enum ProblemSource {
  Local(LocalSelector),
  Remote(RemoteSelector),
}

impl ProblemSource {
  pub async fn fetch(&self, req: &PickRequest) -> Result<ProblemRecord, FetchError> {
    match self {
      ProblemSource::Local(sel) => sel.pick(req),
      ProblemSource::Remote(sel) => sel.pick(req).await,
    }
  }

  pub fn describe(&self) -> &'static str {
    match self {
      ProblemSource::Local(_) => "local",
      ProblemSource::Remote(_) => "remote",
    }
  }
}
