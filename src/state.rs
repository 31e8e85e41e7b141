//! Application state shared by every handler.
//!
//! This module owns:
//!   - the validated problem catalog (TOML bank + built-in seeds)
//!   - the problem source sessions draw from (local catalog or remote selector)
//!   - the persisted scalar store
//!   - engine rules from configuration
//!
//! Each WebSocket connection gets its own `SessionEngine` built from these parts.

use std::sync::Arc;

use rand::thread_rng;
use tracing::{info, instrument, warn};

use crate::catalog::Catalog;
use crate::config::{load_app_config_from_env, AppConfig, EngineConfig};
use crate::domain::{ProblemRecord, RoundFilter};
use crate::engine::SessionEngine;
use crate::error::CatalogError;
use crate::exclusion::parse_exclude;
use crate::protocol::ProblemQuery;
use crate::seeds::seed_problems;
use crate::selector::{pick, LocalSelector, ProblemSource, RemoteSelector};
use crate::store::{store_from_env, ScalarStore};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub source: ProblemSource,
    pub store: Arc<dyn ScalarStore>,
    pub rules: EngineConfig,
}

impl AppState {
    /// Build state from env: load config, merge and validate the catalog, pick the problem source.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Result<Self, CatalogError> {
        let cfg = load_app_config_from_env().unwrap_or_default();
        let store: Arc<dyn ScalarStore> = Arc::from(store_from_env());
        let state = Self::from_parts(cfg, store, RemoteSelector::from_env())?;

        match &state.source {
            ProblemSource::Remote(r) => {
                info!(target: "rapidfamat_backend", base_url = %r.base_url, "Sessions use the remote selector.")
            }
            ProblemSource::Local(_) => {
                info!(target: "rapidfamat_backend", "Sessions use the local catalog (no SELECTOR_URL).")
            }
        }
        Ok(state)
    }

    pub fn from_parts(
        cfg: AppConfig,
        store: Arc<dyn ScalarStore>,
        remote: Option<RemoteSelector>,
    ) -> Result<Self, CatalogError> {
        let catalog = Arc::new(Catalog::from_sources(&cfg.problems, seed_problems()));
        catalog.validate()?;
        info!(target: "rapidfamat_backend", problems = catalog.len(), "Catalog validated");

        let rules = cfg.engine;
        let source = match remote {
            Some(r) => ProblemSource::Remote(r),
            None => ProblemSource::Local(LocalSelector::new(catalog.clone(), rules.shortlist_size)),
        };
        Ok(Self { catalog, source, store, rules })
    }

    /// Fresh session engine for one client.
    pub fn new_session(&self) -> Arc<SessionEngine> {
        SessionEngine::new(&self.rules, self.source.clone(), self.store.clone())
    }

    /// Selector endpoint: lenient parsing, always answered from the local catalog.
    #[instrument(level = "debug", skip(self, q))]
    pub fn pick_for_query(&self, q: &ProblemQuery) -> Option<ProblemRecord> {
        let exclude = parse_exclude(q.exclude.as_deref().unwrap_or(""));
        let round = RoundFilter::parse_lenient(q.round.as_deref().unwrap_or("All"));
        let rating = q
            .rating
            .as_deref()
            .and_then(|r| r.trim().parse::<f64>().ok())
            .filter(|r| r.is_finite())
            .map(|r| r.round() as i32)
            .unwrap_or(self.rules.initial_rating);

        let picked = pick(
            &self.catalog,
            rating,
            round,
            &exclude,
            self.rules.shortlist_size,
            &mut thread_rng(),
        );
        if picked.is_none() {
            warn!(target: "selector", %round, "Round has no problems; catalog misconfigured");
        }
        picked
    }
}
