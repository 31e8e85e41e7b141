//! Adaptive problem selection and session progression for RapidFAMAT drills.
//!
//! Leaf-first: `catalog` holds problems, `selector` picks one for a rating,
//! `session` advances streaks/rating/mode counters, `engine` drives a session
//! with timers, and `routes` exposes it over HTTP and WebSocket.

pub mod telemetry;
pub mod error;
pub mod domain;
pub mod config;
pub mod seeds;
pub mod catalog;
pub mod evaluator;
pub mod exclusion;
pub mod selector;
pub mod store;
pub mod session;
pub mod engine;
pub mod state;
pub mod protocol;
pub mod routes;
