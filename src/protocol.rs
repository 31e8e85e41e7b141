//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Mode, ProblemRecord, Round, RoundFilter};
use crate::session::{FeedbackKind, NextStep, Rejection, Review};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetState,
    EnterMode {
        mode: Mode,
    },
    SetRound {
        round: RoundFilter,
    },
    SubmitAnswer {
        answer: String,
    },
    NextProblem,
    SetDarkMode {
        enabled: bool,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    State {
        session: SessionView,
    },
    AnswerResult {
        correct: bool,
        expected: String,
        explanation: String,
        rating: i32,
        next: NextStep,
    },
    Rejected {
        reason: Rejection,
        message: String,
    },
    Error {
        message: String,
    },
}

/// Problem as shown during a session. The answer stays on the server.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProblemCard {
    pub id: String,
    pub year: u16,
    pub round: Round,
    pub number: u16,
    pub statement: String,
    pub estimated_solve_time_sec: u32,
    pub difficulty: u8,
    pub topics: Vec<String>,
}

impl From<&ProblemRecord> for ProblemCard {
    fn from(p: &ProblemRecord) -> Self {
        Self {
            id: p.id.clone(),
            year: p.year,
            round: p.round,
            number: p.number,
            statement: p.statement.clone(),
            estimated_solve_time_sec: p.estimated_solve_time_sec,
            difficulty: p.difficulty,
            topics: p.topics.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    pub remaining_seconds: u32,
    pub display: String,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SprintView {
    pub correct_count: u32,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContestView {
    pub index: u32,
    /// 1-based problem number shown to the user.
    pub position: u32,
    pub length: u32,
    pub correct_count: u32,
    pub score: u32,
    pub complete: bool,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct FeedbackView {
    pub kind: FeedbackKind,
    pub text: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TopicRow {
    pub topic: String,
    pub correct: u32,
    pub total: u32,
    pub percent: u32,
}

/// Full session snapshot pushed to the client after every change.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub mode: Mode,
    pub round: RoundFilter,
    pub rating: i32,
    pub desired_difficulty: u8,
    pub current_streak: u32,
    pub session_streak: u32,
    pub best_streak: u32,
    pub all_time_solved: u64,
    pub dark_mode: bool,
    pub problem: Option<ProblemCard>,
    pub loading: bool,
    pub can_submit: bool,
    pub timer: Option<TimerView>,
    pub sprint: Option<SprintView>,
    pub contest: Option<ContestView>,
    pub feedback: Option<FeedbackView>,
    pub review: Option<Review>,
    pub fetch_error: Option<String>,
    pub topics: Vec<TopicRow>,
}

//
// HTTP request/response DTOs
//

/// Selector query. Everything is optional and parsed leniently.
#[derive(Debug, Default, Deserialize)]
pub struct ProblemQuery {
    pub exclude: Option<String>,
    pub round: Option<String>,
    pub rating: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProblemOut {
    pub problem: ProblemRecord,
}

#[derive(Serialize)]
pub struct RoundsOut {
    pub rounds: Vec<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsOut {
    pub best_streak: u32,
    pub all_time_solved: u64,
    pub dark_mode: bool,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub problems: usize,
    pub source: &'static str,
}
