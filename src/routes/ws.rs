//! WebSocket upgrade + session loop. Each connection owns one `SessionEngine`.
//! Client messages are parsed as JSON and forwarded to the engine; every state
//! change (including countdown ticks) is pushed back as a `state` message.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::engine::SessionEngine;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "rapidfamat_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn send_json(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "rapidfamat_backend", "WebSocket connected");
  let engine = state.new_session();
  let mut updates = engine.subscribe();
  engine.start().await;

  let initial = ServerWsMessage::State { session: updates.borrow_and_update().clone() };
  if send_json(&mut socket, &initial).await.is_err() {
    return;
  }

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => {
                debug!(target: "rapidfamat_backend", "WS received: {:?}", &incoming);
                handle_client_ws(incoming, &engine).await
              }
              Err(e) => Some(ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }),
            };
            if let Some(reply) = reply {
              if let Err(e) = send_json(&mut socket, &reply).await {
                error!(target: "rapidfamat_backend", error = %e, "WS send error");
                break;
              }
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
      changed = updates.changed() => {
        if changed.is_err() { break; }
        let session = updates.borrow_and_update().clone();
        if let Err(e) = send_json(&mut socket, &ServerWsMessage::State { session }).await {
          error!(target: "rapidfamat_backend", error = %e, "WS send error");
          break;
        }
      }
    }
  }
  info!(target: "rapidfamat_backend", "WebSocket disconnected");
}

/// Returns the direct reply, if any. State changes are pushed separately.
#[instrument(level = "info", skip(engine))]
async fn handle_client_ws(msg: ClientWsMessage, engine: &Arc<SessionEngine>) -> Option<ServerWsMessage> {
  match msg {
    ClientWsMessage::Ping => Some(ServerWsMessage::Pong),

    ClientWsMessage::GetState => Some(ServerWsMessage::State { session: engine.view().await }),

    ClientWsMessage::EnterMode { mode } => {
      engine.enter_mode(mode).await;
      None
    }

    ClientWsMessage::SetRound { round } => match engine.set_round(round).await {
      Ok(()) => None,
      Err(reason) => Some(ServerWsMessage::Rejected { reason, message: reason.to_string() }),
    },

    ClientWsMessage::SubmitAnswer { answer } => match engine.submit(&answer).await {
      Ok(out) => {
        tracing::info!(target: "session", correct = out.correct, rating = out.rating, "WS submit_answer evaluated");
        Some(ServerWsMessage::AnswerResult {
          correct: out.correct,
          expected: out.expected,
          explanation: out.explanation,
          rating: out.rating,
          next: out.next,
        })
      }
      Err(reason) => Some(ServerWsMessage::Rejected { reason, message: reason.to_string() }),
    },

    ClientWsMessage::NextProblem => match engine.next_problem().await {
      Ok(()) => None,
      Err(reason) => Some(ServerWsMessage::Rejected { reason, message: reason.to_string() }),
    },

    ClientWsMessage::SetDarkMode { enabled } => {
      engine.set_dark_mode(enabled).await;
      None
    }
  }
}
