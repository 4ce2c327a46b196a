//! HTTP handlers and the WebSocket leaderboard transport.

use axum::{
    Json,
    extract::{
        Multipart, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::carbon;
use crate::error::{AppError, AppResult};
use crate::events::NewEvent;
use crate::leaderboard::{DEFAULT_CHALLENGE, DEFAULT_POINTS, LeaderboardUpdate};
use crate::state::SharedState;
use crate::trivia::SaveScore;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let redis = if state.coordinator.has_cache() {
        "connected"
    } else {
        "disconnected"
    };
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "services": {
            "database": "connected",
            "redis": redis,
        },
    }))
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

pub async fn get_events_handler(State(state): State<SharedState>) -> AppResult<impl IntoResponse> {
    let events = state.events.list().await?;
    Ok(Json(json!({
        "success": true,
        "data": events,
        "count": events.len(),
    })))
}

pub async fn create_event_handler(
    State(state): State<SharedState>,
    Json(payload): Json<NewEvent>,
) -> AppResult<impl IntoResponse> {
    let event = state.events.create(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": event,
            "message": "Event created successfully",
        })),
    ))
}

// ---------------------------------------------------------------------------
// Carbon calculator
// ---------------------------------------------------------------------------

pub async fn calculate_carbon_handler(Json(payload): Json<Value>) -> AppResult<impl IntoResponse> {
    let data = payload
        .as_object()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::Validation("No data provided".to_owned()))?;

    let report = carbon::calculate(data);
    Ok(Json(json!({
        "success": true,
        "data": report,
    })))
}

// ---------------------------------------------------------------------------
// Image classification proxy
// ---------------------------------------------------------------------------

pub async fn classify_handler(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_owned();
        if filename.is_empty() {
            return Err(AppError::Validation("No image file selected".to_owned()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?;

        let classification = state.classifier.classify(bytes.to_vec(), filename).await;
        return Ok(Json(json!({
            "success": true,
            "data": classification,
        })));
    }

    Err(AppError::Validation("No image file provided".to_owned()))
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    pub n: Option<usize>,
}

pub async fn leaderboard_handler(
    State(state): State<SharedState>,
    Query(params): Query<LeaderboardParams>,
) -> AppResult<impl IntoResponse> {
    let n = params.n.unwrap_or(state.config.leaderboard_size);
    let leaderboard = state.coordinator.leaderboard(n).await?;
    Ok(Json(json!({
        "success": true,
        "data": leaderboard,
        "timestamp": Utc::now(),
    })))
}

// ---------------------------------------------------------------------------
// Trivia
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TriviaQuery {
    pub count: Option<usize>,
    pub difficulty: Option<String>,
    pub category: Option<String>,
}

pub async fn trivia_questions_handler(
    State(state): State<SharedState>,
    Query(params): Query<TriviaQuery>,
) -> impl IntoResponse {
    let questions = state.trivia.questions(
        params.count.unwrap_or(10),
        params.difficulty.as_deref().unwrap_or("all"),
        params.category.as_deref().unwrap_or("all"),
    );
    Json(json!({
        "success": true,
        "questions": questions,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswer {
    pub question_id: Option<u32>,
    pub answer: Option<String>,
}

pub async fn trivia_submit_handler(
    State(state): State<SharedState>,
    Json(payload): Json<SubmitAnswer>,
) -> AppResult<impl IntoResponse> {
    let question_id = payload
        .question_id
        .ok_or_else(|| AppError::Validation("Missing required field: question_id".to_owned()))?;
    let answer = payload
        .answer
        .ok_or_else(|| AppError::Validation("Missing required field: answer".to_owned()))?;

    let result = state.trivia.submit_answer(question_id, &answer)?;
    Ok(Json(json!({
        "success": true,
        "correct": result.correct,
        "correct_answer": result.correct_answer,
        "points_earned": result.points_earned,
        "explanation": result.explanation,
        "question": result.question,
    })))
}

pub async fn trivia_save_score_handler(
    State(state): State<SharedState>,
    Json(payload): Json<SaveScore>,
) -> AppResult<impl IntoResponse> {
    let session_id = state.trivia.save_score(payload).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Score saved successfully",
        "session_id": session_id,
    })))
}

pub async fn trivia_leaderboard_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let leaderboard = state.trivia.leaderboard().await;
    Json(json!({
        "success": true,
        "leaderboard": leaderboard,
    }))
}

pub async fn trivia_stats_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let stats = state.trivia.stats().await;
    Json(json!({
        "success": true,
        "stats": stats,
    }))
}

// ---------------------------------------------------------------------------
// Push tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct FcmToken {
    pub token: Option<String>,
    #[serde(rename = "userEmail")]
    pub user_email: Option<String>,
}

pub async fn save_fcm_token_handler(
    State(state): State<SharedState>,
    Json(payload): Json<FcmToken>,
) -> AppResult<impl IntoResponse> {
    let token = payload
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("Missing required field: token".to_owned()))?;
    let email = payload
        .user_email
        .unwrap_or_else(|| "user@example.com".to_owned());

    state.notifier.register_token(&token, &email);
    Ok(Json(json!({
        "success": true,
        "message": "FCM token saved successfully",
    })))
}

// ---------------------------------------------------------------------------
// WebSocket leaderboard transport
// ---------------------------------------------------------------------------

/// Messages a connected client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum ClientMessage {
    CompleteChallenge {
        username: String,
        #[serde(default)]
        points: Option<i64>,
        #[serde(default)]
        challenge_name: Option<String>,
    },
    JoinLeaderboard,
}

/// Messages the server pushes to a client.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum ServerMessage {
    ConnectionResponse {
        status: String,
    },
    LeaderboardUpdate(LeaderboardUpdate),
    ChallengeCompleted {
        success: bool,
        username: String,
        points_earned: i64,
        challenge_name: String,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One socket is one observer: subscribed to the hub for the lifetime of the
/// connection, unsubscribed by dropping the receiver on disconnect.
async fn handle_socket(socket: WebSocket, state: SharedState) {
    info!("Client connected to leaderboard stream");
    let (mut sink, mut stream) = socket.split();

    if send_message(
        &mut sink,
        &ServerMessage::ConnectionResponse {
            status: "Connected to EcoSage backend".to_owned(),
        },
    )
    .await
    .is_err()
    {
        return;
    }

    let mut updates = state.hub.subscribe();

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => {
                    if send_message(&mut sink, &ServerMessage::LeaderboardUpdate(update))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Observer lagging, {skipped} leaderboard updates dropped");
                }
                Err(RecvError::Closed) => break,
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if handle_client_message(&mut sink, &state, text.as_str())
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("WebSocket receive error: {e}");
                    break;
                }
            },
        }
    }

    info!("Client disconnected from leaderboard stream");
}

async fn handle_client_message(
    sink: &mut SplitSink<WebSocket, Message>,
    state: &SharedState,
    text: &str,
) -> Result<(), axum::Error> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(_) => {
            return send_message(
                sink,
                &ServerMessage::Error {
                    message: "Unrecognized message".to_owned(),
                    error: None,
                },
            )
            .await;
        }
    };

    match message {
        ClientMessage::CompleteChallenge {
            username,
            points,
            challenge_name,
        } => {
            match state
                .coordinator
                .complete_challenge(&username, points, challenge_name)
                .await
            {
                Ok(update) => {
                    state.notifier.push_leaderboard(&update);
                    let ack = ServerMessage::ChallengeCompleted {
                        success: true,
                        username,
                        points_earned: update.points_earned.unwrap_or(DEFAULT_POINTS),
                        challenge_name: update
                            .challenge_name
                            .clone()
                            .unwrap_or_else(|| DEFAULT_CHALLENGE.to_owned()),
                    };
                    send_message(sink, &ack).await
                }
                Err(AppError::Validation(message)) => {
                    send_message(sink, &ServerMessage::Error { message, error: None }).await
                }
                Err(e) => {
                    send_message(
                        sink,
                        &ServerMessage::Error {
                            message: "Failed to complete challenge".to_owned(),
                            error: Some(e.to_string()),
                        },
                    )
                    .await
                }
            }
        }
        ClientMessage::JoinLeaderboard => match state.coordinator.join().await {
            Ok(update) => send_message(sink, &ServerMessage::LeaderboardUpdate(update)).await,
            Err(e) => {
                send_message(
                    sink,
                    &ServerMessage::Error {
                        message: "Failed to join leaderboard".to_owned(),
                        error: Some(e.to_string()),
                    },
                )
                .await
            }
        },
    }
}

async fn send_message(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(message).expect("server message serialization");
    sink.send(Message::Text(payload.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_challenge_with_defaults() {
        let message: ClientMessage = serde_json::from_str(
            r#"{"event": "complete_challenge", "data": {"username": "alice"}}"#,
        )
        .unwrap();
        match message {
            ClientMessage::CompleteChallenge {
                username,
                points,
                challenge_name,
            } => {
                assert_eq!(username, "alice");
                assert!(points.is_none());
                assert!(challenge_name.is_none());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn parses_join_leaderboard_without_data() {
        let message: ClientMessage =
            serde_json::from_str(r#"{"event": "join_leaderboard"}"#).unwrap();
        assert!(matches!(message, ClientMessage::JoinLeaderboard));
    }

    #[test]
    fn server_messages_tag_event_and_data() {
        let ack = ServerMessage::ChallengeCompleted {
            success: true,
            username: "alice".to_owned(),
            points_earned: 10,
            challenge_name: "Recycling Sprint".to_owned(),
        };
        let value = serde_json::to_value(&ack).unwrap();
        assert_eq!(value["event"], "challenge_completed");
        assert_eq!(value["data"]["points_earned"], 10);
    }

    #[test]
    fn error_without_detail_omits_the_field() {
        let error = ServerMessage::Error {
            message: "Username is required".to_owned(),
            error: None,
        };
        let value = serde_json::to_value(&error).unwrap();
        assert!(value["data"].get("error").is_none());
    }
}
