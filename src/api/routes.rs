//! Route definitions.
//!
//! Maps URLs to handlers with type-safe routing.

use super::{handlers::*, websocket::websocket_handler};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // One-shot games
        .route("/api/dice/play", post(play_dice))
        .route("/api/coinflip/play", post(play_coinflip))
        .route("/api/slots/play", post(play_slots))
        // Mines sessions
        .route("/api/mines/start", post(start_mines))
        .route("/api/mines/:wager_id/reveal", post(reveal_mines))
        .route("/api/mines/:wager_id/cashout", post(cashout_mines))
        // Crash rounds
        .route("/api/crash/bet", post(crash_bet))
        .route("/api/crash/cancel", post(crash_cancel))
        .route("/api/crash/cashout", post(crash_cashout))
        .route("/api/crash/round", get(crash_round))
        .route("/api/crash/history", get(crash_history))
        // Balances and audit
        .route("/api/balance/:player_id", get(balance))
        .route("/api/balance/:player_id/deposit", post(deposit))
        .route("/api/player/:player_id/history", get(player_history))
        // Real-time event feed
        .route("/ws", get(websocket_handler))
        // Operational endpoints
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}
