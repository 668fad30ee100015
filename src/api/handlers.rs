//! Request handlers.
//!
//! Handlers validate the claimed identity, hand the request to the
//! settlement engine or crash scheduler, and translate engine errors
//! into the wire taxonomy. Every response carries the request id that
//! shows up in the logs.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::errors::ApiError;
use crate::games::types::{CoinChoice, DiceChoice, SettledWager, SlotVariant};
use crate::identity::Identity;
use crate::ledger::{EntryCategory, LedgerEntry};
use crate::metrics::METRICS;
use crate::round::{CrashBetReceipt, CrashScheduler, RoundRecord, RoundStatus};
use crate::settlement::{MinesReveal, MinesStarted, SettlementEngine};

pub struct AppState {
    pub engine: Arc<SettlementEngine>,
    pub scheduler: Arc<CrashScheduler>,
    pub identity: Arc<dyn Identity>,
}

fn request_id() -> String {
    Uuid::new_v4().to_string()
}

impl AppState {
    fn player(&self, claimed: &str, request_id: &str) -> Result<String, ApiError> {
        self.identity
            .current_player(claimed)
            .map_err(|e| ApiError::from_game_error(request_id.to_string(), e))
    }
}

#[derive(Debug, Deserialize)]
pub struct DiceRequest {
    pub player_id: String,
    pub stake: f64,
    pub choice: DiceChoice,
}

#[derive(Debug, Deserialize)]
pub struct CoinFlipRequest {
    pub player_id: String,
    pub stake: f64,
    pub choice: CoinChoice,
}

#[derive(Debug, Deserialize)]
pub struct SlotsRequest {
    pub player_id: String,
    pub stake: f64,
    pub variant: SlotVariant,
}

#[derive(Debug, Deserialize)]
pub struct MinesStartRequest {
    pub player_id: String,
    pub stake: f64,
    pub mine_count: u8,
}

#[derive(Debug, Deserialize)]
pub struct MinesRevealRequest {
    pub player_id: String,
    pub cell: u8,
}

#[derive(Debug, Deserialize)]
pub struct MinesCashoutRequest {
    pub player_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CrashBetRequest {
    pub player_id: String,
    pub stake: f64,
    #[serde(default)]
    pub auto_cashout: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CrashCancelRequest {
    pub player_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CrashCashoutRequest {
    pub player_id: String,
    pub round_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub player_id: String,
    pub balance: f64,
}

pub async fn play_dice(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DiceRequest>,
) -> Result<Json<SettledWager>, ApiError> {
    let rid = request_id();
    let player = state.player(&req.player_id, &rid)?;
    state
        .engine
        .play_dice(&player, req.stake, req.choice)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_game_error(rid, e))
}

pub async fn play_coinflip(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CoinFlipRequest>,
) -> Result<Json<SettledWager>, ApiError> {
    let rid = request_id();
    let player = state.player(&req.player_id, &rid)?;
    state
        .engine
        .play_coinflip(&player, req.stake, req.choice)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_game_error(rid, e))
}

pub async fn play_slots(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SlotsRequest>,
) -> Result<Json<SettledWager>, ApiError> {
    let rid = request_id();
    let player = state.player(&req.player_id, &rid)?;
    state
        .engine
        .play_slots(&player, req.stake, req.variant)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_game_error(rid, e))
}

pub async fn start_mines(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MinesStartRequest>,
) -> Result<Json<MinesStarted>, ApiError> {
    let rid = request_id();
    let player = state.player(&req.player_id, &rid)?;
    state
        .engine
        .start_mines(&player, req.stake, req.mine_count)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_game_error(rid, e))
}

pub async fn reveal_mines(
    State(state): State<Arc<AppState>>,
    Path(wager_id): Path<String>,
    Json(req): Json<MinesRevealRequest>,
) -> Result<Json<MinesReveal>, ApiError> {
    let rid = request_id();
    let player = state.player(&req.player_id, &rid)?;
    state
        .engine
        .reveal_mines(&player, &wager_id, req.cell)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_game_error(rid, e))
}

pub async fn cashout_mines(
    State(state): State<Arc<AppState>>,
    Path(wager_id): Path<String>,
    Json(req): Json<MinesCashoutRequest>,
) -> Result<Json<SettledWager>, ApiError> {
    let rid = request_id();
    let player = state.player(&req.player_id, &rid)?;
    state
        .engine
        .cashout_mines(&player, &wager_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_game_error(rid, e))
}

pub async fn crash_bet(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CrashBetRequest>,
) -> Result<Json<CrashBetReceipt>, ApiError> {
    let rid = request_id();
    let player = state.player(&req.player_id, &rid)?;
    state
        .scheduler
        .place_bet(&player, req.stake, req.auto_cashout)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_game_error(rid, e))
}

pub async fn crash_cancel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CrashCancelRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let rid = request_id();
    let player = state.player(&req.player_id, &rid)?;
    state
        .scheduler
        .cancel_bet(&player)
        .await
        .map(|balance| {
            Json(BalanceResponse {
                player_id: player,
                balance,
            })
        })
        .map_err(|e| ApiError::from_game_error(rid, e))
}

pub async fn crash_cashout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CrashCashoutRequest>,
) -> Result<Json<SettledWager>, ApiError> {
    let rid = request_id();
    let player = state.player(&req.player_id, &rid)?;
    state
        .scheduler
        .cash_out(&player, req.round_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_game_error(rid, e))
}

pub async fn crash_round(State(state): State<Arc<AppState>>) -> Json<RoundStatus> {
    Json(state.scheduler.status().await)
}

pub async fn crash_history(State(state): State<Arc<AppState>>) -> Json<Vec<RoundRecord>> {
    Json(state.scheduler.history().await)
}

pub async fn balance(
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let rid = request_id();
    state
        .engine
        .ledger()
        .balance(&player_id)
        .await
        .map(|balance| Json(BalanceResponse { player_id, balance }))
        .map_err(|e| ApiError::from_game_error(rid, e))
}

pub async fn deposit(
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<String>,
    Json(req): Json<DepositRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let rid = request_id();
    if req.amount <= 0.0 || !req.amount.is_finite() {
        return Err(ApiError::bad_request(
            rid,
            format!("deposit amount {} must be positive", req.amount),
        ));
    }
    let key = format!("deposit:{}", Uuid::new_v4());
    state
        .engine
        .ledger()
        .credit(&player_id, req.amount, EntryCategory::Deposit, &key)
        .await
        .map(|balance| Json(BalanceResponse { player_id, balance }))
        .map_err(|e| ApiError::from_game_error(rid, e))
}

pub async fn player_history(
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    let rid = request_id();
    state
        .engine
        .ledger()
        .history(&player_id, query.limit.min(500))
        .await
        .map(Json)
        .map_err(|e| ApiError::from_game_error(rid, e))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub outcome_public_key: String,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        outcome_public_key: state.engine.outcome_public_key(),
    })
}

pub async fn metrics() -> String {
    METRICS.gather()
}
