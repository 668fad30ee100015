//! Wager session state machine.
//!
//! A wager moves strictly forward: funds are confirmed before any game
//! state changes, and a settled session never moves again. Multi-step
//! games (mines) park a live session in [`SessionStore`] between
//! requests; one-shot games run the whole machine inside a single
//! settlement call.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{GameError, GameResult};
use crate::games::mines::MinesBoard;
use crate::games::types::GameType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, stake not yet debited.
    Idle,
    /// Stake debit confirmed by the ledger.
    Staked,
    /// Outcome drawn, payout being applied.
    Resolving,
    /// Terminal. Payout (possibly zero) recorded.
    Settled,
    /// A ledger write timed out mid-flight. Operator review required;
    /// no further automatic transitions.
    Unconfirmed,
    /// Crash only: stake debited for a round that has not started.
    QueuedForNextRound,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Staked => "staked",
            SessionState::Resolving => "resolving",
            SessionState::Settled => "settled",
            SessionState::Unconfirmed => "unconfirmed",
            SessionState::QueuedForNextRound => "queued_for_next_round",
        };
        f.write_str(name)
    }
}

/// One wager's identity and lifecycle position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerSession {
    pub wager_id: String,
    pub player_id: String,
    pub game_type: GameType,
    pub stake: f64,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
}

impl WagerSession {
    pub fn new(player_id: &str, game_type: GameType, stake: f64) -> Self {
        Self {
            wager_id: Uuid::new_v4().to_string(),
            player_id: player_id.to_string(),
            game_type,
            stake,
            state: SessionState::Idle,
            created_at: Utc::now(),
        }
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: &[SessionState],
        to: SessionState,
    ) -> GameResult<()> {
        if !from.contains(&self.state) {
            return Err(GameError::InvalidState {
                action,
                state: self.state,
            });
        }
        self.state = to;
        Ok(())
    }

    /// The stake debit landed.
    pub fn confirm_stake(&mut self) -> GameResult<()> {
        self.transition(
            "confirm_stake",
            &[SessionState::Idle, SessionState::QueuedForNextRound],
            SessionState::Staked,
        )
    }

    /// Outcome drawn, hand off to payout.
    pub fn begin_resolve(&mut self) -> GameResult<()> {
        self.transition("begin_resolve", &[SessionState::Staked], SessionState::Resolving)
    }

    /// Payout applied (or confirmed zero).
    pub fn settle(&mut self) -> GameResult<()> {
        self.transition("settle", &[SessionState::Resolving], SessionState::Settled)
    }

    /// Crash pre-bet: stake held for a round that has not started. The
    /// debit may land before or after queueing, so both entry states
    /// are legal.
    pub fn queue_for_next_round(&mut self) -> GameResult<()> {
        self.transition(
            "queue_for_next_round",
            &[SessionState::Idle, SessionState::Staked],
            SessionState::QueuedForNextRound,
        )
    }

    /// A ledger write timed out. Reachable from any non-terminal state;
    /// nothing automatic moves the session afterwards.
    pub fn mark_unconfirmed(&mut self) -> GameResult<()> {
        self.transition(
            "mark_unconfirmed",
            &[
                SessionState::Idle,
                SessionState::Staked,
                SessionState::Resolving,
                SessionState::QueuedForNextRound,
            ],
            SessionState::Unconfirmed,
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, SessionState::Settled | SessionState::Unconfirmed)
    }
}

/// A mines game parked between reveal requests.
pub struct MinesSession {
    pub session: WagerSession,
    pub board: MinesBoard,
}

/// Live multi-step sessions, keyed by wager id.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, MinesSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: MinesSession) {
        self.sessions
            .insert(session.session.wager_id.clone(), session);
    }

    /// Run `f` against a live session under the entry lock, so two
    /// reveal requests for the same board cannot interleave.
    pub fn with_session<R>(
        &self,
        wager_id: &str,
        f: impl FnOnce(&mut MinesSession) -> GameResult<R>,
    ) -> GameResult<R> {
        let mut entry = self
            .sessions
            .get_mut(wager_id)
            .ok_or_else(|| GameError::UnknownSession(wager_id.to_string()))?;
        f(entry.value_mut())
    }

    pub fn remove(&self, wager_id: &str) -> Option<MinesSession> {
        self.sessions.remove(wager_id).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
