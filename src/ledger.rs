//! Player balance store.
//!
//! Every balance movement goes through the [`Ledger`] trait as an
//! append-only entry, keyed by an idempotency key so a retried
//! settlement never applies twice. The in-memory implementation keeps
//! one account per player inside a `DashMap`; the map entry lock
//! serializes concurrent operations on the same player while leaving
//! different players free to proceed in parallel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::{GameError, GameResult};

/// Why a balance moved. Stored on every entry for audit queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCategory {
    Bet,
    Win,
    Bonus,
    Deposit,
    Withdraw,
    CancelRefund,
}

/// One immutable row in a player's balance history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: String,
    pub player_id: String,
    pub category: EntryCategory,
    /// Positive for credits, negative for debits.
    pub amount: f64,
    pub balance_after: f64,
    pub idempotency_key: String,
    pub timestamp: DateTime<Utc>,
}

/// Balance store seam. Settlement only talks to this trait, so the
/// in-memory store can be swapped for a database-backed one without
/// touching game logic.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current balance. Unknown players are an error, not zero.
    async fn balance(&self, player_id: &str) -> GameResult<f64>;

    /// Atomically deduct `amount` if the balance covers it. Returns the
    /// new balance. A replayed idempotency key returns the balance the
    /// original application produced without moving funds again.
    async fn debit(
        &self,
        player_id: &str,
        amount: f64,
        category: EntryCategory,
        idempotency_key: &str,
    ) -> GameResult<f64>;

    /// Add `amount` to the balance, creating the account if needed for
    /// deposit entries. Same idempotency contract as `debit`.
    async fn credit(
        &self,
        player_id: &str,
        amount: f64,
        category: EntryCategory,
        idempotency_key: &str,
    ) -> GameResult<f64>;

    /// Most recent entries first, at most `limit`.
    async fn history(&self, player_id: &str, limit: usize) -> GameResult<Vec<LedgerEntry>>;
}

#[derive(Debug, Default)]
struct Account {
    balance: f64,
    entries: Vec<LedgerEntry>,
    /// Idempotency key to the balance recorded when it was first applied.
    applied: HashMap<String, f64>,
}

impl Account {
    fn record(
        &mut self,
        player_id: &str,
        category: EntryCategory,
        amount: f64,
        idempotency_key: &str,
    ) -> f64 {
        self.balance += amount;
        self.applied
            .insert(idempotency_key.to_string(), self.balance);
        self.entries.push(LedgerEntry {
            entry_id: Uuid::new_v4().to_string(),
            player_id: player_id.to_string(),
            category,
            amount,
            balance_after: self.balance,
            idempotency_key: idempotency_key.to_string(),
            timestamp: Utc::now(),
        });
        self.balance
    }
}

/// In-memory ledger keyed by player id.
#[derive(Default)]
pub struct MemoryLedger {
    accounts: DashMap<String, Account>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a player with a starting balance. Convenience over a
    /// deposit credit, used at account creation.
    pub async fn create_player(&self, player_id: &str, starting_balance: f64) -> GameResult<f64> {
        self.credit(
            player_id,
            starting_balance,
            EntryCategory::Deposit,
            &format!("create:{}", player_id),
        )
        .await
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn balance(&self, player_id: &str) -> GameResult<f64> {
        self.accounts
            .get(player_id)
            .map(|account| account.balance)
            .ok_or_else(|| GameError::UnknownPlayer(player_id.to_string()))
    }

    async fn debit(
        &self,
        player_id: &str,
        amount: f64,
        category: EntryCategory,
        idempotency_key: &str,
    ) -> GameResult<f64> {
        let mut account = self
            .accounts
            .get_mut(player_id)
            .ok_or_else(|| GameError::UnknownPlayer(player_id.to_string()))?;

        if let Some(&balance_after) = account.applied.get(idempotency_key) {
            return Ok(balance_after);
        }
        if account.balance < amount {
            return Err(GameError::InsufficientFunds {
                balance: account.balance,
                required: amount,
            });
        }
        Ok(account.record(player_id, category, -amount, idempotency_key))
    }

    async fn credit(
        &self,
        player_id: &str,
        amount: f64,
        category: EntryCategory,
        idempotency_key: &str,
    ) -> GameResult<f64> {
        // Deposits may open an account; every other credit targets an
        // account a prior debit already proved exists.
        if !self.accounts.contains_key(player_id) && category != EntryCategory::Deposit {
            return Err(GameError::UnknownPlayer(player_id.to_string()));
        }
        let mut account = self.accounts.entry(player_id.to_string()).or_default();

        if let Some(&balance_after) = account.applied.get(idempotency_key) {
            return Ok(balance_after);
        }
        Ok(account.record(player_id, category, amount, idempotency_key))
    }

    async fn history(&self, player_id: &str, limit: usize) -> GameResult<Vec<LedgerEntry>> {
        let account = self
            .accounts
            .get(player_id)
            .ok_or_else(|| GameError::UnknownPlayer(player_id.to_string()))?;
        Ok(account.entries.iter().rev().take(limit).cloned().collect())
    }
}
