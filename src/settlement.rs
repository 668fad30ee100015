//! Settlement orchestrator.
//!
//! Every wager follows the same spine: validate the stake, debit it and
//! wait for ledger confirmation, draw a verifiable outcome, score it,
//! credit any winnings, and only then report the wager settled. A
//! ledger write that times out leaves the wager unconfirmed instead of
//! guessed at.
//!
//! One-shot games (dice, coinflip, slots) run the whole spine in a
//! single call. Mines parks a live board in the session store and
//! finishes the spine on cash-out or mine hit. Crash delegates its
//! timing to `round.rs` but settles through the helpers here.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::{BetLimits, CasinoConfig};
use crate::errors::{ConfigError, GameError, GameResult};
use crate::events::{CasinoEvent, EventBus};
use crate::games::rng::{DrawBundle, OutcomeSource};
use crate::games::types::{
    CoinChoice, DiceChoice, GameData, GameOutcome, GameType, SettledWager, SlotVariant,
};
use crate::games::{coinflip, dice, mines, slots};
use crate::ledger::{EntryCategory, Ledger};
use crate::metrics::METRICS;
use crate::session::{MinesSession, SessionStore, WagerSession};

/// Response to opening a mines board. The mine positions stay server
/// side until the board is terminal.
#[derive(Debug, Clone, Serialize)]
pub struct MinesStarted {
    pub wager_id: String,
    pub player_id: String,
    pub stake: f64,
    pub mine_count: u8,
    pub multiplier_track: Vec<f64>,
    pub new_balance: f64,
}

/// Response to a mines reveal.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MinesReveal {
    /// Safe cell, board still live.
    Safe {
        wager_id: String,
        cell: u8,
        step: usize,
        multiplier: f64,
        potential_payout: f64,
    },
    /// Board finished, either by mine hit or by clearing every safe cell.
    Settled(Box<SettledWager>),
}

pub struct SettlementEngine {
    config: Arc<CasinoConfig>,
    ledger: Arc<dyn Ledger>,
    outcomes: Arc<dyn OutcomeSource>,
    sessions: SessionStore,
    events: EventBus,
}

impl SettlementEngine {
    pub fn new(
        config: Arc<CasinoConfig>,
        ledger: Arc<dyn Ledger>,
        outcomes: Arc<dyn OutcomeSource>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            ledger,
            outcomes,
            sessions: SessionStore::new(),
            events,
        }
    }

    pub fn config(&self) -> &CasinoConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn outcome_public_key(&self) -> String {
        self.outcomes.public_key_hex()
    }

    /// Raw access to the outcome source for the crash scheduler, which
    /// draws per round rather than per wager.
    pub fn draw_for(
        &self,
        wager_id: &str,
        game_type: GameType,
        player_id: &str,
        additional_data: &str,
    ) -> Result<DrawBundle, String> {
        self.outcomes
            .draw(wager_id, game_type, player_id, additional_data)
    }

    fn limits_for(&self, game: GameType) -> &BetLimits {
        match game {
            GameType::Dice => &self.config.dice,
            GameType::CoinFlip => &self.config.coinflip,
            GameType::Mines => &self.config.mines.limits,
            GameType::Slots => &self.config.slots.limits,
            GameType::Crash => &self.config.crash.limits,
        }
    }

    pub fn check_stake(&self, game: GameType, stake: f64) -> GameResult<()> {
        let limits = self.limits_for(game);
        if !limits.contains(stake) {
            METRICS
                .wagers_rejected
                .with_label_values(&["invalid_stake"])
                .inc();
            return Err(GameError::InvalidStake {
                amount: stake,
                min: limits.min_bet,
                max: limits.max_bet,
            });
        }
        Ok(())
    }

    /// Debit the stake and confirm the session. A timeout freezes the
    /// session as unconfirmed so it is never silently retried.
    pub async fn confirm_debit(&self, session: &mut WagerSession) -> GameResult<f64> {
        let key = format!("{}:bet", session.wager_id);
        let write = self.ledger.debit(
            &session.player_id,
            session.stake,
            EntryCategory::Bet,
            &key,
        );
        match timeout(self.config.ledger.write_timeout(), write).await {
            Ok(Ok(balance)) => {
                session.confirm_stake()?;
                self.events.publish(CasinoEvent::BalanceChanged {
                    player_id: session.player_id.clone(),
                    balance,
                });
                Ok(balance)
            }
            Ok(Err(err)) => {
                if matches!(err, GameError::InsufficientFunds { .. }) {
                    METRICS
                        .wagers_rejected
                        .with_label_values(&["insufficient_funds"])
                        .inc();
                }
                Err(err)
            }
            Err(_) => {
                METRICS.ledger_timeouts.inc();
                session.mark_unconfirmed()?;
                warn!(wager_id = %session.wager_id, "stake debit timed out, wager unconfirmed");
                Err(GameError::LedgerUnavailable(format!(
                    "debit for wager {} timed out",
                    session.wager_id
                )))
            }
        }
    }

    /// Credit a payout under the wager's win key. Zero payouts skip the
    /// write and just report the post-debit balance.
    async fn apply_payout(
        &self,
        session: &mut WagerSession,
        payout: f64,
        balance_after_debit: f64,
    ) -> GameResult<f64> {
        if payout <= 0.0 {
            return Ok(balance_after_debit);
        }
        let key = format!("{}:win", session.wager_id);
        let write = self
            .ledger
            .credit(&session.player_id, payout, EntryCategory::Win, &key);
        match timeout(self.config.ledger.write_timeout(), write).await {
            Ok(result) => result,
            Err(_) => {
                METRICS.ledger_timeouts.inc();
                session.mark_unconfirmed()?;
                warn!(wager_id = %session.wager_id, "payout credit timed out, wager unconfirmed");
                Err(GameError::LedgerUnavailable(format!(
                    "credit for wager {} timed out",
                    session.wager_id
                )))
            }
        }
    }

    /// Finish a confirmed session: resolve, pay, record, publish.
    pub async fn settle(
        &self,
        session: WagerSession,
        payout: f64,
        balance_after_debit: f64,
        game_data: GameData,
        draw_proof: Option<DrawBundle>,
    ) -> GameResult<SettledWager> {
        let settled = self
            .settle_deferred(session, payout, balance_after_debit, game_data, draw_proof)
            .await?;
        if settled.payout > 0.0 {
            self.events.publish(CasinoEvent::BalanceChanged {
                player_id: settled.player_id.clone(),
                balance: settled.new_balance,
            });
        }
        self.events
            .publish(CasinoEvent::WagerSettled(settled.clone()));
        Ok(settled)
    }

    /// Settle without broadcasting. Crash cash-outs use this so the
    /// round's bust point is not leaked mid-flight; the scheduler
    /// publishes the settled wagers once the round ends.
    pub async fn settle_deferred(
        &self,
        mut session: WagerSession,
        payout: f64,
        balance_after_debit: f64,
        game_data: GameData,
        draw_proof: Option<DrawBundle>,
    ) -> GameResult<SettledWager> {
        session.begin_resolve()?;
        let new_balance = self
            .apply_payout(&mut session, payout, balance_after_debit)
            .await?;
        session.settle()?;

        let outcome = if payout > 0.0 {
            GameOutcome::Win
        } else {
            GameOutcome::Loss
        };
        let settled = SettledWager {
            wager_id: session.wager_id,
            player_id: session.player_id,
            game_type: session.game_type,
            stake: session.stake,
            payout,
            outcome,
            new_balance,
            timestamp: chrono::Utc::now().timestamp_millis() as u64,
            game_data,
            draw_proof,
        };

        let game_label = settled.game_type.to_string();
        METRICS
            .wagers_settled
            .with_label_values(&[
                game_label.as_str(),
                match settled.outcome {
                    GameOutcome::Win => "win",
                    GameOutcome::Loss => "loss",
                },
            ])
            .inc();
        info!(
            wager_id = %settled.wager_id,
            player = %settled.player_id,
            game = %settled.game_type,
            stake = settled.stake,
            payout = settled.payout,
            "wager settled"
        );
        Ok(settled)
    }

    fn draw(&self, session: &WagerSession, additional_data: &str) -> GameResult<DrawBundle> {
        self.outcomes
            .draw(
                &session.wager_id,
                session.game_type,
                &session.player_id,
                additional_data,
            )
            .map_err(GameError::Rng)
    }

    pub async fn play_dice(
        &self,
        player_id: &str,
        stake: f64,
        choice: DiceChoice,
    ) -> GameResult<SettledWager> {
        self.check_stake(GameType::Dice, stake)?;
        let start = Instant::now();
        let mut session = WagerSession::new(player_id, GameType::Dice, stake);
        let balance = self.confirm_debit(&mut session).await?;

        let bundle = self.draw(&session, "")?;
        let roll = dice::roll(&mut bundle.stream());
        let payout = dice::payout(stake, choice, roll.class);
        let data = GameData::Dice {
            choice,
            rolls: roll.rolls,
            total: roll.total,
            class: roll.class,
        };

        let settled = self.settle(session, payout, balance, data, Some(bundle)).await?;
        METRICS.settlement_seconds.observe(start.elapsed().as_secs_f64());
        Ok(settled)
    }

    pub async fn play_coinflip(
        &self,
        player_id: &str,
        stake: f64,
        choice: CoinChoice,
    ) -> GameResult<SettledWager> {
        self.check_stake(GameType::CoinFlip, stake)?;
        let start = Instant::now();
        let mut session = WagerSession::new(player_id, GameType::CoinFlip, stake);
        let balance = self.confirm_debit(&mut session).await?;

        let bundle = self.draw(&session, "")?;
        let result = coinflip::flip(&mut bundle.stream());
        let payout = coinflip::payout(stake, choice, result);
        let data = GameData::CoinFlip { choice, result };

        let settled = self.settle(session, payout, balance, data, Some(bundle)).await?;
        METRICS.settlement_seconds.observe(start.elapsed().as_secs_f64());
        Ok(settled)
    }

    pub async fn play_slots(
        &self,
        player_id: &str,
        stake: f64,
        variant: SlotVariant,
    ) -> GameResult<SettledWager> {
        self.check_stake(GameType::Slots, stake)?;
        let start = Instant::now();
        let mut session = WagerSession::new(player_id, GameType::Slots, stake);
        let balance = self.confirm_debit(&mut session).await?;

        let variant_tag = match variant {
            SlotVariant::Cards => "cards",
            SlotVariant::Money => "money",
        };
        let bundle = self.draw(&session, variant_tag)?;
        let spin = match variant {
            SlotVariant::Cards => slots::spin_cards(
                stake,
                self.config.slots.card_win_cap_multiple,
                &mut bundle.stream(),
            ),
            SlotVariant::Money => slots::spin_money(
                stake,
                self.config.slots.money_high_tier_stake,
                &mut bundle.stream(),
            ),
        };
        let data = GameData::Slots {
            variant,
            symbols: spin.symbols,
            multiplier_symbol: spin.multiplier_symbol,
        };

        let settled = self
            .settle(session, spin.payout, balance, data, Some(bundle))
            .await?;
        METRICS.settlement_seconds.observe(start.elapsed().as_secs_f64());
        Ok(settled)
    }

    pub async fn start_mines(
        &self,
        player_id: &str,
        stake: f64,
        mine_count: u8,
    ) -> GameResult<MinesStarted> {
        self.check_stake(GameType::Mines, stake)?;
        if !self.config.mines.allowed_mine_counts.contains(&mine_count) {
            return Err(ConfigError::InvalidValue {
                field: "mine_count",
                reason: format!(
                    "{} not in allowed set {:?}",
                    mine_count, self.config.mines.allowed_mine_counts
                ),
            }
            .into());
        }

        let mut session = WagerSession::new(player_id, GameType::Mines, stake);
        let balance = self.confirm_debit(&mut session).await?;

        let bundle = self.draw(&session, &mine_count.to_string())?;
        let board = mines::MinesBoard::generate(
            mine_count,
            self.config.mines.house_edge,
            &mut bundle.stream(),
        );

        let started = MinesStarted {
            wager_id: session.wager_id.clone(),
            player_id: session.player_id.clone(),
            stake,
            mine_count,
            multiplier_track: mines::multiplier_track(mine_count, self.config.mines.house_edge),
            new_balance: balance,
        };
        self.sessions.insert(MinesSession { session, board });
        METRICS.live_mines_sessions.set(self.sessions.len() as i64);
        Ok(started)
    }

    pub async fn reveal_mines(
        &self,
        player_id: &str,
        wager_id: &str,
        cell: u8,
    ) -> GameResult<MinesReveal> {
        // The board mutates under the session entry lock; settlement of
        // a terminal board happens after the session is removed, so two
        // racing requests cannot both settle it.
        let (outcome, stake) = self.sessions.with_session(wager_id, |live| {
            if live.session.player_id != player_id {
                return Err(GameError::UnknownSession(wager_id.to_string()));
            }
            let outcome = live.board.reveal(cell).ok_or(GameError::InvalidState {
                action: "reveal",
                state: live.session.state,
            })?;
            Ok((outcome, live.session.stake))
        })?;

        match outcome {
            mines::RevealOutcome::Safe {
                step,
                multiplier,
                board_complete: false,
            } => Ok(MinesReveal::Safe {
                wager_id: wager_id.to_string(),
                cell,
                step,
                multiplier,
                potential_payout: stake * multiplier,
            }),
            mines::RevealOutcome::Safe {
                multiplier,
                board_complete: true,
                ..
            } => {
                let settled = self.settle_mines_terminal(wager_id, multiplier).await?;
                Ok(MinesReveal::Settled(Box::new(settled)))
            }
            mines::RevealOutcome::Mine { .. } => {
                let settled = self.settle_mines_terminal(wager_id, 0.0).await?;
                Ok(MinesReveal::Settled(Box::new(settled)))
            }
        }
    }

    pub async fn cashout_mines(
        &self,
        player_id: &str,
        wager_id: &str,
    ) -> GameResult<SettledWager> {
        let multiplier = self.sessions.with_session(wager_id, |live| {
            if live.session.player_id != player_id {
                return Err(GameError::UnknownSession(wager_id.to_string()));
            }
            live.board.cash_out().ok_or(GameError::InvalidState {
                action: "cash_out",
                state: live.session.state,
            })
        })?;
        self.settle_mines_terminal(wager_id, multiplier).await
    }

    /// Remove a terminal board from the store and run it through the
    /// settlement spine. `multiplier` of zero means a mine hit.
    async fn settle_mines_terminal(
        &self,
        wager_id: &str,
        multiplier: f64,
    ) -> GameResult<SettledWager> {
        let live = self
            .sessions
            .remove(wager_id)
            .ok_or_else(|| GameError::UnknownSession(wager_id.to_string()))?;
        METRICS.live_mines_sessions.set(self.sessions.len() as i64);

        let stake = live.session.stake;
        let payout = stake * multiplier;
        let balance = self.ledger.balance(&live.session.player_id).await?;
        let data = GameData::Mines {
            mine_count: live.board.mine_count(),
            revealed: live.board.revealed_count(),
            mine_positions: live.board.mine_positions(),
        };
        self.settle(live.session, payout, balance, data, None).await
    }
}
