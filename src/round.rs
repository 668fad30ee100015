//! Crash round scheduler.
//!
//! One round at a time, driven by a single spawned task: a waiting
//! window accepts bets, takeoff freezes them, the multiplier climbs
//! until the pre-drawn bust point, then a short pause before the next
//! round. All round state lives behind one mutex; request handlers take
//! it briefly, only the scheduler task moves the phase forward.
//!
//! Every action carries the round id it targets. An action that arrives
//! after its round moved on is rejected as stale rather than applied to
//! whatever round is current.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::errors::{GameError, GameResult};
use crate::events::CasinoEvent;
use crate::games::crash;
use crate::games::types::{GameData, GameType, SettledWager};
use crate::ledger::EntryCategory;
use crate::metrics::METRICS;
use crate::session::{SessionState, WagerSession};
use crate::settlement::SettlementEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Waiting,
    Flying,
    Crashed,
}

/// Public snapshot of the current round.
#[derive(Debug, Clone, Serialize)]
pub struct RoundStatus {
    pub round_id: u64,
    pub phase: RoundPhase,
    pub multiplier: f64,
    /// Only disclosed once the round has crashed.
    pub crash_point: Option<f64>,
    pub live_bets: usize,
    pub queued_bets: usize,
}

/// One finished round, kept for the public history feed.
#[derive(Debug, Clone, Serialize)]
pub struct RoundRecord {
    pub round_id: u64,
    pub crash_point: f64,
    pub timestamp: u64,
}

/// Receipt for an accepted crash bet.
#[derive(Debug, Clone, Serialize)]
pub struct CrashBetReceipt {
    pub wager_id: String,
    pub round_id: u64,
    /// True when the bet waits for the next round to open.
    pub queued: bool,
    pub new_balance: f64,
}

struct LiveBet {
    session: WagerSession,
    auto_cashout: Option<f64>,
}

enum Phase {
    Waiting,
    Flying { started: Instant, crash_point: f64 },
    Crashed { crash_point: f64 },
}

struct RoundState {
    round_id: u64,
    phase: Phase,
    /// Player id to bet, for the round in `phase`.
    bets: HashMap<String, LiveBet>,
    /// Bets already debited for the round after this one.
    queued: HashMap<String, LiveBet>,
    /// Cash-outs settled mid-flight, broadcast only at bust so the
    /// crash point stays hidden until the round ends.
    pending_settled: Vec<SettledWager>,
    history: VecDeque<RoundRecord>,
}

pub struct CrashScheduler {
    engine: Arc<SettlementEngine>,
    state: Mutex<RoundState>,
}

impl CrashScheduler {
    pub fn new(engine: Arc<SettlementEngine>) -> Self {
        Self {
            engine,
            state: Mutex::new(RoundState {
                round_id: 1,
                phase: Phase::Waiting,
                bets: HashMap::new(),
                queued: HashMap::new(),
                pending_settled: Vec::new(),
                history: VecDeque::new(),
            }),
        }
    }

    /// Run rounds forever at the configured cadence.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                self.run_one_round().await;
            }
        })
    }

    async fn run_one_round(&self) {
        let cfg = self.engine.config().crash.clone();

        let round_id = self.open_waiting().await;
        self.engine.events().publish(CasinoEvent::CrashWaiting {
            round_id,
            starts_in_secs: cfg.waiting_secs,
        });
        tokio::time::sleep(cfg.waiting_duration()).await;

        match self.takeoff().await {
            Ok(()) => {}
            Err(err) => {
                // Draw failure: refund everyone and retry next loop.
                warn!(round_id, error = %err, "crash round aborted before takeoff");
                self.abort_round().await;
                return;
            }
        }
        self.engine
            .events()
            .publish(CasinoEvent::CrashTakeoff { round_id });

        let mut ticker = tokio::time::interval(cfg.tick_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if self.flight_tick().await {
                break;
            }
        }

        self.finish_round().await;
        tokio::time::sleep(cfg.crash_pause()).await;
    }

    /// Open the betting window: promote queued bets and reset the round.
    async fn open_waiting(&self) -> u64 {
        let mut state = self.state.lock().await;
        state.phase = Phase::Waiting;
        let queued = std::mem::take(&mut state.queued);
        for (player, mut bet) in queued {
            // Queued stakes were debited when placed; promotion is a
            // pure state change.
            if bet.session.confirm_stake().is_ok() {
                state.bets.insert(player, bet);
            }
        }
        state.round_id
    }

    /// Draw the bust point and start the flight.
    async fn takeoff(&self) -> GameResult<()> {
        let mut state = self.state.lock().await;
        let bundle = self
            .engine
            .draw_for(
                &format!("round-{}", state.round_id),
                GameType::Crash,
                "house",
                "",
            )
            .map_err(GameError::Rng)?;
        let crash_point = crash::crash_point(
            &mut bundle.stream(),
            self.engine.config().crash.max_crash_point,
        );
        state.phase = Phase::Flying {
            started: Instant::now(),
            crash_point,
        };
        info!(round_id = state.round_id, players = state.bets.len(), "crash round takeoff");
        Ok(())
    }

    /// One scheduler tick. Fires due auto cash-outs, publishes the
    /// multiplier, returns true when the round busted.
    async fn flight_tick(&self) -> bool {
        let (round_id, multiplier, crash_point, due) = {
            let mut state = self.state.lock().await;
            let (started, crash_point) = match state.phase {
                Phase::Flying {
                    started,
                    crash_point,
                } => (started, crash_point),
                _ => return true,
            };
            let multiplier = crash::multiplier_at(started.elapsed().as_secs_f64(), &self.engine.config().crash);

            // Auto cash-outs fire at their target, never above the bust
            // point.
            let due: Vec<String> = state
                .bets
                .iter()
                .filter(|(_, bet)| {
                    bet.auto_cashout
                        .map(|target| target <= multiplier && target < crash_point)
                        .unwrap_or(false)
                })
                .map(|(player, _)| player.clone())
                .collect();
            let mut taken = Vec::new();
            for player in &due {
                if let Some(bet) = state.bets.remove(player) {
                    taken.push(bet);
                }
            }
            (state.round_id, multiplier, crash_point, taken)
        };

        for bet in due {
            let target = bet.auto_cashout.unwrap_or(multiplier);
            if let Err(err) = self.settle_cashout(bet, round_id, target, crash_point).await {
                warn!(round_id, error = %err, "auto cash-out failed to settle");
            }
        }

        if multiplier >= crash_point {
            return true;
        }
        self.engine.events().publish(CasinoEvent::CrashTick {
            round_id,
            multiplier,
        });
        false
    }

    /// Bust: lose the remaining bets, reveal the crash point, publish
    /// everything held back during the flight.
    async fn finish_round(&self) {
        let (round_id, crash_point, losers, pending) = {
            let mut state = self.state.lock().await;
            let crash_point = match state.phase {
                Phase::Flying { crash_point, .. } => crash_point,
                Phase::Crashed { crash_point } => crash_point,
                Phase::Waiting => return,
            };
            state.phase = Phase::Crashed { crash_point };
            let losers: Vec<LiveBet> = state.bets.drain().map(|(_, bet)| bet).collect();
            let pending = std::mem::take(&mut state.pending_settled);
            let record = RoundRecord {
                round_id: state.round_id,
                crash_point,
                timestamp: chrono::Utc::now().timestamp_millis() as u64,
            };
            state.history.push_front(record);
            let cap = self.engine.config().crash.history_len;
            state.history.truncate(cap);
            let round_id = state.round_id;
            state.round_id += 1;
            (round_id, crash_point, losers, pending)
        };

        self.engine.events().publish(CasinoEvent::CrashBusted {
            round_id,
            crash_point,
        });

        for bet in losers {
            let data = GameData::Crash {
                cashout_multiplier: None,
                crash_point,
            };
            let balance = match self.engine.ledger().balance(&bet.session.player_id).await {
                Ok(balance) => balance,
                Err(err) => {
                    warn!(round_id, error = %err, "balance lookup failed settling crash loss");
                    continue;
                }
            };
            if let Err(err) = self.engine.settle(bet.session, 0.0, balance, data, None).await {
                warn!(round_id, error = %err, "failed to settle crash loss");
            }
        }
        for settled in pending {
            self.engine
                .events()
                .publish(CasinoEvent::WagerSettled(settled));
        }

        METRICS.crash_rounds.inc();
        info!(round_id, crash_point, "crash round finished");
    }

    /// Refund every bet of a round that could not take off.
    async fn abort_round(&self) {
        let bets: Vec<LiveBet> = {
            let mut state = self.state.lock().await;
            state.phase = Phase::Waiting;
            state.bets.drain().map(|(_, bet)| bet).collect()
        };
        for bet in bets {
            let key = format!("{}:refund", bet.session.wager_id);
            if let Err(err) = self
                .engine
                .ledger()
                .credit(
                    &bet.session.player_id,
                    bet.session.stake,
                    EntryCategory::CancelRefund,
                    &key,
                )
                .await
            {
                warn!(wager_id = %bet.session.wager_id, error = %err, "refund failed for aborted round");
            }
        }
    }

    /// Place a bet. During the waiting window it joins the current
    /// round; once flying it is debited now and queued for the next
    /// round. One live bet per player.
    pub async fn place_bet(
        &self,
        player_id: &str,
        stake: f64,
        auto_cashout: Option<f64>,
    ) -> GameResult<CrashBetReceipt> {
        self.engine.check_stake(GameType::Crash, stake)?;
        let auto_cashout = auto_cashout.or(self.engine.config().crash.default_auto_cashout);
        if let Some(target) = auto_cashout {
            if target <= 1.0 {
                return Err(GameError::InvalidStake {
                    amount: target,
                    min: 1.0,
                    max: self.engine.config().crash.max_crash_point,
                });
            }
        }
        {
            let state = self.state.lock().await;
            if state.bets.contains_key(player_id) || state.queued.contains_key(player_id) {
                return Err(GameError::InvalidState {
                    action: "place_bet",
                    state: SessionState::Staked,
                });
            }
        }

        let mut session = WagerSession::new(player_id, GameType::Crash, stake);
        let new_balance = self.engine.confirm_debit(&mut session).await?;
        let wager_id = session.wager_id.clone();

        let mut state = self.state.lock().await;
        let (target_map_is_queue, round_id) = match state.phase {
            Phase::Waiting => (false, state.round_id),
            Phase::Flying { .. } => (true, state.round_id + 1),
            // The counter already advanced at bust, so the queue feeds
            // the round it now names.
            Phase::Crashed { .. } => (true, state.round_id),
        };
        let slot = if target_map_is_queue {
            session.queue_for_next_round()?;
            &mut state.queued
        } else {
            &mut state.bets
        };
        if slot.contains_key(player_id) {
            // Lost a race with another bet from the same player; give
            // the stake back.
            drop(state);
            let key = format!("{}:refund", wager_id);
            self.engine
                .ledger()
                .credit(player_id, stake, EntryCategory::CancelRefund, &key)
                .await?;
            return Err(GameError::InvalidState {
                action: "place_bet",
                state: SessionState::Staked,
            });
        }
        slot.insert(
            player_id.to_string(),
            LiveBet {
                session,
                auto_cashout,
            },
        );
        Ok(CrashBetReceipt {
            wager_id,
            round_id,
            queued: target_map_is_queue,
            new_balance,
        })
    }

    /// Cancel a bet that has not taken off: a current-round bet during
    /// the waiting window, or a queued bet at any time.
    pub async fn cancel_bet(&self, player_id: &str) -> GameResult<f64> {
        let bet = {
            let mut state = self.state.lock().await;
            if let Some(bet) = state.queued.remove(player_id) {
                Some(bet)
            } else if matches!(state.phase, Phase::Waiting) {
                state.bets.remove(player_id)
            } else {
                None
            }
        };
        let bet = bet.ok_or(GameError::StaleAction)?;
        let key = format!("{}:refund", bet.session.wager_id);
        self.engine
            .ledger()
            .credit(
                &bet.session.player_id,
                bet.session.stake,
                EntryCategory::CancelRefund,
                &key,
            )
            .await
    }

    /// Cash out a live bet at the multiplier in force right now. The
    /// caller names the round it thinks it is acting on; a mismatch
    /// means the action raced a bust and is stale.
    pub async fn cash_out(&self, player_id: &str, round_id: u64) -> GameResult<SettledWager> {
        let (bet, multiplier, crash_point) = {
            let mut state = self.state.lock().await;
            if state.round_id != round_id {
                return Err(GameError::StaleAction);
            }
            let (started, crash_point) = match state.phase {
                Phase::Flying {
                    started,
                    crash_point,
                } => (started, crash_point),
                _ => return Err(GameError::StaleAction),
            };
            let multiplier = crash::multiplier_at(started.elapsed().as_secs_f64(), &self.engine.config().crash);
            if multiplier >= crash_point {
                // The bust tick has not landed yet but the round is
                // over; the bet loses.
                return Err(GameError::StaleAction);
            }
            let bet = state
                .bets
                .remove(player_id)
                .ok_or(GameError::StaleAction)?;
            (bet, multiplier, crash_point)
        };
        self.settle_cashout(bet, round_id, multiplier, crash_point)
            .await
    }

    async fn settle_cashout(
        &self,
        bet: LiveBet,
        round_id: u64,
        multiplier: f64,
        crash_point: f64,
    ) -> GameResult<SettledWager> {
        let payout = bet.session.stake * multiplier;
        let player_id = bet.session.player_id.clone();
        let balance = self.engine.ledger().balance(&player_id).await?;
        let data = GameData::Crash {
            cashout_multiplier: Some(multiplier),
            crash_point,
        };
        let settled = self
            .engine
            .settle_deferred(bet.session, payout, balance, data, None)
            .await?;

        self.engine.events().publish(CasinoEvent::CrashCashedOut {
            round_id,
            player_id,
            multiplier,
            payout,
        });
        let mut state = self.state.lock().await;
        if state.round_id == round_id && matches!(state.phase, Phase::Flying { .. }) {
            state.pending_settled.push(settled.clone());
        } else {
            // The round busted while the ledger write was in flight and
            // its pending list is already drained; publish now rather
            // than leaking into the next round's bust.
            drop(state);
            self.engine
                .events()
                .publish(CasinoEvent::WagerSettled(settled.clone()));
        }
        Ok(settled)
    }

    pub async fn status(&self) -> RoundStatus {
        let state = self.state.lock().await;
        let (phase, multiplier, crash_point) = match state.phase {
            Phase::Waiting => (RoundPhase::Waiting, 1.0, None),
            Phase::Flying { started, .. } => (
                RoundPhase::Flying,
                crash::multiplier_at(started.elapsed().as_secs_f64(), &self.engine.config().crash),
                None,
            ),
            Phase::Crashed { crash_point } => (RoundPhase::Crashed, crash_point, Some(crash_point)),
        };
        RoundStatus {
            round_id: state.round_id,
            phase,
            multiplier,
            crash_point,
            live_bets: state.bets.len(),
            queued_bets: state.queued.len(),
        }
    }

    pub async fn history(&self) -> Vec<RoundRecord> {
        self.state.lock().await.history.iter().cloned().collect()
    }
}
