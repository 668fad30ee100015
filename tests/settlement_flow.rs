//! End-to-end settlement flows through the public engine and scheduler
//! APIs, with a scripted outcome source where a flow needs a known
//! draw.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stakehouse::config::{CasinoConfig, CrashConfig};
use stakehouse::errors::GameError;
use stakehouse::events::EventBus;
use stakehouse::games::mines::MinesBoard;
use stakehouse::games::rng::{DrawBundle, DrawStream, OutcomeSource, VrfOutcomeSource};
use stakehouse::games::types::{DiceChoice, GameOutcome, GameType};
use stakehouse::ledger::{Ledger, MemoryLedger};
use stakehouse::round::{CrashScheduler, RoundPhase};
use stakehouse::settlement::{MinesReveal, SettlementEngine};

/// Outcome source that hands out pre-chosen outputs per game type and
/// falls back to a real VRF draw when nothing is scripted.
struct ScriptedSource {
    scripted: Mutex<HashMap<GameType, VecDeque<[u8; 32]>>>,
    fallback: VrfOutcomeSource,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            scripted: Mutex::new(HashMap::new()),
            fallback: VrfOutcomeSource::new_random(),
        }
    }

    fn script(&self, game: GameType, output: [u8; 32]) {
        self.scripted
            .lock()
            .unwrap()
            .entry(game)
            .or_default()
            .push_back(output);
    }
}

impl OutcomeSource for ScriptedSource {
    fn draw(
        &self,
        wager_id: &str,
        game_type: GameType,
        player_id: &str,
        additional_data: &str,
    ) -> Result<DrawBundle, String> {
        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&game_type)
            .and_then(|queue| queue.pop_front());
        match scripted {
            Some(output) => Ok(bundle_for(output)),
            None => self
                .fallback
                .draw(wager_id, game_type, player_id, additional_data),
        }
    }

    fn public_key_hex(&self) -> String {
        self.fallback.public_key_hex()
    }
}

fn bundle_for(output: [u8; 32]) -> DrawBundle {
    DrawBundle {
        vrf_output: hex::encode(output),
        vrf_proof: hex::encode([0u8; 64]),
        public_key: hex::encode([0u8; 32]),
        input_message: "scripted".to_string(),
    }
}

/// Search for an output whose draw stream satisfies `pred`.
fn find_output(pred: impl Fn(&mut DrawStream) -> bool) -> [u8; 32] {
    for i in 0u64..1_000_000 {
        let mut output = [0u8; 32];
        output[..8].copy_from_slice(&i.to_le_bytes());
        let bundle = bundle_for(output);
        if pred(&mut bundle.stream()) {
            return output;
        }
    }
    panic!("no output satisfied the predicate");
}

async fn setup(
    config: CasinoConfig,
    players: &[(&str, f64)],
) -> (Arc<SettlementEngine>, Arc<MemoryLedger>, Arc<ScriptedSource>) {
    let ledger = Arc::new(MemoryLedger::new());
    for (player, balance) in players {
        ledger.create_player(player, *balance).await.unwrap();
    }
    let source = Arc::new(ScriptedSource::new());
    let dyn_ledger: Arc<dyn Ledger> = ledger.clone();
    let dyn_source: Arc<dyn OutcomeSource> = source.clone();
    let engine = Arc::new(SettlementEngine::new(
        Arc::new(config),
        dyn_ledger,
        dyn_source,
        EventBus::default(),
    ));
    (engine, ledger, source)
}

#[tokio::test]
async fn dice_small_win_doubles_the_stake() {
    let (engine, ledger, source) = setup(CasinoConfig::default(), &[("alice", 100.0)]).await;

    // A draw that rolls a total of 7: a small win.
    let output = find_output(|stream| {
        let total: u64 = (0..3).map(|_| stream.next_int(1, 6)).sum();
        total == 7
    });
    source.script(GameType::Dice, output);

    let settled = engine
        .play_dice("alice", 10.0, DiceChoice::Small)
        .await
        .unwrap();
    assert!(matches!(settled.outcome, GameOutcome::Win));
    assert_eq!(settled.payout, 20.0);
    assert_eq!(settled.new_balance, 110.0);
    assert_eq!(ledger.balance("alice").await.unwrap(), 110.0);

    // Two entries beyond the deposit: the bet and the win.
    let history = ledger.history("alice", 10).await.unwrap();
    assert_eq!(history.len(), 3);
}

#[tokio::test]
async fn mines_safe_run_cashes_out_at_track_multiplier() {
    let (engine, ledger, source) = setup(CasinoConfig::default(), &[("bob", 50.0)]).await;

    // Script the board so the test knows where the mines are.
    let output = find_output(|_| true);
    source.script(GameType::Mines, output);
    let reference = MinesBoard::generate(3, 0.97, &mut bundle_for(output).stream());
    let mines = reference.mine_positions();
    let safe: Vec<u8> = (0..25u8).filter(|c| !mines.contains(c)).collect();

    let started = engine.start_mines("bob", 50.0, 3).await.unwrap();
    assert_eq!(started.new_balance, 0.0);

    for cell in &safe[..4] {
        let reveal = engine
            .reveal_mines("bob", &started.wager_id, *cell)
            .await
            .unwrap();
        assert!(matches!(reveal, MinesReveal::Safe { .. }));
    }

    // Four safe reveals on a three-mine board sit at 1.68x.
    let settled = engine
        .cashout_mines("bob", &started.wager_id)
        .await
        .unwrap();
    assert_eq!(settled.payout, 84.0);
    assert_eq!(settled.new_balance, 84.0);
    assert_eq!(ledger.balance("bob").await.unwrap(), 84.0);
}

#[tokio::test]
async fn crash_cashout_wins_while_holder_loses() {
    // A steep linear curve so the round plays out in under a second.
    let config = CasinoConfig {
        crash: CrashConfig {
            waiting_secs: 1,
            crash_pause_secs: 1,
            tick_ms: 5,
            base_rate: 5.0,
            accel: 0.0,
            ..Default::default()
        },
        ..Default::default()
    };
    let (engine, ledger, source) = setup(config, &[("carol", 20.0), ("dan", 20.0)]).await;

    // Script the round to bust near 2.5x.
    let output = find_output(|stream| {
        let p = stream.next_unit();
        let point = (0.99 / (1.0 - p)).clamp(1.0, 1_000.0);
        (2.4..=2.6).contains(&point)
    });
    source.script(GameType::Crash, output);

    let scheduler = Arc::new(CrashScheduler::new(engine.clone()));
    scheduler.clone().spawn();

    let carol = scheduler.place_bet("carol", 20.0, None).await.unwrap();
    scheduler.place_bet("dan", 20.0, None).await.unwrap();
    assert_eq!(ledger.balance("carol").await.unwrap(), 0.0);
    assert_eq!(ledger.balance("dan").await.unwrap(), 0.0);

    // Wait for takeoff and for the multiplier to pass 2x.
    let mut cashed = None;
    for _ in 0..2_000 {
        let status = scheduler.status().await;
        if status.round_id == carol.round_id
            && status.phase == RoundPhase::Flying
            && status.multiplier >= 2.0
        {
            cashed = Some(scheduler.cash_out("carol", carol.round_id).await.unwrap());
            break;
        }
        if status.round_id > carol.round_id {
            panic!("round busted before the cash-out window");
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let settled = cashed.expect("never reached the cash-out window");

    // Cash-out pays stake times the live multiplier, below the bust point.
    assert!(settled.payout >= 40.0);
    assert!(settled.payout < 20.0 * 2.6);
    assert_eq!(ledger.balance("carol").await.unwrap(), settled.payout);

    // Let the round bust; the holder loses the full stake.
    for _ in 0..2_000 {
        if scheduler.status().await.round_id > carol.round_id {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(ledger.balance("dan").await.unwrap(), 0.0);

    let history = scheduler.history().await;
    assert_eq!(history[history.len() - 1].round_id, carol.round_id);
    assert!((2.4..=2.6).contains(&history[history.len() - 1].crash_point));
}

#[tokio::test]
async fn insufficient_funds_leaves_no_trace() {
    let (engine, ledger, _) = setup(CasinoConfig::default(), &[("erin", 5.0)]).await;

    let err = engine
        .play_dice("erin", 10.0, DiceChoice::Big)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GameError::InsufficientFunds { balance, required } if balance == 5.0 && required == 10.0
    ));
    assert_eq!(ledger.balance("erin").await.unwrap(), 5.0);
    // Only the opening deposit is on record.
    assert_eq!(ledger.history("erin", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn replayed_settlement_keys_apply_once() {
    let (_, ledger, _) = setup(CasinoConfig::default(), &[("fay", 100.0)]).await;

    // A retried debit and credit under the same wager keys must not
    // move funds twice.
    use stakehouse::ledger::EntryCategory;
    ledger
        .debit("fay", 10.0, EntryCategory::Bet, "w9:bet")
        .await
        .unwrap();
    ledger
        .debit("fay", 10.0, EntryCategory::Bet, "w9:bet")
        .await
        .unwrap();
    ledger
        .credit("fay", 20.0, EntryCategory::Win, "w9:win")
        .await
        .unwrap();
    ledger
        .credit("fay", 20.0, EntryCategory::Win, "w9:win")
        .await
        .unwrap();
    assert_eq!(ledger.balance("fay").await.unwrap(), 110.0);
}
