//! Slot reel paytables.
//!
//! Two variants share the spin shape (three value reels plus a bonus
//! multiplier reel, drawn independently and uniformly) but score very
//! differently:
//!
//! - `Cards`: three-of-a-kind with wild substitution, symbol-valued
//!   payout, absolute cap as a multiple of stake.
//! - `Money`: non-blank digits concatenate into a number, stake tier
//!   picks the strip set, winnings capped by a bet-tier table.

use crate::games::rng::DrawStream;

/// Card variant reel strips. Reel order matters: symbols are biased to
/// land wilds in different columns.
pub const CARD_REELS: [&[&str]; 3] = [
    &["W", "A+", "A", "K", "Q", "J", "10"],
    &["A+", "W", "A", "K", "Q", "J", "10"],
    &["A", "K", "W", "A+", "Q", "J", "10"],
];

/// Card variant bonus reel: weighting comes from symbol repetition.
pub const CARD_MULT_REEL: &[&str] = &[
    "x2", "x5", "x2", "x10", "x2", "x2", "x2", "x2", "x2", "x5", "x10",
];

/// Money variant low-tier strips ("—" is a blank).
pub const MONEY_REELS_LOW: [&[&str]; 3] = [
    &["—", "1", "—", "5", "—", "10", "—", "0", "—", "2", "—"],
    &["—", "0", "—", "5", "—", "1", "—", "0", "—", "0", "—"],
    &["—", "0", "—", "0", "—", "0", "—", "5", "—", "0", "—"],
];

pub const MONEY_MULT_REEL_LOW: &[&str] = &["—", "x2", "—", "x5", "—", "x10", "—", "x2", "—"];

/// Money variant high-tier strips, used at and above the configured
/// high-tier stake.
pub const MONEY_REELS_HIGH: [&[&str]; 3] = [
    &["—", "10", "—", "50", "—", "100", "—", "10", "—", "50", "—"],
    &["—", "0", "—", "5", "—", "0", "—", "10", "—", "5", "—"],
    &["—", "00", "—", "0", "—", "00", "—", "5", "—", "0", "—"],
];

pub const MONEY_MULT_REEL_HIGH: &[&str] = &["—", "x2", "—", "x5", "—", "x10", "—", "x5", "—"];

/// Result of one spin before settlement.
#[derive(Debug, Clone)]
pub struct SpinResult {
    pub symbols: [String; 3],
    pub multiplier_symbol: String,
    pub payout: f64,
}

/// Fraction of the stake one matching card symbol is worth.
fn card_symbol_value(symbol: &str) -> f64 {
    match symbol {
        "W" | "A+" => 2.0,
        "A" => 1.0,
        "K" => 0.8,
        "Q" => 0.7,
        "J" => 0.6,
        "10" => 0.5,
        _ => 0.1,
    }
}

fn bonus_multiplier(symbol: &str) -> f64 {
    match symbol {
        "x20" => 20.0,
        "x10" => 10.0,
        "x5" => 5.0,
        "x2" => 2.0,
        _ => 1.0,
    }
}

/// Three-of-a-kind check with wild substitution. Returns the matched
/// symbol, `W` when all three are wild.
fn card_match(symbols: [&str; 3]) -> Option<&str> {
    let non_wilds: Vec<&str> = symbols.iter().copied().filter(|&s| s != "W").collect();
    if non_wilds.is_empty() {
        return Some("W");
    }
    let first = non_wilds[0];
    if symbols.iter().all(|&s| s == first || s == "W") {
        Some(first)
    } else {
        None
    }
}

/// Pure card-variant paytable.
pub fn card_payout(stake: f64, symbols: [&str; 3], mult_symbol: &str, cap_multiple: f64) -> f64 {
    let base = match card_match(symbols) {
        Some(matched) => 3.0 * stake * card_symbol_value(matched),
        None => 0.0,
    };
    (base * bonus_multiplier(mult_symbol)).min(stake * cap_multiple)
}

/// Maximum money-variant win for a stake, a per-bet-tier policy table.
pub fn money_win_cap(stake: f64) -> f64 {
    if stake <= 10.0 {
        400.0
    } else if stake <= 50.0 {
        2_500.0
    } else if stake <= 100.0 {
        10_000.0
    } else if stake <= 500.0 {
        50_000.0
    } else if stake <= 1_000.0 {
        100_000.0
    } else if stake <= 3_000.0 {
        250_000.0
    } else if stake <= 5_000.0 {
        600_000.0
    } else if stake <= 10_000.0 {
        1_000_000.0
    } else {
        stake * 100.0
    }
}

/// Pure money-variant paytable: blanks vanish, remaining digits
/// concatenate, bonus reel scales, tier cap bounds.
pub fn money_payout(stake: f64, symbols: [&str; 3], mult_symbol: &str) -> f64 {
    let combined: String = symbols.iter().filter(|&&s| s != "—").copied().collect();
    let base: f64 = if combined.is_empty() {
        0.0
    } else {
        combined.parse::<u64>().unwrap_or(0) as f64
    };
    (base * bonus_multiplier(mult_symbol)).min(money_win_cap(stake))
}

/// Spin the card reels.
pub fn spin_cards(stake: f64, cap_multiple: f64, stream: &mut DrawStream) -> SpinResult {
    let picks: Vec<&str> = CARD_REELS
        .iter()
        .map(|reel| reel[stream.next_int(0, reel.len() as u64 - 1) as usize])
        .collect();
    let mult = CARD_MULT_REEL[stream.next_int(0, CARD_MULT_REEL.len() as u64 - 1) as usize];

    SpinResult {
        symbols: [
            picks[0].to_string(),
            picks[1].to_string(),
            picks[2].to_string(),
        ],
        multiplier_symbol: mult.to_string(),
        payout: card_payout(stake, [picks[0], picks[1], picks[2]], mult, cap_multiple),
    }
}

/// Spin the money reels; the stake tier selects the strip set.
pub fn spin_money(stake: f64, high_tier_stake: f64, stream: &mut DrawStream) -> SpinResult {
    let (reels, mult_reel) = if stake >= high_tier_stake {
        (MONEY_REELS_HIGH, MONEY_MULT_REEL_HIGH)
    } else {
        (MONEY_REELS_LOW, MONEY_MULT_REEL_LOW)
    };

    let picks: Vec<&str> = reels
        .iter()
        .map(|reel| reel[stream.next_int(0, reel.len() as u64 - 1) as usize])
        .collect();
    let mult = mult_reel[stream.next_int(0, mult_reel.len() as u64 - 1) as usize];

    SpinResult {
        symbols: [
            picks[0].to_string(),
            picks[1].to_string(),
            picks[2].to_string(),
        ],
        multiplier_symbol: mult.to_string(),
        payout: money_payout(stake, [picks[0], picks[1], picks[2]], mult),
    }
}
