use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported game types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Dice,
    CoinFlip,
    Mines,
    Slots,
    Crash,
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameType::Dice => write!(f, "dice"),
            GameType::CoinFlip => write!(f, "coinflip"),
            GameType::Mines => write!(f, "mines"),
            GameType::Slots => write!(f, "slots"),
            GameType::Crash => write!(f, "crash"),
        }
    }
}

/// Coin flip choice
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CoinChoice {
    Heads,
    Tails,
}

impl fmt::Display for CoinChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinChoice::Heads => write!(f, "heads"),
            CoinChoice::Tails => write!(f, "tails"),
        }
    }
}

/// Dice bet selection. Triples are not selectable: totals 3 and 18 lose
/// for both sides, which is the house edge of the game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiceChoice {
    Small,
    Big,
}

impl fmt::Display for DiceChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiceChoice::Small => write!(f, "small"),
            DiceChoice::Big => write!(f, "big"),
        }
    }
}

/// Reel set selection for the slots games.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotVariant {
    /// Card-match reels: three symbol reels plus a multiplier reel,
    /// wilds substitute.
    Cards,
    /// Digit-concatenation reels with blanks and stake-tiered strips.
    Money,
}

impl fmt::Display for SlotVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotVariant::Cards => write!(f, "cards"),
            SlotVariant::Money => write!(f, "money"),
        }
    }
}

/// Win/loss classification of a settled wager
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    Win,
    Loss,
}

/// Game-specific data recorded with a settled wager (discriminated union)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum GameData {
    Dice {
        choice: DiceChoice,
        rolls: [u8; 3],
        total: u8,
        class: crate::games::dice::DiceClass,
    },
    CoinFlip {
        choice: CoinChoice,
        result: CoinChoice,
    },
    Slots {
        variant: SlotVariant,
        symbols: [String; 3],
        multiplier_symbol: String,
    },
    Mines {
        mine_count: u8,
        revealed: usize,
        mine_positions: Vec<u8>,
    },
    Crash {
        cashout_multiplier: Option<f64>,
        crash_point: f64,
    },
}

/// A settled wager returned to callers and recorded for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettledWager {
    pub wager_id: String,
    pub player_id: String,
    pub game_type: GameType,
    pub stake: f64,
    pub payout: f64,
    pub outcome: GameOutcome,
    pub new_balance: f64,
    pub timestamp: u64,
    #[serde(flatten)]
    pub game_data: GameData,
    /// Commitment material for post-round verification of the draw.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draw_proof: Option<crate::games::rng::DrawBundle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_type_serde_names() {
        assert_eq!(serde_json::to_string(&GameType::CoinFlip).unwrap(), "\"coinflip\"");
        assert_eq!(serde_json::to_string(&GameType::Crash).unwrap(), "\"crash\"");
    }

    #[test]
    fn test_game_data_tagging() {
        let data = GameData::CoinFlip {
            choice: CoinChoice::Heads,
            result: CoinChoice::Tails,
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["game"], "coinflip");
        assert_eq!(json["choice"], "heads");
    }
}
