//! Game implementations and the verifiable draw machinery they share.

pub mod coinflip;
pub mod crash;
pub mod dice;
pub mod mines;
pub mod rng;
pub mod slots;
pub mod types;

pub use rng::{DrawBundle, DrawStream, OutcomeSource, VrfOutcomeSource};
pub use types::{
    CoinChoice, DiceChoice, GameData, GameOutcome, GameType, SettledWager, SlotVariant,
};
