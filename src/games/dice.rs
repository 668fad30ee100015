//! Big/Small dice paytable.
//!
//! Three d6 are rolled and the total classified: 4-10 is small, 11-17 is
//! big, 3 and 18 are triples. Triples lose for both sides, which is the
//! entire house edge of this game.

use crate::games::rng::DrawStream;
use crate::games::types::DiceChoice;
use serde::{Deserialize, Serialize};

/// Winning multiple applied to the stake on a correct call.
pub const WIN_MULTIPLE: f64 = 2.0;

/// Classification of a three-dice total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiceClass {
    Small,
    Big,
    Triple,
}

/// One resolved roll.
#[derive(Debug, Clone, Copy)]
pub struct DiceRoll {
    pub rolls: [u8; 3],
    pub total: u8,
    pub class: DiceClass,
}

/// Roll three dice from a draw stream.
pub fn roll(stream: &mut DrawStream) -> DiceRoll {
    let rolls = [
        stream.next_int(1, 6) as u8,
        stream.next_int(1, 6) as u8,
        stream.next_int(1, 6) as u8,
    ];
    let total = rolls.iter().sum();
    DiceRoll {
        rolls,
        total,
        class: classify(total),
    }
}

/// Classify a total in `[3, 18]`.
pub fn classify(total: u8) -> DiceClass {
    match total {
        4..=10 => DiceClass::Small,
        11..=17 => DiceClass::Big,
        _ => DiceClass::Triple,
    }
}

/// Pure paytable: stake and outcome in, payout out.
pub fn payout(stake: f64, choice: DiceChoice, class: DiceClass) -> f64 {
    let won = matches!(
        (choice, class),
        (DiceChoice::Small, DiceClass::Small) | (DiceChoice::Big, DiceClass::Big)
    );
    if won {
        stake * WIN_MULTIPLE
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::rng::{OutcomeSource, VrfOutcomeSource};
    use crate::games::types::GameType;

    #[test]
    fn test_classification_boundaries() {
        assert_eq!(classify(3), DiceClass::Triple);
        assert_eq!(classify(4), DiceClass::Small);
        assert_eq!(classify(10), DiceClass::Small);
        assert_eq!(classify(11), DiceClass::Big);
        assert_eq!(classify(17), DiceClass::Big);
        assert_eq!(classify(18), DiceClass::Triple);
    }

    #[test]
    fn test_triples_lose_for_both_sides() {
        assert_eq!(payout(10.0, DiceChoice::Small, DiceClass::Triple), 0.0);
        assert_eq!(payout(10.0, DiceChoice::Big, DiceClass::Triple), 0.0);
    }

    #[test]
    fn test_winning_call_pays_double() {
        assert_eq!(payout(10.0, DiceChoice::Small, DiceClass::Small), 20.0);
        assert_eq!(payout(10.0, DiceChoice::Big, DiceClass::Big), 20.0);
        assert_eq!(payout(10.0, DiceChoice::Small, DiceClass::Big), 0.0);
    }

    #[test]
    fn test_payout_is_pure() {
        for _ in 0..10 {
            assert_eq!(payout(7.5, DiceChoice::Big, DiceClass::Big), 15.0);
        }
    }

    #[test]
    fn test_roll_totals_in_range() {
        let source = VrfOutcomeSource::new_random();
        for i in 0..500 {
            let bundle = source
                .draw(&format!("w{}", i), GameType::Dice, "p", "small")
                .unwrap();
            let rolled = roll(&mut bundle.stream());
            assert!((3..=18).contains(&rolled.total));
            assert!(rolled.rolls.iter().all(|d| (1..=6).contains(d)));
            assert_eq!(rolled.total, rolled.rolls.iter().sum::<u8>());
        }
    }

    /// Empirical class distribution over 10k rolls against fair-d6 theory.
    /// Theoretical: triple (3 or 18) = 2/216, small = big = 107/216.
    #[test]
    fn test_distribution_matches_three_fair_dice() {
        let source = VrfOutcomeSource::new_random();
        let n = 10_000;
        let mut counts = [0u32; 3]; // small, big, triple

        for i in 0..n {
            let bundle = source
                .draw(&format!("dist{}", i), GameType::Dice, "p", "small")
                .unwrap();
            match roll(&mut bundle.stream()).class {
                DiceClass::Small => counts[0] += 1,
                DiceClass::Big => counts[1] += 1,
                DiceClass::Triple => counts[2] += 1,
            }
        }

        let small = counts[0] as f64 / n as f64;
        let big = counts[1] as f64 / n as f64;
        let triple = counts[2] as f64 / n as f64;

        // 107/216 ~= 0.4954, 2/216 ~= 0.00926; tolerances are several
        // standard deviations wide for n = 10k.
        assert!((small - 0.4954).abs() < 0.02, "small freq {}", small);
        assert!((big - 0.4954).abs() < 0.02, "big freq {}", big);
        assert!((triple - 0.00926).abs() < 0.006, "triple freq {}", triple);
    }
}
