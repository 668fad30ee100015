//! Head-and-tail paytable: a uniform binary draw, correct call pays 2x.

use crate::games::rng::DrawStream;
use crate::games::types::CoinChoice;

pub const WIN_MULTIPLE: f64 = 2.0;

/// Flip the coin from a draw stream.
pub fn flip(stream: &mut DrawStream) -> CoinChoice {
    if stream.next_unit() < 0.5 {
        CoinChoice::Heads
    } else {
        CoinChoice::Tails
    }
}

/// Pure paytable.
pub fn payout(stake: f64, choice: CoinChoice, result: CoinChoice) -> f64 {
    if choice == result {
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
    fn test_match_pays_double() {
        assert_eq!(payout(10.0, CoinChoice::Heads, CoinChoice::Heads), 20.0);
        assert_eq!(payout(10.0, CoinChoice::Tails, CoinChoice::Tails), 20.0);
    }

    #[test]
    fn test_miss_pays_nothing() {
        assert_eq!(payout(10.0, CoinChoice::Heads, CoinChoice::Tails), 0.0);
        assert_eq!(payout(10.0, CoinChoice::Tails, CoinChoice::Heads), 0.0);
    }

    #[test]
    fn test_flip_is_roughly_uniform() {
        let source = VrfOutcomeSource::new_random();
        let n = 10_000;
        let mut heads = 0u32;
        for i in 0..n {
            let bundle = source
                .draw(&format!("f{}", i), GameType::CoinFlip, "p", "heads")
                .unwrap();
            if flip(&mut bundle.stream()) == CoinChoice::Heads {
                heads += 1;
            }
        }
        let freq = heads as f64 / n as f64;
        assert!((freq - 0.5).abs() < 0.02, "heads freq {}", freq);
    }
}
