//! Mines board model and step-multiplier odds.
//!
//! A 25-cell board hides K mines drawn without replacement. Each safe
//! reveal advances a step whose multiplier comes from a curated table
//! where one exists, otherwise from the running product of
//! `house_edge / p_safe(i)` with `p_safe(i) = (N - K - (i-1)) / (N - (i-1))`
//! (fair drawing-without-replacement odds scaled by a fixed edge). The
//! curated tables are rounded values of the same curve, so they win
//! whenever they have an entry.

use crate::games::rng::DrawStream;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Cells on the board.
pub const GRID_SIZE: usize = 25;

/// Step track length is capped; deep steps reuse the last multiplier.
pub const MAX_TRACK_LEN: usize = 20;

/// Curated step multipliers per mine count.
static CURATED_TRACKS: Lazy<HashMap<u8, Vec<f64>>> = Lazy::new(|| {
    HashMap::from([
        (
            1u8,
            vec![1.01, 1.05, 1.10, 1.15, 1.21, 1.28, 1.35, 1.43, 1.52],
        ),
        (
            3u8,
            vec![
                1.10, 1.26, 1.45, 1.68, 1.96, 2.30, 2.73, 3.28, 3.98, 4.70, 5.88, 7.48, 9.72,
            ],
        ),
        (
            5u8,
            vec![
                1.21, 1.53, 1.96, 2.53, 3.32, 4.25, 5.77, 7.98, 11.31, 16.45, 24.68, 38.39, 62.39,
                106.95,
            ],
        ),
        (
            10u8,
            vec![
                1.62, 2.77, 4.70, 8.62, 16.45, 32.91, 69.47, 156.31, 379.61, 1012.3,
            ],
        ),
        (20u8, vec![4.65, 27.90, 213.90, 2352.90, 49410.9]),
    ])
});

/// Probability that the i-th reveal (1-based) is safe.
fn p_safe(mine_count: u8, step: usize) -> f64 {
    let n = GRID_SIZE as f64;
    let k = mine_count as f64;
    let drawn = (step - 1) as f64;
    (n - k - drawn) / (n - drawn)
}

/// Number of entries in the step track for a mine count.
pub fn track_len(mine_count: u8) -> usize {
    (GRID_SIZE - mine_count as usize).min(MAX_TRACK_LEN)
}

/// Build the full step-multiplier track for a mine count.
///
/// Curated entries are used verbatim; past the end of the curated list
/// the fallback formula continues from the last curated value.
pub fn multiplier_track(mine_count: u8, house_edge: f64) -> Vec<f64> {
    let curated = CURATED_TRACKS
        .get(&mine_count)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let len = track_len(mine_count);

    let mut track = Vec::with_capacity(len);
    let mut current = 1.0;
    for step in 1..=len {
        if let Some(&value) = curated.get(step - 1) {
            current = value;
        } else {
            current *= house_edge / p_safe(mine_count, step);
        }
        track.push(current);
    }
    track
}

/// Multiplier in force after `revealed` safe reveals (1-based).
pub fn multiplier_for_step(mine_count: u8, revealed: usize, house_edge: f64) -> f64 {
    let track = multiplier_track(mine_count, house_edge);
    let idx = revealed.min(track.len()).saturating_sub(1);
    track[idx]
}

/// Maximum number of safe reveals on a board.
pub fn max_safe_reveals(mine_count: u8) -> usize {
    GRID_SIZE - mine_count as usize
}

/// Board lifecycle state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BoardState {
    Playing,
    Won,
    Lost,
}

/// What one reveal produced.
#[derive(Debug, Clone)]
pub enum RevealOutcome {
    /// Safe cell; carries the step multiplier now in force and whether
    /// the board completed (all safe cells revealed).
    Safe {
        step: usize,
        multiplier: f64,
        board_complete: bool,
    },
    /// Mine hit; board is terminal, all mine positions disclosed.
    Mine { mine_positions: Vec<u8> },
}

/// A per-session mines board. The mine set is immutable once drawn.
#[derive(Debug, Clone)]
pub struct MinesBoard {
    mine_count: u8,
    mines: BTreeSet<u8>,
    revealed: BTreeSet<u8>,
    track: Vec<f64>,
    state: BoardState,
}

impl MinesBoard {
    /// Draw a fresh board from a draw stream: `mine_count` distinct cells
    /// chosen uniformly without replacement.
    pub fn generate(mine_count: u8, house_edge: f64, stream: &mut DrawStream) -> Self {
        let mut mines = BTreeSet::new();
        while mines.len() < mine_count as usize {
            mines.insert(stream.next_int(0, GRID_SIZE as u64 - 1) as u8);
        }
        Self {
            mine_count,
            mines,
            revealed: BTreeSet::new(),
            track: multiplier_track(mine_count, house_edge),
            state: BoardState::Playing,
        }
    }

    pub fn state(&self) -> BoardState {
        self.state
    }

    pub fn mine_count(&self) -> u8 {
        self.mine_count
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed.len()
    }

    pub fn mine_positions(&self) -> Vec<u8> {
        self.mines.iter().copied().collect()
    }

    /// Multiplier currently in force; 0 reveals means no winnings yet.
    pub fn current_multiplier(&self) -> f64 {
        if self.revealed.is_empty() {
            return 1.0;
        }
        let idx = self.revealed.len().min(self.track.len()) - 1;
        self.track[idx]
    }

    /// Reveal a cell. Returns `None` when the board is terminal or the
    /// cell was already revealed (the caller maps that to a stale/invalid
    /// action, it is never a silent no-op).
    pub fn reveal(&mut self, cell: u8) -> Option<RevealOutcome> {
        if self.state != BoardState::Playing || cell as usize >= GRID_SIZE {
            return None;
        }
        if !self.revealed.insert(cell) {
            return None;
        }

        if self.mines.contains(&cell) {
            self.state = BoardState::Lost;
            return Some(RevealOutcome::Mine {
                mine_positions: self.mine_positions(),
            });
        }

        let step = self.revealed.len();
        let board_complete = step == max_safe_reveals(self.mine_count);
        if board_complete {
            self.state = BoardState::Won;
        }
        Some(RevealOutcome::Safe {
            step,
            multiplier: self.current_multiplier(),
            board_complete,
        })
    }

    /// Mark the board settled by an explicit cash-out.
    pub fn cash_out(&mut self) -> Option<f64> {
        if self.state != BoardState::Playing || self.revealed.is_empty() {
            return None;
        }
        self.state = BoardState::Won;
        Some(self.current_multiplier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::rng::{OutcomeSource, VrfOutcomeSource};
    use crate::games::types::GameType;

    const EDGE: f64 = 0.97;

    fn test_stream(tag: &str) -> crate::games::rng::DrawStream {
        let source = VrfOutcomeSource::new_random();
        source
            .draw(tag, GameType::Mines, "p", "3")
            .unwrap()
            .stream()
    }

    #[test]
    fn test_curated_table_values() {
        // Step 4 of the 3-mine table is the documented 1.68x.
        assert_eq!(multiplier_for_step(3, 4, EDGE), 1.68);
        assert_eq!(multiplier_for_step(1, 1, EDGE), 1.01);
        assert_eq!(multiplier_for_step(20, 5, EDGE), 49410.9);
    }

    #[test]
    fn test_track_strictly_increasing() {
        for mine_count in [1u8, 2, 3, 5, 7, 10, 15, 20, 24] {
            let track = multiplier_track(mine_count, EDGE);
            assert_eq!(track.len(), track_len(mine_count));
            for pair in track.windows(2) {
                assert!(
                    pair[1] > pair[0],
                    "track for {} mines not increasing: {:?}",
                    mine_count,
                    pair
                );
            }
        }
    }

    #[test]
    fn test_formula_fallback_for_uncurated_count() {
        // 2 mines has no curated table; first step must equal the formula.
        let track = multiplier_track(2, EDGE);
        let expected = EDGE / (23.0 / 25.0);
        assert!((track[0] - expected).abs() < 1e-12);
        let expected2 = expected * (EDGE / (22.0 / 24.0));
        assert!((track[1] - expected2).abs() < 1e-12);
    }

    #[test]
    fn test_fallback_continues_past_curated_entries() {
        // 1 mine: 9 curated steps, 20 total; step 10 extends step 9.
        let track = multiplier_track(1, EDGE);
        let p10 = (25.0 - 1.0 - 9.0) / (25.0 - 9.0);
        let expected = 1.52 * (EDGE / p10);
        assert!((track[9] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_full_board_multiplier_is_track_end() {
        let track = multiplier_track(20, EDGE);
        let full = multiplier_for_step(20, max_safe_reveals(20), EDGE);
        assert_eq!(full, *track.last().unwrap());
    }

    #[test]
    fn test_generated_board_has_exact_mine_count() {
        let mut stream = test_stream("board-count");
        let board = MinesBoard::generate(5, EDGE, &mut stream);
        assert_eq!(board.mine_positions().len(), 5);
        assert!(board.mine_positions().iter().all(|&c| (c as usize) < GRID_SIZE));
    }

    #[test]
    fn test_mine_hit_is_terminal_and_discloses_positions() {
        let mut stream = test_stream("board-hit");
        let mut board = MinesBoard::generate(3, EDGE, &mut stream);
        let mine = board.mine_positions()[0];
        match board.reveal(mine) {
            Some(RevealOutcome::Mine { mine_positions }) => {
                assert_eq!(mine_positions.len(), 3);
            }
            other => panic!("expected mine hit, got {:?}", other),
        }
        assert_eq!(board.state(), BoardState::Lost);
        // Nothing is legal on a dead board.
        assert!(board.reveal(0).is_none());
        assert!(board.cash_out().is_none());
    }

    #[test]
    fn test_safe_run_and_cash_out() {
        let mut stream = test_stream("board-run");
        let mut board = MinesBoard::generate(3, EDGE, &mut stream);
        let mines: BTreeSet<u8> = board.mine_positions().into_iter().collect();

        let mut revealed = 0;
        for cell in 0..GRID_SIZE as u8 {
            if mines.contains(&cell) {
                continue;
            }
            match board.reveal(cell) {
                Some(RevealOutcome::Safe { step, .. }) => {
                    revealed += 1;
                    assert_eq!(step, revealed);
                }
                other => panic!("expected safe reveal, got {:?}", other),
            }
            if revealed == 4 {
                break;
            }
        }

        assert_eq!(board.cash_out(), Some(1.68));
        assert_eq!(board.state(), BoardState::Won);
    }

    #[test]
    fn test_full_clear_auto_completes() {
        let mut stream = test_stream("board-clear");
        let mut board = MinesBoard::generate(20, EDGE, &mut stream);
        let mines: BTreeSet<u8> = board.mine_positions().into_iter().collect();

        let mut last = None;
        for cell in 0..GRID_SIZE as u8 {
            if mines.contains(&cell) {
                continue;
            }
            last = board.reveal(cell);
        }
        match last {
            Some(RevealOutcome::Safe { board_complete, .. }) => assert!(board_complete),
            other => panic!("expected completing reveal, got {:?}", other),
        }
        assert_eq!(board.state(), BoardState::Won);
    }

    #[test]
    fn test_double_reveal_rejected() {
        let mut stream = test_stream("board-dup");
        let mut board = MinesBoard::generate(3, EDGE, &mut stream);
        let safe = (0..GRID_SIZE as u8)
            .find(|c| !board.mine_positions().contains(c))
            .unwrap();
        assert!(board.reveal(safe).is_some());
        assert!(board.reveal(safe).is_none());
    }

    #[test]
    fn test_cash_out_requires_a_reveal() {
        let mut stream = test_stream("board-early");
        let mut board = MinesBoard::generate(3, EDGE, &mut stream);
        assert!(board.cash_out().is_none());
    }
}
