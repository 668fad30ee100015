//! Error types for the stakehouse wager engine.

use crate::session::SessionState;

/// Root error type for all wager-affecting operations.
///
/// `InvalidStake` and `InvalidState` are rejected before any side effect;
/// `LedgerUnavailable` means a write was attempted but never confirmed, and
/// the owning wager must be surfaced as unconfirmed rather than assumed
/// settled.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Insufficient funds: balance {balance:.2}, required {required:.2}")]
    InsufficientFunds { balance: f64, required: f64 },

    #[error("Invalid stake {amount:.2}: must be between {min:.2} and {max:.2}")]
    InvalidStake { amount: f64, min: f64, max: f64 },

    #[error("Action '{action}' not allowed in state {state:?}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },

    #[error("Ledger write did not confirm: {0}")]
    LedgerUnavailable(String),

    #[error("Stale action: round or wager already resolved")]
    StaleAction,

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Unknown player: {0}")]
    UnknownPlayer(String),

    #[error("Outcome generation failed: {0}")]
    Rng(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration and validation errors, raised at load time only.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
}

/// Convenience alias used throughout the engine.
pub type GameResult<T> = Result<T, GameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GameError::InsufficientFunds {
            balance: 5.0,
            required: 10.0,
        };
        assert!(err.to_string().contains("balance 5.00"));
        assert!(err.to_string().contains("required 10.00"));
    }

    #[test]
    fn test_config_error_conversion() {
        let cfg = ConfigError::InvalidValue {
            field: "min_bet",
            reason: "must be > 0".to_string(),
        };
        let err: GameError = cfg.into();
        assert!(matches!(err, GameError::Config(_)));
    }

    #[test]
    fn test_invalid_stake_bounds_in_message() {
        let err = GameError::InvalidStake {
            amount: 50_000.0,
            min: 1.0,
            max: 10_000.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("50000.00"));
        assert!(msg.contains("10000.00"));
    }
}
