//! Configuration management with validation and defaults.
//!
//! Every tunable the games recognise lives here: bet limits, paytable
//! values, house-edge factors, and round timing. Nothing in the game
//! modules hardcodes a policy value.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level service configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CasinoConfig {
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    pub dice: BetLimits,
    pub coinflip: BetLimits,
    pub mines: MinesConfig,
    pub slots: SlotsConfig,
    pub crash: CrashConfig,
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

/// Ledger collaborator settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// A write that does not confirm within this window leaves the wager
    /// unconfirmed instead of being assumed successful.
    pub write_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            write_timeout_ms: 5_000,
        }
    }
}

impl LedgerConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Stake bounds shared by the simple fixed-odds games.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BetLimits {
    pub min_bet: f64,
    pub max_bet: f64,
}

impl Default for BetLimits {
    fn default() -> Self {
        Self {
            min_bet: 1.0,
            max_bet: 10_000.0,
        }
    }
}

impl BetLimits {
    pub fn contains(&self, stake: f64) -> bool {
        stake >= self.min_bet && stake <= self.max_bet
    }
}

/// Mines game configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MinesConfig {
    pub limits: BetLimits,
    /// Edge factor applied per safe step when no curated table entry
    /// exists; fair odds are scaled down by this factor.
    pub house_edge: f64,
    /// Mine counts a player may choose.
    pub allowed_mine_counts: Vec<u8>,
}

impl Default for MinesConfig {
    fn default() -> Self {
        Self {
            limits: BetLimits::default(),
            house_edge: 0.97,
            allowed_mine_counts: vec![1, 3, 5, 10, 20],
        }
    }
}

/// Slot games configuration (both reel variants).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotsConfig {
    pub limits: BetLimits,
    /// Absolute cap for the card-match variant, as a multiple of stake.
    pub card_win_cap_multiple: f64,
    /// Stake at or above which the money variant switches to the
    /// high-value reel strips.
    pub money_high_tier_stake: f64,
}

impl Default for SlotsConfig {
    fn default() -> Self {
        Self {
            limits: BetLimits::default(),
            card_win_cap_multiple: 1_000.0,
            money_high_tier_stake: 100.0,
        }
    }
}

/// Crash round configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashConfig {
    pub limits: BetLimits,
    /// Countdown between rounds.
    pub waiting_secs: u64,
    /// Pause after a crash before the next countdown starts.
    pub crash_pause_secs: u64,
    /// Linear term of the multiplier curve, per second.
    pub base_rate: f64,
    /// Quadratic term of the multiplier curve, per second squared.
    pub accel: f64,
    /// Crash points are clamped to this ceiling to bound tail risk.
    pub max_crash_point: f64,
    /// Rounds retained in the rolling result history.
    pub history_len: usize,
    /// Multiplier advance interval while flying.
    pub tick_ms: u64,
    /// Applied to bets that name no auto cash-out target.
    pub default_auto_cashout: Option<f64>,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self {
            limits: BetLimits {
                min_bet: 1.0,
                max_bet: 1_000.0,
            },
            waiting_secs: 5,
            crash_pause_secs: 3,
            base_rate: 0.1,
            accel: 0.015,
            max_crash_point: 1_000.0,
            history_len: 15,
            tick_ms: 16,
            default_auto_cashout: None,
        }
    }
}

impl CrashConfig {
    pub fn waiting_duration(&self) -> Duration {
        Duration::from_secs(self.waiting_secs)
    }

    pub fn crash_pause(&self) -> Duration {
        Duration::from_secs(self.crash_pause_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl CasinoConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("{}: {}", path.display(), e)))?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate for logical consistency. All range mistakes are caught
    /// here, never at draw time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, limits) in [
            ("dice", &self.dice),
            ("coinflip", &self.coinflip),
            ("mines", &self.mines.limits),
            ("slots", &self.slots.limits),
            ("crash", &self.crash.limits),
        ] {
            if limits.min_bet <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "min_bet",
                    reason: format!("{} min_bet must be > 0", name),
                });
            }
            if limits.max_bet < limits.min_bet {
                return Err(ConfigError::InvalidValue {
                    field: "max_bet",
                    reason: format!("{} max_bet must be >= min_bet", name),
                });
            }
        }

        if !(0.0 < self.mines.house_edge && self.mines.house_edge < 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "mines.house_edge",
                reason: "must be in (0, 1)".to_string(),
            });
        }
        if self.mines.allowed_mine_counts.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "mines.allowed_mine_counts",
                reason: "must not be empty".to_string(),
            });
        }
        for &count in &self.mines.allowed_mine_counts {
            if count == 0 || count as usize >= crate::games::mines::GRID_SIZE {
                return Err(ConfigError::InvalidValue {
                    field: "mines.allowed_mine_counts",
                    reason: format!("mine count {} outside the 25-cell board", count),
                });
            }
        }

        if self.crash.max_crash_point < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "crash.max_crash_point",
                reason: "must be >= 1.0".to_string(),
            });
        }
        if self.crash.base_rate <= 0.0 || self.crash.accel < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "crash.base_rate",
                reason: "growth curve must be increasing".to_string(),
            });
        }
        if self.crash.waiting_secs == 0 || self.crash.tick_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "crash.waiting_secs",
                reason: "round timing must be non-zero".to_string(),
            });
        }
        if let Some(target) = self.crash.default_auto_cashout {
            if target <= 1.0 || target > self.crash.max_crash_point {
                return Err(ConfigError::InvalidValue {
                    field: "crash.default_auto_cashout",
                    reason: format!("{} outside (1.0, max_crash_point]", target),
                });
            }
        }
        if self.crash.history_len == 0 {
            return Err(ConfigError::InvalidValue {
                field: "crash.history_len",
                reason: "must retain at least one round".to_string(),
            });
        }
        if self.slots.card_win_cap_multiple < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "slots.card_win_cap_multiple",
                reason: "cap below stake would make every win a loss".to_string(),
            });
        }
        if self.ledger.write_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ledger.write_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }

        Ok(())
    }

    /// Short round timings for integration testing.
    pub fn fast_rounds() -> Self {
        Self {
            crash: CrashConfig {
                waiting_secs: 1,
                crash_pause_secs: 1,
                tick_ms: 5,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CasinoConfig::default().validate().is_ok());
    }

    #[test]
    fn test_fast_rounds_config_is_valid() {
        assert!(CasinoConfig::fast_rounds().validate().is_ok());
    }

    #[test]
    fn test_inverted_limits_rejected() {
        let mut config = CasinoConfig::default();
        config.dice.min_bet = 100.0;
        config.dice.max_bet = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_house_edge_bounds() {
        let mut config = CasinoConfig::default();
        config.mines.house_edge = 1.0;
        assert!(config.validate().is_err());
        config.mines.house_edge = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mine_count_must_fit_board() {
        let mut config = CasinoConfig::default();
        config.mines.allowed_mine_counts = vec![25];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = CasinoConfig::default();
        let raw = toml::to_string(&config).unwrap();
        let parsed: CasinoConfig = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.crash.waiting_secs, config.crash.waiting_secs);
        assert_eq!(parsed.mines.house_edge, config.mines.house_edge);
    }
}
