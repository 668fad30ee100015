//! Stakehouse - server-authoritative wager settlement engine.
//!
//! Every game outcome is drawn server side from a verifiable VRF
//! commitment, every balance movement goes through an idempotent
//! ledger, and clients only ever submit intent (stake, choice, cell,
//! cash-out). Nothing a client sends can influence an outcome or a
//! payout amount.

pub mod api;
pub mod config;
pub mod errors;
pub mod events;
pub mod games;
pub mod identity;
pub mod ledger;
pub mod metrics;
pub mod round;
pub mod session;
pub mod settlement;

pub use config::CasinoConfig;
pub use errors::{GameError, GameResult};
pub use ledger::{Ledger, MemoryLedger};
pub use round::CrashScheduler;
pub use settlement::SettlementEngine;
