//! Prometheus metrics for the settlement pipeline.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, Histogram,
    IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder,
};

pub static METRICS: Lazy<CasinoMetrics> = Lazy::new(CasinoMetrics::new);

pub struct CasinoMetrics {
    registry: Registry,
    pub wagers_settled: IntCounterVec,
    pub wagers_rejected: IntCounterVec,
    pub ledger_timeouts: IntCounter,
    pub crash_rounds: IntCounter,
    pub live_mines_sessions: IntGauge,
    pub settlement_seconds: Histogram,
}

impl CasinoMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let wagers_settled = register_int_counter_vec_with_registry!(
            "casino_wagers_settled_total",
            "Settled wagers by game and outcome",
            &["game", "outcome"],
            registry
        )
        .unwrap();
        let wagers_rejected = register_int_counter_vec_with_registry!(
            "casino_wagers_rejected_total",
            "Rejected wager attempts by reason",
            &["reason"],
            registry
        )
        .unwrap();
        let ledger_timeouts = register_int_counter_with_registry!(
            "casino_ledger_timeouts_total",
            "Ledger writes that timed out and left a wager unconfirmed",
            registry
        )
        .unwrap();
        let crash_rounds = register_int_counter_with_registry!(
            "casino_crash_rounds_total",
            "Completed crash rounds",
            registry
        )
        .unwrap();
        let live_mines_sessions = register_int_gauge_with_registry!(
            "casino_live_mines_sessions",
            "Mines boards currently in play",
            registry
        )
        .unwrap();
        let settlement_seconds = register_histogram_with_registry!(
            "casino_settlement_seconds",
            "Wall time of a full settlement, debit to credit",
            vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0],
            registry
        )
        .unwrap();

        Self {
            registry,
            wagers_settled,
            wagers_rejected,
            ledger_timeouts,
            crash_rounds,
            live_mines_sessions,
            settlement_seconds,
        }
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        if encoder.encode(&self.registry.gather(), &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
