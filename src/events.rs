//! Broadcast event bus feeding WebSocket subscribers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::games::types::SettledWager;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CasinoEvent {
    WagerSettled(SettledWager),
    BalanceChanged {
        player_id: String,
        balance: f64,
    },
    CrashWaiting {
        round_id: u64,
        starts_in_secs: u64,
    },
    CrashTakeoff {
        round_id: u64,
    },
    CrashTick {
        round_id: u64,
        multiplier: f64,
    },
    CrashBusted {
        round_id: u64,
        crash_point: f64,
    },
    CrashCashedOut {
        round_id: u64,
        player_id: String,
        multiplier: f64,
        payout: f64,
    },
}

/// Fan-out bus. Slow subscribers lag and drop, they never block the
/// publisher.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CasinoEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish, ignoring the no-subscribers case.
    pub fn publish(&self, event: CasinoEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CasinoEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(CasinoEvent::CrashTakeoff { round_id: 7 });
        match rx.recv().await.unwrap() {
            CasinoEvent::CrashTakeoff { round_id } => assert_eq!(round_id, 7),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = EventBus::new(8);
        bus.publish(CasinoEvent::CrashTick {
            round_id: 1,
            multiplier: 1.5,
        });
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = CasinoEvent::CrashBusted {
            round_id: 3,
            crash_point: 2.41,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "crash_busted");
        assert_eq!(json["round_id"], 3);
    }
}
