//! Identity collaborator seam.
//!
//! Settlement never authenticates anyone. Whoever embeds the engine
//! decides what a player id means; the engine only asks this trait
//! whether the claimed player may act.

use crate::errors::{GameError, GameResult};

pub trait Identity: Send + Sync {
    /// Whether the caller is allowed to act as `player_id`.
    fn is_authenticated(&self, player_id: &str) -> bool;

    /// Resolve and validate a claimed player id.
    fn current_player(&self, claimed: &str) -> GameResult<String> {
        let claimed = claimed.trim();
        if claimed.is_empty() || !self.is_authenticated(claimed) {
            return Err(GameError::UnknownPlayer(claimed.to_string()));
        }
        Ok(claimed.to_string())
    }
}

/// Accepts any non-empty player id. The stance of the service binary:
/// identity is upstream's problem.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveIdentity;

impl Identity for PermissiveIdentity {
    fn is_authenticated(&self, _player_id: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissive_accepts_any_id() {
        let id = PermissiveIdentity;
        assert_eq!(id.current_player("alice").unwrap(), "alice");
        assert_eq!(id.current_player("  bob  ").unwrap(), "bob");
    }

    #[test]
    fn test_empty_id_rejected() {
        let id = PermissiveIdentity;
        assert!(id.current_player("").is_err());
        assert!(id.current_player("   ").is_err());
    }
}
