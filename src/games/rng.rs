//! Random outcome generation.
//!
//! Every game draws through the [`OutcomeSource`] seam so the generator can
//! be swapped without touching game logic. The default source is a
//! schnorrkel VRF: the signature is the proof, SHA-256 of the signature is
//! the output, and anyone holding the bundle can re-verify the draw after
//! the round.

use crate::games::types::GameType;
use schnorrkel::{context::SigningContext, Keypair, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

const VRF_SIGNING_CONTEXT: &[u8] = b"stakehouse-draw";

/// Draw output plus the cryptographic material needed to verify it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawBundle {
    /// Hex-encoded VRF output (32 bytes)
    pub vrf_output: String,
    /// Hex-encoded VRF proof (64 bytes for schnorrkel)
    pub vrf_proof: String,
    /// Hex-encoded public key (32 bytes)
    pub public_key: String,
    /// Input message used for the draw
    pub input_message: String,
}

impl DrawBundle {
    /// Deterministic stream of draws expanded from the VRF output.
    pub fn stream(&self) -> DrawStream {
        let output = hex::decode(&self.vrf_output).unwrap_or_default();
        DrawStream { output, counter: 0 }
    }
}

/// Expands one VRF output into any number of independent uniform draws.
///
/// Block `i` is `SHA-256(output || i)`; the first 8 bytes of each block
/// become one draw. Fully reproducible from the bundle alone.
pub struct DrawStream {
    output: Vec<u8>,
    counter: u64,
}

impl DrawStream {
    /// Uniform draw in `[0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        let mut hasher = Sha256::new();
        hasher.update(&self.output);
        hasher.update(self.counter.to_le_bytes());
        self.counter += 1;
        let block = hasher.finalize();

        let raw = u64::from_be_bytes(block[..8].try_into().expect("sha256 block too short"));
        // 53-bit mantissa keeps the mapping exact.
        (raw >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `[min, max]` inclusive. A reversed range is a
    /// programming error caught at configuration load, not a runtime
    /// failure.
    pub fn next_int(&mut self, min: u64, max: u64) -> u64 {
        debug_assert!(min <= max, "draw range reversed");
        let span = max - min + 1;
        min + (self.next_unit() * span as f64) as u64
    }

    /// Index drawn proportionally to `weights`.
    pub fn next_weighted(&mut self, weights: &[f64]) -> usize {
        let total: f64 = weights.iter().sum();
        let mut target = self.next_unit() * total;
        for (i, w) in weights.iter().enumerate() {
            if target < *w {
                return i;
            }
            target -= w;
        }
        weights.len() - 1
    }
}

/// Seam between the games and the randomness backend.
pub trait OutcomeSource: Send + Sync {
    /// Produce a verifiable draw bound to one wager.
    fn draw(
        &self,
        wager_id: &str,
        game_type: GameType,
        player_id: &str,
        additional_data: &str,
    ) -> Result<DrawBundle, String>;

    /// Public key identifying this source, hex encoded.
    fn public_key_hex(&self) -> String;
}

/// VRF-backed outcome source
pub struct VrfOutcomeSource {
    keypair: Arc<Keypair>,
}

impl VrfOutcomeSource {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    /// Fresh random keypair (service startup and tests).
    pub fn new_random() -> Self {
        use rand_core::OsRng;
        Self::new(Keypair::generate_with(OsRng))
    }

    fn vrf_sign(&self, message: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let ctx = SigningContext::new(VRF_SIGNING_CONTEXT);
        let signature = self.keypair.sign(ctx.bytes(message));

        let mut hasher = Sha256::new();
        hasher.update(signature.to_bytes());
        let vrf_output = hasher.finalize().to_vec();

        (vrf_output, signature.to_bytes().to_vec())
    }

    /// Verify a draw bundle against the input it claims to commit to.
    pub fn verify_draw(bundle: &DrawBundle, expected_input: &str) -> Result<bool, String> {
        if bundle.input_message != expected_input {
            return Ok(false);
        }

        let vrf_output = hex::decode(&bundle.vrf_output)
            .map_err(|e| format!("Invalid VRF output hex: {}", e))?;
        let vrf_proof = hex::decode(&bundle.vrf_proof)
            .map_err(|e| format!("Invalid VRF proof hex: {}", e))?;
        let public_key_bytes = hex::decode(&bundle.public_key)
            .map_err(|e| format!("Invalid public key hex: {}", e))?;

        let public_key_array: [u8; 32] = public_key_bytes
            .try_into()
            .map_err(|_| "Public key must be 32 bytes")?;
        let public_key = PublicKey::from_bytes(&public_key_array)
            .map_err(|e| format!("Invalid public key: {:?}", e))?;

        let signature_array: [u8; 64] = vrf_proof
            .try_into()
            .map_err(|_| "Signature must be 64 bytes")?;
        let signature = Signature::from_bytes(&signature_array)
            .map_err(|e| format!("Invalid signature: {:?}", e))?;

        let ctx = SigningContext::new(VRF_SIGNING_CONTEXT);
        let transcript = ctx.bytes(expected_input.as_bytes());
        if public_key.verify(transcript, &signature).is_err() {
            return Ok(false);
        }

        // The output must be the hash of the proof.
        let mut hasher = Sha256::new();
        hasher.update(signature_array);
        let computed = hasher.finalize();

        Ok(computed.as_slice() == vrf_output.as_slice())
    }
}

impl OutcomeSource for VrfOutcomeSource {
    fn draw(
        &self,
        wager_id: &str,
        game_type: GameType,
        player_id: &str,
        additional_data: &str,
    ) -> Result<DrawBundle, String> {
        let input_message = format!(
            "{}:{}:{}:{}",
            wager_id, game_type, player_id, additional_data
        );

        let (vrf_output, vrf_proof) = self.vrf_sign(input_message.as_bytes());

        Ok(DrawBundle {
            vrf_output: hex::encode(vrf_output),
            vrf_proof: hex::encode(vrf_proof),
            public_key: hex::encode(self.keypair.public.to_bytes()),
            input_message,
        })
    }

    fn public_key_hex(&self) -> String {
        hex::encode(self.keypair.public.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_bundle() -> DrawBundle {
        let source = VrfOutcomeSource::new_random();
        source
            .draw("wager-1", GameType::Dice, "player-1", "small")
            .expect("draw failed")
    }

    #[test]
    fn test_draw_generation_and_verification() {
        let source = VrfOutcomeSource::new_random();
        let bundle = source
            .draw("wager-123", GameType::CoinFlip, "player-456", "heads")
            .expect("draw failed");

        let ok = VrfOutcomeSource::verify_draw(&bundle, "wager-123:coinflip:player-456:heads")
            .expect("verification failed");
        assert!(ok, "draw proof should verify");
    }

    #[test]
    fn test_tampered_output_rejected() {
        let mut bundle = test_bundle();
        bundle.vrf_output = hex::encode([0xffu8; 32]);

        let expected = bundle.input_message.clone();
        let ok = VrfOutcomeSource::verify_draw(&bundle, &expected).expect("verification failed");
        assert!(!ok, "tampered output must not verify");
    }

    #[test]
    fn test_stream_units_in_range() {
        let bundle = test_bundle();
        let mut stream = bundle.stream();
        for _ in 0..1000 {
            let u = stream.next_unit();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn test_stream_is_deterministic() {
        let bundle = test_bundle();
        let a: Vec<f64> = {
            let mut s = bundle.stream();
            (0..10).map(|_| s.next_unit()).collect()
        };
        let b: Vec<f64> = {
            let mut s = bundle.stream();
            (0..10).map(|_| s.next_unit()).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_int_draw_bounds() {
        let bundle = test_bundle();
        let mut stream = bundle.stream();
        for _ in 0..1000 {
            let d = stream.next_int(1, 6);
            assert!((1..=6).contains(&d));
        }
    }

    #[test]
    fn test_weighted_draw_respects_zero_weight() {
        let bundle = test_bundle();
        let mut stream = bundle.stream();
        for _ in 0..200 {
            let idx = stream.next_weighted(&[0.0, 1.0, 0.0]);
            assert_eq!(idx, 1);
        }
    }
}
