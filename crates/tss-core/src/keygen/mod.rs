//! Key generation and combination
//!
//! Each party generates a [`KeyShare`] on its own, exports one
//! [`EncryptedYShare`] per other party, and combines the shares it receives
//! into its [`SigningMaterial`](crate::SigningMaterial).

mod combine;
mod messages;

pub use combine::KeyCombiner;
pub use messages::*;

use crate::engine::{Ed25519Engine, MpcEngine};
use crate::{KeyShare, Result, Role, ThresholdConfig};
use tracing::{info, instrument};

/// Produces a party's [`KeyShare`]
#[derive(Debug, Clone, Default)]
pub struct KeyShareGenerator<E = Ed25519Engine> {
    engine: E,
}

impl KeyShareGenerator {
    pub fn new() -> Self {
        Self::with_engine(Ed25519Engine::new())
    }
}

impl<E: MpcEngine> KeyShareGenerator<E> {
    pub fn with_engine(engine: E) -> Self {
        Self { engine }
    }

    /// Generate a fresh key share for `party_index`
    #[instrument(skip(self))]
    pub fn generate(&self, party_index: u8, threshold: u8, parties: u8) -> Result<KeyShare> {
        self.generate_inner(party_index, threshold, parties, None)
    }

    /// Generate from a fixed 64-byte seed (secret seed then chain code)
    #[instrument(skip(self, seed))]
    pub fn generate_with_seed(
        &self,
        party_index: u8,
        threshold: u8,
        parties: u8,
        seed: &[u8; 64],
    ) -> Result<KeyShare> {
        self.generate_inner(party_index, threshold, parties, Some(seed))
    }

    fn generate_inner(
        &self,
        party_index: u8,
        threshold: u8,
        parties: u8,
        seed: Option<&[u8; 64]>,
    ) -> Result<KeyShare> {
        let role = Role::from_index(party_index)?;
        let config = ThresholdConfig::new(threshold, parties)?;

        let key_share = self.engine.key_share(role, config, seed)?;

        info!(
            role = %role,
            recipients = key_share.y_shares.len(),
            "Generated key share"
        );
        Ok(key_share)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_generate_packages_shares_for_others() {
        for role in Role::ALL {
            let key_share = KeyShareGenerator::new().generate(role.index(), 2, 3).unwrap();

            assert_eq!(key_share.role(), role);
            assert_eq!((key_share.u_share.t, key_share.u_share.n), (2, 3));
            assert_eq!(key_share.y_shares.len(), 2);
            for (recipient, y_share) in &key_share.y_shares {
                assert_ne!(*recipient, role);
                assert_eq!(y_share.i, role);
                assert_eq!(y_share.j, *recipient);
                assert_eq!(y_share.y, key_share.u_share.y);
            }
        }
    }

    #[test]
    fn test_generate_rejects_bad_config() {
        let generator = KeyShareGenerator::new();
        assert!(matches!(
            generator.generate(0, 2, 3).unwrap_err(),
            Error::InvalidConfig(_)
        ));
        assert!(matches!(
            generator.generate(1, 3, 3).unwrap_err(),
            Error::InvalidConfig(_)
        ));
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let generator = KeyShareGenerator::new();
        let seed = [9u8; 64];
        let a = generator.generate_with_seed(2, 2, 3, &seed).unwrap();
        let b = generator.generate_with_seed(2, 2, 3, &seed).unwrap();

        assert_eq!(a.u_share.y, b.u_share.y);
        assert_eq!(a.y_shares, b.y_shares);
        assert_eq!(a.u_share.chaincode, [9u8; 32]);
    }

    #[test]
    fn test_key_share_json() {
        let key_share = KeyShareGenerator::new().generate(1, 2, 3).unwrap();
        let json = serde_json::to_string(&key_share).unwrap();
        assert!(json.contains("uShare"));
        assert!(json.contains("yShares"));

        let back: KeyShare = serde_json::from_str(&json).unwrap();
        assert_eq!(back.y_shares, key_share.y_shares);
    }
}
