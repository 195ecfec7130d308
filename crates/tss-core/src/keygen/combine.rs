//! Combination of a party's own key share with the y-shares it received

use super::DecryptableYShare;
use crate::channel::{SealedChannel, SecureChannel};
use crate::engine::{Ed25519Engine, MpcEngine};
use crate::transport::SecureShareTransport;
use crate::{Error, KeyShare, PeerYShares, Result, Role, SigningMaterial, YShare};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Builds [`SigningMaterial`] and enforces the common keychain invariant
#[derive(Debug, Clone, Default)]
pub struct KeyCombiner<E = Ed25519Engine, C = SealedChannel> {
    engine: E,
    transport: SecureShareTransport<C>,
}

impl KeyCombiner {
    pub fn new() -> Self {
        Self::with_parts(Ed25519Engine::new(), SecureShareTransport::new())
    }
}

impl<E: MpcEngine, C: SecureChannel> KeyCombiner<E, C> {
    pub fn with_parts(engine: E, transport: SecureShareTransport<C>) -> Self {
        Self { engine, transport }
    }

    /// Decrypt every received share, combine, and check the result against
    /// the common keychain agreed out of band
    #[instrument(skip_all, fields(role = %own_key_share.role()))]
    pub fn combine(
        &self,
        own_key_share: &KeyShare,
        common_keychain: &str,
        encrypted_y_shares: &[DecryptableYShare],
    ) -> Result<SigningMaterial> {
        let y_shares = encrypted_y_shares
            .iter()
            .map(|entry| {
                self.transport.decrypt_and_verify(
                    &entry.y_share,
                    &entry.recipient_private,
                    &entry.sender_public,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        self.combine_y_shares(own_key_share, common_keychain, y_shares)
    }

    /// [`combine`](Self::combine) for shares that are already decrypted
    pub fn combine_y_shares(
        &self,
        own_key_share: &KeyShare,
        common_keychain: &str,
        y_shares: Vec<YShare>,
    ) -> Result<SigningMaterial> {
        let owner = own_key_share.role();

        let mut by_sender: BTreeMap<Role, YShare> = BTreeMap::new();
        for y_share in y_shares {
            if y_share.j != owner || y_share.i == owner {
                return Err(Error::YShareProvenanceInvalid(format!(
                    "{}->{} share cannot be combined by {owner}",
                    y_share.i, y_share.j
                )));
            }
            let sender = y_share.i;
            if by_sender.insert(sender, y_share).is_some() {
                return Err(Error::YShareProvenanceInvalid(format!(
                    "more than one share from {sender}"
                )));
            }
        }

        let received: Vec<&YShare> = by_sender.values().collect();
        let combined = self.engine.key_combine(&own_key_share.u_share, &received)?;

        if !combined.common_keychain.matches(common_keychain) {
            warn!(role = %owner, "Derived common keychain does not match");
            return Err(Error::CommonKeychainMismatch {
                expected: common_keychain.to_string(),
                derived: combined.common_keychain.to_string(),
            });
        }

        let peers = PeerYShares::from_senders(owner, by_sender)?;
        info!(role = %owner, "Combined key shares");

        Ok(SigningMaterial {
            u_share: own_key_share.u_share.clone(),
            peers,
            common_keychain: combined.common_keychain,
        })
    }
}
