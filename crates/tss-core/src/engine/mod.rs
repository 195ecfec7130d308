//! MPC engine: share arithmetic behind key generation and signing
//!
//! The coordination code only talks to [`MpcEngine`]; the curve math lives
//! in [`Ed25519Engine`].

mod ed25519;
pub mod hd;
pub mod shamir;

pub use ed25519::Ed25519Engine;

use crate::{
    FinalSignature, GShare, KeyCombine, KeyShare, PShare, RShare, Result, Role, SignShare,
    ThresholdConfig, UShare, XShare, YShare,
};

/// Threshold EdDSA share arithmetic
pub trait MpcEngine: Send + Sync {
    /// Generate a party's u-share and the y-shares for every other party.
    /// `seed` is 64 bytes: secret seed followed by chain code.
    fn key_share(
        &self,
        role: Role,
        config: ThresholdConfig,
        seed: Option<&[u8; 64]>,
    ) -> Result<KeyShare>;

    /// Merge a u-share with the y-shares received from the other parties
    fn key_combine(&self, u_share: &UShare, y_shares: &[&YShare]) -> Result<KeyCombine>;

    /// [`key_combine`](MpcEngine::key_combine) followed by derivation along a
    /// non-hardened path
    fn key_derive(&self, u_share: &UShare, y_shares: &[&YShare], path: &str) -> Result<PShare>;

    /// Derive a child common keychain from public data only
    fn derive_common_keychain(&self, common_keychain: &str, path: &str) -> Result<String>;

    /// Round 1: nonce shares for `payload`, one r-share per counterparty
    fn sign_share(
        &self,
        payload: &[u8],
        p_share: &PShare,
        counterparties: &[Role],
        seed: Option<&[u8; 64]>,
    ) -> Result<SignShare>;

    /// Round 2: this party's signature share. `r_shares` are addressed to
    /// the caller; `y_shares` are the key-generation shares it holds.
    fn sign(
        &self,
        payload: &[u8],
        x_share: &XShare,
        r_shares: &[RShare],
        y_shares: &[&YShare],
    ) -> Result<GShare>;

    /// Combine g-shares from a signing quorum into the final signature
    fn sign_combine(&self, g_shares: &[GShare]) -> Result<FinalSignature>;

    /// Check a final signature against its embedded public key
    fn verify(&self, payload: &[u8], signature: &FinalSignature) -> Result<()>;
}
