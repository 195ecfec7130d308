//! # TSS Core
//!
//! Coordination layer for 2-of-3 threshold EdDSA wallets shared between a
//! User, a Backup and BitGo.
//!
//! This crate provides:
//! - Key share generation and y-share export over an authenticated channel
//! - Key combination with the cross-party common keychain check
//! - The two-round signing handshake against a Coordination Service
//!
//! ## Example
//!
//! ```rust,ignore
//! use tss_core::{generate_key_share, combine_keys, Role, SigningSessionCoordinator};
//!
//! // Each party generates its key share and sends y-shares to the others
//! let key_share = generate_key_share(Role::User)?;
//! let y_share = encrypt_y_share(&key_share, Role::Bitgo, &user_private, &bitgo_public)?;
//!
//! // Once the y-shares from the other two parties arrive
//! let material = combine_keys(&key_share, &common_keychain, &received)?;
//!
//! // Sign a transaction with BitGo
//! let coordinator = SigningSessionCoordinator::new(Role::User, Role::Bitgo, client)?;
//! let g_share = coordinator
//!     .run_signing_session(&tx_request_id, &payload, &material, "m/0", None)
//!     .await?;
//! ```

pub mod channel;
pub mod codec;
pub mod engine;
pub mod error;
pub mod keygen;
pub mod session;
pub mod sign;
pub mod transport;
pub mod types;

#[cfg(test)]
mod test_support;

pub use channel::{ChannelKeyPair, ChannelPublicKey, SealedChannel, SecureChannel};
pub use engine::{Ed25519Engine, MpcEngine};
pub use error::{Error, ErrorKind, Result};
pub use keygen::{DecryptableYShare, EncryptedYShare, KeyCombiner, KeyShareGenerator};
pub use session::{MemorySessionClient, RemoteSessionClient};
pub use sign::{
    sign_locally, CommitmentShareRecord, SessionState, SignatureShareRecord,
    SigningSessionCoordinator, TxRequest, UnsignedTx,
};
pub use transport::SecureShareTransport;
pub use types::{
    CommonKeychain, FinalSignature, GShare, KeyCombine, KeyShare, PShare, PeerYShares, RShare,
    Role, SignShare, SigningMaterial, ThresholdConfig, UShare, XShare, YShare,
};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default threshold for a 3-party setup
pub const DEFAULT_THRESHOLD: usize = 2;

/// Default number of parties
pub const DEFAULT_PARTIES: usize = 3;

/// Default derivation path for signing
pub const DEFAULT_DERIVATION_PATH: &str = "m/0";

/// Generate a fresh 2-of-3 key share for `role`
pub fn generate_key_share(role: Role) -> Result<KeyShare> {
    KeyShareGenerator::new().generate(
        role.index(),
        DEFAULT_THRESHOLD as u8,
        DEFAULT_PARTIES as u8,
    )
}

/// Encrypt the y-share `key_share` holds for `recipient`
pub fn encrypt_y_share(
    key_share: &KeyShare,
    recipient: Role,
    sender_private: &str,
    recipient_public: &str,
) -> Result<EncryptedYShare> {
    SecureShareTransport::new().encrypt(
        key_share,
        recipient.index(),
        sender_private,
        recipient_public,
    )
}

/// Decrypt a received y-share and authenticate its sender
pub fn decrypt_and_verify(
    encrypted: &EncryptedYShare,
    recipient_private: &str,
    sender_public: &str,
) -> Result<YShare> {
    SecureShareTransport::new().decrypt_and_verify(encrypted, recipient_private, sender_public)
}

/// Combine `own_key_share` with the y-shares received from the other parties
pub fn combine_keys(
    own_key_share: &KeyShare,
    common_keychain: &str,
    encrypted_y_shares: &[DecryptableYShare],
) -> Result<SigningMaterial> {
    KeyCombiner::new().combine(own_key_share, common_keychain, encrypted_y_shares)
}
