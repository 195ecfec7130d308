//! Key generation message types

use crate::codec::role_index;
use crate::Role;
use serde::{Deserialize, Serialize};

/// A y-share in transit from sender `i` to recipient `j`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedYShare {
    /// Sender party index
    #[serde(with = "role_index")]
    pub i: Role,
    /// Recipient party index
    #[serde(with = "role_index")]
    pub j: Role,
    /// `y ∥ v ∥ chaincode`, in the clear
    pub public_share: String,
    /// Armored sign-then-encrypt message carrying `u ∥ chaincode`
    pub encrypted_private_share: String,
}

/// An [`EncryptedYShare`] together with the keys needed to open it
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptableYShare {
    pub y_share: EncryptedYShare,
    /// Armored channel private key of the recipient
    pub recipient_private: String,
    /// Armored channel public key of the sender
    pub sender_public: String,
}

impl std::fmt::Debug for DecryptableYShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptableYShare")
            .field("y_share", &self.y_share)
            .finish_non_exhaustive()
    }
}
