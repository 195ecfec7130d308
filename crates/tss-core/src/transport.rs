//! Secure transport of y-shares between parties
//!
//! The public half of a y-share (`y ∥ v ∥ chaincode`) travels in the clear.
//! The secret half (`u ∥ chaincode`) is signed by the sender and encrypted to
//! the recipient through a [`SecureChannel`].

use crate::channel::{SealedChannel, SecureChannel};
use crate::codec;
use crate::keygen::EncryptedYShare;
use crate::{Error, KeyShare, Result, Role, YShare};
use tracing::{debug, instrument};
use zeroize::Zeroize;

/// Produces and consumes [`EncryptedYShare`]s
#[derive(Debug, Clone, Default)]
pub struct SecureShareTransport<C = SealedChannel> {
    channel: C,
}

impl SecureShareTransport {
    pub fn new() -> Self {
        Self::with_channel(SealedChannel::new())
    }
}

impl<C: SecureChannel> SecureShareTransport<C> {
    pub fn with_channel(channel: C) -> Self {
        Self { channel }
    }

    /// Encrypt the y-share `key_share` holds for `recipient_index`
    #[instrument(skip_all, fields(owner = %key_share.role(), recipient = recipient_index))]
    pub fn encrypt(
        &self,
        key_share: &KeyShare,
        recipient_index: u8,
        sender_private: &str,
        recipient_public: &str,
    ) -> Result<EncryptedYShare> {
        let owner = key_share.role();
        let invalid = || Error::InvalidRecipient {
            owner,
            recipient: recipient_index,
        };

        if recipient_index == owner.index() {
            return Err(invalid());
        }
        let recipient = Role::from_index(recipient_index).map_err(|_| invalid())?;
        let y_share = key_share.y_shares.get(&recipient).ok_or_else(invalid)?;

        let v = y_share.v.ok_or_else(|| {
            Error::Codec(format!("y-share for {recipient} carries no commitment"))
        })?;
        let public_share = codec::encode_public_share(&y_share.y, &v, &y_share.chaincode);

        let mut plaintext = codec::encode_private_share(&y_share.u, &y_share.chaincode);
        let sealed = self
            .channel
            .sign_then_encrypt(plaintext.as_bytes(), sender_private, recipient_public);
        plaintext.zeroize();

        debug!("Encrypted y-share");
        Ok(EncryptedYShare {
            i: owner,
            j: recipient,
            public_share,
            encrypted_private_share: sealed?,
        })
    }

    /// Open an [`EncryptedYShare`] and authenticate its sender
    #[instrument(skip_all, fields(from = %encrypted.i, to = %encrypted.j))]
    pub fn decrypt_and_verify(
        &self,
        encrypted: &EncryptedYShare,
        recipient_private: &str,
        sender_public: &str,
    ) -> Result<YShare> {
        let mut plaintext = self.channel.decrypt_then_verify(
            &encrypted.encrypted_private_share,
            recipient_private,
            sender_public,
        )?;

        let decoded = std::str::from_utf8(&plaintext)
            .map_err(|_| Error::Codec("private share is not hex text".into()))
            .and_then(codec::decode_private_share);
        plaintext.zeroize();
        let (u, chaincode) = decoded?;

        let (y, v, public_chaincode) = codec::decode_public_share(&encrypted.public_share)?;
        if public_chaincode != chaincode {
            return Err(Error::YShareProvenanceInvalid(format!(
                "chain code of the share from {} differs from its public share",
                encrypted.i
            )));
        }

        Ok(YShare {
            i: encrypted.i,
            j: encrypted.j,
            y,
            v: Some(v),
            u,
            chaincode,
        })
    }
}
