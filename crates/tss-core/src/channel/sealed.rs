//! Sealed-box channel: Ed25519 signature inside an X25519 + ChaCha20-Poly1305 envelope
//!
//! Message body: `key_id (8) ∥ ephemeral_public (32) ∥ nonce (12) ∥ ciphertext`,
//! where the ciphertext opens to `signature (64) ∥ plaintext`. `key_id`
//! names the recipient encryption key, so a message opened with the wrong
//! key is told apart from one altered in transit.

use super::{armor, dearmor, ChannelKeyPair, ChannelPublicKey, SecureChannel, MESSAGE_LABEL};
use crate::{Error, Result};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use ed25519_dalek::{Signature, Signer, Verifier};
use rand::{rngs::OsRng, RngCore};
use x25519_dalek::{EphemeralSecret, PublicKey};
use zeroize::Zeroize;

const KEY_CONTEXT: &str = "tss-eddsa secure channel 2024-01 share encryption key";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const SIGNATURE_LEN: usize = 64;
const KEY_ID_LEN: usize = 8;
const HEADER_LEN: usize = KEY_ID_LEN + 32;

fn key_id(encryption_key: &PublicKey) -> [u8; KEY_ID_LEN] {
    let hash = blake3::hash(encryption_key.as_bytes());
    let mut id = [0u8; KEY_ID_LEN];
    id.copy_from_slice(&hash.as_bytes()[..KEY_ID_LEN]);
    id
}

/// [`SecureChannel`] backed by [`ChannelKeyPair`] armored keys
#[derive(Debug, Clone, Copy, Default)]
pub struct SealedChannel;

impl SealedChannel {
    pub fn new() -> Self {
        Self
    }
}

fn message_key(shared: &[u8; 32], ephemeral: &PublicKey, recipient: &PublicKey) -> [u8; 32] {
    let mut material = [0u8; 96];
    material[..32].copy_from_slice(shared);
    material[32..64].copy_from_slice(ephemeral.as_bytes());
    material[64..].copy_from_slice(recipient.as_bytes());
    let key = blake3::derive_key(KEY_CONTEXT, &material);
    material.zeroize();
    key
}

impl SecureChannel for SealedChannel {
    fn sign_then_encrypt(
        &self,
        plaintext: &[u8],
        sender_private: &str,
        recipient_public: &str,
    ) -> Result<String> {
        let sender = ChannelKeyPair::from_armored(sender_private)?;
        let recipient = ChannelPublicKey::from_armored(recipient_public)?;

        let signature = sender.signing_key().sign(plaintext);
        let mut signed = Vec::with_capacity(SIGNATURE_LEN + plaintext.len());
        signed.extend_from_slice(&signature.to_bytes());
        signed.extend_from_slice(plaintext);

        let ephemeral = EphemeralSecret::random_from_rng(OsRng);
        let ephemeral_public = PublicKey::from(&ephemeral);
        let shared = ephemeral.diffie_hellman(recipient.encryption_key());
        let mut key = message_key(shared.as_bytes(), &ephemeral_public, recipient.encryption_key());

        let mut header = [0u8; HEADER_LEN];
        header[..KEY_ID_LEN].copy_from_slice(&key_id(recipient.encryption_key()));
        header[KEY_ID_LEN..].copy_from_slice(ephemeral_public.as_bytes());

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let ciphertext = cipher.encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &signed,
                aad: &header,
            },
        );
        key.zeroize();
        signed.zeroize();
        let ciphertext = ciphertext.map_err(|e| Error::Crypto(format!("encryption failed: {e}")))?;

        let mut body = Vec::with_capacity(HEADER_LEN + NONCE_LEN + ciphertext.len());
        body.extend_from_slice(&header);
        body.extend_from_slice(&nonce);
        body.extend_from_slice(&ciphertext);

        Ok(armor(MESSAGE_LABEL, &body))
    }

    fn decrypt_then_verify(
        &self,
        armored: &str,
        recipient_private: &str,
        sender_public: &str,
    ) -> Result<Vec<u8>> {
        let recipient = ChannelKeyPair::from_armored(recipient_private)?;
        let sender = ChannelPublicKey::from_armored(sender_public)?;

        let body = dearmor(MESSAGE_LABEL, armored)?;
        if body.len() < HEADER_LEN + NONCE_LEN + TAG_LEN + SIGNATURE_LEN {
            return Err(Error::Codec(format!("message body is {} bytes", body.len())));
        }
        let (header, rest) = body.split_at(HEADER_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

        let own_public = recipient.public_key();
        if header[..KEY_ID_LEN] != key_id(own_public.encryption_key()) {
            return Err(Error::DecryptionFailed(format!(
                "message is encrypted to key id {}, not to key {}",
                hex::encode(&header[..KEY_ID_LEN]),
                own_public.fingerprint()
            )));
        }

        let mut ephemeral_bytes = [0u8; 32];
        ephemeral_bytes.copy_from_slice(&header[KEY_ID_LEN..]);
        let ephemeral_public = PublicKey::from(ephemeral_bytes);

        let shared = recipient
            .encryption_secret()
            .diffie_hellman(&ephemeral_public);
        let mut key = message_key(shared.as_bytes(), &ephemeral_public, own_public.encryption_key());

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let opened = cipher.decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: header,
            },
        );
        key.zeroize();
        let mut signed = opened.map_err(|_| {
            Error::IntegrityCheckFailed(
                "ciphertext does not authenticate under the recipient key".into(),
            )
        })?;

        let mut signature_bytes = [0u8; SIGNATURE_LEN];
        signature_bytes.copy_from_slice(&signed[..SIGNATURE_LEN]);
        let signature = Signature::from_bytes(&signature_bytes);
        let plaintext = signed[SIGNATURE_LEN..].to_vec();
        signed.zeroize();

        sender
            .verifying_key()
            .verify(&plaintext, &signature)
            .map_err(|_| {
                Error::SignatureInvalid(format!(
                    "message was not signed by key {}",
                    sender.fingerprint()
                ))
            })?;

        Ok(plaintext)
    }
}
