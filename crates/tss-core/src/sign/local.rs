//! Signing with two key shares held in one place, e.g. User + Backup recovery

use super::SigningSessionCoordinator;
use crate::engine::{Ed25519Engine, MpcEngine};
use crate::session::MemorySessionClient;
use crate::{Error, FinalSignature, Result, Role, SigningMaterial, YShare};
use tracing::{info, instrument};

/// Run both signing rounds locally and return the verified signature.
///
/// The rounds go through the same provenance checks as a remote session;
/// nothing is sent anywhere.
#[instrument(skip_all, fields(first = %first.role(), second = %second.role(), path = %path))]
pub fn sign_locally(
    first: &SigningMaterial,
    second: &SigningMaterial,
    path: &str,
    payload: &[u8],
) -> Result<FinalSignature> {
    if !first
        .common_keychain
        .matches(second.common_keychain.as_str())
    {
        return Err(Error::CommonKeychainMismatch {
            expected: first.common_keychain.to_string(),
            derived: second.common_keychain.to_string(),
        });
    }

    let engine = Ed25519Engine::new();
    let client = MemorySessionClient::new();
    let a = SigningSessionCoordinator::new(first.role(), second.role(), client.clone())?;
    let b = SigningSessionCoordinator::new(second.role(), first.role(), client)?;

    let p_a = engine.key_derive(&first.u_share, &first.y_shares(), path)?;
    let p_b = engine.key_derive(&second.u_share, &second.y_shares(), path)?;
    let sign_a = a.create_sign_share(payload, &p_a)?;
    let sign_b = b.create_sign_share(payload, &p_b)?;

    let r_a = a.r_share_record(&sign_a)?;
    let r_b = b.r_share_record(&sign_b)?;
    let commitment_a = a.commitment_record(&sign_a)?;
    let commitment_b = b.commitment_record(&sign_b)?;

    let third = first.role().third(second.role())?;
    let g_a = a.create_g_share(
        &sign_a,
        &r_b,
        peer(first, second.role())?,
        peer(first, third)?,
        payload,
        Some(&commitment_b),
    )?;
    let g_b = b.create_g_share(
        &sign_b,
        &r_a,
        peer(second, first.role())?,
        peer(second, third)?,
        payload,
        Some(&commitment_a),
    )?;

    let signature = engine.sign_combine(&[g_a, g_b])?;
    engine.verify(payload, &signature)?;

    info!("Signed locally");
    Ok(signature)
}

fn peer(material: &SigningMaterial, sender: Role) -> Result<&YShare> {
    material
        .peers
        .from_sender(sender)
        .ok_or(Error::MissingYShare(sender))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::materials;
    use ed25519_dalek::Verifier;

    #[test]
    fn test_user_and_backup_recovery_signature() {
        let materials = materials();
        let payload = b"recovery sweep";

        let signature = sign_locally(
            &materials[&Role::User],
            &materials[&Role::Backup],
            "m/0",
            payload,
        )
        .unwrap();

        let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&signature.y).unwrap();
        let raw = ed25519_dalek::Signature::from_bytes(&signature.to_bytes());
        assert!(verifying_key.verify(payload, &raw).is_ok());
    }

    #[test]
    fn test_rejects_same_role_twice() {
        let materials = materials();
        let err = sign_locally(
            &materials[&Role::User],
            &materials[&Role::User],
            "m/0",
            b"payload",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
