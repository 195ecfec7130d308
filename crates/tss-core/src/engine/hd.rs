//! Non-hardened Ed25519-BIP32 public derivation
//!
//! Only the public key and chain code are needed, so every party derives the
//! same child keychain and the same additive tweak for its secret share.

use crate::{Error, Result};
use curve25519_dalek::{constants::ED25519_BASEPOINT_POINT, EdwardsPoint, Scalar};
use derivation_path::{ChildIndex, DerivationPath};
use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Result of deriving along a path
#[derive(Debug, Clone)]
pub struct Derived {
    /// Sum of the per-level tweaks; add to the secret to get the child secret
    pub tweak: Scalar,
    /// Child public key, `parent + tweak·B`
    pub public_key: EdwardsPoint,
    /// Child chain code
    pub chaincode: [u8; 32],
}

/// Parse a BIP32 path such as `m/0/1`, rejecting hardened components
pub fn parse_path(path: &str) -> Result<Vec<u32>> {
    let derivation_path: DerivationPath = path
        .parse()
        .map_err(|e| Error::Derivation(format!("Invalid path {path}: {e:?}")))?;

    derivation_path
        .path()
        .iter()
        .map(|child_index| match child_index {
            ChildIndex::Normal(idx) => Ok(*idx),
            ChildIndex::Hardened(idx) => Err(Error::Derivation(format!(
                "Hardened index {idx}' cannot be derived from a shared key"
            ))),
        })
        .collect()
}

/// Derive along `indices` from a public key and chain code
pub fn derive_public(
    public_key: &EdwardsPoint,
    chaincode: &[u8; 32],
    indices: &[u32],
) -> Result<Derived> {
    let mut derived = Derived {
        tweak: Scalar::ZERO,
        public_key: *public_key,
        chaincode: *chaincode,
    };

    for &index in indices {
        let (tweak, chaincode) = derive_step(&derived.public_key, &derived.chaincode, index)?;
        derived.tweak += tweak;
        derived.public_key += ED25519_BASEPOINT_POINT * tweak;
        derived.chaincode = chaincode;
    }

    Ok(derived)
}

/// One level: `Z = HMAC(c, 0x02 ∥ A ∥ i)`, tweak `8·ZL`; `c' = HMAC(c, 0x03 ∥ A ∥ i)[32..]`
fn derive_step(
    public_key: &EdwardsPoint,
    chaincode: &[u8; 32],
    index: u32,
) -> Result<(Scalar, [u8; 32])> {
    let encoded = public_key.compress().to_bytes();
    let index_bytes = index.to_le_bytes();

    let z = hmac(chaincode, 0x02, &encoded, &index_bytes)?;
    let mut zl = [0u8; 32];
    zl[..28].copy_from_slice(&z[..28]);
    let tweak = Scalar::from(8u64) * Scalar::from_bytes_mod_order(zl);

    let c = hmac(chaincode, 0x03, &encoded, &index_bytes)?;
    let mut child_chaincode = [0u8; 32];
    child_chaincode.copy_from_slice(&c[32..]);

    Ok((tweak, child_chaincode))
}

fn hmac(key: &[u8; 32], tag: u8, public_key: &[u8; 32], index: &[u8; 4]) -> Result<[u8; 64]> {
    let mut mac =
        HmacSha512::new_from_slice(key).map_err(|e| Error::Derivation(e.to_string()))?;
    mac.update(&[tag]);
    mac.update(public_key);
    mac.update(index);

    let mut out = [0u8; 64];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Sum two big-endian chain codes modulo 2^256
pub fn add_chaincodes(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry = 0u16;
    for k in (0..32).rev() {
        let sum = u16::from(a[k]) + u16::from(b[k]) + carry;
        out[k] = sum as u8;
        carry = sum >> 8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent() -> (EdwardsPoint, [u8; 32]) {
        let secret = Scalar::from(0x1234_5678u64);
        (ED25519_BASEPOINT_POINT * secret, [0x5a; 32])
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path("m/0").unwrap(), vec![0]);
        assert_eq!(parse_path("m/0/7/42").unwrap(), vec![0, 7, 42]);
        assert!(parse_path("m/0'").is_err());
        assert!(matches!(
            parse_path("not a path").unwrap_err(),
            Error::Derivation(_)
        ));
    }

    #[test]
    fn test_tweak_matches_public_key() {
        let (public_key, chaincode) = parent();
        let derived = derive_public(&public_key, &chaincode, &[0, 3]).unwrap();

        assert_eq!(
            derived.public_key,
            public_key + ED25519_BASEPOINT_POINT * derived.tweak
        );
        assert_ne!(derived.chaincode, chaincode);
    }

    #[test]
    fn test_multi_level_equals_stepwise() {
        let (public_key, chaincode) = parent();
        let direct = derive_public(&public_key, &chaincode, &[1, 2]).unwrap();

        let first = derive_public(&public_key, &chaincode, &[1]).unwrap();
        let second = derive_public(&first.public_key, &first.chaincode, &[2]).unwrap();

        assert_eq!(direct.public_key, second.public_key);
        assert_eq!(direct.chaincode, second.chaincode);
        assert_eq!(direct.tweak, first.tweak + second.tweak);
    }

    #[test]
    fn test_distinct_indices_diverge() {
        let (public_key, chaincode) = parent();
        let a = derive_public(&public_key, &chaincode, &[0]).unwrap();
        let b = derive_public(&public_key, &chaincode, &[1]).unwrap();
        assert_ne!(a.public_key, b.public_key);
    }

    #[test]
    fn test_add_chaincodes_carries() {
        let mut a = [0u8; 32];
        a[31] = 0xff;
        let mut b = [0u8; 32];
        b[31] = 0x01;

        let sum = add_chaincodes(&a, &b);
        assert_eq!(sum[31], 0x00);
        assert_eq!(sum[30], 0x01);

        // wraps modulo 2^256
        assert_eq!(add_chaincodes(&[0xff; 32], &b), [0u8; 32]);
    }
}
