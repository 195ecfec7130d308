//! Ed25519 implementation of [`MpcEngine`]
//!
//! Every party's secret is shared with a degree-1 polynomial whose
//! coefficient is derived from its seed, so the party's own evaluation
//! never has to be stored. A party's share of the combined key is its own
//! evaluation plus the evaluations the other two parties sent it.

use super::{hd, shamir, MpcEngine};
use crate::{
    Error, FinalSignature, GShare, KeyCombine, KeyShare, PShare, RShare, Result, Role, SignShare,
    ThresholdConfig, UShare, XShare, YShare,
};
use curve25519_dalek::{
    constants::ED25519_BASEPOINT_POINT, edwards::CompressedEdwardsY, EdwardsPoint, Scalar,
};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha512};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use zeroize::Zeroize;

const POLYNOMIAL_DOMAIN: &[u8] = b"tss-eddsa/polynomial";
const NONCE_SPLIT_DOMAIN: &[u8] = b"tss-eddsa/nonce-split";

/// Threshold EdDSA over Ed25519
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Engine;

impl Ed25519Engine {
    pub fn new() -> Self {
        Self
    }
}

fn clamp(mut bytes: [u8; 32]) -> [u8; 32] {
    bytes[0] &= 248;
    bytes[31] &= 127;
    bytes[31] |= 64;
    bytes
}

fn hash_to_scalar(parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    Scalar::from_hash(hasher)
}

fn random_seed() -> [u8; 64] {
    let mut seed = [0u8; 64];
    OsRng.fill_bytes(&mut seed);
    seed
}

fn decode_scalar(name: &str, bytes: &[u8; 32]) -> Result<Scalar> {
    Option::from(Scalar::from_canonical_bytes(*bytes))
        .ok_or_else(|| Error::Crypto(format!("{name} is not a canonical scalar")))
}

fn decode_point(name: &str, bytes: &[u8; 32]) -> Result<EdwardsPoint> {
    CompressedEdwardsY(*bytes)
        .decompress()
        .ok_or_else(|| Error::Crypto(format!("{name} is not a valid curve point")))
}

fn encode_point(point: &EdwardsPoint) -> [u8; 32] {
    point.compress().to_bytes()
}

/// Secret polynomial `f(x) = u + a·x` and nonce prefix recomputed from a u-share seed
struct Polynomial {
    u: Scalar,
    a: Scalar,
    prefix: [u8; 32],
}

impl Polynomial {
    fn from_seed(seed: &[u8; 32]) -> Self {
        let mut expanded = [0u8; 64];
        expanded.copy_from_slice(&Sha512::digest(seed));

        let mut low = [0u8; 32];
        low.copy_from_slice(&expanded[..32]);
        let mut prefix = [0u8; 32];
        prefix.copy_from_slice(&expanded[32..]);

        let u = Scalar::from_bytes_mod_order(clamp(low));
        let a = hash_to_scalar(&[POLYNOMIAL_DOMAIN, seed]);

        expanded.zeroize();
        low.zeroize();
        Self { u, a, prefix }
    }

    fn evaluate(&self, x: Role) -> Scalar {
        shamir::evaluate(&[self.u, self.a], x.index())
    }
}

impl Drop for Polynomial {
    fn drop(&mut self) {
        self.u.zeroize();
        self.a.zeroize();
        self.prefix.zeroize();
    }
}

/// Received y-shares must be addressed to `owner`, one per other role
fn check_y_shares(owner: Role, y_shares: &[&YShare]) -> Result<()> {
    let mut senders = BTreeSet::new();
    for share in y_shares {
        if share.j != owner {
            return Err(Error::YShareProvenanceInvalid(format!(
                "share from {} is addressed to {}, expected {owner}",
                share.i, share.j
            )));
        }
        if share.i == owner {
            return Err(Error::YShareProvenanceInvalid(format!(
                "{owner} cannot receive a share from itself"
            )));
        }
        if !senders.insert(share.i) {
            return Err(Error::YShareProvenanceInvalid(format!(
                "duplicate share from {}",
                share.i
            )));
        }
    }
    Ok(())
}

impl MpcEngine for Ed25519Engine {
    fn key_share(
        &self,
        role: Role,
        config: ThresholdConfig,
        seed: Option<&[u8; 64]>,
    ) -> Result<KeyShare> {
        let config = ThresholdConfig::new(config.threshold, config.parties)?;
        let mut seed = seed.copied().unwrap_or_else(random_seed);

        let mut secret_seed = [0u8; 32];
        secret_seed.copy_from_slice(&seed[..32]);
        let mut chaincode = [0u8; 32];
        chaincode.copy_from_slice(&seed[32..]);
        seed.zeroize();

        let poly = Polynomial::from_seed(&secret_seed);
        let y = encode_point(&(ED25519_BASEPOINT_POINT * poly.u));
        let v = encode_point(&(ED25519_BASEPOINT_POINT * poly.a));

        let y_shares = role
            .others()
            .into_iter()
            .map(|recipient| {
                let share = YShare {
                    i: role,
                    j: recipient,
                    y,
                    v: Some(v),
                    u: poly.evaluate(recipient).to_bytes(),
                    chaincode,
                };
                (recipient, share)
            })
            .collect();

        debug!(role = %role, "Generated key share");

        Ok(KeyShare {
            u_share: UShare {
                i: role,
                t: config.threshold,
                n: config.parties,
                y,
                seed: secret_seed,
                chaincode,
            },
            y_shares,
        })
    }

    fn key_combine(&self, u_share: &UShare, y_shares: &[&YShare]) -> Result<KeyCombine> {
        let owner = u_share.i;
        check_y_shares(owner, y_shares)?;
        for sender in owner.others() {
            if !y_shares.iter().any(|s| s.i == sender) {
                return Err(Error::MissingYShare(sender));
            }
        }

        let poly = Polynomial::from_seed(&u_share.seed);
        let own_y = ED25519_BASEPOINT_POINT * poly.u;
        if encode_point(&own_y) != u_share.y {
            return Err(Error::Crypto(format!(
                "u-share of {owner} does not match its public commitment"
            )));
        }

        let mut y = own_y;
        let mut chaincode = u_share.chaincode;
        for share in y_shares {
            let sender_y = decode_point("y", &share.y)?;
            if let Some(v) = &share.v {
                let v = decode_point("v", v)?;
                let u = decode_scalar("u", &share.u)?;
                if !shamir::verify(u, &sender_y, &[v], owner.index()) {
                    return Err(Error::CommitmentMismatch(share.i));
                }
            }
            y += sender_y;
            chaincode = hd::add_chaincodes(&chaincode, &share.chaincode);
        }

        let p_share = PShare {
            i: owner,
            t: u_share.t,
            n: u_share.n,
            y: encode_point(&y),
            u: poly.evaluate(owner).to_bytes(),
            prefix: poly.prefix,
            chaincode,
        };
        let common_keychain = p_share.common_keychain();

        Ok(KeyCombine {
            p_share,
            common_keychain,
        })
    }

    fn key_derive(&self, u_share: &UShare, y_shares: &[&YShare], path: &str) -> Result<PShare> {
        let indices = hd::parse_path(path)?;
        let mut p_share = self.key_combine(u_share, y_shares)?.p_share;

        let y = decode_point("y", &p_share.y)?;
        let derived = hd::derive_public(&y, &p_share.chaincode, &indices)?;

        let u = decode_scalar("u", &p_share.u)?;
        p_share.u = (u + derived.tweak).to_bytes();
        p_share.y = encode_point(&derived.public_key);
        p_share.chaincode = derived.chaincode;

        Ok(p_share)
    }

    fn derive_common_keychain(&self, common_keychain: &str, path: &str) -> Result<String> {
        let indices = hd::parse_path(path)?;
        let (y, chaincode) = crate::CommonKeychain::parse(common_keychain)?.parts()?;
        let y = decode_point("y", &y)?;

        let derived = hd::derive_public(&y, &chaincode, &indices)?;
        Ok(crate::codec::encode_keychain(
            &encode_point(&derived.public_key),
            &derived.chaincode,
        ))
    }

    fn sign_share(
        &self,
        payload: &[u8],
        p_share: &PShare,
        counterparties: &[Role],
        seed: Option<&[u8; 64]>,
    ) -> Result<SignShare> {
        let me = p_share.i;
        let distinct: BTreeSet<Role> = counterparties.iter().copied().collect();
        if distinct.contains(&me) || distinct.len() != counterparties.len() {
            return Err(Error::InvalidConfig(format!(
                "invalid counterparties {counterparties:?} for {me}"
            )));
        }
        if counterparties.len() + 1 != usize::from(p_share.t) {
            return Err(Error::InvalidConfig(format!(
                "{} counterparties given, threshold is {}",
                counterparties.len(),
                p_share.t
            )));
        }

        let mut seed = seed.copied().unwrap_or_else(random_seed);
        let r = hash_to_scalar(&[&p_share.prefix, payload, &seed]);
        let r_bytes = r.to_bytes();
        let split_coefficient = hash_to_scalar(&[NONCE_SPLIT_DOMAIN, &r_bytes, &seed]);
        seed.zeroize();

        let mut indices = vec![me.index()];
        indices.extend(counterparties.iter().map(|c| c.index()));
        let (shares, _) = shamir::split(r, &[split_coefficient], &indices);

        let big_r = encode_point(&(ED25519_BASEPOINT_POINT * r));
        let share_at = |role: Role| {
            shares
                .get(&role.index())
                .copied()
                .ok_or_else(|| Error::Crypto(format!("missing nonce share for {role}")))
        };

        let x_share = XShare {
            i: me,
            y: p_share.y,
            u: p_share.u,
            r: share_at(me)?.to_bytes(),
            big_r,
        };

        let mut r_shares = BTreeMap::new();
        for &counterparty in counterparties {
            let r_j = share_at(counterparty)?;
            r_shares.insert(
                counterparty,
                RShare {
                    i: me,
                    j: counterparty,
                    r: r_j.to_bytes(),
                    big_r,
                    commitment: Some(encode_point(&(ED25519_BASEPOINT_POINT * r_j))),
                },
            );
        }

        Ok(SignShare { x_share, r_shares })
    }

    fn sign(
        &self,
        payload: &[u8],
        x_share: &XShare,
        r_shares: &[RShare],
        y_shares: &[&YShare],
    ) -> Result<GShare> {
        let me = x_share.i;
        check_y_shares(me, y_shares)?;

        let mut big_r = decode_point("R", &x_share.big_r)?;
        let mut r = decode_scalar("r", &x_share.r)?;
        for share in r_shares {
            if share.j != me || share.i == me {
                return Err(Error::RShareDirectionInvalid {
                    expected_from: share.i,
                    expected_to: me,
                    actual_from: share.i,
                    actual_to: share.j,
                });
            }
            let r_j = decode_scalar("r", &share.r)?;
            if let Some(commitment) = &share.commitment {
                if encode_point(&(ED25519_BASEPOINT_POINT * r_j)) != *commitment {
                    return Err(Error::CommitmentMismatch(share.i));
                }
            }
            big_r += decode_point("R", &share.big_r)?;
            r += r_j;
        }

        let mut x = decode_scalar("u", &x_share.u)?;
        for share in y_shares {
            x += decode_scalar("u", &share.u)?;
        }

        let big_r = encode_point(&big_r);
        let k = hash_to_scalar(&[&big_r, &x_share.y, payload]);
        let gamma = r + k * x;
        x.zeroize();
        r.zeroize();

        Ok(GShare {
            i: me,
            y: x_share.y,
            gamma: gamma.to_bytes(),
            big_r,
        })
    }

    fn sign_combine(&self, g_shares: &[GShare]) -> Result<FinalSignature> {
        let first = g_shares
            .first()
            .ok_or_else(|| Error::Crypto("no g-shares to combine".into()))?;

        let mut gammas = BTreeMap::new();
        for share in g_shares {
            if share.y != first.y || share.big_r != first.big_r {
                return Err(Error::Crypto(format!(
                    "g-share from {} signs a different key or nonce",
                    share.i
                )));
            }
            let gamma = decode_scalar("gamma", &share.gamma)?;
            if gammas.insert(share.i.index(), gamma).is_some() {
                return Err(Error::Crypto(format!("duplicate g-share from {}", share.i)));
            }
        }

        let sigma = shamir::combine(&gammas)?;
        Ok(FinalSignature {
            y: first.y,
            big_r: first.big_r,
            sigma: sigma.to_bytes(),
        })
    }

    fn verify(&self, payload: &[u8], signature: &FinalSignature) -> Result<()> {
        let key = VerifyingKey::from_bytes(&signature.y)
            .map_err(|e| Error::Crypto(format!("invalid public key: {e}")))?;
        let sig = Signature::from_bytes(&signature.to_bytes());
        key.verify(payload, &sig)
            .map_err(|e| Error::Crypto(format!("signature does not verify: {e}")))
    }
}
