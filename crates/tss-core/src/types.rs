//! Core types for the 2-of-3 TSS wallet protocol

use crate::codec::{self, hex32, hex32_opt, role_index};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A key holder of the wallet. The discriminant is the party index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User = 1,
    Backup = 2,
    Bitgo = 3,
}

impl Role {
    /// All roles in index order
    pub const ALL: [Role; 3] = [Role::User, Role::Backup, Role::Bitgo];

    /// Party index (1, 2 or 3)
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Resolve a party index
    pub fn from_index(index: u8) -> Result<Role> {
        match index {
            1 => Ok(Role::User),
            2 => Ok(Role::Backup),
            3 => Ok(Role::Bitgo),
            other => Err(Error::InvalidConfig(format!("Invalid party index: {other}"))),
        }
    }

    /// The two roles other than `self`, in index order
    pub fn others(self) -> [Role; 2] {
        match self {
            Role::User => [Role::Backup, Role::Bitgo],
            Role::Backup => [Role::User, Role::Bitgo],
            Role::Bitgo => [Role::User, Role::Backup],
        }
    }

    /// The role that is neither `self` nor `other`
    pub fn third(self, other: Role) -> Result<Role> {
        Role::ALL
            .into_iter()
            .find(|r| *r != self && *r != other)
            .filter(|_| self != other)
            .ok_or_else(|| Error::InvalidConfig(format!("{self} has no third party with itself")))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Backup => write!(f, "backup"),
            Role::Bitgo => write!(f, "bitgo"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "user" | "1" => Ok(Role::User),
            "backup" | "2" => Ok(Role::Backup),
            "bitgo" | "3" => Ok(Role::Bitgo),
            other => Err(Error::InvalidConfig(format!("Unknown role: {other}"))),
        }
    }
}

/// Threshold configuration. Only 2-of-3 is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Shares required to sign
    pub threshold: u8,
    /// Total number of shares
    pub parties: u8,
}

impl ThresholdConfig {
    /// Validate a `(threshold, parties)` pair
    pub fn new(threshold: u8, parties: u8) -> Result<Self> {
        if usize::from(threshold) != crate::DEFAULT_THRESHOLD
            || usize::from(parties) != crate::DEFAULT_PARTIES
        {
            return Err(Error::InvalidConfig(format!(
                "Only 2-of-3 is supported, got {threshold}-of-{parties}"
            )));
        }
        Ok(Self { threshold, parties })
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            threshold: crate::DEFAULT_THRESHOLD as u8,
            parties: crate::DEFAULT_PARTIES as u8,
        }
    }
}

/// A party's own secret contribution from key generation
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct UShare {
    /// Owner
    #[zeroize(skip)]
    #[serde(with = "role_index")]
    pub i: Role,
    /// Threshold
    pub t: u8,
    /// Total parties
    pub n: u8,
    /// Public commitment `u·B`
    #[zeroize(skip)]
    #[serde(with = "hex32")]
    pub y: [u8; 32],
    /// Secret seed; `u` and the sharing polynomial are derived from it
    #[serde(with = "hex32")]
    pub seed: [u8; 32],
    /// Chain-code contribution
    #[zeroize(skip)]
    #[serde(with = "hex32")]
    pub chaincode: [u8; 32],
}

impl fmt::Debug for UShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UShare")
            .field("i", &self.i)
            .field("t", &self.t)
            .field("n", &self.n)
            .field("y", &hex::encode(self.y))
            .finish_non_exhaustive()
    }
}

/// Share of one party's secret, addressed to another party
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct YShare {
    /// Sender
    #[zeroize(skip)]
    #[serde(with = "role_index")]
    pub i: Role,
    /// Recipient
    #[zeroize(skip)]
    #[serde(with = "role_index")]
    pub j: Role,
    /// Sender's public commitment
    #[zeroize(skip)]
    #[serde(with = "hex32")]
    pub y: [u8; 32],
    /// Feldman commitment to the sender's polynomial coefficient
    #[zeroize(skip)]
    #[serde(with = "hex32_opt", default, skip_serializing_if = "Option::is_none")]
    pub v: Option<[u8; 32]>,
    /// Evaluation of the sender's polynomial at the recipient index
    #[serde(with = "hex32")]
    pub u: [u8; 32],
    /// Sender's chain-code contribution
    #[zeroize(skip)]
    #[serde(with = "hex32")]
    pub chaincode: [u8; 32],
}

impl fmt::Debug for YShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YShare")
            .field("i", &self.i)
            .field("j", &self.j)
            .field("y", &hex::encode(self.y))
            .finish_non_exhaustive()
    }
}

/// Output of key generation for one party
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyShare {
    pub u_share: UShare,
    /// One share per other party, keyed by recipient
    pub y_shares: BTreeMap<Role, YShare>,
}

impl KeyShare {
    /// Owner of this key share
    pub fn role(&self) -> Role {
        self.u_share.i
    }
}

/// Combined signing key of one party
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct PShare {
    #[zeroize(skip)]
    #[serde(with = "role_index")]
    pub i: Role,
    pub t: u8,
    pub n: u8,
    /// Combined public key
    #[zeroize(skip)]
    #[serde(with = "hex32")]
    pub y: [u8; 32],
    /// This party's share of the combined secret, before adding received y-shares
    #[serde(with = "hex32")]
    pub u: [u8; 32],
    /// Nonce-derivation prefix
    #[serde(with = "hex32")]
    pub prefix: [u8; 32],
    /// Combined chain code
    #[zeroize(skip)]
    #[serde(with = "hex32")]
    pub chaincode: [u8; 32],
}

impl PShare {
    /// `y ∥ chaincode` of this key
    pub fn common_keychain(&self) -> CommonKeychain {
        CommonKeychain::from_parts(&self.y, &self.chaincode)
    }
}

impl fmt::Debug for PShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PShare")
            .field("i", &self.i)
            .field("y", &hex::encode(self.y))
            .field("chaincode", &hex::encode(self.chaincode))
            .finish_non_exhaustive()
    }
}

/// Result of combining a u-share with received y-shares
#[derive(Debug, Clone)]
pub struct KeyCombine {
    pub p_share: PShare,
    pub common_keychain: CommonKeychain,
}

/// Shared public key and chain code, identical across all three parties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommonKeychain(String);

impl CommonKeychain {
    pub fn from_parts(y: &[u8; 32], chaincode: &[u8; 32]) -> Self {
        Self(codec::encode_keychain(y, chaincode))
    }

    /// Parse a hex keychain, rejecting anything that is not `y ∥ chaincode`
    pub fn parse(keychain: &str) -> Result<Self> {
        let (y, chaincode) = codec::decode_keychain(&keychain.to_ascii_lowercase())?;
        Ok(Self::from_parts(&y, &chaincode))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(y, chaincode)`
    pub fn parts(&self) -> Result<([u8; 32], [u8; 32])> {
        codec::decode_keychain(&self.0)
    }

    /// Constant-time comparison against an untrusted string; hex case is ignored
    pub fn matches(&self, other: &str) -> bool {
        let ours = self.0.as_bytes();
        let other = other.to_ascii_lowercase();
        let theirs = other.as_bytes();
        ours.len() == theirs.len() && bool::from(ours.ct_eq(theirs))
    }
}

impl fmt::Display for CommonKeychain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The y-shares a party received, named by sender.
///
/// The variant is the owner's role, so a party never holds a slot for
/// a share from itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum PeerYShares {
    User {
        #[serde(rename = "backupYShare")]
        backup: YShare,
        #[serde(rename = "bitgoYShare")]
        bitgo: YShare,
    },
    Backup {
        #[serde(rename = "userYShare")]
        user: YShare,
        #[serde(rename = "bitgoYShare")]
        bitgo: YShare,
    },
    Bitgo {
        #[serde(rename = "userYShare")]
        user: YShare,
        #[serde(rename = "backupYShare")]
        backup: YShare,
    },
}

impl PeerYShares {
    /// Assemble from shares keyed by sender; both other roles are required
    pub fn from_senders(owner: Role, mut by_sender: BTreeMap<Role, YShare>) -> Result<Self> {
        let mut take = |role: Role| by_sender.remove(&role).ok_or(Error::MissingYShare(role));
        Ok(match owner {
            Role::User => PeerYShares::User {
                backup: take(Role::Backup)?,
                bitgo: take(Role::Bitgo)?,
            },
            Role::Backup => PeerYShares::Backup {
                user: take(Role::User)?,
                bitgo: take(Role::Bitgo)?,
            },
            Role::Bitgo => PeerYShares::Bitgo {
                user: take(Role::User)?,
                backup: take(Role::Backup)?,
            },
        })
    }

    /// Role these shares were received by
    pub fn owner(&self) -> Role {
        match self {
            PeerYShares::User { .. } => Role::User,
            PeerYShares::Backup { .. } => Role::Backup,
            PeerYShares::Bitgo { .. } => Role::Bitgo,
        }
    }

    /// Share sent by `sender`, absent for the owner's own role
    pub fn from_sender(&self, sender: Role) -> Option<&YShare> {
        match (self, sender) {
            (PeerYShares::User { backup, .. }, Role::Backup) => Some(backup),
            (PeerYShares::User { bitgo, .. }, Role::Bitgo) => Some(bitgo),
            (PeerYShares::Backup { user, .. }, Role::User) => Some(user),
            (PeerYShares::Backup { bitgo, .. }, Role::Bitgo) => Some(bitgo),
            (PeerYShares::Bitgo { user, .. }, Role::User) => Some(user),
            (PeerYShares::Bitgo { backup, .. }, Role::Backup) => Some(backup),
            _ => None,
        }
    }

    /// Both received shares, in sender index order
    pub fn both(&self) -> [&YShare; 2] {
        match self {
            PeerYShares::User { backup, bitgo } => [backup, bitgo],
            PeerYShares::Backup { user, bitgo } => [user, bitgo],
            PeerYShares::Bitgo { user, backup } => [user, backup],
        }
    }
}

/// A party's durable combined key, persisted by the caller after key setup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningMaterial {
    pub u_share: UShare,
    #[serde(flatten)]
    pub peers: PeerYShares,
    pub common_keychain: CommonKeychain,
}

impl SigningMaterial {
    pub fn role(&self) -> Role {
        self.u_share.i
    }

    /// Received y-shares in sender order, as the engine consumes them
    pub fn y_shares(&self) -> [&YShare; 2] {
        self.peers.both()
    }
}

/// Round-1 private share of the signing nonce and key
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct XShare {
    #[zeroize(skip)]
    #[serde(with = "role_index")]
    pub i: Role,
    /// Signing public key
    #[zeroize(skip)]
    #[serde(with = "hex32")]
    pub y: [u8; 32],
    #[serde(with = "hex32")]
    pub u: [u8; 32],
    #[serde(with = "hex32")]
    pub r: [u8; 32],
    /// This party's nonce commitment
    #[zeroize(skip)]
    #[serde(rename = "R", with = "hex32")]
    pub big_r: [u8; 32],
}

impl fmt::Debug for XShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XShare")
            .field("i", &self.i)
            .field("y", &hex::encode(self.y))
            .field("R", &hex::encode(self.big_r))
            .finish_non_exhaustive()
    }
}

/// Directed round-1 commitment exchange unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RShare {
    /// Sender
    #[serde(with = "role_index")]
    pub i: Role,
    /// Recipient
    #[serde(with = "role_index")]
    pub j: Role,
    /// Share of the sender's nonce at the recipient index
    #[serde(with = "hex32")]
    pub r: [u8; 32],
    /// Sender's nonce commitment
    #[serde(rename = "R", with = "hex32")]
    pub big_r: [u8; 32],
    /// `r·B`, published so the recipient can check `r`
    #[serde(with = "hex32_opt", default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<[u8; 32]>,
}

/// Per-session state of the initiating party
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignShare {
    pub x_share: XShare,
    /// Keyed by counterparty
    pub r_shares: BTreeMap<Role, RShare>,
}

/// A party's final signature share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GShare {
    #[serde(with = "role_index")]
    pub i: Role,
    #[serde(with = "hex32")]
    pub y: [u8; 32],
    #[serde(with = "hex32")]
    pub gamma: [u8; 32],
    #[serde(rename = "R", with = "hex32")]
    pub big_r: [u8; 32],
}

/// Combined Ed25519 signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalSignature {
    /// Public key the signature verifies under
    #[serde(with = "hex32")]
    pub y: [u8; 32],
    #[serde(rename = "R", with = "hex32")]
    pub big_r: [u8; 32],
    #[serde(with = "hex32")]
    pub sigma: [u8; 32],
}

impl FinalSignature {
    /// Raw 64-byte Ed25519 signature (`R ∥ sigma`)
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.big_r);
        bytes[32..].copy_from_slice(&self.sigma);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn y_share(i: Role, j: Role) -> YShare {
        YShare {
            i,
            j,
            y: [i.index(); 32],
            v: None,
            u: [j.index(); 32],
            chaincode: [0; 32],
        }
    }

    #[test]
    fn test_role_indices() {
        for role in Role::ALL {
            assert_eq!(Role::from_index(role.index()).unwrap(), role);
        }
        assert!(Role::from_index(0).is_err());
        assert!(Role::from_index(4).is_err());
        assert_eq!(Role::User.third(Role::Bitgo).unwrap(), Role::Backup);
        assert!(Role::User.third(Role::User).is_err());
    }

    #[test]
    fn test_threshold_config() {
        assert!(ThresholdConfig::new(2, 3).is_ok());
        assert!(ThresholdConfig::new(3, 3).is_err());
        assert!(ThresholdConfig::new(2, 4).is_err());
        assert_eq!(ThresholdConfig::default(), ThresholdConfig::new(2, 3).unwrap());
    }

    #[test]
    fn test_peer_shares_named_by_sender() {
        let mut by_sender = BTreeMap::new();
        by_sender.insert(Role::Backup, y_share(Role::Backup, Role::User));
        by_sender.insert(Role::Bitgo, y_share(Role::Bitgo, Role::User));

        let peers = PeerYShares::from_senders(Role::User, by_sender).unwrap();
        assert_eq!(peers.owner(), Role::User);
        assert!(peers.from_sender(Role::User).is_none());
        assert_eq!(peers.from_sender(Role::Bitgo).unwrap().i, Role::Bitgo);

        let json = serde_json::to_value(&peers).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("backupYShare").is_some());
        assert!(json.get("bitgoYShare").is_some());
        assert!(json.get("userYShare").is_none());
    }

    #[test]
    fn test_peer_shares_require_both_senders() {
        let mut by_sender = BTreeMap::new();
        by_sender.insert(Role::User, y_share(Role::User, Role::Backup));

        let err = PeerYShares::from_senders(Role::Backup, by_sender).unwrap_err();
        assert!(matches!(err, Error::MissingYShare(Role::Bitgo)));
    }

    #[test]
    fn test_keychain_matching() {
        let keychain = CommonKeychain::from_parts(&[7; 32], &[9; 32]);
        assert!(keychain.matches(keychain.as_str()));
        assert!(!keychain.matches("garbage"));
        let lettered = CommonKeychain::from_parts(&[0xab; 32], &[0xcd; 32]);
        assert!(lettered.matches(&lettered.as_str().to_ascii_uppercase()));
        assert!(!lettered.matches(keychain.as_str()));
        assert!(CommonKeychain::parse("garbage").is_err());
        assert_eq!(
            CommonKeychain::parse(&keychain.as_str().to_uppercase()).unwrap(),
            keychain
        );
    }

    #[test]
    fn test_share_index_serialization() {
        let share = y_share(Role::Bitgo, Role::User);
        let json = serde_json::to_value(&share).unwrap();
        assert_eq!(json["i"], 3);
        assert_eq!(json["j"], 1);
        assert!(json.get("v").is_none());

        let back: YShare = serde_json::from_value(json).unwrap();
        assert_eq!(back, share);
    }
}
