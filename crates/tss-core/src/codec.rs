//! Wire encoding of shares
//!
//! Scalars and curve points travel as 32-byte little-endian hex strings,
//! chain codes as 32-byte big-endian hex. Multi-field shares are plain
//! hex concatenations with fixed 64-character fields:
//!
//! | share            | layout                 |
//! |------------------|------------------------|
//! | round-1 record   | `r ∥ R`                |
//! | round-2 record   | `R ∥ gamma`            |
//! | public y-share   | `y ∥ v ∥ chaincode`    |
//! | private y-share  | `u ∥ chaincode`        |
//! | common keychain  | `y ∥ chaincode`        |

use crate::{Error, Result};

/// Length of one hex-encoded 32-byte field
pub const FIELD_HEX_LEN: usize = 64;

/// Decode one 32-byte hex field, naming it in the error
pub fn decode_field(name: &str, value: &str) -> Result<[u8; 32]> {
    if value.len() != FIELD_HEX_LEN {
        return Err(Error::Codec(format!(
            "{name}: expected {FIELD_HEX_LEN} hex characters, got {}",
            value.len()
        )));
    }
    let mut out = [0u8; 32];
    hex::decode_to_slice(value, &mut out).map_err(|e| Error::Codec(format!("{name}: {e}")))?;
    Ok(out)
}

/// Split a concatenation of `N` fields and decode each one
fn decode_fields<const N: usize>(share: &str, names: [&str; N]) -> Result<[[u8; 32]; N]> {
    if share.len() != N * FIELD_HEX_LEN {
        return Err(Error::Codec(format!(
            "expected {} hex characters for {}, got {}",
            N * FIELD_HEX_LEN,
            names.join(" || "),
            share.len()
        )));
    }
    let mut out = [[0u8; 32]; N];
    for (k, name) in names.iter().enumerate() {
        let start = k * FIELD_HEX_LEN;
        let field = share
            .get(start..start + FIELD_HEX_LEN)
            .ok_or_else(|| Error::Codec(format!("{name}: not valid hex")))?;
        out[k] = decode_field(name, field)?;
    }
    Ok(out)
}

fn encode_fields(fields: &[&[u8; 32]]) -> String {
    fields.iter().map(hex::encode).collect()
}

/// Round-1 share: `r ∥ R`
pub fn encode_r_share(r: &[u8; 32], big_r: &[u8; 32]) -> String {
    encode_fields(&[r, big_r])
}

/// Inverse of [`encode_r_share`], returns `(r, R)`
pub fn decode_r_share(share: &str) -> Result<([u8; 32], [u8; 32])> {
    let [r, big_r] = decode_fields(share, ["r", "R"])?;
    Ok((r, big_r))
}

/// Round-2 share: `R ∥ gamma`
pub fn encode_g_share(big_r: &[u8; 32], gamma: &[u8; 32]) -> String {
    encode_fields(&[big_r, gamma])
}

/// Inverse of [`encode_g_share`], returns `(R, gamma)`
pub fn decode_g_share(share: &str) -> Result<([u8; 32], [u8; 32])> {
    let [big_r, gamma] = decode_fields(share, ["R", "gamma"])?;
    Ok((big_r, gamma))
}

/// Public half of a y-share sent in the clear: `y ∥ v ∥ chaincode`
pub fn encode_public_share(y: &[u8; 32], v: &[u8; 32], chaincode: &[u8; 32]) -> String {
    encode_fields(&[y, v, chaincode])
}

/// Inverse of [`encode_public_share`], returns `(y, v, chaincode)`
pub fn decode_public_share(share: &str) -> Result<([u8; 32], [u8; 32], [u8; 32])> {
    let [y, v, chaincode] = decode_fields(share, ["y", "v", "chaincode"])?;
    Ok((y, v, chaincode))
}

/// Secret half of a y-share, the plaintext handed to the secure channel: `u ∥ chaincode`
pub fn encode_private_share(u: &[u8; 32], chaincode: &[u8; 32]) -> String {
    encode_fields(&[u, chaincode])
}

/// Inverse of [`encode_private_share`], returns `(u, chaincode)`
pub fn decode_private_share(share: &str) -> Result<([u8; 32], [u8; 32])> {
    let [u, chaincode] = decode_fields(share, ["u", "chaincode"])?;
    Ok((u, chaincode))
}

/// Common keychain: `y ∥ chaincode`
pub fn encode_keychain(y: &[u8; 32], chaincode: &[u8; 32]) -> String {
    encode_fields(&[y, chaincode])
}

/// Inverse of [`encode_keychain`], returns `(y, chaincode)`
pub fn decode_keychain(keychain: &str) -> Result<([u8; 32], [u8; 32])> {
    let [y, chaincode] = decode_fields(keychain, ["y", "chaincode"])?;
    Ok((y, chaincode))
}

/// Serde adapter for 32-byte fields as lowercase hex
pub mod hex32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::decode_field("field", &s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for optional 32-byte fields
pub mod hex32_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| super::decode_field("field", &s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Serde adapter carrying a [`Role`](crate::Role) as its party index (1, 2, 3)
pub mod role_index {
    use crate::Role;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(role: &Role, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(role.index())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Role, D::Error>
    where
        D: Deserializer<'de>,
    {
        let index = u8::deserialize(deserializer)?;
        Role::from_index(index).map_err(serde::de::Error::custom)
    }
}
