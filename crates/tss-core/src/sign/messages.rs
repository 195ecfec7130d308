//! Signing wire types exchanged through the Coordination Service

use crate::{Error, Result, Role};
use serde::{Deserialize, Serialize};

/// `type` value of a commitment record
pub const COMMITMENT_SHARE_TYPE: &str = "commitment";

/// One entry of a TxRequest's signature-share log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureShareRecord {
    pub from: Role,
    pub to: Role,
    /// `r ∥ R` in round 1, `R ∥ gamma` in round 2
    pub share: String,
}

/// Commitment published by a counterparty alongside its r-share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentShareRecord {
    pub from: Role,
    pub to: Role,
    /// Hex `r·B` of the sender's r-share
    pub share: String,
    #[serde(rename = "type")]
    pub share_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTx {
    pub signable_hex: String,
    pub serialized_tx_hex: String,
}

/// Coordination record of one signing session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRequest {
    pub tx_request_id: String,
    pub unsigned_txs: Vec<UnsignedTx>,
    /// Append-only log, in submission order
    #[serde(default)]
    pub signature_shares: Vec<SignatureShareRecord>,
}

impl TxRequest {
    /// Bytes to sign: the first unsigned transaction's signable hex
    pub fn signable_payload(&self) -> Result<Vec<u8>> {
        let tx = self.unsigned_txs.first().ok_or_else(|| {
            Error::Deserialization(format!(
                "TxRequest {} has no unsigned transactions",
                self.tx_request_id
            ))
        })?;
        Ok(hex::decode(&tx.signable_hex)?)
    }
}

/// Body of `POST .../signatureshares`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureShareSubmission {
    pub signature_share: SignatureShareRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_share: Option<String>,
}

/// Response of `GET /wallet/{walletId}/txrequests`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRequestList {
    pub tx_requests: Vec<TxRequest>,
}
