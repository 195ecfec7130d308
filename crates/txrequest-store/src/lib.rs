//! TxRequest Store
//!
//! In-memory store behind the development Coordination Service. Each
//! TxRequest belongs to a wallet and carries an append-only signature-share
//! log; entries expire after a TTL.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tss_core::{SignatureShareRecord, TxRequest, UnsignedTx};
use uuid::Uuid;

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unable to find TxRequest with id {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    InvalidFormat(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A TxRequest together with its owner and lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTxRequest {
    pub wallet_id: String,
    pub tx_request: TxRequest,
    /// Encrypted signer shares forwarded with round-1 submissions
    pub signer_shares: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StoredTxRequest {
    fn is_live(&self, wallet_id: &str, now: DateTime<Utc>) -> bool {
        self.wallet_id == wallet_id && self.expires_at > now
    }
}

fn check_hex(name: &str, value: &str) -> Result<()> {
    hex::decode(value)
        .map(|_| ())
        .map_err(|e| StoreError::InvalidFormat(format!("{name}: {e}")))
}

/// TxRequest store
#[derive(Debug, Clone)]
pub struct TxRequestStore {
    /// TxRequests indexed by id
    tx_requests: Arc<DashMap<String, StoredTxRequest>>,
    /// Default TTL in seconds
    ttl_seconds: i64,
}

impl TxRequestStore {
    /// Create a new store
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            tx_requests: Arc::new(DashMap::new()),
            ttl_seconds,
        }
    }

    /// Open a signing session for `unsigned_txs`
    pub fn create(&self, wallet_id: &str, unsigned_txs: Vec<UnsignedTx>) -> Result<TxRequest> {
        if unsigned_txs.is_empty() {
            return Err(StoreError::InvalidFormat(
                "at least one unsigned transaction is required".into(),
            ));
        }
        for tx in &unsigned_txs {
            check_hex("signableHex", &tx.signable_hex)?;
            check_hex("serializedTxHex", &tx.serialized_tx_hex)?;
        }

        let now = Utc::now();
        let expires_at = chrono::Duration::try_seconds(self.ttl_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                StoreError::Internal(format!("TTL of {} seconds is out of range", self.ttl_seconds))
            })?;
        let tx_request = TxRequest {
            tx_request_id: Uuid::new_v4().to_string(),
            unsigned_txs,
            signature_shares: Vec::new(),
        };

        self.tx_requests.insert(
            tx_request.tx_request_id.clone(),
            StoredTxRequest {
                wallet_id: wallet_id.to_string(),
                tx_request: tx_request.clone(),
                signer_shares: Vec::new(),
                created_at: now,
                expires_at,
            },
        );
        Ok(tx_request)
    }

    /// Get a live TxRequest of `wallet_id`
    pub fn get(&self, wallet_id: &str, tx_request_id: &str) -> Result<TxRequest> {
        let now = Utc::now();
        self.tx_requests
            .get(tx_request_id)
            .filter(|entry| entry.is_live(wallet_id, now))
            .map(|entry| entry.tx_request.clone())
            .ok_or_else(|| StoreError::NotFound(tx_request_id.to_string()))
    }

    /// Live TxRequests of `wallet_id` among `ids`; unknown ids are skipped
    pub fn list(&self, wallet_id: &str, ids: &[&str]) -> Vec<TxRequest> {
        ids.iter()
            .filter_map(|id| self.get(wallet_id, id).ok())
            .collect()
    }

    /// Append a record to the signature-share log and echo it back
    pub fn append_signature_share(
        &self,
        wallet_id: &str,
        tx_request_id: &str,
        record: SignatureShareRecord,
        signer_share: Option<String>,
    ) -> Result<SignatureShareRecord> {
        if record.from == record.to {
            return Err(StoreError::InvalidFormat(format!(
                "share cannot be addressed from {} to itself",
                record.from
            )));
        }
        if record.share.is_empty() {
            return Err(StoreError::InvalidFormat("share is empty".into()));
        }
        check_hex("share", &record.share)?;

        let now = Utc::now();
        let mut entry = self
            .tx_requests
            .get_mut(tx_request_id)
            .filter(|entry| entry.is_live(wallet_id, now))
            .ok_or_else(|| StoreError::NotFound(tx_request_id.to_string()))?;

        entry.tx_request.signature_shares.push(record.clone());
        if let Some(share) = signer_share {
            entry.signer_shares.push(share);
        }
        Ok(record)
    }

    /// Remove expired TxRequests
    pub fn cleanup(&self) {
        let now = Utc::now();
        self.tx_requests.retain(|_, v| v.expires_at > now);
    }

    /// Number of stored TxRequests, expired ones included until the next cleanup
    pub fn len(&self) -> usize {
        self.tx_requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx_requests.is_empty()
    }
}

impl Default for TxRequestStore {
    fn default() -> Self {
        Self::new(3600) // 1 hour default TTL
    }
}
