//! In-memory session client

use super::{async_trait, RemoteSessionClient};
use crate::sign::{SignatureShareRecord, TxRequest, UnsignedTx};
use crate::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// TxRequests held in process; clones share the same store
#[derive(Debug, Clone, Default)]
pub struct MemorySessionClient {
    tx_requests: Arc<DashMap<String, TxRequest>>,
}

impl MemorySessionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for `unsigned_txs` under a random id
    pub fn create_tx_request(&self, unsigned_txs: Vec<UnsignedTx>) -> TxRequest {
        let tx_request = TxRequest {
            tx_request_id: hex::encode(rand::random::<[u8; 16]>()),
            unsigned_txs,
            signature_shares: Vec::new(),
        };
        self.insert(tx_request.clone());
        tx_request
    }

    /// Store a TxRequest as is, replacing any with the same id
    pub fn insert(&self, tx_request: TxRequest) {
        self.tx_requests
            .insert(tx_request.tx_request_id.clone(), tx_request);
    }
}

#[async_trait]
impl RemoteSessionClient for MemorySessionClient {
    async fn send_signature_share(
        &self,
        tx_request_id: &str,
        share: &SignatureShareRecord,
        _signer_share: Option<&str>,
    ) -> Result<SignatureShareRecord> {
        let mut entry = self
            .tx_requests
            .get_mut(tx_request_id)
            .ok_or_else(|| Error::TxRequestNotFound(tx_request_id.to_string()))?;

        entry.signature_shares.push(share.clone());
        debug!(
            tx_request_id,
            from = %share.from,
            to = %share.to,
            log_len = entry.signature_shares.len(),
            "Appended signature share"
        );
        Ok(share.clone())
    }

    async fn get_tx_request(&self, tx_request_id: &str) -> Result<TxRequest> {
        self.tx_requests
            .get(tx_request_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::TxRequestNotFound(tx_request_id.to_string()))
    }
}
