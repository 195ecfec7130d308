//! Boundary to the Coordination Service

use crate::sign::{SignatureShareRecord, TxRequest};
use crate::Result;

pub use ::async_trait::async_trait;

/// Access to TxRequests and their signature-share logs.
///
/// Implementations surface remote failures as
/// [`Error::Remote`](crate::Error::Remote) or
/// [`Error::TxRequestNotFound`](crate::Error::TxRequestNotFound) and never
/// retry on their own.
#[async_trait]
pub trait RemoteSessionClient: Send + Sync {
    /// Append a record to the TxRequest's log; returns the stored record
    async fn send_signature_share(
        &self,
        tx_request_id: &str,
        share: &SignatureShareRecord,
        signer_share: Option<&str>,
    ) -> Result<SignatureShareRecord>;

    /// Latest snapshot of a TxRequest
    async fn get_tx_request(&self, tx_request_id: &str) -> Result<TxRequest>;
}

/// In-memory Coordination Service for tests and local runs
pub mod memory;

pub use memory::MemorySessionClient;
