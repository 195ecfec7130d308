//! Error types for TSS key combination and signing

use crate::types::Role;
use thiserror::Error;

/// Result type alias for TSS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of every failure this crate can surface.
///
/// Operators use this to tell a local bug from a tampered share or a
/// service outage without digging into the variant payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Share ownership, provenance or index checks; raised before any network call
    LocalValidation,
    /// Secure-channel decryption or sender-authentication failures
    Transport,
    /// Parties disagree on shared key material
    Consistency,
    /// Coordination Service failures, passed through verbatim
    Remote,
    /// Malformed hex, armor, points, paths or configuration
    Encoding,
}

/// Errors that can occur while generating, combining or signing with key shares
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid threshold or party configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A y-share cannot be addressed to the given index
    #[error("Invalid recipient: index {recipient} for a key share owned by {owner}")]
    InvalidRecipient { owner: Role, recipient: u8 },

    /// The encrypted share could not be opened with the recipient key
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// The message was addressed to this key but altered in transit
    #[error("Integrity check failed: {0}")]
    IntegrityCheckFailed(String),

    /// The share decrypted but was not signed by the stated sender
    #[error("Sender signature invalid: {0}")]
    SignatureInvalid(String),

    /// The locally derived common keychain differs from the expected one
    #[error("Common keychains do not match: expected {expected}, derived {derived}")]
    CommonKeychainMismatch { expected: String, derived: String },

    /// A y-share from the given role is required but was not supplied
    #[error("Missing y-share from {0}")]
    MissingYShare(Role),

    /// A y-share is not addressed as expected
    #[error("Invalid y-share: {0}")]
    YShareProvenanceInvalid(String),

    /// The p-share does not belong to the calling party
    #[error("Invalid PShare: belongs to {actual}, expected {expected}")]
    PShareOwnershipMismatch { expected: Role, actual: Role },

    /// No r-share was prepared for the counterparty
    #[error("RShare for {0} not found")]
    RShareNotFound(Role),

    /// The r-share exists but is not addressed from the caller to the counterparty
    #[error("Invalid RShare: is {actual_from}->{actual_to}, expected {expected_from}->{expected_to}")]
    RShareProvenanceInvalid {
        expected_from: Role,
        expected_to: Role,
        actual_from: Role,
        actual_to: Role,
    },

    /// The TxRequest carries no signature shares at all
    #[error("No signature shares found for id: {0}")]
    NoSignatureShares(String),

    /// The TxRequest log holds no share in the expected direction
    #[error("{from} to {to} RShare not found for id: {tx_request_id}")]
    CounterpartyRShareNotFound {
        from: Role,
        to: Role,
        tx_request_id: String,
    },

    /// This party already offered an r-share on the TxRequest; a restarted
    /// session needs a new TxRequest
    #[error("{from} to {to} RShare already offered for id: {tx_request_id}; open a new TxRequest")]
    RShareAlreadyOffered {
        from: Role,
        to: Role,
        tx_request_id: String,
    },

    /// The x-share does not belong to the calling party
    #[error("Invalid XShare: belongs to {actual}, expected {expected}")]
    XShareOwnershipMismatch { expected: Role, actual: Role },

    /// The counterparty's r-share record travels in the wrong direction
    #[error("Invalid RShare: is {actual_from}->{actual_to}, expected {expected_from}->{expected_to}")]
    RShareDirectionInvalid {
        expected_from: Role,
        expected_to: Role,
        actual_from: Role,
        actual_to: Role,
    },

    /// The commitment record is not of type `commitment`
    #[error("Invalid commitment type: {0}")]
    InvalidCommitmentType(String),

    /// The r-share does not open the commitment published by its sender
    #[error("Could not verify share from {0} against its commitment")]
    CommitmentMismatch(Role),

    /// The g-share does not belong to the calling party
    #[error("Invalid GShare: belongs to {actual}, expected {expected}")]
    GShareOwnershipMismatch { expected: Role, actual: Role },

    /// The signing session was driven out of order
    #[error("Invalid session transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: crate::sign::SessionState,
        to: crate::sign::SessionState,
    },

    /// The Coordination Service holds no TxRequest with this id
    #[error("Unable to find TxRequest with id {0}")]
    TxRequestNotFound(String),

    /// The Coordination Service answered with an error
    #[error("Coordination service error (status {status:?}): {message}")]
    Remote { status: Option<u16>, message: String },

    /// Malformed hex field, armor block or share encoding
    #[error("Codec error: {0}")]
    Codec(String),

    /// Curve arithmetic failed (invalid point, zero denominator, bad signature)
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Key derivation error
    #[error("Key derivation error: {0}")]
    Derivation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    /// Map this error onto the failure taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRecipient { .. }
            | Error::MissingYShare(_)
            | Error::YShareProvenanceInvalid(_)
            | Error::PShareOwnershipMismatch { .. }
            | Error::RShareNotFound(_)
            | Error::RShareProvenanceInvalid { .. }
            | Error::NoSignatureShares(_)
            | Error::CounterpartyRShareNotFound { .. }
            | Error::RShareAlreadyOffered { .. }
            | Error::XShareOwnershipMismatch { .. }
            | Error::RShareDirectionInvalid { .. }
            | Error::InvalidCommitmentType(_)
            | Error::GShareOwnershipMismatch { .. }
            | Error::InvalidTransition { .. } => ErrorKind::LocalValidation,
            Error::DecryptionFailed(_)
            | Error::IntegrityCheckFailed(_)
            | Error::SignatureInvalid(_) => ErrorKind::Transport,
            Error::CommonKeychainMismatch { .. } | Error::CommitmentMismatch(_) => {
                ErrorKind::Consistency
            }
            Error::TxRequestNotFound(_) | Error::Remote { .. } => ErrorKind::Remote,
            Error::InvalidConfig(_)
            | Error::Codec(_)
            | Error::Crypto(_)
            | Error::Derivation(_)
            | Error::Serialization(_)
            | Error::Deserialization(_) => ErrorKind::Encoding,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Codec(e.to_string())
    }
}
