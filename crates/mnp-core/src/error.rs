//! Error types for `mnp-core`.
//!
//! Failures are split by kind: transient I/O, malformed on-chain payloads,
//! stale gossip, untrusted or misbehaving peers, and fatal state that
//! requires a rebuild. Keeping a variant per kind, instead of a single
//! `String`, lets callers and tests assert on why something failed rather
//! than scraping log text.

use bitcoin::{OutPoint, Txid};

// ==============================================================================
// Chain source errors
// ==============================================================================

/// Structured errors from the chain-source (block/transaction storage)
/// collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ChainSourceError {
    #[error("HTTP transport: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("JSON-RPC error: code={code}, message={message}")]
    ServerError { code: i64, message: String },

    #[error("invalid JSON-RPC response: {0}")]
    InvalidResponse(String),

    #[error("transaction not found: {0}")]
    TxNotFound(Txid),
}

// ==============================================================================
// Scan errors
// ==============================================================================

/// A recoverable failure that aborts the current scan pass. The caller
/// leaves `last_scan_height` unchanged and retries on the next tip update.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("transient I/O failure while scanning: {0}")]
    TransientIo(#[from] ChainSourceError),

    #[error("could not resolve previous transaction for outpoint {0}")]
    MissingPrevTx(OutPoint),
}

// ==============================================================================
// Vote / governance errors
// ==============================================================================

/// Reasons a gossip-received payment vote was rejected. These are never
/// propagated as panics: `PaymentVoteStore::add_vote` returns `Err` and the
/// caller (a P2P handler, out of this crate's scope) decides whether to
/// penalize the sending peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VoteRejectReason {
    #[error("duplicate vote hash")]
    Duplicate,
    #[error("operator already voted for this height")]
    AlreadyVotedForHeight,
    #[error("block hash at height-101 is unknown")]
    UnknownAnchorBlock,
    #[error("operator rank exceeds SIGNATURES_TOTAL")]
    OutOfTopRank,
    #[error("vote height is outside the accepted window")]
    HeightOutOfWindow,
}

// ==============================================================================
// Persistence errors
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("snapshot version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: String, expected: String },

    #[error("snapshot checksum mismatch")]
    ChecksumMismatch,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("snapshot deserialization failed: {0}")]
    Decode(String),
}

// ==============================================================================
// Top-level crate error
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    ChainSource(#[from] ChainSourceError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("invalid script or address data: {0}")]
    InvalidScriptData(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
