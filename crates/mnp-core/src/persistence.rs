//! Flat-file snapshots of registry and vote state. Each file is a
//! versioned, checksummed record; on load, a version-string mismatch
//! discards the snapshot and lets the caller rebuild from the chain.
//! Writes go through a temp-file-then-rename so a reader during shutdown
//! always sees a consistent file.

use std::path::Path;

use bitcoin::hashes::{sha256d, Hash};
use bitcoin::OutPoint;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::types::{GovernanceVote, InfinityNode, StatementMap, Tier};

const INFINITYNODE_MAGIC: &str = "magicInfinityNodeCache";
const INFINITYNODE_VERSION: &str = "mnp-core-infinitynode-v1";
const RSV_MAGIC: &str = "magicInfinityRSV";
const RSV_VERSION: &str = "mnp-core-rsv-v1";

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope<T> {
    magic: String,
    network_id: String,
    version: String,
    payload: T,
    checksum: String,
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn checksum(payload_bytes: &[u8]) -> String {
    sha256d::Hash::hash(payload_bytes).to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InfinityNodeSnapshot {
    pub matured: Vec<(OutPoint, InfinityNode)>,
    pub last_paid: Vec<(Vec<u8>, u32)>,
    pub last_scan_height: u32,
    pub statements: [StatementMap; 3],
    pub statement_counters: [u32; 6],
}

pub fn save_infinitynode_snapshot(
    path: &Path,
    network_id: &str,
    payload: &InfinityNodeSnapshot,
) -> Result<(), PersistenceError> {
    let payload_json = serde_json::to_vec(payload).map_err(|e| PersistenceError::Decode(e.to_string()))?;
    let envelope = SnapshotEnvelope {
        magic: INFINITYNODE_MAGIC.to_string(),
        network_id: network_id.to_string(),
        version: INFINITYNODE_VERSION.to_string(),
        payload,
        checksum: checksum(&payload_json),
    };
    let bytes = serde_json::to_vec_pretty(&envelope).map_err(|e| PersistenceError::Decode(e.to_string()))?;
    write_atomic(path, &bytes)
}

pub fn load_infinitynode_snapshot(path: &Path) -> Result<InfinityNodeSnapshot, PersistenceError> {
    let bytes = std::fs::read(path)?;
    let envelope: SnapshotEnvelope<InfinityNodeSnapshot> =
        serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Decode(e.to_string()))?;

    if envelope.version != INFINITYNODE_VERSION {
        return Err(PersistenceError::VersionMismatch {
            found: envelope.version,
            expected: INFINITYNODE_VERSION.to_string(),
        });
    }

    let payload_json = serde_json::to_vec(&envelope.payload).map_err(|e| PersistenceError::Decode(e.to_string()))?;
    if checksum(&payload_json) != envelope.checksum {
        return Err(PersistenceError::ChecksumMismatch);
    }

    Ok(envelope.payload)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RsvSnapshot {
    pub votes_by_proposal: Vec<(String, Vec<GovernanceVote>)>,
}

pub fn save_rsv_snapshot(path: &Path, network_id: &str, payload: &RsvSnapshot) -> Result<(), PersistenceError> {
    let payload_json = serde_json::to_vec(payload).map_err(|e| PersistenceError::Decode(e.to_string()))?;
    let envelope = SnapshotEnvelope {
        magic: RSV_MAGIC.to_string(),
        network_id: network_id.to_string(),
        version: RSV_VERSION.to_string(),
        payload,
        checksum: checksum(&payload_json),
    };
    let bytes = serde_json::to_vec_pretty(&envelope).map_err(|e| PersistenceError::Decode(e.to_string()))?;
    write_atomic(path, &bytes)
}

pub fn load_rsv_snapshot(path: &Path) -> Result<RsvSnapshot, PersistenceError> {
    let bytes = std::fs::read(path)?;
    let envelope: SnapshotEnvelope<RsvSnapshot> =
        serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Decode(e.to_string()))?;

    if envelope.version != RSV_VERSION {
        return Err(PersistenceError::VersionMismatch { found: envelope.version, expected: RSV_VERSION.to_string() });
    }

    let payload_json = serde_json::to_vec(&envelope.payload).map_err(|e| PersistenceError::Decode(e.to_string()))?;
    if checksum(&payload_json) != envelope.checksum {
        return Err(PersistenceError::ChecksumMismatch);
    }

    Ok(envelope.payload)
}

/// `Tier`-indexed statement counters: `(last_stm_height, last_stm_size)`
/// per tier, flattened T1,T5,T10.
pub fn counters_from_tiers(pairs: [(u32, u32); 3]) -> [u32; 6] {
    let mut out = [0u32; 6];
    for (i, (height, size)) in pairs.into_iter().enumerate() {
        out[i * 2] = height;
        out[i * 2 + 1] = size;
    }
    out
}

pub fn tiers_from_counters(counters: [u32; 6]) -> [(Tier, u32, u32); 3] {
    [
        (Tier::T1, counters[0], counters[1]),
        (Tier::T5, counters[2], counters[3]),
        (Tier::T10, counters[4], counters[5]),
    ]
}
