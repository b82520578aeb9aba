// SPDX-License-Identifier: AGPL-3.0-or-later
// SochMQ - NATS-Compatible Message Streaming
// Copyright (C) 2026 Sushanth Reddy Vanagala (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Metafile checksum protocol
//!
//! Every persisted entity lives in its own directory holding a `meta.inf`
//! JSON description next to a `meta.sum` checksum. The checksum is a
//! 64-bit keyed HighwayHash of the metafile bytes, keyed with the SHA-256
//! digest of the entity's key name (the directory name for streams and
//! consumers, the literal `"templates"` for templates), hex-encoded in
//! lowercase.
//!
//! A missing `meta.sum` is an integrity failure: recovery treats the
//! entity as corrupt and skips it rather than adopting it partially.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use highway::{HighwayHash, HighwayHasher, Key};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consumer::ConsumerConfig;
use crate::error::{JetStreamError, Result};
use crate::stream::StreamConfig;

/// Per-account directory holding one subdirectory per stream.
pub const STREAMS_DIR: &str = "streams";

/// Per-account directory holding one subdirectory per template.
pub const TEMPLATES_DIR: &str = "templates";

/// Per-stream directory holding one subdirectory per consumer.
pub const CONSUMER_DIR: &str = "obs";

/// Per-account snapshot staging directory, removed on recovery completion.
pub const SNAPSHOTS_DIR: &str = "snapshots";

/// Metafile name within an entity directory.
pub const META_FILE: &str = "meta.inf";

/// Checksum file name within an entity directory.
pub const META_SUM_FILE: &str = "meta.sum";

/// Checksum key name shared by all templates of an account.
pub const TEMPLATES_CHECKSUM_KEY: &str = "templates";

/// Stream metafile contents: the configuration plus its creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStreamInfo {
    pub created: DateTime<Utc>,
    #[serde(flatten)]
    pub config: StreamConfig,
}

/// Consumer metafile contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConsumerInfo {
    pub created: DateTime<Utc>,
    #[serde(flatten)]
    pub config: ConsumerConfig,
}

fn hash_key(key_name: &str) -> Key {
    let digest = Sha256::digest(key_name.as_bytes());
    let mut parts = [0u64; 4];
    for (i, part) in parts.iter_mut().enumerate() {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[i * 8..(i + 1) * 8]);
        *part = u64::from_le_bytes(bytes);
    }
    Key(parts)
}

/// Lowercase-hex keyed HighwayHash64 of `data` under `key_name`.
pub fn checksum(key_name: &str, data: &[u8]) -> String {
    let mut hasher = HighwayHasher::new(hash_key(key_name));
    hasher.append(data);
    format!("{:016x}", hasher.finalize64())
}

/// Serialize `value` into `<dir>/meta.inf` and stamp `<dir>/meta.sum`.
pub fn write_meta<T: Serialize>(dir: &Path, key_name: &str, value: &T) -> Result<()> {
    let buf = serde_json::to_vec_pretty(value)
        .map_err(|e| JetStreamError::Serialization(e.to_string()))?;
    fs::write(dir.join(META_FILE), &buf)?;
    fs::write(dir.join(META_SUM_FILE), checksum(key_name, &buf))?;
    Ok(())
}

/// Load and checksum-verify `<dir>/meta.inf`.
///
/// Returns an integrity error when the metafile or its checksum is
/// missing, mismatched, or unparseable; callers during recovery warn and
/// skip the entity.
pub fn load_meta<T: DeserializeOwned>(dir: &Path, key_name: &str) -> Result<T> {
    let meta_path = dir.join(META_FILE);
    let sum_path = dir.join(META_SUM_FILE);

    let buf = match fs::read(&meta_path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(JetStreamError::MissingMetadata(meta_path.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    let stored = match fs::read_to_string(&sum_path) {
        Ok(sum) => sum,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(JetStreamError::MissingChecksum(sum_path.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let computed = checksum(key_name, &buf);
    if stored.trim() != computed {
        return Err(JetStreamError::ChecksumMismatch {
            stored: stored.trim().to_string(),
            computed,
        });
    }

    serde_json::from_slice(&buf).map_err(|e| JetStreamError::BadMetadata(e.to_string()))
}
