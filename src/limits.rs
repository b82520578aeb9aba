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

//! Per-account quota and usage reporting types

use serde::{Deserialize, Serialize};

use crate::config::JetStreamConfig;

/// Per-account JetStream quota. Negative or zero values mean "no limit"
/// where documented; byte limits feed the server-wide resource ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLimits {
    #[serde(rename = "max_memory")]
    pub max_memory: i64,
    #[serde(rename = "max_storage")]
    pub max_store: i64,
    pub max_streams: i32,
    pub max_consumers: i32,
}

impl AccountLimits {
    /// Dynamic limits hand the account the entire server quota with no
    /// stream or consumer cap.
    pub fn dynamic(config: &JetStreamConfig) -> AccountLimits {
        AccountLimits {
            max_memory: config.max_memory,
            max_store: config.max_store,
            max_streams: -1,
            max_consumers: -1,
        }
    }

    /// Byte-limit delta from `self` to `new`, used when replacing an
    /// account's ledger reservation. Stream and consumer caps are not
    /// reserved, so they carry no delta.
    pub fn diff(&self, new: &AccountLimits) -> AccountLimits {
        AccountLimits {
            max_memory: new.max_memory - self.max_memory,
            max_store: new.max_store - self.max_store,
            max_streams: 0,
            max_consumers: 0,
        }
    }
}

/// Snapshot of an account's JetStream usage and configured limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStats {
    pub memory: u64,
    #[serde(rename = "storage")]
    pub store: u64,
    pub streams: usize,
    pub limits: AccountLimits,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_dynamic_limits_take_full_quota() {
        let config = JetStreamConfig {
            max_memory: 1024,
            max_store: 4096,
            store_dir: PathBuf::from("/tmp/js"),
        };
        let limits = AccountLimits::dynamic(&config);
        assert_eq!(limits.max_memory, 1024);
        assert_eq!(limits.max_store, 4096);
        assert_eq!(limits.max_streams, -1);
        assert_eq!(limits.max_consumers, -1);
    }

    #[test]
    fn test_diff_signs() {
        let old = AccountLimits {
            max_memory: 1024,
            max_store: 10 * 1024,
            max_streams: 10,
            max_consumers: 10,
        };
        let new = AccountLimits {
            max_memory: 2048,
            max_store: 8 * 1024,
            ..old
        };
        let delta = old.diff(&new);
        assert_eq!(delta.max_memory, 1024);
        assert_eq!(delta.max_store, -2048);
        assert_eq!(delta.max_streams, 0);
    }

    #[test]
    fn test_limits_serde_tags() {
        let limits = AccountLimits {
            max_memory: 1,
            max_store: 2,
            max_streams: 3,
            max_consumers: 4,
        };
        let json = serde_json::to_value(limits).unwrap();
        assert_eq!(json["max_memory"], 1);
        assert_eq!(json["max_storage"], 2);
        assert_eq!(json["max_streams"], 3);
        assert_eq!(json["max_consumers"], 4);
    }
}
