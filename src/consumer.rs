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

//! Consumer configuration and the consumer-engine seam

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::subject::is_valid_name;

/// Acknowledgement policy for a consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckPolicy {
    #[default]
    None,
    All,
    Explicit,
}

/// Configuration for a consumer. Serialized into the consumer metafile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default, rename = "durable_name", skip_serializing_if = "Option::is_none")]
    pub durable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliver_subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_subject: Option<String>,
    #[serde(default)]
    pub ack_policy: AckPolicy,
    #[serde(default, rename = "opt_start_seq", skip_serializing_if = "Option::is_none")]
    pub start_seq: Option<u64>,
}

/// A consumer is durable when it carries a valid durable name. Everything
/// else is ephemeral and bound to a client session.
pub fn is_durable(config: &ConsumerConfig) -> bool {
    config.durable.as_deref().is_some_and(is_valid_name)
}

/// A stateful cursor over a stream, implemented by the consumer engine.
pub trait Consumer: Send + Sync {
    fn name(&self) -> String;

    fn config(&self) -> ConsumerConfig;

    /// Drop durable status. Recovery temporarily reconstructs ephemeral
    /// consumers as durable so they survive until their client
    /// reconnects, then flips them back through this hook.
    fn switch_to_ephemeral(&self) -> Result<()>;

    /// Restore the creation timestamp from recovered metadata.
    fn set_created(&self, created: DateTime<Utc>);

    /// Reload persisted delivery state (e.g. last-delivered sequence).
    fn restore_state(&self) -> Result<()>;
}
