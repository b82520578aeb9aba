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

//! Stream configuration and the storage-engine seam
//!
//! The control plane never touches message data. Streams are created,
//! stopped, and deleted through the [`StreamEngine`] and [`Stream`] traits;
//! the concrete append/truncate/replay machinery lives in the storage
//! crate behind them. What the control plane owns is admission: config
//! validation, naming, per-account quota, and the metafile protocol.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::JsAccount;
use crate::consumer::{Consumer, ConsumerConfig};
use crate::error::{JetStreamError, Result};
use crate::subject::{is_valid_name, is_valid_subject, MAX_NAME_LEN};

/// Backing storage for a stream or consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Memory,
    File,
}

/// Message retention policy for a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    #[default]
    Limits,
    Interest,
    #[serde(rename = "workqueue")]
    WorkQueue,
}

/// Configuration for a single stream. Serialized verbatim into the
/// on-disk metafile, so the field tags are part of the durable layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub retention: RetentionPolicy,
    #[serde(default)]
    pub max_consumers: i32,
    #[serde(default)]
    pub max_msgs: i64,
    #[serde(default)]
    pub max_bytes: i64,
    #[serde(default, rename = "max_age")]
    pub max_age_nanos: i64,
    #[serde(default, rename = "max_msg_size")]
    pub max_msg_size: i32,
    #[serde(default)]
    pub storage: StorageType,
    #[serde(default = "default_replicas", rename = "num_replicas")]
    pub replicas: usize,
    #[serde(default, rename = "no_ack")]
    pub no_ack: bool,
    #[serde(default, rename = "template_owner", skip_serializing_if = "String::is_empty")]
    pub template: String,
}

fn default_replicas() -> usize {
    1
}

/// Normalize and validate a stream configuration.
///
/// The name must be a valid entity name (it doubles as a directory name),
/// subjects default to the stream name, and replicas default to one.
pub fn check_stream_config(config: &StreamConfig) -> Result<StreamConfig> {
    if !is_valid_name(&config.name) {
        return Err(JetStreamError::InvalidName(config.name.clone()));
    }
    if config.name.len() > MAX_NAME_LEN {
        return Err(JetStreamError::NameTooLong(MAX_NAME_LEN));
    }
    let mut cfg = config.clone();
    if cfg.subjects.is_empty() {
        cfg.subjects = vec![cfg.name.clone()];
    }
    for subject in &cfg.subjects {
        if !is_valid_subject(subject) {
            return Err(JetStreamError::InvalidSubject(subject.clone()));
        }
    }
    if cfg.replicas == 0 {
        cfg.replicas = 1;
    }
    Ok(cfg)
}

/// Point-in-time state of a stream, reported by the storage engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamState {
    pub msgs: u64,
    pub bytes: u64,
    pub first_seq: u64,
    pub last_seq: u64,
    pub consumers: usize,
}

/// Usage-reporting handle given to the storage engine. Holds a weak
/// back-reference into the account state so streams and accounts never
/// own each other.
#[derive(Clone)]
pub struct AccountUsage {
    pub(crate) jsa: Weak<JsAccount>,
}

impl AccountUsage {
    /// Report a signed byte delta against the owning account.
    pub fn update(&self, storage: StorageType, delta: i64) {
        if let Some(jsa) = self.jsa.upgrade() {
            jsa.update_usage(storage, delta);
        }
    }

    /// Backpressure query for the ingest path.
    pub fn exceeded(&self, storage: StorageType) -> bool {
        self.jsa
            .upgrade()
            .map(|jsa| jsa.limits_exceeded(storage))
            .unwrap_or(false)
    }
}

/// Everything the storage engine needs to materialize a stream.
#[derive(Clone)]
pub struct StreamContext {
    /// Owning account name.
    pub account: String,
    /// Stream directory under `<account>/streams/`, `None` for
    /// memory-backed streams.
    pub dir: Option<PathBuf>,
    /// Usage-accounting handle into the owning account.
    pub usage: AccountUsage,
}

/// A durable, subject-addressed message stream. Implemented by the
/// storage engine; the control plane only drives lifecycle and ingest
/// re-delivery.
pub trait Stream: Send + Sync {
    fn name(&self) -> String;

    fn config(&self) -> StreamConfig;

    fn state(&self) -> StreamState;

    /// Deliver one message into the stream's ingest path.
    fn ingest(&self, subject: &str, reply: Option<&str>, payload: &[u8]) -> Result<()>;

    fn add_consumer(&self, config: &ConsumerConfig) -> Result<Arc<dyn Consumer>>;

    /// Stop serving. Must not delete any data on disk.
    fn stop(&self) -> Result<()>;

    /// Stop serving and delete the stream's data.
    fn delete(&self) -> Result<()>;

    /// Restore the creation timestamp from recovered metadata.
    fn set_created(&self, created: DateTime<Utc>);
}

impl std::fmt::Debug for dyn Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream").field("name", &self.name()).finish()
    }
}

/// Factory seam to the storage engine.
pub trait StreamEngine: Send + Sync {
    /// Validate and normalize a configuration before admission. The
    /// default implementation applies the control plane's own rules;
    /// engines may layer stricter checks on top.
    fn validate_config(&self, config: &StreamConfig) -> Result<StreamConfig> {
        check_stream_config(config)
    }

    /// Materialize a stream. Called without any control-plane lock held.
    fn create_stream(&self, ctx: StreamContext, config: &StreamConfig) -> Result<Arc<dyn Stream>>;
}
