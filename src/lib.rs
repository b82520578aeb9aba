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

//! SochMQ JetStream Control Plane
//!
//! The per-server control plane that sits between the messaging server
//! and the durable stream storage engines. It owns:
//!
//! - **Resource ledger**: server-wide reserved-memory/storage counters
//!   with admission checks against hard caps
//! - **Account registry**: per-account limits, usage accounting, stream
//!   and template ownership, and the account's slice of the store
//!   directory
//! - **Stream templates**: subject-driven auto-materialization of streams,
//!   bounded by a per-template cap
//! - **Recovery**: reconstruction of templates, streams, and consumers
//!   from checksummed on-disk metadata after a restart
//!
//! Message storage, consumer state machines, cluster replication, and the
//! host's subject routing stay behind trait seams ([`StreamEngine`],
//! [`Consumer`], [`ClusterController`], [`SubjectRouter`]).
//!
//! # On-Disk Layout
//!
//! ```text
//! <store_dir>/
//!   <account>/
//!     streams/<stream>/
//!       meta.inf            stream config + created timestamp
//!       meta.sum            keyed HighwayHash64, hex
//!       obs/<consumer>/
//!         meta.inf, meta.sum
//!     templates/<template>/
//!       meta.inf, meta.sum
//!     snapshots/            removed on recovery
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sochmq_jetstream::{JetStream, LocalSubjectRouter};
//!
//! let router = Arc::new(LocalSubjectRouter::new());
//! let js = JetStream::enable(None, "$SYS", router, engine)?;
//! let account = js.enable_account("ACME", None)?;
//! ```

pub mod account;
pub mod config;
pub mod consumer;
pub mod error;
pub mod jetstream;
pub mod ledger;
pub mod limits;
pub mod meta;
pub mod recovery;
pub mod router;
pub mod stream;
pub mod subject;
pub mod template;

pub use account::JsAccount;
pub use config::{friendly_bytes, JetStreamConfig};
pub use consumer::{AckPolicy, Consumer, ConsumerConfig};
pub use error::{JetStreamError, Result};
pub use jetstream::{ClusterController, JetStream, ALL_JS_EXPORTS, JS_API_ACCOUNT_INFO};
pub use ledger::ResourceLedger;
pub use limits::{AccountLimits, AccountStats};
pub use meta::{FileConsumerInfo, FileStreamInfo};
pub use router::{LocalSubjectRouter, MsgHandler, SubjectRouter, SubscriptionId};
pub use stream::{
    AccountUsage, RetentionPolicy, StorageType, Stream, StreamConfig, StreamContext,
    StreamEngine, StreamState,
};
pub use subject::{
    canonical_name, is_valid_name, is_valid_subject, subject_matches, subjects_collide,
    MAX_NAME_LEN,
};
pub use template::{
    FileTemplateStore, MemTemplateStore, StreamTemplate, StreamTemplateConfig,
    StreamTemplateInfo, TemplateStore,
};
