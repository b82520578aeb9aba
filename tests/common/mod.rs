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

//! Deterministic in-memory stream engine used by the integration suites.
//!
//! `SimpleStreamEngine` stands in for the storage crate: streams count
//! messages, report usage deltas, subscribe to their own subjects, and
//! honor the metafile protocol so recovery round-trips against a real
//! store directory.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use sochmq_jetstream::config::create_dir_0755;
use sochmq_jetstream::meta::{self, FileConsumerInfo, CONSUMER_DIR, META_FILE};
use sochmq_jetstream::{
    AccountUsage, Consumer, ConsumerConfig, JetStreamError, LocalSubjectRouter, Result, Stream,
    StreamConfig, StreamContext, StreamEngine, StreamState, SubjectRouter, SubscriptionId,
};

const CONSUMER_STATE_FILE: &str = "o.state";

#[derive(Serialize, Deserialize)]
struct ConsumerStateFile {
    delivered: u64,
}

struct ConsumerInner {
    config: ConsumerConfig,
    created: DateTime<Utc>,
    delivered: u64,
    ephemeral: bool,
}

pub struct SimpleConsumer {
    name: String,
    dir: Option<PathBuf>,
    inner: RwLock<ConsumerInner>,
}

impl SimpleConsumer {
    fn new(name: String, dir: Option<PathBuf>, config: ConsumerConfig) -> Arc<SimpleConsumer> {
        Arc::new(SimpleConsumer {
            name,
            dir,
            inner: RwLock::new(ConsumerInner {
                config,
                created: Utc::now(),
                delivered: 0,
                ephemeral: false,
            }),
        })
    }

    /// Advance the delivered sequence and persist it.
    pub fn deliver(&self, seq: u64) {
        self.inner.write().delivered = seq;
        if let Some(dir) = &self.dir {
            let state = ConsumerStateFile { delivered: seq };
            let buf = serde_json::to_vec(&state).unwrap();
            std::fs::write(dir.join(CONSUMER_STATE_FILE), buf).unwrap();
        }
    }

    pub fn delivered(&self) -> u64 {
        self.inner.read().delivered
    }

    pub fn is_ephemeral(&self) -> bool {
        self.inner.read().ephemeral
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.inner.read().created
    }
}

impl Consumer for SimpleConsumer {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn config(&self) -> ConsumerConfig {
        self.inner.read().config.clone()
    }

    fn switch_to_ephemeral(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ephemeral = true;
        inner.config.durable = None;
        Ok(())
    }

    fn set_created(&self, created: DateTime<Utc>) {
        self.inner.write().created = created;
    }

    fn restore_state(&self) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let path = dir.join(CONSUMER_STATE_FILE);
        if !path.exists() {
            return Ok(());
        }
        let buf = std::fs::read(&path)?;
        let state: ConsumerStateFile = serde_json::from_slice(&buf)
            .map_err(|e| JetStreamError::Consumer(e.to_string()))?;
        self.inner.write().delivered = state.delivered;
        Ok(())
    }
}

struct StreamInner {
    msgs: u64,
    bytes: u64,
    stopped: bool,
    sids: Vec<SubscriptionId>,
    consumers: HashMap<String, Arc<SimpleConsumer>>,
    eph_seq: u64,
}

pub struct SimpleStream {
    name: String,
    account: String,
    dir: Option<PathBuf>,
    config: StreamConfig,
    usage: AccountUsage,
    router: Arc<LocalSubjectRouter>,
    created: RwLock<DateTime<Utc>>,
    inner: RwLock<StreamInner>,
}

impl SimpleStream {
    pub fn msgs(&self) -> u64 {
        self.inner.read().msgs
    }

    pub fn created(&self) -> DateTime<Utc> {
        *self.created.read()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.read().stopped
    }

    pub fn consumer(&self, name: &str) -> Option<Arc<SimpleConsumer>> {
        self.inner.read().consumers.get(name).cloned()
    }
}

impl Stream for SimpleStream {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn config(&self) -> StreamConfig {
        self.config.clone()
    }

    fn state(&self) -> StreamState {
        let inner = self.inner.read();
        StreamState {
            msgs: inner.msgs,
            bytes: inner.bytes,
            first_seq: if inner.msgs == 0 { 0 } else { 1 },
            last_seq: inner.msgs,
            consumers: inner.consumers.len(),
        }
    }

    fn ingest(&self, _subject: &str, _reply: Option<&str>, payload: &[u8]) -> Result<()> {
        // Respect the account's backpressure signal before accepting.
        if self.usage.exceeded(self.config.storage) {
            return Err(JetStreamError::Stream("account limits exceeded".to_string()));
        }
        {
            let mut inner = self.inner.write();
            if inner.stopped {
                return Err(JetStreamError::Stream("stream is stopped".to_string()));
            }
            inner.msgs += 1;
            inner.bytes += payload.len() as u64;
        }
        self.usage.update(self.config.storage, payload.len() as i64);
        Ok(())
    }

    fn add_consumer(&self, config: &ConsumerConfig) -> Result<Arc<dyn Consumer>> {
        let name = match &config.durable {
            Some(durable) => durable.clone(),
            None => {
                let mut inner = self.inner.write();
                inner.eph_seq += 1;
                format!("eph{}", inner.eph_seq)
            }
        };
        if self.inner.read().consumers.contains_key(&name) {
            return Err(JetStreamError::Consumer(format!(
                "consumer '{name}' already exists"
            )));
        }

        let odir = self.dir.as_ref().map(|d| d.join(CONSUMER_DIR).join(&name));
        if let Some(dir) = &odir {
            create_dir_0755(dir)?;
            // A recovered consumer already has verified metadata on disk;
            // only a fresh one gets stamped.
            if !dir.join(META_FILE).exists() {
                let info = FileConsumerInfo {
                    created: Utc::now(),
                    config: config.clone(),
                };
                meta::write_meta(dir, &name, &info)?;
            }
        }

        let consumer = SimpleConsumer::new(name.clone(), odir, config.clone());
        self.inner.write().consumers.insert(name, consumer.clone());
        Ok(consumer)
    }

    fn stop(&self) -> Result<()> {
        let sids = {
            let mut inner = self.inner.write();
            inner.stopped = true;
            std::mem::take(&mut inner.sids)
        };
        for sid in sids {
            self.router.unsubscribe(sid);
        }
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        self.stop()?;
        let mut inner = self.inner.write();
        inner.msgs = 0;
        inner.bytes = 0;
        Ok(())
    }

    fn set_created(&self, created: DateTime<Utc>) {
        *self.created.write() = created;
    }
}

/// In-memory stream engine wired to a [`LocalSubjectRouter`]. Streams
/// subscribe to their own subjects on creation, the way the real storage
/// layer attaches ingest subscriptions.
pub struct SimpleStreamEngine {
    router: Arc<LocalSubjectRouter>,
    streams: RwLock<HashMap<(String, String), Arc<SimpleStream>>>,
    fail_create: AtomicBool,
}

impl SimpleStreamEngine {
    pub fn new(router: Arc<LocalSubjectRouter>) -> Arc<SimpleStreamEngine> {
        Arc::new(SimpleStreamEngine {
            router,
            streams: RwLock::new(HashMap::new()),
            fail_create: AtomicBool::new(false),
        })
    }

    pub fn lookup(&self, account: &str, name: &str) -> Option<Arc<SimpleStream>> {
        self.streams
            .read()
            .get(&(account.to_string(), name.to_string()))
            .cloned()
    }

    /// Make the next `create_stream` calls fail, for exercising the
    /// template failure path.
    pub fn fail_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }
}

impl StreamEngine for SimpleStreamEngine {
    fn create_stream(&self, ctx: StreamContext, config: &StreamConfig) -> Result<Arc<dyn Stream>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(JetStreamError::Stream("induced create failure".to_string()));
        }

        let stream = Arc::new(SimpleStream {
            name: config.name.clone(),
            account: ctx.account.clone(),
            dir: ctx.dir.clone(),
            config: config.clone(),
            usage: ctx.usage.clone(),
            router: self.router.clone(),
            created: RwLock::new(Utc::now()),
            inner: RwLock::new(StreamInner {
                msgs: 0,
                bytes: 0,
                stopped: false,
                sids: Vec::new(),
                consumers: HashMap::new(),
                eph_seq: 0,
            }),
        });

        for subject in &config.subjects {
            let ingest = stream.clone();
            let sid = self.router.subscribe(
                &ctx.account,
                subject,
                Arc::new(move |subject, reply, payload| {
                    let _ = ingest.ingest(subject, reply, payload);
                }),
            )?;
            stream.inner.write().sids.push(sid);
        }

        self.streams
            .write()
            .insert((ctx.account, config.name.clone()), stream.clone());
        Ok(stream)
    }
}
