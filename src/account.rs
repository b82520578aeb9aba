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

//! Per-account JetStream state
//!
//! One [`JsAccount`] exists per enabled account. It owns the account's
//! limits, byte usage and reservations, its stream and template maps, and
//! its slice of the store directory (`<store_dir>/<account>`). The account
//! lock is always released before calling into the storage engine or the
//! subject router; stream creation and disk I/O never run under it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::warn;

use crate::error::{JetStreamError, Result};
use crate::jetstream::{JetStream, ALL_JS_EXPORTS, JS_API_ACCOUNT_INFO};
use crate::limits::{AccountLimits, AccountStats};
use crate::meta::{self, FileStreamInfo, SNAPSHOTS_DIR, STREAMS_DIR, TEMPLATES_DIR};
use crate::router::SubjectRouter;
use crate::stream::{
    AccountUsage, StorageType, Stream, StreamConfig, StreamContext, StreamEngine,
};
use crate::subject::{is_valid_name, subjects_collide, MAX_NAME_LEN};
use crate::template::{
    FileTemplateStore, MemTemplateStore, StreamTemplate, StreamTemplateConfig, TemplateStore,
};

struct StreamEntry {
    config: StreamConfig,
    stream: Arc<dyn Stream>,
}

struct JsaState {
    limits: AccountLimits,
    mem_used: i64,
    store_used: i64,
    mem_reserved: i64,
    store_reserved: i64,
    streams: HashMap<String, StreamEntry>,
    templates: HashMap<String, Arc<StreamTemplate>>,
    template_store: Option<Arc<dyn TemplateStore>>,
}

/// JetStream state for one enabled account.
pub struct JsAccount {
    name: String,
    store_dir: PathBuf,
    js: Weak<JetStream>,
    me: Weak<JsAccount>,
    router: Arc<dyn SubjectRouter>,
    engine: Arc<dyn StreamEngine>,
    state: RwLock<JsaState>,
}

impl std::fmt::Debug for JsAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsAccount").field("name", &self.name).finish()
    }
}

impl JsAccount {
    pub(crate) fn new(
        name: &str,
        store_dir: PathBuf,
        js: Weak<JetStream>,
        router: Arc<dyn SubjectRouter>,
        engine: Arc<dyn StreamEngine>,
        limits: AccountLimits,
    ) -> Arc<JsAccount> {
        Arc::new_cyclic(|me| JsAccount {
            name: name.to_string(),
            store_dir,
            js,
            me: me.clone(),
            router,
            engine,
            state: RwLock::new(JsaState {
                limits,
                mem_used: 0,
                store_used: 0,
                mem_reserved: 0,
                store_reserved: 0,
                streams: HashMap::new(),
                templates: HashMap::new(),
                template_store: None,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub(crate) fn streams_dir(&self) -> PathBuf {
        self.store_dir.join(STREAMS_DIR)
    }

    pub(crate) fn templates_dir(&self) -> PathBuf {
        self.store_dir.join(TEMPLATES_DIR)
    }

    pub(crate) fn snapshots_dir(&self) -> PathBuf {
        self.store_dir.join(SNAPSHOTS_DIR)
    }

    pub fn limits(&self) -> AccountLimits {
        self.state.read().limits
    }

    /// Replace this account's limits. `None` means dynamic limits: the
    /// whole server quota. The ledger admission-checks the delta, so
    /// shrinking always succeeds; current usage is left untouched.
    pub fn update_limits(&self, limits: Option<AccountLimits>) -> Result<()> {
        let js = self.js.upgrade().ok_or(JetStreamError::NotEnabled)?;
        let limits = limits.unwrap_or_else(|| js.dynamic_limits());
        let old = self.state.read().limits;
        js.replace_reservation(&old, &limits)?;
        self.state.write().limits = limits;
        Ok(())
    }

    /// Snapshot of usage and limits.
    pub fn usage(&self) -> AccountStats {
        let state = self.state.read();
        AccountStats {
            memory: state.mem_used.max(0) as u64,
            store: state.store_used.max(0) as u64,
            streams: state.streams.len(),
            limits: state.limits,
        }
    }

    /// Apply a signed byte delta reported by the storage engine. Never
    /// blocks on the ledger.
    pub fn update_usage(&self, storage: StorageType, delta: i64) {
        let mut state = self.state.write();
        match storage {
            StorageType::Memory => state.mem_used += delta,
            StorageType::File => state.store_used += delta,
        }
    }

    /// Cheap backpressure signal for ingest: true iff usage strictly
    /// exceeds a positive limit. A limit shrunk below current usage makes
    /// this true without ever deleting data; refusing new writes is the
    /// host's policy.
    pub fn limits_exceeded(&self, storage: StorageType) -> bool {
        let state = self.state.read();
        match storage {
            StorageType::Memory => {
                state.limits.max_memory > 0 && state.mem_used > state.limits.max_memory
            }
            StorageType::File => {
                state.limits.max_store > 0 && state.store_used > state.limits.max_store
            }
        }
    }

    /// Admission check for a new stream against account limits.
    pub fn check_stream_admission(&self, config: &StreamConfig) -> Result<()> {
        Self::check_admission_locked(&self.state.read(), config)
    }

    fn check_admission_locked(state: &JsaState, config: &StreamConfig) -> Result<()> {
        if state.limits.max_streams > 0 && state.streams.len() >= state.limits.max_streams as usize
        {
            return Err(JetStreamError::MaximumStreamsReached);
        }
        if config.max_consumers > 0
            && state.limits.max_consumers > 0
            && config.max_consumers > state.limits.max_consumers
        {
            return Err(JetStreamError::MaximumConsumersExceeded);
        }
        if config.max_bytes > 0 {
            let add_bytes = config.max_bytes * config.replicas as i64;
            match config.storage {
                StorageType::Memory => {
                    if state.mem_reserved + add_bytes > state.limits.max_memory {
                        return Err(JetStreamError::InsufficientMemory);
                    }
                }
                StorageType::File => {
                    if state.store_reserved + add_bytes > state.limits.max_store {
                        return Err(JetStreamError::InsufficientStorage);
                    }
                }
            }
        }
        Ok(())
    }

    fn reserve_stream_bytes_locked(state: &mut JsaState, config: &StreamConfig) {
        if config.max_bytes <= 0 {
            return;
        }
        let add_bytes = config.max_bytes * config.replicas as i64;
        match config.storage {
            StorageType::Memory => state.mem_reserved += add_bytes,
            StorageType::File => state.store_reserved += add_bytes,
        }
    }

    fn release_stream_bytes_locked(state: &mut JsaState, config: &StreamConfig) {
        if config.max_bytes <= 0 {
            return;
        }
        let add_bytes = config.max_bytes * config.replicas as i64;
        match config.storage {
            StorageType::Memory => state.mem_reserved -= add_bytes,
            StorageType::File => state.store_reserved -= add_bytes,
        }
    }

    fn release_stream_bytes(&self, config: &StreamConfig) {
        Self::release_stream_bytes_locked(&mut self.state.write(), config);
    }

    pub fn num_streams(&self) -> usize {
        self.state.read().streams.len()
    }

    pub(crate) fn stream_exists(&self, name: &str) -> bool {
        self.state.read().streams.contains_key(name)
    }

    pub fn lookup_stream(&self, name: &str) -> Result<Arc<dyn Stream>> {
        self.state
            .read()
            .streams
            .get(name)
            .map(|e| e.stream.clone())
            .ok_or(JetStreamError::StreamNotFound)
    }

    /// All streams on this account.
    pub fn streams(&self) -> Vec<Arc<dyn Stream>> {
        self.filtered_streams("")
    }

    /// Streams whose configured subjects overlap the filter under the
    /// host's subject-match semantics. An empty filter matches all.
    pub fn filtered_streams(&self, filter: &str) -> Vec<Arc<dyn Stream>> {
        let state = self.state.read();
        state
            .streams
            .values()
            .filter(|entry| {
                filter.is_empty()
                    || entry
                        .config
                        .subjects
                        .iter()
                        .any(|subject| subjects_collide(filter, subject))
            })
            .map(|entry| entry.stream.clone())
            .collect()
    }

    /// Admit and create a new stream.
    pub fn add_stream(&self, config: StreamConfig) -> Result<Arc<dyn Stream>> {
        self.add_stream_internal(config, Utc::now(), true)
    }

    /// Recreate a stream from recovered metadata: the persisted creation
    /// time is restored and the already-verified metafile is left as-is.
    pub(crate) fn restore_stream(
        &self,
        config: StreamConfig,
        created: DateTime<Utc>,
    ) -> Result<Arc<dyn Stream>> {
        self.add_stream_internal(config, created, false)
    }

    fn add_stream_internal(
        &self,
        config: StreamConfig,
        created: DateTime<Utc>,
        write_meta: bool,
    ) -> Result<Arc<dyn Stream>> {
        let cfg = self.engine.validate_config(&config)?;

        // Admission and byte reservation in one critical section.
        {
            let mut state = self.state.write();
            if state.streams.contains_key(&cfg.name) {
                return Err(JetStreamError::StreamNameInUse);
            }
            Self::check_admission_locked(&state, &cfg)?;
            Self::reserve_stream_bytes_locked(&mut state, &cfg);
        }

        // Directory and metafile for file-backed streams, then the engine
        // call, all without the account lock.
        let dir = match cfg.storage {
            StorageType::File => {
                let dir = self.streams_dir().join(&cfg.name);
                if let Err(e) = crate::config::create_dir_0755(&dir) {
                    self.release_stream_bytes(&cfg);
                    return Err(e.into());
                }
                if write_meta {
                    let info = FileStreamInfo {
                        created,
                        config: cfg.clone(),
                    };
                    if let Err(e) = meta::write_meta(&dir, &cfg.name, &info) {
                        self.release_stream_bytes(&cfg);
                        let _ = std::fs::remove_dir_all(&dir);
                        return Err(e);
                    }
                }
                Some(dir)
            }
            StorageType::Memory => None,
        };

        let ctx = StreamContext {
            account: self.name.clone(),
            dir,
            usage: AccountUsage {
                jsa: self.me.clone(),
            },
        };
        let stream = match self.engine.create_stream(ctx, &cfg) {
            Ok(stream) => stream,
            Err(e) => {
                self.release_stream_bytes(&cfg);
                if write_meta && cfg.storage == StorageType::File {
                    let _ = std::fs::remove_dir_all(self.streams_dir().join(&cfg.name));
                }
                return Err(e);
            }
        };
        stream.set_created(created);

        // Publish into the map, re-checking for a racing add. The loser
        // backs out without touching the shared stream directory.
        {
            let mut state = self.state.write();
            if state.streams.contains_key(&cfg.name) {
                Self::release_stream_bytes_locked(&mut state, &cfg);
                drop(state);
                let _ = stream.stop();
                return Err(JetStreamError::StreamNameInUse);
            }
            state.streams.insert(
                cfg.name.clone(),
                StreamEntry {
                    config: cfg.clone(),
                    stream: stream.clone(),
                },
            );
        }

        Ok(stream)
    }

    /// Delete a stream: engine teardown, data removal, reservation
    /// release.
    pub fn delete_stream(&self, name: &str) -> Result<()> {
        let entry = {
            let mut state = self.state.write();
            let entry = state
                .streams
                .remove(name)
                .ok_or(JetStreamError::StreamNotFound)?;
            Self::release_stream_bytes_locked(&mut state, &entry.config);
            entry
        };
        let res = entry.stream.delete();
        if entry.config.storage == StorageType::File {
            let _ = std::fs::remove_dir_all(self.streams_dir().join(name));
        }
        res
    }

    /// Drop a stream from the account without touching its data,
    /// releasing its reservation. Used when a template is deleted and at
    /// teardown.
    pub(crate) fn remove_stream_entry(&self, name: &str) -> Option<Arc<dyn Stream>> {
        let mut state = self.state.write();
        let entry = state.streams.remove(name)?;
        Self::release_stream_bytes_locked(&mut state, &entry.config);
        Some(entry.stream)
    }

    /// Install a stream template on this account.
    pub fn add_stream_template(
        &self,
        config: StreamTemplateConfig,
    ) -> Result<Arc<StreamTemplate>> {
        if !config.config.name.is_empty() {
            return Err(JetStreamError::TemplateNameNotEmpty);
        }
        if config.name.len() > MAX_NAME_LEN {
            return Err(JetStreamError::NameTooLong(MAX_NAME_LEN));
        }
        if !is_valid_name(&config.name) {
            return Err(JetStreamError::InvalidName(config.name.clone()));
        }

        // Validate the skeleton through the engine with a throwaway
        // sentinel name.
        let mut tcfg = config;
        tcfg.config.name = "_".to_string();
        tcfg.config = self.engine.validate_config(&tcfg.config)?;

        let (template, store) = {
            let mut state = self.state.write();
            if state.templates.contains_key(&tcfg.name) {
                return Err(JetStreamError::TemplateNameInUse(tcfg.name));
            }
            let store = match &state.template_store {
                Some(store) => store.clone(),
                None => {
                    // Lazily materialize the persistent store on the first
                    // template.
                    let store: Arc<dyn TemplateStore> =
                        if tcfg.config.storage == StorageType::File {
                            Arc::new(FileTemplateStore::new(&self.store_dir))
                        } else {
                            Arc::new(MemTemplateStore::new())
                        };
                    state.template_store = Some(store.clone());
                    store
                }
            };
            let template = StreamTemplate::new(tcfg, self.me.clone());
            state
                .templates
                .insert(template.name().to_string(), template.clone());
            (template, store)
        };

        if let Err(e) = store.store(&template.config()) {
            let _ = self.delete_template(template.name());
            return Err(e);
        }
        if let Err(e) = template.subscribe_subjects(&self.router, &self.name) {
            let _ = self.delete_template(template.name());
            return Err(e);
        }
        Ok(template)
    }

    pub fn lookup_template(&self, name: &str) -> Result<Arc<StreamTemplate>> {
        self.state
            .read()
            .templates
            .get(name)
            .cloned()
            .ok_or(JetStreamError::TemplateNotFound)
    }

    pub fn templates(&self) -> Vec<Arc<StreamTemplate>> {
        self.state.read().templates.values().cloned().collect()
    }

    /// Delete a template: map removal, persistent-store deletion, client
    /// close, then a stop of every generated stream. All steps run to
    /// completion; stream-stop failures are collected and the last one is
    /// returned, while a store-deletion failure is only logged.
    pub fn delete_template(&self, name: &str) -> Result<()> {
        let (template, store) = {
            let mut state = self.state.write();
            let template = state
                .templates
                .remove(name)
                .ok_or(JetStreamError::TemplateNotFound)?;
            (template, state.template_store.clone())
        };

        if let Some(store) = store {
            if let Err(e) = store.delete(name) {
                warn!(account = %self.name, template = %name, error = %e,
                    "error deleting template from store");
            }
        }
        template.close_client(&self.router);
        let mut last_err = None;
        for stream_name in template.take_streams() {
            if let Some(stream) = self.remove_stream_entry(&stream_name) {
                if let Err(e) = stream.stop() {
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Recovery bookkeeping: record that a persisted stream belongs to a
    /// template. Fails softly when the template is gone; the stream
    /// still comes up, detached.
    pub(crate) fn add_stream_name_to_template(
        &self,
        template_name: &str,
        stream_name: &str,
    ) -> Result<()> {
        let template = self.lookup_template(template_name)?;
        template.add_stream_name(stream_name);
        Ok(())
    }

    /// Whether the named template currently owns the named stream.
    pub fn template_owns_stream(&self, template_name: &str, stream_name: &str) -> bool {
        self.lookup_template(template_name)
            .map(|t| t.owns_stream(stream_name))
            .unwrap_or(false)
    }

    /// Install every JetStream service import on this account, replacing
    /// a possibly pre-existing info-only import.
    pub(crate) fn enable_service_imports(&self, system_account: &str) -> Result<()> {
        self.router
            .remove_service_import(&self.name, JS_API_ACCOUNT_INFO);
        for export in ALL_JS_EXPORTS {
            if !self.router.has_service_import(&self.name, export) {
                self.router
                    .add_service_import(&self.name, system_account, export)?;
            }
        }
        Ok(())
    }

    /// Stop everything this account owns without deleting any data on
    /// disk: streams are stopped, templates lose their subscriptions, and
    /// the persistent template store is left intact so a later enable
    /// recovers it all.
    pub(crate) fn teardown(&self) {
        let (streams, templates) = {
            let mut state = self.state.write();
            let streams: Vec<(String, Arc<dyn Stream>)> = state
                .streams
                .drain()
                .map(|(name, entry)| (name, entry.stream))
                .collect();
            let templates: Vec<Arc<StreamTemplate>> =
                state.templates.drain().map(|(_, t)| t).collect();
            state.mem_reserved = 0;
            state.store_reserved = 0;
            (streams, templates)
        };
        for (name, stream) in streams {
            if let Err(e) = stream.stop() {
                warn!(account = %self.name, stream = %name, error = %e, "error stopping stream");
            }
        }
        for template in templates {
            template.close_client(&self.router);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::{Consumer, ConsumerConfig};
    use crate::router::LocalSubjectRouter;
    use crate::stream::StreamState;

    struct StubStream {
        config: StreamConfig,
        fail_stop: bool,
    }

    impl Stream for StubStream {
        fn name(&self) -> String {
            self.config.name.clone()
        }

        fn config(&self) -> StreamConfig {
            self.config.clone()
        }

        fn state(&self) -> StreamState {
            StreamState::default()
        }

        fn ingest(&self, _subject: &str, _reply: Option<&str>, _payload: &[u8]) -> Result<()> {
            Ok(())
        }

        fn add_consumer(&self, _config: &ConsumerConfig) -> Result<Arc<dyn Consumer>> {
            Err(JetStreamError::Consumer("not supported".to_string()))
        }

        fn stop(&self) -> Result<()> {
            if self.fail_stop {
                Err(JetStreamError::Stream("stop failed".to_string()))
            } else {
                Ok(())
            }
        }

        fn delete(&self) -> Result<()> {
            self.stop()
        }

        fn set_created(&self, _created: DateTime<Utc>) {}
    }

    struct StubEngine {
        fail_stop: bool,
    }

    impl StreamEngine for StubEngine {
        fn create_stream(
            &self,
            _ctx: StreamContext,
            config: &StreamConfig,
        ) -> Result<Arc<dyn Stream>> {
            Ok(Arc::new(StubStream {
                config: config.clone(),
                fail_stop: self.fail_stop,
            }))
        }
    }

    struct FailingTemplateStore;

    impl TemplateStore for FailingTemplateStore {
        fn store(&self, _template: &StreamTemplateConfig) -> Result<()> {
            Ok(())
        }

        fn delete(&self, _name: &str) -> Result<()> {
            Err(JetStreamError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "store is read-only",
            )))
        }
    }

    fn account_with_engine(fail_stop: bool) -> Arc<JsAccount> {
        JsAccount::new(
            "ONE",
            std::env::temp_dir().join("jsa-test-unused"),
            Weak::new(),
            Arc::new(LocalSubjectRouter::new()),
            Arc::new(StubEngine { fail_stop }),
            AccountLimits {
                max_memory: -1,
                max_store: -1,
                max_streams: -1,
                max_consumers: -1,
            },
        )
    }

    fn memory_template() -> StreamTemplateConfig {
        StreamTemplateConfig {
            name: "ORDERS".to_string(),
            config: StreamConfig {
                name: String::new(),
                subjects: vec!["orders.*".to_string()],
                replicas: 1,
                ..Default::default()
            },
            max_streams: 4,
        }
    }

    fn add_generated_stream(jsa: &JsAccount) {
        let cfg = StreamConfig {
            name: "orders_new".to_string(),
            subjects: vec!["orders.new".to_string()],
            replicas: 1,
            template: "ORDERS".to_string(),
            ..Default::default()
        };
        jsa.add_stream(cfg).unwrap();
        jsa.add_stream_name_to_template("ORDERS", "orders_new").unwrap();
    }

    #[test]
    fn test_delete_template_tolerates_store_delete_failure() {
        let jsa = account_with_engine(false);
        jsa.add_stream_template(memory_template()).unwrap();
        add_generated_stream(&jsa);
        // Swap in a store whose delete always fails.
        jsa.state.write().template_store = Some(Arc::new(FailingTemplateStore));

        // Every generated stream stops cleanly, so the store failure is
        // logged and the delete still succeeds.
        jsa.delete_template("ORDERS").unwrap();
        assert!(jsa.lookup_template("ORDERS").is_err());
        assert!(jsa.lookup_stream("orders_new").is_err());
    }

    #[test]
    fn test_delete_template_returns_last_stream_stop_error() {
        let jsa = account_with_engine(true);
        jsa.add_stream_template(memory_template()).unwrap();
        add_generated_stream(&jsa);
        jsa.state.write().template_store = Some(Arc::new(FailingTemplateStore));

        // The stream-stop error wins over the store-delete failure.
        let err = jsa.delete_template("ORDERS").unwrap_err();
        assert!(matches!(err, JetStreamError::Stream(_)));
        // Cleanup ran to completion regardless.
        assert!(jsa.lookup_template("ORDERS").is_err());
        assert!(jsa.lookup_stream("orders_new").is_err());
    }
}
