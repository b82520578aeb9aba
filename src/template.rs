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

//! Stream templates: subject-driven stream auto-materialization
//!
//! A template captures a skeleton stream configuration, a cap, and a set
//! of subjects. The first message seen on a matching subject materializes
//! a stream named after the subject's canonical form; the triggering
//! message is re-delivered into the new stream so nothing is lost on the
//! boundary. Publishers never observe materialization failures; a
//! template at its cap logs and drops.
//!
//! Templates persist through a [`TemplateStore`]: file-backed under
//! `<account>/templates/<name>/` when the skeleton uses file storage,
//! memory-backed otherwise.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::account::JsAccount;
use crate::config::create_dir_0755;
use crate::error::{JetStreamError, Result};
use crate::meta::{write_meta, TEMPLATES_CHECKSUM_KEY, TEMPLATES_DIR};
use crate::router::{SubjectRouter, SubscriptionId};
use crate::stream::StreamConfig;
use crate::subject::canonical_name;

/// Configuration for a stream template. The embedded skeleton must carry
/// an empty name; the engine stamps each generated stream's name from the
/// matched subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamTemplateConfig {
    pub name: String,
    pub config: StreamConfig,
    pub max_streams: u32,
}

/// Template description plus the streams it has generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamTemplateInfo {
    pub config: StreamTemplateConfig,
    pub streams: Vec<String>,
}

/// Persistent store for an account's templates.
pub trait TemplateStore: Send + Sync {
    fn store(&self, template: &StreamTemplateConfig) -> Result<()>;
    fn delete(&self, name: &str) -> Result<()>;
}

/// File-backed template store rooted at `<account>/templates/`. Every
/// template gets its own directory with the standard metafile pair, all
/// checksummed under the shared `"templates"` key.
pub struct FileTemplateStore {
    dir: PathBuf,
}

impl FileTemplateStore {
    pub fn new(account_dir: &Path) -> FileTemplateStore {
        FileTemplateStore {
            dir: account_dir.join(TEMPLATES_DIR),
        }
    }
}

impl TemplateStore for FileTemplateStore {
    fn store(&self, template: &StreamTemplateConfig) -> Result<()> {
        let dir = self.dir.join(&template.name);
        create_dir_0755(&dir)?;
        write_meta(&dir, TEMPLATES_CHECKSUM_KEY, template)
    }

    fn delete(&self, name: &str) -> Result<()> {
        match std::fs::remove_dir_all(self.dir.join(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory template store for memory-backed skeletons.
#[derive(Default)]
pub struct MemTemplateStore {
    templates: RwLock<HashMap<String, StreamTemplateConfig>>,
}

impl MemTemplateStore {
    pub fn new() -> MemTemplateStore {
        MemTemplateStore::default()
    }
}

impl TemplateStore for MemTemplateStore {
    fn store(&self, template: &StreamTemplateConfig) -> Result<()> {
        self.templates
            .write()
            .insert(template.name.clone(), template.clone());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.templates.write().remove(name);
        Ok(())
    }
}

struct TemplateState {
    streams: Vec<String>,
    subs: Vec<SubscriptionId>,
    closed: bool,
}

/// An installed template: immutable configuration, a weak handle back
/// into the owning account, and the mutable list of generated streams.
pub struct StreamTemplate {
    config: StreamTemplateConfig,
    jsa: Weak<JsAccount>,
    me: Weak<StreamTemplate>,
    state: Mutex<TemplateState>,
}

impl std::fmt::Debug for StreamTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTemplate")
            .field("name", &self.config.name)
            .finish()
    }
}

impl StreamTemplate {
    pub(crate) fn new(config: StreamTemplateConfig, jsa: Weak<JsAccount>) -> Arc<StreamTemplate> {
        Arc::new_cyclic(|me| StreamTemplate {
            config,
            jsa,
            me: me.clone(),
            state: Mutex::new(TemplateState {
                streams: Vec::new(),
                subs: Vec::new(),
                closed: false,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> StreamTemplateConfig {
        self.config.clone()
    }

    pub fn info(&self) -> StreamTemplateInfo {
        StreamTemplateInfo {
            config: self.config.clone(),
            streams: self.streams(),
        }
    }

    /// Names of the streams this template has generated.
    pub fn streams(&self) -> Vec<String> {
        self.state.lock().streams.clone()
    }

    pub fn owns_stream(&self, name: &str) -> bool {
        self.state.lock().streams.iter().any(|s| s == name)
    }

    /// Recovery bookkeeping: register an already-persisted stream without
    /// replaying any message.
    pub(crate) fn add_stream_name(&self, name: &str) {
        let mut state = self.state.lock();
        if !state.streams.iter().any(|s| s == name) {
            state.streams.push(name.to_string());
        }
    }

    pub(crate) fn take_streams(&self) -> Vec<String> {
        std::mem::take(&mut self.state.lock().streams)
    }

    /// Attach the synthetic internal client: one subscription per
    /// configured subject, each dispatching back into this template. The
    /// handlers hold a weak handle, so a deleted template goes quiet even
    /// if a subscription lingers.
    pub(crate) fn subscribe_subjects(
        &self,
        router: &Arc<dyn SubjectRouter>,
        account: &str,
    ) -> Result<()> {
        for subject in &self.config.config.subjects {
            let template = self.me.clone();
            let sid = router.subscribe(
                account,
                subject,
                Arc::new(move |subject, reply, payload| {
                    if let Some(template) = template.upgrade() {
                        template.process_inbound(subject, reply, payload);
                    }
                }),
            )?;
            self.state.lock().subs.push(sid);
        }
        Ok(())
    }

    /// Close the internal client, dropping all subscriptions. Idempotent.
    pub(crate) fn close_client(&self, router: &Arc<dyn SubjectRouter>) {
        let subs = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.subs)
        };
        for sid in subs {
            router.unsubscribe(sid);
        }
    }

    /// Inbound message on one of the template's subjects.
    ///
    /// The account map existence check runs under the account lock, the
    /// cap-check-and-append under the template lock, and `add_stream`
    /// with no control-plane lock held. Two in-flight subjects resolving
    /// to the same canonical name trigger exactly one `add_stream`.
    pub(crate) fn process_inbound(&self, subject: &str, reply: Option<&str>, payload: &[u8]) {
        let Some(jsa) = self.jsa.upgrade() else {
            return;
        };
        let cn = canonical_name(subject);

        // Already materialized: the stream's own subscription takes over.
        if jsa.stream_exists(&cn) {
            return;
        }

        {
            let mut state = self.state.lock();
            if state.closed || state.streams.iter().any(|s| s == &cn) {
                return;
            }
            if state.streams.len() >= self.config.max_streams as usize {
                drop(state);
                warn!(
                    account = %jsa.name(),
                    subject,
                    template = %self.config.name,
                    "could not create stream, template at limit"
                );
                return;
            }
            state.streams.push(cn.clone());
        }

        let mut cfg = self.config.config.clone();
        cfg.name = cn;
        cfg.subjects = vec![subject.to_string()];
        cfg.template = self.config.name.clone();

        match jsa.add_stream(cfg) {
            Ok(stream) => {
                // Re-deliver the triggering message so it is the first one
                // the new stream sees.
                if let Err(e) = stream.ingest(subject, reply, payload) {
                    warn!(
                        account = %jsa.name(),
                        subject,
                        error = %e,
                        "failed to deliver message to auto-created stream"
                    );
                }
            }
            Err(e) => {
                self.validate_streams(&jsa);
                warn!(
                    account = %jsa.name(),
                    subject,
                    template = %self.config.name,
                    error = %e,
                    "could not create stream for template"
                );
            }
        }
    }

    /// Drop generated-stream names that no longer resolve in the account,
    /// keeping the list in sync with reality after an `add_stream`
    /// failure.
    pub(crate) fn validate_streams(&self, jsa: &Arc<JsAccount>) {
        let names = self.streams();
        let valid: Vec<String> = names
            .into_iter()
            .filter(|name| jsa.lookup_stream(name).is_ok())
            .collect();
        self.state.lock().streams = valid;
    }

    /// Delete this template: account map removal, persistent store
    /// deletion, client close, and a stop of every generated stream. All
    /// cleanup steps run; the last stream-stop error is returned and a
    /// store-deletion failure is only logged.
    pub fn delete(&self) -> Result<()> {
        let jsa = self
            .jsa
            .upgrade()
            .ok_or(JetStreamError::NotEnabledForAccount)?;
        jsa.delete_template(self.name())
    }
}
