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

//! Server-level JetStream control plane
//!
//! [`JetStream`] is the composition root the host server hangs on to: the
//! resolved configuration, the resource ledger, and the registry of
//! enabled accounts, all behind one state lock (the ledger lock of the
//! lock hierarchy). The host passes this handle into every operation
//! (there is no process-wide singleton) and drops it after
//! [`JetStream::shutdown`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::account::JsAccount;
use crate::config::{friendly_bytes, prepare_store_dir, JetStreamConfig};
use crate::error::{JetStreamError, Result};
use crate::ledger::ResourceLedger;
use crate::limits::AccountLimits;
use crate::recovery;
use crate::router::SubjectRouter;
use crate::stream::StreamEngine;

/// Service endpoint answering per-account usage queries.
pub const JS_API_ACCOUNT_INFO: &str = "$JS.API.INFO";

/// Every JetStream service subject exported on the system account. The
/// full set is exported before any account can be enabled; enabled
/// accounts import all of them, and only their own imports are removed on
/// disable.
pub const ALL_JS_EXPORTS: &[&str] = &[
    JS_API_ACCOUNT_INFO,
    "$JS.API.STREAM.TEMPLATE.CREATE.*",
    "$JS.API.STREAM.TEMPLATE.NAMES",
    "$JS.API.STREAM.TEMPLATE.INFO.*",
    "$JS.API.STREAM.TEMPLATE.DELETE.*",
    "$JS.API.STREAM.CREATE.*",
    "$JS.API.STREAM.UPDATE.*",
    "$JS.API.STREAM.NAMES",
    "$JS.API.STREAM.LIST",
    "$JS.API.STREAM.INFO.*",
    "$JS.API.STREAM.DELETE.*",
    "$JS.API.STREAM.PURGE.*",
    "$JS.API.STREAM.SNAPSHOT.*",
    "$JS.API.STREAM.RESTORE.*",
    "$JS.API.STREAM.MSG.DELETE.*",
    "$JS.API.STREAM.MSG.GET.*",
    "$JS.API.CONSUMER.CREATE.*",
    "$JS.API.CONSUMER.DURABLE.CREATE.*.*",
    "$JS.API.CONSUMER.NAMES.*",
    "$JS.API.CONSUMER.LIST.*",
    "$JS.API.CONSUMER.INFO.*.*",
    "$JS.API.CONSUMER.DELETE.*.*",
];

/// Opaque cluster meta-controller. Started by the host when running
/// clustered; the control plane only tears it down, last, at shutdown.
pub trait ClusterController: Send + Sync {
    fn stop(&self);
}

struct JsState {
    ledger: ResourceLedger,
    accounts: HashMap<String, Arc<JsAccount>>,
}

/// The per-server JetStream control plane.
pub struct JetStream {
    config: JetStreamConfig,
    system_account: String,
    me: Weak<JetStream>,
    router: Arc<dyn SubjectRouter>,
    engine: Arc<dyn StreamEngine>,
    cluster: Mutex<Option<Arc<dyn ClusterController>>>,
    state: RwLock<JsState>,
}

impl JetStream {
    /// Enable JetStream with the given configuration. A `None` or partial
    /// configuration picks limits and a temp-dir store location
    /// dynamically. The store directory is created (or verified writable)
    /// and every service export is installed on the system account before
    /// this returns; no account can be enabled earlier.
    pub fn enable(
        config: Option<JetStreamConfig>,
        system_account: &str,
        router: Arc<dyn SubjectRouter>,
        engine: Arc<dyn StreamEngine>,
    ) -> Result<Arc<JetStream>> {
        info!("starting jetstream");
        let dynamic = config
            .as_ref()
            .map_or(true, |c| c.max_memory <= 0 || c.max_store <= 0);
        let config = JetStreamConfig::resolve(config);
        if dynamic {
            debug!(
                "creating dynamic jetstream configuration - {} memory, {} disk",
                friendly_bytes(config.max_memory),
                friendly_bytes(config.max_store)
            );
        }

        prepare_store_dir(&config.store_dir)?;

        info!("---------- jetstream ----------");
        info!("  max memory:      {}", friendly_bytes(config.max_memory));
        info!("  max storage:     {}", friendly_bytes(config.max_store));
        info!("  store directory: {:?}", config.store_dir);
        info!("-------------------------------");

        debug!("  exports:");
        for export in ALL_JS_EXPORTS {
            debug!("     {export}");
            router.add_service_export(system_account, export)?;
        }

        let ledger = ResourceLedger::new(&config);
        Ok(Arc::new_cyclic(|me| JetStream {
            config,
            system_account: system_account.to_string(),
            me: me.clone(),
            router,
            engine,
            cluster: Mutex::new(None),
            state: RwLock::new(JsState {
                ledger,
                accounts: HashMap::new(),
            }),
        }))
    }

    /// Attach the cluster meta-controller.
    pub fn set_cluster(&self, cluster: Arc<dyn ClusterController>) {
        *self.cluster.lock() = Some(cluster);
    }

    /// A copy of the resolved configuration.
    pub fn config(&self) -> JetStreamConfig {
        self.config.clone()
    }

    pub fn store_dir(&self) -> PathBuf {
        self.config.store_dir.clone()
    }

    pub fn system_account(&self) -> &str {
        &self.system_account
    }

    /// Number of enabled accounts.
    pub fn num_accounts(&self) -> usize {
        self.state.read().accounts.len()
    }

    /// Currently reserved `(memory, store)` bytes across all enabled
    /// accounts.
    pub fn reserved_resources(&self) -> (i64, i64) {
        let state = self.state.read();
        (state.ledger.mem_reserved(), state.ledger.store_reserved())
    }

    pub fn account_enabled(&self, account: &str) -> bool {
        self.state.read().accounts.contains_key(account)
    }

    pub fn lookup_account(&self, account: &str) -> Option<Arc<JsAccount>> {
        self.state.read().accounts.get(account).cloned()
    }

    pub(crate) fn dynamic_limits(&self) -> AccountLimits {
        AccountLimits::dynamic(&self.config)
    }

    pub(crate) fn replace_reservation(
        &self,
        old: &AccountLimits,
        new: &AccountLimits,
    ) -> Result<()> {
        self.state.write().ledger.replace(old, new)
    }

    /// Enable JetStream for an account. `None` limits are dynamic: the
    /// account gets the entire server quota with no stream or consumer
    /// cap. Admission and reservation happen in one critical section, so
    /// concurrent enables cannot oversubscribe the server.
    ///
    /// On success the account's slice of the store directory exists, its
    /// persisted state has been recovered, and all service imports are
    /// installed.
    pub fn enable_account(
        &self,
        account: &str,
        limits: Option<AccountLimits>,
    ) -> Result<Arc<JsAccount>> {
        if account == self.system_account {
            return Err(JetStreamError::SystemAccount);
        }
        let limits = limits.unwrap_or_else(|| self.dynamic_limits());

        let jsa = {
            let mut state = self.state.write();
            if state.accounts.contains_key(account) {
                return Err(JetStreamError::AlreadyEnabledForAccount);
            }
            state.ledger.try_reserve(&limits)?;
            let jsa = JsAccount::new(
                account,
                self.config.store_dir.join(account),
                self.me.clone(),
                self.router.clone(),
                self.engine.clone(),
                limits,
            );
            state.accounts.insert(account.to_string(), jsa.clone());
            jsa
        };

        debug!(account, "enabled jetstream");
        debug!("  max memory:  {}", friendly_bytes(limits.max_memory));
        debug!("  max storage: {}", friendly_bytes(limits.max_store));

        // The streams directory is the one fatal prerequisite; on failure
        // the reservation is rolled back before the error surfaces.
        if let Err(e) = crate::config::create_dir_0755(&jsa.streams_dir()) {
            self.rollback_enable(account, &limits);
            return Err(e.into());
        }

        debug!(account, "recovering jetstream state");
        recovery::recover_account(&jsa);

        if let Err(e) = jsa.enable_service_imports(&self.system_account) {
            self.rollback_enable(account, &limits);
            jsa.teardown();
            return Err(e);
        }

        Ok(jsa)
    }

    fn rollback_enable(&self, account: &str, limits: &AccountLimits) {
        let mut state = self.state.write();
        state.accounts.remove(account);
        state.ledger.release(limits);
    }

    /// Install only the usage-query import on a non-enabled account, so
    /// it can ask about JetStream without owning any resources.
    pub fn enable_account_info_import(&self, account: &str) -> Result<()> {
        self.router
            .add_service_import(account, &self.system_account, JS_API_ACCOUNT_INFO)
    }

    /// Disable JetStream for an account: imports removed, reservation
    /// released, streams stopped, templates cleared. No user data is
    /// deleted; a subsequent enable recovers everything from disk.
    pub fn disable_account(&self, account: &str) -> Result<()> {
        let jsa = self
            .lookup_account(account)
            .ok_or(JetStreamError::NotEnabledForAccount)?;

        for export in ALL_JS_EXPORTS {
            self.router.remove_service_import(account, export);
        }

        let limits = jsa.limits();
        {
            let mut state = self.state.write();
            state.accounts.remove(account);
            state.ledger.release(&limits);
        }

        jsa.teardown();
        debug!(account, "disabled jetstream");
        Ok(())
    }

    /// Shut the control plane down: every account is torn down
    /// (non-destructively) and the cluster controller is stopped last.
    /// Idempotent.
    pub fn shutdown(&self) {
        let accounts: Vec<Arc<JsAccount>> =
            self.state.read().accounts.values().cloned().collect();

        for jsa in accounts {
            let limits = jsa.limits();
            {
                let mut state = self.state.write();
                if state.accounts.remove(jsa.name()).is_some() {
                    state.ledger.release(&limits);
                }
            }
            jsa.teardown();
        }

        if let Some(cluster) = self.cluster.lock().take() {
            cluster.stop();
        }
    }

    /// Zero the ledger without walking accounts. Safe only as part of a
    /// full configuration reload that will re-enable every account
    /// afterwards; calling it at any other time breaks the reservation
    /// invariant.
    pub fn clear_resources(&self) {
        self.state.write().ledger.clear();
    }
}
