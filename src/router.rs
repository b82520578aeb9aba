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

//! Subject-routing seam to the host messaging server
//!
//! The control plane needs three things from its host: service exports on
//! the system account, service imports on enabled accounts, and internal
//! subscriptions for template dispatch. [`SubjectRouter`] captures that
//! contract; [`LocalSubjectRouter`] is the in-process implementation used
//! by embedded hosts and the test suites.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{JetStreamError, Result};
use crate::subject::{is_valid_subject, subject_matches};

/// Identifier for one registered subscription.
pub type SubscriptionId = u64;

/// Callback invoked with `(subject, reply, payload)` for each delivery.
pub type MsgHandler = Arc<dyn Fn(&str, Option<&str>, &[u8]) + Send + Sync>;

/// Host messaging-server contract used by the control plane.
pub trait SubjectRouter: Send + Sync {
    /// Export a service subject from `account` (the system account).
    fn add_service_export(&self, account: &str, subject: &str) -> Result<()>;

    /// Import an exported service subject into `account`.
    fn add_service_import(&self, account: &str, from_account: &str, subject: &str) -> Result<()>;

    /// Remove one account's import of a service subject.
    fn remove_service_import(&self, account: &str, subject: &str);

    fn has_service_import(&self, account: &str, subject: &str) -> bool;

    /// Register an internal subscription on behalf of `account`.
    fn subscribe(&self, account: &str, subject: &str, handler: MsgHandler)
        -> Result<SubscriptionId>;

    fn unsubscribe(&self, sid: SubscriptionId);
}

struct LocalSubscription {
    account: String,
    subject: String,
    handler: MsgHandler,
}

#[derive(Default)]
struct RouterState {
    /// account -> exported service subjects
    exports: HashMap<String, HashSet<String>>,
    /// account -> subject -> exporting account
    imports: HashMap<String, HashMap<String, String>>,
    subs: HashMap<SubscriptionId, LocalSubscription>,
}

/// Table-driven, in-process subject router.
#[derive(Default)]
pub struct LocalSubjectRouter {
    state: RwLock<RouterState>,
    next_sid: AtomicU64,
}

impl LocalSubjectRouter {
    pub fn new() -> LocalSubjectRouter {
        LocalSubjectRouter::default()
    }

    /// Publish a message into `account`, invoking every matching
    /// subscription. Handlers run after the routing lock is released.
    /// Returns the number of deliveries.
    pub fn publish(
        &self,
        account: &str,
        subject: &str,
        reply: Option<&str>,
        payload: &[u8],
    ) -> usize {
        let handlers: Vec<MsgHandler> = {
            let state = self.state.read();
            state
                .subs
                .values()
                .filter(|sub| sub.account == account && subject_matches(&sub.subject, subject))
                .map(|sub| sub.handler.clone())
                .collect()
        };
        for handler in &handlers {
            (handler.as_ref())(subject, reply, payload);
        }
        handlers.len()
    }
}

impl SubjectRouter for LocalSubjectRouter {
    fn add_service_export(&self, account: &str, subject: &str) -> Result<()> {
        if !is_valid_subject(subject) {
            return Err(JetStreamError::InvalidSubject(subject.to_string()));
        }
        self.state
            .write()
            .exports
            .entry(account.to_string())
            .or_default()
            .insert(subject.to_string());
        Ok(())
    }

    fn add_service_import(&self, account: &str, from_account: &str, subject: &str) -> Result<()> {
        let mut state = self.state.write();
        let exported = state
            .exports
            .get(from_account)
            .is_some_and(|subjects| subjects.contains(subject));
        if !exported {
            return Err(JetStreamError::ExportNotFound(subject.to_string()));
        }
        state
            .imports
            .entry(account.to_string())
            .or_default()
            .insert(subject.to_string(), from_account.to_string());
        Ok(())
    }

    fn remove_service_import(&self, account: &str, subject: &str) {
        let mut state = self.state.write();
        if let Some(imports) = state.imports.get_mut(account) {
            imports.remove(subject);
        }
    }

    fn has_service_import(&self, account: &str, subject: &str) -> bool {
        self.state
            .read()
            .imports
            .get(account)
            .is_some_and(|imports| imports.contains_key(subject))
    }

    fn subscribe(
        &self,
        account: &str,
        subject: &str,
        handler: MsgHandler,
    ) -> Result<SubscriptionId> {
        if !is_valid_subject(subject) {
            return Err(JetStreamError::InvalidSubject(subject.to_string()));
        }
        let sid = self.next_sid.fetch_add(1, Ordering::Relaxed) + 1;
        self.state.write().subs.insert(
            sid,
            LocalSubscription {
                account: account.to_string(),
                subject: subject.to_string(),
                handler,
            },
        );
        Ok(sid)
    }

    fn unsubscribe(&self, sid: SubscriptionId) {
        self.state.write().subs.remove(&sid);
    }
}
